//! Fixed-record binary tick-log format: reader and writer.

pub mod codec;

pub use codec::{
    TickLogError, TickLogHeader, TickLogReader, TickLogWriter, HEADER_LEN, TICKLOG_MAGIC,
    TICKLOG_VERSION,
};
