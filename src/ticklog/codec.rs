//! Tick-log binary codec.
//!
//! Layout (all little-endian):
//!
//! - 64-byte header: `u64` magic, 8-byte ASCII version, `u64` creation
//!   nanoseconds, 32-byte NUL-padded UTF-8 description, 8 reserved bytes.
//! - Tick record, 27 bytes:
//!   `u64 ts_ns | u8 kind | [u8;6] symbol | i64 price*10_000 | i32 qty`.
//! - Quote record, 39 bytes: the same 15-byte prefix with the quote kind
//!   code, then `i64 bid*10_000 | i32 bid_sz | i64 ask*10_000 | i32 ask_sz`.

use std::io::{self, Read, Write};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::event::{Event, MarketTick, QuoteUpdate, TickKind};
use crate::model::symbol::Symbol;

/// "TIKX".
pub const TICKLOG_MAGIC: u64 = 0x5449_4B58;
pub const HEADER_LEN: usize = 64;
/// Current format version, 8 ASCII bytes.
pub const TICKLOG_VERSION: &[u8; 8] = b"TIKX0001";

const SYMBOL_LEN: usize = 6;
const PREFIX_LEN: usize = 8 + 1 + SYMBOL_LEN;
const TICK_TAIL_LEN: usize = 8 + 4;
const QUOTE_TAIL_LEN: usize = 8 + 4 + 8 + 4;
const PRICE_SCALE: i64 = 10_000;

const KIND_TRADE: u8 = 0;
const KIND_BID: u8 = 1;
const KIND_ASK: u8 = 2;
const KIND_QUOTE: u8 = 3;

#[derive(Error, Debug)]
pub enum TickLogError {
    #[error("bad magic {found:#x}, expected {TICKLOG_MAGIC:#x}")]
    BadMagic { found: u64 },

    #[error("unsupported tick-log version {0:?}")]
    BadVersion(String),

    #[error("unknown record kind {0}")]
    BadKind(u8),

    #[error("record symbol is not valid ASCII")]
    BadSymbol,

    #[error("truncated record: expected {expected} more bytes")]
    Truncated { expected: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Parsed tick-log header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickLogHeader {
    pub version: String,
    pub created_ns: u64,
    pub description: String,
}

impl TickLogHeader {
    pub fn new(created_ns: u64, description: &str) -> Self {
        Self {
            version: String::from_utf8_lossy(TICKLOG_VERSION).into_owned(),
            created_ns,
            description: description.chars().take(32).collect(),
        }
    }

    fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..8].copy_from_slice(&TICKLOG_MAGIC.to_le_bytes());
        let version = self.version.as_bytes();
        let version_len = version.len().min(8);
        buf[8..8 + version_len].copy_from_slice(&version[..version_len]);
        buf[16..24].copy_from_slice(&self.created_ns.to_le_bytes());
        let desc = self.description.as_bytes();
        let desc_len = desc.len().min(32);
        buf[24..24 + desc_len].copy_from_slice(&desc[..desc_len]);
        // buf[56..64] reserved, already zero.
        buf
    }

    fn decode(buf: &[u8; HEADER_LEN]) -> Result<Self, TickLogError> {
        let magic = u64::from_le_bytes(buf[0..8].try_into().expect("8 bytes"));
        if magic != TICKLOG_MAGIC {
            return Err(TickLogError::BadMagic { found: magic });
        }
        let version = trimmed_string(&buf[8..16]);
        if !version.starts_with("TIKX") {
            return Err(TickLogError::BadVersion(version));
        }
        let created_ns = u64::from_le_bytes(buf[16..24].try_into().expect("8 bytes"));
        let description = trimmed_string(&buf[24..56]);
        Ok(Self {
            version,
            created_ns,
            description,
        })
    }
}

fn trimmed_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end])
        .trim_end()
        .to_string()
}

fn encode_symbol(symbol: Symbol) -> [u8; SYMBOL_LEN] {
    let mut out = [0u8; SYMBOL_LEN];
    let bytes = symbol.as_str().as_bytes();
    let len = bytes.len().min(SYMBOL_LEN);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

fn decode_symbol(bytes: &[u8]) -> Result<Symbol, TickLogError> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let text = std::str::from_utf8(&bytes[..end]).map_err(|_| TickLogError::BadSymbol)?;
    Symbol::new(text).map_err(|_| TickLogError::BadSymbol)
}

fn scale_price(px: Decimal) -> i64 {
    (px * Decimal::from(PRICE_SCALE)).round().to_i64().unwrap_or(0)
}

fn unscale_price(scaled: i64) -> Decimal {
    Decimal::new(scaled, 4)
}

/// Streaming tick-log writer.
pub struct TickLogWriter<W: Write> {
    inner: W,
}

impl<W: Write> TickLogWriter<W> {
    /// Write the header and return the writer.
    pub fn create(mut inner: W, header: &TickLogHeader) -> Result<Self, TickLogError> {
        inner.write_all(&header.encode())?;
        Ok(Self { inner })
    }

    pub fn write_tick(&mut self, tick: &MarketTick) -> Result<(), TickLogError> {
        let kind = match tick.kind {
            TickKind::Trade => KIND_TRADE,
            TickKind::Bid => KIND_BID,
            TickKind::Ask => KIND_ASK,
            TickKind::Quote => KIND_QUOTE,
        };
        // A Quote-kind tick degenerates to one level on both sides.
        if kind == KIND_QUOTE {
            return self.write_quote(&QuoteUpdate {
                ts_ns: tick.ts_ns,
                symbol: tick.symbol,
                bid_px: tick.price,
                bid_sz: tick.qty,
                ask_px: tick.price,
                ask_sz: tick.qty,
            });
        }
        self.write_prefix(tick.ts_ns, kind, tick.symbol)?;
        self.inner.write_all(&scale_price(tick.price).to_le_bytes())?;
        self.inner.write_all(&(tick.qty as i32).to_le_bytes())?;
        Ok(())
    }

    pub fn write_quote(&mut self, quote: &QuoteUpdate) -> Result<(), TickLogError> {
        self.write_prefix(quote.ts_ns, KIND_QUOTE, quote.symbol)?;
        self.inner.write_all(&scale_price(quote.bid_px).to_le_bytes())?;
        self.inner.write_all(&(quote.bid_sz as i32).to_le_bytes())?;
        self.inner.write_all(&scale_price(quote.ask_px).to_le_bytes())?;
        self.inner.write_all(&(quote.ask_sz as i32).to_le_bytes())?;
        Ok(())
    }

    pub fn write_event(&mut self, event: &Event) -> Result<(), TickLogError> {
        match event {
            Event::MarketData(tick) => self.write_tick(tick),
            Event::Quote(quote) => self.write_quote(quote),
            // Fills and acks are run products, not log records.
            Event::Fill(_) | Event::OrderAck(_) => Ok(()),
        }
    }

    fn write_prefix(&mut self, ts_ns: u64, kind: u8, symbol: Symbol) -> Result<(), TickLogError> {
        self.inner.write_all(&ts_ns.to_le_bytes())?;
        self.inner.write_all(&[kind])?;
        self.inner.write_all(&encode_symbol(symbol))?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Streaming tick-log reader.
#[derive(Debug)]
pub struct TickLogReader<R: Read> {
    inner: R,
    header: TickLogHeader,
}

impl<R: Read> TickLogReader<R> {
    /// Parse the header; a malformed header is fatal.
    pub fn open(mut inner: R) -> Result<Self, TickLogError> {
        let mut buf = [0u8; HEADER_LEN];
        inner.read_exact(&mut buf)?;
        let header = TickLogHeader::decode(&buf)?;
        Ok(Self { inner, header })
    }

    pub fn header(&self) -> &TickLogHeader {
        &self.header
    }

    /// Read the next record, or `None` at a clean end of stream.
    pub fn next_event(&mut self) -> Result<Option<Event>, TickLogError> {
        let mut prefix = [0u8; PREFIX_LEN];
        match read_exact_or_eof(&mut self.inner, &mut prefix)? {
            ReadOutcome::Eof => return Ok(None),
            ReadOutcome::Partial(read) => {
                return Err(TickLogError::Truncated {
                    expected: PREFIX_LEN - read,
                })
            }
            ReadOutcome::Full => {}
        }

        let ts_ns = u64::from_le_bytes(prefix[0..8].try_into().expect("8 bytes"));
        let kind = prefix[8];
        let symbol = decode_symbol(&prefix[9..PREFIX_LEN])?;

        match kind {
            KIND_QUOTE => {
                let mut tail = [0u8; QUOTE_TAIL_LEN];
                self.read_tail(&mut tail)?;
                Ok(Some(Event::Quote(QuoteUpdate {
                    ts_ns,
                    symbol,
                    bid_px: unscale_price(i64::from_le_bytes(tail[0..8].try_into().expect("8"))),
                    bid_sz: i32::from_le_bytes(tail[8..12].try_into().expect("4")) as i64,
                    ask_px: unscale_price(i64::from_le_bytes(tail[12..20].try_into().expect("8"))),
                    ask_sz: i32::from_le_bytes(tail[20..24].try_into().expect("4")) as i64,
                })))
            }
            KIND_TRADE | KIND_BID | KIND_ASK => {
                let mut tail = [0u8; TICK_TAIL_LEN];
                self.read_tail(&mut tail)?;
                let tick_kind = match kind {
                    KIND_TRADE => TickKind::Trade,
                    KIND_BID => TickKind::Bid,
                    _ => TickKind::Ask,
                };
                Ok(Some(Event::MarketData(MarketTick {
                    ts_ns,
                    symbol,
                    price: unscale_price(i64::from_le_bytes(tail[0..8].try_into().expect("8"))),
                    qty: i32::from_le_bytes(tail[8..12].try_into().expect("4")) as i64,
                    kind: tick_kind,
                })))
            }
            other => Err(TickLogError::BadKind(other)),
        }
    }

    fn read_tail(&mut self, tail: &mut [u8]) -> Result<(), TickLogError> {
        match read_exact_or_eof(&mut self.inner, tail)? {
            ReadOutcome::Full => Ok(()),
            ReadOutcome::Eof => Err(TickLogError::Truncated {
                expected: tail.len(),
            }),
            ReadOutcome::Partial(read) => Err(TickLogError::Truncated {
                expected: tail.len() - read,
            }),
        }
    }
}

impl<R: Read> Iterator for TickLogReader<R> {
    type Item = Result<Event, TickLogError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

enum ReadOutcome {
    Full,
    Eof,
    Partial(usize),
}

fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<ReadOutcome> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => {
                return Ok(match filled {
                    0 => ReadOutcome::Eof,
                    n => ReadOutcome::Partial(n),
                })
            }
            n => filled += n,
        }
    }
    Ok(ReadOutcome::Full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    fn header() -> TickLogHeader {
        TickLogHeader::new(1_700_000_000_000_000_000, "unit test capture")
    }

    #[test]
    fn test_header_round_trip() {
        let encoded = header().encode();
        assert_eq!(encoded.len(), HEADER_LEN);
        let decoded = TickLogHeader::decode(&encoded).unwrap();
        assert_eq!(decoded, header());
        assert_eq!(decoded.version, "TIKX0001");
    }

    #[test]
    fn test_bad_magic_is_fatal() {
        let mut encoded = header().encode();
        encoded[0] ^= 0xFF;
        let err = TickLogReader::open(Cursor::new(encoded.to_vec())).unwrap_err();
        assert!(matches!(err, TickLogError::BadMagic { .. }));
    }

    #[test]
    fn test_tick_and_quote_round_trip() {
        let tick = MarketTick {
            ts_ns: 1_000,
            symbol: sym("SPY"),
            price: dec!(101.2345),
            qty: 250,
            kind: TickKind::Trade,
        };
        let quote = QuoteUpdate {
            ts_ns: 2_000,
            symbol: sym("SPY"),
            bid_px: dec!(101.2000),
            bid_sz: 500,
            ask_px: dec!(101.2500),
            ask_sz: 700,
        };

        let mut writer = TickLogWriter::create(Vec::new(), &header()).unwrap();
        writer.write_tick(&tick).unwrap();
        writer.write_quote(&quote).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), HEADER_LEN + 27 + 39);

        let mut reader = TickLogReader::open(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.header().description, "unit test capture");

        let first = reader.next_event().unwrap().unwrap();
        assert_eq!(first.as_market_data(), Some(&tick));
        let second = reader.next_event().unwrap().unwrap();
        assert_eq!(second.as_quote(), Some(&quote));
        assert!(reader.next_event().unwrap().is_none());
    }

    #[test]
    fn test_bid_ask_kinds_survive() {
        let mut writer = TickLogWriter::create(Vec::new(), &header()).unwrap();
        for kind in [TickKind::Bid, TickKind::Ask] {
            writer
                .write_tick(&MarketTick {
                    ts_ns: 5,
                    symbol: sym("QQQ"),
                    price: dec!(400.5000),
                    qty: 10,
                    kind,
                })
                .unwrap();
        }
        let mut reader = TickLogReader::open(Cursor::new(writer.into_inner())).unwrap();
        let kinds: Vec<TickKind> = std::iter::from_fn(|| reader.next_event().unwrap())
            .map(|e| e.as_market_data().unwrap().kind)
            .collect();
        assert_eq!(kinds, vec![TickKind::Bid, TickKind::Ask]);
    }

    #[test]
    fn test_quote_kind_tick_becomes_quote_record() {
        let mut writer = TickLogWriter::create(Vec::new(), &header()).unwrap();
        writer
            .write_tick(&MarketTick {
                ts_ns: 9,
                symbol: sym("SPY"),
                price: dec!(100.0000),
                qty: 50,
                kind: TickKind::Quote,
            })
            .unwrap();
        let mut reader = TickLogReader::open(Cursor::new(writer.into_inner())).unwrap();
        let event = reader.next_event().unwrap().unwrap();
        let quote = event.as_quote().unwrap();
        assert_eq!(quote.bid_px, dec!(100.0000));
        assert_eq!(quote.ask_px, dec!(100.0000));
        assert_eq!(quote.bid_sz, 50);
    }

    #[test]
    fn test_truncated_record_is_error() {
        let mut writer = TickLogWriter::create(Vec::new(), &header()).unwrap();
        writer
            .write_tick(&MarketTick {
                ts_ns: 1,
                symbol: sym("SPY"),
                price: dec!(1.0000),
                qty: 1,
                kind: TickKind::Trade,
            })
            .unwrap();
        let mut bytes = writer.into_inner();
        bytes.truncate(bytes.len() - 3);

        let mut reader = TickLogReader::open(Cursor::new(bytes)).unwrap();
        let err = reader.next_event().unwrap_err();
        assert!(matches!(err, TickLogError::Truncated { .. }));
    }

    #[test]
    fn test_unknown_kind_is_error() {
        let mut bytes = header().encode().to_vec();
        let mut record = [0u8; 27];
        record[8] = 9; // bogus kind code
        record[9..12].copy_from_slice(b"SPY");
        bytes.extend_from_slice(&record);

        let mut reader = TickLogReader::open(Cursor::new(bytes)).unwrap();
        // The bogus kind surfaces before the tail is read.
        let err = reader.next_event().unwrap_err();
        assert!(matches!(err, TickLogError::BadKind(9)));
    }
}
