//! Memory-mapped MBO CSV reader.
//!
//! The input is mapped read-only and scanned byte-by-byte; no allocation per
//! line. Schema (header line skipped):
//!
//! ```text
//! ts_event,action,side,price,size,order_id,flags,ts_recv,ts_in_delta,sequence
//! ```
//!
//! The core consumes the first six fields plus the trailing sequence number.

use std::fs::File;
use std::path::Path;

use arrayvec::ArrayVec;
use memmap2::Mmap;

use mbp_core::{Action, MboEvent, PriceTick, Side};

use crate::CsvError;

/// Number of columns in the MBO schema.
const FIELD_COUNT: usize = 10;

/// Reader-side counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReaderStats {
    /// Data lines successfully decoded into events.
    pub lines_read: u64,
    /// Malformed data lines dropped.
    pub lines_skipped: u64,
}

/// Streaming MBO event reader over a memory-mapped file.
pub struct MboReader {
    mmap: Mmap,
    pos: usize,
    stats: ReaderStats,
}

impl MboReader {
    /// Open and map the input, skipping the header line.
    ///
    /// Fails if the file cannot be opened/mapped or holds no header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CsvError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        #[cfg(unix)]
        {
            let _ = mmap.advise(memmap2::Advice::Sequential);
        }

        if mmap.is_empty() {
            return Err(CsvError::MissingHeader);
        }
        let mut pos = 0;
        while pos < mmap.len() && mmap[pos] != b'\n' {
            pos += 1;
        }
        if pos < mmap.len() {
            pos += 1;
        }

        Ok(Self {
            mmap,
            pos,
            stats: ReaderStats::default(),
        })
    }

    /// Decode the next event, skipping malformed lines. `None` at EOF.
    pub fn next_event(&mut self) -> Option<MboEvent> {
        let data = &self.mmap[..];

        while self.pos < data.len() {
            let line_start = self.pos;
            let mut newline = self.pos;
            while newline < data.len() && data[newline] != b'\n' {
                newline += 1;
            }
            self.pos = if newline < data.len() { newline + 1 } else { newline };

            let mut content_end = newline;
            if content_end > line_start && data[content_end - 1] == b'\r' {
                content_end -= 1;
            }
            if content_end <= line_start {
                continue;
            }

            match parse_event(&data[line_start..content_end]) {
                Some(event) => {
                    self.stats.lines_read += 1;
                    return Some(event);
                }
                None => {
                    self.stats.lines_skipped += 1;
                }
            }
        }

        None
    }

    /// Reader counters.
    pub fn stats(&self) -> ReaderStats {
        self.stats
    }
}

/// Parse one data line into an event. `None` means the line is malformed.
fn parse_event(line: &[u8]) -> Option<MboEvent> {
    let mut fields: ArrayVec<&[u8], FIELD_COUNT> = ArrayVec::new();
    for field in line.split(|&b| b == b',') {
        if fields.try_push(field).is_err() {
            break;
        }
    }
    if fields.len() < 6 {
        return None;
    }

    let timestamp_ns = parse_u64(fields[0])?;

    let action = match fields[1] {
        [code] => Action::try_from(*code).ok()?,
        _ => return None,
    };

    let side = match fields[2] {
        b"B" => Some(Side::Bid),
        b"A" => Some(Side::Ask),
        b"N" => None,
        _ => return None,
    };

    let price = parse_price(fields[3])?;
    let size = parse_u32(fields[4])?;
    let order_id = parse_u64(fields[5])?;

    let sequence = if fields.len() == FIELD_COUNT {
        parse_u64(fields[9]).map_or(0, |s| s as u16)
    } else {
        0
    };

    Some(MboEvent {
        timestamp_ns,
        order_id,
        price,
        size,
        sequence,
        action,
        side,
    })
}

/// Decimal u64; an empty field decodes as 0 (the feed leaves unused numeric
/// columns blank on R and N records).
fn parse_u64(bytes: &[u8]) -> Option<u64> {
    let mut result: u64 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        result = result.checked_mul(10)?.checked_add(u64::from(b - b'0'))?;
    }
    Some(result)
}

fn parse_u32(bytes: &[u8]) -> Option<u32> {
    parse_u64(bytes).and_then(|v| u32::try_from(v).ok())
}

/// Decimal price with an optional sign and up to two fractional digits,
/// scaled to hundredths. An absent fractional part scales by 100.
fn parse_price(bytes: &[u8]) -> Option<PriceTick> {
    let (negative, rest) = match bytes.first() {
        Some(b'-') => (true, &bytes[1..]),
        Some(b'+') => (false, &bytes[1..]),
        _ => (false, bytes),
    };

    let (whole_part, frac_part) = match rest.iter().position(|&b| b == b'.') {
        Some(dot) => (&rest[..dot], Some(&rest[dot + 1..])),
        None => (rest, None),
    };

    let mut raw: i64 = 0;
    for &b in whole_part {
        if !b.is_ascii_digit() {
            return None;
        }
        raw = raw.checked_mul(10)?.checked_add(i64::from(b - b'0'))?;
    }
    raw = raw.checked_mul(100)?;

    if let Some(frac) = frac_part {
        if frac.is_empty() || frac.len() > 2 {
            return None;
        }
        let mut scale = 10;
        for &b in frac {
            if !b.is_ascii_digit() {
                return None;
            }
            raw += i64::from(b - b'0') * scale;
            scale /= 10;
        }
    }

    Some(PriceTick::from_raw(if negative { -raw } else { raw }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("mbp-csv-reader-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    const HEADER: &str =
        "ts_event,action,side,price,size,order_id,flags,ts_recv,ts_in_delta,sequence\n";

    #[test]
    fn test_parse_add_line() {
        let event =
            parse_event(b"1700000000000000100,A,B,100.50,100,1001,130,1700000000000000200,50,7")
                .unwrap();
        assert_eq!(event.timestamp_ns, 1_700_000_000_000_000_100);
        assert_eq!(event.action, Action::Add);
        assert_eq!(event.side, Some(Side::Bid));
        assert_eq!(event.price, PriceTick::from_raw(10050));
        assert_eq!(event.size, 100);
        assert_eq!(event.order_id, 1001);
        assert_eq!(event.sequence, 7);
    }

    #[test]
    fn test_parse_reset_line_with_blanks() {
        let event = parse_event(b"1700000000000000100,R,N,,0,0,0,0,0,0").unwrap();
        assert_eq!(event.action, Action::Reset);
        assert_eq!(event.side, None);
        assert_eq!(event.price, PriceTick::ZERO);
        assert_eq!(event.size, 0);
    }

    #[test]
    fn test_price_variants() {
        assert_eq!(parse_price(b"100.50"), Some(PriceTick::from_raw(10050)));
        assert_eq!(parse_price(b"100.5"), Some(PriceTick::from_raw(10050)));
        assert_eq!(parse_price(b"100"), Some(PriceTick::from_raw(10000)));
        assert_eq!(parse_price(b"-0.25"), Some(PriceTick::from_raw(-25)));
        assert_eq!(parse_price(b"-100.25"), Some(PriceTick::from_raw(-10025)));
        assert_eq!(parse_price(b"+1.01"), Some(PriceTick::from_raw(101)));
        assert_eq!(parse_price(b""), Some(PriceTick::ZERO));

        assert_eq!(parse_price(b"100.505"), None);
        assert_eq!(parse_price(b"100."), None);
        assert_eq!(parse_price(b"abc"), None);
    }

    #[test]
    fn test_malformed_lines_rejected() {
        // Unknown action code.
        assert!(parse_event(b"1000,X,B,100.50,100,1001,0,0,0,0").is_none());
        // Unknown side code.
        assert!(parse_event(b"1000,A,Z,100.50,100,1001,0,0,0,0").is_none());
        // Too few fields.
        assert!(parse_event(b"1000,A,B").is_none());
        // Garbage size.
        assert!(parse_event(b"1000,A,B,100.50,10x,1001,0,0,0,0").is_none());
    }

    #[test]
    fn test_reader_streams_and_skips() {
        let path = write_temp(
            "stream",
            &format!(
                "{}1000,A,B,100.50,100,1001,0,0,0,1\n\
                 this line is garbage\n\
                 2000,A,A,101.00,200,1002,0,0,0,2\n",
                HEADER
            ),
        );
        let mut reader = MboReader::open(&path).unwrap();

        let first = reader.next_event().unwrap();
        assert_eq!(first.order_id, 1001);
        let second = reader.next_event().unwrap();
        assert_eq!(second.order_id, 1002);
        assert_eq!(second.side, Some(Side::Ask));
        assert!(reader.next_event().is_none());

        let stats = reader.stats();
        assert_eq!(stats.lines_read, 2);
        assert_eq!(stats.lines_skipped, 1);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_reader_handles_crlf() {
        let path = write_temp(
            "crlf",
            &format!("{}1000,A,B,100.50,100,1001,0,0,0,1\r\n", HEADER),
        );
        let mut reader = MboReader::open(&path).unwrap();
        let event = reader.next_event().unwrap();
        assert_eq!(event.sequence, 1);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_header_only_file_yields_no_events() {
        let path = write_temp("header-only", HEADER);
        let mut reader = MboReader::open(&path).unwrap();
        assert!(reader.next_event().is_none());
        assert_eq!(reader.stats().lines_read, 0);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_header_is_fatal() {
        let path = write_temp("empty", "");
        match MboReader::open(&path) {
            Err(CsvError::MissingHeader) => {}
            other => panic!("expected MissingHeader, got {:?}", other.err()),
        }
        std::fs::remove_file(path).ok();
    }
}
