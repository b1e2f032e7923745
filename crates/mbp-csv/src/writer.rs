//! MBP-10 snapshot CSV output.
//!
//! One header line, then one row per emitted snapshot: the timestamp, ten
//! bid (price, size) pairs best-first, ten ask pairs best-first. A slot with
//! price 0 renders as two empty fields. Nonzero prices always carry exactly
//! two fractional digits.

use std::fmt::Write as _;
use std::io::{self, Write};

use mbp_core::{MbpSnapshot, PriceTick, DEPTH};

/// Build the output header line, terminated with `\n`.
pub fn mbp_header() -> String {
    let mut header = String::from("ts_event");
    for i in 0..DEPTH {
        let _ = write!(header, ",bid_px_{:02},bid_sz_{:02}", i, i);
    }
    for i in 0..DEPTH {
        let _ = write!(header, ",ask_px_{:02},ask_sz_{:02}", i, i);
    }
    header.push('\n');
    header
}

/// Formats snapshot rows into a reusable buffer.
pub struct SnapshotFormatter {
    buf: String,
}

impl SnapshotFormatter {
    pub fn new() -> Self {
        Self {
            buf: String::with_capacity(512),
        }
    }

    /// Format one row. The returned slice is valid until the next call.
    pub fn format_row(&mut self, snapshot: &MbpSnapshot) -> &str {
        self.buf.clear();
        let _ = write!(self.buf, "{}", snapshot.timestamp_ns);

        for i in 0..DEPTH {
            write_slot(&mut self.buf, snapshot.bid_px[i], snapshot.bid_sz[i]);
        }
        for i in 0..DEPTH {
            write_slot(&mut self.buf, snapshot.ask_px[i], snapshot.ask_sz[i]);
        }

        self.buf.push('\n');
        &self.buf
    }
}

impl Default for SnapshotFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn write_slot(buf: &mut String, px: PriceTick, sz: u64) {
    if px.is_zero() {
        buf.push_str(",,");
    } else {
        write_price(buf, px);
        let _ = write!(buf, ",{}", sz);
    }
}

fn write_price(buf: &mut String, px: PriceTick) {
    // Sign emitted separately so -0.25 keeps its minus.
    let raw = px.as_raw();
    let sign = if raw < 0 { "-" } else { "" };
    let abs = raw.unsigned_abs();
    let _ = write!(buf, ",{}{}.{:02}", sign, abs / 100, abs % 100);
}

/// Writes header and snapshot rows to an output stream.
pub struct SnapshotWriter<W: Write> {
    out: W,
    formatter: SnapshotFormatter,
    rows_written: u64,
}

impl<W: Write> SnapshotWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            formatter: SnapshotFormatter::new(),
            rows_written: 0,
        }
    }

    /// Emit the header line.
    pub fn write_header(&mut self) -> io::Result<()> {
        self.out.write_all(mbp_header().as_bytes())
    }

    /// Emit one snapshot row.
    pub fn write_snapshot(&mut self, snapshot: &MbpSnapshot) -> io::Result<()> {
        let row = self.formatter.format_row(snapshot);
        self.out.write_all(row.as_bytes())?;
        self.rows_written += 1;
        Ok(())
    }

    /// Rows emitted so far, header excluded.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
