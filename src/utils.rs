//! Fixed-width ASCII field primitives shared by the header encoder and decoder.

use std::time::Duration;

use crate::error::{EdfError, Result};

/// Appends fixed-width, left-justified, space-padded fields to a buffer.
///
/// Every write checks the width first, so an oversized value never reaches
/// the output.
pub(crate) struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        FieldWriter {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn text(&mut self, field: &'static str, width: usize, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() > width {
            return Err(EdfError::FieldTooLong {
                field,
                width,
                value: value.to_string(),
            });
        }
        self.buf.extend_from_slice(bytes);
        self.buf.resize(self.buf.len() + width - bytes.len(), b' ');
        Ok(())
    }

    pub fn int<T: ToString>(&mut self, field: &'static str, width: usize, value: T) -> Result<()> {
        self.text(field, width, &value.to_string())
    }

    /// Writes a physical calibration value with two decimals, or with none if
    /// the two-decimal form does not fit.
    pub fn physical(&mut self, field: &'static str, width: usize, value: f64) -> Result<()> {
        let two_decimals = format!("{:.2}", value);
        if two_decimals.len() <= width {
            return self.text(field, width, &two_decimals);
        }
        self.text(field, width, &format!("{:.0}", value))
    }

    pub fn blank(&mut self, width: usize) {
        self.buf.resize(self.buf.len() + width, b' ');
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Walks a byte block field by field, handing out trimmed field text.
pub(crate) struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        FieldReader { buf, pos: 0 }
    }

    pub fn text(&mut self, field: &'static str, width: usize) -> Result<String> {
        let end = self.pos + width;
        let raw = self.buf.get(self.pos..end).ok_or_else(|| {
            EdfError::MalformedHeader(format!(
                "header truncated at `{}` (offset {}, {} bytes available)",
                field,
                self.pos,
                self.buf.len()
            ))
        })?;
        self.pos = end;
        Ok(String::from_utf8_lossy(raw).trim().to_string())
    }

    pub fn skip(&mut self, field: &'static str, width: usize) -> Result<()> {
        self.text(field, width).map(|_| ())
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

/// Parses a trimmed integer field, failing with `MalformedHeader`.
pub(crate) fn parse_int<T: std::str::FromStr>(field: &'static str, s: &str) -> Result<T> {
    s.parse::<T>()
        .map_err(|_| EdfError::MalformedHeader(format!("`{}` is not an integer: {:?}", field, s)))
}

/// Parses a decimal number of seconds such as `1`, `0.5` or `+2.25`.
pub(crate) fn parse_seconds(field: &'static str, s: &str) -> Result<Duration> {
    let malformed =
        || EdfError::MalformedHeader(format!("`{}` is not a duration in seconds: {:?}", field, s));

    let unsigned = s.strip_prefix('+').unwrap_or(s);
    let (whole, frac) = match unsigned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (unsigned, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(malformed());
    }
    let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !digits(whole) || !digits(frac) {
        return Err(malformed());
    }

    let secs = if whole.is_empty() {
        0
    } else {
        whole.parse::<u64>().map_err(|_| malformed())?
    };
    // Nanosecond resolution; further digits are dropped.
    let mut nanos = 0u32;
    for (i, b) in frac.bytes().take(9).enumerate() {
        nanos += (b - b'0') as u32 * 10u32.pow(8 - i as u32);
    }
    Ok(Duration::new(secs, nanos))
}

/// Rounds a duration up to whole seconds.
///
/// Returned as `u128`: `Duration::MAX` rounds up past `u64::MAX`.
pub(crate) fn ceil_seconds(d: Duration) -> u128 {
    d.as_secs() as u128 + u128::from(d.subsec_nanos() > 0)
}
