//! Encoding and decoding of the fixed-width textual header.
//!
//! The header is a 256-byte block of recording fields followed by one
//! 256-byte block per signal. The signal section is stored field-major: all
//! labels, then all transducer types, and so on.

use std::io::Read;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc};
use log::{debug, warn};

use crate::error::{EdfError, IoContext, Result};
use crate::types::{Header, RecordCount, SignalSpec};
use crate::utils::{ceil_seconds, parse_int, parse_seconds, FieldReader, FieldWriter};
use crate::HEADER_BLOCK_BYTES;

const VERSION_WIDTH: usize = 8;
const PATIENT_ID_WIDTH: usize = 80;
const RECORDING_ID_WIDTH: usize = 80;
const START_DATE_WIDTH: usize = 8;
const START_TIME_WIDTH: usize = 8;
const HEADER_BYTES_WIDTH: usize = 8;
const RESERVED_WIDTH: usize = 44;
const RECORD_COUNT_WIDTH: usize = 8;
const RECORD_DURATION_WIDTH: usize = 8;
const SIGNAL_COUNT_WIDTH: usize = 4;

const LABEL_WIDTH: usize = 16;
const TRANSDUCER_WIDTH: usize = 80;
const DIMENSION_WIDTH: usize = 8;
const PHYSICAL_MIN_WIDTH: usize = 8;
const PHYSICAL_MAX_WIDTH: usize = 8;
const DIGITAL_MIN_WIDTH: usize = 8;
const DIGITAL_MAX_WIDTH: usize = 8;
const PREFILTERING_WIDTH: usize = 80;
const SAMPLES_WIDTH: usize = 8;
const SIGNAL_RESERVED_WIDTH: usize = 32;

/// Years a two-digit start date can name: `85..=99` are 19xx, the rest 20xx.
const FIRST_YEAR: i32 = 1985;
const LAST_YEAR: i32 = 2084;

/// Recoverable oddities found while decoding a header.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeWarning {
    /// A calibration field that could not be parsed and was read as `0`.
    CalibrationDefaulted {
        signal: usize,
        field: &'static str,
        raw: String,
    },
    /// The stored header size disagrees with the signal count. The layout
    /// implied by the signal count is used.
    HeaderBytesMismatch { stored: usize, expected: usize },
}

/// Encodes `header` into its fixed-width byte form.
///
/// The header size field is always recomputed from the signal list. Any field
/// whose text does not fit its width fails with [`EdfError::FieldTooLong`].
/// That includes a start date outside 1985..=2084, whose year cannot be
/// written in two digits and read back unchanged.
///
/// ```rust
/// use std::time::Duration;
/// use chrono::{TimeZone, Utc};
/// use edfcodec::{encode_header, Header, SignalSpec};
///
/// let start = Utc.with_ymd_and_hms(2024, 5, 17, 22, 15, 0).unwrap();
/// let header = Header::new(start, Duration::from_secs(1))
///     .with_signal(SignalSpec::new("EEG Fpz-Cz", (-500.0, 500.0), (-2048, 2047), 256));
///
/// let bytes = encode_header(&header)?;
/// assert_eq!(bytes.len(), 512);
/// assert_eq!(&bytes[168..184], b"17.05.2422.15.00");
/// # Ok::<(), edfcodec::EdfError>(())
/// ```
pub fn encode_header(header: &Header) -> Result<Vec<u8>> {
    let signals = &header.signals;
    let mut w = FieldWriter::with_capacity(header.header_bytes());

    w.text("version", VERSION_WIDTH, &header.version)?;
    w.text("patient id", PATIENT_ID_WIDTH, &header.patient_id)?;
    w.text("recording id", RECORDING_ID_WIDTH, &header.recording_id)?;

    let start = header.start;
    if !(FIRST_YEAR..=LAST_YEAR).contains(&start.year()) {
        return Err(EdfError::FieldTooLong {
            field: "start date",
            width: START_DATE_WIDTH,
            value: format!("{:02}.{:02}.{:04}", start.day(), start.month(), start.year()),
        });
    }
    let date = format!("{:02}.{:02}.{:02}", start.day(), start.month(), start.year() % 100);
    let time = format!("{:02}.{:02}.{:02}", start.hour(), start.minute(), start.second());
    w.text("start date", START_DATE_WIDTH, &date)?;
    w.text("start time", START_TIME_WIDTH, &time)?;

    w.int("header bytes", HEADER_BYTES_WIDTH, header.header_bytes())?;
    w.blank(RESERVED_WIDTH);
    w.int("data record count", RECORD_COUNT_WIDTH, header.data_record_count.to_wire())?;
    w.int(
        "data record duration",
        RECORD_DURATION_WIDTH,
        ceil_seconds(header.data_record_duration),
    )?;
    w.int("signal count", SIGNAL_COUNT_WIDTH, signals.len())?;

    for s in signals {
        w.text("label", LABEL_WIDTH, &s.label)?;
    }
    for s in signals {
        w.text("transducer type", TRANSDUCER_WIDTH, &s.transducer_type)?;
    }
    for s in signals {
        w.text("physical dimension", DIMENSION_WIDTH, &s.physical_dimension)?;
    }
    for s in signals {
        w.physical("physical min", PHYSICAL_MIN_WIDTH, s.physical_min)?;
    }
    for s in signals {
        w.physical("physical max", PHYSICAL_MAX_WIDTH, s.physical_max)?;
    }
    for s in signals {
        w.int("digital min", DIGITAL_MIN_WIDTH, s.digital_min)?;
    }
    for s in signals {
        w.int("digital max", DIGITAL_MAX_WIDTH, s.digital_max)?;
    }
    for s in signals {
        w.text("prefiltering", PREFILTERING_WIDTH, &s.prefiltering)?;
    }
    for s in signals {
        w.int("samples per record", SAMPLES_WIDTH, s.samples_per_record)?;
    }
    for s in signals {
        w.text("signal reserved", SIGNAL_RESERVED_WIDTH, &s.reserved)?;
    }

    debug_assert_eq!(w.len(), header.header_bytes());
    debug!(
        "encoded header: {} signals, {} bytes, records {:?}",
        signals.len(),
        w.len(),
        header.data_record_count
    );
    Ok(w.into_bytes())
}

/// Decodes a header from `bytes`, logging any [`DecodeWarning`]s.
///
/// `bytes` may extend past the header; only the first `header_bytes` are
/// read.
pub fn decode_header(bytes: &[u8]) -> Result<Header> {
    let (header, warnings) = decode_header_with_warnings(bytes)?;
    log_warnings(&warnings);
    Ok(header)
}

/// Decodes a header and reports what was recovered from along the way.
///
/// Physical and digital min/max that fail to parse are read as `0` instead of
/// failing the whole decode. A parseable header size that disagrees with the
/// signal count is reported and otherwise ignored. Every other numeric field
/// is strict.
pub fn decode_header_with_warnings(bytes: &[u8]) -> Result<(Header, Vec<DecodeWarning>)> {
    let mut r = FieldReader::new(bytes);

    let version = r.text("version", VERSION_WIDTH)?;
    let patient_id = r.text("patient id", PATIENT_ID_WIDTH)?;
    let recording_id = r.text("recording id", RECORDING_ID_WIDTH)?;
    let date = r.text("start date", START_DATE_WIDTH)?;
    let time = r.text("start time", START_TIME_WIDTH)?;
    let start = parse_start(&date, &time)?;

    let header_bytes: usize =
        parse_int("header bytes", &r.text("header bytes", HEADER_BYTES_WIDTH)?)?;
    r.skip("reserved", RESERVED_WIDTH)?;

    let record_count_text = r.text("data record count", RECORD_COUNT_WIDTH)?;
    let data_record_count = match parse_int::<i64>("data record count", &record_count_text)? {
        -1 => RecordCount::Unknown,
        n if n >= 0 => RecordCount::Known(n as u64),
        n => {
            return Err(EdfError::MalformedHeader(format!(
                "negative data record count: {}",
                n
            )))
        }
    };

    let data_record_duration: Duration = parse_seconds(
        "data record duration",
        &r.text("data record duration", RECORD_DURATION_WIDTH)?,
    )?;
    let signal_count: usize =
        parse_int("signal count", &r.text("signal count", SIGNAL_COUNT_WIDTH)?)?;

    let mut warnings = Vec::new();
    let expected = HEADER_BLOCK_BYTES * (signal_count + 1);
    if header_bytes != expected {
        warnings.push(DecodeWarning::HeaderBytesMismatch {
            stored: header_bytes,
            expected,
        });
    }
    if bytes.len() < expected {
        return Err(EdfError::MalformedHeader(format!(
            "header truncated: {} of {} bytes",
            bytes.len(),
            expected
        )));
    }

    let mut signals: Vec<SignalSpec> = (0..signal_count)
        .map(|_| SignalSpec::new("", (0.0, 0.0), (0, 0), 0))
        .collect();

    for s in signals.iter_mut() {
        s.label = r.text("label", LABEL_WIDTH)?;
    }
    for s in signals.iter_mut() {
        s.transducer_type = r.text("transducer type", TRANSDUCER_WIDTH)?;
    }
    for s in signals.iter_mut() {
        s.physical_dimension = r.text("physical dimension", DIMENSION_WIDTH)?;
    }
    for (i, s) in signals.iter_mut().enumerate() {
        let raw = r.text("physical min", PHYSICAL_MIN_WIDTH)?;
        s.physical_min = lenient(&mut warnings, i, "physical min", raw);
    }
    for (i, s) in signals.iter_mut().enumerate() {
        let raw = r.text("physical max", PHYSICAL_MAX_WIDTH)?;
        s.physical_max = lenient(&mut warnings, i, "physical max", raw);
    }
    for (i, s) in signals.iter_mut().enumerate() {
        let raw = r.text("digital min", DIGITAL_MIN_WIDTH)?;
        s.digital_min = lenient(&mut warnings, i, "digital min", raw);
    }
    for (i, s) in signals.iter_mut().enumerate() {
        let raw = r.text("digital max", DIGITAL_MAX_WIDTH)?;
        s.digital_max = lenient(&mut warnings, i, "digital max", raw);
    }
    for s in signals.iter_mut() {
        s.prefiltering = r.text("prefiltering", PREFILTERING_WIDTH)?;
    }
    for s in signals.iter_mut() {
        let raw = r.text("samples per record", SAMPLES_WIDTH)?;
        s.samples_per_record = parse_int("samples per record", &raw)?;
    }
    for s in signals.iter_mut() {
        s.reserved = r.text("signal reserved", SIGNAL_RESERVED_WIDTH)?;
    }

    debug!(
        "decoded header: {} signals, {} bytes, records {:?}",
        signal_count,
        r.position(),
        data_record_count
    );

    let header = Header {
        version,
        patient_id,
        recording_id,
        start,
        data_record_duration,
        data_record_count,
        signals,
    };
    Ok((header, warnings))
}

/// Reads and decodes a header from the current position of `reader`.
///
/// The fixed block is read first to learn the signal count, then the signal
/// section. On return the reader is positioned at the first data record.
pub fn read_header<R: Read>(reader: &mut R) -> Result<(Header, Vec<DecodeWarning>)> {
    let mut bytes = vec![0u8; HEADER_BLOCK_BYTES];
    reader.read_exact(&mut bytes).context("reading header")?;

    let count_start = HEADER_BLOCK_BYTES - SIGNAL_COUNT_WIDTH;
    let count_text = String::from_utf8_lossy(&bytes[count_start..]);
    let signal_count: usize = parse_int("signal count", count_text.trim())?;

    let signal_bytes = signal_count.checked_mul(HEADER_BLOCK_BYTES).ok_or_else(|| {
        EdfError::MalformedHeader(format!("signal count {} too large", signal_count))
    })?;
    bytes.resize(HEADER_BLOCK_BYTES + signal_bytes, 0);
    reader
        .read_exact(&mut bytes[HEADER_BLOCK_BYTES..])
        .context("reading signal headers")?;

    decode_header_with_warnings(&bytes)
}

pub(crate) fn log_warnings(warnings: &[DecodeWarning]) {
    for warning in warnings {
        match warning {
            DecodeWarning::CalibrationDefaulted { signal, field, raw } => {
                warn!("signal {}: {} {:?} is not a number, using 0", signal, field, raw);
            }
            DecodeWarning::HeaderBytesMismatch { stored, expected } => {
                warn!("header bytes field is {} but the signal count implies {}", stored, expected);
            }
        }
    }
}

fn lenient<T: std::str::FromStr + Default>(
    warnings: &mut Vec<DecodeWarning>,
    signal: usize,
    field: &'static str,
    raw: String,
) -> T {
    match raw.parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            warnings.push(DecodeWarning::CalibrationDefaulted { signal, field, raw });
            T::default()
        }
    }
}

fn parse_start(date: &str, time: &str) -> Result<DateTime<Utc>> {
    let malformed = |what: &str, s: &str| {
        EdfError::MalformedHeader(format!("invalid start {}: {:?}", what, s))
    };

    let [day, month, yy] = split_triplet(date).ok_or_else(|| malformed("date", date))?;
    let yy = yy as i32;
    let year = if yy >= FIRST_YEAR % 100 { 1900 + yy } else { 2000 + yy };
    let date_part =
        NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| malformed("date", date))?;

    let [hour, minute, second] = split_triplet(time).ok_or_else(|| malformed("time", time))?;
    let time_part =
        NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| malformed("time", time))?;

    Ok(date_part.and_time(time_part).and_utc())
}

/// Splits `aa.bb.cc` into three two-digit numbers.
fn split_triplet(s: &str) -> Option<[u32; 3]> {
    let mut out = [0u32; 3];
    let mut parts = s.split('.');
    for slot in out.iter_mut() {
        let part = parts.next()?;
        if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = part.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}
