use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::sample::{digital_to_physical, physical_to_digital};
use crate::{BYTES_PER_SAMPLE, HEADER_BLOCK_BYTES, VERSION_0};

/// Number of data records in a file.
///
/// Encoded as `-1` on the wire while a recording is still being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordCount {
    #[default]
    Unknown,
    Known(u64),
}

impl RecordCount {
    /// Returns the count, if known.
    pub fn known(self) -> Option<u64> {
        match self {
            RecordCount::Known(n) => Some(n),
            RecordCount::Unknown => None,
        }
    }

    pub(crate) fn to_wire(self) -> i64 {
        match self {
            RecordCount::Known(n) => n as i64,
            RecordCount::Unknown => -1,
        }
    }
}

/// Calibration and layout of one signal channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSpec {
    pub label: String,
    pub transducer_type: String,
    /// Physical unit, e.g. `uV`.
    pub physical_dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefiltering: String,
    /// Samples of this signal in each data record.
    pub samples_per_record: usize,
    pub reserved: String,
}

impl SignalSpec {
    pub fn new(
        label: &str,
        physical_range: (f64, f64),
        digital_range: (i32, i32),
        samples_per_record: usize,
    ) -> Self {
        SignalSpec {
            label: label.to_string(),
            transducer_type: String::new(),
            physical_dimension: String::new(),
            physical_min: physical_range.0,
            physical_max: physical_range.1,
            digital_min: digital_range.0,
            digital_max: digital_range.1,
            prefiltering: String::new(),
            samples_per_record,
            reserved: String::new(),
        }
    }

    pub fn with_transducer_type(mut self, transducer_type: &str) -> Self {
        self.transducer_type = transducer_type.to_string();
        self
    }

    pub fn with_physical_dimension(mut self, dimension: &str) -> Self {
        self.physical_dimension = dimension.to_string();
        self
    }

    pub fn with_prefiltering(mut self, prefiltering: &str) -> Self {
        self.prefiltering = prefiltering.to_string();
        self
    }

    /// Bytes this signal occupies in each data record.
    pub fn record_bytes(&self) -> usize {
        self.samples_per_record * BYTES_PER_SAMPLE
    }

    /// Converts a stored digital code to a physical value.
    pub fn to_physical(&self, digital_value: i16) -> f64 {
        digital_to_physical(
            digital_value,
            self.digital_min,
            self.digital_max,
            self.physical_min,
            self.physical_max,
        )
    }

    /// Converts a physical value to the digital code that would be stored.
    pub fn to_digital(&self, physical_value: f64) -> i16 {
        physical_to_digital(
            physical_value,
            self.physical_min,
            self.physical_max,
            self.digital_min,
            self.digital_max,
        )
    }
}

/// Recording-level header.
///
/// The header size and signal count are derived from `signals` rather than
/// stored, so they cannot drift from the signal list.
///
/// Once an [`EdfWriter`](crate::EdfWriter) or
/// [`SignalReader`](crate::SignalReader) has been built from a header, the
/// signal geometry it captured is fixed. Changing `signals` afterwards does
/// not affect them and must not be relied upon.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub version: String,
    pub patient_id: String,
    pub recording_id: String,
    /// Start of the recording. The file carries no timezone; UTC is assumed.
    pub start: DateTime<Utc>,
    pub data_record_duration: Duration,
    pub data_record_count: RecordCount,
    /// Signals in interleaving order.
    pub signals: Vec<SignalSpec>,
}

impl Header {
    pub fn new(start: DateTime<Utc>, data_record_duration: Duration) -> Self {
        Header {
            version: VERSION_0.to_string(),
            patient_id: String::new(),
            recording_id: String::new(),
            start,
            data_record_duration,
            data_record_count: RecordCount::Unknown,
            signals: Vec::new(),
        }
    }

    pub fn with_patient_id(mut self, patient_id: &str) -> Self {
        self.patient_id = patient_id.to_string();
        self
    }

    pub fn with_recording_id(mut self, recording_id: &str) -> Self {
        self.recording_id = recording_id.to_string();
        self
    }

    pub fn with_signal(mut self, signal: SignalSpec) -> Self {
        self.signals.push(signal);
        self
    }

    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// Size of the encoded header: one 256-byte block plus one per signal.
    pub fn header_bytes(&self) -> usize {
        HEADER_BLOCK_BYTES * (self.signal_count() + 1)
    }

    /// Bytes in one data record across all signals.
    pub fn record_bytes(&self) -> usize {
        self.signals.iter().map(SignalSpec::record_bytes).sum()
    }

    /// Total recording length, when the record count is known.
    pub fn duration(&self) -> Option<Duration> {
        let records = self.data_record_count.known()?;
        u32::try_from(records)
            .ok()
            .and_then(|n| self.data_record_duration.checked_mul(n))
    }
}
