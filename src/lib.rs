//! # EDF codec for Rust
//!
//! Reader and writer for EDF (European Data Format) biosignal recordings: a
//! fixed-width ASCII header describing the signals, followed by fixed-size
//! data records of interleaved 16-bit samples.
//!
//! ## Quick Start
//!
//! ### Writing a recording
//!
//! ```rust
//! use std::io::Cursor;
//! use std::time::Duration;
//! use chrono::{TimeZone, Utc};
//! use edfcodec::{EdfWriter, Header, SignalSpec, Result};
//!
//! fn main() -> Result<()> {
//!     let start = Utc.with_ymd_and_hms(2024, 5, 17, 22, 15, 0).unwrap();
//!     let header = Header::new(start, Duration::from_secs(1))
//!         .with_patient_id("Patient X")
//!         .with_recording_id("Recording 1")
//!         .with_signal(
//!             SignalSpec::new("EEG Fpz-Cz", (-500.0, 500.0), (-2048, 2047), 256)
//!                 .with_transducer_type("AgAgCl electrode")
//!                 .with_physical_dimension("uV"),
//!         );
//!
//!     let mut writer = EdfWriter::create(Cursor::new(Vec::new()), header)?;
//!     for second in 0..10 {
//!         let samples: Vec<f64> = (0..256)
//!             .map(|i| {
//!                 let t = (second * 256 + i) as f64 / 256.0;
//!                 50.0 * (2.0 * std::f64::consts::PI * 10.0 * t).sin()
//!             })
//!             .collect();
//!         writer.write_record(&[samples])?;
//!     }
//!     let file = writer.close()?;
//!     assert_eq!(file.get_ref().len(), 512 + 10 * 512);
//!     Ok(())
//! }
//! ```
//!
//! ### Reading a signal
//!
//! ```rust
//! use std::io::Cursor;
//! # use std::time::Duration;
//! # use chrono::{TimeZone, Utc};
//! use edfcodec::{EdfReader, Result};
//! # use edfcodec::{EdfWriter, Header, SignalSpec};
//!
//! fn main() -> Result<()> {
//!     # let start = Utc.with_ymd_and_hms(2024, 5, 17, 22, 15, 0).unwrap();
//!     # let header = Header::new(start, Duration::from_secs(1))
//!     #     .with_signal(SignalSpec::new("EEG", (-500.0, 500.0), (-2048, 2047), 256));
//!     # let mut writer = EdfWriter::create(Cursor::new(Vec::new()), header)?;
//!     # writer.write_record(&[vec![0.0; 256]])?;
//!     # let bytes = writer.close()?.into_inner();
//!     let mut reader = EdfReader::open(Cursor::new(bytes))?;
//!     for (i, signal) in reader.header().signals.iter().enumerate() {
//!         println!("Signal {}: {} ({})", i, signal.label, signal.physical_dimension);
//!     }
//!
//!     let mut samples = vec![0.0; 1000];
//!     let read = reader.signal(0)?.read(&mut samples)?;
//!     println!("Read {} samples, end of data: {}", read.count, read.end_of_data);
//!     Ok(())
//! }
//! ```
//!
//! ## Physical vs Digital Values
//!
//! Samples are stored as 16-bit integers scaled linearly between a signal's
//! digital and physical bounds. See [`sample`] for the exact rules.
//!
//! ```rust
//! use edfcodec::SignalSpec;
//!
//! let signal = SignalSpec::new("Test Signal", (-100.0, 100.0), (-32768, 32767), 256);
//! let physical = signal.to_physical(16384);
//! assert!((physical - 50.0).abs() < 0.1);
//! let digital = signal.to_digital(25.0);
//! assert!((digital as i32 - 8192).abs() <= 1);
//! ```

pub mod error;
pub mod header;
pub mod reader;
pub mod sample;
pub mod types;
mod utils;
pub mod writer;

pub use error::{EdfError, Result};
pub use header::{
    decode_header, decode_header_with_warnings, encode_header, read_header, DecodeWarning,
};
pub use reader::{EdfReader, SampleRead, Samples, SignalReader};
pub use types::{Header, RecordCount, SignalSpec};
pub use writer::EdfWriter;

/// Size of the fixed header block, and of each signal's share of the header.
pub const HEADER_BLOCK_BYTES: usize = 256;
/// Every sample is a little-endian `i16`.
pub const BYTES_PER_SAMPLE: usize = 2;
/// Largest data record the writer will emit.
pub const MAX_RECORD_BYTES: usize = 61_440;
/// Version tag written by this crate.
pub const VERSION_0: &str = "0";

/// Library version
///
/// ```rust
/// assert!(edfcodec::version().contains('.'));
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
