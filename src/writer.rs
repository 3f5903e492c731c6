use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, trace, warn};

use crate::error::{EdfError, IoContext, Result};
use crate::header::encode_header;
use crate::types::{Header, RecordCount};
use crate::{BYTES_PER_SAMPLE, MAX_RECORD_BYTES};

/// Writes an EDF recording record by record.
///
/// [`create`](Self::create) writes a provisional header with an unknown
/// record count. [`close`](Self::close) rewrites it in place with the number
/// of records actually written. A file that is never closed keeps `-1` as its
/// record count.
///
/// # Examples
///
/// ```rust
/// use std::io::Cursor;
/// use std::time::Duration;
/// use chrono::{TimeZone, Utc};
/// use edfcodec::{EdfWriter, Header, RecordCount, SignalSpec, decode_header};
///
/// let start = Utc.with_ymd_and_hms(2024, 5, 17, 22, 15, 0).unwrap();
/// let header = Header::new(start, Duration::from_secs(1))
///     .with_patient_id("Patient X")
///     .with_signal(SignalSpec::new("EEG Fpz-Cz", (-500.0, 500.0), (-2048, 2047), 4));
///
/// let mut writer = EdfWriter::create(Cursor::new(Vec::new()), header)?;
/// writer.write_record(&[vec![0.0, 1.0, 2.0, 3.0]])?;
/// writer.write_record(&[vec![4.0, 5.0, 6.0, 7.0]])?;
/// let bytes = writer.close()?.into_inner();
///
/// assert_eq!(bytes.len(), 512 + 2 * 8);
/// assert_eq!(decode_header(&bytes)?.data_record_count, RecordCount::Known(2));
/// # Ok::<(), edfcodec::EdfError>(())
/// ```
///
/// # Failure
///
/// A failed [`write_record`](Self::write_record) may leave part of a record
/// in the sink. Treat the tail of the file as suspect and abort rather than
/// retry.
pub struct EdfWriter<W: Write + Seek> {
    sink: W,
    header: Header,
    records_written: u64,
}

impl EdfWriter<BufWriter<File>> {
    /// Creates the file at `path` and writes the provisional header.
    ///
    /// A missing parent directory is [`EdfError::FileNotFound`]; any other
    /// failure to create the file is [`EdfError::Io`].
    pub fn create_file<P: AsRef<Path>>(path: P, header: Header) -> Result<Self> {
        let path = path.as_ref();
        let file = match File::create(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(EdfError::FileNotFound(format!("{}: {}", path.display(), e)))
            }
            res => res.context(format!("creating {}", path.display()))?,
        };
        Self::create(BufWriter::new(file), header)
    }
}

impl<W: Write + Seek> EdfWriter<W> {
    /// Writes the provisional header at offset 0 of `sink`.
    ///
    /// The record count is reset to unknown; any value in `header` is
    /// ignored.
    pub fn create(sink: W, mut header: Header) -> Result<Self> {
        header.data_record_count = RecordCount::Unknown;
        let mut writer = EdfWriter {
            sink,
            header,
            records_written: 0,
        };
        writer.write_header()?;
        debug!(
            "created writer: {} signals, {} bytes per record",
            writer.header.signal_count(),
            writer.header.record_bytes()
        );
        Ok(writer)
    }

    /// The header as it will be finalized, apart from the record count.
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Appends one data record.
    ///
    /// `signals` holds one slice of physical values per signal, in header
    /// order. Each value is scaled to a digital code and stored as a
    /// little-endian `i16`, with channels packed back to back.
    ///
    /// # Errors
    ///
    /// * [`EdfError::SignalCountMismatch`] if `signals.len()` differs from the
    ///   header's signal count. Nothing is written.
    /// * [`EdfError::RecordTooLarge`] if the record would exceed
    ///   [`MAX_RECORD_BYTES`]. Nothing is written.
    /// * [`EdfError::Io`] if the sink fails.
    pub fn write_record<S: AsRef<[f64]>>(&mut self, signals: &[S]) -> Result<()> {
        let expected = self.header.signal_count();
        if signals.len() != expected {
            return Err(EdfError::SignalCountMismatch {
                expected,
                actual: signals.len(),
            });
        }

        let total_samples: usize = signals.iter().map(|s| s.as_ref().len()).sum();
        let bytes = total_samples * BYTES_PER_SAMPLE;
        if bytes > MAX_RECORD_BYTES {
            return Err(EdfError::RecordTooLarge {
                bytes,
                max: MAX_RECORD_BYTES,
            });
        }

        let mut record = Vec::with_capacity(bytes);
        for (index, (spec, samples)) in self.header.signals.iter().zip(signals).enumerate() {
            let samples = samples.as_ref();
            if samples.len() != spec.samples_per_record {
                warn!(
                    "record {}: signal {} ({}) has {} samples, header declares {}",
                    self.records_written,
                    index,
                    spec.label,
                    samples.len(),
                    spec.samples_per_record
                );
            }
            for &physical in samples {
                record.extend_from_slice(&spec.to_digital(physical).to_le_bytes());
            }
        }

        self.sink
            .write_all(&record)
            .context(format!("writing data record {}", self.records_written))?;
        self.records_written += 1;
        trace!("wrote data record {} ({} bytes)", self.records_written - 1, bytes);
        Ok(())
    }

    /// Records the final record count in the header and returns the sink.
    pub fn close(mut self) -> Result<W> {
        self.header.data_record_count = RecordCount::Known(self.records_written);
        self.write_header()?;
        self.sink.flush().context("flushing output")?;
        debug!("closed writer after {} data records", self.records_written);
        Ok(self.sink)
    }

    fn write_header(&mut self) -> Result<()> {
        let bytes = encode_header(&self.header)?;
        self.sink
            .seek(SeekFrom::Start(0))
            .context("seeking to header")?;
        self.sink.write_all(&bytes).context("writing header")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::decode_header;
    use crate::types::SignalSpec;
    use chrono::{TimeZone, Utc};
    use std::io::Cursor;
    use std::time::Duration;

    fn create_test_header(samples_per_record: usize) -> Header {
        let start = Utc.with_ymd_and_hms(2023, 11, 2, 6, 0, 0).unwrap();
        Header::new(start, Duration::from_secs(1))
            .with_signal(SignalSpec::new(
                "EEG",
                (-100.0, 100.0),
                (-32768, 32767),
                samples_per_record,
            ))
            .with_signal(SignalSpec::new("Resp", (0.0, 10.0), (0, 1000), 2))
    }

    #[test]
    fn test_provisional_header() {
        let writer = EdfWriter::create(Cursor::new(Vec::new()), create_test_header(4)).unwrap();
        let bytes = writer.sink.get_ref();
        assert_eq!(bytes.len(), 768);
        assert_eq!(&bytes[236..244], b"-1      ");
    }

    #[test]
    fn test_create_ignores_caller_record_count() {
        let mut header = create_test_header(4);
        header.data_record_count = RecordCount::Known(99);
        let writer = EdfWriter::create(Cursor::new(Vec::new()), header).unwrap();
        assert_eq!(writer.header().data_record_count, RecordCount::Unknown);
    }

    #[test]
    fn test_create_propagates_encode_error() {
        let mut header = create_test_header(4);
        header.signals[0].physical_dimension = "microvolts".to_string();
        let err = EdfWriter::create(Cursor::new(Vec::new()), header).err().unwrap();
        assert!(matches!(err, EdfError::FieldTooLong { field: "physical dimension", .. }));
    }

    #[test]
    fn test_record_layout() {
        let mut writer = EdfWriter::create(Cursor::new(Vec::new()), create_test_header(2)).unwrap();
        writer.write_record(&[vec![-100.0, 100.0], vec![0.0, 10.0]]).unwrap();
        let bytes = writer.close().unwrap().into_inner();

        let data = &bytes[768..];
        assert_eq!(data.len(), 8);
        assert_eq!(i16::from_le_bytes([data[0], data[1]]), -32768);
        assert_eq!(i16::from_le_bytes([data[2], data[3]]), 32767);
        assert_eq!(i16::from_le_bytes([data[4], data[5]]), 0);
        assert_eq!(i16::from_le_bytes([data[6], data[7]]), 1000);
    }

    #[test]
    fn test_signal_count_mismatch_writes_nothing() {
        let mut writer = EdfWriter::create(Cursor::new(Vec::new()), create_test_header(2)).unwrap();
        let err = writer.write_record(&[vec![0.0, 0.0]]).unwrap_err();
        assert!(matches!(err, EdfError::SignalCountMismatch { expected: 2, actual: 1 }));
        assert_eq!(writer.records_written(), 0);
        assert_eq!(writer.sink.get_ref().len(), 768);
    }

    #[test]
    fn test_record_too_large() {
        let mut writer =
            EdfWriter::create(Cursor::new(Vec::new()), create_test_header(30000)).unwrap();
        let big = vec![0.0; 30000];
        let small = vec![0.0; 721];
        // 30721 samples = 61442 bytes
        let err = writer.write_record(&[big.clone(), small]).unwrap_err();
        assert!(matches!(err, EdfError::RecordTooLarge { bytes: 61442, max: 61440 }));
        assert_eq!(writer.sink.get_ref().len(), 768);

        // exactly at the ceiling is fine
        writer.write_record(&[big, vec![0.0; 720]]).unwrap();
        assert_eq!(writer.records_written(), 1);
    }

    #[test]
    fn test_close_sets_record_count() {
        let mut writer = EdfWriter::create(Cursor::new(Vec::new()), create_test_header(2)).unwrap();
        for _ in 0..5 {
            writer.write_record(&[[1.0, 2.0], [3.0, 4.0]]).unwrap();
        }
        let bytes = writer.close().unwrap().into_inner();
        let header = decode_header(&bytes).unwrap();
        assert_eq!(header.data_record_count, RecordCount::Known(5));
        assert_eq!(bytes.len(), 768 + 5 * 8);
    }

    #[test]
    fn test_close_without_records() {
        let writer = EdfWriter::create(Cursor::new(Vec::new()), create_test_header(2)).unwrap();
        let bytes = writer.close().unwrap().into_inner();
        assert_eq!(decode_header(&bytes).unwrap().data_record_count, RecordCount::Known(0));
        assert_eq!(bytes.len(), 768);
    }

    #[test]
    fn test_accepts_slices() {
        let mut writer = EdfWriter::create(Cursor::new(Vec::new()), create_test_header(2)).unwrap();
        let eeg = [1.0, 2.0];
        let resp = vec![3.0, 4.0];
        writer.write_record(&[&eeg[..], resp.as_slice()]).unwrap();
        assert_eq!(writer.records_written(), 1);
    }
}
