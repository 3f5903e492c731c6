use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, warn};

use crate::error::{EdfError, IoContext, Result};
use crate::header::{log_warnings, read_header, DecodeWarning};
use crate::types::{Header, RecordCount, SignalSpec};
use crate::BYTES_PER_SAMPLE;

/// EDF file reader.
///
/// Holds the decoded header and the byte source. Per-signal sample streams
/// come from [`signal`](Self::signal).
///
/// # Examples
///
/// ```rust
/// use std::io::Cursor;
/// use std::time::Duration;
/// use chrono::{TimeZone, Utc};
/// use edfcodec::{EdfReader, EdfWriter, Header, SignalSpec};
///
/// # let start = Utc.with_ymd_and_hms(2024, 5, 17, 22, 15, 0).unwrap();
/// # let header = Header::new(start, Duration::from_secs(1))
/// #     .with_signal(SignalSpec::new("Flow", (-100.0, 100.0), (-32768, 32767), 8));
/// # let mut writer = EdfWriter::create(Cursor::new(Vec::new()), header)?;
/// # writer.write_record(&[vec![10.0; 8]])?;
/// # writer.write_record(&[vec![20.0; 8]])?;
/// # let bytes = writer.close()?.into_inner();
/// let mut reader = EdfReader::open(Cursor::new(bytes))?;
/// println!("Signals: {}", reader.header().signal_count());
///
/// let mut samples = vec![0.0; 16];
/// let read = reader.signal(0)?.read(&mut samples)?;
/// assert_eq!(read.count, 16);
/// assert!((samples[15] - 20.0).abs() < 0.01);
/// # Ok::<(), edfcodec::EdfError>(())
/// ```
pub struct EdfReader<R: Read + Seek> {
    source: R,
    header: Header,
    warnings: Vec<DecodeWarning>,
}

impl EdfReader<BufReader<File>> {
    /// Opens the file at `path` and decodes its header.
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(EdfError::FileNotFound(format!("{}: {}", path.display(), e)))
            }
            res => res.context(format!("opening {}", path.display()))?,
        };
        Self::open(BufReader::new(file))
    }
}

impl<R: Read + Seek> EdfReader<R> {
    /// Decodes the header at the start of `source`.
    ///
    /// A header still carrying an unknown record count (`-1`) is from a
    /// recording that was never closed. The count is then inferred from the
    /// length of `source`, ignoring a trailing partial record.
    pub fn open(mut source: R) -> Result<Self> {
        source.seek(SeekFrom::Start(0)).context("seeking to header")?;
        let (mut header, warnings) = read_header(&mut source)?;
        log_warnings(&warnings);

        if header.data_record_count == RecordCount::Unknown {
            let record_bytes = header.record_bytes() as u64;
            if record_bytes > 0 {
                let len = source.seek(SeekFrom::End(0)).context("measuring data length")?;
                let data = len.saturating_sub(header.header_bytes() as u64);
                let records = data / record_bytes;
                warn!(
                    "data record count is unknown, inferred {} records from file length",
                    records
                );
                header.data_record_count = RecordCount::Known(records);
            }
        }

        debug!(
            "opened reader: {} signals, records {:?}",
            header.signal_count(),
            header.data_record_count
        );
        Ok(EdfReader {
            source,
            header,
            warnings,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Recoverable problems found while decoding the header.
    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }

    /// Returns a reader for the signal at `index`, starting at its first
    /// sample.
    ///
    /// The returned reader borrows the source, so only one can be active at
    /// a time. Build [`SignalReader`]s directly over separate handles to read
    /// several signals side by side.
    pub fn signal(&mut self, index: usize) -> Result<SignalReader<&mut R>> {
        SignalReader::new(&mut self.source, &self.header, index)
    }

    pub fn into_inner(self) -> R {
        self.source
    }
}

/// Outcome of a [`SignalReader::read`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRead {
    /// Values written to the front of the buffer.
    pub count: usize,
    /// The last data record was exhausted before the buffer was filled.
    pub end_of_data: bool,
}

/// Sequential reader over the samples of one signal, across data records.
///
/// The record geometry is captured when the reader is built; later changes
/// to the header have no effect on it.
///
/// Each reader keeps its own position and seeks before every read, but it
/// does not coordinate with other users of the same `source`. Sharing one
/// handle between readers without external synchronization is the caller's
/// responsibility.
pub struct SignalReader<R> {
    source: R,
    signal: SignalSpec,
    header_bytes: u64,
    record_count: u64,
    /// Bytes in one data record across all signals.
    record_size: u64,
    /// Byte offset of this signal within a data record.
    signal_offset: u64,
    current_record: u64,
    current_sample: usize,
    buf: Vec<u8>,
}

impl<R: Read + Seek> SignalReader<R> {
    /// Fails with [`EdfError::SignalIndexOutOfRange`] if `index` is not a
    /// signal of `header`.
    pub fn new(source: R, header: &Header, index: usize) -> Result<Self> {
        let count = header.signal_count();
        let signal = header
            .signals
            .get(index)
            .ok_or(EdfError::SignalIndexOutOfRange { index, count })?
            .clone();

        let signal_offset: usize =
            header.signals[..index].iter().map(SignalSpec::record_bytes).sum();
        // An unknown count only survives here when the header was built by
        // hand; there is nothing to read in that case.
        let record_count = header.data_record_count.known().unwrap_or(0);

        Ok(SignalReader {
            source,
            signal,
            header_bytes: header.header_bytes() as u64,
            record_count,
            record_size: header.record_bytes() as u64,
            signal_offset: signal_offset as u64,
            current_record: 0,
            current_sample: 0,
            buf: Vec::new(),
        })
    }

    pub fn signal(&self) -> &SignalSpec {
        &self.signal
    }

    /// Index of the next sample within the whole signal.
    pub fn position(&self) -> u64 {
        self.current_record * self.signal.samples_per_record as u64 + self.current_sample as u64
    }

    /// Fills `out` with physical values, stopping early at the end of the
    /// data.
    ///
    /// Once `end_of_data` has been reported, later calls return a count of
    /// zero with `end_of_data` set.
    pub fn read(&mut self, out: &mut [f64]) -> Result<SampleRead> {
        self.read_with(out, SignalSpec::to_physical)
    }

    /// Like [`read`](Self::read), but yields the stored digital codes.
    pub fn read_digital(&mut self, out: &mut [i16]) -> Result<SampleRead> {
        self.read_with(out, |_, digital| digital)
    }

    /// Consumes the reader into an iterator of physical values.
    pub fn samples(self) -> Samples<R> {
        Samples {
            reader: self,
            done: false,
        }
    }

    fn read_with<T>(
        &mut self,
        out: &mut [T],
        convert: impl Fn(&SignalSpec, i16) -> T,
    ) -> Result<SampleRead> {
        let mut count = 0;
        while count < out.len() {
            let run = match self.fetch_run(out.len() - count)? {
                Some(run) => run,
                None => {
                    return Ok(SampleRead {
                        count,
                        end_of_data: true,
                    })
                }
            };
            let samples = self.buf.chunks_exact(BYTES_PER_SAMPLE);
            for (slot, pair) in out[count..count + run].iter_mut().zip(samples) {
                *slot = convert(&self.signal, i16::from_le_bytes([pair[0], pair[1]]));
            }
            count += run;
        }
        Ok(SampleRead {
            count,
            end_of_data: false,
        })
    }

    /// Reads up to `wanted` consecutive samples from the current record into
    /// `self.buf` and advances the cursor. Returns `None` at end of data.
    fn fetch_run(&mut self, wanted: usize) -> Result<Option<usize>> {
        let per_record = self.signal.samples_per_record;
        if self.current_record >= self.record_count || per_record == 0 {
            return Ok(None);
        }

        let run = wanted.min(per_record - self.current_sample);
        let pos = self.header_bytes
            + self.current_record * self.record_size
            + self.signal_offset
            + (self.current_sample * BYTES_PER_SAMPLE) as u64;

        self.source
            .seek(SeekFrom::Start(pos))
            .context(format!("seeking to sample at offset {}", pos))?;
        self.buf.resize(run * BYTES_PER_SAMPLE, 0);
        self.source
            .read_exact(&mut self.buf)
            .context(format!("reading data record {}", self.current_record))?;

        self.current_sample += run;
        if self.current_sample >= per_record {
            self.current_sample = 0;
            self.current_record += 1;
        }
        Ok(Some(run))
    }
}

/// Iterator over a signal's physical values.
///
/// Stops after the last sample or after the first error.
pub struct Samples<R> {
    reader: SignalReader<R>,
    done: bool,
}

impl<R: Read + Seek> Iterator for Samples<R> {
    type Item = Result<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut value = [0.0];
        match self.reader.read(&mut value) {
            Ok(SampleRead { count: 1, .. }) => Some(Ok(value[0])),
            Ok(_) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read + Seek> std::iter::FusedIterator for Samples<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::EdfWriter;
    use chrono::{TimeZone, Utc};
    use std::io::Cursor;
    use std::time::Duration;

    /// Two signals with distinct sample rates; sample values encode
    /// (record, signal, index) so demultiplexing errors are visible.
    fn create_two_signal_file(records: usize) -> Vec<u8> {
        let start = Utc.with_ymd_and_hms(2022, 7, 4, 9, 30, 0).unwrap();
        let header = Header::new(start, Duration::from_secs(1))
            .with_signal(SignalSpec::new("A", (-32768.0, 32767.0), (-32768, 32767), 3))
            .with_signal(SignalSpec::new("B", (-32768.0, 32767.0), (-32768, 32767), 2));
        let mut writer = EdfWriter::create(Cursor::new(Vec::new()), header).unwrap();
        for r in 0..records {
            let a: Vec<f64> = (0..3).map(|i| (r * 100 + i) as f64).collect();
            let b: Vec<f64> = (0..2).map(|i| -((r * 100 + i) as f64) - 1.0).collect();
            writer.write_record(&[a, b]).unwrap();
        }
        writer.close().unwrap().into_inner()
    }

    #[test]
    fn test_signal_index_out_of_range() {
        let mut reader = EdfReader::open(Cursor::new(create_two_signal_file(1))).unwrap();
        let err = reader.signal(2).err().unwrap();
        assert!(matches!(err, EdfError::SignalIndexOutOfRange { index: 2, count: 2 }));
    }

    #[test]
    fn test_demultiplexes_each_signal() {
        let bytes = create_two_signal_file(2);

        let mut a = SignalReader::new(Cursor::new(&bytes), &decode(&bytes), 0).unwrap();
        let mut codes = [0i16; 6];
        let read = a.read_digital(&mut codes).unwrap();
        assert_eq!(read, SampleRead { count: 6, end_of_data: false });
        assert_eq!(codes, [0, 1, 2, 100, 101, 102]);

        let mut b = SignalReader::new(Cursor::new(&bytes), &decode(&bytes), 1).unwrap();
        let mut codes = [0i16; 4];
        b.read_digital(&mut codes).unwrap();
        assert_eq!(codes, [-1, -2, -101, -102]);
    }

    #[test]
    fn test_physical_and_digital_reads_agree() {
        let start = Utc.with_ymd_and_hms(2022, 7, 4, 9, 30, 0).unwrap();
        let header = Header::new(start, Duration::from_secs(1))
            .with_signal(SignalSpec::new("Temp", (0.0, 10.0), (0, 1000), 4));
        let mut writer = EdfWriter::create(Cursor::new(Vec::new()), header).unwrap();
        writer.write_record(&[[0.0, 2.5, 5.0, 10.0]]).unwrap();
        writer.write_record(&[[1.0, 7.5, 0.0, 2.5]]).unwrap();
        let bytes = writer.close().unwrap().into_inner();
        let header = decode(&bytes);

        let mut physical = SignalReader::new(Cursor::new(&bytes), &header, 0).unwrap();
        let mut digital = SignalReader::new(Cursor::new(&bytes), &header, 0).unwrap();
        let mut values = [0.0; 3];
        let mut codes = [0i16; 3];
        loop {
            let p = physical.read(&mut values).unwrap();
            let d = digital.read_digital(&mut codes).unwrap();
            assert_eq!(p, d);
            for (value, code) in values[..p.count].iter().zip(&codes[..d.count]) {
                assert!((value - *code as f64 / 100.0).abs() < 1e-9);
            }
            if p.end_of_data {
                break;
            }
        }
        assert_eq!(physical.position(), 8);
        assert_eq!(digital.position(), 8);
    }

    #[test]
    fn test_end_of_data_mid_buffer() {
        let mut reader = EdfReader::open(Cursor::new(create_two_signal_file(2))).unwrap();
        let mut signal = reader.signal(1).unwrap();
        let mut out = [0.0; 10];
        let read = signal.read(&mut out).unwrap();
        assert_eq!(read, SampleRead { count: 4, end_of_data: true });
        let read = signal.read(&mut out).unwrap();
        assert_eq!(read, SampleRead { count: 0, end_of_data: true });
    }

    #[test]
    fn test_reads_across_record_boundaries_in_small_chunks() {
        let mut reader = EdfReader::open(Cursor::new(create_two_signal_file(3))).unwrap();
        let mut signal = reader.signal(0).unwrap();
        let mut all = Vec::new();
        let mut chunk = [0i16; 2];
        loop {
            let read = signal.read_digital(&mut chunk).unwrap();
            all.extend_from_slice(&chunk[..read.count]);
            if read.end_of_data {
                break;
            }
        }
        assert_eq!(all, [0, 1, 2, 100, 101, 102, 200, 201, 202]);
        assert_eq!(signal.position(), 9);
    }

    #[test]
    fn test_samples_iterator() {
        let mut reader = EdfReader::open(Cursor::new(create_two_signal_file(2))).unwrap();
        let values: Vec<f64> = reader.signal(1).unwrap().samples().collect::<Result<_>>().unwrap();
        assert_eq!(values.len(), 4);
        assert!((values[2] + 101.0).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_record_count_is_inferred() {
        let mut bytes = create_two_signal_file(3);
        bytes[236..244].copy_from_slice(b"-1      ");
        // trailing partial record is ignored
        bytes.extend_from_slice(&[0, 0, 0]);
        let reader = EdfReader::open(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.header().data_record_count, RecordCount::Known(3));
    }

    #[test]
    fn test_hand_built_unknown_count_reads_nothing() {
        let bytes = create_two_signal_file(1);
        let mut header = decode(&bytes);
        header.data_record_count = RecordCount::Unknown;
        let mut signal = SignalReader::new(Cursor::new(&bytes), &header, 0).unwrap();
        let read = signal.read(&mut [0.0; 3]).unwrap();
        assert_eq!(read, SampleRead { count: 0, end_of_data: true });
    }

    #[test]
    fn test_truncated_data_is_io_error() {
        let mut bytes = create_two_signal_file(2);
        bytes.truncate(bytes.len() - 4);
        let mut reader = EdfReader::open(Cursor::new(bytes)).unwrap();
        let mut signal = reader.signal(1).unwrap();
        let err = signal.read(&mut [0.0; 4]).unwrap_err();
        assert!(matches!(err, EdfError::Io { .. }));
    }

    #[test]
    fn test_empty_buffer_reads_nothing() {
        let mut reader = EdfReader::open(Cursor::new(create_two_signal_file(1))).unwrap();
        let read = reader.signal(0).unwrap().read(&mut []).unwrap();
        assert_eq!(read, SampleRead { count: 0, end_of_data: false });
    }

    fn decode(bytes: &[u8]) -> Header {
        crate::header::decode_header(bytes).unwrap()
    }
}
