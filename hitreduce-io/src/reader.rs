//! Memory-mapped event file readers.
//!
//! Event files are JSON lines: one [`RawEvent`] object per line. Blank lines
//! are skipped.

use crate::{Error, Result};
use hitreduce_core::RawEvent;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A memory-mapped file reader.
///
/// Uses memmap2 to efficiently access file contents without
/// loading the entire file into memory.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reader for JSON-lines event files.
pub struct EventFileReader {
    reader: MappedFileReader,
}

impl EventFileReader {
    /// Opens an event file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        if std::str::from_utf8(reader.as_bytes()).is_err() {
            return Err(Error::InvalidFormat(format!(
                "{} is not UTF-8 text",
                reader.path().display()
            )));
        }
        Ok(Self { reader })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Iterates over the events in file order.
    ///
    /// Each event is re-indexed before it is yielded.
    pub fn events(&self) -> EventIter<'_> {
        EventIter {
            remaining: self.reader.as_bytes(),
            line: 0,
        }
    }

    /// Reads every event.
    ///
    /// # Errors
    /// Returns the first malformed line.
    pub fn read_all(&self) -> Result<Vec<RawEvent>> {
        let events = self.events().collect::<Result<Vec<_>>>()?;
        log::debug!(
            "read {} events from {}",
            events.len(),
            self.reader.path().display()
        );
        Ok(events)
    }
}

/// Iterator over the events of an [`EventFileReader`].
pub struct EventIter<'a> {
    remaining: &'a [u8],
    line: usize,
}

impl Iterator for EventIter<'_> {
    type Item = Result<RawEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.remaining.is_empty() {
            let rest = self.remaining;
            let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
            let line = &rest[..end];
            self.remaining = rest.get(end + 1..).unwrap_or(&[]);
            self.line += 1;

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Some(
                serde_json::from_slice::<RawEvent>(line)
                    .map(|mut event| {
                        event.reindex();
                        event
                    })
                    .map_err(|source| Error::Parse {
                        line: self.line,
                        source,
                    }),
            );
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_mapped_file_reader() {
        let mut file = NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..64).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let reader = MappedFileReader::open(file.path()).unwrap();
        assert_eq!(reader.len(), 64);
        assert!(!reader.is_empty());
        assert_eq!(reader.as_bytes(), &data[..]);
    }

    #[test]
    fn test_event_file_reader_empty() {
        let file = NamedTempFile::new().unwrap();
        let reader = EventFileReader::open(file.path()).unwrap();
        assert_eq!(reader.file_size(), 0);
        assert!(reader.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_events_are_reindexed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"run_id":7,"hits":[{{"detector_id":4,"element_id":9,"tdc_time":1.0}},{{"detector_id":4,"element_id":2,"tdc_time":1.0}}]}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"event_id":3}}"#).unwrap();
        file.flush().unwrap();

        let events = EventFileReader::open(file.path())
            .unwrap()
            .read_all()
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].run_id, 7);
        assert_eq!(events[0].hits_in_plane(4)[0].element_id, 2);
        assert!(events[0].hits[0].in_time);
        assert_eq!(events[1].event_id, 3);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{}}").unwrap();
        writeln!(file, "{{\"hits\": 5}}").unwrap();
        file.flush().unwrap();

        let reader = EventFileReader::open(file.path()).unwrap();
        let err = reader.read_all().unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn test_non_utf8_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0xff, 0xfe, b'\n']).unwrap();
        file.flush().unwrap();
        assert!(matches!(
            EventFileReader::open(file.path()),
            Err(Error::InvalidFormat(_))
        ));
    }
}
