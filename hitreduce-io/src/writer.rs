//! Event and summary file writers.

use crate::Result;
use hitreduce_core::RawEvent;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writer for JSON-lines event files.
pub struct EventFileWriter {
    writer: BufWriter<File>,
    written: usize,
}

impl EventFileWriter {
    /// Creates a new event file, truncating any existing one.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Appends one event as a single line.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn write_event(&mut self, event: &RawEvent) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Appends events in order.
    ///
    /// # Errors
    /// Returns an error if serialization or a write fails.
    pub fn write_events(&mut self, events: &[RawEvent]) -> Result<()> {
        for event in events {
            self.write_event(event)?;
        }
        Ok(())
    }

    /// Number of events written so far.
    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// One row of a reduction summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SummaryRecord {
    /// Run number.
    pub run: u32,
    /// Spill number.
    pub spill: u32,
    /// Event number.
    pub event: u32,
    /// Hits before reduction.
    pub hits_before: usize,
    /// Hits after reduction.
    pub hits_after: usize,
    /// Chamber hits removed.
    pub removed: usize,
}

/// CSV writer for per-event reduction summaries.
pub struct SummaryWriter {
    writer: BufWriter<File>,
}

impl SummaryWriter {
    /// CSV header line.
    pub const HEADER: &'static str = "run,spill,event,hits_before,hits_after,removed";

    /// Creates the summary file and writes the header.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", Self::HEADER)?;
        Ok(Self { writer })
    }

    /// Appends one row.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn write_record(&mut self, record: &SummaryRecord) -> Result<()> {
        writeln!(
            self.writer,
            "{},{},{},{},{},{}",
            record.run,
            record.spill,
            record.event,
            record.hits_before,
            record.hits_after,
            record.removed
        )?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hitreduce_core::Hit;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_events_as_lines() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = EventFileWriter::create(file.path()).unwrap();

        let events = vec![
            RawEvent::new(vec![Hit::new(3, 5, 12.5)], Vec::new()).with_ids(1, 2, 3),
            RawEvent::default().with_ids(1, 2, 4),
        ];
        writer.write_events(&events).unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.written(), 2);

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"detector_id\":3"));
        assert!(lines[1].contains("\"event_id\":4"));
    }

    #[test]
    fn test_write_summary_csv() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = SummaryWriter::create(file.path()).unwrap();
        writer
            .write_record(&SummaryRecord {
                run: 1,
                spill: 2,
                event: 3,
                hits_before: 40,
                hits_after: 31,
                removed: 8,
            })
            .unwrap();
        writer.flush().unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.starts_with(SummaryWriter::HEADER));
        assert!(content.contains("1,2,3,40,31,8"));
    }
}
