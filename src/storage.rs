// AquaLog — Persistent Reading Log
//
// Append-only, line-oriented CSV on the SPIFFS partition. Every append is
// open → write one line → sync → close, so a crash mid-write can lose at
// most the record being written, never earlier ones. The interior mutex
// serializes the controller's appends against the HTTP handlers' clear and
// read operations.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::events::Reading;

pub struct DataLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl DataLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// Append one reading as a `timestamp,distance` line.
    pub fn append(&self, reading: &Reading) -> io::Result<()> {
        let _guard = self.lock.lock().unwrap();
        let mut file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        writeln!(file, "{}", reading.csv_line())?;
        file.sync_all()?;
        Ok(())
    }

    /// Read the whole log back, oldest first. A missing store reads as empty.
    pub fn read_all(&self) -> io::Result<Vec<String>> {
        let _guard = self.lock.lock().unwrap();
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        BufReader::new(file).lines().collect()
    }

    /// Delete the store. Clearing an already-empty log is not an error.
    pub fn clear(&self) -> io::Result<()> {
        let _guard = self.lock.lock().unwrap();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::rtc::DateTime;

    fn temp_log(name: &str) -> DataLog {
        let path = std::env::temp_dir().join(format!("aqualog-{}-{}.csv", std::process::id(), name));
        let _ = fs::remove_file(&path);
        DataLog::new(path)
    }

    fn reading(second: u8, distance_cm: f32) -> Reading {
        Reading {
            timestamp: DateTime::new(2024, 3, 1, 12, 0, second),
            distance_cm,
        }
    }

    #[test]
    fn appends_read_back_in_order() {
        let log = temp_log("order");
        log.append(&reading(1, 10.5)).unwrap();
        log.append(&reading(2, 11.0)).unwrap();

        let lines = log.read_all().unwrap();
        assert_eq!(
            lines,
            vec![
                "2024-03-01 12:00:01,10.50".to_string(),
                "2024-03-01 12:00:02,11.00".to_string(),
            ]
        );
        log.clear().unwrap();
    }

    #[test]
    fn every_line_is_timestamp_comma_distance() {
        let log = temp_log("format");
        log.append(&reading(5, 42.0)).unwrap();

        for line in log.read_all().unwrap() {
            let (ts, dist) = line.split_once(',').expect("line has one comma");
            assert_eq!(ts.len(), "2024-03-01 12:00:05".len());
            dist.parse::<f32>().expect("distance parses as float");
        }
        log.clear().unwrap();
    }

    #[test]
    fn timestamps_are_non_decreasing() {
        let log = temp_log("monotonic");
        for s in [1u8, 2, 2, 7] {
            log.append(&reading(s, 1.0)).unwrap();
        }

        let stamps: Vec<String> = log
            .read_all()
            .unwrap()
            .iter()
            .map(|l| l.split_once(',').unwrap().0.to_string())
            .collect();
        let mut sorted = stamps.clone();
        sorted.sort();
        assert_eq!(stamps, sorted);
        log.clear().unwrap();
    }

    #[test]
    fn clear_then_read_is_empty() {
        let log = temp_log("clear");
        log.append(&reading(0, 1.0)).unwrap();
        log.clear().unwrap();
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn missing_store_reads_empty_and_clears_quietly() {
        let log = temp_log("missing");
        assert!(log.read_all().unwrap().is_empty());
        log.clear().unwrap();
    }
}
