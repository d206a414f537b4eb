//! Sensor log writer.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::types::{LogHeader, LogInfo, LogMessage, HEADER_SIZE};
use crate::error::{Result, SlamError};

/// Writes length-prefixed postcard messages; the header is filled in by
/// [`LogRecorder::finish`].
pub struct LogRecorder {
    writer: BufWriter<File>,
    path: PathBuf,
    message_count: u64,
    scan_count: u64,
    odometry_count: u64,
    fiducial_count: u64,
    start_time_us: Option<u64>,
    end_time_us: u64,
}

impl LogRecorder {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut writer = BufWriter::new(File::create(&path)?);
        writer.write_all(&[0u8; HEADER_SIZE])?;

        Ok(Self {
            writer,
            path,
            message_count: 0,
            scan_count: 0,
            odometry_count: 0,
            fiducial_count: 0,
            start_time_us: None,
            end_time_us: 0,
        })
    }

    pub fn record(&mut self, msg: &LogMessage) -> Result<()> {
        let timestamp = msg.timestamp_us();
        self.start_time_us.get_or_insert(timestamp);
        self.end_time_us = timestamp;

        let bytes = postcard::to_allocvec(msg)?;
        self.writer.write_all(&(bytes.len() as u32).to_le_bytes())?;
        self.writer.write_all(&bytes)?;

        match msg {
            LogMessage::Scan(_) => self.scan_count += 1,
            LogMessage::Odometry(_) => self.odometry_count += 1,
            LogMessage::Fiducials(_) => self.fiducial_count += 1,
        }
        self.message_count += 1;
        Ok(())
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Write the header and close the file.
    pub fn finish(mut self) -> Result<LogInfo> {
        self.writer.flush()?;
        self.writer.seek(SeekFrom::Start(0))?;

        let header = LogHeader {
            start_time_us: self.start_time_us.unwrap_or(0),
            end_time_us: self.end_time_us,
            message_count: self.message_count,
            ..LogHeader::new()
        };
        let header_bytes = postcard::to_allocvec(&header)?;
        if header_bytes.len() > HEADER_SIZE {
            return Err(SlamError::Codec(format!(
                "log header is {} bytes, limit {}",
                header_bytes.len(),
                HEADER_SIZE
            )));
        }
        let mut buffer = [0u8; HEADER_SIZE];
        buffer[..header_bytes.len()].copy_from_slice(&header_bytes);
        self.writer.write_all(&buffer)?;
        self.writer.flush()?;

        Ok(LogInfo {
            path: self.path,
            message_count: self.message_count,
            scan_count: self.scan_count,
            odometry_count: self.odometry_count,
            fiducial_count: self.fiducial_count,
            duration_us: header.duration_us(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{OdometrySample, Pose2D, RangeScan};
    use tempfile::TempDir;

    #[test]
    fn test_recorder_counts_by_kind() {
        let dir = TempDir::new().unwrap();
        let mut recorder = LogRecorder::create(dir.path().join("run.slog")).unwrap();

        for i in 0..4u64 {
            recorder
                .record(&LogMessage::Odometry(OdometrySample {
                    base_frame: "a/base_link".into(),
                    odom_frame: "a/odom".into(),
                    stamp_us: i * 20_000,
                    pose: Pose2D::new(i as f32 * 0.1, 0.0, 0.0),
                }))
                .unwrap();
        }
        recorder
            .record(&LogMessage::Scan(RangeScan::new("a/base_link", 80_000, 0, vec![1.0; 8])))
            .unwrap();

        let info = recorder.finish().unwrap();
        assert_eq!(info.message_count, 5);
        assert_eq!(info.odometry_count, 4);
        assert_eq!(info.scan_count, 1);
        assert_eq!(info.duration_us, 80_000);
    }
}
