//! Sensor log reader with optional real-time pacing.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::{Duration, Instant};

use super::types::{LogHeader, LogMessage, HEADER_SIZE, MAX_MESSAGE_BYTES};
use crate::error::{Result, SlamError};

pub struct LogPlayer {
    reader: BufReader<File>,
    header: LogHeader,
    /// Wall clock and log time of the first paced message
    timing: Option<(Instant, u64)>,
    /// 0 = as fast as possible
    speed: f32,
    messages_read: u64,
}

impl LogPlayer {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut buffer = [0u8; HEADER_SIZE];
        reader.read_exact(&mut buffer)?;

        let header: LogHeader = postcard::from_bytes(&buffer)
            .map_err(|e| SlamError::Codec(format!("unreadable log header: {}", e)))?;
        if !header.is_valid() {
            return Err(SlamError::Codec("not a sensor log".to_string()));
        }

        Ok(Self {
            reader,
            header,
            timing: None,
            speed: 0.0,
            messages_read: 0,
        })
    }

    pub fn header(&self) -> &LogHeader {
        &self.header
    }

    pub fn messages_read(&self) -> u64 {
        self.messages_read
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
    }

    /// Next message, ignoring recorded timing. `None` at end of file.
    pub fn next_immediate(&mut self) -> Result<Option<LogMessage>> {
        let mut len_bytes = [0u8; 4];
        match self.reader.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_bytes) as usize;
        if len > MAX_MESSAGE_BYTES {
            return Err(SlamError::Codec(format!("message too large: {} bytes", len)));
        }

        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload)?;
        let msg = postcard::from_bytes(&payload)?;
        self.messages_read += 1;
        Ok(Some(msg))
    }

    /// Next message, sleeping to reproduce recorded timing when a speed is set.
    pub fn next_paced(&mut self) -> Result<Option<LogMessage>> {
        let msg = self.next_immediate()?;
        if let Some(msg) = &msg
            && self.speed > 0.0
        {
            self.wait_for(msg.timestamp_us());
        }
        Ok(msg)
    }

    fn wait_for(&mut self, stamp_us: u64) {
        let Some((start, first_us)) = self.timing else {
            self.timing = Some((Instant::now(), stamp_us));
            return;
        };
        let offset_us = stamp_us.saturating_sub(first_us);
        let target = Duration::from_micros((offset_us as f64 / self.speed as f64) as u64);
        let elapsed = start.elapsed();
        if target > elapsed {
            std::thread::sleep(target - elapsed);
        }
    }
}

impl Iterator for LogPlayer {
    type Item = Result<LogMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_immediate().transpose()
    }
}
