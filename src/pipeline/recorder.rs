//! Recording container: writer used by the device, reader for inspection
//!
//! Layout (little-endian):
//! header  = "ROSHIBAG" u16:version u8:count { u8:modality u8:format u32:w u32:h u32:rate }*
//! record  = u8:modality u64:sequence u64:timestamp_us u32:len payload

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::capture::{Frame, Modality, PixelFormat, StreamProfile};
use crate::pipeline::stats::StreamCounts;

pub const MAGIC: &[u8; 8] = b"ROSHIBAG";
pub const VERSION: u16 = 1;

const PROFILE_LEN: usize = 1 + 1 + 4 + 4 + 4;
const RECORD_HEADER_LEN: usize = 1 + 8 + 8 + 4;

/// Summary returned when a recording is closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingStats {
    pub frames: u64,
    pub bytes: u64,
}

/// Buffered container writer; owned by a single recorder thread
pub struct BagWriter {
    out: BufWriter<File>,
    path: PathBuf,
    stats: RecordingStats,
}

impl BagWriter {
    /// Create the file and write the stream table
    pub fn create(path: &Path, profiles: &[StreamProfile]) -> io::Result<Self> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);

        let mut header = BytesMut::with_capacity(MAGIC.len() + 3 + PROFILE_LEN * profiles.len());
        header.put_slice(MAGIC);
        header.put_u16_le(VERSION);
        header.put_u8(profiles.len() as u8);
        for p in profiles {
            header.put_u8(p.modality.tag());
            header.put_u8(p.format.tag());
            header.put_u32_le(p.width);
            header.put_u32_le(p.height);
            header.put_u32_le(p.rate_hz);
        }
        out.write_all(&header)?;

        Ok(Self {
            out,
            path: path.to_path_buf(),
            stats: RecordingStats {
                frames: 0,
                bytes: header.len() as u64,
            },
        })
    }

    pub fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        let mut head = BytesMut::with_capacity(RECORD_HEADER_LEN);
        head.put_u8(frame.modality().tag());
        head.put_u64_le(frame.meta.sequence);
        head.put_u64_le(frame.meta.device_timestamp.as_micros() as u64);
        head.put_u32_le(frame.data.len() as u32);

        self.out.write_all(&head)?;
        self.out.write_all(&frame.data)?;

        self.stats.frames += 1;
        self.stats.bytes += (head.len() + frame.data.len()) as u64;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.stats.frames
    }

    /// Flush and close; the file is complete once this returns
    pub fn finish(self) -> io::Result<RecordingStats> {
        let file = self.out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        debug!(
            "Closed {} ({} frames, {} bytes)",
            self.path.display(),
            self.stats.frames,
            self.stats.bytes
        );
        Ok(self.stats)
    }
}

/// Parsed recording: stream table plus frame counts
#[derive(Debug, Clone)]
pub struct BagContents {
    pub profiles: Vec<StreamProfile>,
    pub frames: StreamCounts,
}

pub struct BagReader;

impl BagReader {
    pub fn read(path: &Path) -> io::Result<BagContents> {
        Self::parse(Bytes::from(std::fs::read(path)?))
    }

    pub fn parse(mut buf: Bytes) -> io::Result<BagContents> {
        ensure(buf.remaining() >= MAGIC.len() + 3, "truncated header")?;
        ensure(&buf[..MAGIC.len()] == MAGIC, "not a roshi recording")?;
        buf.advance(MAGIC.len());
        let version = buf.get_u16_le();
        ensure(version == VERSION, "unsupported container version")?;

        let count = buf.get_u8() as usize;
        ensure(buf.remaining() >= count * PROFILE_LEN, "truncated stream table")?;
        let mut profiles = Vec::with_capacity(count);
        for _ in 0..count {
            let modality = Modality::from_tag(buf.get_u8()).ok_or_else(|| invalid("bad modality"))?;
            let format = PixelFormat::from_tag(buf.get_u8()).ok_or_else(|| invalid("bad format"))?;
            profiles.push(StreamProfile {
                modality,
                format,
                width: buf.get_u32_le(),
                height: buf.get_u32_le(),
                rate_hz: buf.get_u32_le(),
            });
        }

        let mut frames = StreamCounts::default();
        while buf.has_remaining() {
            ensure(buf.remaining() >= RECORD_HEADER_LEN, "truncated record")?;
            let modality = Modality::from_tag(buf.get_u8()).ok_or_else(|| invalid("bad modality"))?;
            let _sequence = buf.get_u64_le();
            let _timestamp_us = buf.get_u64_le();
            let len = buf.get_u32_le() as usize;
            ensure(buf.remaining() >= len, "truncated payload")?;
            buf.advance(len);
            frames.add(modality);
        }

        Ok(BagContents { profiles, frames })
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

fn ensure(cond: bool, msg: &str) -> io::Result<()> {
    if cond {
        Ok(())
    } else {
        Err(invalid(msg))
    }
}
