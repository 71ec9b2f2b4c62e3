//! Motion-JPEG in an AVI container, playable by about anything.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::video::VideoSink;
use crate::{Error, Frame, Result};

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;
const FRAME_CHUNK: &[u8; 4] = b"00dc";
/// Bytes of one `idx1` entry.
const INDEX_ENTRY: u64 = 16;

// Header fields that are only known once every frame is written.
const RIFF_SIZE_AT: u64 = 4;
const MAX_BYTES_PER_SEC_AT: u64 = 36;
const AVIH_BUFFER_AT: u64 = 60;
const STRH_BUFFER_AT: u64 = 144;
const MOVI_SIZE_AT: u64 = 216;
/// Where the first frame chunk starts.
const MOVI_DATA_AT: u64 = 224;

/// Writes videos as Motion-JPEG AVI files. Frames are encoded and written
/// one at a time, the headers are patched at the end.
#[derive(Copy, Clone, Debug)]
pub struct MjpegWriter {
    quality: u8,
    max_size: u64,
}

impl Default for MjpegWriter {
    fn default() -> Self { Self::new(90) }
}

impl MjpegWriter {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            max_size: u64::from(u32::MAX),
        }
    }

    /// Set the JPEG quality of every frame, 1 to 100.
    pub fn set_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Set the largest file, in bytes, the writer may produce. It can't go
    /// past the 4 GiB a RIFF file can address.
    pub fn set_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size.min(u64::from(u32::MAX));
        self
    }

    fn encode(&self, frame: &Frame, buf: &mut Vec<u8>) -> Result<()> {
        buf.clear();
        JpegEncoder::new_with_quality(&mut *buf, self.quality).encode(
            frame.as_raw(),
            frame.width(),
            frame.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(())
    }

    const fn too_large(&self) -> Error {
        Error::VideoTooLarge {
            limit: self.max_size,
        }
    }

    fn checked_u32(&self, value: u64) -> Result<u32> {
        u32::try_from(value).map_err(|_| self.too_large())
    }

    /// Streams the whole file to `out`, returns its size.
    fn write_avi<W: Write + Seek>(
        &self,
        out: &mut W,
        width: u32,
        height: u32,
        fps: u32,
        frames: &[Frame],
    ) -> Result<u64> {
        let count = u32::try_from(frames.len()).map_err(|_| {
            Error::Configuration(format!("{} frames", frames.len()))
        })?;
        let rect = |side: u32| {
            u16::try_from(side).map_err(|_| {
                Error::Configuration(format!(
                    "{}x{} is too large for an AVI frame",
                    width, height
                ))
            })
        };
        let header = Header {
            width,
            height,
            rect: (rect(width)?, rect(height)?),
            fps,
            frames: count,
        };
        let hdrl = list(b"LIST", b"hdrl", &[
            chunk(b"avih", &header.avih()),
            list(b"LIST", b"strl", &[
                chunk(b"strh", &header.strh()),
                chunk(b"strf", &header.strf()),
            ]),
        ]);
        debug_assert_eq!(hdrl.len() as u64 + 12, MOVI_SIZE_AT - 4);
        out.write_all(b"RIFF")?;
        out.write_all(&0u32.to_le_bytes())?;
        out.write_all(b"AVI ")?;
        out.write_all(&hdrl)?;
        out.write_all(b"LIST")?;
        out.write_all(&0u32.to_le_bytes())?;
        out.write_all(b"movi")?;

        let mut written = MOVI_DATA_AT;
        let mut largest = 0u32;
        let mut index = Vec::with_capacity(frames.len() * 16);
        let mut jpeg = Vec::new();
        for (i, frame) in frames.iter().enumerate() {
            self.encode(frame, &mut jpeg)?;
            let len = self.checked_u32(jpeg.len() as u64)?;
            let padded = u64::from(len) + u64::from(len % 2);
            let indexed = (i as u64 + 1) * INDEX_ENTRY;
            if written + 8 + padded + 8 + indexed > self.max_size {
                return Err(self.too_large());
            }
            // Offsets count from the `movi` fourcc.
            let offset = self.checked_u32(written - (MOVI_DATA_AT - 4))?;
            out.write_all(FRAME_CHUNK)?;
            out.write_all(&len.to_le_bytes())?;
            out.write_all(&jpeg)?;
            if len % 2 == 1 {
                out.write_all(&[0])?;
            }
            written += 8 + padded;
            largest = largest.max(len);
            index.extend_from_slice(FRAME_CHUNK);
            put_u32(&mut index, AVIIF_KEYFRAME);
            put_u32(&mut index, offset);
            put_u32(&mut index, len);
        }
        let movi_size = self.checked_u32(written - (MOVI_SIZE_AT + 4))?;
        out.write_all(b"idx1")?;
        out.write_all(&self.checked_u32(index.len() as u64)?.to_le_bytes())?;
        out.write_all(&index)?;
        written += 8 + index.len() as u64;
        let riff_size = self.checked_u32(written - 8)?;

        let patches = [
            (RIFF_SIZE_AT, riff_size),
            (MOVI_SIZE_AT, movi_size),
            (MAX_BYTES_PER_SEC_AT, largest.saturating_mul(fps)),
            (AVIH_BUFFER_AT, largest),
            (STRH_BUFFER_AT, largest),
        ];
        for (at, value) in patches.iter() {
            out.seek(SeekFrom::Start(*at))?;
            out.write_all(&value.to_le_bytes())?;
        }
        out.seek(SeekFrom::Start(written))?;
        Ok(written)
    }
}

impl VideoSink for MjpegWriter {
    fn write_video(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
        frames: &[Frame],
    ) -> Result<()> {
        if frames.is_empty() {
            return Err(Error::EmptyVideo);
        }
        let mut out = BufWriter::new(File::create(path)?);
        let written = self
            .write_avi(&mut out, width, height, fps, frames)
            .and_then(|size| {
                out.flush()?;
                Ok(size)
            });
        drop(out);
        match written {
            Ok(size) => {
                log::debug!(
                    "wrote {} bytes of mjpeg to {}",
                    size,
                    path.display()
                );
                Ok(())
            },
            Err(e) => {
                if let Err(rm) = std::fs::remove_file(path) {
                    log::warn!("could not remove {}: {}", path.display(), rm);
                }
                Err(e)
            },
        }
    }
}

struct Header {
    width: u32,
    height: u32,
    rect: (u16, u16),
    fps: u32,
    frames: u32,
}

impl Header {
    fn avih(&self) -> Vec<u8> {
        let mut b = Vec::with_capacity(56);
        put_u32(&mut b, 1_000_000 / self.fps.max(1));
        // Max bytes per second, patched.
        put_u32(&mut b, 0);
        put_u32(&mut b, 0);
        put_u32(&mut b, AVIF_HASINDEX);
        put_u32(&mut b, self.frames);
        put_u32(&mut b, 0);
        put_u32(&mut b, 1);
        // Suggested buffer size, patched.
        put_u32(&mut b, 0);
        put_u32(&mut b, self.width);
        put_u32(&mut b, self.height);
        b.extend_from_slice(&[0; 16]);
        b
    }

    fn strh(&self) -> Vec<u8> {
        let mut b = Vec::with_capacity(56);
        b.extend_from_slice(b"vids");
        b.extend_from_slice(b"MJPG");
        put_u32(&mut b, 0);
        put_u16(&mut b, 0);
        put_u16(&mut b, 0);
        put_u32(&mut b, 0);
        put_u32(&mut b, 1);
        put_u32(&mut b, self.fps);
        put_u32(&mut b, 0);
        put_u32(&mut b, self.frames);
        put_u32(&mut b, 0);
        put_u32(&mut b, u32::MAX);
        put_u32(&mut b, 0);
        put_u16(&mut b, 0);
        put_u16(&mut b, 0);
        put_u16(&mut b, self.rect.0);
        put_u16(&mut b, self.rect.1);
        b
    }

    fn strf(&self) -> Vec<u8> {
        let mut b = Vec::with_capacity(40);
        put_u32(&mut b, 40);
        put_u32(&mut b, self.width);
        put_u32(&mut b, self.height);
        put_u16(&mut b, 1);
        put_u16(&mut b, 24);
        b.extend_from_slice(b"MJPG");
        let image_size = self.width.saturating_mul(self.height);
        put_u32(&mut b, image_size.saturating_mul(3));
        b.extend_from_slice(&[0; 16]);
        b
    }
}

/// Header chunks only, their sizes are fixed and small.
fn chunk(id: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut b = Vec::with_capacity(data.len() + 9);
    b.extend_from_slice(id);
    put_u32(&mut b, data.len() as u32);
    b.extend_from_slice(data);
    if data.len() % 2 == 1 {
        b.push(0);
    }
    b
}

fn list(id: &[u8; 4], kind: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    let mut data = kind.to_vec();
    for child in children {
        data.extend_from_slice(child);
    }
    chunk(id, &data)
}

fn put_u32(b: &mut Vec<u8>, v: u32) { b.extend_from_slice(&v.to_le_bytes()); }

fn put_u16(b: &mut Vec<u8>, v: u16) { b.extend_from_slice(&v.to_le_bytes()); }
