//! The AIFF container engine.
//!
//! [`AiffAudio`] is opened from a path and reads only as far as the first
//! usable `COMM` chunk. Everything else (PCM decode and encode, metadata
//! splicing, verification and repair) rescans the file on demand.

use crate::chunk::{Chunk, ChunkId};
use crate::config::AiffOptions;
use crate::container::{self, Chunks};
use crate::ieee::read_ieee_extended;
use crate::pcm::ChannelMask;
use crate::prelude::*;
use std::collections::BTreeSet;

pub mod decode;
pub mod encode;
pub mod metadata;
pub mod repair;
pub mod transfer;

pub use decode::AiffReader;

// Chunk Identifiers
pub const COMM_CHUNK_ID: &ChunkId = b"COMM";
pub const SSND_CHUNK_ID: &ChunkId = b"SSND";
pub const ID3_CHUNK_ID: &ChunkId = b"ID3 ";

// Chunk Structures
const COMM_CHUNK_SIZE: u32 = 0x12;
const SSND_HEADER_SIZE: u32 = 8; // offset + block size

/// Stream format decoded from a `COMM` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamFormat {
    pub channels: u16,
    pub total_frames: u32,
    pub bits_per_sample: u16,
    pub sample_rate: u32,
    pub channel_mask: ChannelMask,
}

/// Decodes a `COMM` chunk payload. The sample rate is truncated to an
/// integer.
pub fn parse_comm<T: Read>(comm: &mut T) -> Result<StreamFormat> {
    let channels = comm.read_u16::<BigEndian>()?;
    let total_frames = comm.read_u32::<BigEndian>()?;
    let bits_per_sample = comm.read_u16::<BigEndian>()?;
    let sample_rate = read_ieee_extended(comm)? as u32;

    Ok(StreamFormat {
        channels,
        total_frames,
        bits_per_sample,
        sample_rate,
        channel_mask: ChannelMask::from_channels(channels),
    })
}

/// An AIFF file on disk.
#[derive(Debug, Clone)]
pub struct AiffAudio {
    path: PathBuf,
    options: AiffOptions,
    format: StreamFormat,
}

impl AiffAudio {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, AiffOptions::default())
    }

    /// Opens `path`, taking the stream format from the first `COMM` chunk
    /// that parses. A file without one opens with an all-zero format so
    /// that it can still be verified and cleaned.
    pub fn open_with(path: impl AsRef<Path>, options: AiffOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut format = StreamFormat::default();

        let scan = || -> Result<Option<StreamFormat>> {
            for chunk in Chunks::open(&path, options.lazy_chunk_threshold)? {
                let chunk = chunk?;
                if chunk.id() != COMM_CHUNK_ID {
                    continue;
                }
                match parse_comm(&mut chunk.data()?) {
                    Ok(found) => return Ok(Some(found)),
                    Err(e) => {
                        log::debug!("skipping unreadable COMM chunk: {}", e);
                        continue;
                    }
                }
            }
            Ok(None)
        };

        match scan() {
            Ok(Some(found)) => format = found,
            Ok(None) => log::debug!("{}: no usable COMM chunk", path.display()),
            Err(AiffError::Io(e)) => {
                log::debug!("{}: {}", path.display(), e);
                return Err(AiffError::invalid("I/O error reading AIFF"));
            }
            Err(e) => return Err(e),
        }

        dprintln!(
            "opened {}: {} ch, {} bit, {} Hz, {} frames",
            path.display(),
            format.channels,
            format.bits_per_sample,
            format.sample_rate,
            format.total_frames
        );

        Ok(Self {
            path,
            options,
            format,
        })
    }

    /// Checks a stream for the AIFF signature.
    pub fn is_type<T: Read>(reader: &mut T) -> bool {
        container::is_aiff(reader)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &AiffOptions {
        &self.options
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn channels(&self) -> u16 {
        self.format.channels
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.format.bits_per_sample
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    pub fn total_frames(&self) -> u32 {
        self.format.total_frames
    }

    pub fn channel_mask(&self) -> ChannelMask {
        self.format.channel_mask
    }

    pub fn lossless(&self) -> bool {
        true
    }

    pub fn seconds_length(&self) -> f64 {
        if self.format.sample_rate == 0 {
            return 0.0;
        }
        self.format.total_frames as f64 / self.format.sample_rate as f64
    }

    /// A fresh pass over the file's top-level chunks.
    pub fn chunks(&self) -> Result<Chunks> {
        Chunks::open(&self.path, self.options.lazy_chunk_threshold)
    }

    /// True unless the file holds exactly the `COMM` and `SSND` chunks.
    pub fn has_foreign_aiff_chunks(&self) -> Result<bool> {
        let mut ids = BTreeSet::new();
        for chunk in self.chunks()? {
            ids.insert(*chunk?.id());
        }
        let expected: BTreeSet<ChunkId> = [*COMM_CHUNK_ID, *SSND_CHUNK_ID].into();
        Ok(ids != expected)
    }

    pub(crate) fn find_chunk(&self, id: &ChunkId) -> Result<Option<Chunk>> {
        for chunk in self.chunks()? {
            let chunk = chunk?;
            if chunk.id() == id {
                return Ok(Some(chunk));
            }
        }
        Ok(None)
    }
}
