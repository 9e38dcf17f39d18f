//! PCM exchange types: interleaved integer frame blocks, channel masks and
//! the reader trait encoders pull audio from.

use crate::prelude::*;

// Standard bit depths
const BIT_DEPTH_8: u16 = 8;
const BIT_DEPTH_16: u16 = 16;
const BIT_DEPTH_24: u16 = 24;
const BIT_DEPTH_32: u16 = 32;

//Bit Operations
const I24_SIGN_BIT: i32 = 0x800000;
const I24_SIGN_EXTENSION_MASK: i32 = !0xFFFFFF;

/// Speaker layout bits, WAVEFORMATEXTENSIBLE style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelMask(u32);

impl ChannelMask {
    pub const FRONT_LEFT: u32 = 0x1;
    pub const FRONT_RIGHT: u32 = 0x2;
    pub const FRONT_CENTER: u32 = 0x4;

    pub fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// The conventional layout for mono and stereo, undefined otherwise.
    pub fn from_channels(channels: u16) -> Self {
        match channels {
            1 => Self(Self::FRONT_CENTER),
            2 => Self(Self::FRONT_LEFT | Self::FRONT_RIGHT),
            _ => Self(0),
        }
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_defined(&self) -> bool {
        self.0 != 0
    }
}

impl From<ChannelMask> for u32 {
    fn from(mask: ChannelMask) -> u32 {
        mask.0
    }
}

pub fn bytes_per_sample(bits_per_sample: u16) -> Result<usize> {
    match bits_per_sample {
        BIT_DEPTH_8 => Ok(1),
        BIT_DEPTH_16 => Ok(2),
        BIT_DEPTH_24 => Ok(3),
        BIT_DEPTH_32 => Ok(4),
        _ => Err(AiffError::Decoding(format!(
            "unsupported bits per sample: {}",
            bits_per_sample
        ))),
    }
}

/// A block of whole PCM frames, samples interleaved by channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameList {
    channels: u16,
    bits_per_sample: u16,
    samples: Vec<i32>,
}

impl FrameList {
    pub fn new(channels: u16, bits_per_sample: u16, samples: Vec<i32>) -> Result<Self> {
        if channels == 0 {
            return Err(AiffError::Decoding("frame list needs at least one channel".into()));
        }
        bytes_per_sample(bits_per_sample)?;
        if samples.len() % channels as usize != 0 {
            return Err(AiffError::Decoding(format!(
                "{} samples do not fill whole {} channel frames",
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            channels,
            bits_per_sample,
            samples,
        })
    }

    pub fn empty(channels: u16, bits_per_sample: u16) -> Self {
        Self {
            channels,
            bits_per_sample,
            samples: Vec::new(),
        }
    }

    /// Unpacks raw sample bytes into a frame list.
    pub fn from_bytes(
        data: &[u8],
        channels: u16,
        bits_per_sample: u16,
        big_endian: bool,
        signed: bool,
    ) -> Result<Self> {
        let width = bytes_per_sample(bits_per_sample)?;
        let frame_size = width * channels.max(1) as usize;
        if data.len() % frame_size != 0 {
            return Err(AiffError::Decoding(format!(
                "{} bytes do not hold whole {} byte frames",
                data.len(),
                frame_size
            )));
        }

        let samples = data
            .chunks_exact(width)
            .map(|bytes| decode_sample(bytes, bits_per_sample, big_endian, signed))
            .collect();
        Self::new(channels, bits_per_sample, samples)
    }

    /// Packs the samples into raw bytes.
    pub fn to_bytes(&self, big_endian: bool, signed: bool) -> Vec<u8> {
        let width = self.bytes_per_sample();
        let mut out = Vec::with_capacity(self.samples.len() * width);
        for &sample in &self.samples {
            encode_sample(&mut out, sample, self.bits_per_sample, big_endian, signed);
        }
        out
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample / 8) as usize
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    /// Splits off the first `frames` frames.
    pub fn split(mut self, frames: usize) -> (FrameList, FrameList) {
        let at = (frames * self.channels as usize).min(self.samples.len());
        let tail = self.samples.split_off(at);
        let rest = FrameList {
            channels: self.channels,
            bits_per_sample: self.bits_per_sample,
            samples: tail,
        };
        (self, rest)
    }
}

fn decode_sample(bytes: &[u8], bits_per_sample: u16, big_endian: bool, signed: bool) -> i32 {
    let mut raw: u32 = 0;
    if big_endian {
        for &b in bytes {
            raw = (raw << 8) | b as u32;
        }
    } else {
        for &b in bytes.iter().rev() {
            raw = (raw << 8) | b as u32;
        }
    }

    if !signed {
        // unsigned samples are offset by half the range
        return (raw as i64 - (1i64 << (bits_per_sample - 1))) as i32;
    }

    match bits_per_sample {
        BIT_DEPTH_8 => raw as u8 as i8 as i32,
        BIT_DEPTH_16 => raw as u16 as i16 as i32,
        BIT_DEPTH_24 => {
            let val = raw as i32;
            if val & I24_SIGN_BIT != 0 {
                val | I24_SIGN_EXTENSION_MASK
            } else {
                val
            }
        }
        _ => raw as i32,
    }
}

fn encode_sample(
    out: &mut Vec<u8>,
    sample: i32,
    bits_per_sample: u16,
    big_endian: bool,
    signed: bool,
) {
    let value = if signed {
        sample
    } else {
        sample ^ (1i32 << (bits_per_sample - 1))
    };
    let width = (bits_per_sample / 8) as usize;
    let bytes = value.to_be_bytes();
    let significant = &bytes[4 - width..];
    if big_endian {
        out.extend_from_slice(significant);
    } else {
        out.extend(significant.iter().rev());
    }
}

/// A source of PCM frames.
pub trait PcmReader {
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u16;
    fn channel_mask(&self) -> ChannelMask;
    fn bits_per_sample(&self) -> u16;

    /// Reads roughly `bytes` worth of whole frames. An empty frame list
    /// marks the end of the stream.
    fn read(&mut self, bytes: usize) -> Result<FrameList>;

    /// Releases the source, reporting any deferred decode failure.
    fn close(&mut self) -> Result<()>;
}

/// A [`PcmReader`] over frames already in memory.
pub struct FramesReader {
    sample_rate: u32,
    channel_mask: ChannelMask,
    remaining: Option<FrameList>,
    channels: u16,
    bits_per_sample: u16,
}

impl FramesReader {
    pub fn new(frames: FrameList, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channel_mask: ChannelMask::from_channels(frames.channels()),
            channels: frames.channels(),
            bits_per_sample: frames.bits_per_sample(),
            remaining: Some(frames),
        }
    }
}

impl PcmReader for FramesReader {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn channel_mask(&self) -> ChannelMask {
        self.channel_mask
    }

    fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    fn read(&mut self, bytes: usize) -> Result<FrameList> {
        let Some(frames) = self.remaining.take() else {
            return Ok(FrameList::empty(self.channels, self.bits_per_sample));
        };
        let wanted = (bytes / frames.bytes_per_frame().max(1)).max(1);
        let (head, tail) = frames.split(wanted);
        if !tail.is_empty() {
            self.remaining = Some(tail);
        }
        Ok(head)
    }

    fn close(&mut self) -> Result<()> {
        self.remaining = None;
        Ok(())
    }
}
