use super::{AiffAudio, SSND_CHUNK_ID, SSND_HEADER_SIZE, StreamFormat};
use crate::chunk::padded_size;
use crate::container::{read_chunk_header, read_form_header};
use crate::pcm::{ChannelMask, FrameList, PcmReader, bytes_per_sample};
use crate::prelude::*;
use std::io::{BufReader, ErrorKind};

/// Streams the `SSND` sample data of an AIFF file as big-endian signed
/// frames.
pub struct AiffReader {
    reader: Option<BufReader<File>>,
    format: StreamFormat,
    bytes_per_frame: usize,
    remaining_frames: u32,
}

impl AiffReader {
    /// Positions a new reader at the first sample byte of `path`.
    ///
    /// Chunk headers are walked from the top of the file independently of
    /// any earlier scan. The SSND offset and block size are skipped and
    /// never applied.
    pub fn open(path: &Path, format: StreamFormat) -> Result<Self> {
        let bytes_per_frame = bytes_per_sample(format.bits_per_sample)? * format.channels as usize;
        if bytes_per_frame == 0 {
            return Err(AiffError::Decoding("stream has no channels".into()));
        }

        let mut reader = BufReader::new(File::open(path)?);
        read_form_header(&mut reader)?;
        loop {
            let (id, size) = read_chunk_header(&mut reader)?;
            if &id == SSND_CHUNK_ID {
                reader.seek_relative(SSND_HEADER_SIZE as i64)?;
                break;
            }
            reader.seek_relative(padded_size(size) as i64)?;
        }

        Ok(Self {
            reader: Some(reader),
            format,
            bytes_per_frame,
            remaining_frames: format.total_frames,
        })
    }

    pub fn remaining_frames(&self) -> u32 {
        self.remaining_frames
    }
}

impl PcmReader for AiffReader {
    fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    fn channels(&self) -> u16 {
        self.format.channels
    }

    fn channel_mask(&self) -> ChannelMask {
        self.format.channel_mask
    }

    fn bits_per_sample(&self) -> u16 {
        self.format.bits_per_sample
    }

    fn read(&mut self, bytes: usize) -> Result<FrameList> {
        let frames = (bytes / self.bytes_per_frame)
            .max(1)
            .min(self.remaining_frames as usize);
        let Some(reader) = self.reader.as_mut().filter(|_| frames > 0) else {
            return Ok(FrameList::empty(
                self.format.channels,
                self.format.bits_per_sample,
            ));
        };

        let mut data = vec![0u8; frames * self.bytes_per_frame];
        reader.read_exact(&mut data).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                std::io::Error::new(ErrorKind::UnexpectedEof, "SSND chunk ends prematurely")
            }
            _ => e,
        })?;

        let framelist = FrameList::from_bytes(
            &data,
            self.format.channels,
            self.format.bits_per_sample,
            true,
            true,
        )?;
        self.remaining_frames -= frames as u32;
        Ok(framelist)
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        Ok(())
    }
}

impl AiffAudio {
    /// Opens a PCM reader over this file's sample data.
    pub fn to_pcm(&self) -> Result<AiffReader> {
        AiffReader::open(&self.path, self.format)
    }
}
