//! Whole-file transfers: PCM split and AIFF-to-AIFF copies.

use super::{AiffAudio, SSND_CHUNK_ID, SSND_HEADER_SIZE};
use crate::chunk::{padded_size, write_chunk_header};
use crate::config::AiffOptions;
use crate::container::{read_chunk_header, read_form_header, write_form_header};
use crate::prelude::*;
use std::io::{BufReader, ErrorKind};

/// Progress callback, called with `(current_bytes, total_bytes)`.
pub type Progress<'a> = Option<&'a mut dyn FnMut(u64, u64)>;

/// Copies `source` over `target` in `block_size` blocks, returning the
/// number of bytes copied. `target` is truncated, not replaced.
pub(crate) fn copy_file(
    source: &Path,
    target: &Path,
    block_size: usize,
    mut progress: Progress,
) -> Result<u64> {
    let mut input = File::open(source)?;
    let total_bytes = input.metadata()?.len();
    let mut output = File::create(target)?;

    let mut buffer = vec![0u8; block_size.max(1)];
    let mut current_bytes = 0u64;
    loop {
        let n = input.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        output.write_all(&buffer[..n])?;
        current_bytes += n as u64;
        if let Some(progress) = progress.as_deref_mut() {
            progress(current_bytes, total_bytes);
        }
    }
    output.flush()?;
    Ok(current_bytes)
}

impl AiffAudio {
    /// Splits the file around its sample data.
    ///
    /// `head` runs from the FORM header through the SSND offset and block
    /// size fields; `tail` is everything after the samples. Writing
    /// `head`, the big-endian samples and `tail` reproduces the file.
    pub fn pcm_split(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut head = Vec::new();
        let mut tail = Vec::new();

        let form_size = read_form_header(&mut reader)?;
        write_form_header(&mut head, form_size)?;
        let mut remaining = form_size as i64 - 4;
        let mut past_ssnd = false;

        while remaining > 0 {
            let block = if past_ssnd { &mut tail } else { &mut head };
            let (id, size) = read_chunk_header(&mut reader)?;
            write_chunk_header(block, &id, size)?;
            remaining -= 8 + padded_size(size) as i64;

            if !past_ssnd && &id == SSND_CHUNK_ID {
                if size < SSND_HEADER_SIZE {
                    return Err(AiffError::invalid("SSND chunk too small"));
                }
                let mut alignment = [0u8; SSND_HEADER_SIZE as usize];
                reader.read_exact(&mut alignment)?;
                block.write_all(&alignment)?;
                reader.seek_relative((size - SSND_HEADER_SIZE) as i64)?;
                past_ssnd = true;

                // the pad byte follows the samples
                if size % 2 == 1 {
                    copy_exact(&mut reader, &mut tail, 1)?;
                }
            } else {
                copy_exact(&mut reader, block, padded_size(size))?;
            }
        }

        Ok((head, tail))
    }

    /// Copies this file to `target` after verifying it.
    pub fn to_aiff(&self, target: impl AsRef<Path>, progress: Progress) -> Result<()> {
        self.verify(None).map_err(AiffError::encoding)?;
        copy_file(&self.path, target.as_ref(), self.options.copy_block_size, progress)
            .map_err(AiffError::encoding)?;
        Ok(())
    }

    /// Creates `target` as a verified copy of the AIFF file at `source`.
    pub fn from_aiff(
        target: impl AsRef<Path>,
        source: impl AsRef<Path>,
        options: AiffOptions,
        progress: Progress,
    ) -> Result<Self> {
        let target = target.as_ref();
        let block_size = options.copy_block_size;

        AiffAudio::open_with(source.as_ref(), options.clone())
            .and_then(|aiff| aiff.verify(None))
            .map_err(AiffError::encoding)?;
        copy_file(source.as_ref(), target, block_size, progress).map_err(AiffError::encoding)?;

        AiffAudio::open_with(target, options).map_err(|e| {
            log::debug!("{}: {}", target.display(), e);
            let _ = std::fs::remove_file(target);
            AiffError::encoding("invalid AIFF source file")
        })
    }
}

fn copy_exact<R: Read>(reader: &mut R, out: &mut Vec<u8>, len: u64) -> Result<()> {
    let copied = reader.take(len).read_to_end(out)?;
    if (copied as u64) < len {
        return Err(std::io::Error::new(ErrorKind::UnexpectedEof, "chunk ends prematurely").into());
    }
    Ok(())
}
