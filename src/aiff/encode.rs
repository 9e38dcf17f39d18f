use super::{
    AiffAudio, COMM_CHUNK_ID, COMM_CHUNK_SIZE, SSND_CHUNK_ID, SSND_HEADER_SIZE, StreamFormat,
};
use crate::chunk::{CHUNK_HEADER_SIZE, write_chunk_header};
use crate::config::{AiffOptions, MAX_FILE_SIZE};
use crate::container::write_form_header;
use crate::ieee::write_ieee_extended;
use crate::pcm::PcmReader;
use crate::prelude::*;
use std::io::BufWriter;

impl AiffAudio {
    /// Encodes everything `pcm` yields into a new AIFF file at `path`.
    ///
    /// Headers go out with placeholder sizes first and are rewritten once
    /// the sample data is on disk. Any failure removes the output file,
    /// and write failures are reported as [`AiffError::Encoding`].
    pub fn from_pcm<P>(path: impl AsRef<Path>, pcm: &mut P, options: AiffOptions) -> Result<Self>
    where
        P: PcmReader + ?Sized,
    {
        let path = path.as_ref();
        let file = File::create(path).map_err(AiffError::encoding)?;

        if let Err(e) = write_stream(file, pcm, &options) {
            log::debug!("removing partial output {}: {}", path.display(), e);
            // best effort, the encode error is what gets reported
            let _ = std::fs::remove_file(path);
            return Err(match e {
                AiffError::Io(e) => AiffError::encoding(e),
                other => other,
            });
        }

        Self::open_with(path, options)
    }
}

fn too_large() -> AiffError {
    AiffError::encoding("PCM data too large for aiff file")
}

fn write_stream<P>(file: File, pcm: &mut P, options: &AiffOptions) -> Result<()>
where
    P: PcmReader + ?Sized,
{
    let ceiling = options.max_file_size.min(MAX_FILE_SIZE);
    let mut out = BufWriter::new(file);

    let mut format = StreamFormat {
        channels: pcm.channels(),
        total_frames: 0,
        bits_per_sample: pcm.bits_per_sample(),
        sample_rate: pcm.sample_rate(),
        channel_mask: pcm.channel_mask(),
    };

    // FORM size counts everything after the size field itself
    let mut total_size: u64 = 4;
    let mut data_size: u64 = SSND_HEADER_SIZE as u64;
    let mut total_frames: u64 = 0;

    write_headers(&mut out, total_size as u32, &format, data_size as u32)?;
    out.write_all(&[0u8; SSND_HEADER_SIZE as usize])?;
    total_size += CHUNK_HEADER_SIZE + COMM_CHUNK_SIZE as u64 + CHUNK_HEADER_SIZE + data_size;

    loop {
        let framelist = pcm
            .read(options.pcm_buffer_size)
            .map_err(|e| match e {
                AiffError::Io(_) | AiffError::Decoding(_) => AiffError::encoding(e),
                other => other,
            })?;
        if framelist.is_empty() {
            break;
        }

        let bytes = framelist.to_bytes(true, true);
        out.write_all(&bytes)?;
        total_size += bytes.len() as u64;
        data_size += bytes.len() as u64;
        total_frames += framelist.frames() as u64;

        if total_size > ceiling {
            return Err(too_large());
        }
    }

    if data_size % 2 == 1 {
        out.write_all(&[0])?; // padding, not counted in the SSND size
        total_size += 1;
    }

    pcm.close().map_err(AiffError::encoding)?;
    out.flush()?;

    if total_size > ceiling {
        return Err(too_large());
    }
    format.total_frames = u32::try_from(total_frames).map_err(|_| too_large())?;

    out.seek(SeekFrom::Start(0))?;
    write_headers(&mut out, total_size as u32, &format, data_size as u32)?;
    out.flush()?;

    dprintln!(
        "encoded {} frames, FORM size {}, SSND size {}",
        total_frames,
        total_size,
        data_size
    );
    Ok(())
}

/// FORM header, the whole COMM chunk and the SSND chunk header.
fn write_headers<W: Write>(
    out: &mut W,
    form_size: u32,
    format: &StreamFormat,
    ssnd_size: u32,
) -> Result<()> {
    write_form_header(out, form_size)?;

    write_chunk_header(out, COMM_CHUNK_ID, COMM_CHUNK_SIZE)?;
    out.write_u16::<BigEndian>(format.channels)?;
    out.write_u32::<BigEndian>(format.total_frames)?;
    out.write_u16::<BigEndian>(format.bits_per_sample)?;
    write_ieee_extended(out, format.sample_rate as f64)?;

    write_chunk_header(out, SSND_CHUNK_ID, ssnd_size)?;
    Ok(())
}
