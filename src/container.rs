//! Top-level FORM/AIFF container reading and writing.

use crate::chunk::{Chunk, ChunkId, is_valid_chunk_id};
use crate::prelude::*;
use std::io::{BufReader, BufWriter, ErrorKind};

pub const FORM_CHUNK_ID: &ChunkId = b"FORM";
pub const AIFF_FORMAT_ID: &ChunkId = b"AIFF";
pub const HEADER_SIZE: usize = 12; // FORM + size + AIFF

/// Checks the 12-byte signature at the start of `reader`.
pub fn is_aiff<T: Read>(reader: &mut T) -> bool {
    let mut header = [0u8; HEADER_SIZE];
    if reader.read_exact(&mut header).is_err() {
        return false;
    }
    &header[0..4] == FORM_CHUNK_ID && &header[8..12] == AIFF_FORMAT_ID
}

/// Reads and checks the FORM header, returning the declared FORM size.
pub(crate) fn read_form_header<T: Read>(reader: &mut T) -> Result<u32> {
    let mut form = [0u8; 4];
    let mut aiff = [0u8; 4];
    let size = (|| -> std::io::Result<u32> {
        reader.read_exact(&mut form)?;
        let size = reader.read_u32::<BigEndian>()?;
        reader.read_exact(&mut aiff)?;
        Ok(size)
    })()
    .map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => AiffError::invalid("Invalid AIFF file"),
        _ => e.into(),
    })?;

    if &form != FORM_CHUNK_ID {
        return Err(AiffError::invalid("Not an AIFF file"));
    }
    if &aiff != AIFF_FORMAT_ID {
        return Err(AiffError::invalid("Invalid AIFF file"));
    }
    Ok(size)
}

/// Reads an 8-byte chunk header, rejecting ids that are not printable ASCII.
pub(crate) fn read_chunk_header<T: Read>(reader: &mut T) -> Result<(ChunkId, u32)> {
    let mut id = [0u8; 4];
    let size = (|| -> std::io::Result<u32> {
        reader.read_exact(&mut id)?;
        reader.read_u32::<BigEndian>()
    })()
    .map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => AiffError::invalid("Invalid AIFF file"),
        _ => e.into(),
    })?;

    if !is_valid_chunk_id(&id) {
        return Err(AiffError::invalid("Invalid AIFF chunk ID"));
    }
    Ok((id, size))
}

/// Iterator over the top-level chunks of an AIFF file, in file order.
///
/// Chunks are read one at a time, so a consumer can stop as soon as it
/// has what it needs. Payloads of at least `threshold` bytes are left on
/// disk. Once an error has been yielded the iterator is exhausted.
///
/// Chunks that run past the declared FORM size are still yielded; the
/// scan then ends and [`Chunks::overran`] reports it.
pub struct Chunks {
    path: PathBuf,
    reader: BufReader<File>,
    remaining: i64,
    threshold: u32,
    pending: Option<AiffError>,
    done: bool,
}

impl Chunks {
    pub fn open(path: &Path, threshold: u32) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let total_size = read_form_header(&mut reader)?;

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            remaining: total_size as i64 - 4,
            threshold,
            pending: None,
            done: false,
        })
    }

    /// True once the chunks read so far extend past the FORM size.
    pub fn overran(&self) -> bool {
        self.remaining < 0
    }

    fn read_chunk(&mut self) -> Result<Chunk> {
        let (id, size) = read_chunk_header(&mut self.reader)?;
        self.remaining -= 8;

        let chunk = if size >= self.threshold {
            let offset = self.reader.stream_position()?;
            self.reader.seek_relative(size as i64)?;
            Chunk::in_file(id, size, &self.path, offset)
        } else {
            let mut data = Vec::with_capacity(size as usize);
            (&mut self.reader).take(size as u64).read_to_end(&mut data)?;
            Chunk::with_size(id, size, data)
        };
        dprintln!(
            "read {} chunk, {} bytes{}",
            chunk.id_str(),
            size,
            if chunk.is_lazy() { " (lazy)" } else { "" }
        );

        if size % 2 == 1 {
            let mut pad = [0u8; 1];
            if self.reader.read(&mut pad)? < 1 {
                // hand out the chunk, fail on the next call
                self.pending = Some(AiffError::invalid("Invalid AIFF chunk"));
            }
            self.remaining -= size as i64 + 1;
        } else {
            self.remaining -= size as i64;
        }

        Ok(chunk)
    }
}

impl Iterator for Chunks {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(err) = self.pending.take() {
            self.done = true;
            return Some(Err(err));
        }
        if self.remaining <= 0 {
            if self.overran() {
                dprintln!("{}: chunks overrun the FORM size", self.path.display());
            }
            self.done = true;
            return None;
        }

        let chunk = self.read_chunk();
        if chunk.is_err() {
            self.done = true;
        }
        Some(chunk)
    }
}

/// Writes a new AIFF file at `path` from `chunks`, returning the FORM size
/// written into the header.
///
/// A placeholder header goes out first and is patched once every chunk
/// body has been flushed. On failure the partial file is left in place
/// for the caller to remove.
pub fn write_from_chunks<I>(path: &Path, chunks: I) -> Result<u64>
where
    I: IntoIterator<Item = Result<Chunk>>,
{
    let mut out = BufWriter::new(File::create(path)?);
    let mut total_size: u64 = 4;

    // unfinished header with a placeholder size
    write_form_header(&mut out, total_size as u32)?;

    for chunk in chunks {
        total_size += chunk?.write(&mut out)?;
    }

    let form_size = u32::try_from(total_size)
        .map_err(|_| AiffError::encoding("chunk data too large for aiff file"))?;

    out.flush()?;
    out.seek(SeekFrom::Start(0))?;
    write_form_header(&mut out, form_size)?;
    out.flush()?;

    dprintln!("wrote {} with FORM size {}", path.display(), total_size);
    Ok(total_size)
}

pub(crate) fn write_form_header<W: Write>(out: &mut W, size: u32) -> std::io::Result<()> {
    out.write_all(FORM_CHUNK_ID)?;
    out.write_u32::<BigEndian>(size)?;
    out.write_all(AIFF_FORMAT_ID)
}
