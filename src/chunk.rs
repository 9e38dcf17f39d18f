//! AIFF chunks.
//!
//! A chunk is a 4-byte ASCII id, a 4-byte big-endian payload size and the
//! payload itself, followed by one zero pad byte when the size is odd.
//! The pad byte is never counted in the size.
//!
//! Small payloads are held in memory. Large ones stay on disk and are
//! re-read from the source file on demand, so the source must not be
//! truncated or moved while such a chunk is alive.

use crate::prelude::*;
use std::borrow::Cow;

pub type ChunkId = [u8; 4];

pub const CHUNK_HEADER_SIZE: u64 = 8;

/// True if every byte of the id is printable ASCII (0x20..=0x7E).
pub fn is_valid_chunk_id(id: &[u8]) -> bool {
    id.len() == 4 && id.iter().all(|b| (0x20..=0x7E).contains(b))
}

pub fn padded_size(size: u32) -> u64 {
    size as u64 + (size % 2) as u64
}

pub fn write_chunk_header<W: Write>(out: &mut W, id: &ChunkId, size: u32) -> std::io::Result<()> {
    out.write_all(id)?;
    out.write_u32::<BigEndian>(size)
}

/// Chunk payload held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryChunk {
    id: ChunkId,
    size: u32,
    data: Vec<u8>,
}

/// Chunk payload left in its source file at `offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunk {
    id: ChunkId,
    size: u32,
    path: PathBuf,
    offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Memory(MemoryChunk),
    File(FileChunk),
}

impl Chunk {
    /// Builds an in-memory chunk whose size is the length of `data`.
    pub fn from_data(id: ChunkId, data: Vec<u8>) -> Result<Self> {
        let size = u32::try_from(data.len())
            .map_err(|_| AiffError::encoding("chunk data too large for aiff file"))?;
        Ok(Self::with_size(id, size, data))
    }

    /// An in-memory chunk whose declared size may disagree with the bytes
    /// actually present, as happens with a truncated file.
    pub(crate) fn with_size(id: ChunkId, size: u32, data: Vec<u8>) -> Self {
        Chunk::Memory(MemoryChunk { id, size, data })
    }

    pub(crate) fn in_file(id: ChunkId, size: u32, path: &Path, offset: u64) -> Self {
        Chunk::File(FileChunk {
            id,
            size,
            path: path.to_path_buf(),
            offset,
        })
    }

    pub fn id(&self) -> &ChunkId {
        match self {
            Chunk::Memory(chunk) => &chunk.id,
            Chunk::File(chunk) => &chunk.id,
        }
    }

    pub fn id_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.id())
    }

    /// Payload size in bytes, excluding header and pad byte.
    pub fn size(&self) -> u32 {
        match self {
            Chunk::Memory(chunk) => chunk.size,
            Chunk::File(chunk) => chunk.size,
        }
    }

    /// Header, payload and pad byte.
    pub fn total_size(&self) -> u64 {
        CHUNK_HEADER_SIZE + padded_size(self.size())
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Chunk::File(_))
    }

    /// A stream over the chunk payload, positioned at its first byte.
    pub fn data(&self) -> Result<ChunkData<'_>> {
        match self {
            Chunk::Memory(chunk) => Ok(ChunkData::Memory(Cursor::new(chunk.data.as_slice()))),
            Chunk::File(chunk) => {
                let reader = LimitedFileReader::open(&chunk.path, chunk.offset, chunk.size as u64)?;
                Ok(ChunkData::File(reader))
            }
        }
    }

    /// The whole payload in memory.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        match self {
            Chunk::Memory(chunk) => Ok(chunk.data.clone()),
            Chunk::File(_) => {
                let mut data = Vec::with_capacity(self.size() as usize);
                self.data()?.read_to_end(&mut data)?;
                Ok(data)
            }
        }
    }

    /// Returns false if fewer than `size()` payload bytes are available.
    pub fn verify(&self) -> Result<bool> {
        match self {
            Chunk::Memory(chunk) => Ok(chunk.data.len() as u64 == chunk.size as u64),
            Chunk::File(chunk) => {
                let file_len = std::fs::metadata(&chunk.path)?.len();
                Ok(file_len >= chunk.offset + chunk.size as u64)
            }
        }
    }

    /// Writes header, payload and pad byte to `out`, returning the number
    /// of bytes written.
    pub fn write<W: Write>(&self, out: &mut W) -> Result<u64> {
        write_chunk_header(out, self.id(), self.size())?;

        let written = match self {
            Chunk::Memory(chunk) => {
                out.write_all(&chunk.data)?;
                chunk.data.len() as u64
            }
            Chunk::File(chunk) => {
                let mut file = File::open(&chunk.path)?;
                file.seek(SeekFrom::Start(chunk.offset))?;
                std::io::copy(&mut file.take(chunk.size as u64), out)?
            }
        };
        if written != self.size() as u64 {
            return Err(AiffError::invalid(format!(
                "truncated {} chunk found",
                self.id_str()
            )));
        }

        if self.size() % 2 == 1 {
            out.write_all(&[0])?; // padding
        }
        Ok(self.total_size())
    }
}

/// Payload stream returned by [`Chunk::data`].
pub enum ChunkData<'a> {
    Memory(Cursor<&'a [u8]>),
    File(LimitedFileReader),
}

impl Read for ChunkData<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            ChunkData::Memory(cursor) => cursor.read(buf),
            ChunkData::File(reader) => reader.read(buf),
        }
    }
}

impl Seek for ChunkData<'_> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            ChunkData::Memory(cursor) => cursor.seek(pos),
            ChunkData::File(reader) => reader.seek(pos),
        }
    }
}

/// A window of `len` bytes starting at `start` in its own file handle.
/// Positions are relative to the window.
pub struct LimitedFileReader {
    file: File,
    start: u64,
    len: u64,
    pos: u64,
}

impl LimitedFileReader {
    pub fn open(path: &Path, start: u64, len: u64) -> std::io::Result<Self> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(start))?;
        Ok(Self {
            file,
            start,
            len,
            pos: 0,
        })
    }
}

impl Read for LimitedFileReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = self.len.saturating_sub(self.pos);
        if remaining == 0 {
            return Ok(0);
        }
        let max = buf.len().min(remaining.min(usize::MAX as u64) as usize);
        let n = self.file.read(&mut buf[..max])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for LimitedFileReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
        };
        let Some(target) = target else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "invalid seek to a negative position",
            ));
        };
        self.file.seek(SeekFrom::Start(self.start + target))?;
        self.pos = target;
        Ok(target)
    }
}
