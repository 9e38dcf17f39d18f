use std::path::PathBuf;

// Chunks at or above this size stay on disk
pub const LAZY_CHUNK_THRESHOLD: u32 = 0x100000;
pub const BUFFER_SIZE: usize = 4096 * 4;
pub const COPY_BLOCK_SIZE: usize = 4096;
pub const VERIFY_BLOCK_SIZE: usize = 0x100000;
pub const MAX_FILE_SIZE: u64 = u32::MAX as u64;

/// Tunables shared by the reader, encoder and splice paths.
#[derive(Debug, Clone)]
pub struct AiffOptions {
    /// Chunk payloads of at least this many bytes are read lazily.
    pub lazy_chunk_threshold: u32,
    /// Byte budget handed to `PcmReader::read` while encoding.
    pub pcm_buffer_size: usize,
    /// Block size for whole-file copies.
    pub copy_block_size: usize,
    /// Block size for reading lazy chunk payloads during verification.
    pub verify_block_size: usize,
    /// Largest FORM size an encode may produce, capped at the 32-bit limit.
    pub max_file_size: u64,
    pub temp_dir: PathBuf,
}

impl Default for AiffOptions {
    fn default() -> Self {
        Self {
            lazy_chunk_threshold: LAZY_CHUNK_THRESHOLD,
            pcm_buffer_size: BUFFER_SIZE,
            copy_block_size: COPY_BLOCK_SIZE,
            verify_block_size: VERIFY_BLOCK_SIZE,
            max_file_size: MAX_FILE_SIZE,
            temp_dir: std::env::temp_dir(),
        }
    }
}

impl AiffOptions {
    /// A fresh path for a splice temp file inside `temp_dir`.
    pub fn temp_path(&self) -> PathBuf {
        self.temp_dir
            .join(format!("aifcodex_{}.aiff", rand::random::<u32>()))
    }
}
