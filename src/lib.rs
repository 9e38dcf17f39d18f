pub mod aiff;
pub mod chunk;
pub mod config;
pub mod container;
pub mod error;
pub mod id3;
pub mod ieee;
pub mod pcm;
mod prelude;

pub use aiff::{AiffAudio, AiffReader, StreamFormat, parse_comm};
pub use aiff::transfer::Progress;
pub use chunk::{Chunk, ChunkData, ChunkId};
pub use config::AiffOptions;
pub use container::{Chunks, is_aiff, write_from_chunks};
pub use error::{AiffError, Result};
pub use id3::{Id3v22Tag, Metadata};
pub use pcm::{ChannelMask, FrameList, FramesReader, PcmReader};

pub fn debug_println(args: std::fmt::Arguments) {
    log::debug!("{}", args);
}

// Helper macro to use it like println!
#[macro_export]
macro_rules! dprintln {
    ($($arg:tt)*) => {
        $crate::debug_println(format_args!($($arg)*))
    };
}

/// Opens `path` as AIFF if it carries the FORM/AIFF signature.
pub fn open(path: impl AsRef<std::path::Path>) -> Result<Option<AiffAudio>> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path)?;
    if !is_aiff(&mut file) {
        return Ok(None);
    }
    AiffAudio::open(path).map(Some)
}
