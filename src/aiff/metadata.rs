//! `ID3 ` chunk embedding.
//!
//! AIFF chunks cannot grow in place, so every change rewrites the whole
//! container into a temp file whose bytes are then copied over the
//! original.

use super::{AiffAudio, ID3_CHUNK_ID};
use crate::chunk::Chunk;
use crate::container::write_from_chunks;
use crate::id3::{Id3v22Tag, Metadata};
use crate::prelude::*;

use super::transfer::copy_file;

impl AiffAudio {
    /// The tag in the first `ID3 ` chunk, if any.
    pub fn get_metadata(&self) -> Result<Option<Metadata>> {
        match self.find_chunk(ID3_CHUNK_ID)? {
            Some(chunk) => {
                let tag = Id3v22Tag::parse(&mut chunk.data()?)?;
                Ok(Some(Metadata::Id3(tag)))
            }
            None => Ok(None),
        }
    }

    /// Replaces every `ID3 ` chunk with `metadata`, which must have come
    /// from [`get_metadata`](Self::get_metadata).
    pub fn update_metadata(&self, metadata: &Metadata) -> Result<()> {
        let Metadata::Id3(tag) = metadata else {
            return Err(AiffError::ForeignMetadata);
        };
        let id3 = Chunk::from_data(*ID3_CHUNK_ID, tag.to_bytes()?)?;

        self.splice(self.chunks()?.map(move |chunk| match chunk {
            Ok(c) if c.id() == ID3_CHUNK_ID => Ok(id3.clone()),
            other => other,
        }))
    }

    /// Stores any metadata, converting it to ID3v2.2. A file without a
    /// tag gets a new `ID3 ` chunk after all existing chunks.
    pub fn set_metadata(&self, metadata: &Metadata) -> Result<()> {
        let tag = Id3v22Tag::converted(metadata);
        if self.get_metadata()?.is_some() {
            return self.update_metadata(&Metadata::Id3(tag));
        }

        let id3 = Chunk::from_data(*ID3_CHUNK_ID, tag.to_bytes()?)?;
        self.splice(self.chunks()?.chain(std::iter::once(Ok(id3))))
    }

    /// Removes every `ID3 ` chunk.
    pub fn delete_metadata(&self) -> Result<()> {
        self.splice(
            self.chunks()?
                .filter(|chunk| !matches!(chunk, Ok(c) if c.id() == ID3_CHUNK_ID)),
        )
    }

    /// Writes `chunks` as a new container in a temp file, then copies it
    /// over this file. The temp file is always removed.
    pub(crate) fn splice<I>(&self, chunks: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<Chunk>>,
    {
        let temp = self.options.temp_path();
        dprintln!("splicing {} through {}", self.path.display(), temp.display());

        let result = write_from_chunks(&temp, chunks)
            .and_then(|_| copy_file(&temp, &self.path, self.options.copy_block_size, None));

        if let Err(e) = std::fs::remove_file(&temp) {
            log::debug!("could not remove {}: {}", temp.display(), e);
        }
        result.map(|_| ())
    }
}
