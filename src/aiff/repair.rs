//! Structural verification and repair.

use super::transfer::Progress;
use super::{AiffAudio, COMM_CHUNK_ID, SSND_CHUNK_ID};
use crate::chunk::Chunk;
use crate::container::write_from_chunks;
use crate::id3::Metadata;
use crate::prelude::*;

impl AiffAudio {
    /// Checks chunk order and completeness.
    ///
    /// Requires exactly one `COMM` followed by exactly one `SSND`, every
    /// chunk's payload to be fully present and the chunks to fit inside
    /// the FORM size. Lazy chunks are read through in `verify_block_size`
    /// blocks.
    pub fn verify(&self, progress: Progress) -> Result<bool> {
        let mut comm_found = false;
        let mut ssnd_found = false;

        let mut chunks = self.chunks()?;
        for chunk in &mut chunks {
            let chunk = chunk?;
            match chunk.id() {
                COMM_CHUNK_ID => {
                    if comm_found {
                        return Err(AiffError::invalid("multiple COMM chunks found"));
                    }
                    comm_found = true;
                }
                SSND_CHUNK_ID => {
                    if !comm_found {
                        return Err(AiffError::invalid("SSND chunk found before fmt"));
                    } else if ssnd_found {
                        return Err(AiffError::invalid("multiple SSND chunks found"));
                    }
                    ssnd_found = true;
                }
                _ => {}
            }

            if !self.chunk_is_complete(&chunk)? {
                return Err(AiffError::invalid(format!(
                    "truncated {} chunk found",
                    chunk.id_str()
                )));
            }
        }

        if chunks.overran() {
            return Err(AiffError::invalid("chunk sizes exceed the FORM chunk size"));
        }
        if !comm_found {
            return Err(AiffError::invalid("COMM chunk not found"));
        }
        if !ssnd_found {
            return Err(AiffError::invalid("SSND chunk not found"));
        }

        if let Some(progress) = progress {
            progress(1, 1);
        }
        Ok(true)
    }

    fn chunk_is_complete(&self, chunk: &Chunk) -> Result<bool> {
        if !chunk.verify()? {
            return Ok(false);
        }
        if !chunk.is_lazy() {
            return Ok(true);
        }

        let mut data = chunk.data()?;
        let mut buffer = vec![0u8; self.options.verify_block_size.max(1)];
        let mut seen = 0u64;
        loop {
            let n = data.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            seen += n as u64;
        }
        Ok(seen == chunk.size() as u64)
    }

    /// Repairs chunk order and tag formatting.
    ///
    /// Duplicate `COMM` and `SSND` chunks are dropped (the first wins) and
    /// an `SSND` found before `COMM` is moved to just after it. The tag, if
    /// any, is cleaned too. A FORM size too small for its chunks is
    /// rewritten. Every fix is appended to `fixes`.
    ///
    /// With `output` the repaired file is written there and opened;
    /// without it nothing is written.
    pub fn clean(
        &self,
        fixes: &mut Vec<String>,
        output: Option<&Path>,
    ) -> Result<Option<AiffAudio>> {
        let mut queue: Vec<Chunk> = Vec::new();
        let mut pending: Option<Chunk> = None;
        let mut comm_found = false;
        let mut ssnd_found = false;

        let mut chunks = self.chunks()?;
        for chunk in &mut chunks {
            let chunk = chunk?;
            match chunk.id() {
                COMM_CHUNK_ID => {
                    if comm_found {
                        record_fix(fixes, "multiple COMM chunks found");
                        continue;
                    }
                    comm_found = true;
                    queue.push(chunk);
                    if let Some(ssnd) = pending.take() {
                        queue.push(ssnd);
                        ssnd_found = true;
                    }
                }
                SSND_CHUNK_ID => {
                    if ssnd_found || (!comm_found && pending.is_some()) {
                        record_fix(fixes, "multiple SSND chunks found");
                    } else if !comm_found {
                        record_fix(fixes, "SSND chunk found before fmt");
                        pending = Some(chunk);
                    } else {
                        ssnd_found = true;
                        queue.push(chunk);
                    }
                }
                _ => queue.push(chunk),
            }
        }

        // no COMM to follow, keep the samples where they end up
        if let Some(ssnd) = pending.take() {
            queue.push(ssnd);
        }
        if chunks.overran() {
            record_fix(fixes, "FORM size corrected");
        }

        let metadata = match self.get_metadata()? {
            Some(Metadata::Id3(tag)) => {
                let before = fixes.len();
                let cleaned = tag.cleaned(fixes);
                for fix in &fixes[before..] {
                    log::warn!("{}: {}", self.path.display(), fix);
                }
                Some(Metadata::Id3(cleaned))
            }
            other => other,
        };

        let Some(output) = output else {
            return Ok(None);
        };

        if is_same_file(&self.path, output) {
            self.splice(queue.into_iter().map(Ok))?;
        } else if let Err(e) = write_from_chunks(output, queue.into_iter().map(Ok)) {
            let _ = std::fs::remove_file(output);
            return Err(e);
        }

        let fixed = AiffAudio::open_with(output, self.options.clone())?;
        if let Some(metadata) = metadata {
            fixed.update_metadata(&metadata)?;
        }
        Ok(Some(fixed))
    }
}

fn record_fix(fixes: &mut Vec<String>, fix: &str) {
    log::warn!("{}", fix);
    fixes.push(fix.to_string());
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aiff::tests::{comm_payload, ssnd_payload};
    use crate::chunk::ChunkId;
    use crate::config::AiffOptions;
    use crate::container::tests::build_aiff;
    use crate::id3::Id3v22Tag;

    fn write_aiff(dir: &tempfile::TempDir, chunks: &[(&[u8; 4], u32, &[u8])]) -> AiffAudio {
        let path = dir.path().join("repair.aiff");
        std::fs::write(&path, build_aiff(chunks)).unwrap();
        AiffAudio::open(&path).unwrap()
    }

    fn verify_message(aiff: &AiffAudio) -> String {
        match aiff.verify(None) {
            Err(AiffError::InvalidContainer(msg)) => msg,
            other => panic!("expected InvalidContainer, got {:?}", other),
        }
    }

    fn ids(aiff: &AiffAudio) -> Vec<ChunkId> {
        aiff.chunks().unwrap().map(|c| *c.unwrap().id()).collect()
    }

    #[test]
    fn test_verify_accepts_well_formed_file() {
        let dir = tempfile::tempdir().unwrap();
        let comm = comm_payload(1, 2, 16, 44100.0);
        let ssnd = ssnd_payload(&[0, 1, 0, 2]);
        let aiff = write_aiff(&dir, &[(b"COMM", 18, &comm), (b"SSND", 12, &ssnd)]);

        let mut called = None;
        let mut progress = |current: u64, total: u64| called = Some((current, total));
        assert!(aiff.verify(Some(&mut progress)).unwrap());
        assert_eq!(called, Some((1, 1)));
    }

    #[test]
    fn test_verify_streams_lazy_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let comm = comm_payload(1, 32, 16, 44100.0);
        let ssnd = ssnd_payload(&[0u8; 64]);
        let path = dir.path().join("lazy.aiff");
        std::fs::write(&path, build_aiff(&[(b"COMM", 18, &comm), (b"SSND", 72, &ssnd)])).unwrap();
        let options = AiffOptions {
            lazy_chunk_threshold: 32,
            verify_block_size: 5,
            ..Default::default()
        };
        let aiff = AiffAudio::open_with(&path, options).unwrap();
        assert!(aiff.verify(None).unwrap());
    }

    #[test]
    fn test_verify_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let comm = comm_payload(1, 2, 16, 44100.0);
        let ssnd = ssnd_payload(&[0, 1, 0, 2]);

        let aiff = write_aiff(
            &dir,
            &[(b"COMM", 18, &comm), (b"COMM", 18, &comm), (b"SSND", 12, &ssnd)],
        );
        assert_eq!(verify_message(&aiff), "multiple COMM chunks found");

        let aiff = write_aiff(&dir, &[(b"SSND", 12, &ssnd), (b"COMM", 18, &comm)]);
        assert_eq!(verify_message(&aiff), "SSND chunk found before fmt");

        let aiff = write_aiff(
            &dir,
            &[(b"COMM", 18, &comm), (b"SSND", 12, &ssnd), (b"SSND", 12, &ssnd)],
        );
        assert_eq!(verify_message(&aiff), "multiple SSND chunks found");

        let aiff = write_aiff(&dir, &[(b"COMM", 18, &comm)]);
        assert_eq!(verify_message(&aiff), "SSND chunk not found");

        let aiff = write_aiff(&dir, &[(b"NAME", 2, b"ab")]);
        assert_eq!(verify_message(&aiff), "COMM chunk not found");

        // last chunk declares more bytes than the file holds
        let aiff = write_aiff(
            &dir,
            &[(b"COMM", 18, &comm), (b"SSND", 100, &ssnd)],
        );
        assert_eq!(verify_message(&aiff), "truncated SSND chunk found");
    }

    #[test]
    fn test_clean_reorders_and_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let comm = comm_payload(1, 2, 16, 44100.0);
        let other_comm = comm_payload(2, 9, 24, 96000.0);
        let ssnd = ssnd_payload(&[0, 1, 0, 2]);
        let aiff = write_aiff(
            &dir,
            &[
                (b"NAME", 1, b"x"),
                (b"SSND", 12, &ssnd),
                (b"COMM", 18, &comm),
                (b"COMM", 18, &other_comm),
            ],
        );

        let mut dry_run = Vec::new();
        assert!(aiff.clean(&mut dry_run, None).unwrap().is_none());
        assert_eq!(
            dry_run,
            vec!["SSND chunk found before fmt", "multiple COMM chunks found"]
        );

        let output = dir.path().join("fixed.aiff");
        let mut fixes = Vec::new();
        let fixed = aiff.clean(&mut fixes, Some(&output)).unwrap().unwrap();
        assert_eq!(fixes, dry_run);
        assert_eq!(ids(&fixed), vec![*b"NAME", *b"COMM", *b"SSND"]);
        assert_eq!(fixed.channels(), 1);
        assert!(fixed.verify(None).unwrap());

        let mut again = Vec::new();
        fixed.clean(&mut again, None).unwrap();
        assert!(again.is_empty());
    }

    /// COMM plus an odd SSND whose pad byte the FORM size leaves out.
    fn write_short_form(dir: &tempfile::TempDir) -> AiffAudio {
        let comm = comm_payload(1, 3, 8, 8000.0);
        let ssnd = ssnd_payload(&[1, 2, 3]);
        let mut bytes = build_aiff(&[(b"COMM", 18, &comm), (b"SSND", 11, &ssnd)]);
        let form_size = bytes.len() as u32 - 9;
        bytes[4..8].copy_from_slice(&form_size.to_be_bytes());

        let path = dir.path().join("short_form.aiff");
        std::fs::write(&path, bytes).unwrap();
        AiffAudio::open(&path).unwrap()
    }

    #[test]
    fn test_short_form_size_fails_verify_only() {
        let dir = tempfile::tempdir().unwrap();
        let aiff = write_short_form(&dir);

        assert_eq!(verify_message(&aiff), "chunk sizes exceed the FORM chunk size");
        assert_eq!(ids(&aiff), vec![*b"COMM", *b"SSND"]);
        assert!(!aiff.has_foreign_aiff_chunks().unwrap());
        assert!(aiff.get_metadata().unwrap().is_none());

        // rewriting the container recomputes the FORM size
        aiff.delete_metadata().unwrap();
        assert!(aiff.verify(None).unwrap());
    }

    #[test]
    fn test_clean_corrects_short_form_size() {
        let dir = tempfile::tempdir().unwrap();
        let aiff = write_short_form(&dir);

        let output = dir.path().join("fixed.aiff");
        let mut fixes = Vec::new();
        let fixed = aiff.clean(&mut fixes, Some(&output)).unwrap().unwrap();
        assert_eq!(fixes, vec!["FORM size corrected"]);
        assert!(fixed.verify(None).unwrap());

        let bytes = std::fs::read(&output).unwrap();
        assert_eq!(&bytes[4..8], &(bytes.len() as u32 - 8).to_be_bytes());
    }

    #[test]
    fn test_clean_drops_second_ssnd() {
        let dir = tempfile::tempdir().unwrap();
        let comm = comm_payload(1, 2, 16, 44100.0);
        let ssnd = ssnd_payload(&[0, 1, 0, 2]);
        let aiff = write_aiff(
            &dir,
            &[(b"COMM", 18, &comm), (b"SSND", 12, &ssnd), (b"SSND", 12, &ssnd)],
        );
        let mut fixes = Vec::new();
        aiff.clean(&mut fixes, None).unwrap();
        assert_eq!(fixes, vec!["multiple SSND chunks found"]);
    }

    #[test]
    fn test_clean_cleans_tag() {
        let dir = tempfile::tempdir().unwrap();
        let comm = comm_payload(1, 2, 16, 44100.0);
        let ssnd = ssnd_payload(&[0, 1, 0, 2]);
        let mut tag = Id3v22Tag::default();
        tag.set_field("Title", "Song ").unwrap();
        let id3 = tag.to_bytes().unwrap();
        let aiff = write_aiff(
            &dir,
            &[(b"COMM", 18, &comm), (b"SSND", 12, &ssnd), (b"ID3 ", id3.len() as u32, &id3)],
        );

        let output = dir.path().join("fixed.aiff");
        let mut fixes = Vec::new();
        let fixed = aiff.clean(&mut fixes, Some(&output)).unwrap().unwrap();
        assert_eq!(fixes, vec!["removed trailing whitespace from Title"]);
        let metadata = fixed.get_metadata().unwrap().unwrap();
        assert_eq!(metadata.get_field("Title").as_deref(), Some("Song"));
    }

    #[test]
    fn test_clean_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let comm = comm_payload(1, 2, 16, 44100.0);
        let ssnd = ssnd_payload(&[0, 1, 0, 2]);
        let aiff = write_aiff(&dir, &[(b"SSND", 12, &ssnd), (b"COMM", 18, &comm)]);

        let path = aiff.path().to_path_buf();
        let mut fixes = Vec::new();
        let fixed = aiff.clean(&mut fixes, Some(&path)).unwrap().unwrap();
        assert_eq!(ids(&fixed), vec![*b"COMM", *b"SSND"]);
        assert!(fixed.verify(None).unwrap());
    }
}
