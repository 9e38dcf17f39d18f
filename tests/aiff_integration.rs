use aifcodex_lib::chunk::ChunkId;
use aifcodex_lib::ieee::{build_ieee_extended, parse_ieee_extended};
use aifcodex_lib::*;
use byteorder::{BigEndian, WriteBytesExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// Synthetic file helpers

fn comm(channels: u16, frames: u32, bits: u16, rate: f64) -> Vec<u8> {
    let mut data = Vec::new();
    data.write_u16::<BigEndian>(channels).unwrap();
    data.write_u32::<BigEndian>(frames).unwrap();
    data.write_u16::<BigEndian>(bits).unwrap();
    data.extend_from_slice(&build_ieee_extended(rate));
    data
}

fn ssnd(pcm: &[u8]) -> Vec<u8> {
    let mut data = vec![0u8; 8];
    data.extend_from_slice(pcm);
    data
}

/// Chunks are written with their true payload length unless a declared
/// size is given.
fn aiff_bytes(chunks: &[(&[u8; 4], &[u8], Option<u32>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (id, payload, declared) in chunks {
        body.extend_from_slice(*id);
        body.write_u32::<BigEndian>(declared.unwrap_or(payload.len() as u32))
            .unwrap();
        body.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            body.push(0);
        }
    }
    let mut out = b"FORM".to_vec();
    out.write_u32::<BigEndian>(body.len() as u32 + 4).unwrap();
    out.extend_from_slice(b"AIFF");
    out.extend_from_slice(&body);
    out
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn chunk_ids(aiff: &AiffAudio) -> Vec<ChunkId> {
    aiff.chunks().unwrap().map(|c| *c.unwrap().id()).collect()
}

fn decode_all(aiff: &AiffAudio) -> Vec<i32> {
    let mut reader = aiff.to_pcm().unwrap();
    let mut samples = Vec::new();
    loop {
        let frames = reader.read(4096).unwrap();
        if frames.is_empty() {
            break;
        }
        samples.extend_from_slice(frames.samples());
    }
    reader.close().unwrap();
    samples
}

fn sine_frames(channels: u16, bits: u16, frames: usize) -> FrameList {
    let peak = ((1i64 << (bits - 1)) - 1) as f64;
    let samples = (0..frames)
        .flat_map(|i| {
            (0..channels).map(move |c| {
                let phase = (i as f64 + c as f64 * 7.0) * 0.05;
                (phase.sin() * peak) as i32
            })
        })
        .collect();
    FrameList::new(channels, bits, samples).unwrap()
}

#[test]
fn encode_then_decode_round_trips_samples() {
    let dir = tempfile::tempdir().unwrap();

    for (channels, bits) in [(1u16, 8u16), (2, 16), (2, 24), (1, 32)] {
        let frames = sine_frames(channels, bits, 5000);
        let path = dir.path().join(format!("rt_{}_{}.aiff", channels, bits));
        let mut source = FramesReader::new(frames.clone(), 44100);

        let aiff = AiffAudio::from_pcm(&path, &mut source, AiffOptions::default()).unwrap();
        assert_eq!(aiff.channels(), channels);
        assert_eq!(aiff.bits_per_sample(), bits);
        assert_eq!(aiff.sample_rate(), 44100);
        assert_eq!(aiff.total_frames(), 5000);
        assert_eq!(aiff.channel_mask(), ChannelMask::from_channels(channels));
        assert!(aiff.verify(None).unwrap());
        assert!(!aiff.has_foreign_aiff_chunks().unwrap());

        assert_eq!(decode_all(&aiff), frames.samples());
    }
}

#[test]
fn decode_feeds_encode() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.aiff");
    let second = dir.path().join("second.aiff");

    let mut source = FramesReader::new(sine_frames(2, 16, 3001), 48000);
    let aiff = AiffAudio::from_pcm(&first, &mut source, AiffOptions::default()).unwrap();
    let mut reader = aiff.to_pcm().unwrap();
    AiffAudio::from_pcm(&second, &mut reader, AiffOptions::default()).unwrap();

    assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
}

#[test]
fn pcm_split_reproduces_file() {
    let dir = tempfile::tempdir().unwrap();
    let comm = comm(1, 5, 8, 22050.0);
    let ssnd = ssnd(&[1, 2, 3, 4, 5]);
    let bytes = aiff_bytes(&[
        (b"NAME", b"title", None),
        (b"COMM", &comm, None),
        (b"SSND", &ssnd, None),
        (b"ANNO", b"notes", None),
    ]);
    let path = write_file(dir.path(), "split.aiff", &bytes);
    let aiff = AiffAudio::open(&path).unwrap();

    let (head, tail) = aiff.pcm_split().unwrap();
    let mut rebuilt = head;
    rebuilt.extend(
        decode_all(&aiff)
            .into_iter()
            .map(|s| s as i8 as u8),
    );
    rebuilt.extend_from_slice(&tail);
    assert_eq!(rebuilt, bytes);
}

#[test]
fn chunk_total_size_parity() {
    for size in 0..16u32 {
        let chunk = Chunk::from_data(*b"TEST", vec![0; size as usize]).unwrap();
        let expected = if size % 2 == 1 { size + 9 } else { size + 8 };
        assert_eq!(chunk.total_size(), expected as u64);
    }
}

#[test]
fn verify_rejects_structural_errors() {
    let dir = tempfile::tempdir().unwrap();
    let comm = comm(1, 2, 16, 44100.0);
    let ssnd = ssnd(&[0, 1, 0, 2]);

    let cases: Vec<(&str, Vec<u8>)> = vec![
        (
            "two_comm",
            aiff_bytes(&[(b"COMM", &comm, None), (b"COMM", &comm, None), (b"SSND", &ssnd, None)]),
        ),
        (
            "ssnd_first",
            aiff_bytes(&[(b"SSND", &ssnd, None), (b"COMM", &comm, None)]),
        ),
        ("no_ssnd", aiff_bytes(&[(b"COMM", &comm, None)])),
        (
            "truncated",
            aiff_bytes(&[(b"COMM", &comm, None), (b"SSND", &ssnd, Some(4096))]),
        ),
    ];

    for (name, bytes) in cases {
        let path = write_file(dir.path(), &format!("{}.aiff", name), &bytes);
        let aiff = AiffAudio::open(&path).unwrap();
        assert!(
            matches!(aiff.verify(None), Err(AiffError::InvalidContainer(_))),
            "{} should fail verification",
            name
        );
    }
}

#[test]
fn clean_fixes_order_and_duplicates_in_one_pass() {
    let dir = tempfile::tempdir().unwrap();
    let comm = comm(2, 1, 16, 44100.0);
    let ssnd = ssnd(&[0, 1, 0, 2]);
    let bytes = aiff_bytes(&[
        (b"SSND", &ssnd, None),
        (b"COMM", &comm, None),
        (b"COMM", &comm, None),
        (b"AUTH", b"someone", None),
    ]);
    let path = write_file(dir.path(), "broken.aiff", &bytes);
    let aiff = AiffAudio::open(&path).unwrap();
    assert!(aiff.verify(None).is_err());

    let output = dir.path().join("fixed.aiff");
    let mut fixes = Vec::new();
    let fixed = aiff.clean(&mut fixes, Some(&output)).unwrap().unwrap();

    assert_eq!(fixes.len(), 2);
    assert!(fixes.contains(&"SSND chunk found before fmt".to_string()));
    assert!(fixes.contains(&"multiple COMM chunks found".to_string()));
    assert_eq!(chunk_ids(&fixed), vec![*b"COMM", *b"SSND", *b"AUTH"]);
    assert!(fixed.verify(None).unwrap());
    assert_eq!(decode_all(&fixed), vec![1, 2]);

    // the source is left as it was
    assert_eq!(std::fs::read(&path).unwrap(), bytes);
}

#[test]
fn metadata_append_replace_delete() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tagged.aiff");
    let mut source = FramesReader::new(sine_frames(2, 16, 100), 44100);
    let aiff = AiffAudio::from_pcm(&path, &mut source, AiffOptions::default()).unwrap();
    let untagged = std::fs::read(&path).unwrap();

    let mut fields = BTreeMap::new();
    fields.insert("Title".to_string(), "First".to_string());
    aiff.set_metadata(&Metadata::Fields(fields)).unwrap();

    let ids = chunk_ids(&aiff);
    assert_eq!(ids.len(), 3);
    assert_eq!(ids.last(), Some(b"ID3 "));
    assert_eq!(ids.iter().filter(|id| *id == b"ID3 ").count(), 1);

    let mut metadata = aiff.get_metadata().unwrap().unwrap();
    metadata.set_field("Title", "Second").unwrap();
    metadata.set_field("Artist", "Somebody").unwrap();
    aiff.update_metadata(&metadata).unwrap();
    assert_eq!(chunk_ids(&aiff), ids);
    let stored = aiff.get_metadata().unwrap().unwrap();
    assert_eq!(stored.get_field("Title").as_deref(), Some("Second"));
    assert_eq!(stored.get_field("Artist").as_deref(), Some("Somebody"));

    // audio is untouched by tagging
    assert_eq!(decode_all(&aiff), sine_frames(2, 16, 100).samples());

    aiff.delete_metadata().unwrap();
    let once = std::fs::read(&path).unwrap();
    aiff.delete_metadata().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), once);
    assert_eq!(once, untagged);
}

#[test]
fn oversize_encode_fails_and_leaves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huge.aiff");
    let mut source = FramesReader::new(sine_frames(2, 16, 10_000), 44100);
    let options = AiffOptions {
        max_file_size: 4096,
        ..Default::default()
    };

    let result = AiffAudio::from_pcm(&path, &mut source, options);
    assert!(matches!(result, Err(AiffError::Encoding(_))));
    assert!(!path.exists());
}

#[test]
fn extended_float_sample_rates() {
    for rate in [8000.0, 11025.0, 22050.0, 44100.0, 48000.0, 88200.0, 96000.0, 192000.0] {
        assert_eq!(parse_ieee_extended(&build_ieee_extended(rate)), rate);
    }

    let dir = tempfile::tempdir().unwrap();
    for rate in [8000u32, 44100, 48000, 96000, 192000] {
        let path = dir.path().join(format!("{}.aiff", rate));
        let mut source = FramesReader::new(sine_frames(1, 16, 10), rate);
        let aiff = AiffAudio::from_pcm(&path, &mut source, AiffOptions::default()).unwrap();
        assert_eq!(AiffAudio::open(aiff.path()).unwrap().sample_rate(), rate);
    }
}

#[test]
fn probe_recognizes_signature() {
    let dir = tempfile::tempdir().unwrap();
    let aiff = write_file(dir.path(), "a.aiff", &aiff_bytes(&[]));
    let wav = write_file(dir.path(), "a.wav", b"RIFF\x04\x00\x00\x00WAVE");

    assert!(open(&aiff).unwrap().is_some());
    assert!(open(&wav).unwrap().is_none());
}
