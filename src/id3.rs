//! Minimal ID3v2.2 tag support for the `ID3 ` chunk.
//!
//! Only the tag container and text frames are interpreted; every other
//! frame is carried through as raw bytes.

use crate::prelude::*;
use std::collections::BTreeMap;

const ID3_MAGIC: &[u8; 3] = b"ID3";
const ID3V22_MAJOR: u8 = 2;
const TAG_HEADER_SIZE: usize = 10;
const FRAME_HEADER_SIZE: usize = 6;
const MAX_SYNCSAFE: usize = 0x0FFF_FFFF;

const ENCODING_LATIN1: u8 = 0;
const ENCODING_UTF16: u8 = 1;

// ID3v2.2 frame id -> field name
const FRAME_NAMES: &[(&[u8; 3], &str)] = &[
    (b"TT2", "Title"),
    (b"TP1", "Artist"),
    (b"TAL", "Album"),
    (b"TYE", "Year"),
    (b"TCO", "Genre"),
    (b"TRK", "Track"),
    (b"TPA", "DiscNumber"),
    (b"COM", "Comment"),
    (b"TP2", "AlbumArtist"),
    (b"TT1", "ContentGroup"),
    (b"TT3", "Subtitle"),
    (b"TP3", "Conductor"),
    (b"TP4", "ModifiedBy"),
    (b"TCM", "Composer"),
    (b"TCR", "Copyright"),
    (b"TPB", "Publisher"),
    (b"TRC", "ISRC"),
];

fn field_name(frame_id: &[u8; 3]) -> Option<&'static str> {
    FRAME_NAMES
        .iter()
        .find(|(id, _)| *id == frame_id)
        .map(|(_, name)| *name)
}

fn frame_id_for(field: &str) -> Option<[u8; 3]> {
    FRAME_NAMES
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(field))
        .map(|(id, _)| **id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Id3v22Frame {
    pub id: [u8; 3],
    pub data: Vec<u8>,
}

impl Id3v22Frame {
    pub fn text(id: [u8; 3], value: &str) -> Self {
        let mut data = Vec::new();
        if &id == b"COM" {
            data.push(encoding_for(value));
            data.extend_from_slice(b"eng");
            // empty description
            encode_text(&mut data, "", encoding_for(value));
            terminate(&mut data, encoding_for(value));
        } else {
            data.push(encoding_for(value));
        }
        encode_text(&mut data, value, encoding_for(value));
        Self { id, data }
    }

    pub fn is_text(&self) -> bool {
        self.id[0] == b'T' || &self.id == b"COM"
    }

    pub fn name(&self) -> String {
        field_name(&self.id)
            .map(str::to_string)
            .unwrap_or_else(|| String::from_utf8_lossy(&self.id).to_string())
    }

    /// The frame's text, or `None` for non-text frames.
    pub fn value(&self) -> Option<String> {
        if !self.is_text() || self.data.is_empty() {
            return None;
        }
        let encoding = self.data[0];
        let body = &self.data[1..];
        if &self.id == b"COM" {
            // language, then a terminated description, then the comment
            let body = body.get(3..)?;
            let (_, rest) = split_terminated(body, encoding);
            return Some(decode_text(rest, encoding));
        }
        Some(decode_text(body, encoding))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Id3v22Tag {
    frames: Vec<Id3v22Frame>,
}

impl Id3v22Tag {
    pub fn new(frames: Vec<Id3v22Frame>) -> Self {
        Self { frames }
    }

    pub fn parse<T: Read>(reader: &mut T) -> Result<Self> {
        let mut header = [0u8; TAG_HEADER_SIZE];
        reader
            .read_exact(&mut header)
            .map_err(|_| AiffError::invalid("invalid ID3v2.2 tag"))?;
        if &header[0..3] != ID3_MAGIC || header[3] != ID3V22_MAJOR {
            return Err(AiffError::invalid("invalid ID3v2.2 tag"));
        }
        let size = decode_syncsafe(&header[6..10]);

        let mut body = vec![0u8; size];
        reader
            .read_exact(&mut body)
            .map_err(|_| AiffError::invalid("ID3v2.2 tag ends prematurely"))?;

        let mut frames = Vec::new();
        let mut offset = 0;
        while offset + FRAME_HEADER_SIZE <= body.len() {
            if body[offset] == 0 {
                break; // padding
            }
            let id = [body[offset], body[offset + 1], body[offset + 2]];
            let frame_size = ((body[offset + 3] as usize) << 16)
                | ((body[offset + 4] as usize) << 8)
                | (body[offset + 5] as usize);
            let start = offset + FRAME_HEADER_SIZE;
            if start + frame_size > body.len() {
                return Err(AiffError::invalid(format!(
                    "ID3v2.2 frame {} overruns its tag",
                    String::from_utf8_lossy(&id)
                )));
            }
            frames.push(Id3v22Frame {
                id,
                data: body[start..start + frame_size].to_vec(),
            });
            offset = start + frame_size;
        }

        Ok(Self { frames })
    }

    pub fn build<W: Write>(&self, out: &mut W) -> Result<()> {
        let body_size: usize = self
            .frames
            .iter()
            .map(|frame| FRAME_HEADER_SIZE + frame.data.len())
            .sum();
        if body_size > MAX_SYNCSAFE {
            return Err(AiffError::encoding("ID3v2.2 tag too large"));
        }

        out.write_all(ID3_MAGIC)?;
        out.write_all(&[ID3V22_MAJOR, 0, 0])?;
        out.write_all(&encode_syncsafe(body_size))?;
        for frame in &self.frames {
            if frame.data.len() > 0xFF_FFFF {
                return Err(AiffError::encoding("ID3v2.2 frame too large"));
            }
            out.write_all(&frame.id)?;
            out.write_all(&(frame.data.len() as u32).to_be_bytes()[1..])?;
            out.write_all(&frame.data)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.build(&mut out)?;
        Ok(out)
    }

    pub fn frames(&self) -> &[Id3v22Frame] {
        &self.frames
    }

    pub fn get_field(&self, field: &str) -> Option<String> {
        let id = frame_id_for(field)?;
        self.frames.iter().find(|f| f.id == id).and_then(|f| f.value())
    }

    /// Replaces the frame for `field`, or appends one.
    pub fn set_field(&mut self, field: &str, value: &str) -> Result<()> {
        let id = frame_id_for(field)
            .ok_or_else(|| AiffError::encoding(format!("no ID3v2.2 frame for field {}", field)))?;
        let frame = Id3v22Frame::text(id, value);
        match self.frames.iter_mut().find(|f| f.id == id) {
            Some(existing) => *existing = frame,
            None => self.frames.push(frame),
        }
        Ok(())
    }

    pub fn get_all_fields(&self) -> BTreeMap<String, String> {
        self.frames
            .iter()
            .filter_map(|f| f.value().map(|v| (f.name(), v)))
            .collect()
    }

    /// A copy with whitespace trimmed from text frames and empty text
    /// frames removed. Each change is appended to `fixes`.
    pub fn cleaned(&self, fixes: &mut Vec<String>) -> Self {
        let mut frames = Vec::with_capacity(self.frames.len());
        for frame in &self.frames {
            let Some(value) = frame.value() else {
                frames.push(frame.clone());
                continue;
            };
            let name = frame.name();

            let trimmed = value.trim_start();
            if trimmed.len() != value.len() {
                fixes.push(format!("removed leading whitespace from {}", name));
            }
            let fixed = trimmed.trim_end();
            if fixed.len() != trimmed.len() {
                fixes.push(format!("removed trailing whitespace from {}", name));
            }

            if fixed.is_empty() {
                fixes.push(format!("removed empty field {}", name));
            } else if fixed.len() != value.len() {
                frames.push(Id3v22Frame::text(frame.id, fixed));
            } else {
                frames.push(frame.clone());
            }
        }
        Self { frames }
    }

    /// Builds a tag from any metadata; an ID3v2.2 tag is copied as is.
    pub fn converted(metadata: &Metadata) -> Self {
        match metadata {
            Metadata::Id3(tag) => tag.clone(),
            Metadata::Fields(fields) => {
                let frames = fields
                    .iter()
                    .filter(|(_, value)| !value.is_empty())
                    .filter_map(|(key, value)| {
                        frame_id_for(key).map(|id| Id3v22Frame::text(id, value))
                    })
                    .collect();
                Self { frames }
            }
        }
    }
}

/// Track metadata, either as read from an AIFF file or as plain fields
/// supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metadata {
    /// A tag taken from an AIFF file's `ID3 ` chunk.
    Id3(Id3v22Tag),
    /// Generic field name to value pairs, e.g. `"Title"`.
    Fields(BTreeMap<String, String>),
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata::Fields(BTreeMap::new())
    }
}

impl Metadata {
    pub fn get_field(&self, field: &str) -> Option<String> {
        match self {
            Metadata::Id3(tag) => tag.get_field(field),
            Metadata::Fields(fields) => fields
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(field))
                .map(|(_, value)| value.clone()),
        }
    }

    pub fn set_field(&mut self, field: &str, value: &str) -> Result<()> {
        match self {
            Metadata::Id3(tag) => tag.set_field(field, value),
            Metadata::Fields(fields) => {
                fields.insert(field.to_string(), value.to_string());
                Ok(())
            }
        }
    }

    pub fn get_all_fields(&self) -> BTreeMap<String, String> {
        match self {
            Metadata::Id3(tag) => tag.get_all_fields(),
            Metadata::Fields(fields) => fields.clone(),
        }
    }
}

fn decode_syncsafe(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .fold(0usize, |acc, &b| (acc << 7) | (b & 0x7F) as usize)
}

fn encode_syncsafe(value: usize) -> [u8; 4] {
    [
        ((value >> 21) & 0x7F) as u8,
        ((value >> 14) & 0x7F) as u8,
        ((value >> 7) & 0x7F) as u8,
        (value & 0x7F) as u8,
    ]
}

fn encoding_for(value: &str) -> u8 {
    if value.chars().all(|c| (c as u32) < 0x100) {
        ENCODING_LATIN1
    } else {
        ENCODING_UTF16
    }
}

fn encode_text(out: &mut Vec<u8>, value: &str, encoding: u8) {
    match encoding {
        ENCODING_LATIN1 => out.extend(value.chars().map(|c| c as u32 as u8)),
        _ => {
            if value.is_empty() {
                return;
            }
            out.extend_from_slice(&[0xFE, 0xFF]);
            for unit in value.encode_utf16() {
                out.extend_from_slice(&unit.to_be_bytes());
            }
        }
    }
}

fn terminate(out: &mut Vec<u8>, encoding: u8) {
    match encoding {
        ENCODING_LATIN1 => out.push(0),
        _ => out.extend_from_slice(&[0, 0]),
    }
}

/// Splits at the first string terminator for `encoding`, dropping it.
fn split_terminated(data: &[u8], encoding: u8) -> (&[u8], &[u8]) {
    if encoding == ENCODING_LATIN1 || encoding == 3 {
        match data.iter().position(|&b| b == 0) {
            Some(i) => (&data[..i], &data[i + 1..]),
            None => (data, &[]),
        }
    } else {
        let mut i = 0;
        while i + 1 < data.len() {
            if data[i] == 0 && data[i + 1] == 0 {
                return (&data[..i], &data[i + 2..]);
            }
            i += 2;
        }
        (data, &[])
    }
}

fn decode_text(data: &[u8], encoding: u8) -> String {
    let text = match encoding {
        ENCODING_LATIN1 => data.iter().map(|&b| b as char).collect(),
        ENCODING_UTF16 => {
            // byte order mark decides endianness, big-endian if absent
            let (body, big_endian) = match data {
                [0xFF, 0xFE, rest @ ..] => (rest, false),
                [0xFE, 0xFF, rest @ ..] => (rest, true),
                _ => (data, true),
            };
            let units = body.chunks_exact(2).map(|pair| {
                if big_endian {
                    u16::from_be_bytes([pair[0], pair[1]])
                } else {
                    u16::from_le_bytes([pair[0], pair[1]])
                }
            });
            char::decode_utf16(units)
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
        _ => String::from_utf8_lossy(data).to_string(),
    };
    text.trim_end_matches('\0').to_string()
}
