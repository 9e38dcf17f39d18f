pub use crate::dprintln; // Make the macro available
pub use crate::error::{AiffError, Result};
pub use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

pub use std::fs::File;
pub use std::io::{Cursor, Read, Seek, SeekFrom, Write};
pub use std::path::{Path, PathBuf};
