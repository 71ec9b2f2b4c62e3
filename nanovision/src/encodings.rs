//! The file `learn-faces` writes: who is who, as two parallel lists.
//!
//! Layout, every integer little endian:
//!
//! ```text
//! magic    b"NVFE"
//! version  u16 (1)
//! count    u32
//! count times:
//!   name_len u32, name bytes (utf-8)
//!   dims     u32, dims * f64
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::{Encoding, Error, Result};

pub const MAGIC: &[u8; 4] = b"NVFE";
pub const VERSION: u16 = 1;

/// Names and face encodings, `names[i]` is the person behind
/// `encodings[i]`.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FaceEncodings {
    names: Vec<String>,
    encodings: Vec<Encoding>,
}

impl FaceEncodings {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, name: impl Into<String>, encoding: Encoding) {
        self.names.push(name.into());
        self.encodings.push(encoding);
    }

    pub fn names(&self) -> &[String] { &self.names }

    pub fn encodings(&self) -> &[Encoding] { &self.encodings }

    pub fn len(&self) -> usize { self.names.len() }

    pub fn is_empty(&self) -> bool { self.names.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Encoding)> {
        self.names.iter().map(String::as_str).zip(self.encodings.iter())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.write_to(&mut out)?;
        out.flush()?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::read_from(&mut BufReader::new(File::open(path)?))
    }

    pub fn write_to(&self, w: &mut impl Write) -> Result<()> {
        w.write_all(MAGIC)?;
        w.write_all(&VERSION.to_le_bytes())?;
        write_len(w, self.len())?;
        for (name, encoding) in self.iter() {
            write_len(w, name.len())?;
            w.write_all(name.as_bytes())?;
            write_len(w, encoding.len())?;
            for v in encoding {
                w.write_all(&v.to_le_bytes())?;
            }
        }
        Ok(())
    }

    pub fn read_from(r: &mut impl Read) -> Result<Self> {
        let mut magic = [0; 4];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::Format("not a face encodings file".into()));
        }
        let mut version = [0; 2];
        r.read_exact(&mut version)?;
        let version = u16::from_le_bytes(version);
        if version != VERSION {
            return Err(Error::Format(format!(
                "unsupported version {}",
                version
            )));
        }
        let count = read_u32(r)? as usize;
        let mut data = Self::new();
        for _ in 0..count {
            let name_len = read_u32(r)? as usize;
            let mut name = Vec::new();
            r.by_ref().take(name_len as u64).read_to_end(&mut name)?;
            if name.len() != name_len {
                return Err(Error::Format("truncated name".into()));
            }
            let name = String::from_utf8(name)
                .map_err(|e| Error::Format(format!("bad name: {}", e)))?;
            let dims = read_u32(r)? as usize;
            let mut encoding = Vec::new();
            for _ in 0..dims {
                let mut v = [0; 8];
                r.read_exact(&mut v)?;
                encoding.push(f64::from_le_bytes(v));
            }
            data.push(name, encoding);
        }
        Ok(data)
    }
}

fn write_len(w: &mut impl Write, len: usize) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| Error::Format(format!("{} does not fit in a u32", len)))?;
    w.write_all(&len.to_le_bytes())?;
    Ok(())
}

fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut b = [0; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}
