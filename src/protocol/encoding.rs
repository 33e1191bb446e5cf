//! Canonical binary serialization.
//!
//! Integers are little-endian and fixed width; counts, lengths and object
//! instances are unsigned LEB128 varints; optionals carry a `0`/`1` prefix.
//! The byte layout is what the node deserializes and signs over, so field
//! order in every `ChainEncode` impl is part of the wire contract.

use serde::{Deserialize, Serialize};
use std::io::{Error, Write};

use crate::blockchain::types::{ChainResult, ObjectId};

/// Data which can be encoded in the chain's canonical binary format.
pub trait ChainEncode {
    /// Encode into `w`, returning the number of bytes written.
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error>;
}

/// Encode an object into a vector.
pub fn serialize<T: ChainEncode + ?Sized>(data: &T) -> ChainResult<Vec<u8>> {
    let mut buf = Vec::new();
    data.encode(&mut buf)?;
    Ok(buf)
}

/// Write an unsigned LEB128 varint.
pub fn write_varint<W: Write>(w: &mut W, mut value: u64) -> Result<usize, Error> {
    let mut written = 0;
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        w.write_all(&[byte])?;
        written += 1;
        if value == 0 {
            return Ok(written);
        }
    }
}

macro_rules! impl_fixed_le {
    ($($ty:ty),*) => {
        $(
            impl ChainEncode for $ty {
                #[inline]
                fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
                    let bytes = self.to_le_bytes();
                    w.write_all(&bytes)?;
                    Ok(bytes.len())
                }
            }
        )*
    };
}

impl_fixed_le!(u8, u16, u32, u64, i64);

impl ChainEncode for bool {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        (*self as u8).encode(w)
    }
}

impl ChainEncode for str {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        let len = write_varint(w, self.len() as u64)?;
        w.write_all(self.as_bytes())?;
        Ok(len + self.len())
    }
}

impl ChainEncode for String {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        self.as_str().encode(w)
    }
}

impl<T: ChainEncode> ChainEncode for Vec<T> {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        let mut len = write_varint(w, self.len() as u64)?;
        for item in self {
            len += item.encode(w)?;
        }
        Ok(len)
    }
}

impl<T: ChainEncode> ChainEncode for Option<T> {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        match self {
            Some(v) => Ok(1u8.encode(w)? + v.encode(w)?),
            None => 0u8.encode(w),
        }
    }
}

/// Object ids go on the wire as the varint of their instance only.
impl ChainEncode for ObjectId {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        write_varint(w, self.instance)
    }
}

/// Byte blobs: varint length followed by the raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bytes(pub Vec<u8>);

impl ChainEncode for Bytes {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        let len = write_varint(w, self.0.len() as u64)?;
        w.write_all(&self.0)?;
        Ok(len + self.0.len())
    }
}

impl Serialize for Bytes {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map(Bytes).map_err(serde::de::Error::custom)
    }
}

/// Future extensions slot; always empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<serde_json::Value>", into = "Vec<serde_json::Value>")]
pub struct Extensions;

impl From<Vec<serde_json::Value>> for Extensions {
    fn from(_: Vec<serde_json::Value>) -> Self {
        Extensions
    }
}

impl From<Extensions> for Vec<serde_json::Value> {
    fn from(_: Extensions) -> Self {
        Vec::new()
    }
}

impl ChainEncode for Extensions {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        write_varint(w, 0)
    }
}
