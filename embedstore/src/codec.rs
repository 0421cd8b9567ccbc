use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};

use crate::StoreError;

const VEC_MAGIC: [u8; 4] = [b'V', b'G', b'E', b'M'];
const VEC_VERSION: u32 = 1;

/// Writes a batch of equal-length vectors in a compact binary format:
///
/// ```text
/// [4B magic "VGEM"] [4B version=1]
/// [4B dim] [4B count]
/// [count x dim x 4B float32]
/// ```
///
/// All multi-byte values are little-endian. A single aggregate is stored as
/// a batch of one.
pub fn write_vectors<V: AsRef<[f32]>>(w: &mut dyn Write, vectors: &[V]) -> Result<(), StoreError> {
    let dim = vectors.first().map(|v| v.as_ref().len()).unwrap_or(0);
    let mut bw = BufWriter::new(w);

    bw.write_all(&VEC_MAGIC)?;
    bw.write_all(&VEC_VERSION.to_le_bytes())?;
    bw.write_all(&(dim as u32).to_le_bytes())?;
    bw.write_all(&(vectors.len() as u32).to_le_bytes())?;

    for v in vectors {
        let v = v.as_ref();
        if v.len() != dim {
            return Err(StoreError::DimensionMismatch {
                expected: dim,
                got: v.len(),
            });
        }
        for &x in v {
            bw.write_all(&x.to_le_bytes())?;
        }
    }

    bw.flush()?;
    Ok(())
}

/// Largest number of elements preallocated from header values; anything
/// beyond grows as the payload is actually read.
const MAX_PREALLOC: usize = 1 << 16;

/// Reads a batch written by [`write_vectors`].
///
/// Header counts are not trusted for allocation: a file whose header claims
/// more data than it holds fails with [`StoreError::InvalidFormat`].
pub fn read_vectors(r: &mut dyn Read) -> Result<Vec<Vec<f32>>, StoreError> {
    let mut br = BufReader::new(r);

    let magic = read_word(&mut br, "magic")?;
    if magic != VEC_MAGIC {
        return Err(StoreError::InvalidFormat(format!("invalid magic {magic:?}")));
    }

    let version = u32::from_le_bytes(read_word(&mut br, "version")?);
    if version != VEC_VERSION {
        return Err(StoreError::InvalidFormat(format!(
            "unsupported version {version} (want {VEC_VERSION})"
        )));
    }

    let dim = u32::from_le_bytes(read_word(&mut br, "header")?) as usize;
    let count = u32::from_le_bytes(read_word(&mut br, "header")?) as usize;
    if dim == 0 && count > 0 {
        return Err(StoreError::InvalidFormat("invalid dimension 0".into()));
    }

    let mut out = Vec::with_capacity(count.min(MAX_PREALLOC));
    for _ in 0..count {
        let mut v = Vec::with_capacity(dim.min(MAX_PREALLOC));
        for _ in 0..dim {
            v.push(f32::from_le_bytes(read_word(&mut br, "payload")?));
        }
        out.push(v);
    }

    // Trailing bytes mean the header lied about the payload.
    let mut rest = [0u8; 1];
    if br.read(&mut rest)? != 0 {
        return Err(StoreError::InvalidFormat("trailing data".into()));
    }

    Ok(out)
}

fn read_word(r: &mut impl Read, what: &str) -> Result<[u8; 4], StoreError> {
    let mut buf = [0u8; 4];
    match r.read_exact(&mut buf) {
        Ok(()) => Ok(buf),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            Err(StoreError::InvalidFormat(format!("truncated {what}")))
        }
        Err(e) => Err(e.into()),
    }
}
