//! Value transforms applied to bloom bit vectors before they hit the store.

use std::fmt::Debug;

use crate::error::KeyspaceError;

/// Reversible byte transform for stored values.
pub trait Compressor: Debug + Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, KeyspaceError>;

    /// Restores a value compressed by [`Compressor::compress`]. `expected_len`
    /// is the uncompressed length the caller knows the value must have.
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>, KeyspaceError>;
}

/// Sparse bitset encoding used for bloom bits by geth-compatible databases.
///
/// The non-zero bytes of the input are kept verbatim and prefixed by a bitmap
/// of their positions, which is itself encoded recursively. Bloom bit vectors
/// are mostly zero, so this is far smaller than a general purpose codec.
/// Inputs that would not shrink are stored as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct BitsetCompressor;

impl Compressor for BitsetCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, KeyspaceError> {
        let out = bitset_encode_bytes(data);
        if out.len() < data.len() {
            return Ok(out);
        }
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>, KeyspaceError> {
        if data.len() > expected_len {
            return Err(exceeded_target(expected_len));
        }
        if data.len() == expected_len {
            return Ok(data.to_vec());
        }
        let (out, consumed) = bitset_decode_partial_bytes(data, expected_len)?;
        if consumed != data.len() {
            return Err(KeyspaceError::Compression(format!(
                "unreferenced data: consumed {consumed} of {} bytes",
                data.len()
            )));
        }
        Ok(out)
    }
}

/// Snappy block format, for stores that prefer a general purpose codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnappyCompressor;

impl Compressor for SnappyCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, KeyspaceError> {
        Ok(snap::raw::Encoder::new().compress_vec(data)?)
    }

    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>, KeyspaceError> {
        let out = snap::raw::Decoder::new().decompress_vec(data)?;
        if out.len() != expected_len {
            return Err(KeyspaceError::Compression(format!(
                "snappy value has length {} (expected {expected_len})",
                out.len()
            )));
        }
        Ok(out)
    }
}

fn exceeded_target(target: usize) -> KeyspaceError {
    KeyspaceError::Compression(format!("data exceeds target length {target}"))
}

fn bitset_encode_bytes(data: &[u8]) -> Vec<u8> {
    match data {
        [] | [0] => return Vec::new(),
        [_] => return data.to_vec(),
        _ => {}
    }
    let mut non_zero_bitset = vec![0u8; data.len().div_ceil(8)];
    let mut non_zero_bytes = Vec::with_capacity(data.len());
    for (i, &byte) in data.iter().enumerate() {
        if byte != 0 {
            non_zero_bytes.push(byte);
            non_zero_bitset[i / 8] |= 1 << (7 - i % 8);
        }
    }
    if non_zero_bytes.is_empty() {
        return Vec::new();
    }
    let mut out = bitset_encode_bytes(&non_zero_bitset);
    out.extend_from_slice(&non_zero_bytes);
    out
}

/// Decodes a prefix of `data` into `target` bytes, returning how many input
/// bytes were consumed.
fn bitset_decode_partial_bytes(
    data: &[u8],
    target: usize,
) -> Result<(Vec<u8>, usize), KeyspaceError> {
    if target == 0 {
        return Ok((Vec::new(), 0));
    }
    let mut decomp = vec![0u8; target];
    let Some(&first) = data.first() else {
        return Ok((decomp, 0));
    };
    if target == 1 {
        decomp[0] = first;
        return Ok((decomp, usize::from(first != 0)));
    }

    let (non_zero_bitset, mut ptr) = bitset_decode_partial_bytes(data, target.div_ceil(8))?;
    for i in 0..8 * non_zero_bitset.len() {
        if non_zero_bitset[i / 8] & (1 << (7 - i % 8)) == 0 {
            continue;
        }
        let byte = *data
            .get(ptr)
            .ok_or_else(|| KeyspaceError::Compression("missing bytes on input".to_string()))?;
        if i >= decomp.len() {
            return Err(exceeded_target(target));
        }
        if byte == 0 {
            return Err(KeyspaceError::Compression(
                "zero byte in non-zero content".to_string(),
            ));
        }
        decomp[i] = byte;
        ptr += 1;
    }
    Ok((decomp, ptr))
}
