//! Model codec.
//!
//! A model is a flat vector of IEEE-754 f32 weights. The wire and
//! on-disk representation is a contiguous little-endian byte buffer
//! with no header and no checksum: `decode` followed by `encode` is
//! the identity on any buffer it accepts.

use byteorder::{ByteOrder, LittleEndian};
use rayon::prelude::*;

use crate::error::CoreError;

/// Encodes a model vector into its little-endian byte representation.
///
/// The inverse of [`decode`]. Always succeeds: every `f32` has a
/// well-defined 4-byte encoding.
pub fn encode(weights: &[f32]) -> Vec<u8> {
    let mut bytes = vec![0u8; weights.len() * 4];
    bytes
        .par_chunks_mut(4)
        .zip(weights)
        .for_each(|(chunk, w)| LittleEndian::write_f32(chunk, *w));
    bytes
}

/// Decodes a little-endian byte buffer into a model vector.
///
/// Fails with [`CoreError::MalformedModel`] when `bytes.len()` is not
/// a multiple of 4, per the wire contract. A zero-length buffer is a
/// multiple of 4 and decodes to an empty vector; callers that need a
/// nonzero model size reject that separately via [`check_len`].
pub fn decode(bytes: &[u8]) -> Result<Vec<f32>, CoreError> {
    if bytes.len() % 4 != 0 {
        return Err(CoreError::MalformedModel(bytes.len()));
    }
    Ok(bytes
        .par_chunks(4)
        .map(LittleEndian::read_f32)
        .collect::<Vec<_>>())
}

/// Validates that a decoded model has the expected length `n`.
pub fn check_len(weights: &[f32], n: usize) -> Result<(), CoreError> {
    if weights.len() != n {
        return Err(CoreError::ModelSizeMismatch {
            expected: n * 4,
            actual: weights.len() * 4,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_identity() {
        let weights = vec![0.0_f32, 1.5, -3.25, f32::MIN_POSITIVE, -0.0];
        let bytes = encode(&weights);
        assert_eq!(bytes.len(), weights.len() * 4);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, weights);
    }

    #[test]
    fn decode_rejects_length_not_multiple_of_four() {
        let bytes = vec![0u8; 9];
        assert_eq!(decode(&bytes), Err(CoreError::MalformedModel(9)));
    }

    #[test]
    fn decode_accepts_empty_buffer_as_the_zero_length_model() {
        assert_eq!(decode(&[]).unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn check_len_flags_mismatch() {
        let weights = vec![1.0_f32, 2.0, 3.0];
        assert!(check_len(&weights, 3).is_ok());
        assert!(check_len(&weights, 4).is_err());
    }
}
