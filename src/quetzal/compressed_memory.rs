//! XOR-RLE compression used by Quetzal `CMem` chunks: dynamic memory is XORed
//! byte-by-byte against the story's original (load-time) dynamic memory, and
//! the result is run-length encoded. A non-zero byte is emitted literally; a
//! zero byte starts a run encoded as `0x00, n-1` for a run of `n` zero bytes.

use crate::error::{ZError, ZResult};

pub fn compress(current: &[u8], original: &[u8]) -> ZResult<Vec<u8>> {
    if current.len() != original.len() {
        return Err(ZError::format(format!(
            "cannot compress: current memory is {} bytes, original is {} bytes",
            current.len(),
            original.len()
        )));
    }

    let mut out = Vec::new();
    let mut i = 0;
    while i < current.len() {
        let xor_byte = current[i] ^ original[i];
        if xor_byte == 0 {
            let start = i;
            while i < current.len() && (current[i] ^ original[i]) == 0 {
                i += 1;
            }
            let mut run = i - start;
            while run > 256 {
                out.push(0);
                out.push(255);
                run -= 256;
            }
            out.push(0);
            out.push((run - 1) as u8);
        } else {
            out.push(xor_byte);
            i += 1;
        }
    }
    Ok(out)
}

pub fn decompress(compressed: &[u8], original: &[u8]) -> ZResult<Vec<u8>> {
    let mut out = Vec::with_capacity(original.len());
    let mut ci = 0;
    while ci < compressed.len() && out.len() < original.len() {
        let byte = compressed[ci];
        ci += 1;
        if byte == 0 {
            let run_length = *compressed
                .get(ci)
                .ok_or_else(|| ZError::format("truncated CMem run"))? as usize
                + 1;
            ci += 1;
            for _ in 0..run_length {
                if out.len() >= original.len() {
                    return Err(ZError::format("CMem run extends beyond dynamic memory"));
                }
                out.push(original[out.len()]);
            }
        } else {
            if out.len() >= original.len() {
                return Err(ZError::format("CMem data extends beyond dynamic memory"));
            }
            out.push(original[out.len()] ^ byte);
        }
    }
    out.extend_from_slice(&original[out.len()..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scattered_changes() {
        let original = vec![0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80];
        let mut current = original.clone();
        current[1] = 0x21;
        current[6] = 0x71;

        let compressed = compress(&current, &original).unwrap();
        let restored = decompress(&compressed, &original).unwrap();
        assert_eq!(current, restored);
    }

    #[test]
    fn compresses_long_runs_of_zeros() {
        let original = vec![0xFFu8; 1000];
        let mut current = original.clone();
        current[500] = 0xFE;

        let compressed = compress(&current, &original).unwrap();
        assert!(compressed.len() < current.len());
        assert_eq!(decompress(&compressed, &original).unwrap(), current);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        assert!(compress(&[1, 2, 3], &[1, 2]).is_err());
    }
}
