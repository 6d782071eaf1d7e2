use swarmx_core::SwarmError;

/// Fixed compression level so the same input produces the same output
/// bytes on any host (§4.12).
const ZSTD_LEVEL: i32 = 3;

pub fn compress(canonical_json: &[u8]) -> Result<Vec<u8>, SwarmError> {
    zstd::bulk::compress(canonical_json, ZSTD_LEVEL).map_err(|e| SwarmError::Other(e.to_string()))
}

pub fn decompress(compressed: &[u8], expected_len_hint: usize) -> Result<Vec<u8>, SwarmError> {
    zstd::bulk::decompress(compressed, expected_len_hint.max(1024)).map_err(|e| SwarmError::Other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_round_trips() {
        let input = br#"{"epoch":1,"merkle_root":"abc"}"#;
        let compressed = compress(input).unwrap();
        let decompressed = decompress(&compressed, input.len()).unwrap();
        assert_eq!(decompressed, input);
    }

    #[test]
    fn compression_is_deterministic() {
        let input = br#"{"epoch":1,"merkle_root":"abc"}"#;
        assert_eq!(compress(input).unwrap(), compress(input).unwrap());
    }
}
