//! Incremental UTF-8 decoding for chunked response bodies

use std::char::REPLACEMENT_CHARACTER;

/// Decodes UTF-8 across chunk boundaries.
///
/// A multi-byte character split between two reads is held back until the rest
/// of it arrives. Invalid sequences decode to U+FFFD, like a browser
/// `TextDecoder` in non-fatal mode.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk, carrying any incomplete trailing sequence forward.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(invalid_len) => {
                            out.push(REPLACEMENT_CHARACTER);
                            rest = &after[invalid_len..];
                        }
                        None => {
                            // Truncated sequence at the end of the chunk.
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end of stream. A dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            REPLACEMENT_CHARACTER.to_string()
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multibyte_split_across_chunks() {
        let text = "迁移完成 ✓";
        let bytes = text.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = Utf8StreamDecoder::new();
            let mut out = decoder.decode(&bytes[..split]);
            out.push_str(&decoder.decode(&bytes[split..]));
            out.push_str(&decoder.finish());
            assert_eq!(out, text, "split at byte {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let text = "données → 数据";
        let mut decoder = Utf8StreamDecoder::new();
        let out: String = text
            .as_bytes()
            .iter()
            .map(|b| decoder.decode(std::slice::from_ref(b)))
            .collect();
        assert_eq!(out, text);
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut decoder = Utf8StreamDecoder::new();
        let out = decoder.decode(b"ok\xFFok");
        assert_eq!(out, "ok\u{FFFD}ok");
    }

    #[test]
    fn test_truncated_tail_is_flushed_as_replacement() {
        let mut decoder = Utf8StreamDecoder::new();
        let out = decoder.decode(&"数".as_bytes()[..2]);
        assert_eq!(out, "");
        assert!(decoder.has_pending());
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert!(!decoder.has_pending());
    }
}
