//! Blank-line delimited event framing
//!
//! Both the binding watch channel and the migration body use the same wire
//! shape: text blocks made of `field: value` lines, each block terminated by
//! an empty line, with the payload on `data:` lines.

use super::decoder::Utf8StreamDecoder;

/// Carry-over buffer that cuts decoded text into complete blocks.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    buffer: String,
    // Bytes before this offset are known not to start a delimiter.
    scan_from: usize,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text and return every block completed by it, in order.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        let mut blocks = Vec::new();
        while let Some((end, delimiter_len)) = self.find_delimiter() {
            blocks.push(self.buffer[..end].to_string());
            self.buffer.drain(..end + delimiter_len);
            self.scan_from = 0;
        }
        // A delimiter can straddle the next chunk by at most two bytes.
        self.scan_from = self.buffer.len().saturating_sub(2);
        blocks
    }

    /// End of stream: return the unterminated tail if it holds anything.
    pub fn finish(&mut self) -> Option<String> {
        self.scan_from = 0;
        let tail = std::mem::take(&mut self.buffer);
        if tail.trim().is_empty() {
            None
        } else {
            Some(tail)
        }
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn find_delimiter(&self) -> Option<(usize, usize)> {
        let bytes = self.buffer.as_bytes();
        let mut i = self.scan_from;
        while i + 1 < bytes.len() {
            if bytes[i] == b'\n' {
                if bytes[i + 1] == b'\n' {
                    return Some((i, 2));
                }
                if bytes[i + 1] == b'\r' && bytes.get(i + 2) == Some(&b'\n') {
                    return Some((i, 3));
                }
            }
            i += 1;
        }
        None
    }
}

/// One parsed event block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    /// Parse a block. Blocks without any `data:` line (keep-alives, comments)
    /// yield `None`.
    pub fn parse(block: &str) -> Option<Self> {
        let mut event = None;
        let mut data: Option<String> = None;

        for line in block.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "data" => match data.as_mut() {
                    Some(existing) => {
                        existing.push('\n');
                        existing.push_str(value);
                    }
                    None => data = Some(value.to_string()),
                },
                "event" => event = Some(value.to_string()),
                _ => {}
            }
        }

        data.map(|data| SseFrame { event, data })
    }
}

/// Bytes in, complete frames out.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    text: Utf8StreamDecoder,
    splitter: FrameSplitter,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let text = self.text.decode(chunk);
        self.splitter
            .push(&text)
            .iter()
            .filter_map(|block| SseFrame::parse(block))
            .collect()
    }

    /// Flush decoder and carry-over buffer once the stream has ended.
    pub fn finish(&mut self) -> Vec<SseFrame> {
        let tail = self.text.finish();
        let mut frames: Vec<SseFrame> = self
            .splitter
            .push(&tail)
            .iter()
            .filter_map(|block| SseFrame::parse(block))
            .collect();
        if let Some(rest) = self.splitter.finish() {
            frames.extend(SseFrame::parse(&rest));
        }
        frames
    }
}
