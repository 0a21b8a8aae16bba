//! Incremental SSE Line Parser
//!
//! Splits an event-stream byte feed into `data:` payloads. Lines without
//! the prefix are implementation chatter and dropped; the `[DONE]`
//! sentinel is passed through for the caller to terminate on.

/// Buffers partial lines across feeds and drains complete payloads.
#[derive(Debug, Default)]
pub struct SseLineParser {
    buffer: Vec<u8>,
}

impl SseLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return the `data:` payloads of completed lines.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let Ok(line) = std::str::from_utf8(&line) else {
                continue;
            };
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(payload) = line.strip_prefix("data:") {
                let payload = payload.trim();
                if !payload.is_empty() {
                    payloads.push(payload.to_string());
                }
            }
        }
        payloads
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
