//! Incremental decoding of a chat reply body.
//!
//! [`StreamDecoder`] is fed the body one network chunk at a time and returns,
//! per chunk, the text that can be committed to the message and the image
//! URL if the frame completed in that chunk. Text that might still turn out
//! to be part of the image frame is held back until it can be classified, so
//! the outcome does not depend on where the transport split the body.

use std::mem;

use super::{ FRAME_SEPARATOR, IMAGE_MARKER, MAX_FRAME_URL_LEN };

/// UTF-8 decoding across chunk boundaries.
///
/// Incomplete trailing sequences are kept for the next chunk; invalid bytes
/// become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // incomplete sequence at the end, wait for more bytes
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }

    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        char::REPLACEMENT_CHARACTER.to_string()
    }
}

/// What one chunk contributes to the active assistant message.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecodedChunk {
    pub image_url: Option<String>,
    pub text: String,
}

impl DecodedChunk {
    pub fn is_empty(&self) -> bool {
        self.image_url.is_none() && self.text.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No frame seen yet.
    Scanning,
    /// Frame consumed; this many separator bytes matched so far.
    Separator(usize),
    Passthrough,
}

#[derive(Debug)]
pub struct StreamDecoder {
    utf8: Utf8StreamDecoder,
    phase: Phase,
    held: String,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            utf8: Utf8StreamDecoder::new(),
            phase: Phase::Scanning,
            held: String::new(),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> DecodedChunk {
        let text = self.utf8.decode(chunk);
        let mut out = DecodedChunk::default();
        self.feed(&text, &mut out);
        out
    }

    /// Flushes everything still held back. Call once at end of input.
    pub fn finish(&mut self) -> DecodedChunk {
        let tail = self.utf8.finish();
        let mut out = DecodedChunk::default();
        self.feed(&tail, &mut out);

        match self.phase {
            Phase::Scanning => out.text.push_str(&mem::take(&mut self.held)),
            Phase::Separator(matched) => out.text.push_str(&FRAME_SEPARATOR[..matched]),
            Phase::Passthrough => {}
        }
        self.phase = Phase::Passthrough;
        out
    }

    fn feed(&mut self, text: &str, out: &mut DecodedChunk) {
        match self.phase {
            Phase::Passthrough => out.text.push_str(text),
            Phase::Separator(_) => self.strip_separator(text, out),
            Phase::Scanning => {
                self.held.push_str(text);
                self.scan(out);
            }
        }
    }

    fn scan(&mut self, out: &mut DecodedChunk) {
        loop {
            let Some(start) = self.held.find(IMAGE_MARKER) else {
                let keep = partial_marker_suffix(&self.held);
                let emit = self.held.len() - keep;
                out.text.push_str(&self.held[..emit]);
                self.held.drain(..emit);
                return;
            };

            out.text.push_str(&self.held[..start]);
            self.held.drain(..start);

            match classify_open_frame(&self.held[IMAGE_MARKER.len()..]) {
                OpenFrame::Complete { url_len } => {
                    let url_start = IMAGE_MARKER.len();
                    let url = &self.held[url_start..url_start + url_len];
                    if !url.is_empty() {
                        out.image_url = Some(url.to_string());
                    }
                    self.held.drain(..url_start + url_len + IMAGE_MARKER.len());
                    self.phase = Phase::Separator(0);
                    let rest = mem::take(&mut self.held);
                    self.strip_separator(&rest, out);
                    return;
                }
                OpenFrame::NotAFrame => {
                    out.text.push_str(IMAGE_MARKER);
                    self.held.drain(..IMAGE_MARKER.len());
                }
                OpenFrame::Pending => {
                    return;
                }
            }
        }
    }

    fn strip_separator(&mut self, text: &str, out: &mut DecodedChunk) {
        let Phase::Separator(mut matched) = self.phase else {
            out.text.push_str(text);
            return;
        };
        let sep = FRAME_SEPARATOR.as_bytes();
        let bytes = text.as_bytes();
        let mut i = 0;
        while matched < sep.len() && i < bytes.len() && bytes[i] == sep[matched] {
            matched += 1;
            i += 1;
        }

        if matched == sep.len() {
            self.phase = Phase::Passthrough;
            out.text.push_str(&text[i..]);
        } else if i == bytes.len() {
            self.phase = Phase::Separator(matched);
        } else {
            self.phase = Phase::Passthrough;
            out.text.push_str(&FRAME_SEPARATOR[..matched]);
            out.text.push_str(&text[i..]);
        }
    }
}

enum OpenFrame {
    Complete {
        url_len: usize,
    },
    NotAFrame,
    Pending,
}

/// `after_open` is the text following an opening delimiter.
fn classify_open_frame(after_open: &str) -> OpenFrame {
    let close = after_open.find(IMAGE_MARKER).filter(|&end| end <= MAX_FRAME_URL_LEN);
    let newline = after_open.find('\n');

    match (close, newline) {
        (Some(end), Some(nl)) if nl < end => OpenFrame::NotAFrame,
        (Some(end), _) => OpenFrame::Complete { url_len: end },
        (None, Some(_)) => OpenFrame::NotAFrame,
        (None, None) if after_open.len() >= MAX_FRAME_URL_LEN + IMAGE_MARKER.len() => {
            OpenFrame::NotAFrame
        }
        (None, None) => OpenFrame::Pending,
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of the
/// delimiter.
fn partial_marker_suffix(text: &str) -> usize {
    let max = (IMAGE_MARKER.len() - 1).min(text.len());
    (1..=max)
        .rev()
        .find(|&k| text.ends_with(&IMAGE_MARKER[..k]))
        .unwrap_or(0)
}
