//! Wire format of a `/api/chat` response body.
//!
//! A body is an optional image frame followed by raw completion text:
//!
//! ```text
//! !IMAGE_URL!https://host/picture.png!IMAGE_URL!\n\nHello, explorer...
//! ```
//!
//! The same token opens and closes the frame. Exactly one blank line
//! separates the frame from the text. Without an image the body is just the
//! text.

pub mod decoder;
pub mod encoder;

use url::Url;

/// Opening and closing delimiter of the image frame.
pub const IMAGE_MARKER: &str = "!IMAGE_URL!";

/// Written once after the closing delimiter.
pub const FRAME_SEPARATOR: &str = "\n\n";

/// Longest URL the decoder will hold back while waiting for a closing
/// delimiter. Anything longer is released as plain text.
pub const MAX_FRAME_URL_LEN: usize = 8192;

pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Builds the complete image frame, separator included.
pub fn encode_image_frame(url: &str) -> String {
    let mut frame = String::with_capacity(url.len() + IMAGE_MARKER.len() * 2 + FRAME_SEPARATOR.len());
    frame.push_str(IMAGE_MARKER);
    frame.push_str(url);
    frame.push_str(IMAGE_MARKER);
    frame.push_str(FRAME_SEPARATOR);
    frame
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameUrlError {
    #[error("image url is empty")]
    Empty,
    #[error("image url contains the frame delimiter")]
    ContainsMarker,
    #[error("image url contains a line break")]
    LineBreak,
    #[error("image url is too long ({0} bytes)")]
    TooLong(usize),
    #[error("image url is not an absolute url: {0}")]
    Invalid(#[from] url::ParseError),
}

/// Checks that `url` survives a round trip through the frame.
pub fn validate_frame_url(url: &str) -> Result<(), FrameUrlError> {
    if url.is_empty() {
        return Err(FrameUrlError::Empty);
    }
    if url.contains(IMAGE_MARKER) {
        return Err(FrameUrlError::ContainsMarker);
    }
    if url.contains('\n') || url.contains('\r') {
        return Err(FrameUrlError::LineBreak);
    }
    if url.len() > MAX_FRAME_URL_LEN {
        return Err(FrameUrlError::TooLong(url.len()));
    }
    Url::parse(url)?;
    Ok(())
}
