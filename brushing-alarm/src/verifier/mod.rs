//! Image verification.
//!
//! A verifier answers one question about a photo: is there a toothbrush
//! in it? A negative answer and a failure to answer are different
//! outcomes and are kept apart in the type: `Ok(false)` is a verdict,
//! `Err(_)` means no verdict was reached.

mod gemini;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

pub use gemini::GeminiVerifier;

#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unusable response: {0}")]
    MalformedResponse(String),

    #[error("no answer within {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait ImageVerifier: Send + Sync {
    /// Decide whether `image` shows a toothbrush.
    async fn verify(&self, image: &[u8]) -> Result<bool, VerifierError>;
}

/// The only reply shape a verifier model is allowed to produce.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Verdict {
    toothbrush: bool,
}

/// Decode a model reply of the form `{"toothbrush": true}`.
///
/// Anything else, including free text such as "Yes", is rejected rather
/// than guessed at.
pub fn decode_verdict(text: &str) -> Result<bool, VerifierError> {
    serde_json::from_str::<Verdict>(text.trim())
        .map(|v| v.toothbrush)
        .map_err(|e| VerifierError::MalformedResponse(format!("{e}: {text:?}")))
}

/// Image formats the verifier can label for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    /// Guess the format from magic bytes, falling back to JPEG (what
    /// phone cameras produce).
    pub fn sniff(image: &[u8]) -> Self {
        if image.starts_with(&[0x89, b'P', b'N', b'G']) {
            ImageFormat::Png
        } else if image.len() >= 12 && &image[0..4] == b"RIFF" && &image[8..12] == b"WEBP" {
            ImageFormat::Webp
        } else {
            ImageFormat::Jpeg
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(r#"{"toothbrush": true}"#, true ; "positive")]
    #[test_case(r#"{"toothbrush": false}"#, false ; "negative")]
    #[test_case("  {\"toothbrush\":true}\n", true ; "surrounding whitespace")]
    fn decodes_strict_verdict(text: &str, expected: bool) {
        assert_eq!(decode_verdict(text).unwrap(), expected);
    }

    #[test_case("yes" ; "bare yes")]
    #[test_case("No." ; "bare no")]
    #[test_case("Yes, there is a toothbrush." ; "prose")]
    #[test_case(r#"{"toothbrush": "yes"}"# ; "string instead of bool")]
    #[test_case(r#"{"toothbrush": true, "confidence": 0.9}"# ; "extra field")]
    #[test_case(r#"{}"# ; "missing field")]
    #[test_case("```json\n{\"toothbrush\": true}\n```" ; "markdown fence")]
    #[test_case("" ; "empty")]
    fn rejects_anything_else(text: &str) {
        assert!(matches!(
            decode_verdict(text),
            Err(VerifierError::MalformedResponse(_))
        ));
    }

    #[test_case(&[0xff, 0xd8, 0xff, 0xe0], ImageFormat::Jpeg ; "jpeg")]
    #[test_case(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a], ImageFormat::Png ; "png")]
    #[test_case(b"RIFF\x00\x00\x00\x00WEBPVP8 ", ImageFormat::Webp ; "webp")]
    #[test_case(b"??", ImageFormat::Jpeg ; "unknown falls back to jpeg")]
    fn sniffs_format(image: &[u8], expected: ImageFormat) {
        assert_eq!(ImageFormat::sniff(image), expected);
    }
}
