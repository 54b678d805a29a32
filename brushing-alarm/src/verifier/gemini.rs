//! Verifier backed by the Gemini `generateContent` API.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use super::{ImageFormat, ImageVerifier, VerifierError, decode_verdict};
use crate::config::VerifierConfig;
use crate::tracing::prelude::*;

const PROMPT: &str = "Does this photo show a toothbrush? \
Reply with only a JSON object of the form {\"toothbrush\": true} or {\"toothbrush\": false}.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 2],
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Asks a Gemini vision model whether a photo shows a toothbrush.
#[derive(Debug, Clone)]
pub struct GeminiVerifier {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiVerifier {
    pub fn new(config: &VerifierConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(http: reqwest::Client, config: &VerifierConfig) -> Self {
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );
        Self {
            http,
            endpoint,
            api_key: config.api_key.clone(),
        }
    }

    fn request_body(image: &[u8]) -> GenerateRequest<'static> {
        GenerateRequest {
            contents: [Content {
                parts: [
                    Part::Text { text: PROMPT },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: ImageFormat::sniff(image).mime_type(),
                            data: BASE64.encode(image),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        }
    }
}

/// Pull the model's text answer out of a `generateContent` reply.
fn answer_text(response: GenerateResponse) -> Result<String, VerifierError> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| VerifierError::MalformedResponse("reply has no text candidate".into()))
}

#[async_trait]
impl ImageVerifier for GeminiVerifier {
    async fn verify(&self, image: &[u8]) -> Result<bool, VerifierError> {
        trace!(endpoint = %self.endpoint, bytes = image.len(), "Sending photo for verification");

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::request_body(image))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VerifierError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| VerifierError::MalformedResponse(e.to_string()))?;
        let text = answer_text(reply)?;
        let verdict = decode_verdict(&text)?;

        debug!(verdict, "Verifier answered");
        Ok(verdict)
    }
}
