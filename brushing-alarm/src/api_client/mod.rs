//! HTTP client for the alarm daemon's API.

pub mod types;

use bytes::Bytes;
use reqwest::StatusCode;
use time::OffsetDateTime;

use types::{AlarmSnapshot, ErrorBody, ErrorKind, ScheduleRequest};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7786";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("cannot reach alarm daemon: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Api {
        status: StatusCode,
        kind: ErrorKind,
        message: String,
    },

    #[error("unexpected HTTP {status} from alarm daemon")]
    Unexpected { status: StatusCode },
}

impl ClientError {
    /// The API's error category, when the daemon reported one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::Api { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v0{}", self.base_url, path)
    }

    pub async fn get_alarm(&self) -> Result<AlarmSnapshot, ClientError> {
        let response = self.http.get(self.url("/alarm")).send().await?;
        decode(response).await
    }

    pub async fn schedule(
        &self,
        target_time: OffsetDateTime,
    ) -> Result<AlarmSnapshot, ClientError> {
        let response = self
            .http
            .put(self.url("/alarm"))
            .json(&ScheduleRequest { target_time })
            .send()
            .await?;
        decode(response).await
    }

    pub async fn cancel(&self) -> Result<AlarmSnapshot, ClientError> {
        let response = self.http.delete(self.url("/alarm")).send().await?;
        decode(response).await
    }

    pub async fn request_dismissal(&self) -> Result<AlarmSnapshot, ClientError> {
        let response = self.http.post(self.url("/alarm/dismissal")).send().await?;
        decode(response).await
    }

    pub async fn submit_photo(&self, photo: Bytes) -> Result<AlarmSnapshot, ClientError> {
        let response = self
            .http
            .post(self.url("/alarm/dismissal/photo"))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(photo)
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode(response: reqwest::Response) -> Result<AlarmSnapshot, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    match response.json::<ErrorBody>().await {
        Ok(body) => Err(ClientError::Api {
            status,
            kind: body.kind,
            message: body.message,
        }),
        Err(_) => Err(ClientError::Unexpected { status }),
    }
}
