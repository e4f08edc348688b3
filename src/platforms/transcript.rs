//! YouTube transcript extraction through the RapidAPI gateway.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Deserialize;

use crate::credentials::{Service, UserId};
use crate::net::{ApiClient, ApiError, RequestSpec};

const TRANSCRIPT_HOST: &str = "youtube-transcribe-fastest-youtube-transcriber.p.rapidapi.com";
const TRANSCRIPT_ENDPOINT: &str = "/transcript";

pub const DEFAULT_LANG: &str = "en";

/// Extract a YouTube video id from watch/short/embed URL forms, or accept a
/// bare 11-character id. Unrecognized input is returned as-is and left for
/// the upstream to reject.
pub fn extract_video_id(url: &str) -> String {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    static ID_RE: OnceLock<Regex> = OnceLock::new();

    let url_re = URL_RE.get_or_init(|| {
        Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([^&\n?#]+)")
            .expect("static regex")
    });
    if let Some(caps) = url_re.captures(url) {
        return caps[1].to_string();
    }

    let id_re =
        ID_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("static regex"));
    if id_re.is_match(url) {
        return url.to_string();
    }

    url.to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptChunk {
    pub text: String,
    /// Start and end offsets in seconds.
    pub timestamp: (f64, f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub video_id: String,
    pub text: String,
    pub lang: String,
    pub available_langs: Vec<String>,
    pub chunks: Vec<TranscriptChunk>,
}

pub struct TranscriptClient {
    api: Arc<ApiClient>,
}

impl TranscriptClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Fetch the transcript for a video URL (or bare id).
    pub async fn fetch(
        &self,
        user_id: &UserId,
        video_url: &str,
        lang: &str,
    ) -> Result<Transcript, ApiError> {
        let video_id = extract_video_id(video_url);

        let spec = RequestSpec::get(Service::RapidApi, TRANSCRIPT_HOST, TRANSCRIPT_ENDPOINT)
            .with_param("url", video_url)
            .with_param("video_id", &video_id)
            .with_param("lang", lang);

        let response: TranscriptResponse = self.api.request(user_id, &spec).await?;

        // The gateway answers 200 with a logical status envelope; a
        // non-success envelope is an upstream failure, not a decode error.
        if response.status != "success" {
            return Err(provider_error(
                response
                    .error
                    .or(response.message)
                    .unwrap_or_else(|| "Failed to extract transcript".to_string()),
            ));
        }
        let Some(data) = response.data else {
            return Err(provider_error(
                "Failed to extract transcript".to_string(),
            ));
        };
        if data.text.is_empty() {
            return Err(provider_error(
                "No transcript available for this video".to_string(),
            ));
        }

        Ok(Transcript {
            video_id,
            text: data.text,
            lang: data.lang,
            available_langs: data.available_langs,
            chunks: data
                .chunks
                .into_iter()
                .map(|c| TranscriptChunk {
                    text: c.text,
                    timestamp: (c.timestamp[0], c.timestamp[1]),
                })
                .collect(),
        })
    }
}

fn provider_error(message: String) -> ApiError {
    ApiError::Upstream {
        service: Service::RapidApi,
        status: 502,
        message: Some(message),
        retryable: false,
    }
}

// Raw gateway shapes.

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    #[serde(default)]
    status: String,
    data: Option<TranscriptData>,
    error: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptData {
    #[serde(default)]
    text: String,
    #[serde(default)]
    lang: String,
    #[serde(default)]
    available_langs: Vec<String>,
    #[serde(default)]
    chunks: Vec<RawChunk>,
}

#[derive(Debug, Deserialize)]
struct RawChunk {
    text: String,
    timestamp: [f64; 2],
}
