//! YouTube Data API v3 client.
//!
//! The API key rides as the `key` query parameter. Search is shaped by the
//! user's [`SearchPrefs`]; `/videos` and `/channels` lookups batch ids
//! comma-joined. Titles and descriptions come back HTML-entity-encoded and
//! are decoded during normalization.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Deserialize;

use crate::clock::{Clock, SystemClock};
use crate::credentials::{Service, UserId};
use crate::net::{ApiClient, ApiError, RequestSpec};
use crate::prefs::SearchPrefs;
use crate::text::decode_html_entities;

const YOUTUBE_API_HOST: &str = "www.googleapis.com";
const API_PREFIX: &str = "/youtube/v3";

/// YouTube video ids: 11 characters, alphanumeric plus `-` and `_`.
pub fn is_valid_video_id(id: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("static regex"))
        .is_match(id)
}

/// Parse an ISO-8601 duration like `PT1H2M3S` into seconds.
///
/// Handles the day component (`P1DT2H`) that shows up on long live-stream
/// archives. Returns `None` for anything unparseable.
pub fn parse_iso8601_duration(raw: &str) -> Option<u64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").expect("static regex")
    });

    let caps = re.captures(raw.trim())?;
    let part = |i: usize| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };

    // "P" alone carries no information.
    if (1..=4).all(|i| caps.get(i).is_none()) {
        return None;
    }

    Some(part(1) * 86_400 + part(2) * 3_600 + part(3) * 60 + part(4))
}

/// Render seconds as `h:mm:ss` (or `m:ss` under an hour).
pub fn format_duration_hms(total_secs: u64) -> String {
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let secs = total_secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// One row of search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub channel_title: String,
    pub published_at: String,
    pub thumbnail: String,
}

/// Full details for one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDetails {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub channel_id: String,
    pub channel_title: String,
    pub published_at: String,
    pub view_count: String,
    pub like_count: String,
    pub comment_count: String,
    /// ISO-8601 duration as reported by the platform.
    pub duration: String,
    pub tags: Vec<String>,
}

impl VideoDetails {
    pub fn duration_seconds(&self) -> Option<u64> {
        parse_iso8601_duration(&self.duration)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub custom_url: String,
    pub thumbnail: String,
    pub subscriber_count: String,
    pub video_count: String,
    pub view_count: String,
}

pub struct YouTubeClient {
    api: Arc<ApiClient>,
    clock: Arc<dyn Clock>,
}

impl YouTubeClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Search videos matching `query`, shaped by the user's preferences.
    pub async fn search(
        &self,
        user_id: &UserId,
        query: &str,
        prefs: &SearchPrefs,
    ) -> Result<Vec<SearchHit>, ApiError> {
        let mut spec = RequestSpec::get(
            Service::Youtube,
            YOUTUBE_API_HOST,
            format!("{API_PREFIX}/search"),
        )
        .with_param("part", "snippet")
        .with_param("type", "video")
        .with_param("q", query)
        .with_param("maxResults", prefs.max_results.to_string())
        .with_param("order", prefs.order.api_value())
        .with_param("regionCode", &prefs.region);

        if let Some(duration) = prefs.video_duration.api_value() {
            spec = spec.with_param("videoDuration", duration);
        }
        if let Some(after) = prefs.date_range.published_after(self.clock.now()) {
            spec = spec.with_param(
                "publishedAfter",
                after.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            );
        }

        let response: SearchResponse = self.api.request(user_id, &spec).await?;
        Ok(response
            .items
            .into_iter()
            .filter_map(normalize_search_item)
            .collect())
    }

    /// Details for a single video, `None` when the platform has no row.
    pub async fn video_details(
        &self,
        user_id: &UserId,
        video_id: &str,
    ) -> Result<Option<VideoDetails>, ApiError> {
        let videos = self.videos_details(user_id, &[video_id]).await?;
        Ok(videos.into_iter().next())
    }

    /// Details for a batch of videos. Invalid ids are dropped before the
    /// call; an all-invalid batch short-circuits to an empty result.
    pub async fn videos_details(
        &self,
        user_id: &UserId,
        video_ids: &[&str],
    ) -> Result<Vec<VideoDetails>, ApiError> {
        let valid: Vec<&str> = video_ids
            .iter()
            .copied()
            .filter(|id| is_valid_video_id(id))
            .collect();
        if valid.is_empty() {
            return Ok(Vec::new());
        }

        let spec = RequestSpec::get(
            Service::Youtube,
            YOUTUBE_API_HOST,
            format!("{API_PREFIX}/videos"),
        )
        .with_list_param("part", &["snippet", "statistics", "contentDetails"])
        .with_list_param("id", &valid);

        let response: VideosResponse = self.api.request(user_id, &spec).await?;
        Ok(response.items.into_iter().map(normalize_video_item).collect())
    }

    /// Snippet and statistics for a batch of channels.
    pub async fn channels(
        &self,
        user_id: &UserId,
        channel_ids: &[&str],
    ) -> Result<Vec<ChannelSummary>, ApiError> {
        if channel_ids.is_empty() {
            return Ok(Vec::new());
        }

        let spec = RequestSpec::get(
            Service::Youtube,
            YOUTUBE_API_HOST,
            format!("{API_PREFIX}/channels"),
        )
        .with_list_param("part", &["snippet", "statistics"])
        .with_list_param("id", channel_ids);

        let response: ChannelsResponse = self.api.request(user_id, &spec).await?;
        Ok(response
            .items
            .into_iter()
            .map(normalize_channel_item)
            .collect())
    }
}

// Raw wire shapes. Everything is optional; normalization fills the gaps.

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: Option<SearchItemId>,
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Snippet {
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "channelId")]
    channel_id: Option<String>,
    #[serde(rename = "channelTitle")]
    channel_title: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    thumbnails: Option<Thumbnails>,
    tags: Option<Vec<String>>,
    #[serde(rename = "customUrl")]
    custom_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    high: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: Option<String>,
    snippet: Option<Snippet>,
    statistics: Option<Statistics>,
    #[serde(rename = "contentDetails")]
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct Statistics {
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
    #[serde(rename = "likeCount")]
    like_count: Option<String>,
    #[serde(rename = "commentCount")]
    comment_count: Option<String>,
    #[serde(rename = "subscriberCount")]
    subscriber_count: Option<String>,
    #[serde(rename = "videoCount")]
    video_count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelsResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: Option<String>,
    snippet: Option<Snippet>,
    statistics: Option<Statistics>,
}

fn best_thumbnail(thumbnails: Option<Thumbnails>) -> String {
    let Some(t) = thumbnails else {
        return String::new();
    };
    [t.high, t.medium, t.default]
        .into_iter()
        .flatten()
        .filter_map(|thumb| thumb.url)
        .next()
        .unwrap_or_default()
}

fn normalize_search_item(item: SearchItem) -> Option<SearchHit> {
    let video_id = item.id?.video_id?;
    let snippet = item.snippet.unwrap_or_default();

    Some(SearchHit {
        video_id,
        title: decode_html_entities(&snippet.title.unwrap_or_default()),
        description: decode_html_entities(&snippet.description.unwrap_or_default()),
        channel_title: decode_html_entities(&snippet.channel_title.unwrap_or_default()),
        published_at: snippet.published_at.unwrap_or_default(),
        thumbnail: best_thumbnail(snippet.thumbnails),
    })
}

fn normalize_video_item(item: VideoItem) -> VideoDetails {
    let snippet = item.snippet.unwrap_or_default();
    let statistics = item.statistics.unwrap_or_default();
    let content_details = item.content_details.unwrap_or_default();

    VideoDetails {
        id: item.id.unwrap_or_default(),
        title: decode_html_entities(&snippet.title.unwrap_or_default()),
        description: decode_html_entities(&snippet.description.unwrap_or_default()),
        thumbnail: best_thumbnail(snippet.thumbnails),
        channel_id: snippet.channel_id.unwrap_or_default(),
        channel_title: decode_html_entities(&snippet.channel_title.unwrap_or_default()),
        published_at: snippet.published_at.unwrap_or_default(),
        view_count: statistics.view_count.unwrap_or_else(|| "0".to_string()),
        like_count: statistics.like_count.unwrap_or_else(|| "0".to_string()),
        comment_count: statistics.comment_count.unwrap_or_else(|| "0".to_string()),
        duration: content_details.duration.unwrap_or_default(),
        tags: snippet.tags.unwrap_or_default(),
    }
}

fn normalize_channel_item(item: ChannelItem) -> ChannelSummary {
    let snippet = item.snippet.unwrap_or_default();
    let statistics = item.statistics.unwrap_or_default();

    ChannelSummary {
        id: item.id.unwrap_or_default(),
        title: decode_html_entities(&snippet.title.unwrap_or_default()),
        description: decode_html_entities(&snippet.description.unwrap_or_default()),
        custom_url: snippet.custom_url.unwrap_or_default(),
        thumbnail: best_thumbnail(snippet.thumbnails),
        subscriber_count: statistics.subscriber_count.unwrap_or_else(|| "0".to_string()),
        video_count: statistics.video_count.unwrap_or_else(|| "0".to_string()),
        view_count: statistics.view_count.unwrap_or_else(|| "0".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_VIDEO: &str = r#"{
        "items": [
            {
                "id": "dQw4w9WgXcQ",
                "snippet": {
                    "title": "Never Gonna Give You Up &amp; More",
                    "description": "It&#39;s a classic",
                    "channelId": "UCuAXFkgsw1L7xaCfnd5JJOw",
                    "channelTitle": "Rick Astley",
                    "publishedAt": "2009-10-25T06:57:33Z",
                    "tags": ["rick", "astley"],
                    "thumbnails": {
                        "default": { "url": "https://i.ytimg.com/default.jpg" },
                        "medium": { "url": "https://i.ytimg.com/medium.jpg" }
                    }
                },
                "statistics": {
                    "viewCount": "1500000000",
                    "likeCount": "16000000"
                },
                "contentDetails": {
                    "duration": "PT3M33S"
                }
            }
        ]
    }"#;

    #[test]
    fn video_id_validation() {
        assert!(is_valid_video_id("dQw4w9WgXcQ"));
        assert!(is_valid_video_id("abc-DEF_123"));
        assert!(!is_valid_video_id("tooshort"));
        assert!(!is_valid_video_id("exactly12char"));
        assert!(!is_valid_video_id("has spaces!"));
        assert!(!is_valid_video_id(""));
    }

    #[test]
    fn iso8601_duration_parsing() {
        assert_eq!(parse_iso8601_duration("PT3M33S"), Some(213));
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), Some(3723));
        assert_eq!(parse_iso8601_duration("PT45S"), Some(45));
        assert_eq!(parse_iso8601_duration("PT2H"), Some(7200));
        assert_eq!(parse_iso8601_duration("P1DT1H"), Some(90000));
        assert_eq!(parse_iso8601_duration("P"), None);
        assert_eq!(parse_iso8601_duration("3m33s"), None);
        assert_eq!(parse_iso8601_duration(""), None);
    }

    #[test]
    fn duration_display() {
        assert_eq!(format_duration_hms(213), "3:33");
        assert_eq!(format_duration_hms(3723), "1:02:03");
        assert_eq!(format_duration_hms(59), "0:59");
    }

    #[test]
    fn normalizes_video_item_with_entity_decoding() {
        let response: VideosResponse = serde_json::from_str(SAMPLE_VIDEO).unwrap();
        let video = normalize_video_item(response.items.into_iter().next().unwrap());

        assert_eq!(video.id, "dQw4w9WgXcQ");
        assert_eq!(video.title, "Never Gonna Give You Up & More");
        assert_eq!(video.description, "It's a classic");
        assert_eq!(video.channel_title, "Rick Astley");
        // No high thumbnail: falls back to medium before default.
        assert_eq!(video.thumbnail, "https://i.ytimg.com/medium.jpg");
        assert_eq!(video.view_count, "1500000000");
        // commentCount missing: zero-defaulted.
        assert_eq!(video.comment_count, "0");
        assert_eq!(video.duration_seconds(), Some(213));
        assert_eq!(video.tags, vec!["rick", "astley"]);
    }

    #[test]
    fn search_items_without_video_id_are_dropped() {
        let raw = r#"{
            "items": [
                { "id": { "videoId": "dQw4w9WgXcQ" }, "snippet": { "title": "kept" } },
                { "id": { "channelId": "UC123" }, "snippet": { "title": "a channel" } },
                { "snippet": { "title": "no id at all" } }
            ]
        }"#;
        let response: SearchResponse = serde_json::from_str(raw).unwrap();
        let hits: Vec<SearchHit> = response
            .items
            .into_iter()
            .filter_map(normalize_search_item)
            .collect();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].video_id, "dQw4w9WgXcQ");
        assert_eq!(hits[0].title, "kept");
    }

    #[test]
    fn normalizes_channel_item() {
        let raw = r#"{
            "items": [
                {
                    "id": "UCuAXFkgsw1L7xaCfnd5JJOw",
                    "snippet": {
                        "title": "Rick Astley",
                        "description": "Official channel",
                        "customUrl": "@rickastley",
                        "thumbnails": { "default": { "url": "https://i.ytimg.com/ch.jpg" } }
                    },
                    "statistics": {
                        "subscriberCount": "4000000",
                        "videoCount": "120"
                    }
                }
            ]
        }"#;
        let response: ChannelsResponse = serde_json::from_str(raw).unwrap();
        let channel = normalize_channel_item(response.items.into_iter().next().unwrap());

        assert_eq!(channel.id, "UCuAXFkgsw1L7xaCfnd5JJOw");
        assert_eq!(channel.custom_url, "@rickastley");
        assert_eq!(channel.subscriber_count, "4000000");
        // viewCount missing from statistics: zero-defaulted.
        assert_eq!(channel.view_count, "0");
        assert_eq!(channel.thumbnail, "https://i.ytimg.com/ch.jpg");
    }

    #[test]
    fn missing_thumbnails_become_empty_string() {
        assert_eq!(best_thumbnail(None), "");
        let empty: Thumbnails = serde_json::from_str("{}").unwrap();
        assert_eq!(best_thumbnail(Some(empty)), "");
    }
}
