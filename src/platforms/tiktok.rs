//! TikTok keyword search through the RapidAPI gateway.
//!
//! TikTok has no public search API; requests go through a RapidAPI-hosted
//! proxy, so the credential is the user's RapidAPI key and rides in the
//! gateway header pair.

use std::sync::Arc;

use serde::Deserialize;

use crate::credentials::{Service, UserId};
use crate::net::{ApiClient, ApiError, RequestSpec};
use crate::text::decode_html_entities;

const TIKTOK_HOST: &str = "tiktok-api23.p.rapidapi.com";
const SEARCH_ENDPOINT: &str = "/api/search/general";

/// One normalized search result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TikTokVideo {
    pub id: String,
    pub description: String,
    pub author_handle: String,
    pub author_name: String,
    pub play_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
    pub created_at: i64,
    pub share_url: String,
}

/// One page of search results plus the cursor for the next page.
#[derive(Debug, Clone)]
pub struct TikTokSearchPage {
    pub videos: Vec<TikTokVideo>,
    pub cursor: u64,
    pub has_more: bool,
}

pub struct TikTokClient {
    api: Arc<ApiClient>,
}

impl TikTokClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Search videos for `keyword`. Pass the previous page's cursor to
    /// continue paging; omit it for the first page.
    pub async fn search(
        &self,
        user_id: &UserId,
        keyword: &str,
        cursor: Option<u64>,
    ) -> Result<TikTokSearchPage, ApiError> {
        let spec = RequestSpec::get(Service::RapidApi, TIKTOK_HOST, SEARCH_ENDPOINT)
            .with_param("keyword", keyword)
            .with_param("cursor", cursor.unwrap_or(0).to_string());

        let response: SearchResponse = self.api.request(user_id, &spec).await?;
        Ok(normalize_search_response(response))
    }
}

// Raw gateway shapes.

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchEntry>,
    #[serde(default)]
    cursor: u64,
    #[serde(default)]
    has_more: u8,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    item: Option<RawVideo>,
}

#[derive(Debug, Deserialize)]
struct RawVideo {
    id: Option<String>,
    desc: Option<String>,
    #[serde(rename = "createTime")]
    create_time: Option<i64>,
    author: Option<RawAuthor>,
    stats: Option<RawStats>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAuthor {
    #[serde(rename = "uniqueId")]
    unique_id: Option<String>,
    nickname: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStats {
    #[serde(rename = "playCount")]
    play_count: Option<u64>,
    #[serde(rename = "diggCount")]
    digg_count: Option<u64>,
    #[serde(rename = "commentCount")]
    comment_count: Option<u64>,
    #[serde(rename = "shareCount")]
    share_count: Option<u64>,
}

fn normalize_search_response(response: SearchResponse) -> TikTokSearchPage {
    let videos = response
        .data
        .into_iter()
        .filter_map(|entry| entry.item)
        .filter_map(normalize_video)
        .collect();

    TikTokSearchPage {
        videos,
        cursor: response.cursor,
        has_more: response.has_more != 0,
    }
}

fn normalize_video(raw: RawVideo) -> Option<TikTokVideo> {
    let id = raw.id?;
    let author = raw.author.unwrap_or_default();
    let stats = raw.stats.unwrap_or_default();
    let author_handle = author.unique_id.unwrap_or_default();

    let share_url = if author_handle.is_empty() {
        String::new()
    } else {
        format!("https://www.tiktok.com/@{author_handle}/video/{id}")
    };

    Some(TikTokVideo {
        id,
        description: decode_html_entities(&raw.desc.unwrap_or_default()),
        author_name: decode_html_entities(&author.nickname.unwrap_or_default()),
        author_handle,
        play_count: stats.play_count.unwrap_or(0),
        like_count: stats.digg_count.unwrap_or(0),
        comment_count: stats.comment_count.unwrap_or(0),
        share_count: stats.share_count.unwrap_or(0),
        created_at: raw.create_time.unwrap_or(0),
        share_url,
    })
}
