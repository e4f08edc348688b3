//! Per-user search preferences.
//!
//! Invalid or out-of-range values are coerced to safe defaults on write
//! rather than rejected, so a stale client can never persist a preference
//! the search layer cannot honor.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::credentials::UserId;

/// Region codes (ISO 3166-1 alpha-2) accepted for `regionCode`.
const REGION_CODES: [&str; 45] = [
    "US", "GB", "CA", "AU", "DE", "FR", "JP", "KR", "IN", "BR", "MX", "ES", "IT", "NL", "RU",
    "PL", "SE", "NO", "DK", "FI", "AT", "CH", "BE", "PT", "IE", "NZ", "SG", "HK", "TW", "PH",
    "ID", "MY", "TH", "VN", "ZA", "AR", "CL", "CO", "PE", "EG", "SA", "AE", "IL", "TR", "UA",
];

pub const MIN_RESULTS: u32 = 1;
pub const MAX_RESULTS: u32 = 50;
pub const DEFAULT_RESULTS: u32 = 25;
pub const DEFAULT_REGION: &str = "US";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    #[default]
    Any,
    Day,
    Week,
    Month,
}

impl DateRange {
    /// Lower publication bound implied by this range, if any.
    pub fn published_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            DateRange::Any => None,
            DateRange::Day => Some(now - Duration::days(1)),
            DateRange::Week => Some(now - Duration::days(7)),
            DateRange::Month => Some(now - Duration::days(30)),
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "any" => Some(DateRange::Any),
            "day" => Some(DateRange::Day),
            "week" => Some(DateRange::Week),
            "month" => Some(DateRange::Month),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoDuration {
    #[default]
    Any,
    Short,
    Medium,
    Long,
}

impl VideoDuration {
    /// Value for the platform's `videoDuration` parameter; `None` means the
    /// parameter is omitted.
    pub fn api_value(&self) -> Option<&'static str> {
        match self {
            VideoDuration::Any => None,
            VideoDuration::Short => Some("short"),
            VideoDuration::Medium => Some("medium"),
            VideoDuration::Long => Some("long"),
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "any" => Some(VideoDuration::Any),
            "short" => Some(VideoDuration::Short),
            "medium" => Some(VideoDuration::Medium),
            "long" => Some(VideoDuration::Long),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    Date,
    Rating,
    #[default]
    Relevance,
    Title,
    ViewCount,
}

impl SortOrder {
    pub fn api_value(&self) -> &'static str {
        match self {
            SortOrder::Date => "date",
            SortOrder::Rating => "rating",
            SortOrder::Relevance => "relevance",
            SortOrder::Title => "title",
            SortOrder::ViewCount => "viewCount",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "date" => Some(SortOrder::Date),
            "rating" => Some(SortOrder::Rating),
            "relevance" => Some(SortOrder::Relevance),
            "title" => Some(SortOrder::Title),
            "viewCount" => Some(SortOrder::ViewCount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPrefs {
    pub max_results: u32,
    pub date_range: DateRange,
    pub region: String,
    pub video_duration: VideoDuration,
    pub order: SortOrder,
}

impl Default for SearchPrefs {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_RESULTS,
            date_range: DateRange::Any,
            region: DEFAULT_REGION.to_string(),
            video_duration: VideoDuration::Any,
            order: SortOrder::Relevance,
        }
    }
}

/// Unvalidated preference input, as submitted by a settings form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSearchPrefs {
    pub max_results: Option<i64>,
    pub date_range: Option<String>,
    pub region: Option<String>,
    pub video_duration: Option<String>,
    pub order: Option<String>,
}

impl SearchPrefs {
    /// Coerce raw input into valid preferences: clamp the result count,
    /// fall back to defaults for anything off the allowlists.
    pub fn sanitized(raw: RawSearchPrefs) -> Self {
        let max_results = match raw.max_results {
            None | Some(0) => DEFAULT_RESULTS,
            Some(n) => n.clamp(MIN_RESULTS as i64, MAX_RESULTS as i64) as u32,
        };

        let date_range = raw
            .date_range
            .as_deref()
            .and_then(DateRange::parse)
            .unwrap_or_default();

        let region = raw
            .region
            .map(|r| r.to_uppercase())
            .filter(|r| REGION_CODES.contains(&r.as_str()))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let video_duration = raw
            .video_duration
            .as_deref()
            .and_then(VideoDuration::parse)
            .unwrap_or_default();

        let order = raw
            .order
            .as_deref()
            .and_then(SortOrder::parse)
            .unwrap_or_default();

        Self {
            max_results,
            date_range,
            region,
            video_duration,
            order,
        }
    }
}

/// Persistence seam for preferences, one row per user.
#[async_trait]
pub trait PrefsStore: Send + Sync {
    async fn find(&self, user_id: &UserId) -> Result<Option<SearchPrefs>>;
    async fn upsert(&self, user_id: &UserId, prefs: SearchPrefs) -> Result<SearchPrefs>;

    /// Stored preferences, or the defaults when the user has none.
    async fn get_or_default(&self, user_id: &UserId) -> Result<SearchPrefs> {
        Ok(self.find(user_id).await?.unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryPrefsStore {
    rows: Mutex<HashMap<UserId, SearchPrefs>>,
}

impl MemoryPrefsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrefsStore for MemoryPrefsStore {
    async fn find(&self, user_id: &UserId) -> Result<Option<SearchPrefs>> {
        let rows = self.rows.lock().await;
        Ok(rows.get(user_id).cloned())
    }

    async fn upsert(&self, user_id: &UserId, prefs: SearchPrefs) -> Result<SearchPrefs> {
        let mut rows = self.rows.lock().await;
        rows.insert(user_id.clone(), prefs.clone());
        Ok(prefs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sanitize_clamps_max_results() {
        let prefs = SearchPrefs::sanitized(RawSearchPrefs {
            max_results: Some(500),
            ..Default::default()
        });
        assert_eq!(prefs.max_results, 50);

        let prefs = SearchPrefs::sanitized(RawSearchPrefs {
            max_results: Some(0),
            ..Default::default()
        });
        assert_eq!(prefs.max_results, 25);

        let prefs = SearchPrefs::sanitized(RawSearchPrefs {
            max_results: Some(-3),
            ..Default::default()
        });
        assert_eq!(prefs.max_results, 1);
    }

    #[test]
    fn sanitize_uppercases_and_allowlists_region() {
        let prefs = SearchPrefs::sanitized(RawSearchPrefs {
            region: Some("de".to_string()),
            ..Default::default()
        });
        assert_eq!(prefs.region, "DE");

        let prefs = SearchPrefs::sanitized(RawSearchPrefs {
            region: Some("XX".to_string()),
            ..Default::default()
        });
        assert_eq!(prefs.region, "US");
    }

    #[test]
    fn sanitize_falls_back_on_unknown_enums() {
        let prefs = SearchPrefs::sanitized(RawSearchPrefs {
            date_range: Some("fortnight".to_string()),
            video_duration: Some("epic".to_string()),
            order: Some("chaos".to_string()),
            ..Default::default()
        });
        assert_eq!(prefs.date_range, DateRange::Any);
        assert_eq!(prefs.video_duration, VideoDuration::Any);
        assert_eq!(prefs.order, SortOrder::Relevance);
    }

    #[test]
    fn date_range_bounds() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        assert_eq!(DateRange::Any.published_after(now), None);
        assert_eq!(
            DateRange::Week.published_after(now),
            Some(now - Duration::days(7))
        );
    }

    #[tokio::test]
    async fn store_defaults_until_upserted() -> Result<()> {
        let store = MemoryPrefsStore::new();
        let user = UserId::from("u1");

        assert_eq!(store.get_or_default(&user).await?, SearchPrefs::default());

        let custom = SearchPrefs {
            max_results: 10,
            order: SortOrder::ViewCount,
            ..Default::default()
        };
        store.upsert(&user, custom.clone()).await?;
        assert_eq!(store.get_or_default(&user).await?, custom);
        Ok(())
    }
}
