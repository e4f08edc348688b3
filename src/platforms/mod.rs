//! Platform-specific clients and response normalizers.
//!
//! Each module wraps the shared [`crate::net::ApiClient`] for one upstream
//! and maps the provider's raw JSON into the crate's record shapes. The
//! normalizers are pure; everything network-shaped stays in `net`.

pub mod tiktok;
pub mod transcript;
pub mod youtube;

pub use tiktok::{TikTokClient, TikTokSearchPage, TikTokVideo};
pub use transcript::{Transcript, TranscriptClient};
pub use youtube::{ChannelSummary, SearchHit, VideoDetails, YouTubeClient};
