use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use tracing_subscriber::EnvFilter;

use clipscout::clock::{Clock, SystemClock};
use clipscout::config::ResolvedConfig;
use clipscout::credentials::{
    EnvKeys, JsonFileCredentialStore, KeyCache, KeyResolver, Service, ThrottledStore, UserId,
};
use clipscout::crypto::{mask_secret, SecretCipher};
use clipscout::net::ApiClient;
use clipscout::platforms::{TikTokClient, TranscriptClient, YouTubeClient};
use clipscout::prefs::{RawSearchPrefs, SearchPrefs};
use clipscout::ratelimit::RateLimiter;

#[derive(Parser)]
#[command(name = "clipscout")]
#[command(about = "Search video platforms with your own API keys")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT_HASH"), ")"))]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "clipscout.toml")]
    config: PathBuf,

    /// User the command acts as
    #[arg(short, long, default_value = "local")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the resolved configuration
    Config,

    /// Encrypt and store an API key
    SetKey { service: String, key: String },

    /// Show the stored API key, masked
    ShowKey { service: String },

    /// Search a platform
    Search {
        #[command(subcommand)]
        platform: SearchCommand,
    },

    /// Fetch details for a YouTube video
    Video { id: String },

    /// Extract the transcript of a YouTube video
    Transcript {
        url: String,
        #[arg(long, default_value = clipscout::platforms::transcript::DEFAULT_LANG)]
        lang: String,
    },
}

#[derive(Subcommand)]
enum SearchCommand {
    /// Search YouTube videos
    Youtube {
        query: String,
        #[arg(long)]
        max_results: Option<i64>,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        date_range: Option<String>,
        #[arg(long)]
        duration: Option<String>,
        #[arg(long)]
        order: Option<String>,
    },

    /// Search TikTok videos
    Tiktok {
        keyword: String,
        #[arg(long)]
        cursor: Option<u64>,
    },
}

/// Everything a command needs, wired once.
struct App {
    user: UserId,
    youtube: YouTubeClient,
    tiktok: TikTokClient,
    transcript: TranscriptClient,
    resolver: Arc<KeyResolver>,
    limiter: RateLimiter,
}

impl App {
    fn build(resolved: &ResolvedConfig, user: &str) -> Result<Self> {
        let config = &resolved.config;

        let cipher = Arc::new(SecretCipher::from_env(&config.encryption.secret_var)?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store = Arc::new(ThrottledStore::with_limits(
            Arc::new(JsonFileCredentialStore::new(&resolved.data_dir)),
            config.store.max_concurrent_lookups,
            config.store.acquire_timeout,
        ));
        let cache = Arc::new(KeyCache::new(config.cache.key_ttl, clock.clone()));
        let resolver = Arc::new(KeyResolver::new(
            cache,
            store,
            cipher,
            EnvKeys::from_env(),
        ));

        let api = Arc::new(ApiClient::new(resolver.clone()).with_policy(config.retry.policy()));

        Ok(Self {
            user: UserId::from_string(user),
            youtube: YouTubeClient::new(api.clone()).with_clock(clock.clone()),
            tiktok: TikTokClient::new(api.clone()),
            transcript: TranscriptClient::new(api),
            resolver,
            limiter: RateLimiter::new(config.search.rate_limit(), clock),
        })
    }

    fn check_search_limit(&self, label: &str) -> Result<()> {
        let decision = self.limiter.check(&format!("{label}:{}", self.user));
        if !decision.allowed {
            bail!(
                "Rate limit exceeded. Try again in {}s.",
                decision.retry_after.as_secs().max(1)
            );
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let resolved = ResolvedConfig::load_or_default(&cli.config)?;

    match cli.command {
        Command::Config => {
            let config = &resolved.config;
            println!("Config file: {}", cli.config.display());
            println!("Data directory: {}", resolved.data_dir.display());
            println!("Encryption secret variable: {}", config.encryption.secret_var);
            println!(
                "Key cache TTL: {}",
                clipscout::duration::format_duration(config.cache.key_ttl)
            );
            println!(
                "Retry: {} attempts, base delay {}",
                config.retry.max_attempts,
                clipscout::duration::format_duration(config.retry.base_delay)
            );
            println!(
                "Search limit: {} requests per {}",
                config.search.max_requests,
                clipscout::duration::format_duration(config.search.window)
            );
            Ok(())
        }

        Command::SetKey { service, key } => {
            let service: Service = service.parse()?;
            let app = App::build(&resolved, &cli.user)?;
            app.resolver
                .save_key(&app.user, service, &key)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("Saved {} key: {}", service.display_name(), mask_secret(&key));
            Ok(())
        }

        Command::ShowKey { service } => {
            let service: Service = service.parse()?;
            let app = App::build(&resolved, &cli.user)?;
            match app.resolver.resolve(&app.user, service).await {
                Ok(key) => {
                    println!(
                        "{} key: {}",
                        service.display_name(),
                        mask_secret(key.expose_secret())
                    );
                    Ok(())
                }
                Err(err) => bail!(err.user_message()),
            }
        }

        Command::Search { platform } => {
            let app = App::build(&resolved, &cli.user)?;
            match platform {
                SearchCommand::Youtube {
                    query,
                    max_results,
                    region,
                    date_range,
                    duration,
                    order,
                } => {
                    app.check_search_limit("youtube-search")?;
                    let prefs = SearchPrefs::sanitized(RawSearchPrefs {
                        max_results,
                        region,
                        date_range,
                        video_duration: duration,
                        order,
                    });

                    let hits = app
                        .youtube
                        .search(&app.user, &query, &prefs)
                        .await
                        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

                    if hits.is_empty() {
                        println!("No results.");
                    }
                    for hit in hits {
                        println!(
                            "{}  {}  [{}]  https://www.youtube.com/watch?v={}",
                            hit.published_at, hit.title, hit.channel_title, hit.video_id
                        );
                    }
                    Ok(())
                }

                SearchCommand::Tiktok { keyword, cursor } => {
                    app.check_search_limit("tiktok-search")?;
                    let page = app
                        .tiktok
                        .search(&app.user, &keyword, cursor)
                        .await
                        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

                    if page.videos.is_empty() {
                        println!("No results.");
                    }
                    for video in &page.videos {
                        println!(
                            "@{}  {} plays  {}  {}",
                            video.author_handle, video.play_count, video.description,
                            video.share_url
                        );
                    }
                    if page.has_more {
                        println!("More results: --cursor {}", page.cursor);
                    }
                    Ok(())
                }
            }
        }

        Command::Video { id } => {
            let app = App::build(&resolved, &cli.user)?;
            let video = app
                .youtube
                .video_details(&app.user, &id)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;

            match video {
                Some(v) => {
                    println!("{}", v.title);
                    println!("Channel: {}", v.channel_title);
                    println!("Published: {}", v.published_at);
                    if let Some(secs) = v.duration_seconds() {
                        println!(
                            "Duration: {}",
                            clipscout::platforms::youtube::format_duration_hms(secs)
                        );
                    }
                    println!(
                        "Views: {}  Likes: {}  Comments: {}",
                        v.view_count, v.like_count, v.comment_count
                    );
                    if !v.tags.is_empty() {
                        println!("Tags: {}", v.tags.join(", "));
                    }
                    Ok(())
                }
                None => bail!("No video found for id {id}"),
            }
        }

        Command::Transcript { url, lang } => {
            let app = App::build(&resolved, &cli.user)?;
            let transcript = app
                .transcript
                .fetch(&app.user, &url, &lang)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;

            println!("{}", transcript.text);
            if transcript.available_langs.len() > 1 {
                eprintln!(
                    "Other languages: {}",
                    transcript.available_langs.join(", ")
                );
            }
            Ok(())
        }
    }
}
