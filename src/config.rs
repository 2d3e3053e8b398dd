//! Startup configuration from environment variables

use crate::gateway::RetryPolicy;
use crate::llm::LlmConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_RETRY_BASE_MS: u64 = 500;
const DEFAULT_SESSION_IDLE_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Catalog document to load instead of the bundled one
    pub catalog_path: Option<PathBuf>,
    /// Per-call completion timeout
    pub generation_timeout: Duration,
    pub retry: RetryPolicy,
    /// Seed every session's verse RNG with this value
    pub verse_seed: Option<u64>,
    pub session_idle_timeout: Duration,
    pub llm: LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = parse_or(&lookup, "BIBLE_DIVE_PORT", DEFAULT_PORT);
        let timeout_secs = parse_or(&lookup, "BIBLE_DIVE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);
        let max_retries = parse_or(&lookup, "BIBLE_DIVE_MAX_RETRIES", 0);
        let retry_base_ms = parse_or(&lookup, "BIBLE_DIVE_RETRY_BASE_MS", DEFAULT_RETRY_BASE_MS);
        let idle_secs = parse_or(
            &lookup,
            "BIBLE_DIVE_SESSION_IDLE_SECS",
            DEFAULT_SESSION_IDLE_SECS,
        );

        Self {
            port,
            catalog_path: lookup("BIBLE_DIVE_CATALOG")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            generation_timeout: Duration::from_secs(timeout_secs),
            retry: RetryPolicy {
                max_retries,
                base_delay: Duration::from_millis(retry_base_ms),
            },
            verse_seed: parse(&lookup, "BIBLE_DIVE_VERSE_SEED"),
            session_idle_timeout: Duration::from_secs(idle_secs),
            llm: LlmConfig::from_lookup(&lookup),
        }
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Ignoring unparseable setting");
            None
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    parse(lookup, name).unwrap_or(default)
}
