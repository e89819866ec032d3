//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Unset or unparsable values fall back to
//! the defaults documented on each field.

use std::net::SocketAddr;
use std::time::Duration;

use crate::narrative::{
    DEFAULT_CONNECT_THRESHOLD, DEFAULT_INTERSECTION_THRESHOLD, DEFAULT_TRIGGER_FRACTION,
    RevealPolicy, ScrollProgressEngine,
};

/// Narrative tuning shared by every viewer session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NarrativeConfig {
    /// Scroll engine with the configured trigger line.
    pub engine: ScrollProgressEngine,
    /// Reveal policy for both channels.
    pub policy: RevealPolicy,
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (`LISTEN_ADDR`, default
    /// `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// PostgreSQL connection string (`DATABASE_URL`). `None` selects the
    /// in-memory store.
    pub database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    pub database_max_connections: u32,

    /// Timeout in seconds for acquiring a database connection.
    pub database_connect_timeout_secs: u64,

    /// Capacity of the store change broadcast channel.
    pub event_bus_capacity: usize,

    /// Capacity of the write queue and of the write-error bus.
    pub write_queue_capacity: usize,

    /// Base URL public links are built on (`PUBLIC_BASE_URL`).
    pub public_base_url: String,

    /// How many fresh access codes to try before giving up.
    pub access_code_max_attempts: u32,

    /// Scroll and reveal tuning.
    pub narrative: NarrativeConfig,

    /// Suggestion backend endpoint. `None` disables suggestions.
    pub suggestion_service_url: Option<String>,

    /// Per-request timeout for the suggestion backend.
    pub suggestion_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()?;
        Ok(Self {
            listen_addr,
            ..Self::from_lookup(|key| std::env::var(key).ok())
        })
    }

    /// Builds a configuration from an arbitrary key lookup. Every key falls
    /// back to its default, including an unparsable `LISTEN_ADDR`.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = parse(&lookup, "LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)));
        let database_url = non_empty(&lookup, "DATABASE_URL");
        let database_max_connections = parse(&lookup, "DATABASE_MAX_CONNECTIONS", 10);
        let database_connect_timeout_secs = parse(&lookup, "DATABASE_CONNECT_TIMEOUT_SECS", 5);
        let event_bus_capacity = parse(&lookup, "EVENT_BUS_CAPACITY", 10_000);
        let write_queue_capacity = parse(&lookup, "WRITE_QUEUE_CAPACITY", 1_024);
        let public_base_url = non_empty(&lookup, "PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string());
        let access_code_max_attempts = parse(&lookup, "ACCESS_CODE_MAX_ATTEMPTS", 5);

        let trigger_fraction = parse(&lookup, "REVEAL_TRIGGER_FRACTION", DEFAULT_TRIGGER_FRACTION);
        let engine = ScrollProgressEngine::new(trigger_fraction).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "ignoring REVEAL_TRIGGER_FRACTION");
            ScrollProgressEngine::default()
        });
        let policy = RevealPolicy::default()
            .with_connect_threshold(parse(
                &lookup,
                "REVEAL_CONNECT_THRESHOLD",
                DEFAULT_CONNECT_THRESHOLD,
            ))
            .with_one_way(parse_bool(&lookup, "REVEAL_ONE_WAY", true))
            .with_intersection_threshold(parse(
                &lookup,
                "REVEAL_INTERSECTION_THRESHOLD",
                DEFAULT_INTERSECTION_THRESHOLD,
            ));

        let suggestion_service_url = non_empty(&lookup, "SUGGESTION_SERVICE_URL");
        let suggestion_timeout = Duration::from_secs(parse(&lookup, "SUGGESTION_TIMEOUT_SECS", 10));

        Self {
            listen_addr,
            database_url,
            database_max_connections,
            database_connect_timeout_secs,
            event_bus_capacity,
            write_queue_capacity,
            public_base_url,
            access_code_max_attempts,
            narrative: NarrativeConfig { engine, policy },
            suggestion_service_url,
            suggestion_timeout,
        }
    }
}

/// Parses `key` as `T`, returning `default` on missing or invalid values.
fn parse<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses `key` as a boolean. Accepts `"true"`, `"1"`, `"false"`, `"0"`
/// (case-insensitive). Returns `default` otherwise.
fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> GatewayConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = config(&[]);
        assert_eq!(cfg.listen_addr.port(), 3000);
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.event_bus_capacity, 10_000);
        assert_eq!(cfg.access_code_max_attempts, 5);
        assert!(cfg.narrative.policy.one_way);
        assert!((cfg.narrative.engine.trigger_fraction() - 0.75).abs() < f64::EPSILON);
        assert!(cfg.suggestion_service_url.is_none());
    }

    #[test]
    fn values_are_read_and_parsed() {
        let cfg = config(&[
            ("LISTEN_ADDR", "127.0.0.1:8080"),
            ("DATABASE_URL", "postgres://localhost/keepsake"),
            ("WRITE_QUEUE_CAPACITY", "64"),
            ("REVEAL_TRIGGER_FRACTION", "0.7"),
            ("REVEAL_ONE_WAY", "FALSE"),
            ("SUGGESTION_TIMEOUT_SECS", "3"),
        ]);
        assert_eq!(cfg.listen_addr.port(), 8080);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/keepsake"));
        assert_eq!(cfg.write_queue_capacity, 64);
        assert!((cfg.narrative.engine.trigger_fraction() - 0.7).abs() < f64::EPSILON);
        assert!(!cfg.narrative.policy.one_way);
        assert_eq!(cfg.suggestion_timeout, Duration::from_secs(3));
    }

    #[test]
    fn out_of_range_narrative_values_are_corrected() {
        let cfg = config(&[
            ("REVEAL_TRIGGER_FRACTION", "3.0"),
            ("REVEAL_CONNECT_THRESHOLD", "50"),
            ("REVEAL_INTERSECTION_THRESHOLD", "-1"),
        ]);
        assert!((cfg.narrative.engine.trigger_fraction() - 0.75).abs() < f64::EPSILON);
        assert!((cfg.narrative.policy.connect_threshold - 95.0).abs() < f64::EPSILON);
        assert!(cfg.narrative.policy.intersection_threshold.abs() < f64::EPSILON);
    }

    #[test]
    fn blank_urls_count_as_unset() {
        let cfg = config(&[("DATABASE_URL", "  "), ("SUGGESTION_SERVICE_URL", "")]);
        assert!(cfg.database_url.is_none());
        assert!(cfg.suggestion_service_url.is_none());
    }
}
