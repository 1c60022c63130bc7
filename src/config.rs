//! Environment configuration
//!
//! Every value has a default so the server and driver start with no
//! environment at all.

use std::time::Duration;

/// Default TTL for idle conversations (1 hour)
pub const DEFAULT_CONVERSATION_TTL: Duration = Duration::from_secs(60 * 60);

/// Configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Records idle longer than this are evicted
    pub conversation_ttl: Duration,
    /// Period of the background sweep
    pub sweep_interval: Duration,
    /// Timeout for the target-bot webhook call
    pub webhook_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            conversation_ttl: DEFAULT_CONVERSATION_TTL,
            sweep_interval: DEFAULT_CONVERSATION_TTL,
            webhook_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_parse("ANALYZER_PORT").unwrap_or(defaults.port),
            conversation_ttl: env_secs("ANALYZER_CONVERSATION_TTL_SECS")
                .unwrap_or(defaults.conversation_ttl),
            sweep_interval: env_secs("ANALYZER_SWEEP_INTERVAL_SECS")
                .unwrap_or(defaults.sweep_interval),
            webhook_timeout: env_secs("ANALYZER_WEBHOOK_TIMEOUT_SECS")
                .unwrap_or(defaults.webhook_timeout),
        }
    }
}

/// Configuration for the client session driver
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Base URL of the analyzer server
    pub server_url: String,
    pub request_timeout: Duration,
    pub poll: PollPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".to_string(),
            request_timeout: Duration::from_secs(10),
            poll: PollPolicy::default(),
        }
    }
}

impl DriverConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_url: std::env::var("ANALYZER_SERVER_URL").unwrap_or(defaults.server_url),
            request_timeout: env_secs("ANALYZER_REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout),
            poll: PollPolicy {
                message_interval: env_millis("ANALYZER_MESSAGE_POLL_MS")
                    .unwrap_or(defaults.poll.message_interval),
                analysis_interval: env_millis("ANALYZER_ANALYSIS_POLL_MS")
                    .unwrap_or(defaults.poll.analysis_interval),
                inactivity_timeout: env_secs("ANALYZER_INACTIVITY_TIMEOUT_SECS")
                    .unwrap_or(defaults.poll.inactivity_timeout),
            },
        }
    }
}

/// Polling cadence and silence bound for a processing session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub message_interval: Duration,
    pub analysis_interval: Duration,
    pub inactivity_timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            message_interval: Duration::from_millis(2000),
            analysis_interval: Duration::from_millis(5000),
            inactivity_timeout: Duration::from_secs(120),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key)
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}
