//! Engine-wide configuration: endpoints, identification, and the
//! timeout/retry policy applied to the transport and request layers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::socket::session::endpoints;

/// Reconnect backoff policy applied after a recoverable disconnect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Upper bound the exponential backoff is capped at.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
    /// Maximum number of attempts before giving up, `None` for unlimited.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 1.5,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the `attempt`th retry (0-indexed), capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        matches!(self.max_attempts, Some(max) if attempt >= max)
    }
}

/// Base configuration used by the protocol engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Primary WebSocket endpoint to connect to.
    pub endpoint: String,
    /// Fallback endpoint tried if the primary connection fails.
    pub fallback_endpoint: String,
    /// Identifier sent in the client payload's user agent fields.
    pub user_agent: String,
    /// How long a request waits for its matching response before
    /// failing with `RequestTimeout`.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// Backoff policy applied after a recoverable disconnect.
    pub reconnect: ReconnectPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: endpoints::MAIN.to_string(),
            fallback_endpoint: endpoints::FALLBACK.to_string(),
            user_agent: "wamd-engine/0.1".into(),
            request_timeout: crate::request::DEFAULT_REQUEST_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Override the primary endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override the fallback endpoint.
    pub fn with_fallback_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.fallback_endpoint = endpoint.into();
        self
    }

    /// Override the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Override the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Override the reconnect backoff policy.
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_points_at_main_endpoint() {
        let config = EngineConfig::default();
        assert_eq!(config.endpoint, endpoints::MAIN);
        assert_eq!(config.fallback_endpoint, endpoints::FALLBACK);
    }

    #[test]
    fn test_builder_overrides_apply() {
        let config = EngineConfig::default()
            .with_user_agent("custom/1.0")
            .with_request_timeout(Duration::from_secs(5));
        assert_eq!(config.user_agent, "custom/1.0");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_reconnect_delay_grows_and_caps() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            multiplier: 2.0,
            max_attempts: Some(5),
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
        assert!(!policy.exhausted(4));
        assert!(policy.exhausted(5));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }
}
