//! Client configuration.
//!
//! [`ClientConfig`] can be built in code with the `with_*` builders or
//! deserialized (e.g. from the CLI's TOML file); every field except the
//! server URL and the local user has a default.

use parley_chat_core::{NotificationSettings, ReconnectPolicy};
use parley_chat_types::{SessionId, UserId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`ChatClient`](crate::ChatClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// WebSocket URL of the chat server.
    pub server_url: String,
    /// The local user.
    pub user_id: UserId,
    /// The local session, used to recognize our own forced logout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Delay before the presence announcement is repeated after connecting
    /// (default: 1000 ms).
    #[serde(default = "default_presence_delay_ms")]
    pub presence_delay_ms: u64,
    /// Connection attempt timeout in seconds, 0 disables it (default: 30).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Reconnection tunables.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Global notification preferences.
    #[serde(default)]
    pub notifications: NotificationSettings,
}

/// Reconnection tunables, in config-file units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first retry (default: 1000 ms).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap for the exponential delay (default: 30000 ms).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Growth factor per failure (default: 2.0).
    #[serde(default = "default_factor")]
    pub factor: f64,
    /// Upper bound of the random jitter (default: 1000 ms).
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
    /// Consecutive failures before the long cooldown, 0 disables it (default: 8).
    #[serde(default = "default_failures_before_cooldown")]
    pub failures_before_cooldown: u32,
    /// Cooldown once the breaker opens (default: 300 s).
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Uptime after which a connection counts as healthy (default: 10 s).
    #[serde(default = "default_stable_after_secs")]
    pub stable_after_secs: u64,
}

// Default value functions
fn default_presence_delay_ms() -> u64 {
    1000
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_factor() -> f64 {
    2.0
}

fn default_max_jitter_ms() -> u64 {
    1000
}

fn default_failures_before_cooldown() -> u32 {
    8
}

fn default_cooldown_secs() -> u64 {
    300 // 5 minutes
}

fn default_stable_after_secs() -> u64 {
    10
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            factor: default_factor(),
            max_jitter_ms: default_max_jitter_ms(),
            failures_before_cooldown: default_failures_before_cooldown(),
            cooldown_secs: default_cooldown_secs(),
            stable_after_secs: default_stable_after_secs(),
        }
    }
}

impl ReconnectConfig {
    /// Convert to the policy used by the connection state machine.
    pub fn to_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            factor: self.factor,
            max_jitter: Duration::from_millis(self.max_jitter_ms),
            failures_before_cooldown: self.failures_before_cooldown,
            cooldown: Duration::from_secs(self.cooldown_secs),
            stable_after: Duration::from_secs(self.stable_after_secs),
        }
    }
}

impl From<&ReconnectPolicy> for ReconnectConfig {
    fn from(policy: &ReconnectPolicy) -> Self {
        Self {
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            factor: policy.factor,
            max_jitter_ms: policy.max_jitter.as_millis() as u64,
            failures_before_cooldown: policy.failures_before_cooldown,
            cooldown_secs: policy.cooldown.as_secs(),
            stable_after_secs: policy.stable_after.as_secs(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the
    /// server URL and the local user.
    pub fn new(server_url: &str, user_id: impl Into<UserId>) -> Self {
        Self {
            server_url: server_url.to_string(),
            user_id: user_id.into(),
            session_id: None,
            presence_delay_ms: default_presence_delay_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            reconnect: ReconnectConfig::default(),
            notifications: NotificationSettings::default(),
        }
    }

    /// Set the local session id.
    pub fn with_session(mut self, session_id: impl Into<SessionId>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the delayed presence announcement.
    pub fn with_presence_delay(mut self, delay: Duration) -> Self {
        self.presence_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the connection attempt timeout (`None` disables it).
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout_secs = timeout.map_or(0, |t| t.as_secs());
        self
    }

    /// Set the reconnect policy.
    pub fn with_reconnect_policy(mut self, policy: &ReconnectPolicy) -> Self {
        self.reconnect = ReconnectConfig::from(policy);
        self
    }

    /// Set the notification preferences.
    pub fn with_notifications(mut self, notifications: NotificationSettings) -> Self {
        self.notifications = notifications;
        self
    }

    /// The reconnect policy.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        self.reconnect.to_policy()
    }

    /// Delay before the presence announcement is repeated.
    pub fn presence_delay(&self) -> Duration {
        Duration::from_millis(self.presence_delay_ms)
    }

    /// Connection attempt timeout, if any.
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }
}
