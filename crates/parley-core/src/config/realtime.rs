//! Real-time WebSocket engine configuration.

use serde::{Deserialize, Serialize};

/// Real-time (WebSocket) engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Per-connection outbound event queue size. A full queue drops events
    /// for that connection only.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer_size: usize,
    /// Maximum chat message length in characters, after trimming.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
    /// Transport keep-alive ping interval in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    /// Avatar shown for users without an uploaded image.
    #[serde(default = "default_avatar_url")]
    pub default_avatar_url: String,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: default_channel_buffer(),
            max_message_chars: default_max_message_chars(),
            ping_interval_seconds: default_ping_interval(),
            default_avatar_url: default_avatar_url(),
        }
    }
}

fn default_channel_buffer() -> usize {
    256
}

fn default_max_message_chars() -> usize {
    1000
}

fn default_ping_interval() -> u64 {
    30
}

fn default_avatar_url() -> String {
    "/static/images/default_profile.png".to_string()
}
