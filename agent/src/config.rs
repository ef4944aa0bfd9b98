//! Configuration types for a trace session

use calltap_shared::utils::parse_duration;
use std::time::Duration;

/// Smallest frame limit that still fits every control message and a call
/// with short names and a source path
const MIN_FRAME_BYTES: usize = 256;

/// Session configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bound on the startup rendezvous, applied independently on each side
    pub startup_timeout: Duration,

    /// Bound on waiting for the observer process to exit at the end of a session
    pub join_timeout: Duration,

    /// How often the publisher re-sends sync probes while waiting for the observer
    pub sync_interval: Duration,

    /// Largest frame the observer accepts
    pub max_frame_bytes: usize,

    /// Buffer of the publisher's writer thread in bytes (0 = write every frame
    /// through); flushed after every drained batch
    pub send_buffer_bytes: usize,
}

impl Default for Config {
    /// Library defaults, overridable via `CALLTAP_STARTUP_TIMEOUT`,
    /// `CALLTAP_JOIN_TIMEOUT`, `CALLTAP_MAX_FRAME_BYTES` and
    /// `CALLTAP_SEND_BUFFER_BYTES`.
    fn default() -> Self {
        Self {
            startup_timeout: env_duration("CALLTAP_STARTUP_TIMEOUT")
                .unwrap_or(Duration::from_secs(5)),
            join_timeout: env_duration("CALLTAP_JOIN_TIMEOUT").unwrap_or(Duration::from_secs(5)),
            sync_interval: Duration::from_millis(5),
            max_frame_bytes: env_usize("CALLTAP_MAX_FRAME_BYTES").unwrap_or(1024 * 1024),
            send_buffer_bytes: env_usize("CALLTAP_SEND_BUFFER_BYTES").unwrap_or(64 * 1024),
        }
    }
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.startup_timeout.is_zero() {
            anyhow::bail!("Startup timeout must be greater than 0");
        }

        if self.join_timeout.is_zero() {
            anyhow::bail!("Join timeout must be greater than 0");
        }

        if self.sync_interval.is_zero() {
            anyhow::bail!("Sync interval must be greater than 0");
        }

        if self.sync_interval >= self.startup_timeout {
            anyhow::bail!(
                "Sync interval ({:?}) must be shorter than the startup timeout ({:?})",
                self.sync_interval,
                self.startup_timeout
            );
        }

        if self.max_frame_bytes < MIN_FRAME_BYTES {
            anyhow::bail!("Max frame size too small (min {} bytes)", MIN_FRAME_BYTES);
        }

        Ok(())
    }
}

fn env_duration(key: &str) -> Option<Duration> {
    std::env::var(key).ok().and_then(|s| parse_duration(&s).ok())
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
