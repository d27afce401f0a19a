//! Configuration for quietwire
//!
//! Centralized configuration with sensible defaults. One `Config` covers
//! both `Connection` and `Server`; each reads only the fields that apply
//! to it.

use std::time::Duration;

/// Smallest quiet window the default derivation will produce.
pub const MIN_QUIET_WINDOW: Duration = Duration::from_millis(25);

/// Largest quiet window the default derivation will produce.
pub const MAX_QUIET_WINDOW: Duration = Duration::from_millis(250);

/// Main configuration for quietwire
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Connection Configuration
    // -------------------------------------------------------------------------
    /// Bound for connect and for the first chunk of a read. Must be
    /// nonzero; `build()` clamps it to at least 1 ms.
    pub timeout: Duration,

    /// Quiescence threshold: once the first chunk of a message has
    /// arrived, a read returns the accumulated payload after the wire
    /// stays silent for this long. `None` derives it as `timeout / 20`,
    /// clamped to [`MIN_QUIET_WINDOW`, `MAX_QUIET_WINDOW`]. This is a
    /// boundary heuristic, not a framing guarantee: senders must pause
    /// longer than this between messages and never pause this long
    /// mid-message.
    pub quiet_window: Option<Duration>,

    // -------------------------------------------------------------------------
    // Server Configuration
    // -------------------------------------------------------------------------
    /// Address the server listens on (the port is given to `start`).
    pub bind_addr: String,

    /// How often the accept loop re-checks the stop signal while no
    /// peers are arriving.
    pub accept_poll_interval: Duration,

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------
    /// When enabled, internal failures are logged at `warn` with error
    /// detail; otherwise they are logged at `trace` only.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            quiet_window: None,
            bind_addr: "0.0.0.0".to_string(),
            accept_poll_interval: Duration::from_millis(100),
            debug: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// The effective quiescence threshold for reads.
    pub fn effective_quiet_window(&self) -> Duration {
        self.quiet_window
            .unwrap_or_else(|| (self.timeout / 20).clamp(MIN_QUIET_WINDOW, MAX_QUIET_WINDOW))
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the timeout for connect and the first chunk of read
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the quiescence threshold explicitly
    pub fn quiet_window(mut self, window: Duration) -> Self {
        self.config.quiet_window = Some(window);
        self
    }

    /// Set the server listen address
    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    /// Set the accept loop's stop-signal poll interval
    pub fn accept_poll_interval(mut self, interval: Duration) -> Self {
        self.config.accept_poll_interval = interval;
        self
    }

    /// Enable or disable diagnostic logging of internal failures
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn build(self) -> Config {
        let mut config = self.config;
        // set_read_timeout rejects a zero duration
        if config.timeout.is_zero() {
            config.timeout = Duration::from_millis(1);
        }
        if let Some(window) = config.quiet_window {
            if window.is_zero() {
                config.quiet_window = Some(Duration::from_millis(1));
            }
        }
        if config.accept_poll_interval.is_zero() {
            config.accept_poll_interval = Duration::from_millis(1);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_quiet_window_is_clamped() {
        // 60s / 20 = 3s, well above the cap
        let config = Config::default();
        assert_eq!(config.effective_quiet_window(), MAX_QUIET_WINDOW);

        // 100ms / 20 = 5ms, below the floor
        let config = Config::builder()
            .timeout(Duration::from_millis(100))
            .build();
        assert_eq!(config.effective_quiet_window(), MIN_QUIET_WINDOW);

        // 2s / 20 = 100ms, inside the band
        let config = Config::builder().timeout(Duration::from_secs(2)).build();
        assert_eq!(config.effective_quiet_window(), Duration::from_millis(100));
    }

    #[test]
    fn explicit_quiet_window_wins() {
        let config = Config::builder()
            .quiet_window(Duration::from_millis(40))
            .build();
        assert_eq!(config.effective_quiet_window(), Duration::from_millis(40));
    }

    #[test]
    fn zero_durations_are_clamped() {
        let config = Config::builder()
            .timeout(Duration::ZERO)
            .quiet_window(Duration::ZERO)
            .accept_poll_interval(Duration::ZERO)
            .build();
        assert!(!config.timeout.is_zero());
        assert!(!config.effective_quiet_window().is_zero());
        assert!(!config.accept_poll_interval.is_zero());
    }
}
