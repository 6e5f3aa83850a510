//! # Global runtime configuration.
//!
//! [`Config`] defines the supervisor's behavior: the transition deadline
//! driving the kill-retry timer, the relaunch fast-path switch, the
//! multi-instance display policy, and channel capacities.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use appvisor::Config;
//!
//! let mut cfg = Config::default();
//! cfg.transition_timeout = Duration::from_secs(5);
//! cfg.relaunch_supported = false;
//!
//! assert_eq!(cfg.transition_timeout, Duration::from_secs(5));
//! ```

use std::time::Duration;

/// Global configuration for the lifecycle manager.
///
/// Controls transition deadlines, the relaunch fast-path, display
/// multiplexing, and event/command channel capacities.
#[derive(Clone, Debug)]
pub struct Config {
    /// Deadline for any transition state. An app that stays in a transition
    /// longer than this gets killed, and keeps getting killed on this period
    /// until it leaves the transition.
    pub transition_timeout: Duration,
    /// Whether registered apps may be relaunched over their event channel
    /// instead of going through the process launcher.
    pub relaunch_supported: bool,
    /// Whether the platform runs multiple instances of the same app on
    /// different displays. When false, per-app lookups ignore the display
    /// and return the first match.
    pub multi_instance: bool,
    /// Capacity of the observer event bus channel.
    pub bus_capacity: usize,
    /// Capacity of the manager command queue.
    pub command_capacity: usize,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `transition_timeout = 15s`
    /// - `relaunch_supported = true`
    /// - `multi_instance = false`
    /// - `bus_capacity = 1024`
    /// - `command_capacity = 64`
    fn default() -> Self {
        Self {
            transition_timeout: Duration::from_secs(15),
            relaunch_supported: true,
            multi_instance: false,
            bus_capacity: 1024,
            command_capacity: 64,
        }
    }
}
