//! # Life status of a running instance.
//!
//! Twelve states, split into *steady* states and *transition* states. A
//! transition state is one the system is actively moving out of; every
//! transition is guarded by the kill-retry timer, which keeps killing the
//! app until it leaves the transition.
//!
//! `STOP` is both the initial and the terminal state: once an instance hits
//! `STOP`, the registry removes it.

/// Life status of one running instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeStatus {
    Stop,
    Preloading,
    Preloaded,
    Splashing,
    Splashed,
    Launching,
    Relaunching,
    Foreground,
    Background,
    Pausing,
    Paused,
    Closing,
}

impl LifeStatus {
    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifeStatus::Stop => "stop",
            LifeStatus::Preloading => "preloading",
            LifeStatus::Preloaded => "preloaded",
            LifeStatus::Splashing => "splashing",
            LifeStatus::Splashed => "splashed",
            LifeStatus::Launching => "launching",
            LifeStatus::Relaunching => "relaunching",
            LifeStatus::Foreground => "foreground",
            LifeStatus::Background => "background",
            LifeStatus::Pausing => "pausing",
            LifeStatus::Paused => "paused",
            LifeStatus::Closing => "closing",
        }
    }

    /// Returns true for transition states (the ones the kill-retry timer
    /// guards).
    pub fn is_transition(&self) -> bool {
        matches!(
            self,
            LifeStatus::Preloading
                | LifeStatus::Splashing
                | LifeStatus::Launching
                | LifeStatus::Relaunching
                | LifeStatus::Pausing
                | LifeStatus::Closing
        )
    }
}

impl std::fmt::Display for LifeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_set_is_exact() {
        let transitions = [
            LifeStatus::Preloading,
            LifeStatus::Splashing,
            LifeStatus::Launching,
            LifeStatus::Relaunching,
            LifeStatus::Pausing,
            LifeStatus::Closing,
        ];
        let steady = [
            LifeStatus::Stop,
            LifeStatus::Preloaded,
            LifeStatus::Splashed,
            LifeStatus::Foreground,
            LifeStatus::Background,
            LifeStatus::Paused,
        ];
        for status in transitions {
            assert!(status.is_transition(), "{status} should be a transition");
        }
        for status in steady {
            assert!(!status.is_transition(), "{status} should be steady");
        }
    }

    #[test]
    fn wire_names_are_lowercase() {
        assert_eq!(LifeStatus::Stop.as_str(), "stop");
        assert_eq!(LifeStatus::Relaunching.as_str(), "relaunching");
        assert_eq!(LifeStatus::Foreground.to_string(), "foreground");
    }
}
