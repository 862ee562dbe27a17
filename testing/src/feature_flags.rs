//! A [`dlq_core::feature_flags::FeatureFlags`] fake whose flags can be
//! flipped mid-test.

use dlq_core::feature_flags::FeatureFlags;
use std::sync::atomic::{AtomicBool, Ordering};

/// Feature flags backed by three atomics, all defaulting to enabled.
#[derive(Debug, Default)]
pub struct ToggleFlags {
    auto_replay_enabled: AtomicBool,
    llm_classification_enabled: AtomicBool,
    incident_integration_enabled: AtomicBool,
}

impl ToggleFlags {
    /// Every flag enabled, matching the pipeline's default configuration.
    #[must_use]
    pub fn all_enabled() -> Self {
        Self {
            auto_replay_enabled: AtomicBool::new(true),
            llm_classification_enabled: AtomicBool::new(true),
            incident_integration_enabled: AtomicBool::new(true),
        }
    }

    /// Every flag disabled.
    #[must_use]
    pub fn all_disabled() -> Self {
        Self {
            auto_replay_enabled: AtomicBool::new(false),
            llm_classification_enabled: AtomicBool::new(false),
            incident_integration_enabled: AtomicBool::new(false),
        }
    }

    /// Flip the auto-replay flag.
    pub fn set_auto_replay_enabled(&self, enabled: bool) {
        self.auto_replay_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Flip the LLM-classification flag.
    pub fn set_llm_classification_enabled(&self, enabled: bool) {
        self.llm_classification_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Flip the incident-integration flag.
    pub fn set_incident_integration_enabled(&self, enabled: bool) {
        self.incident_integration_enabled.store(enabled, Ordering::SeqCst);
    }
}

impl FeatureFlags for ToggleFlags {
    fn auto_replay_enabled(&self) -> bool {
        self.auto_replay_enabled.load(Ordering::SeqCst)
    }

    fn llm_classification_enabled(&self) -> bool {
        self.llm_classification_enabled.load(Ordering::SeqCst)
    }

    fn incident_integration_enabled(&self) -> bool {
        self.incident_integration_enabled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_all_enabled() {
        let flags = ToggleFlags::all_enabled();
        assert!(flags.auto_replay_enabled());
        assert!(flags.llm_classification_enabled());
        assert!(flags.incident_integration_enabled());
    }

    #[test]
    fn flags_can_be_flipped() {
        let flags = ToggleFlags::all_enabled();
        flags.set_llm_classification_enabled(false);
        assert!(!flags.llm_classification_enabled());
        assert!(flags.auto_replay_enabled());
        assert!(flags.incident_integration_enabled());
    }
}
