//! Feature-flag seam (§6, §11 ambient stack): lets operators toggle the
//! three spec-named pipeline booleans without a redeploy. A store-backed
//! implementation can replace the static config-file reading without
//! touching callers, since the Analyzer and Executor only ever see this
//! trait.

/// Runtime-toggleable behavior, queried on the hot path of the Analyzer
/// and Executor. Implementations are expected to be cheap to call (an
/// in-memory read, not a network round trip) since they are consulted
/// per message.
pub trait FeatureFlags: Send + Sync {
    /// When `false`, the Executor's Retry handler never re-enqueues: every
    /// TRANSIENT classification escalates instead (§4.3, §6).
    fn auto_replay_enabled(&self) -> bool;

    /// When `false`, the Analyzer skips step 4 (LLM) entirely and falls
    /// back directly to the conservative default (§4.2 step 5; §6
    /// "disabling llm forces fallback path").
    fn llm_classification_enabled(&self) -> bool;

    /// When `false`, the Escalate handler is a deliberate no-op: no
    /// incident is opened (§4.3, §6).
    fn incident_integration_enabled(&self) -> bool;
}

/// A [`FeatureFlags`] implementation with every flag enabled, matching
/// the pipeline's default configuration (§6).
#[derive(Clone, Copy, Debug, Default)]
pub struct AllEnabled;

impl FeatureFlags for AllEnabled {
    fn auto_replay_enabled(&self) -> bool {
        true
    }

    fn llm_classification_enabled(&self) -> bool {
        true
    }

    fn incident_integration_enabled(&self) -> bool {
        true
    }
}
