//! The static heuristic rule table used by the Analyzer's pattern-match stage (§4.2).
//!
//! Rules are tried in order; the first whose regex matches the (lowercased)
//! error message and whose confidence clears `confidence_threshold` wins.
//! There is no learning here — this table is the entire heuristic layer, by
//! design (see `spec.md` Non-goals).

use crate::model::Category;
use once_cell::sync::Lazy;
use regex::Regex;

/// One row of the heuristic rule table.
pub struct PatternRule {
    /// Compiled, case-insensitive regex tested against the error message.
    pub pattern: Regex,
    /// The category this rule classifies to.
    pub category: Category,
    /// Fixed confidence assigned when this rule matches.
    pub confidence: f64,
    /// Short rationale stored verbatim in the classification record.
    pub reasoning: &'static str,
}

fn rule(pattern: &str, category: Category, confidence: f64, reasoning: &'static str) -> PatternRule {
    #[allow(clippy::expect_used)] // patterns are compile-time constants below; a typo is a bug, not runtime data
    let pattern = Regex::new(pattern).expect("static heuristic pattern must compile");
    PatternRule {
        pattern,
        category,
        confidence,
        reasoning,
    }
}

/// The ordered rule table. Network/rate-limit/throttle patterns classify
/// TRANSIENT; null-deref/parse/schema/type/zero-div/invalid-argument
/// patterns classify POISON_PILL (§4.2).
pub static RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        rule(
            r"(?i)\b(etimedout|econnreset|econnrefused|socket hang up|network\s*error|dns\s*lookup)\b",
            Category::Transient,
            0.96,
            "network-level failure, likely to succeed on replay",
        ),
        rule(
            r"(?i)\b(429|too many requests|rate\s*limit(ed)?)\b",
            Category::Transient,
            0.94,
            "rate limited by downstream, back off and retry",
        ),
        rule(
            r"(?i)\b(503|throttl(e|ed|ing)|service unavailable)\b",
            Category::Transient,
            0.9,
            "throttled by downstream, back off and retry",
        ),
        rule(
            r"(?i)\b(timeout|timed out|deadline exceeded)\b",
            Category::Transient,
            0.86,
            "operation timed out, likely transient",
        ),
        rule(
            r"(?i)(cannot read propert(y|ies) .* of null|cannot read propert(y|ies) .* of undefined|null pointer|nullpointerexception|nil pointer dereference)",
            Category::PoisonPill,
            0.95,
            "null/nil dereference, message content is intrinsically unprocessable",
        ),
        rule(
            r"(?i)\b(json\.?parse|unexpected token|syntax\s*error|parse\s*error|invalid\s*json)\b",
            Category::PoisonPill,
            0.93,
            "malformed payload, cannot be parsed regardless of retries",
        ),
        rule(
            r"(?i)\b(schema\s*(validation)?\s*(error|failed|mismatch)|does not match schema)\b",
            Category::PoisonPill,
            0.92,
            "schema validation failure, message shape is invalid",
        ),
        rule(
            r"(?i)\b(type\s*error|typeerror|cannot convert|invalid\s*type)\b",
            Category::PoisonPill,
            0.9,
            "type mismatch in message content",
        ),
        rule(
            r"(?i)\b(division by zero|divide by zero|zerodivisionerror)\b",
            Category::PoisonPill,
            0.97,
            "arithmetic on message data cannot succeed on replay",
        ),
        rule(
            r"(?i)\b(invalid\s*argument|illegalargumentexception|value\s*error)\b",
            Category::PoisonPill,
            0.88,
            "invalid argument derived from message content",
        ),
    ]
});

/// Find the first rule (in table order) whose pattern matches `message` and
/// whose confidence meets `confidence_threshold`.
#[must_use]
pub fn first_match(message: &str, confidence_threshold: f64) -> Option<&'static PatternRule> {
    RULES
        .iter()
        .find(|r| r.confidence >= confidence_threshold && r.pattern.is_match(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_is_transient() {
        let m = first_match("ETIMEDOUT: socket hang up", 0.85).expect("should match");
        assert_eq!(m.category, Category::Transient);
    }

    #[test]
    fn null_deref_is_poison_pill() {
        let m = first_match("Cannot read property 'length' of null", 0.85).expect("should match");
        assert_eq!(m.category, Category::PoisonPill);
    }

    #[test]
    fn unrecognized_message_has_no_match() {
        assert!(first_match("something entirely novel happened", 0.85).is_none());
    }

    #[test]
    fn confidence_threshold_excludes_low_confidence_rules() {
        // "timeout" rule is 0.86; raising the bar above it should exclude it
        // while still allowing "ETIMEDOUT" (0.96) through.
        assert!(first_match("operation timed out", 0.90).is_none());
        assert!(first_match("ETIMEDOUT", 0.90).is_some());
    }
}
