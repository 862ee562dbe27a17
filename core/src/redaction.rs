//! PII redaction applied to anything handed to the LLM (§4.2 step 4).
//!
//! This is a conservative, regex-based scrubber — it strips the shapes the
//! spec names (emails, credit-card-shaped digit runs, SSNs, API-key-shaped
//! tokens) and nothing more. It is deliberately not a general PII detector;
//! see `spec.md` Non-goals.

use once_cell::sync::Lazy;
use regex::Regex;

#[allow(clippy::expect_used)] // compile-time constant patterns
fn must_compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static redaction pattern must compile")
}

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| must_compile(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}"));

static SSN_RE: Lazy<Regex> = Lazy::new(|| must_compile(r"\b\d{3}-\d{2}-\d{4}\b"));

// Matches 13-19 digit card numbers, optionally grouped with spaces or dashes
// into blocks of 4 (the common presentation shape).
static CREDIT_CARD_RE: Lazy<Regex> =
    Lazy::new(|| must_compile(r"\b(?:\d[ -]?){13,19}\b"));

// Long alphanumeric tokens with a recognizable key-ish prefix, or bare
// high-entropy-looking tokens of 20+ chars mixing case and digits.
static API_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    must_compile(r"\b(?:sk|pk|api|key|token|bearer)[-_][A-Za-z0-9]{12,}\b|\b[A-Za-z0-9]{32,}\b")
});

/// Redact emails, credit-card-shaped digit runs, SSN patterns, and
/// API-key-shaped tokens from `input`, replacing each with a typed
/// placeholder (`[REDACTED_EMAIL]`, etc).
#[must_use]
pub fn redact(input: &str) -> String {
    let s = EMAIL_RE.replace_all(input, "[REDACTED_EMAIL]");
    let s = SSN_RE.replace_all(&s, "[REDACTED_SSN]");
    let s = CREDIT_CARD_RE.replace_all(&s, "[REDACTED_CARD]");
    let s = API_KEY_RE.replace_all(&s, "[REDACTED_KEY]");
    s.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_email() {
        assert_eq!(
            redact("contact jane.doe+alerts@example.com for help"),
            "contact [REDACTED_EMAIL] for help"
        );
    }

    #[test]
    fn redacts_ssn() {
        assert_eq!(redact("ssn 123-45-6789 on file"), "ssn [REDACTED_SSN] on file");
    }

    #[test]
    fn redacts_credit_card() {
        assert_eq!(
            redact("card 4111 1111 1111 1111 declined"),
            "card [REDACTED_CARD] declined"
        );
    }

    #[test]
    fn redacts_api_key_like_token() {
        let redacted = redact("auth failed for sk-ab12cd34ef56gh78ij90");
        assert!(redacted.contains("[REDACTED_KEY]"));
        assert!(!redacted.contains("sk-ab12cd34ef56gh78ij90"));
    }

    #[test]
    fn leaves_ordinary_text_alone() {
        assert_eq!(redact("connection refused by upstream"), "connection refused by upstream");
    }
}
