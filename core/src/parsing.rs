//! Body parsing for the Monitor's enrichment step (§4.1).
//!
//! The parser is tolerant by design: it tries a handful of JSON shapes in
//! order, and falls all the way back to treating the whole body as the
//! message text if none of them apply. It never panics and never returns
//! an error — a message the parser cannot make sense of still produces an
//! `ErrorPattern`, just one tagged `"ParseError"`.

use crate::model::ErrorPattern;
use serde_json::Value;

const MAX_MESSAGE_LEN: usize = 500;
const MAX_STACK_FRAMES: usize = 3;

/// Truncate `s` to `max_len` chars, appending an ellipsis marker if it was cut.
#[must_use]
fn truncate_with_ellipsis(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut truncated: String = s.chars().take(max_len).collect();
    truncated.push('…');
    truncated
}

/// Keep at most `MAX_STACK_FRAMES` entries, plus an implicit error line
/// already folded into `message` — the frames list itself is capped at 3.
fn truncate_stack(frames: Vec<String>) -> Vec<String> {
    frames.into_iter().take(MAX_STACK_FRAMES).collect()
}

fn stack_from_value(v: &Value) -> Option<Vec<String>> {
    match v {
        Value::String(s) => Some(s.lines().map(str::to_string).collect()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_string))
                .collect(),
        ),
        _ => None,
    }
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Try the nested `error.{name,message,stack,code}` shape.
fn from_nested_error(root: &Value) -> Option<ErrorPattern> {
    let error = root.get("error")?;
    let message = str_field(error, "message")?;
    let error_type = str_field(error, "name").unwrap_or_else(|| "Error".to_string());
    let stack_top = error.get("stack").and_then(stack_from_value).map(truncate_stack);
    let code = str_field(error, "code");

    Some(ErrorPattern {
        error_type,
        message: truncate_with_ellipsis(&message, MAX_MESSAGE_LEN),
        stack_top,
        code,
        affected_service: String::new(), // filled in by caller
    })
}

/// Try the top-level `errorMessage`/`errorType`/`stackTrace`/`errorCode`
/// shape (Lambda-style), accepting `stackTrace` as a joined array too.
fn from_top_level_fields(root: &Value) -> Option<ErrorPattern> {
    let message = str_field(root, "errorMessage")?;
    let error_type = str_field(root, "errorType").unwrap_or_else(|| "Error".to_string());
    let code = str_field(root, "errorCode");
    let stack_top = root
        .get("stackTrace")
        .and_then(stack_from_value)
        .map(truncate_stack);

    Some(ErrorPattern {
        error_type,
        message: truncate_with_ellipsis(&message, MAX_MESSAGE_LEN),
        stack_top,
        code,
        affected_service: String::new(),
    })
}

/// Fall back to treating the entire body as the message.
fn from_raw_body(body: &[u8]) -> ErrorPattern {
    let text = String::from_utf8_lossy(body);
    ErrorPattern {
        error_type: "ParseError".to_string(),
        message: truncate_with_ellipsis(&text, MAX_MESSAGE_LEN),
        stack_top: None,
        code: None,
        affected_service: String::new(),
    }
}

/// Parse a DLQ message body into an `ErrorPattern`, per the ordered
/// fallback chain in §4.1. `affected_service` is left blank; callers set
/// it from the source queue name via `derive_affected_service`.
#[must_use]
pub fn parse_error_pattern(body: &[u8]) -> ErrorPattern {
    let Ok(text) = std::str::from_utf8(body) else {
        return from_raw_body(body);
    };
    let Ok(root) = serde_json::from_str::<Value>(text) else {
        return from_raw_body(body);
    };

    from_nested_error(&root)
        .or_else(|| from_top_level_fields(&root))
        .unwrap_or_else(|| from_raw_body(body))
}

/// Derive `affected_service` from a source queue name: strip a trailing
/// `-dlq`/`_dlq` suffix (case-insensitively) and convert the remainder to
/// PascalCase, splitting on `-`, `_` and whitespace.
#[must_use]
pub fn derive_affected_service(source_queue: &str) -> String {
    let lower = source_queue.to_lowercase();
    let stripped = lower
        .strip_suffix("-dlq")
        .or_else(|| lower.strip_suffix("_dlq"))
        .unwrap_or(&lower);

    stripped
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Derive the original (non-DLQ) queue name by stripping a trailing
/// `-dlq`/`_dlq` suffix (case-insensitively), preserving the rest of the
/// name verbatim — unlike [`derive_affected_service`], which also
/// PascalCases it. Used by the Executor's Retry handler to re-enqueue
/// into the queue the message originally failed out of (§4.3).
#[must_use]
pub fn derive_original_queue_name(source_queue: &str) -> String {
    let lower = source_queue.to_lowercase();
    let kept_len = lower
        .strip_suffix("-dlq")
        .or_else(|| lower.strip_suffix("_dlq"))
        .map(str::len);
    match kept_len {
        Some(len) => source_queue[..len].to_string(),
        None => source_queue.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_error_shape() {
        let body = br#"{"error":{"name":"NetworkError","message":"ETIMEDOUT: socket hang up"}}"#;
        let pattern = parse_error_pattern(body);
        assert_eq!(pattern.error_type, "NetworkError");
        assert_eq!(pattern.message, "ETIMEDOUT: socket hang up");
    }

    #[test]
    fn parses_top_level_lambda_shape() {
        let body = br#"{"errorMessage":"Cannot read property 'x' of null","errorType":"TypeError","stackTrace":["at a","at b","at c","at d"]}"#;
        let pattern = parse_error_pattern(body);
        assert_eq!(pattern.error_type, "TypeError");
        assert_eq!(pattern.stack_top.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn falls_back_to_raw_body_on_non_json() {
        let body = b"not json at all";
        let pattern = parse_error_pattern(body);
        assert_eq!(pattern.error_type, "ParseError");
        assert_eq!(pattern.message, "not json at all");
    }

    #[test]
    fn falls_back_when_json_has_no_recognized_shape() {
        let body = br#"{"foo":"bar"}"#;
        let pattern = parse_error_pattern(body);
        assert_eq!(pattern.error_type, "ParseError");
    }

    #[test]
    fn truncates_long_messages_with_ellipsis() {
        let long_message = "x".repeat(600);
        let body = serde_json::json!({"errorMessage": long_message, "errorType": "Error"});
        let pattern = parse_error_pattern(body.to_string().as_bytes());
        assert_eq!(pattern.message.chars().count(), MAX_MESSAGE_LEN + 1);
        assert!(pattern.message.ends_with('…'));
    }

    #[test]
    fn derives_pascal_case_service_from_hyphenated_queue() {
        assert_eq!(derive_affected_service("order-processing-dlq"), "OrderProcessing");
    }

    #[test]
    fn derives_pascal_case_service_from_underscored_queue() {
        assert_eq!(derive_affected_service("payment_capture_dlq"), "PaymentCapture");
    }

    #[test]
    fn derives_pascal_case_from_already_pascal_queue() {
        assert_eq!(derive_affected_service("Billing-DLQ"), "Billing");
    }

    #[test]
    fn derives_original_queue_name_by_stripping_suffix() {
        assert_eq!(derive_original_queue_name("orders-dlq"), "orders");
        assert_eq!(derive_original_queue_name("payment_capture_dlq"), "payment_capture");
        assert_eq!(derive_original_queue_name("Billing-DLQ"), "Billing");
    }

    #[test]
    fn derive_original_queue_name_is_unchanged_without_suffix() {
        assert_eq!(derive_original_queue_name("orders"), "orders");
    }
}
