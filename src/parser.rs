//! Session log record normalization
//!
//! Turns one raw JSONL line into a [`ParsedLine`]. Session logs have been written
//! by several generations of the assistant, so a usage record can carry its
//! message at different depths and its numbers under snake_case or camelCase
//! keys. The message is located by trying [`MessageLocation::SEARCH_ORDER`] in
//! sequence and taking the first hit.

use crate::models::{normalize_model, ParsedLine, SystemEvent, TokenCounts, UsageEvent};
use serde_json::{Map, Value};

type Object = Map<String, Value>;

/// Where a usage-bearing message may live inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLocation {
    /// `{"message": {"usage": ...}}`
    Direct,
    /// `{"data": {"message": {"message": {"usage": ...}}}}`, as written for sub-agent progress.
    Nested,
    /// The record is itself the message: `{"model": ..., "usage": ...}`.
    Root,
}

impl MessageLocation {
    pub const SEARCH_ORDER: [MessageLocation; 3] = [
        MessageLocation::Direct,
        MessageLocation::Nested,
        MessageLocation::Root,
    ];

    fn pointer(self) -> &'static str {
        match self {
            MessageLocation::Direct => "/message",
            MessageLocation::Nested => "/data/message/message",
            MessageLocation::Root => "",
        }
    }

    /// The message object at this location, if it has a usage object.
    pub fn extract(self, record: &Value) -> Option<&Object> {
        let message = record.pointer(self.pointer())?.as_object()?;
        message.get("usage")?.as_object()?;
        Some(message)
    }

    /// First location in [`Self::SEARCH_ORDER`] that yields a message.
    pub fn resolve(record: &Value) -> Option<(MessageLocation, &Object)> {
        Self::SEARCH_ORDER
            .iter()
            .find_map(|location| location.extract(record).map(|message| (*location, message)))
    }
}

/// Normalize one line of a session log.
pub fn parse_line(line: &[u8]) -> ParsedLine {
    let record: Value = match serde_json::from_slice(line) {
        Ok(value) => value,
        Err(e) => return ParsedLine::Malformed(e.to_string()),
    };

    if !record.is_object() {
        return ParsedLine::Malformed("record is not a JSON object".to_string());
    }

    if str_field(&record, "type") == Some("system") {
        return parse_system(&record)
            .map(ParsedLine::System)
            .unwrap_or(ParsedLine::Unrecognized);
    }

    match MessageLocation::resolve(&record) {
        Some((_, message)) => ParsedLine::Usage(parse_usage(&record, message)),
        None => ParsedLine::Unrecognized,
    }
}

fn parse_usage(record: &Value, message: &Object) -> UsageEvent {
    let empty = Object::new();
    let usage = message
        .get("usage")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let cost_details = field(usage, &["cost_details", "costDetails"]).and_then(Value::as_object);
    let server_tools = field(usage, &["server_tool_use", "serverToolUse"]).and_then(Value::as_object);

    let cost_usd = record
        .get("costUSD")
        .and_then(Value::as_f64)
        .or_else(|| number(usage, &["cost", "cost_usd", "costUSD"]))
        .unwrap_or(0.0);

    UsageEvent {
        model: normalize_model(message.get("model").and_then(Value::as_str).unwrap_or("")),
        stop_reason: non_empty(field(message, &["stop_reason", "stopReason"])),
        tokens: TokenCounts {
            input: number(usage, &["input_tokens", "inputTokens"]).unwrap_or(0.0),
            output: number(usage, &["output_tokens", "outputTokens"]).unwrap_or(0.0),
            cache_read: number(usage, &["cache_read_input_tokens", "cacheReadInputTokens"])
                .unwrap_or(0.0),
            cache_creation: number(
                usage,
                &["cache_creation_input_tokens", "cacheCreationInputTokens"],
            )
            .unwrap_or(0.0),
        },
        cost_usd,
        prompt_cost_usd: cost_details
            .and_then(|details| number(details, &["prompt_cost", "promptCost"]))
            .unwrap_or(0.0),
        completion_cost_usd: cost_details
            .and_then(|details| number(details, &["completion_cost", "completionCost"]))
            .unwrap_or(0.0),
        tool_names: tool_names(message),
        web_search_requests: server_tools
            .and_then(|tools| number(tools, &["web_search_requests", "webSearchRequests"]))
            .map(as_count)
            .unwrap_or(0),
        web_fetch_requests: server_tools
            .and_then(|tools| number(tools, &["web_fetch_requests", "webFetchRequests"]))
            .map(as_count)
            .unwrap_or(0),
    }
}

fn parse_system(record: &Value) -> Option<SystemEvent> {
    let record = record.as_object()?;
    match record.get("subtype").and_then(Value::as_str)? {
        "turn_duration" => Some(SystemEvent::TurnDuration {
            duration_ms: number(record, &["durationMs", "duration_ms"]).unwrap_or(0.0),
        }),
        "api_error" => Some(SystemEvent::ApiError {
            retry_attempt: number(record, &["retryAttempt", "retry_attempt"])
                .map(as_count)
                .unwrap_or(0),
        }),
        "compact_boundary" => {
            let metadata = field(record, &["compactMetadata", "compact_metadata"])
                .and_then(Value::as_object);
            Some(SystemEvent::CompactBoundary {
                pre_tokens: metadata
                    .and_then(|meta| number(meta, &["preTokens", "pre_tokens"]))
                    .unwrap_or(0.0),
            })
        }
        _ => None,
    }
}

/// One name per tool-call content block with a non-empty name.
fn tool_names(message: &Object) -> Vec<String> {
    let Some(blocks) = message.get("content").and_then(Value::as_array) else {
        return Vec::new();
    };

    blocks
        .iter()
        .filter(|block| {
            matches!(
                block.get("type").and_then(Value::as_str),
                Some("tool_use" | "server_tool_use")
            )
        })
        .filter_map(|block| block.get("name").and_then(Value::as_str))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn field<'a>(object: &'a Object, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| object.get(*key).filter(|value| !value.is_null()))
}

fn number(object: &Object, keys: &[&str]) -> Option<f64> {
    field(object, keys).and_then(Value::as_f64)
}

fn str_field<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn as_count(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage_of(line: &str) -> UsageEvent {
        match parse_line(line.as_bytes()) {
            ParsedLine::Usage(event) => event,
            other => panic!("expected usage event, got {:?}", other),
        }
    }

    #[test]
    fn test_direct_message() {
        let event = usage_of(
            r#"{"type":"assistant","message":{"model":"anthropic/claude-x","role":"assistant","stop_reason":"end_turn","usage":{"input_tokens":12,"output_tokens":34,"cache_read_input_tokens":5,"cache_creation_input_tokens":6}}}"#,
        );

        assert_eq!(event.model, "claude-x");
        assert_eq!(event.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(
            event.tokens,
            TokenCounts {
                input: 12.0,
                output: 34.0,
                cache_read: 5.0,
                cache_creation: 6.0,
            }
        );
    }

    #[test]
    fn test_nested_message_matches_direct() {
        let direct = usage_of(
            r#"{"message":{"model":"claude-x","usage":{"input_tokens":7,"output_tokens":3}}}"#,
        );
        let nested = usage_of(
            r#"{"type":"progress","data":{"message":{"message":{"model":"claude-x","usage":{"input_tokens":7,"output_tokens":3}}}}}"#,
        );

        assert_eq!(direct, nested);
    }

    #[test]
    fn test_direct_message_preferred() {
        let record: Value = serde_json::from_str(
            r#"{"message":{"model":"a","usage":{"input_tokens":1}},"data":{"message":{"message":{"model":"b","usage":{"input_tokens":2}}}}}"#,
        )
        .unwrap();

        let (location, message) = MessageLocation::resolve(&record).unwrap();
        assert_eq!(location, MessageLocation::Direct);
        assert_eq!(message.get("model").and_then(Value::as_str), Some("a"));
    }

    #[test]
    fn test_camel_case_usage_keys() {
        let event = usage_of(
            r#"{"message":{"model":"claude-x","usage":{"inputTokens":9,"outputTokens":4,"cacheReadInputTokens":2,"cacheCreationInputTokens":1}}}"#,
        );
        assert_eq!(event.tokens.input, 9.0);
        assert_eq!(event.tokens.output, 4.0);
        assert_eq!(event.tokens.cache_read, 2.0);
        assert_eq!(event.tokens.cache_creation, 1.0);
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let event = usage_of(r#"{"message":{"usage":{"output_tokens":8}}}"#);
        assert_eq!(event.model, "unknown");
        assert_eq!(event.tokens.input, 0.0);
        assert_eq!(event.tokens.output, 8.0);
        assert_eq!(event.cost_usd, 0.0);
        assert!(event.stop_reason.is_none());
        assert!(event.tool_names.is_empty());
    }

    #[test]
    fn test_tool_blocks() {
        let event = usage_of(
            r#"{"message":{"model":"claude-x","content":[{"type":"text","text":"hi"},{"type":"tool_use","name":"Bash"},{"type":"tool_use","name":""},{"type":"server_tool_use","name":"web_search"},{"type":"tool_result","name":"Bash"}],"usage":{"output_tokens":1}}}"#,
        );
        assert_eq!(event.tool_names, vec!["Bash", "web_search"]);
    }

    #[test]
    fn test_costs_and_server_tools() {
        let event = usage_of(
            r#"{"costUSD":0.25,"message":{"model":"claude-x","usage":{"output_tokens":1,"cost_details":{"prompt_cost":0.1,"completion_cost":0.15},"server_tool_use":{"web_search_requests":2,"web_fetch_requests":1}}}}"#,
        );
        assert_eq!(event.cost_usd, 0.25);
        assert_eq!(event.prompt_cost_usd, 0.1);
        assert_eq!(event.completion_cost_usd, 0.15);
        assert_eq!(event.web_search_requests, 2);
        assert_eq!(event.web_fetch_requests, 1);

        let inline = usage_of(r#"{"message":{"model":"claude-x","usage":{"output_tokens":1,"cost":0.5}}}"#);
        assert_eq!(inline.cost_usd, 0.5);
    }

    #[test]
    fn test_system_events() {
        assert_eq!(
            parse_line(br#"{"type":"system","subtype":"turn_duration","durationMs":5000}"#),
            ParsedLine::System(SystemEvent::TurnDuration { duration_ms: 5000.0 })
        );
        assert_eq!(
            parse_line(br#"{"type":"system","subtype":"api_error","retryAttempt":3,"maxRetries":10}"#),
            ParsedLine::System(SystemEvent::ApiError { retry_attempt: 3 })
        );
        assert_eq!(
            parse_line(br#"{"type":"system","subtype":"compact_boundary","compactMetadata":{"trigger":"auto","preTokens":160000}}"#),
            ParsedLine::System(SystemEvent::CompactBoundary { pre_tokens: 160000.0 })
        );
        assert_eq!(
            parse_line(br#"{"type":"system","subtype":"stop_hook_summary"}"#),
            ParsedLine::Unrecognized
        );
    }

    #[test]
    fn test_unrecognized_and_malformed() {
        assert_eq!(
            parse_line(br#"{"type":"user","message":{"role":"user","content":"hello"}}"#),
            ParsedLine::Unrecognized
        );
        assert!(matches!(parse_line(b"{broken json"), ParsedLine::Malformed(_)));
        assert!(matches!(parse_line(b"[1,2,3]"), ParsedLine::Malformed(_)));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let line = br#"{"message":{"model":"anthropic/claude-x","stop_reason":"tool_use","content":[{"type":"tool_use","name":"Read"}],"usage":{"input_tokens":1,"output_tokens":2}}}"#;
        assert_eq!(parse_line(line), parse_line(line));
    }
}
