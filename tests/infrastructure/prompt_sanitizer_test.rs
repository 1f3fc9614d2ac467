use echoscribe::infrastructure::observability::sanitize_prompt;

#[test]
fn given_empty_prompt_when_sanitizing_then_placeholder_returned() {
    assert_eq!(sanitize_prompt("   "), "[EMPTY]");
}

#[test]
fn given_long_prompt_when_sanitizing_then_truncated_with_total_length() {
    let prompt = "a".repeat(300);

    let sanitized = sanitize_prompt(&prompt);

    assert!(sanitized.contains("(300 chars total)"));
    assert!(sanitized.len() < prompt.len());
}

#[test]
fn given_bearer_token_when_sanitizing_then_redacted() {
    let sanitized = sanitize_prompt("call with Bearer sk-secret-token now");

    assert!(sanitized.contains("Bearer [REDACTED]"));
    assert!(!sanitized.contains("sk-secret-token"));
}

#[test]
fn given_api_key_parameter_when_sanitizing_then_redacted() {
    let sanitized = sanitize_prompt("url?api_key=abcd1234&x=1");

    assert!(sanitized.contains("api_key=[REDACTED]"));
    assert!(!sanitized.contains("abcd1234"));
}
