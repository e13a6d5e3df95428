use crate::error::{ChunkerError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Text-completion service used by the LLM-assisted and agentic strategies.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
    ) -> Result<String>;
}

/// Find the first balanced `{...}` or `[...]` in `text` that parses as JSON.
///
/// Brackets inside JSON strings are ignored; prose around the payload (code
/// fences, explanations) is skipped.
#[must_use]
pub fn extract_json(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut from = 0;
    while let Some(offset) = text[from..].find(&['{', '['][..]) {
        let start = from + offset;
        if let Some(end) = matching_close(bytes, start) {
            if let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) {
                return Some(value);
            }
        }
        from = start + 1;
    }
    None
}

/// Extract and deserialize the first JSON payload in `text`.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let value = extract_json(text)
        .ok_or_else(|| ChunkerError::external_service("response contained no JSON payload"))?;
    Ok(serde_json::from_value(value)?)
}

fn matching_close(bytes: &[u8], start: usize) -> Option<usize> {
    let mut stack: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (idx, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(byte) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}
