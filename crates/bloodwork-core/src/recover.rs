use crate::error::AppError;

/// Pull the JSON payload out of a completion that may carry prose or
/// markdown code fences around it.
///
/// Takes everything from the first `{` to the last `}`, strips any
/// leftover fence tokens, and parses the result. An empty object carries no
/// data and is rejected like a parse failure.
pub fn recover_json(text: &str) -> Result<serde_json::Value, AppError> {
    let span = brace_span(text)
        .ok_or_else(|| AppError::MalformedResponse("No JSON object found in response".into()))?;

    let cleaned = span.replace("```json", "").replace("```", "");

    let value: serde_json::Value = serde_json::from_str(cleaned.trim())
        .map_err(|e| AppError::MalformedResponse(format!("Invalid JSON in response: {e}")))?;

    if value.as_object().is_some_and(|map| map.is_empty()) {
        return Err(AppError::MalformedResponse(
            "Response contained an empty JSON object".into(),
        ));
    }
    Ok(value)
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
