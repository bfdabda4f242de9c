//! Lenient extraction of a JSON object from a model completion.

/// Strip markdown code fences around a JSON payload.
///
/// Even with `response_format: json_object`, some OpenAI-compatible servers
/// wrap the object in ``` fences. The JSON itself is returned untouched.
pub(crate) fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop an optional language tag ("json") on the opening fence line.
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\r', '\n']);
    rest.strip_suffix("```").map(str::trim).unwrap_or(rest.trim())
}
