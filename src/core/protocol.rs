use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Token separating JSON records in the model's response stream.
pub const SEPARATOR: &str = ";;;";

/// One unvalidated candidate comment as emitted by the model.
///
/// `line_number` is kept raw because the model is allowed to send it as
/// either a JSON string or a number; coercion to an integer happens later,
/// in the synthesizer, where an invalid value drops just that finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewFinding {
    #[serde(deserialize_with = "string_or_number")]
    pub line_number: String,
    pub review_comment: String,
    #[serde(default)]
    pub importance: i64,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

/// The fixed system instruction priming the model with the response grammar,
/// including one worked example. Sent once per request, not once per hunk.
pub fn system_instruction() -> String {
    format!(
        r#"You are a senior engineer reviewing a pull request. You will receive one or more diff hunks from a single file. Each diff line is prefixed with its line number in the changed file.

Respond ONLY with review findings, using this exact format: zero or more single-line JSON objects of the shape
{{"lineNumber": <line>, "reviewComment": <comment>, "importance": <1-20 integer>}}
each terminated by the separator token `{sep}`. Higher importance means the issue matters more. If nothing is worth flagging, respond with an empty message.

Example input:
File: src/math.js
22. function divide(a, b) {{
23.   return a / b;
24. }}

Example response:
{{"lineNumber": "23", "reviewComment": "No guard against division by zero.", "importance": 12}}{sep}"#,
        sep = SEPARATOR
    )
}

/// Parse the model's raw response into findings.
///
/// Fail-closed: if any segment is not a valid record, the whole batch is
/// discarded and an empty list is returned. A malformed record usually means
/// the model broke the grammar mid-stream, after which the remaining segment
/// boundaries cannot be trusted. An empty response is the model declining to
/// comment and is a normal outcome, never an error.
pub fn parse_findings(raw: &str) -> Vec<ReviewFinding> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut segments: Vec<&str> = trimmed.split(SEPARATOR).collect();

    // A trailing separator leaves an empty remainder; that is grammar, not data.
    if let Some(last) = segments.last() {
        if last.trim().is_empty() {
            segments.pop();
        }
    }

    let mut findings = Vec::with_capacity(segments.len());
    for segment in segments {
        match serde_json::from_str::<ReviewFinding>(segment.trim()) {
            Ok(finding) => findings.push(finding),
            Err(err) => {
                warn!("Discarding entire response batch, malformed record: {}", err);
                return Vec::new();
            }
        }
    }

    findings
}
