//! Stack output recovery
//!
//! Outputs are read either from the engine's structured stack description or,
//! as a fallback, scraped from the text a deploy prints. The text form looks
//! like:
//!
//! ```text
//! Outputs:
//! PipelineStack.KeyArn = arn:aws:kms:us-east-1:111:key/abc
//! PipelineStack.ArtifactBucket = pipeline-artifacts-111
//!
//! Stack ARN: ...
//! ```
//!
//! The section runs from the `Outputs:` line to the next blank line.

use serde::{Deserialize, Serialize};

use crate::key::KeyArn;

/// Marker line opening the outputs section of a deploy log
pub const OUTPUTS_MARKER: &str = "Outputs:";
/// Output exported by the channel stack with the artifact key ARN
pub const KEY_ARN_OUTPUT: &str = "KeyArn";
/// Output exported by the channel stack with the artifact bucket name
pub const ARTIFACT_BUCKET_OUTPUT: &str = "ArtifactBucket";

/// A named output of a deployed stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackOutput {
    pub output_key: String,
    pub output_value: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub export_name: Option<String>,
}

impl StackOutput {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            output_key: key.into(),
            output_value: value.into(),
            description: None,
            export_name: None,
        }
    }
}

/// Looks up an output value by name
pub fn find_output<'a>(outputs: &'a [StackOutput], name: &str) -> Option<&'a str> {
    outputs
        .iter()
        .find(|o| o.output_key == name)
        .map(|o| o.output_value.as_str())
        .filter(|v| !v.trim().is_empty())
}

/// Lines of every outputs section in a deploy log
pub fn outputs_sections(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut inside = false;

    for line in text.lines() {
        if !inside {
            if line.trim_start().starts_with(OUTPUTS_MARKER) {
                inside = true;
            }
            continue;
        }

        if line.trim().is_empty() {
            inside = false;
            continue;
        }

        lines.push(line);
    }

    lines
}

/// Scrapes a named output from a deploy log
///
/// Within the outputs sections, finds a token equal to `name` (optionally
/// prefixed with a stack name and a dot) and returns the token after it,
/// skipping a `=` or `:` separator. `name=value` as a single token is also
/// accepted. Returns `None` when nothing non-empty follows the label.
pub fn scrape_output(text: &str, name: &str) -> Option<String> {
    for line in outputs_sections(text) {
        let tokens: Vec<&str> = line.split_whitespace().collect();

        for (idx, token) in tokens.iter().enumerate() {
            if let Some((label, value)) = token.split_once('=') {
                if is_label(label, name) && !value.is_empty() {
                    return Some(value.to_string());
                }
                continue;
            }

            if !is_label(token, name) {
                continue;
            }

            let mut rest = tokens[idx + 1..].iter();
            let value = match rest.next() {
                Some(&"=") | Some(&":") => rest.next(),
                other => other,
            };

            if let Some(value) = value {
                return Some(value.to_string());
            }
        }
    }

    None
}

/// Scrapes the artifact key ARN from a deploy log
pub fn scrape_key_arn(text: &str) -> Option<KeyArn> {
    scrape_output(text, KEY_ARN_OUTPUT).and_then(|v| KeyArn::parse(&v))
}

fn is_label(token: &str, name: &str) -> bool {
    let token = token.trim_end_matches(':');
    token == name
        || token
            .rsplit_once('.')
            .is_some_and(|(_, suffix)| suffix == name)
}
