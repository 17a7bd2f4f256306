//! Represents a completion request for prompt arguments

use serde::{Deserialize, Serialize};

/// List of commands for Completions
pub mod commands {
    pub const COMPLETE: &str = "completion/complete";
}

/// A reference to the prompt being completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionReference {
    /// The reference type, e.g. `ref/prompt`.
    #[serde(rename = "type")]
    pub r#type: String,

    /// The prompt name, when the reference points at a prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The argument a completion is requested for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Argument {
    /// The argument name.
    pub name: String,

    /// The partial value typed so far.
    pub value: String,
}

/// Params of a `completion/complete` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequestParams {
    /// What the completion refers to.
    pub r#ref: CompletionReference,

    /// The argument being completed.
    pub argument: Argument,
}

/// The `completion` member of a [`CompleteResult`].
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Candidate values, best first.
    pub values: Vec<String>,

    /// Total number of candidates, when more exist than were returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,

    /// Whether more candidates exist beyond `values`.
    #[serde(rename = "hasMore", skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}

/// A response to a `completion/complete` request.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CompleteResult {
    /// The completion candidates.
    pub completion: Completion,
}

impl<T: Into<String>, const N: usize> From<[T; N]> for CompleteResult {
    fn from(values: [T; N]) -> Self {
        Self {
            completion: Completion {
                values: values.into_iter().map(Into::into).collect(),
                total: None,
                has_more: None,
            }
        }
    }
}
