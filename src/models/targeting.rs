//! Targeting document models matching the backend wire format.

use serde::{Deserialize, Serialize};

/// How a rule (or the default/disabled path) resolves to a variation.
///
/// Exactly one of `select` and `split` is meaningful at a time: `select`
/// picks a single variation by index, `split` carries one weight per
/// variation for a percentage rollout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Serve {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<Vec<u32>>,
}

impl Serve {
    /// A fixed-variation serve.
    pub fn select(index: usize) -> Self {
        Self {
            select: Some(index),
            split: None,
        }
    }

    /// A percentage-rollout serve with one weight per variation.
    pub fn split(weights: Vec<u32>) -> Self {
        Self {
            select: None,
            split: Some(weights),
        }
    }

    /// Highest variation index this serve refers to, if any.
    pub fn max_variation_index(&self) -> Option<usize> {
        match (self.select, &self.split) {
            (Some(index), _) => Some(index),
            (None, Some(weights)) if !weights.is_empty() => Some(weights.len() - 1),
            _ => None,
        }
    }
}

/// One predicate within a rule, in the flat record shape the wire uses.
///
/// `subject` is absent for segment conditions (it is implicit on the wire)
/// and `objects` may be absent on a never-populated datetime condition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default)]
    pub predicate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<String>>,
}

/// An ordered group of conditions (implicit AND) resolving to one serve.
///
/// Rules are evaluated first-match-wins by position within the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serve: Option<Serve>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// One possible return value of a toggle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The rules/variations/serving body of a targeting document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetingContent {
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub variations: Vec<Variation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_serve: Option<Serve>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_serve: Option<Serve>,
}

/// The full persisted targeting configuration for one toggle in one
/// environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetingDocument {
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub content: TargetingContent,
    #[serde(default)]
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// The `{ disabled, content }` pair that change detection and diffing
/// operate on. Field order here is the order diffs are rendered in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetingSnapshot {
    pub disabled: bool,
    pub content: TargetingContent,
}

/// Request body for publishing a targeting document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub disabled: bool,
    pub content: TargetingContent,
}
