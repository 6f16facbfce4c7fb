//! Segment models, consumed to populate segment-membership condition
//! operand choices.

use serde::{Deserialize, Serialize};

/// A named, reusable set of targeting conditions usable as a condition
/// operand ("user is in segment X").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One page of segments for a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentPage {
    #[serde(default)]
    pub content: Vec<Segment>,
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub total_pages: i64,
}
