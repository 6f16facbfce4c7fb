//! Published-version models for the targeting history views.

use serde::{Deserialize, Serialize};

use super::TargetingContent;

/// An immutable snapshot of a targeting document's content, tagged with a
/// monotonically increasing version number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetingVersion {
    pub version: i64,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub content: TargetingContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// One page of versions, newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionPage {
    #[serde(default)]
    pub content: Vec<TargetingVersion>,
    /// Zero-based index of this page.
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub total_pages: i64,
}

/// Versions seeded around a specific version referenced by a deep link.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionsByVersion {
    #[serde(default)]
    pub versions: Vec<TargetingVersion>,
    #[serde(default)]
    pub total: i64,
}
