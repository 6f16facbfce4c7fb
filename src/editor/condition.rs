//! Editable condition variants.
//!
//! The wire carries conditions as one flat record with mutually exclusive
//! optional fields; in memory each discriminant gets exactly the fields
//! valid for it. Unrecognized discriminants are carried through untouched
//! so historical documents survive server-side schema additions.

use uuid::Uuid;

/// Wire discriminant for attribute conditions.
pub const STRING_KIND: &str = "string";
/// Wire discriminant for segment-membership conditions.
pub const SEGMENT_KIND: &str = "segment";
/// Wire discriminant for datetime conditions.
pub const DATETIME_KIND: &str = "datetime";

/// Subject implied by segment conditions; never sent on the wire.
pub const SEGMENT_SUBJECT: &str = "user";

/// Default subject for a freshly added datetime condition.
pub const DATETIME_SUBJECT: &str = "datetime";

/// Length of the ISO local date-time prefix in a wire datetime operand
/// (`2023-05-01T10:00:00`); the remainder is the zone suffix.
pub const DATETIME_PREFIX_LEN: usize = 19;

/// One predicate within a rule, typed by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionKind {
    /// Attribute test against a user attribute key. `subject` and
    /// `objects` stay optional so a sparse wire record round-trips to its
    /// exact original shape.
    Basic {
        subject: Option<String>,
        predicate: String,
        objects: Option<Vec<String>>,
    },
    /// Segment membership test; the subject is implicitly [`SEGMENT_SUBJECT`].
    Segment {
        predicate: String,
        objects: Option<Vec<String>>,
    },
    /// Datetime comparison; `datetime` + `timezone` reconstruct the single
    /// wire operand.
    Datetime {
        subject: String,
        predicate: String,
        datetime: String,
        timezone: String,
    },
    /// Unrecognized discriminant, passed through load/save unmodified.
    Other {
        kind: String,
        subject: Option<String>,
        predicate: String,
        objects: Option<Vec<String>>,
    },
}

impl ConditionKind {
    /// The wire discriminant string.
    pub fn kind_name(&self) -> &str {
        match self {
            ConditionKind::Basic { .. } => STRING_KIND,
            ConditionKind::Segment { .. } => SEGMENT_KIND,
            ConditionKind::Datetime { .. } => DATETIME_KIND,
            ConditionKind::Other { kind, .. } => kind,
        }
    }

    /// Subject as shown in the editable view ("user" for segments).
    pub fn subject(&self) -> &str {
        match self {
            ConditionKind::Basic { subject, .. } | ConditionKind::Other { subject, .. } => {
                subject.as_deref().unwrap_or("")
            }
            ConditionKind::Datetime { subject, .. } => subject,
            ConditionKind::Segment { .. } => SEGMENT_SUBJECT,
        }
    }

    pub fn predicate(&self) -> &str {
        match self {
            ConditionKind::Basic { predicate, .. }
            | ConditionKind::Segment { predicate, .. }
            | ConditionKind::Datetime { predicate, .. }
            | ConditionKind::Other { predicate, .. } => predicate,
        }
    }
}

/// An editable condition with its client-assigned ephemeral id.
#[derive(Debug, Clone, PartialEq)]
pub struct EditCondition {
    /// Never persisted; keys UI state and validation-field names only.
    pub id: String,
    pub kind: ConditionKind,
}

impl EditCondition {
    /// Fresh condition of the given wire kind with a new ephemeral id.
    pub fn new(kind_name: &str) -> Self {
        let kind = match kind_name {
            SEGMENT_KIND => ConditionKind::Segment {
                predicate: String::new(),
                objects: Some(Vec::new()),
            },
            DATETIME_KIND => {
                let (datetime, timezone) = now_parts();
                ConditionKind::Datetime {
                    subject: DATETIME_SUBJECT.to_string(),
                    predicate: String::new(),
                    datetime,
                    timezone,
                }
            }
            STRING_KIND => ConditionKind::Basic {
                subject: Some(String::new()),
                predicate: String::new(),
                objects: Some(Vec::new()),
            },
            other => ConditionKind::Other {
                kind: other.to_string(),
                subject: None,
                predicate: String::new(),
                objects: None,
            },
        };
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
        }
    }

    pub fn with_kind(kind: ConditionKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
        }
    }
}

/// Current local timestamp split into the date-time prefix and zone suffix.
pub fn now_parts() -> (String, String) {
    let now = chrono::Local::now();
    (
        now.format("%Y-%m-%dT%H:%M:%S").to_string(),
        now.format("%:z").to_string(),
    )
}
