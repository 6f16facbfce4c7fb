//! Bidirectional mapping between the wire targeting document and the
//! editable in-memory model.
//!
//! Loading injects fresh ephemeral ids, fixes the implicit segment subject
//! and splits datetime operands into editable date-time/zone halves.
//! Saving strips the ids, drops the segment subject and re-joins the
//! datetime halves into the single wire operand. Both directions build new
//! values from clones; the document passed in is never mutated, since the
//! pre-transform document stays around as the change-detection baseline.

use crate::editor::{
    now_parts, ConditionKind, EditCondition, EditRule, EditVariation, TargetingEditor,
    DATETIME_KIND, DATETIME_PREFIX_LEN, SEGMENT_KIND, STRING_KIND,
};
use crate::models::{
    Condition, Rule, TargetingContent, TargetingDocument, TargetingSnapshot, Variation,
};
use uuid::Uuid;

/// Build the editable model from a wire document.
pub fn load_document(document: &TargetingDocument) -> TargetingEditor {
    load_content(&document.content, document.disabled)
}

/// Build the editable model from a version's content and disabled flag.
pub fn load_content(content: &TargetingContent, disabled: bool) -> TargetingEditor {
    TargetingEditor {
        disabled,
        rules: content.rules.iter().map(load_rule).collect(),
        variations: content.variations.iter().map(load_variation).collect(),
        default_serve: content.default_serve.clone(),
        disabled_serve: content.disabled_serve.clone(),
    }
}

/// Flatten the editable model back into the wire `{ disabled, content }`
/// shape.
pub fn save_editor(editor: &TargetingEditor) -> TargetingSnapshot {
    TargetingSnapshot {
        disabled: editor.disabled,
        content: TargetingContent {
            rules: editor.rules.iter().map(save_rule).collect(),
            variations: editor.variations.iter().map(save_variation).collect(),
            default_serve: editor.default_serve.clone(),
            disabled_serve: editor.disabled_serve.clone(),
        },
    }
}

fn load_rule(rule: &Rule) -> EditRule {
    EditRule {
        id: Uuid::new_v4().to_string(),
        name: rule.name.clone(),
        serve: rule.serve.clone(),
        conditions: rule.conditions.iter().map(load_condition).collect(),
    }
}

fn load_condition(condition: &Condition) -> EditCondition {
    let kind = match condition.kind.as_str() {
        STRING_KIND => ConditionKind::Basic {
            subject: condition.subject.clone(),
            predicate: condition.predicate.clone(),
            objects: condition.objects.clone(),
        },
        SEGMENT_KIND => ConditionKind::Segment {
            predicate: condition.predicate.clone(),
            objects: condition.objects.clone(),
        },
        DATETIME_KIND => {
            let (datetime, timezone) = match condition
                .objects
                .as_ref()
                .and_then(|objects| objects.first())
            {
                Some(raw) => split_datetime(raw),
                // Never-populated condition on a fresh rule.
                None => now_parts(),
            };
            ConditionKind::Datetime {
                subject: condition.subject.clone().unwrap_or_default(),
                predicate: condition.predicate.clone(),
                datetime,
                timezone,
            }
        }
        other => ConditionKind::Other {
            kind: other.to_string(),
            subject: condition.subject.clone(),
            predicate: condition.predicate.clone(),
            objects: condition.objects.clone(),
        },
    };
    EditCondition::with_kind(kind)
}

fn load_variation(variation: &Variation) -> EditVariation {
    EditVariation {
        id: Uuid::new_v4().to_string(),
        value: variation.value.clone(),
        name: variation.name.clone(),
        description: variation.description.clone(),
    }
}

fn save_rule(rule: &EditRule) -> Rule {
    Rule {
        name: rule.name.clone(),
        serve: rule.serve.clone(),
        conditions: rule.conditions.iter().map(save_condition).collect(),
    }
}

fn save_condition(condition: &EditCondition) -> Condition {
    match &condition.kind {
        ConditionKind::Basic {
            subject,
            predicate,
            objects,
        } => Condition {
            kind: STRING_KIND.to_string(),
            subject: subject.clone(),
            predicate: predicate.clone(),
            objects: objects.clone(),
        },
        // The segment subject is implicit on the wire.
        ConditionKind::Segment { predicate, objects } => Condition {
            kind: SEGMENT_KIND.to_string(),
            subject: None,
            predicate: predicate.clone(),
            objects: objects.clone(),
        },
        ConditionKind::Datetime {
            subject,
            predicate,
            datetime,
            timezone,
        } => Condition {
            kind: DATETIME_KIND.to_string(),
            subject: Some(subject.clone()),
            predicate: predicate.clone(),
            objects: Some(vec![format!("{}{}", datetime, timezone)]),
        },
        ConditionKind::Other {
            kind,
            subject,
            predicate,
            objects,
        } => Condition {
            kind: kind.clone(),
            subject: subject.clone(),
            predicate: predicate.clone(),
            objects: objects.clone(),
        },
    }
}

fn save_variation(variation: &EditVariation) -> Variation {
    Variation {
        value: variation.value.clone(),
        name: variation.name.clone(),
        description: variation.description.clone(),
    }
}

/// Split a wire datetime operand into its ISO local date-time prefix and
/// whatever zone suffix follows it. Operands shorter than the prefix are
/// kept whole with an empty suffix rather than rejected.
fn split_datetime(raw: &str) -> (String, String) {
    if raw.len() <= DATETIME_PREFIX_LEN || !raw.is_char_boundary(DATETIME_PREFIX_LEN) {
        return (raw.to_string(), String::new());
    }
    let (prefix, suffix) = raw.split_at(DATETIME_PREFIX_LEN);
    (prefix.to_string(), suffix.to_string())
}
