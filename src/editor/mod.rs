//! The editable rule model and its mutation engine.
//!
//! The engine exclusively owns the live model for the duration of an
//! editing session. Every mutation that adds or removes a rule, condition
//! or variation also updates the validation registry, so no validation
//! entry can outlive the field it refers to.

mod condition;

pub use condition::*;

use uuid::Uuid;

use crate::models::Serve;
use crate::validation::{
    ConditionField, FieldKey, FieldRules, ValidationRegistry, VariationField,
};

/// An editable targeting rule: ordered conditions (implicit AND) plus the
/// serve applied when all of them match.
#[derive(Debug, Clone, PartialEq)]
pub struct EditRule {
    /// Ephemeral client id; stripped before transmission.
    pub id: String,
    pub name: String,
    pub serve: Option<Serve>,
    pub conditions: Vec<EditCondition>,
}

impl EditRule {
    /// Fresh rule with one empty attribute condition and no serve.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: String::new(),
            serve: None,
            conditions: vec![EditCondition::new(STRING_KIND)],
        }
    }
}

impl Default for EditRule {
    fn default() -> Self {
        Self::new()
    }
}

/// An editable variation with its ephemeral id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EditVariation {
    pub id: String,
    pub value: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl EditVariation {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ..Default::default()
        }
    }
}

/// The live editable targeting state, owned by one editing session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TargetingEditor {
    pub disabled: bool,
    pub rules: Vec<EditRule>,
    pub variations: Vec<EditVariation>,
    pub default_serve: Option<Serve>,
    pub disabled_serve: Option<Serve>,
}

impl TargetingEditor {
    // ==================== RULE OPERATIONS ====================

    /// Append a fresh rule and register its fields. The 30-rule UI cap is
    /// enforced by the session, not here.
    pub fn add_rule(&mut self, registry: &mut ValidationRegistry) {
        let rule = EditRule::new();
        register_rule(&rule, registry);
        self.rules.push(rule);
    }

    /// Remove the rule at `index`, releasing its validation keys.
    /// Silent no-op when `index` is out of range.
    pub fn delete_rule(&mut self, index: usize, registry: &mut ValidationRegistry) {
        if index >= self.rules.len() {
            return;
        }
        let rule = self.rules.remove(index);
        registry.release_rule(&rule.id);
    }

    /// Move the rule at `source` to `destination`. A missing destination
    /// means the drag was cancelled; both cases are silent no-ops.
    pub fn reorder_rule(&mut self, source: usize, destination: Option<usize>) {
        let Some(destination) = destination else {
            return;
        };
        if source >= self.rules.len() {
            return;
        }
        let rule = self.rules.remove(source);
        let destination = destination.min(self.rules.len());
        self.rules.insert(destination, rule);
    }

    pub fn change_rule_name(&mut self, rule_index: usize, name: impl Into<String>) {
        if let Some(rule) = self.rules.get_mut(rule_index) {
            rule.name = name.into();
        }
    }

    /// Replace the rule's serve and re-check serve ranges.
    pub fn change_serve(
        &mut self,
        rule_index: usize,
        serve: Serve,
        registry: &mut ValidationRegistry,
    ) {
        if let Some(rule) = self.rules.get_mut(rule_index) {
            rule.serve = Some(serve);
        }
        self.revalidate_serves(registry);
    }

    // ==================== CONDITION OPERATIONS ====================

    /// Append a condition of the given wire kind to a rule and register
    /// its fields. Segment conditions come up with the implicit "user"
    /// subject.
    pub fn add_condition(
        &mut self,
        rule_index: usize,
        kind_name: &str,
        registry: &mut ValidationRegistry,
    ) {
        let Some(rule) = self.rules.get_mut(rule_index) else {
            return;
        };
        let condition = EditCondition::new(kind_name);
        register_condition(&rule.id, &condition, registry);
        rule.conditions.push(condition);
    }

    /// Remove one condition, releasing its validation keys. The "keep at
    /// least one visible condition" rule lives in the UI layer; the engine
    /// will delete the last one if asked.
    pub fn delete_condition(
        &mut self,
        rule_index: usize,
        condition_index: usize,
        registry: &mut ValidationRegistry,
    ) {
        let Some(rule) = self.rules.get_mut(rule_index) else {
            return;
        };
        if condition_index >= rule.conditions.len() {
            return;
        }
        let condition = rule.conditions.remove(condition_index);
        registry.release_condition(&rule.id, &condition.id);
    }

    /// Set the attribute (subject) being tested.
    pub fn change_attr(
        &mut self,
        rule_index: usize,
        condition_index: usize,
        value: impl Into<String>,
        registry: &mut ValidationRegistry,
    ) {
        let value = value.into();
        let Some((rule_id, condition)) = self.condition_mut(rule_index, condition_index) else {
            return;
        };
        match &mut condition.kind {
            ConditionKind::Basic { subject, .. } | ConditionKind::Other { subject, .. } => {
                *subject = Some(value.clone());
            }
            ConditionKind::Datetime { subject, .. } => *subject = value.clone(),
            // Segment subjects are fixed.
            ConditionKind::Segment { .. } => return,
        }
        let key = FieldKey::condition(&rule_id, &condition.id, ConditionField::Subject);
        registry.set_value(&key, value);
        registry.trigger(&key);
    }

    /// Set the operator.
    pub fn change_operator(
        &mut self,
        rule_index: usize,
        condition_index: usize,
        value: impl Into<String>,
        registry: &mut ValidationRegistry,
    ) {
        let value = value.into();
        let Some((rule_id, condition)) = self.condition_mut(rule_index, condition_index) else {
            return;
        };
        match &mut condition.kind {
            ConditionKind::Basic { predicate, .. }
            | ConditionKind::Segment { predicate, .. }
            | ConditionKind::Datetime { predicate, .. }
            | ConditionKind::Other { predicate, .. } => *predicate = value.clone(),
        }
        let key = FieldKey::condition(&rule_id, &condition.id, ConditionField::Predicate);
        registry.set_value(&key, value);
        registry.trigger(&key);
    }

    /// Replace the operand list.
    pub fn change_value(
        &mut self,
        rule_index: usize,
        condition_index: usize,
        values: Vec<String>,
        registry: &mut ValidationRegistry,
    ) {
        let Some((rule_id, condition)) = self.condition_mut(rule_index, condition_index) else {
            return;
        };
        let joined = values.join(",");
        match &mut condition.kind {
            ConditionKind::Basic { objects, .. }
            | ConditionKind::Segment { objects, .. }
            | ConditionKind::Other { objects, .. } => *objects = Some(values),
            // Datetime operands are edited through the split fields.
            ConditionKind::Datetime { .. } => return,
        }
        let key = FieldKey::condition(&rule_id, &condition.id, ConditionField::Objects);
        registry.set_value(&key, joined);
        registry.trigger(&key);
    }

    /// Switch a condition to another kind, resetting its fields and
    /// re-registering exactly the fields valid for the new kind. The
    /// ephemeral id is kept so the row identity survives.
    pub fn change_type(
        &mut self,
        rule_index: usize,
        condition_index: usize,
        kind_name: &str,
        registry: &mut ValidationRegistry,
    ) {
        let Some((rule_id, condition)) = self.condition_mut(rule_index, condition_index) else {
            return;
        };
        if condition.kind.kind_name() == kind_name {
            return;
        }
        registry.release_condition(&rule_id, &condition.id);
        condition.kind = EditCondition::new(kind_name).kind;
        let rebuilt = condition.clone();
        register_condition(&rule_id, &rebuilt, registry);
    }

    pub fn change_date_time(
        &mut self,
        rule_index: usize,
        condition_index: usize,
        value: impl Into<String>,
        registry: &mut ValidationRegistry,
    ) {
        let value = value.into();
        let Some((rule_id, condition)) = self.condition_mut(rule_index, condition_index) else {
            return;
        };
        if let ConditionKind::Datetime { datetime, .. } = &mut condition.kind {
            *datetime = value.clone();
            let key = FieldKey::condition(&rule_id, &condition.id, ConditionField::Datetime);
            registry.set_value(&key, value);
            registry.trigger(&key);
        }
    }

    pub fn change_time_zone(
        &mut self,
        rule_index: usize,
        condition_index: usize,
        value: impl Into<String>,
        registry: &mut ValidationRegistry,
    ) {
        let value = value.into();
        let Some((rule_id, condition)) = self.condition_mut(rule_index, condition_index) else {
            return;
        };
        if let ConditionKind::Datetime { timezone, .. } = &mut condition.kind {
            *timezone = value.clone();
            let key = FieldKey::condition(&rule_id, &condition.id, ConditionField::Timezone);
            registry.set_value(&key, value);
            registry.trigger(&key);
        }
    }

    // ==================== VARIATION OPERATIONS ====================

    /// Append a fresh empty variation. The 20-variation cap is enforced by
    /// the session.
    pub fn add_variation(&mut self, registry: &mut ValidationRegistry) {
        let variation = EditVariation::new();
        register_variation(&variation, registry);
        self.variations.push(variation);
    }

    /// Remove a variation, releasing its validation keys and flagging any
    /// serve that now points past the end of the shrunk list.
    pub fn delete_variation(&mut self, index: usize, registry: &mut ValidationRegistry) {
        if index >= self.variations.len() {
            return;
        }
        let variation = self.variations.remove(index);
        registry.release_variation(&variation.id);
        self.revalidate_serves(registry);
    }

    pub fn change_variation_value(
        &mut self,
        index: usize,
        value: impl Into<String>,
        registry: &mut ValidationRegistry,
    ) {
        let value = value.into();
        let Some(variation) = self.variations.get_mut(index) else {
            return;
        };
        variation.value = value.clone();
        let key = FieldKey::variation(&variation.id, VariationField::Value);
        registry.set_value(&key, value);
        registry.trigger(&key);
    }

    pub fn change_variation_name(
        &mut self,
        index: usize,
        name: impl Into<String>,
        registry: &mut ValidationRegistry,
    ) {
        let name = name.into();
        let Some(variation) = self.variations.get_mut(index) else {
            return;
        };
        let key = FieldKey::variation(&variation.id, VariationField::Name);
        registry.set_value(&key, name.clone());
        registry.trigger(&key);
        variation.name = if name.is_empty() { None } else { Some(name) };
    }

    pub fn change_variation_description(&mut self, index: usize, description: impl Into<String>) {
        if let Some(variation) = self.variations.get_mut(index) {
            let description = description.into();
            variation.description = if description.is_empty() {
                None
            } else {
                Some(description)
            };
        }
    }

    // ==================== SERVE / DISABLED OPERATIONS ====================

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn set_default_serve(&mut self, serve: Serve, registry: &mut ValidationRegistry) {
        self.default_serve = Some(serve);
        self.revalidate_serves(registry);
    }

    pub fn set_disabled_serve(&mut self, serve: Serve, registry: &mut ValidationRegistry) {
        self.disabled_serve = Some(serve);
        self.revalidate_serves(registry);
    }

    /// Flag every serve whose variation index falls outside the current
    /// variations list, and clear the flag where it no longer applies.
    pub fn revalidate_serves(&self, registry: &mut ValidationRegistry) {
        let count = self.variations.len();
        let check = |registry: &mut ValidationRegistry, key: FieldKey, serve: Option<&Serve>| {
            match serve.and_then(Serve::max_variation_index) {
                Some(max) if max >= count => {
                    registry.set_error(key, "serve points past the variations list");
                }
                _ => registry.clear_errors(&key),
            }
        };
        check(registry, FieldKey::DefaultServe, self.default_serve.as_ref());
        check(
            registry,
            FieldKey::DisabledServe,
            self.disabled_serve.as_ref(),
        );
        for rule in &self.rules {
            check(
                registry,
                FieldKey::RuleServe {
                    rule_id: rule.id.clone(),
                },
                rule.serve.as_ref(),
            );
        }
    }

    fn condition_mut(
        &mut self,
        rule_index: usize,
        condition_index: usize,
    ) -> Option<(String, &mut EditCondition)> {
        let rule = self.rules.get_mut(rule_index)?;
        let rule_id = rule.id.clone();
        let condition = rule.conditions.get_mut(condition_index)?;
        Some((rule_id, condition))
    }
}

/// Register every field of a freshly loaded document.
pub fn register_document(editor: &TargetingEditor, registry: &mut ValidationRegistry) {
    for rule in &editor.rules {
        register_rule(rule, registry);
    }
    for variation in &editor.variations {
        register_variation(variation, registry);
    }
}

fn register_rule(rule: &EditRule, registry: &mut ValidationRegistry) {
    for condition in &rule.conditions {
        register_condition(&rule.id, condition, registry);
    }
}

fn register_condition(rule_id: &str, condition: &EditCondition, registry: &mut ValidationRegistry) {
    let mut field = |field: ConditionField, value: &str, message: &str| {
        let key = FieldKey::condition(rule_id, &condition.id, field);
        registry.register(key.clone(), FieldRules::required(message));
        registry.set_value(&key, value);
    };
    match &condition.kind {
        ConditionKind::Basic {
            subject,
            predicate,
            objects,
        } => {
            field(
                ConditionField::Subject,
                subject.as_deref().unwrap_or(""),
                "attribute is required",
            );
            field(ConditionField::Predicate, predicate, "operator is required");
            field(
                ConditionField::Objects,
                &objects.as_deref().unwrap_or_default().join(","),
                "values are required",
            );
        }
        ConditionKind::Segment { predicate, objects } => {
            field(ConditionField::Predicate, predicate, "operator is required");
            field(
                ConditionField::Objects,
                &objects.as_deref().unwrap_or_default().join(","),
                "segments are required",
            );
        }
        ConditionKind::Datetime {
            subject,
            predicate,
            datetime,
            timezone,
        } => {
            field(ConditionField::Subject, subject, "attribute is required");
            field(ConditionField::Predicate, predicate, "operator is required");
            field(ConditionField::Datetime, datetime, "datetime is required");
            field(ConditionField::Timezone, timezone, "timezone is required");
        }
        // Unknown kinds are the backend's to validate.
        ConditionKind::Other { .. } => {}
    }
}

fn register_variation(variation: &EditVariation, registry: &mut ValidationRegistry) {
    let key = FieldKey::variation(&variation.id, VariationField::Value);
    registry.register(key.clone(), FieldRules::required("value is required"));
    registry.set_value(&key, variation.value.clone());

    // The name is optional but still lives in the registry so its key is
    // released with the variation.
    let name_key = FieldKey::variation(&variation.id, VariationField::Name);
    registry.register(name_key.clone(), FieldRules::default());
    registry.set_value(&name_key, variation.name.clone().unwrap_or_default());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor_with_rules(count: usize) -> (TargetingEditor, ValidationRegistry) {
        let mut editor = TargetingEditor::default();
        let mut registry = ValidationRegistry::new();
        for _ in 0..count {
            editor.add_rule(&mut registry);
        }
        (editor, registry)
    }

    #[test]
    fn test_add_rule_starts_with_one_string_condition() {
        let (editor, _) = editor_with_rules(1);
        let rule = &editor.rules[0];
        assert!(rule.name.is_empty());
        assert!(rule.serve.is_none());
        assert_eq!(rule.conditions.len(), 1);
        assert_eq!(rule.conditions[0].kind.kind_name(), STRING_KIND);
    }

    #[test]
    fn test_delete_rule_out_of_range_is_noop() {
        let (mut editor, mut registry) = editor_with_rules(2);
        editor.delete_rule(5, &mut registry);
        assert_eq!(editor.rules.len(), 2);
    }

    #[test]
    fn test_delete_rule_releases_validation_keys() {
        let (mut editor, mut registry) = editor_with_rules(1);
        let rule_id = editor.rules[0].id.clone();
        let condition_id = editor.rules[0].conditions[0].id.clone();
        let key = FieldKey::condition(&rule_id, &condition_id, ConditionField::Subject);
        assert!(registry.is_registered(&key));

        editor.delete_rule(0, &mut registry);
        assert!(!registry.is_registered(&key));
        assert!(!registry.has_errors());
    }

    #[test]
    fn test_delete_condition_releases_only_its_keys() {
        let (mut editor, mut registry) = editor_with_rules(1);
        editor.add_condition(0, SEGMENT_KIND, &mut registry);
        let rule_id = editor.rules[0].id.clone();
        let first = editor.rules[0].conditions[0].id.clone();
        let second = editor.rules[0].conditions[1].id.clone();

        editor.delete_condition(0, 0, &mut registry);
        assert!(!registry.is_registered(&FieldKey::condition(
            &rule_id,
            &first,
            ConditionField::Subject
        )));
        assert!(registry.is_registered(&FieldKey::condition(
            &rule_id,
            &second,
            ConditionField::Predicate
        )));
    }

    #[test]
    fn test_reorder_without_destination_is_noop() {
        let (mut editor, _) = editor_with_rules(3);
        let before: Vec<String> = editor.rules.iter().map(|r| r.id.clone()).collect();
        editor.reorder_rule(0, None);
        let after: Vec<String> = editor.rules.iter().map(|r| r.id.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_reorder_moves_rule() {
        let (mut editor, _) = editor_with_rules(3);
        let ids: Vec<String> = editor.rules.iter().map(|r| r.id.clone()).collect();
        editor.reorder_rule(0, Some(2));
        let reordered: Vec<String> = editor.rules.iter().map(|r| r.id.clone()).collect();
        assert_eq!(reordered, vec![ids[1].clone(), ids[2].clone(), ids[0].clone()]);
    }

    #[test]
    fn test_change_type_swaps_registered_fields() {
        let (mut editor, mut registry) = editor_with_rules(1);
        let rule_id = editor.rules[0].id.clone();
        let condition_id = editor.rules[0].conditions[0].id.clone();

        editor.change_type(0, 0, SEGMENT_KIND, &mut registry);
        assert_eq!(editor.rules[0].conditions[0].id, condition_id);
        assert_eq!(editor.rules[0].conditions[0].kind.subject(), "user");
        assert!(!registry.is_registered(&FieldKey::condition(
            &rule_id,
            &condition_id,
            ConditionField::Subject
        )));
        assert!(registry.is_registered(&FieldKey::condition(
            &rule_id,
            &condition_id,
            ConditionField::Objects
        )));
    }

    #[test]
    fn test_delete_variation_flags_dangling_serve() {
        let mut editor = TargetingEditor::default();
        let mut registry = ValidationRegistry::new();
        editor.add_variation(&mut registry);
        editor.add_variation(&mut registry);
        editor.set_disabled_serve(crate::models::Serve::select(1), &mut registry);
        assert!(!registry.has_errors());

        editor.delete_variation(1, &mut registry);
        assert!(registry.error(&FieldKey::DisabledServe).is_some());

        editor.set_disabled_serve(crate::models::Serve::select(0), &mut registry);
        assert!(registry.error(&FieldKey::DisabledServe).is_none());
    }

    #[test]
    fn test_datetime_field_setters_touch_only_their_field() {
        let (mut editor, mut registry) = editor_with_rules(1);
        editor.change_type(0, 0, DATETIME_KIND, &mut registry);
        let rule_id = editor.rules[0].id.clone();
        let condition_id = editor.rules[0].conditions[0].id.clone();

        editor.change_attr(0, 0, "datetime", &mut registry);
        editor.change_operator(0, 0, "before", &mut registry);
        editor.change_date_time(0, 0, "2024-01-01T00:00:00", &mut registry);
        editor.change_time_zone(0, 0, "+02:00", &mut registry);

        match &editor.rules[0].conditions[0].kind {
            ConditionKind::Datetime {
                subject,
                predicate,
                datetime,
                timezone,
            } => {
                assert_eq!(subject, "datetime");
                assert_eq!(predicate, "before");
                assert_eq!(datetime, "2024-01-01T00:00:00");
                assert_eq!(timezone, "+02:00");
            }
            other => panic!("expected datetime condition, got {:?}", other),
        }
        let key = FieldKey::condition(&rule_id, &condition_id, ConditionField::Timezone);
        assert!(registry.error(&key).is_none());
    }

    #[test]
    fn test_variation_name_key_tracks_the_variation() {
        let mut editor = TargetingEditor::default();
        let mut registry = ValidationRegistry::new();
        editor.add_variation(&mut registry);
        let key = FieldKey::variation(&editor.variations[0].id, VariationField::Name);
        assert!(registry.is_registered(&key));
        // Names are optional; an empty value is valid.
        assert!(registry.trigger(&key));

        editor.change_variation_name(0, "on", &mut registry);
        assert_eq!(editor.variations[0].name.as_deref(), Some("on"));
        assert!(registry.error(&key).is_none());

        editor.delete_variation(0, &mut registry);
        assert!(!registry.is_registered(&key));
    }

    #[test]
    fn test_change_value_updates_registry_state() {
        let (mut editor, mut registry) = editor_with_rules(1);
        let rule_id = editor.rules[0].id.clone();
        let condition_id = editor.rules[0].conditions[0].id.clone();
        let key = FieldKey::condition(&rule_id, &condition_id, ConditionField::Objects);

        registry.trigger(&key);
        assert!(registry.error(&key).is_some());

        editor.change_value(0, 0, vec!["u1".to_string()], &mut registry);
        assert!(registry.error(&key).is_none());
        match &editor.rules[0].conditions[0].kind {
            ConditionKind::Basic { objects, .. } => {
                assert_eq!(objects, &Some(vec!["u1".to_string()]))
            }
            other => panic!("expected basic condition, got {:?}", other),
        }
    }
}
