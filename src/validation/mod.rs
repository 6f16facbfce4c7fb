//! Validation-registration layer for the targeting editor.
//!
//! The external form contract keys fields by synthetic names of the shape
//! `rule_{ruleId}_condition_{conditionId}_{field}` and
//! `variation_{variationId}[_name]`. Internally the registry is keyed by a
//! structured [`FieldKey`] so releasing a rule or condition cannot leave
//! orphaned entries behind; the string rendering is preserved by `Display`
//! for the form layer.

mod uniqueness;

pub use uniqueness::*;

use std::collections::HashMap;
use std::fmt;

/// Per-condition field discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionField {
    Subject,
    Predicate,
    Objects,
    Datetime,
    Timezone,
}

impl ConditionField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionField::Subject => "subject",
            ConditionField::Predicate => "predicate",
            ConditionField::Objects => "objects",
            ConditionField::Datetime => "datetime",
            ConditionField::Timezone => "timezone",
        }
    }
}

/// Per-variation field discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariationField {
    Value,
    Name,
}

/// Structured validation key. `Display` renders the synthetic field name
/// the form layer expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Condition {
        rule_id: String,
        condition_id: String,
        field: ConditionField,
    },
    RuleServe {
        rule_id: String,
    },
    Variation {
        variation_id: String,
        field: VariationField,
    },
    DefaultServe,
    DisabledServe,
}

impl FieldKey {
    pub fn condition(rule_id: &str, condition_id: &str, field: ConditionField) -> Self {
        FieldKey::Condition {
            rule_id: rule_id.to_string(),
            condition_id: condition_id.to_string(),
            field,
        }
    }

    pub fn variation(variation_id: &str, field: VariationField) -> Self {
        FieldKey::Variation {
            variation_id: variation_id.to_string(),
            field,
        }
    }

    fn rule_id(&self) -> Option<&str> {
        match self {
            FieldKey::Condition { rule_id, .. } | FieldKey::RuleServe { rule_id } => Some(rule_id),
            _ => None,
        }
    }

    fn condition_id(&self) -> Option<&str> {
        match self {
            FieldKey::Condition { condition_id, .. } => Some(condition_id),
            _ => None,
        }
    }

    fn variation_id(&self) -> Option<&str> {
        match self {
            FieldKey::Variation { variation_id, .. } => Some(variation_id),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Condition {
                rule_id,
                condition_id,
                field,
            } => write!(
                f,
                "rule_{}_condition_{}_{}",
                rule_id,
                condition_id,
                field.as_str()
            ),
            FieldKey::RuleServe { rule_id } => write!(f, "rule_{}_serve", rule_id),
            FieldKey::Variation {
                variation_id,
                field: VariationField::Value,
            } => write!(f, "variation_{}", variation_id),
            FieldKey::Variation {
                variation_id,
                field: VariationField::Name,
            } => write!(f, "variation_{}_name", variation_id),
            FieldKey::DefaultServe => write!(f, "default_serve"),
            FieldKey::DisabledServe => write!(f, "disabled_serve"),
        }
    }
}

/// Rules attached to a registered field.
#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    pub required: bool,
    pub message: String,
}

impl FieldRules {
    pub fn required(message: &str) -> Self {
        Self {
            required: true,
            message: message.to_string(),
        }
    }
}

/// Registered fields, their current values and their active errors.
///
/// Mirrors the `register`/`unregister`/`setValue`/`trigger`/`clearErrors`
/// surface of the external form-validation layer.
#[derive(Debug, Default)]
pub struct ValidationRegistry {
    registered: HashMap<FieldKey, FieldRules>,
    values: HashMap<FieldKey, String>,
    errors: HashMap<FieldKey, String>,
}

impl ValidationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: FieldKey, rules: FieldRules) {
        self.registered.insert(key, rules);
    }

    pub fn unregister(&mut self, key: &FieldKey) {
        self.registered.remove(key);
        self.values.remove(key);
        self.errors.remove(key);
    }

    pub fn set_value(&mut self, key: &FieldKey, value: impl Into<String>) {
        if self.registered.contains_key(key) {
            self.values.insert(key.clone(), value.into());
        }
    }

    /// Run the field's rules against its current value. Returns true when
    /// the field is valid.
    pub fn trigger(&mut self, key: &FieldKey) -> bool {
        let Some(rules) = self.registered.get(key) else {
            return true;
        };
        let value = self.values.get(key).map(String::as_str).unwrap_or("");
        if rules.required && value.trim().is_empty() {
            let message = rules.message.clone();
            self.errors.insert(key.clone(), message);
            false
        } else {
            self.errors.remove(key);
            true
        }
    }

    /// Trigger every registered field. Returns true when all are valid.
    pub fn trigger_all(&mut self) -> bool {
        let keys: Vec<FieldKey> = self.registered.keys().cloned().collect();
        let mut ok = true;
        for key in keys {
            ok &= self.trigger(&key);
        }
        ok && self.errors.is_empty()
    }

    pub fn clear_errors(&mut self, key: &FieldKey) {
        self.errors.remove(key);
    }

    /// Set an error outside the per-field rules (serve range checks).
    pub fn set_error(&mut self, key: FieldKey, message: impl Into<String>) {
        self.errors.insert(key, message.into());
    }

    pub fn error(&self, key: &FieldKey) -> Option<&str> {
        self.errors.get(key).map(String::as_str)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_registered(&self, key: &FieldKey) -> bool {
        self.registered.contains_key(key)
    }

    /// Unregister and clear every key belonging to one condition.
    pub fn release_condition(&mut self, rule_id: &str, condition_id: &str) {
        let keys: Vec<FieldKey> = self
            .registered
            .keys()
            .filter(|k| k.rule_id() == Some(rule_id) && k.condition_id() == Some(condition_id))
            .cloned()
            .collect();
        for key in keys {
            self.unregister(&key);
        }
    }

    /// Unregister and clear every key belonging to one rule, conditions
    /// included.
    pub fn release_rule(&mut self, rule_id: &str) {
        let keys: Vec<FieldKey> = self
            .registered
            .keys()
            .filter(|k| k.rule_id() == Some(rule_id))
            .cloned()
            .collect();
        for key in keys {
            self.unregister(&key);
        }
        // Errors set outside registration (serve range) share the rule id.
        self.errors.retain(|k, _| k.rule_id() != Some(rule_id));
    }

    /// Unregister and clear every key belonging to one variation.
    pub fn release_variation(&mut self, variation_id: &str) {
        let keys: Vec<FieldKey> = self
            .registered
            .keys()
            .filter(|k| k.variation_id() == Some(variation_id))
            .cloned()
            .collect();
        for key in keys {
            self.unregister(&key);
        }
    }

    /// Keys of currently active errors, in the form layer's synthetic
    /// string shape.
    pub fn error_field_names(&self) -> Vec<String> {
        self.errors.keys().map(|k| k.to_string()).collect()
    }
}
