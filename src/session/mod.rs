//! The editing session: one toggle in one environment, one exclusively
//! owned rule model.
//!
//! The session is the explicit application-state object the UI talks to.
//! It owns the baseline wire document, the editor, the validation registry
//! and the history navigator, gates publish on the dirty flag and on an
//! error-free registry, and refuses to route mutations while a historical
//! version is displayed.

use std::time::Duration;

use crate::client::{ApiClient, ExistsKind};
use crate::config::Config;
use crate::diff::{self, RenderedDiff};
use crate::editor::{register_document, TargetingEditor};
use crate::errors::AppError;
use crate::history::{SelectOutcome, VersionNavigator};
use crate::models::{PublishRequest, SegmentPage, TargetingDocument, TargetingSnapshot};
use crate::transform;
use crate::validation::{UniquenessChecker, ValidationRegistry};

/// UI-level maximum number of rules per targeting document.
pub const MAX_RULES: usize = 30;
/// Platform maximum number of variations per toggle.
pub const MAX_VARIATIONS: usize = 20;

/// Addresses one toggle's targeting in one environment.
#[derive(Debug, Clone)]
pub struct TogglePath {
    pub project_key: String,
    pub environment_key: String,
    pub toggle_key: String,
}

impl TogglePath {
    pub fn new(project_key: &str, environment_key: &str, toggle_key: &str) -> Self {
        Self {
            project_key: project_key.to_string(),
            environment_key: environment_key.to_string(),
            toggle_key: toggle_key.to_string(),
        }
    }
}

pub struct EditingSession {
    client: ApiClient,
    path: TogglePath,
    page_size: usize,
    debounce: Duration,
    baseline: Option<TargetingDocument>,
    editor: TargetingEditor,
    registry: ValidationRegistry,
    navigator: VersionNavigator,
    uniqueness: UniquenessChecker,
}

impl EditingSession {
    pub fn new(config: &Config, path: TogglePath) -> Self {
        Self {
            client: ApiClient::new(config),
            path,
            page_size: config.version_page_size,
            debounce: config.debounce,
            baseline: None,
            editor: TargetingEditor::default(),
            registry: ValidationRegistry::new(),
            navigator: VersionNavigator::new(0),
            uniqueness: UniquenessChecker::new(),
        }
    }

    // ==================== LOAD / PUBLISH ====================

    /// Load the live targeting document and replace the rule model
    /// wholesale.
    pub async fn load(&mut self) -> Result<(), AppError> {
        let document = self
            .client
            .get_targeting(
                &self.path.project_key,
                &self.path.environment_key,
                &self.path.toggle_key,
            )
            .await?;
        tracing::info!(
            toggle = %self.path.toggle_key,
            version = document.version,
            "loaded targeting document"
        );
        self.navigator = VersionNavigator::new(document.version);
        self.install_document(document);
        Ok(())
    }

    /// Dirty flag gating the publish action: false right after load, true
    /// after any single field mutation.
    pub fn is_dirty(&self) -> bool {
        match self.baseline_snapshot() {
            Some(baseline) => diff::is_dirty(&self.current_snapshot(), &baseline),
            None => false,
        }
    }

    /// Save-transformed view of the current editable state.
    pub fn current_snapshot(&self) -> TargetingSnapshot {
        transform::save_editor(&self.editor)
    }

    fn baseline_snapshot(&self) -> Option<TargetingSnapshot> {
        self.baseline.as_ref().map(|doc| TargetingSnapshot {
            disabled: doc.disabled,
            content: doc.content.clone(),
        })
    }

    /// Side-by-side diff for the publish-confirmation modal. Empty when no
    /// document has been loaded yet.
    pub fn publish_preview(&self) -> RenderedDiff {
        diff::build_diff(
            self.baseline_snapshot().as_ref(),
            Some(&self.current_snapshot()),
        )
    }

    /// Publish the current state. All-or-nothing: on failure the rule
    /// model is left exactly as it was so the user can retry.
    pub async fn publish(&mut self, comment: Option<String>) -> Result<(), AppError> {
        if self.navigator.viewing_history() {
            return Err(AppError::Validation(
                "cannot publish while viewing a historical version".to_string(),
            ));
        }
        if !self.is_dirty() {
            return Err(AppError::Validation("no changes to publish".to_string()));
        }
        if !self.registry.trigger_all() {
            let fields = self.registry.error_field_names().join(", ");
            return Err(AppError::Validation(format!(
                "validation errors on: {}",
                fields
            )));
        }

        let snapshot = self.current_snapshot();
        let request = PublishRequest {
            comment,
            disabled: snapshot.disabled,
            content: snapshot.content.clone(),
        };
        self.client
            .publish_targeting(
                &self.path.project_key,
                &self.path.environment_key,
                &self.path.toggle_key,
                &request,
            )
            .await?;
        tracing::info!(toggle = %self.path.toggle_key, "published targeting document");

        // The published state is the new baseline; the bumped version
        // number arrives with the next load.
        if let Some(baseline) = &mut self.baseline {
            baseline.disabled = snapshot.disabled;
            baseline.content = snapshot.content;
        }
        Ok(())
    }

    // ==================== EDITING ====================

    pub fn editor(&self) -> &TargetingEditor {
        &self.editor
    }

    pub fn registry(&self) -> &ValidationRegistry {
        &self.registry
    }

    /// Mutable access to the rule model and its registry. Refused while a
    /// historical version is displayed.
    pub fn editor_mut(&mut self) -> Option<(&mut TargetingEditor, &mut ValidationRegistry)> {
        if self.navigator.viewing_history() {
            return None;
        }
        Some((&mut self.editor, &mut self.registry))
    }

    /// Append a rule, enforcing the UI-level maximum.
    pub fn add_rule(&mut self) -> Result<(), AppError> {
        let Some((editor, registry)) = self.editor_mut() else {
            return Err(read_only_error());
        };
        if editor.rules.len() >= MAX_RULES {
            return Err(AppError::Validation(format!(
                "a toggle supports at most {} rules",
                MAX_RULES
            )));
        }
        editor.add_rule(registry);
        Ok(())
    }

    /// Append a variation, enforcing the platform maximum.
    pub fn add_variation(&mut self) -> Result<(), AppError> {
        let Some((editor, registry)) = self.editor_mut() else {
            return Err(read_only_error());
        };
        if editor.variations.len() >= MAX_VARIATIONS {
            return Err(AppError::Validation(format!(
                "a toggle supports at most {} variations",
                MAX_VARIATIONS
            )));
        }
        editor.add_variation(registry);
        Ok(())
    }

    // ==================== HISTORY ====================

    pub fn navigator(&self) -> &VersionNavigator {
        &self.navigator
    }

    /// Fetch and accumulate the next page of published versions. Stays
    /// within the anchored view after a deep-link seed.
    pub async fn load_version_page(&mut self) -> Result<(), AppError> {
        let page = self
            .client
            .get_versions(
                &self.path.project_key,
                &self.path.environment_key,
                &self.path.toggle_key,
                self.navigator.next_page_index(),
                self.page_size,
                self.navigator.anchor_version(),
            )
            .await?;
        self.navigator.record_page(page);
        Ok(())
    }

    /// Seed history around a deep-linked version.
    pub async fn seed_history_at(&mut self, version: i64) -> Result<(), AppError> {
        let seeded = self
            .client
            .get_versions_by_version(
                &self.path.project_key,
                &self.path.environment_key,
                &self.path.toggle_key,
                version,
            )
            .await?;
        self.navigator.seed(version, seeded, self.page_size);
        Ok(())
    }

    /// Ask to view a historical version. On `NeedsConfirmation` the caller
    /// shows the unsaved-changes modal, then calls
    /// [`EditingSession::confirm_history_navigation`] and retries.
    pub fn select_version(&mut self, version: i64) -> SelectOutcome {
        let dirty = self.is_dirty();
        let outcome = self.navigator.select_version(version, dirty);
        if let SelectOutcome::Switched {
            version,
            disabled,
            content,
        } = &outcome
        {
            self.install_document(TargetingDocument {
                disabled: *disabled,
                content: content.clone(),
                version: *version,
                modified_by: None,
                modified_time: None,
                comment: None,
            });
        }
        outcome
    }

    pub fn confirm_history_navigation(&mut self) {
        self.navigator.confirm_navigation();
    }

    /// Leave history viewing: reload the live document from the backend
    /// and resume editing.
    pub async fn exit_history(&mut self) -> Result<(), AppError> {
        let document = self
            .client
            .get_targeting(
                &self.path.project_key,
                &self.path.environment_key,
                &self.path.toggle_key,
            )
            .await?;
        self.navigator.exit_history(document.version);
        self.install_document(document);
        Ok(())
    }

    // ==================== LOOKUPS ====================

    /// Segments available as segment-condition operands.
    pub async fn load_segments(&self, page_index: i64) -> Result<SegmentPage, AppError> {
        self.client
            .list_segments(&self.path.project_key, page_index, self.page_size)
            .await
    }

    /// Debounced toggle-key uniqueness check. `Ok(None)` means a newer
    /// keystroke superseded this one.
    pub async fn check_toggle_key(&self, value: &str) -> Result<Option<bool>, AppError> {
        self.check_exists("toggle_key", ExistsKind::Key, value, false)
            .await
    }

    /// Debounced toggle-name uniqueness check.
    pub async fn check_toggle_name(&self, value: &str) -> Result<Option<bool>, AppError> {
        self.check_exists("toggle_name", ExistsKind::Name, value, false)
            .await
    }

    /// Debounced segment-key uniqueness check.
    pub async fn check_segment_key(&self, value: &str) -> Result<Option<bool>, AppError> {
        self.check_exists("segment_key", ExistsKind::Key, value, true)
            .await
    }

    /// Debounced segment-name uniqueness check.
    pub async fn check_segment_name(&self, value: &str) -> Result<Option<bool>, AppError> {
        self.check_exists("segment_name", ExistsKind::Name, value, true)
            .await
    }

    pub fn uniqueness(&self) -> &UniquenessChecker {
        &self.uniqueness
    }

    async fn check_exists(
        &self,
        field: &str,
        kind: ExistsKind,
        value: &str,
        segment: bool,
    ) -> Result<Option<bool>, AppError> {
        let client = self.client.clone();
        let project = self.path.project_key.clone();
        let value = value.to_string();
        self.uniqueness
            .check(field, self.debounce, move || async move {
                if segment {
                    client.segment_exists(&project, kind, &value).await
                } else {
                    client.toggle_exists(&project, kind, &value).await
                }
            })
            .await
    }

    /// Replace the rule model wholesale with a freshly transformed
    /// document and re-register every field.
    fn install_document(&mut self, document: TargetingDocument) {
        self.editor = transform::load_document(&document);
        self.registry = ValidationRegistry::new();
        register_document(&self.editor, &mut self.registry);
        self.baseline = Some(document);
    }
}

fn read_only_error() -> AppError {
    AppError::Validation("the rule model is read-only while viewing history".to_string())
}
