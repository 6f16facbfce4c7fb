//! Version/history navigation state machine.
//!
//! The navigator accumulates pages of published versions (append-only,
//! newest first) and tracks whether the session is editing the live draft
//! or viewing a historical version. The first history navigation after the
//! page opens is gated behind a confirmation when the draft has unsaved
//! edits; fetching itself is the session's job.

use crate::models::{TargetingContent, TargetingVersion, VersionPage, VersionsByVersion};

/// Result of asking to view a version.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectOutcome {
    /// Unsaved draft edits exist and navigation has not been confirmed yet;
    /// the caller shows the confirmation modal and retries after
    /// [`VersionNavigator::confirm_navigation`].
    NeedsConfirmation,
    /// The navigator switched; feed this document to the wire transform.
    Switched {
        version: i64,
        disabled: bool,
        content: TargetingContent,
    },
    /// The requested version is not in the accumulated list.
    UnknownVersion,
}

#[derive(Debug, Default)]
pub struct VersionNavigator {
    versions: Vec<TargetingVersion>,
    page_cursor: i64,
    has_more: bool,
    selected_version: i64,
    latest_version: i64,
    viewing_history: bool,
    navigation_confirmed: bool,
    /// Set while the list was seeded around a deep-linked version; later
    /// page fetches stay filtered to versions at or below it.
    anchor_version: Option<i64>,
}

impl VersionNavigator {
    pub fn new(latest_version: i64) -> Self {
        Self {
            latest_version,
            has_more: true,
            ..Self::default()
        }
    }

    /// Accumulated versions, newest first.
    pub fn versions(&self) -> &[TargetingVersion] {
        &self.versions
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn selected_version(&self) -> i64 {
        self.selected_version
    }

    pub fn latest_version(&self) -> i64 {
        self.latest_version
    }

    /// True while a non-latest version is displayed; the caller must not
    /// route mutations to the editor in this state.
    pub fn viewing_history(&self) -> bool {
        self.viewing_history
    }

    /// Page index the next fetch should request.
    pub fn next_page_index(&self) -> i64 {
        self.page_cursor
    }

    /// Version ceiling for page fetches after a deep-link seed.
    pub fn anchor_version(&self) -> Option<i64> {
        self.anchor_version
    }

    /// Append a fetched page, advance the cursor and recompute `has_more`.
    pub fn record_page(&mut self, page: VersionPage) {
        self.versions.extend(page.content);
        self.page_cursor = page.number + 1;
        self.has_more = self.page_cursor < page.total_pages;
    }

    /// Replace the accumulated list with versions seeded around a
    /// deep-linked version. Later fetches page the same anchored view, so
    /// the cursor resumes after the seeded pages and never re-fetches the
    /// versions already held.
    pub fn seed(&mut self, anchor: i64, seeded: VersionsByVersion, page_size: usize) {
        let fetched = seeded.versions.len();
        self.versions = seeded.versions;
        self.anchor_version = Some(anchor);
        self.page_cursor = fetched.div_ceil(page_size.max(1)) as i64;
        self.has_more = (fetched as i64) < seeded.total;
    }

    /// Allow history navigation away from a dirty draft. Sticky for the
    /// rest of the session: the modal is only interposed once.
    pub fn confirm_navigation(&mut self) {
        self.navigation_confirmed = true;
    }

    /// Ask to view `version`. `draft_dirty` is the dirty flag of the live
    /// draft; it gates only the first navigation.
    pub fn select_version(&mut self, version: i64, draft_dirty: bool) -> SelectOutcome {
        if draft_dirty && !self.navigation_confirmed {
            return SelectOutcome::NeedsConfirmation;
        }
        let Some(found) = self.versions.iter().find(|v| v.version == version) else {
            return SelectOutcome::UnknownVersion;
        };
        self.navigation_confirmed = true;
        self.selected_version = found.version;
        // Viewing the latest version is equivalent to live editing.
        self.viewing_history = found.version != self.latest_version;
        SelectOutcome::Switched {
            version: found.version,
            disabled: found.disabled,
            content: found.content.clone(),
        }
    }

    /// Return to the live draft. The session reloads the latest document
    /// from the backend and reports its version here.
    pub fn exit_history(&mut self, latest_version: i64) {
        self.latest_version = latest_version;
        self.selected_version = 0;
        self.viewing_history = false;
        self.anchor_version = None;
    }
}
