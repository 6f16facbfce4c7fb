//! End-to-end tests against a stub backend.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::config::Config;
use crate::editor::{ConditionKind, SEGMENT_KIND};
use crate::history::SelectOutcome;
use crate::models::{
    Condition, PublishRequest, Rule, Segment, SegmentPage, Serve, TargetingContent,
    TargetingDocument, TargetingVersion, Variation, VersionPage, VersionsByVersion,
};
use crate::session::{EditingSession, TogglePath};

const PROJECT_KEY: &str = "web";
const ENVIRONMENT_KEY: &str = "online";
const TOGGLE_KEY: &str = "checkout";

#[derive(Default)]
struct StubState {
    document: TargetingDocument,
    /// Newest first, like the backend returns them.
    versions: Vec<TargetingVersion>,
    publishes: Vec<PublishRequest>,
    taken_keys: HashSet<String>,
    fail_publish: bool,
}

type Shared = Arc<Mutex<StubState>>;

/// Test fixture: a stub backend plus a session pointed at it.
struct TestFixture {
    state: Shared,
    config: Config,
}

impl TestFixture {
    async fn new(document: TargetingDocument, versions: Vec<TargetingVersion>) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
            .try_init();

        let state: Shared = Arc::new(Mutex::new(StubState {
            document,
            versions,
            publishes: Vec::new(),
            taken_keys: HashSet::from(["used-key".to_string()]),
            fail_publish: false,
        }));

        let app = Router::new()
            .route(
                "/api/projects/{project}/environments/{environment}/toggles/{toggle}/targeting",
                get(get_targeting).patch(patch_targeting),
            )
            .route(
                "/api/projects/{project}/environments/{environment}/toggles/{toggle}/targeting/versions",
                get(get_versions),
            )
            .route(
                "/api/projects/{project}/environments/{environment}/toggles/{toggle}/targeting/versions/{version}",
                get(get_versions_by_version),
            )
            .route("/api/projects/{project}/segments", get(list_segments))
            .route("/api/projects/{project}/toggles/exists", get(toggle_exists))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let config = Config {
            base_url: format!("http://{}/api", addr),
            api_token: Some("test-token".to_string()),
            version_page_size: 10,
            debounce: Duration::from_millis(5),
            log_level: "warn".to_string(),
        };

        TestFixture { state, config }
    }

    fn session(&self, toggle_key: &str) -> EditingSession {
        EditingSession::new(
            &self.config,
            TogglePath::new(PROJECT_KEY, ENVIRONMENT_KEY, toggle_key),
        )
    }

    fn publishes(&self) -> Vec<PublishRequest> {
        self.state.lock().unwrap().publishes.clone()
    }
}

async fn get_targeting(
    State(state): State<Shared>,
    Path((_, _, toggle)): Path<(String, String, String)>,
) -> Result<Json<TargetingDocument>, StatusCode> {
    if toggle != TOGGLE_KEY {
        return Err(StatusCode::NOT_FOUND);
    }
    let state = state.lock().unwrap();
    Ok(Json(state.document.clone()))
}

async fn patch_targeting(
    State(state): State<Shared>,
    Path((_, _, toggle)): Path<(String, String, String)>,
    Json(request): Json<PublishRequest>,
) -> StatusCode {
    if toggle != TOGGLE_KEY {
        return StatusCode::NOT_FOUND;
    }
    let mut state = state.lock().unwrap();
    if state.fail_publish {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    state.document.disabled = request.disabled;
    state.document.content = request.content.clone();
    state.document.version += 1;
    state.publishes.push(request);
    StatusCode::OK
}

async fn get_versions(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<VersionPage> {
    let page_index: usize = params
        .get("pageIndex")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let page_size: usize = params
        .get("pageSize")
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);
    let ceiling: Option<i64> = params.get("version").and_then(|v| v.parse().ok());
    let state = state.lock().unwrap();
    let visible: Vec<&TargetingVersion> = state
        .versions
        .iter()
        .filter(|v| ceiling.map_or(true, |max| v.version <= max))
        .collect();
    let content: Vec<TargetingVersion> = visible
        .iter()
        .skip(page_index * page_size)
        .take(page_size)
        .map(|v| (*v).clone())
        .collect();
    let total_pages = visible.len().div_ceil(page_size) as i64;
    Json(VersionPage {
        content,
        number: page_index as i64,
        total_pages,
    })
}

async fn get_versions_by_version(
    State(state): State<Shared>,
    Path((_, _, _, version)): Path<(String, String, String, i64)>,
) -> Json<VersionsByVersion> {
    let state = state.lock().unwrap();
    let matching: Vec<&TargetingVersion> = state
        .versions
        .iter()
        .filter(|v| v.version <= version)
        .collect();
    let total = matching.len() as i64;
    // First page of the anchored view; older pages come via get_versions.
    let versions: Vec<TargetingVersion> =
        matching.into_iter().take(10).cloned().collect();
    Json(VersionsByVersion { versions, total })
}

async fn list_segments(Path(_project): Path<String>) -> Json<SegmentPage> {
    Json(SegmentPage {
        content: vec![
            Segment {
                key: "beta-testers".to_string(),
                name: "Beta testers".to_string(),
                description: None,
            },
            Segment {
                key: "employees".to_string(),
                name: "Employees".to_string(),
                description: None,
            },
        ],
        number: 0,
        total_pages: 1,
    })
}

async fn toggle_exists(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> StatusCode {
    let state = state.lock().unwrap();
    let value = params.get("value").map(String::as_str).unwrap_or("");
    if state.taken_keys.contains(value) {
        StatusCode::CONFLICT
    } else {
        StatusCode::OK
    }
}

/// One rule (`userId` is one of `u1`), two variations, version 3.
fn sample_document() -> TargetingDocument {
    TargetingDocument {
        disabled: false,
        content: TargetingContent {
            rules: vec![Rule {
                name: "paying users".to_string(),
                serve: Some(Serve::select(1)),
                conditions: vec![Condition {
                    kind: "string".to_string(),
                    subject: Some("userId".to_string()),
                    predicate: "is one of".to_string(),
                    objects: Some(vec!["u1".to_string()]),
                }],
            }],
            variations: vec![
                Variation {
                    value: "false".to_string(),
                    name: Some("off".to_string()),
                    description: None,
                },
                Variation {
                    value: "true".to_string(),
                    name: Some("on".to_string()),
                    description: None,
                },
            ],
            default_serve: Some(Serve::select(0)),
            disabled_serve: Some(Serve::select(0)),
        },
        version: 3,
        modified_by: Some("tester".to_string()),
        modified_time: None,
        comment: None,
    }
}

fn sample_versions(latest: i64) -> Vec<TargetingVersion> {
    (1..=latest)
        .rev()
        .map(|number| TargetingVersion {
            version: number,
            disabled: number % 2 == 0,
            content: TargetingContent {
                variations: vec![Variation {
                    value: format!("v{}", number),
                    name: None,
                    description: None,
                }],
                ..Default::default()
            },
            created_by: Some("tester".to_string()),
            created_time: None,
            comment: Some(format!("change {}", number)),
        })
        .collect()
}

#[tokio::test]
async fn test_load_starts_clean_and_mutations_flip_dirty() {
    let fixture = TestFixture::new(sample_document(), Vec::new()).await;
    let mut session = fixture.session(TOGGLE_KEY);
    session.load().await.unwrap();
    assert!(!session.is_dirty());

    // A single field mutation makes the draft dirty; undoing it restores
    // the clean state.
    let (editor, registry) = session.editor_mut().unwrap();
    editor.change_variation_value(1, "yes", registry);
    assert!(session.is_dirty());

    let (editor, registry) = session.editor_mut().unwrap();
    editor.change_variation_value(1, "true", registry);
    assert!(!session.is_dirty());
}

#[tokio::test]
async fn test_rule_reordering_is_a_significant_change() {
    let mut document = sample_document();
    let mut second = document.content.rules[0].clone();
    second.name = "second".to_string();
    document.content.rules.push(second);

    let fixture = TestFixture::new(document, Vec::new()).await;
    let mut session = fixture.session(TOGGLE_KEY);
    session.load().await.unwrap();
    assert!(!session.is_dirty());

    let (editor, _) = session.editor_mut().unwrap();
    editor.reorder_rule(0, Some(1));
    assert!(session.is_dirty());
}

#[tokio::test]
async fn test_deleting_the_only_rule_is_dirty() {
    let fixture = TestFixture::new(sample_document(), Vec::new()).await;
    let mut session = fixture.session(TOGGLE_KEY);
    session.load().await.unwrap();

    let (editor, registry) = session.editor_mut().unwrap();
    editor.delete_rule(0, registry);
    assert!(session.is_dirty());
    assert!(session.current_snapshot().content.rules.is_empty());
}

#[tokio::test]
async fn test_added_segment_condition_omits_subject_on_the_wire() {
    let fixture = TestFixture::new(sample_document(), Vec::new()).await;
    let mut session = fixture.session(TOGGLE_KEY);
    session.load().await.unwrap();

    let (editor, registry) = session.editor_mut().unwrap();
    editor.add_condition(0, SEGMENT_KIND, registry);
    assert_eq!(editor.rules[0].conditions[1].kind.subject(), "user");

    let snapshot = session.current_snapshot();
    let saved = &snapshot.content.rules[0].conditions[1];
    assert_eq!(saved.kind, "segment");
    assert!(saved.subject.is_none());
}

#[tokio::test]
async fn test_datetime_condition_round_trips_untouched() {
    let mut document = sample_document();
    document.content.rules[0].conditions.push(Condition {
        kind: "datetime".to_string(),
        subject: Some("datetime".to_string()),
        predicate: "before".to_string(),
        objects: Some(vec!["2023-05-01T10:00:0008:00".to_string()]),
    });

    let fixture = TestFixture::new(document.clone(), Vec::new()).await;
    let mut session = fixture.session(TOGGLE_KEY);
    session.load().await.unwrap();

    // Loading split the operand; saving without modification must
    // reproduce the original string exactly, so the draft stays clean.
    assert!(!session.is_dirty());
    match &session.editor().rules[0].conditions[1].kind {
        ConditionKind::Datetime {
            datetime, timezone, ..
        } => {
            assert_eq!(datetime, "2023-05-01T10:00:00");
            assert_eq!(timezone, "08:00");
        }
        other => panic!("expected datetime condition, got {:?}", other),
    }
    let snapshot = session.current_snapshot();
    assert_eq!(
        snapshot.content.rules[0].conditions[1].objects,
        Some(vec!["2023-05-01T10:00:0008:00".to_string()])
    );
}

#[tokio::test]
async fn test_publish_round_trip() {
    let fixture = TestFixture::new(sample_document(), Vec::new()).await;
    let mut session = fixture.session(TOGGLE_KEY);
    session.load().await.unwrap();

    // Publishing a clean draft is refused.
    let err = session.publish(None).await.unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    let (editor, _) = session.editor_mut().unwrap();
    editor.set_disabled(true);
    assert!(session.is_dirty());
    assert!(!session.publish_preview().is_empty());

    session
        .publish(Some("disable for maintenance".to_string()))
        .await
        .unwrap();
    assert!(!session.is_dirty());

    let publishes = fixture.publishes();
    assert_eq!(publishes.len(), 1);
    assert!(publishes[0].disabled);
    assert_eq!(
        publishes[0].comment.as_deref(),
        Some("disable for maintenance")
    );
}

#[tokio::test]
async fn test_publish_blocked_by_field_errors() {
    let fixture = TestFixture::new(sample_document(), Vec::new()).await;
    let mut session = fixture.session(TOGGLE_KEY);
    session.load().await.unwrap();

    // A fresh rule has an empty condition, so required-field validation
    // fails and nothing reaches the backend.
    session.add_rule().unwrap();
    assert!(session.is_dirty());
    let err = session.publish(None).await.unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    assert!(fixture.publishes().is_empty());
}

#[tokio::test]
async fn test_history_navigation_with_confirmation_gate() {
    let fixture = TestFixture::new(sample_document(), sample_versions(3)).await;
    let mut session = fixture.session(TOGGLE_KEY);
    session.load().await.unwrap();
    session.load_version_page().await.unwrap();
    assert_eq!(session.navigator().versions().len(), 3);

    // Unsaved edits gate the first navigation.
    let (editor, _) = session.editor_mut().unwrap();
    editor.set_disabled(true);
    assert_eq!(session.select_version(1), SelectOutcome::NeedsConfirmation);

    session.confirm_history_navigation();
    assert!(matches!(
        session.select_version(1),
        SelectOutcome::Switched { version: 1, .. }
    ));
    assert!(session.navigator().viewing_history());

    // The rule model is read-only from the session's perspective.
    assert!(session.editor_mut().is_none());
    assert!(session.add_rule().is_err());

    // The displayed version itself starts clean.
    assert!(!session.is_dirty());

    session.exit_history().await.unwrap();
    assert!(!session.navigator().viewing_history());
    assert!(session.editor_mut().is_some());
    assert_eq!(session.navigator().latest_version(), 3);
}

#[tokio::test]
async fn test_selecting_latest_version_returns_to_live_editing() {
    let fixture = TestFixture::new(sample_document(), sample_versions(3)).await;
    let mut session = fixture.session(TOGGLE_KEY);
    session.load().await.unwrap();
    session.load_version_page().await.unwrap();

    assert!(matches!(
        session.select_version(3),
        SelectOutcome::Switched { version: 3, .. }
    ));
    assert!(!session.navigator().viewing_history());
    assert!(session.editor_mut().is_some());
}

#[tokio::test]
async fn test_version_pagination_accumulates() {
    let fixture = TestFixture::new(sample_document(), sample_versions(15)).await;
    let mut session = fixture.session(TOGGLE_KEY);
    session.load().await.unwrap();

    session.load_version_page().await.unwrap();
    assert_eq!(session.navigator().versions().len(), 10);
    assert!(session.navigator().has_more());

    session.load_version_page().await.unwrap();
    assert_eq!(session.navigator().versions().len(), 15);
    assert!(!session.navigator().has_more());
}

#[tokio::test]
async fn test_deep_link_seeds_history() {
    let fixture = TestFixture::new(sample_document(), sample_versions(15)).await;
    let mut session = fixture.session(TOGGLE_KEY);
    session.load().await.unwrap();

    session.seed_history_at(5).await.unwrap();
    assert_eq!(session.navigator().versions().len(), 5);
    // Everything at or below the anchor fit in the seeded window.
    assert!(!session.navigator().has_more());
    assert!(matches!(
        session.select_version(5),
        SelectOutcome::Switched { version: 5, .. }
    ));
}

#[tokio::test]
async fn test_paging_after_deep_link_seed_fetches_only_older_versions() {
    let fixture = TestFixture::new(sample_document(), sample_versions(15)).await;
    let mut session = fixture.session(TOGGLE_KEY);
    session.load().await.unwrap();

    // The anchored view holds 12 versions; the seed returns the first
    // page of them.
    session.seed_history_at(12).await.unwrap();
    assert_eq!(session.navigator().versions().len(), 10);
    assert!(session.navigator().has_more());

    session.load_version_page().await.unwrap();
    let numbers: Vec<i64> = session
        .navigator()
        .versions()
        .iter()
        .map(|v| v.version)
        .collect();
    // No duplicates, newest first, nothing newer than the anchor.
    assert_eq!(numbers, (1..=12).rev().collect::<Vec<i64>>());
    assert!(!session.navigator().has_more());
}

#[tokio::test]
async fn test_segments_feed_condition_operand_choices() {
    let fixture = TestFixture::new(sample_document(), Vec::new()).await;
    let session = fixture.session(TOGGLE_KEY);

    let page = session.load_segments(0).await.unwrap();
    let keys: Vec<&str> = page.content.iter().map(|s| s.key.as_str()).collect();
    assert_eq!(keys, vec!["beta-testers", "employees"]);
}

#[tokio::test]
async fn test_missing_toggle_maps_to_not_found() {
    let fixture = TestFixture::new(sample_document(), Vec::new()).await;
    let mut session = fixture.session("deleted-toggle");
    let err = session.load().await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_uniqueness_checks_against_backend() {
    let fixture = TestFixture::new(sample_document(), Vec::new()).await;
    let session = fixture.session(TOGGLE_KEY);

    let taken = session.check_toggle_key("used-key").await.unwrap();
    assert_eq!(taken, Some(true));

    let free = session.check_toggle_key("brand-new-key").await.unwrap();
    assert_eq!(free, Some(false));
    assert_eq!(session.uniqueness().result("toggle_key"), Some(false));
}

#[tokio::test]
async fn test_failed_publish_leaves_model_untouched() {
    let fixture = TestFixture::new(sample_document(), Vec::new()).await;
    let mut session = fixture.session(TOGGLE_KEY);
    session.load().await.unwrap();

    let (editor, registry) = session.editor_mut().unwrap();
    editor.change_variation_value(1, "yes", registry);
    let snapshot_before = session.current_snapshot();

    fixture.state.lock().unwrap().fail_publish = true;
    let err = session.publish(None).await.unwrap_err();
    assert_eq!(err.error_code(), "BACKEND_ERROR");

    // The model is exactly as it was, so the user can retry.
    assert_eq!(session.current_snapshot(), snapshot_before);
    assert!(session.is_dirty());

    fixture.state.lock().unwrap().fail_publish = false;
    session.publish(None).await.unwrap();
    assert!(!session.is_dirty());
}
