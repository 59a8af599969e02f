use super::*;

#[test]
fn router_builds_with_fresh_state() {
    let state = AppState::new();
    let _router = router(state);
}

#[tokio::test]
async fn requests_against_an_empty_server_report_project_not_found() {
    let state = AppState::new();
    let inner = state.inner.lock().await;
    let err = require_project(&inner, "proj-missing").expect_err("no project loaded");
    assert_eq!(err.status, StatusCode::NOT_FOUND);
    assert_eq!(err.error.error_code, ErrorCode::ProjectNotFound);
}

#[tokio::test]
async fn mismatched_project_ids_name_the_active_project() {
    let project = Project {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        project_id: "proj-live".to_string(),
        title: String::new(),
        world: Default::default(),
        characters: Default::default(),
        relationships: Default::default(),
        storylets: Vec::new(),
    };
    let api = DirectorApi::from_project(project).expect("valid project");
    let state = AppState::new();
    state.inner.lock().await.api = Some(api);

    let inner = state.inner.lock().await;
    let err = require_project(&inner, "proj-other").expect_err("wrong project id");
    assert_eq!(err.status, StatusCode::NOT_FOUND);
    assert!(err
        .error
        .details
        .as_deref()
        .expect("details")
        .contains("active_project_id=proj-live"));
}
