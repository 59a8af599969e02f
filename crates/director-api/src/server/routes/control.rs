#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LoadProjectRequest {
    Project(Project),
    WithOptions(LoadProjectOptions),
}

#[derive(Debug, Deserialize)]
struct LoadProjectOptions {
    project: Project,
    sqlite_path: Option<String>,
    replace_existing: Option<bool>,
}

#[derive(Debug, Serialize)]
struct LoadProjectResponse {
    schema_version: String,
    project_id: String,
    storylet_count: usize,
    replaced_existing_project: bool,
}

async fn load_project(
    State(state): State<AppState>,
    Json(request): Json<LoadProjectRequest>,
) -> Result<Json<LoadProjectResponse>, HttpApiError> {
    let (project, sqlite_path, replace_existing) = match request {
        LoadProjectRequest::Project(project) => (project, None, true),
        LoadProjectRequest::WithOptions(options) => (
            options.project,
            options
                .sqlite_path
                .filter(|path| !path.trim().is_empty())
                .or_else(|| Some(DEFAULT_SQLITE_PATH.to_string())),
            options.replace_existing.unwrap_or(true),
        ),
    };

    let mut inner = state.inner.lock().await;
    let replaced_existing_project = inner.api.is_some();

    let mut api = DirectorApi::from_project(project).map_err(HttpApiError::from_api)?;
    if let Some(path) = sqlite_path {
        api.attach_sqlite_store(path)
            .map_err(|err| HttpApiError::from_api(err.into()))?;
        api.initialize_storage(replace_existing)
            .map_err(|err| HttpApiError::from_api(err.into()))?;
    }

    let response = LoadProjectResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        project_id: api.project_id().to_string(),
        storylet_count: api.project().storylets.len(),
        replaced_existing_project,
    };
    tracing::info!(
        project_id = %response.project_id,
        storylets = response.storylet_count,
        "project loaded"
    );
    inner.api = Some(api);

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct ListProjectsQuery {
    page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ListProjectsResponse {
    schema_version: String,
    active_project_id: Option<String>,
    persisted: Vec<PersistedProjectSummary>,
}

async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ListProjectsQuery>,
) -> Result<Json<ListProjectsResponse>, HttpApiError> {
    let page_size = query.page_size.unwrap_or(200).clamp(1, MAX_PAGE_SIZE);
    let inner = state.inner.lock().await;
    let active_project_id = inner.api.as_ref().map(|api| api.project_id().to_string());
    let persisted = match inner.api.as_ref() {
        Some(api) => api.list_persisted_projects(page_size).unwrap_or_default(),
        None => Vec::new(),
    };
    Ok(Json(ListProjectsResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        active_project_id,
        persisted,
    }))
}

#[derive(Debug, Deserialize)]
struct CreateThreadRequest {
    thread_id: String,
}

#[derive(Debug, Serialize)]
struct CreateThreadResponse {
    schema_version: String,
    project_id: String,
    thread_id: String,
    tick_count: u64,
}

async fn create_thread(
    Path(project_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<CreateThreadRequest>,
) -> Result<Json<CreateThreadResponse>, HttpApiError> {
    if request.thread_id.trim().is_empty() {
        return Err(HttpApiError::invalid_query(
            "thread_id must not be empty",
            None,
        ));
    }

    let mut inner = state.inner.lock().await;
    let api = require_project_mut(&mut inner, &project_id)?;
    let thread = api
        .create_thread(&request.thread_id)
        .map_err(HttpApiError::from_api)?;
    let response = CreateThreadResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        project_id,
        thread_id: thread.thread_id.clone(),
        tick_count: thread.history.next_tick_index(),
    };
    tracing::info!(thread_id = %response.thread_id, "thread created");
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct TickRequest {
    steps: Option<u64>,
    config: Option<DirectorConfig>,
}

#[derive(Debug, Serialize)]
struct TickResponse {
    schema_version: String,
    project_id: String,
    thread_id: String,
    records: Vec<TickRecord>,
    persistence_warning: Option<String>,
}

async fn tick_thread(
    Path((project_id, thread_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(request): Json<TickRequest>,
) -> Result<Json<TickResponse>, HttpApiError> {
    let steps = request.steps.unwrap_or(1);
    if steps == 0 {
        return Err(HttpApiError::invalid_query(
            "steps must be >= 1",
            Some("steps=0".to_string()),
        ));
    }
    let config = request.config.unwrap_or_default();

    let mut inner = state.inner.lock().await;
    let api = require_project_mut(&mut inner, &project_id)?;
    let records = api
        .tick(&thread_id, &config, steps)
        .map_err(HttpApiError::from_api)?;
    let persistence_warning = api.last_persistence_error().map(str::to_string);
    if let Some(warning) = &persistence_warning {
        tracing::warn!(thread_id = %thread_id, warning = %warning, "persistence flush failed");
    }

    Ok(Json(TickResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        project_id,
        thread_id,
        records,
        persistence_warning,
    }))
}
