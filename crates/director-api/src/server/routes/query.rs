#[derive(Debug, Deserialize)]
struct HistoryQuery {
    from_tick: Option<u64>,
    to_tick: Option<u64>,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    schema_version: String,
    project_id: String,
    thread_id: String,
    records: Vec<TickRecord>,
}

async fn get_history(
    Path((project_id, thread_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, HttpApiError> {
    let from_tick = query.from_tick.unwrap_or(0);
    let to_tick = query.to_tick.unwrap_or(u64::MAX);
    if from_tick > to_tick {
        return Err(HttpApiError::invalid_query(
            "from_tick must be <= to_tick",
            Some(format!("from_tick={from_tick} to_tick={to_tick}")),
        ));
    }

    let inner = state.inner.lock().await;
    let api = require_project(&inner, &project_id)?;
    let records = api
        .records(&thread_id, from_tick, to_tick)
        .map_err(HttpApiError::from_api)?;
    Ok(Json(HistoryResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        project_id,
        thread_id,
        records,
    }))
}

#[derive(Debug, Serialize)]
struct ThreadStateResponse {
    schema_version: String,
    project_id: String,
    thread_id: String,
    tick_count: u64,
    idle_tick_count: u64,
    intensity: f64,
    state: serde_json::Value,
}

async fn get_thread_state(
    Path((project_id, thread_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<ThreadStateResponse>, HttpApiError> {
    let inner = state.inner.lock().await;
    let api = require_project(&inner, &project_id)?;
    let thread = api.thread(&thread_id).map_err(HttpApiError::from_api)?;
    let snapshot = serde_json::to_value(&thread.state)
        .map_err(|err| HttpApiError::internal("state serialization failed", Some(err.to_string())))?;
    Ok(Json(ThreadStateResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        project_id,
        thread_id,
        tick_count: thread.history.next_tick_index(),
        idle_tick_count: thread.history.idle_tick_count(),
        intensity: thread.state.world.intensity,
        state: snapshot,
    }))
}

#[derive(Debug, Deserialize)]
struct ReplayRequest {
    from_tick: u64,
    to_tick: u64,
    config: Option<DirectorConfig>,
}

#[derive(Debug, Serialize)]
struct ReplayResponse {
    schema_version: String,
    project_id: String,
    records: Vec<TickRecord>,
}

async fn replay_project(
    Path(project_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<ReplayRequest>,
) -> Result<Json<ReplayResponse>, HttpApiError> {
    let config = request.config.unwrap_or_default();
    let inner = state.inner.lock().await;
    let api = require_project(&inner, &project_id)?;
    let records = api
        .replay(&config, request.from_tick, request.to_tick)
        .map_err(HttpApiError::from_api)?;
    Ok(Json(ReplayResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        project_id,
        records,
    }))
}

#[derive(Debug, Deserialize)]
struct ExplainQuery {
    thread_id: String,
    mode: Option<contracts::EvaluationMode>,
}

#[derive(Debug, Serialize)]
struct ExplainResponse {
    schema_version: String,
    project_id: String,
    storylet_id: String,
    conditions: Vec<ConditionReport>,
}

async fn explain_storylet(
    Path((project_id, storylet_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Query(query): Query<ExplainQuery>,
) -> Result<Json<ExplainResponse>, HttpApiError> {
    let config = DirectorConfig {
        mode: query.mode.unwrap_or_default(),
        ..DirectorConfig::default()
    };
    let inner = state.inner.lock().await;
    let api = require_project(&inner, &project_id)?;
    let conditions = api
        .explain(&query.thread_id, &storylet_id, &config)
        .map_err(HttpApiError::from_api)?;
    Ok(Json(ExplainResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        project_id,
        storylet_id,
        conditions,
    }))
}
