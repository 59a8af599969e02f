#[derive(Clone)]
struct AppState {
    inner: std::sync::Arc<Mutex<ServerInner>>,
}

impl AppState {
    fn new() -> Self {
        Self {
            inner: std::sync::Arc::new(Mutex::new(ServerInner::default())),
        }
    }
}

#[derive(Default)]
struct ServerInner {
    api: Option<DirectorApi>,
}

fn require_project<'a>(
    inner: &'a ServerInner,
    project_id: &str,
) -> Result<&'a DirectorApi, HttpApiError> {
    let Some(api) = inner.api.as_ref() else {
        return Err(HttpApiError::project_not_found(project_id, None));
    };
    if api.project_id() != project_id {
        return Err(HttpApiError::project_not_found(
            project_id,
            Some(api.project_id()),
        ));
    }
    Ok(api)
}

fn require_project_mut<'a>(
    inner: &'a mut ServerInner,
    project_id: &str,
) -> Result<&'a mut DirectorApi, HttpApiError> {
    let active_project_id = inner.api.as_ref().map(|api| api.project_id().to_string());
    let Some(api) = inner.api.as_mut() else {
        return Err(HttpApiError::project_not_found(project_id, None));
    };
    if api.project_id() != project_id {
        return Err(HttpApiError::project_not_found(
            project_id,
            active_project_id.as_deref(),
        ));
    }
    Ok(api)
}
