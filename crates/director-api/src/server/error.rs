#[derive(Debug)]
pub enum ServerError {
    Io(std::io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "server io error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug)]
struct HttpApiError {
    status: StatusCode,
    error: ApiError,
}

impl HttpApiError {
    fn project_not_found(requested_project_id: &str, active_project_id: Option<&str>) -> Self {
        let details = active_project_id.map(|active| {
            format!("requested_project_id={requested_project_id} active_project_id={active}")
        });
        Self {
            status: StatusCode::NOT_FOUND,
            error: ApiError::new(
                ErrorCode::ProjectNotFound,
                "project_id does not match the loaded project",
                details,
            ),
        }
    }

    fn invalid_query(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: ApiError::new(ErrorCode::InvalidQuery, message, details),
        }
    }

    fn internal(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: ApiError::new(ErrorCode::InternalError, message, details),
        }
    }

    fn from_api(err: DirectorApiError) -> Self {
        match err {
            DirectorApiError::Validation(validation) => Self {
                status: StatusCode::BAD_REQUEST,
                error: ApiError::new(
                    ErrorCode::InvalidProject,
                    "validation failed",
                    Some(validation.issues.join("; ")),
                ),
            },
            DirectorApiError::ThreadExists(thread_id) => Self {
                status: StatusCode::CONFLICT,
                error: ApiError::new(
                    ErrorCode::InvalidQuery,
                    "thread already exists",
                    Some(format!("thread_id={thread_id}")),
                ),
            },
            DirectorApiError::ThreadNotFound(thread_id) => Self {
                status: StatusCode::NOT_FOUND,
                error: ApiError::new(
                    ErrorCode::ThreadNotFound,
                    "thread not found",
                    Some(format!("thread_id={thread_id}")),
                ),
            },
            DirectorApiError::Tick(TickError::UnknownStorylet(storylet_id)) => Self {
                status: StatusCode::NOT_FOUND,
                error: ApiError::new(
                    ErrorCode::StoryletNotFound,
                    "storylet not found",
                    Some(format!("storylet_id={storylet_id}")),
                ),
            },
            DirectorApiError::Tick(TickError::Aborted(aborted)) => Self {
                status: StatusCode::CONFLICT,
                error: ApiError::new(ErrorCode::TickAborted, "tick aborted", Some(aborted.to_string())),
            },
            DirectorApiError::Tick(TickError::TickRangeInvalid { from_tick, to_tick }) => Self {
                status: StatusCode::BAD_REQUEST,
                error: ApiError::new(
                    ErrorCode::TickOutOfRange,
                    "invalid tick range",
                    Some(format!("from_tick={from_tick} to_tick={to_tick}")),
                ),
            },
            DirectorApiError::Tick(other) => Self {
                status: StatusCode::CONFLICT,
                error: ApiError::new(ErrorCode::InvalidQuery, "tick rejected", Some(other.to_string())),
            },
            DirectorApiError::Persistence(persistence) => {
                Self::internal("persistence operation failed", Some(persistence.to_string()))
            }
        }
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}
