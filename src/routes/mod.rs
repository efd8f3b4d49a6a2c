use crate::helper::workflow_helpers::WorkflowHelperError;
use crate::models::db_operations::posts_db_operations::DbError;
use crate::models::ApiResponse;
use crate::workflow::{Denial, WorkflowError};
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};

pub mod auth;
pub mod posts;
pub mod public;

async fn root_handler() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}

/// Registers every route. The `/api` catch-all scope of the public routes
/// goes last so it does not shadow the more specific scopes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(root_handler))
        .configure(auth::config_auth)
        .configure(posts::config_posts)
        .configure(public::config_api);
}

/// Runs storage work off the async executor and flattens the two error layers.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, WorkflowHelperError>
where
    F: FnOnce() -> Result<T, WorkflowHelperError> + Send + 'static,
    T: Send + 'static,
{
    web::block(f).await?
}

pub(crate) fn status_code_for(err: &WorkflowHelperError) -> StatusCode {
    match err {
        WorkflowHelperError::Db(db_err) => match db_err {
            DbError::TransitionRejected { denial: Denial::WrongStatus, .. } => StatusCode::CONFLICT,
            DbError::TransitionRejected { denial: Denial::InsufficientLevel, .. }
            | DbError::EditNotAllowed(_) => StatusCode::FORBIDDEN,
            DbError::NotFound(_) => StatusCode::NOT_FOUND,
            DbError::Uuid(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        WorkflowHelperError::Workflow(WorkflowError::InvalidInitialStatus(_)) => {
            StatusCode::BAD_REQUEST
        }
        WorkflowHelperError::Workflow(WorkflowError::InitialStatusNotPermitted { .. }) => {
            StatusCode::FORBIDDEN
        }
        WorkflowHelperError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowHelperError::Validation(_) => StatusCode::BAD_REQUEST,
        WorkflowHelperError::Unauthorized => StatusCode::UNAUTHORIZED,
        WorkflowHelperError::Forbidden => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Maps a helper error onto the JSON envelope. Server-side failures are
/// logged and reported without internals.
pub(crate) fn error_response(context: &str, err: WorkflowHelperError) -> HttpResponse {
    let status = status_code_for(&err);
    let message = if status.is_server_error() {
        log::error!("{}: {}", context, err);
        "Internal server error.".to_string()
    } else {
        log::debug!("{}: {}", context, err);
        err.to_string()
    };
    HttpResponse::build(status).json(ApiResponse::<()>::failure(message))
}
