use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::http::ErrorResponse, error::AppError, services::answers_library, state::SharedState,
};

#[utoipa::path(
    get,
    path = "/api/answers-library",
    tag = "library",
    responses(
        (status = 200, description = "Answer-set file names", body = [String]),
        (status = 500, description = "Library directory unreadable", body = ErrorResponse)
    )
)]
/// List the answer-set CSV files available to hosts.
pub async fn answers_library(
    State(state): State<SharedState>,
) -> Result<Json<Vec<String>>, AppError> {
    let files = answers_library::list_answer_files(&state.config().answers_dir).await?;
    Ok(Json(files))
}

/// Configure the answers library route.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/api/answers-library", get(answers_library))
}
