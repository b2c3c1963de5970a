use crate::data::{SolveRequest, SolveResponse};
use crate::error::SolveError;
use crate::solver;
use axum::{Json, Router, http::StatusCode, routing::post};
use log::{info, warn};

fn status_for(error: &SolveError) -> StatusCode {
    match error {
        SolveError::Configuration(_) | SolveError::InvalidModel(_) => StatusCode::BAD_REQUEST,
        SolveError::Infeasible(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

async fn solve_handler(
    Json(request): Json<SolveRequest>,
) -> Result<Json<SolveResponse>, (StatusCode, String)> {
    // the search is CPU-bound; keep it off the async workers
    let result = tokio::task::spawn_blocking(move || solver::solve(&request))
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Solver task failed: {}", e),
            )
        })?;

    match result {
        Ok(output) => Ok(Json(output)),
        Err(e) => {
            warn!("Rejected solve request: {}", e);
            Err((status_for(&e), e.to_string()))
        }
    }
}

pub fn router() -> Router {
    Router::new().route("/v1/assign/solve", post(solve_handler))
}

pub async fn run_server(addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, router()).await
}
