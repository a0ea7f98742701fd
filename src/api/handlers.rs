use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::api::state::AppState;
use crate::fetcher::{FetchError, FetchOptions, FetchResponse};

pub async fn welcome() -> Json<Value> {
    Json(json!("Welcome to my PrizePicks API"))
}

pub async fn get_leagues(State(state): State<AppState>) -> Response {
    let result = state
        .client
        .fetch(&state.upstream("leagues"), &FetchOptions::new().with_cache(None))
        .await;

    relay(result, |_| "Error fetching leagues from external API".to_string())
}

pub async fn get_projections(State(state): State<AppState>) -> Response {
    let options = FetchOptions::new()
        .with_query("per_page", "100")
        .with_query("include_new_player_attributes", "True")
        .with_cache(None);
    let result = state
        .client
        .fetch(&state.upstream("projections"), &options)
        .await;

    relay(result, |status| {
        if status == StatusCode::TOO_MANY_REQUESTS {
            log::warn!("rate limit (429) encountered when fetching projections");
        }
        "Error fetching projections from external API".to_string()
    })
}

pub async fn get_league_projections(
    State(state): State<AppState>,
    Path(league_id): Path<String>,
) -> Response {
    let league_id = league_id.trim().to_string();
    if league_id.is_empty() {
        return message(StatusCode::BAD_REQUEST, "League ID parameter is required.".into());
    }

    let options = FetchOptions::new()
        .with_query("league_id", league_id.as_str())
        .with_query("include_new_player_attributes", "True")
        .with_cache(None);
    let result = state
        .client
        .fetch(&state.upstream("projections"), &options)
        .await;

    relay(result, |status| match status {
        StatusCode::NOT_FOUND => format!("Projections not found for league ID: {league_id}"),
        StatusCode::TOO_MANY_REQUESTS => {
            log::warn!("rate limit (429) encountered when fetching projections for league {league_id}");
            format!("Error fetching projections for league {league_id} from external API")
        }
        _ => format!("Error fetching projections for league {league_id} from external API"),
    })
}

/// Relays a 200 body verbatim; anything else becomes `{"message": ...}`.
fn relay<F>(result: Result<FetchResponse, FetchError>, describe: F) -> Response
where
    F: FnOnce(StatusCode) -> String,
{
    match result {
        Ok(response) if response.is_success() => Json(response.into_json()).into_response(),
        Ok(response) => {
            let status =
                StatusCode::from_u16(response.status()).unwrap_or(StatusCode::BAD_GATEWAY);
            log::error!("upstream {} responded with {}", response.url(), status);
            message(status, describe(status))
        }
        Err(err) => {
            let status = err
                .status_code()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            log::error!("upstream fetch failed: {err}");
            message(status, describe(status))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorMessage {
    pub message: String,
}

fn message(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorMessage { message })).into_response()
}
