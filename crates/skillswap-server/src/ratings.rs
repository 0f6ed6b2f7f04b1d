//! Post-call ratings.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use skillswap_shared::{SessionId, UserId};
use skillswap_store::{CallIssue, CallQuality, CallRating, NewRating, RatingSummary};

use crate::api::{participant_session, AppState, Page, PageParams};
use crate::auth::AuthUser;
use crate::error::ServerError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingBody {
    rating: u8,
    #[serde(default)]
    feedback: Option<String>,
    /// Seconds.
    #[serde(default)]
    call_duration: u64,
    #[serde(default)]
    call_quality: CallQuality,
    #[serde(default)]
    issues: Vec<CallIssue>,
}

pub async fn submit_rating(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<SessionId>,
    Json(body): Json<RatingBody>,
) -> Result<(StatusCode, Json<CallRating>), ServerError> {
    let db = state.db.lock().await;
    participant_session(&db, id, &user)?;

    let input = NewRating {
        rating: body.rating,
        feedback: body.feedback,
        call_duration_secs: body.call_duration,
        call_quality: body.call_quality,
        issues: body.issues,
    };
    let rating = db.submit_rating(id, &user, &input)?;
    info!(session = %id, user = %user, score = rating.rating, "Call rated");
    Ok((StatusCode::CREATED, Json(rating)))
}

pub async fn user_ratings(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(user): Path<UserId>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<CallRating>>, ServerError> {
    let db = state.db.lock().await;
    let (ratings, total) = db.ratings_for_user(&user, params.limit(), params.offset())?;
    Ok(Json(Page::new(ratings, total, &params)))
}

pub async fn user_average(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(user): Path<UserId>,
) -> Result<Json<RatingSummary>, ServerError> {
    let db = state.db.lock().await;
    Ok(Json(db.rating_summary(&user)?))
}
