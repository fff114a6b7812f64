//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{State, Query}, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::domain::LearnerProfile;
use crate::error::ApiError;
use crate::openai::SpeechAudio;
use crate::profile::OnboardingForm;
use crate::protocol::*;
use crate::session::ProgressionView;
use crate::state::AppState;
use crate::logic::*;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

//
// Auth + profile
//

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_auth(State(state): State<Arc<AppState>>, Json(body): Json<AuthIn>) -> ApiResult<SessionOut> {
  Ok(Json(do_sign_in(&state, &body.email, &body.password).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_logout(State(state): State<Arc<AppState>>) -> ApiResult<SessionOut> {
  Ok(Json(do_sign_out(&state).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(State(state): State<Arc<AppState>>) -> ApiResult<SessionOut> {
  Ok(Json(current_session(&state).await?))
}

#[instrument(level = "info", skip(state, form), fields(goal = ?form.goal))]
pub async fn http_post_onboarding(
  State(state): State<Arc<AppState>>,
  Json(form): Json<OnboardingForm>,
) -> ApiResult<LearnerProfile> {
  Ok(Json(do_onboard(&state, form).await?))
}

#[instrument(level = "info", skip(state), fields(%q.email))]
pub async fn http_get_profile(State(state): State<Arc<AppState>>, Query(q): Query<EmailQuery>) -> ApiResult<LearnerProfile> {
  Ok(Json(get_profile(&state, &q.email).await?))
}

#[instrument(level = "info", skip(state, body), fields(%body.email))]
pub async fn http_put_profile(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ProfileEditIn>,
) -> ApiResult<LearnerProfile> {
  let updated = do_edit_profile(&state, &body.email, body.changes).await?;
  info!(target: "ai_mentor", id = %updated.id, "HTTP profile updated");
  Ok(Json(updated))
}

#[instrument(level = "info", skip(state, body), fields(%body.email))]
pub async fn http_post_avatar(State(state): State<Arc<AppState>>, Json(body): Json<EmailQuery>) -> ApiResult<LearnerProfile> {
  Ok(Json(do_reroll_avatar(&state, &body.email).await?))
}

//
// Roadmap + lesson flow
//

#[instrument(level = "info", skip(state), fields(%q.email))]
pub async fn http_get_roadmap(State(state): State<Arc<AppState>>, Query(q): Query<EmailQuery>) -> ApiResult<RoadmapOut> {
  Ok(Json(get_roadmap(&state, &q.email).await?))
}

#[instrument(level = "info", skip(state), fields(%q.email))]
pub async fn http_get_lesson(State(state): State<Arc<AppState>>, Query(q): Query<EmailQuery>) -> ApiResult<ProgressionView> {
  Ok(Json(get_lesson(&state, &q.email).await?))
}

#[instrument(level = "info", skip(state, body), fields(%body.email, node = %body.node_id))]
pub async fn http_post_enter(State(state): State<Arc<AppState>>, Json(body): Json<EnterIn>) -> ApiResult<ProgressionView> {
  let view = enter_node(&state, &body.email, &body.node_id).await?;
  info!(target: "progression", node = %body.node_id, phase = view.phase, "HTTP node entered");
  Ok(Json(view))
}

#[instrument(level = "info", skip(state, body), fields(%body.email))]
pub async fn http_post_retry(State(state): State<Arc<AppState>>, Json(body): Json<EmailQuery>) -> ApiResult<ProgressionView> {
  Ok(Json(retry_lesson(&state, &body.email).await?))
}

#[instrument(level = "info", skip(state, body), fields(%body.email, selection_len = body.selection.len()))]
pub async fn http_post_answer(State(state): State<Arc<AppState>>, Json(body): Json<AnswerIn>) -> ApiResult<ProgressionView> {
  let view = submit_answer(&state, &body.email, &body.selection).await?;
  let success = view.verdict.as_ref().map(|v| v.success);
  info!(target: "progression", ?success, phase = view.phase, "HTTP answer graded");
  Ok(Json(view))
}

#[instrument(level = "info", skip(state, body), fields(%body.email))]
pub async fn http_post_next(State(state): State<Arc<AppState>>, Json(body): Json<EmailQuery>) -> ApiResult<ProgressionView> {
  Ok(Json(next_task(&state, &body.email).await?))
}

#[instrument(level = "info", skip(state, body), fields(%body.email))]
pub async fn http_post_exit(State(state): State<Arc<AppState>>, Json(body): Json<EmailQuery>) -> ApiResult<ProgressionView> {
  Ok(Json(exit_lesson(&state, &body.email).await?))
}

//
// Leaderboard + speech
//

#[instrument(level = "info", skip(state), fields(%q.email))]
pub async fn http_get_leaderboard(State(state): State<Arc<AppState>>, Query(q): Query<EmailQuery>) -> ApiResult<LeaderboardOut> {
  let out = get_leaderboard(&state, &q.email).await?;
  info!(target: "ai_mentor", entries = out.entries.len(), "HTTP leaderboard served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_post_speech(State(state): State<Arc<AppState>>, Json(body): Json<SpeechIn>) -> ApiResult<SpeechAudio> {
  Ok(Json(do_speak(&state, &body.text).await?))
}
