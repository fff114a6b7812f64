//! Error taxonomy.
//!
//! External-call failures (`GenerationError`, `EvaluationError`) never escape the
//! progression controller as errors: they are turned into a `Notice` the client
//! renders. Everything else propagates to the route layer as `ApiError`.

use std::time::Duration;

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;

/// Locally detected problems with the model's structured output.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
  #[error("missing field `{0}`")]
  MissingField(&'static str),
  #[error("field `{0}` is empty")]
  EmptyField(&'static str),
  #[error("expected exactly {expected} options, found {found}")]
  OptionCount { expected: usize, found: usize },
  #[error("unsupported task type `{0}`")]
  UnsupportedTaskType(String),
  #[error("reward must not be negative (got {0})")]
  NegativeReward(i64),
  #[error("malformed JSON: {0}")]
  Malformed(String),
}

/// Failure of a raw call to the model provider, before it is attributed to
/// generation or evaluation.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
  #[error("rate limited: {0}")]
  RateLimited(String),
  #[error("HTTP {status}: {message}")]
  Status { status: u16, message: String },
  #[error("transport: {0}")]
  Transport(String),
  #[error("unreadable response: {0}")]
  Decode(String),
}

impl From<reqwest::Error> for UpstreamError {
  fn from(e: reqwest::Error) -> Self {
    UpstreamError::Transport(e.to_string())
  }
}

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
  #[error("lesson generation rate limited: {0}")]
  RateLimited(String),
  #[error("lesson generation failed: {0}")]
  Upstream(String),
  #[error("lesson payload rejected: {0}")]
  Invalid(#[from] ValidationError),
  #[error("lesson generation timed out after {0:?}")]
  Timeout(Duration),
}

impl From<UpstreamError> for GenerationError {
  fn from(e: UpstreamError) -> Self {
    match e {
      UpstreamError::RateLimited(m) => GenerationError::RateLimited(m),
      UpstreamError::Decode(m) => GenerationError::Invalid(ValidationError::Malformed(m)),
      other => GenerationError::Upstream(other.to_string()),
    }
  }
}

#[derive(Debug, Clone, Error)]
pub enum EvaluationError {
  #[error("evaluation rate limited: {0}")]
  RateLimited(String),
  #[error("evaluation failed: {0}")]
  Upstream(String),
  #[error("verdict payload rejected: {0}")]
  Invalid(#[from] ValidationError),
  #[error("evaluation timed out after {0:?}")]
  Timeout(Duration),
}

impl From<UpstreamError> for EvaluationError {
  fn from(e: UpstreamError) -> Self {
    match e {
      UpstreamError::RateLimited(m) => EvaluationError::RateLimited(m),
      UpstreamError::Decode(m) => EvaluationError::Invalid(ValidationError::Malformed(m)),
      other => EvaluationError::Upstream(other.to_string()),
    }
  }
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("no profile for `{0}`")]
  NotFound(String),
  #[error("email `{0}` already belongs to another profile")]
  EmailTaken(String),
  #[error("storage I/O: {0}")]
  Io(#[from] std::io::Error),
  #[error("storage serialization: {0}")]
  Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
  #[error("a valid email is required")]
  InvalidEmail,
  #[error("password must not be empty")]
  EmptyPassword,
  #[error("name must not be empty")]
  EmptyName,
  #[error("age {0} is out of range")]
  AgeOutOfRange(u32),
  #[error("target level must not be below the current level")]
  TargetBelowCurrent,
  #[error("a profile already exists for `{0}`")]
  AlreadyOnboarded(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControllerError {
  #[error("node `{node}` is locked ({completed} lessons completed)")]
  NodeLocked { node: String, completed: u32 },
  #[error("unknown roadmap node `{0}`")]
  UnknownNode(String),
  #[error("a request is already in flight")]
  Busy,
  #[error("`{event}` is not allowed while {phase}")]
  InvalidTransition { event: &'static str, phase: &'static str },
  #[error("a selection is required")]
  EmptySelection,
}

/// Route-facing error. Everything a handler can fail with ends up here.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Controller(#[from] ControllerError),
  #[error(transparent)]
  Profile(#[from] ProfileError),
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error(transparent)]
  Upstream(#[from] UpstreamError),
  #[error("no profile for `{0}`")]
  UnknownProfile(String),
  #[error("{0} is not available without OPENAI_API_KEY")]
  Unavailable(&'static str),
}

#[derive(Serialize)]
struct ErrorBody {
  error: &'static str,
  message: String,
  retryable: bool,
}

impl ApiError {
  /// Stable machine-readable kind, shared by HTTP bodies and WebSocket errors.
  pub fn code(&self) -> &'static str {
    self.parts().1
  }

  fn parts(&self) -> (StatusCode, &'static str, bool) {
    match self {
      ApiError::Controller(ControllerError::UnknownNode(_)) => (StatusCode::NOT_FOUND, "unknown_node", false),
      ApiError::Controller(ControllerError::EmptySelection) => (StatusCode::BAD_REQUEST, "empty_selection", false),
      ApiError::Controller(ControllerError::NodeLocked { .. }) => (StatusCode::CONFLICT, "node_locked", false),
      ApiError::Controller(ControllerError::Busy) => (StatusCode::CONFLICT, "busy", true),
      ApiError::Controller(ControllerError::InvalidTransition { .. }) => (StatusCode::CONFLICT, "invalid_transition", false),
      ApiError::Profile(ProfileError::AlreadyOnboarded(_)) => (StatusCode::CONFLICT, "already_onboarded", false),
      ApiError::Profile(_) => (StatusCode::BAD_REQUEST, "invalid_profile", false),
      ApiError::Store(StoreError::NotFound(_)) | ApiError::UnknownProfile(_) => (StatusCode::NOT_FOUND, "unknown_profile", false),
      ApiError::Store(StoreError::EmailTaken(_)) => (StatusCode::CONFLICT, "email_taken", false),
      ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage", true),
      ApiError::Upstream(UpstreamError::RateLimited(_)) => (StatusCode::TOO_MANY_REQUESTS, "rate_limited", true),
      ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream", true),
      ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", false),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, error, retryable) = self.parts();
    if status.is_server_error() {
      tracing::error!(target: "ai_mentor", %status, error = %self, "request failed");
    }
    (status, Json(ErrorBody { error, message: self.to_string(), retryable })).into_response()
  }
}
