//! Minimal OpenAI-compatible client for lessons, grading and speech.
//!
//! Lessons and verdicts come back as a strict JSON object which is validated by
//! `schema` before anything else sees it. Calls are instrumented and log model
//! names, latencies and response sizes (not contents).
//!
//! NOTE: We never log the API key or the learner's selection.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::{LearnerProfile, Lesson, Verdict, TASKS_PER_LESSON};
use crate::error::{EvaluationError, GenerationError, UpstreamError};
use crate::schema::{LessonPayload, VerdictPayload};
use crate::tutor::{ContentGenerator, Grader};
use crate::util::{fill_template, trunc_for_log};

const CLIENT_UA: &str = "ai-mentor-backend/0.1";

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
  pub tts_model: String,
  pub tts_voice: String,
  pub prompts: Prompts,
}

/// Synthesized audio ready for the browser.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpeechAudio {
  pub audio_base64: String,
  pub mime: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(prompts: Prompts) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model =
      std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model =
      std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());
    let tts_model =
      std::env::var("OPENAI_TTS_MODEL").unwrap_or_else(|_| "gpt-4o-mini-tts".into());
    let tts_voice = std::env::var("OPENAI_TTS_VOICE").unwrap_or_else(|_| "alloy".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self {
      client,
      api_key,
      base_url: base_url.trim_end_matches('/').to_string(),
      fast_model,
      strong_model,
      tts_model,
      tts_voice,
      prompts,
    })
  }

  fn post(&self, path: &str) -> reqwest::RequestBuilder {
    self.client.post(format!("{}{}", self.base_url, path))
      .header(USER_AGENT, CLIENT_UA)
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
  }

  /// JSON-object chat completion. Returns the raw message text for schema validation.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_json(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<String, UpstreamError> {
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
    };

    let res = self.post("/chat/completions").json(&req).send().await?;
    let res = check_status(res).await?;

    let body: ChatCompletionResponse = res.json().await.map_err(|e| UpstreamError::Decode(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(target: "tutor", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();
    Ok(text)
  }

  fn profile_pairs<'a>(profile: &'a LearnerProfile, task_number: &'a str, total: &'a str, exam: &'a str) -> [(&'static str, &'a str); 7] {
    [
      ("level", profile.current_level.label()),
      ("target_level", profile.target_level.label()),
      ("goal", profile.goal.label()),
      ("language", profile.language.tag()),
      ("task_number", task_number),
      ("tasks_per_lesson", total),
      ("exam", exam),
    ]
  }

  /// Read `text` aloud. Empty text yields an empty payload without a call.
  #[instrument(level = "info", skip(self, text), fields(text_len = text.len(), model = %self.tts_model))]
  pub async fn speak(&self, text: &str) -> Result<SpeechAudio, UpstreamError> {
    let input = text.trim();
    if input.is_empty() {
      return Ok(SpeechAudio { audio_base64: String::new(), mime: "audio/mpeg".into() });
    }
    let req = SpeechRequest {
      model: self.tts_model.clone(),
      voice: self.tts_voice.clone(),
      input: input.to_string(),
      instructions: self.prompts.speech_instructions.clone(),
      response_format: "mp3".into(),
    };
    let start = Instant::now();
    let res = self.post("/audio/speech").json(&req).send().await?;
    let res = check_status(res).await?;
    let bytes = res.bytes().await?;
    info!(target: "tutor", elapsed = ?start.elapsed(), bytes = bytes.len(), "Speech synthesized");
    Ok(SpeechAudio { audio_base64: BASE64.encode(&bytes), mime: "audio/mpeg".into() })
  }
}

#[async_trait]
impl ContentGenerator for OpenAI {
  #[instrument(
    level = "info",
    skip(self, profile),
    fields(goal = ?profile.goal, level = ?profile.current_level, task = profile.current_task_index, model = %self.strong_model)
  )]
  async fn generate_lesson(&self, profile: &LearnerProfile, is_exam: bool) -> Result<Lesson, GenerationError> {
    let task_number = profile.current_task_index.saturating_add(1).to_string();
    let total = TASKS_PER_LESSON.to_string();
    let exam = is_exam.to_string();
    let pairs = Self::profile_pairs(profile, &task_number, &total, &exam);
    let system = fill_template(&self.prompts.lesson_system, &pairs);
    let user = fill_template(&self.prompts.lesson_user_template, &pairs);

    let start = Instant::now();
    let result = self.chat_json(&self.strong_model, &system, &user, 0.9).await;
    let elapsed = start.elapsed();
    let text = match result {
      Ok(t) => {
        info!(target: "tutor", ?elapsed, bytes = t.len(), "Lesson response received");
        t
      }
      Err(e) => {
        error!(target: "tutor", ?elapsed, error = %e, "Model call failed during lesson generation");
        return Err(e.into());
      }
    };

    let lesson = LessonPayload::parse(&text).and_then(LessonPayload::into_lesson).map_err(|e| {
      error!(target: "tutor", error = %e, payload = %trunc_for_log(&text, 200), "Lesson payload rejected");
      e
    })?;
    info!(target: "tutor", title = %lesson.title, "Lesson generated");
    Ok(lesson)
  }
}

#[async_trait]
impl Grader for OpenAI {
  #[instrument(level = "info", skip(self, profile, question, selection), fields(question_len = question.len(), model = %self.fast_model))]
  async fn evaluate_task(
    &self,
    profile: &LearnerProfile,
    question: &str,
    selection: &str,
  ) -> Result<Verdict, EvaluationError> {
    let task_number = profile.current_task_index.saturating_add(1).to_string();
    let total = TASKS_PER_LESSON.to_string();
    let pairs = Self::profile_pairs(profile, &task_number, &total, "false");
    let mut pairs = pairs.to_vec();
    pairs.push(("question", question));
    pairs.push(("selection", selection));
    let system = fill_template(&self.prompts.evaluation_system, &pairs);
    let user = fill_template(&self.prompts.evaluation_user_template, &pairs);

    let start = Instant::now();
    let text = self.chat_json(&self.fast_model, &system, &user, 0.2).await.map_err(|e| {
      error!(target: "tutor", elapsed = ?start.elapsed(), error = %e, "Model call failed during evaluation");
      EvaluationError::from(e)
    })?;
    let verdict = VerdictPayload::parse(&text).and_then(VerdictPayload::into_verdict).map_err(|e| {
      error!(target: "tutor", error = %e, payload = %trunc_for_log(&text, 200), "Verdict payload rejected");
      e
    })?;
    info!(target: "tutor", success = verdict.success, coins = verdict.coins, elapsed = ?start.elapsed(), "Answer evaluated");
    Ok(verdict)
  }
}

/// Map non-2xx responses to `UpstreamError`, keeping 429 distinct.
async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
  let status = res.status();
  if status.is_success() {
    return Ok(res);
  }
  let body = res.text().await.unwrap_or_default();
  let msg = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
  Err(status_error(status, msg))
}

fn status_error(status: StatusCode, message: String) -> UpstreamError {
  if status == StatusCode::TOO_MANY_REQUESTS {
    UpstreamError::RateLimited(message)
  } else {
    UpstreamError::Status { status: status.as_u16(), message }
  }
}

// --- Wire DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Serialize)]
struct SpeechRequest {
  model: String,
  voice: String,
  input: String,
  instructions: String,
  response_format: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn too_many_requests_is_rate_limited() {
    assert!(matches!(
      status_error(StatusCode::TOO_MANY_REQUESTS, "slow down".into()),
      UpstreamError::RateLimited(m) if m == "slow down"
    ));
    assert!(matches!(
      status_error(StatusCode::BAD_GATEWAY, "oops".into()),
      UpstreamError::Status { status: 502, .. }
    ));
  }

  #[test]
  fn extracts_provider_error_message() {
    let body = r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Rate limit reached"));
    assert_eq!(extract_openai_error("<html>"), None);
  }

  #[test]
  fn lesson_prompt_is_filled_from_the_profile() {
    let profile = LearnerProfile {
      goal: crate::domain::Goal::Writing,
      current_task_index: 2,
      ..Default::default()
    };
    let pairs = OpenAI::profile_pairs(&profile, "3", "5", "true");
    let user = fill_template(&Prompts::default().lesson_user_template, &pairs);
    assert!(user.contains("Focus: Writing"));
    assert!(user.contains("task 3 of 5"));
    assert!(user.contains("Exam mode: true"));
    assert!(!user.contains("{level}"));
  }
}
