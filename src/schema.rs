//! Untrusted model payloads and their validation into domain types.
//!
//! The model is asked for a JSON shape but nothing guarantees it. Every field is
//! optional here; `into_lesson` / `into_verdict` decide what is acceptable.

use serde::Deserialize;
use tracing::debug;

use crate::domain::{ExamplePair, Lesson, Task, TaskType, Verdict};
use crate::error::ValidationError;

pub const OPTIONS_PER_TASK: usize = 4;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LessonPayload {
  pub title: Option<String>,
  pub explanation: Option<String>,
  pub examples: Option<Vec<ExamplePayload>>,
  pub task: Option<TaskPayload>,
  /// Ignored: the node kind decides.
  pub is_exam: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExamplePayload {
  pub original: Option<String>,
  pub translation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskPayload {
  #[serde(alias = "task_type")]
  pub task_type: Option<String>,
  pub question: Option<String>,
  pub options: Option<Vec<String>>,
  #[serde(alias = "audio_prompt")]
  pub audio_prompt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerdictPayload {
  pub success: Option<bool>,
  pub coins: Option<i64>,
  pub feedback: Option<String>,
  pub mistakes: Option<Vec<String>>,
  pub reason: Option<String>,
  pub motivation: Option<String>,
  #[serde(alias = "nextTask")]
  pub next_task: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
  let v = value.ok_or(ValidationError::MissingField(field))?;
  let v = v.trim().to_string();
  if v.is_empty() {
    return Err(ValidationError::EmptyField(field));
  }
  Ok(v)
}

fn optional_text(value: Option<String>) -> Option<String> {
  value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_task_type(raw: Option<String>) -> Result<TaskType, ValidationError> {
  let Some(raw) = optional_text(raw) else { return Ok(TaskType::Mcq) };
  match raw.to_lowercase().as_str() {
    "mcq" | "multiple_choice" | "multiple-choice" => Ok(TaskType::Mcq),
    _ => Err(ValidationError::UnsupportedTaskType(raw)),
  }
}

impl LessonPayload {
  pub fn parse(text: &str) -> Result<Self, ValidationError> {
    serde_json::from_str(text).map_err(|e| ValidationError::Malformed(e.to_string()))
  }

  /// Validate into a `Lesson`. `is_exam` starts false; the controller sets it.
  pub fn into_lesson(self) -> Result<Lesson, ValidationError> {
    let title = required(self.title, "title")?;
    let explanation = required(self.explanation, "explanation")?;

    let mut examples = Vec::new();
    for ex in self.examples.unwrap_or_default() {
      examples.push(ExamplePair {
        original: required(ex.original, "examples.original")?,
        translation: required(ex.translation, "examples.translation")?,
      });
    }

    let task = self.task.ok_or(ValidationError::MissingField("task"))?;
    let task_type = parse_task_type(task.task_type)?;
    let question = required(task.question, "task.question")?;
    let options: Vec<String> = task
      .options
      .ok_or(ValidationError::MissingField("task.options"))?
      .into_iter()
      .map(|o| o.trim().to_string())
      .collect();
    if options.len() != OPTIONS_PER_TASK {
      return Err(ValidationError::OptionCount { expected: OPTIONS_PER_TASK, found: options.len() });
    }
    if options.iter().any(|o| o.is_empty()) {
      return Err(ValidationError::EmptyField("task.options"));
    }

    Ok(Lesson {
      title,
      explanation,
      examples,
      task: Task { task_type, question, options, audio_prompt: optional_text(task.audio_prompt) },
      is_exam: false,
    })
  }
}

impl VerdictPayload {
  pub fn parse(text: &str) -> Result<Self, ValidationError> {
    serde_json::from_str(text).map_err(|e| ValidationError::Malformed(e.to_string()))
  }

  pub fn into_verdict(self) -> Result<Verdict, ValidationError> {
    let success = self.success.ok_or(ValidationError::MissingField("success"))?;
    let feedback = required(self.feedback, "feedback")?;
    let coins = match self.coins.unwrap_or(0) {
      c if c < 0 => return Err(ValidationError::NegativeReward(c)),
      c => u32::try_from(c).unwrap_or(u32::MAX),
    };
    let mut mistakes: Vec<String> = self
      .mistakes
      .unwrap_or_default()
      .into_iter()
      .map(|m| m.trim().to_string())
      .filter(|m| !m.is_empty())
      .collect();
    if success && !mistakes.is_empty() {
      debug!(target: "tutor", dropped = mistakes.len(), "Clearing mistakes on a successful verdict");
      mistakes.clear();
    }

    Ok(Verdict {
      success,
      coins,
      feedback,
      mistakes,
      reason: self.reason.map(|s| s.trim().to_string()).unwrap_or_default(),
      motivation: self.motivation.map(|s| s.trim().to_string()).unwrap_or_default(),
      next_task: optional_text(self.next_task),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const GOOD_LESSON: &str = r#"{
    "title": "Present Simple",
    "explanation": "We use it for habits.",
    "isExam": true,
    "examples": [{"original": "I read every day.", "translation": "Men har kuni o'qiyman."}],
    "task": {"taskType": "mcq", "question": "She ___ tea.", "options": ["drink", "drinks", "drinking", "drank "]}
  }"#;

  #[test]
  fn accepts_a_well_formed_lesson_and_ignores_generator_exam_flag() {
    let lesson = LessonPayload::parse(GOOD_LESSON).unwrap().into_lesson().unwrap();
    assert_eq!(lesson.title, "Present Simple");
    assert_eq!(lesson.task.options.len(), 4);
    assert_eq!(lesson.task.options[3], "drank");
    assert_eq!(lesson.task.task_type, TaskType::Mcq);
    assert!(!lesson.is_exam);
    assert!(lesson.task.audio_prompt.is_none());
  }

  #[test]
  fn rejects_wrong_option_count() {
    let raw = r#"{"title":"t","explanation":"e","task":{"question":"q","options":["a","b","c"]}}"#;
    let err = LessonPayload::parse(raw).unwrap().into_lesson().unwrap_err();
    assert_eq!(err, ValidationError::OptionCount { expected: 4, found: 3 });
  }

  #[test]
  fn rejects_missing_task_and_blank_question() {
    let raw = r#"{"title":"t","explanation":"e"}"#;
    assert_eq!(
      LessonPayload::parse(raw).unwrap().into_lesson().unwrap_err(),
      ValidationError::MissingField("task")
    );
    let raw = r#"{"title":"t","explanation":"e","task":{"question":"  ","options":["a","b","c","d"]}}"#;
    assert_eq!(
      LessonPayload::parse(raw).unwrap().into_lesson().unwrap_err(),
      ValidationError::EmptyField("task.question")
    );
  }

  #[test]
  fn rejects_reserved_task_types() {
    let raw = r#"{"title":"t","explanation":"e","task":{"taskType":"writing","question":"q","options":["a","b","c","d"]}}"#;
    assert!(matches!(
      LessonPayload::parse(raw).unwrap().into_lesson(),
      Err(ValidationError::UnsupportedTaskType(t)) if t == "writing"
    ));
  }

  #[test]
  fn non_json_is_malformed() {
    assert!(matches!(LessonPayload::parse("not json"), Err(ValidationError::Malformed(_))));
  }

  #[test]
  fn verdict_requires_success_flag_and_feedback() {
    let err = VerdictPayload::parse(r#"{"feedback":"ok"}"#).unwrap().into_verdict().unwrap_err();
    assert_eq!(err, ValidationError::MissingField("success"));
    let err = VerdictPayload::parse(r#"{"success":true}"#).unwrap().into_verdict().unwrap_err();
    assert_eq!(err, ValidationError::MissingField("feedback"));
  }

  #[test]
  fn verdict_rejects_negative_reward_and_clears_mistakes_on_success() {
    let err = VerdictPayload::parse(r#"{"success":false,"coins":-5,"feedback":"no"}"#)
      .unwrap()
      .into_verdict()
      .unwrap_err();
    assert_eq!(err, ValidationError::NegativeReward(-5));

    let v = VerdictPayload::parse(r#"{"success":true,"coins":10,"feedback":"yes","mistakes":["x"],"next_task":"go on"}"#)
      .unwrap()
      .into_verdict()
      .unwrap();
    assert!(v.mistakes.is_empty());
    assert_eq!(v.coins, 10);
    assert_eq!(v.next_task.as_deref(), Some("go on"));
  }
}
