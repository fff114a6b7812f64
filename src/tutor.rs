//! Content generation and grading seams, plus the offline tutor used when no
//! model provider is configured.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::{debug, instrument};

use crate::domain::{ExamplePair, LearnerProfile, Lesson, Task, TaskType, Verdict, SUCCESS_REWARD};
use crate::error::{EvaluationError, GenerationError};
use crate::seeds::{bank_for_goal, find_by_question};

/// Produces one lesson (explanation, examples, a four-option task) for a learner.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
  async fn generate_lesson(&self, profile: &LearnerProfile, is_exam: bool) -> Result<Lesson, GenerationError>;
}

/// Sole arbiter of correctness for a submitted option.
#[async_trait]
pub trait Grader: Send + Sync {
  async fn evaluate_task(
    &self,
    profile: &LearnerProfile,
    question: &str,
    selection: &str,
  ) -> Result<Verdict, EvaluationError>;
}

/// Serves the built-in bank and grades against its known answers.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineTutor;

#[async_trait]
impl ContentGenerator for OfflineTutor {
  #[instrument(level = "debug", skip(self, profile), fields(goal = ?profile.goal, task = profile.current_task_index))]
  async fn generate_lesson(&self, profile: &LearnerProfile, is_exam: bool) -> Result<Lesson, GenerationError> {
    let items = bank_for_goal(profile.goal);
    let item = items
      .choose(&mut rand::thread_rng())
      .ok_or_else(|| GenerationError::Upstream(format!("no offline items for {}", profile.goal.label())))?;
    debug!(target: "tutor", title = item.title, "Serving offline lesson");

    let mut options: Vec<String> = item.options.iter().map(|o| o.to_string()).collect();
    options.shuffle(&mut rand::thread_rng());

    Ok(Lesson {
      title: if is_exam { format!("Exam: {}", item.title) } else { item.title.to_string() },
      explanation: item.explanation.to_string(),
      examples: item
        .examples
        .iter()
        .map(|(o, t)| ExamplePair { original: o.to_string(), translation: t.to_string() })
        .collect(),
      task: Task { task_type: TaskType::Mcq, question: item.question.to_string(), options, audio_prompt: None },
      is_exam: false,
    })
  }
}

#[async_trait]
impl Grader for OfflineTutor {
  #[instrument(level = "debug", skip(self, _profile, selection), fields(question_len = question.len()))]
  async fn evaluate_task(
    &self,
    _profile: &LearnerProfile,
    question: &str,
    selection: &str,
  ) -> Result<Verdict, EvaluationError> {
    let item = find_by_question(question)
      .ok_or_else(|| EvaluationError::Upstream("question is not part of the offline bank".into()))?;
    let success = item.correct_option().eq_ignore_ascii_case(selection.trim());

    Ok(if success {
      Verdict {
        success,
        coins: SUCCESS_REWARD,
        feedback: "Correct, well done!".into(),
        mistakes: vec![],
        reason: item.why.into(),
        motivation: "Keep the streak going!".into(),
        next_task: None,
      }
    } else {
      Verdict {
        success,
        coins: 0,
        feedback: format!("Not quite. The answer is \"{}\".", item.correct_option()),
        mistakes: vec![format!("You chose \"{}\".", selection.trim())],
        reason: item.why.into(),
        motivation: "Mistakes are how we learn. Try a fresh one!".into(),
        next_task: None,
      }
    })
  }
}
