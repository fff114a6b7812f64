//! Domain models: learner profile, lessons, verdicts, roadmap nodes and leaderboard rows.
//!
//! Field names serialize in camelCase so stored records and API payloads keep the
//! shape the browser client already reads.

use serde::{Deserialize, Serialize};

/// Tasks in one lesson cycle. Finishing the last one completes the roadmap node.
pub const TASKS_PER_LESSON: u32 = 5;

/// Coins the grader is expected to award for a correct answer.
pub const SUCCESS_REWARD: u32 = 10;

/// Proficiency tiers, ordered from lowest to highest.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Level {
  #[default]
  Beginner,
  Elementary,
  #[serde(rename = "Pre-Intermediate")]
  PreIntermediate,
  Intermediate,
  #[serde(rename = "Upper-Intermediate")]
  UpperIntermediate,
}

impl Level {
  pub fn label(self) -> &'static str {
    match self {
      Level::Beginner => "Beginner",
      Level::Elementary => "Elementary",
      Level::PreIntermediate => "Pre-Intermediate",
      Level::Intermediate => "Intermediate",
      Level::UpperIntermediate => "Upper-Intermediate",
    }
  }
}

/// Learning focus. Picks the roadmap track and frames every generated lesson.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Goal {
  Speaking,
  #[default]
  Grammar,
  Vocabulary,
  Writing,
}

impl Goal {
  pub fn label(self) -> &'static str {
    match self {
      Goal::Speaking => "Speaking",
      Goal::Grammar => "Grammar",
      Goal::Vocabulary => "Vocabulary",
      Goal::Writing => "Writing",
    }
  }
}

/// UI / explanation language of the learner.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppLanguage {
  #[default]
  Uz,
  Ru,
  En,
}

impl AppLanguage {
  pub fn tag(self) -> &'static str {
    match self {
      AppLanguage::Uz => "uz",
      AppLanguage::Ru => "ru",
      AppLanguage::En => "en",
    }
  }
}

/// Durable per-user record. One per email.
///
/// Every field has a serde default: records written before a field existed load
/// with the default instead of failing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LearnerProfile {
  pub id: String,
  pub name: String,
  pub email: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub age: Option<u32>,
  pub avatar: String,
  pub current_level: Level,
  pub target_level: Level,
  pub goal: Goal,
  pub coins: u32,
  pub language: AppLanguage,
  pub onboarded: bool,
  /// Finished lesson cycles on the roadmap. Never decremented.
  pub lessons_completed: u32,
  /// Position inside the active node's cycle, in `0..TASKS_PER_LESSON`.
  pub current_task_index: u32,
  /// Reserved; nothing reads or writes it yet.
  pub completed_nodes: Vec<String>,
}

/// Task shapes a lesson may nominally carry. Only `Mcq` is ever served.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
  #[default]
  Mcq,
  Correction,
  Writing,
  Speaking,
  Vocabulary,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExamplePair {
  pub original: String,
  pub translation: String,
}

/// The single question of a lesson. Always four options.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  pub task_type: TaskType,
  pub question: String,
  pub options: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub audio_prompt: Option<String>,
}

/// Ephemeral lesson held while a roadmap node is active.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
  pub title: String,
  pub explanation: String,
  pub examples: Vec<ExamplePair>,
  pub task: Task,
  /// Set by the controller from the node kind, never by the generator.
  pub is_exam: bool,
}

/// Graded outcome of one submitted answer. Consumed once, never persisted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
  pub success: bool,
  /// Reward as reported by the grader. Only honored when `success` is true.
  pub coins: u32,
  pub feedback: String,
  pub mistakes: Vec<String>,
  pub reason: String,
  pub motivation: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub next_task: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
  Lesson,
  Exam,
  Treasure,
}

/// Fixed checkpoint of a goal's track.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoadmapNode {
  pub id: String,
  pub title: String,
  pub icon: String,
  #[serde(rename = "type")]
  pub kind: NodeKind,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
  Locked,
  Active,
  Completed,
}

/// Leaderboard projection of a profile (or a seed learner).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
  pub id: String,
  pub name: String,
  pub coins: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub avatar: Option<String>,
  #[serde(default)]
  pub is_self: bool,
}
