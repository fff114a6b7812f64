//! Configuration: process settings from the environment, prompts and leaderboard
//! seed learners from an optional TOML file.
//!
//! See `AgentConfig` and `Prompts` for the TOML schema.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::LeaderboardEntry;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  /// Replaces the built-in seed learners when non-empty.
  #[serde(default)]
  pub leaderboard_seed: Vec<SeedLearner>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SeedLearner {
  pub id: String,
  pub name: String,
  pub coins: u32,
  #[serde(default)] pub avatar: Option<String>,
}

impl SeedLearner {
  pub fn to_entry(&self) -> LeaderboardEntry {
    LeaderboardEntry {
      id: self.id.clone(),
      name: self.name.clone(),
      coins: self.coins,
      avatar: self.avatar.clone(),
      is_self: false,
    }
  }
}

/// Prompts used by the model client.
///
/// Placeholders: `{level}`, `{target_level}`, `{goal}`, `{language}`, `{task_number}`,
/// `{tasks_per_lesson}`, `{exam}` for lessons; additionally `{question}` and
/// `{selection}` for evaluation.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub lesson_system: String,
  pub lesson_user_template: String,
  pub evaluation_system: String,
  pub evaluation_user_template: String,
  pub speech_instructions: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      lesson_system: "You are a friendly English tutor for learners whose interface language is '{language}'. Respond ONLY with strict JSON.".into(),
      lesson_user_template: concat!(
        "Learner level: {level} (aiming for {target_level}). Focus: {goal}. Explanation language: {language}.\n",
        "This is task {task_number} of {tasks_per_lesson} in the current lesson. Exam mode: {exam} (if true, make the question noticeably harder).\n",
        "Rules:\n",
        "1. Explain the topic warmly and briefly in the explanation language.\n",
        "2. The task MUST be single-select multiple choice (taskType \"mcq\").\n",
        "3. Give EXACTLY 4 answer options, exactly one of them correct.\n",
        "Return JSON: {\"title\": string, \"explanation\": string, \"examples\": [{\"original\": string, \"translation\": string}], ",
        "\"task\": {\"taskType\": \"mcq\", \"question\": string, \"options\": [string, string, string, string], \"audioPrompt\": string (optional)}}"
      ).into(),
      evaluation_system: "You grade English multiple-choice answers. Be kind but precise. Output JSON only.".into(),
      evaluation_user_template: concat!(
        "Learner level: {level}. Focus: {goal}. Feedback language: {language}.\n",
        "Question: \"{question}\"\nLearner's choice: \"{selection}\"\n",
        "If the choice is correct award 10 coins, otherwise 2. Explain the reason for any mistake in depth.\n",
        "Return JSON: {\"success\": boolean, \"coins\": integer, \"feedback\": string, \"mistakes\": [string], ",
        "\"reason\": string, \"motivation\": string, \"next_task\": string}"
      ).into(),
      speech_instructions: "Say clearly, at a learner-friendly pace.".into(),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "ai_mentor", %path, seed_learners = cfg.leaderboard_seed.len(), "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "ai_mentor", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "ai_mentor", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// Process-level settings read from the environment.
#[derive(Clone, Debug)]
pub struct ServerSettings {
  pub addr: SocketAddr,
  /// JSON file backing the profile store. In-memory only when absent.
  pub data_path: Option<PathBuf>,
  /// Upper bound for one generate/evaluate call.
  pub call_timeout: Duration,
}

impl Default for ServerSettings {
  fn default() -> Self {
    Self {
      addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
      data_path: None,
      call_timeout: Duration::from_secs(30),
    }
  }
}

impl ServerSettings {
  pub fn from_env() -> Self {
    let defaults = Self::default();
    let addr = std::env::var("PORT")
      .ok()
      .and_then(|p| p.parse::<u16>().ok())
      .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
      .unwrap_or(defaults.addr);
    let data_path = std::env::var("MENTOR_DATA_PATH").ok().filter(|p| !p.trim().is_empty()).map(PathBuf::from);
    let call_timeout = std::env::var("MENTOR_CALL_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .filter(|secs| *secs > 0)
      .map(Duration::from_secs)
      .unwrap_or(defaults.call_timeout);
    Self { addr, data_path, call_timeout }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn toml_overrides_single_prompt_and_keeps_the_rest() {
    let raw = r#"
      [prompts]
      lesson_system = "custom"

      [[leaderboard_seed]]
      id = "s1"
      name = "Kamola"
      coins = 300
    "#;
    let cfg: AgentConfig = toml::from_str(raw).unwrap();
    assert_eq!(cfg.prompts.lesson_system, "custom");
    assert_eq!(cfg.prompts.evaluation_system, Prompts::default().evaluation_system);
    assert_eq!(cfg.leaderboard_seed.len(), 1);
    let entry = cfg.leaderboard_seed[0].to_entry();
    assert_eq!(entry.coins, 300);
    assert!(!entry.is_self);
  }

  #[test]
  fn default_prompts_carry_the_placeholders_the_client_fills() {
    let p = Prompts::default();
    for key in ["{level}", "{goal}", "{language}", "{task_number}", "{exam}"] {
      assert!(p.lesson_user_template.contains(key), "{key} missing");
    }
    assert!(p.evaluation_user_template.contains("{question}"));
    assert!(p.evaluation_user_template.contains("{selection}"));
  }
}
