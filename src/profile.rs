//! Sign-in, onboarding and profile edits.
//!
//! None of these touch coins or the progress counters; only the progression
//! controller moves those.

use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{AppLanguage, Goal, LearnerProfile, Level};
use crate::error::ProfileError;
use crate::util::normalize_email;

const AVATAR_BASE: &str = "https://api.dicebear.com/7.x/avataaars/svg?seed=";
const DEFAULT_AVATAR_SEED: &str = "Lucky";

pub fn avatar_url(seed: &str) -> String {
  format!("{}{}", AVATAR_BASE, seed)
}

/// Accepts any plausible email with a non-empty password. Returns the normalized email.
pub fn sign_in(email: &str, password: &str) -> Result<String, ProfileError> {
  let email = normalize_email(email);
  let valid = match email.split_once('@') {
    Some((user, domain)) => !user.is_empty() && !domain.is_empty() && !domain.contains('@'),
    None => false,
  };
  if !valid {
    return Err(ProfileError::InvalidEmail);
  }
  if password.is_empty() {
    return Err(ProfileError::EmptyPassword);
  }
  Ok(email)
}

fn check_age(age: Option<u32>) -> Result<(), ProfileError> {
  match age {
    Some(a) if !(5..=120).contains(&a) => Err(ProfileError::AgeOutOfRange(a)),
    _ => Ok(()),
  }
}

fn check_name(name: &str) -> Result<String, ProfileError> {
  let name = name.trim();
  if name.is_empty() {
    return Err(ProfileError::EmptyName);
  }
  Ok(name.to_string())
}

/// Answers collected by the onboarding survey.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingForm {
  pub email: String,
  pub name: String,
  #[serde(default)]
  pub age: Option<u32>,
  pub current_level: Level,
  pub target_level: Level,
  pub goal: Goal,
  #[serde(default)]
  pub language: AppLanguage,
}

impl OnboardingForm {
  /// Build a fresh profile: new id, counters zeroed.
  pub fn into_profile(self) -> Result<LearnerProfile, ProfileError> {
    let email = sign_in(&self.email, "-")?;
    let name = check_name(&self.name)?;
    check_age(self.age)?;
    if self.target_level < self.current_level {
      return Err(ProfileError::TargetBelowCurrent);
    }
    Ok(LearnerProfile {
      id: Uuid::new_v4().to_string(),
      name,
      email,
      age: self.age,
      avatar: avatar_url(DEFAULT_AVATAR_SEED),
      current_level: self.current_level,
      target_level: self.target_level,
      goal: self.goal,
      coins: 0,
      language: self.language,
      onboarded: true,
      lessons_completed: 0,
      current_task_index: 0,
      completed_nodes: Vec::new(),
    })
  }
}

/// Editable subset of the profile. Absent fields stay as they are.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileEdit {
  pub name: Option<String>,
  pub age: Option<u32>,
  pub email: Option<String>,
  pub goal: Option<Goal>,
  pub language: Option<AppLanguage>,
}

impl ProfileEdit {
  pub fn apply(self, mut profile: LearnerProfile) -> Result<LearnerProfile, ProfileError> {
    if let Some(name) = self.name {
      profile.name = check_name(&name)?;
    }
    if self.age.is_some() {
      check_age(self.age)?;
      profile.age = self.age;
    }
    if let Some(email) = self.email {
      profile.email = sign_in(&email, "-")?;
    }
    if let Some(goal) = self.goal {
      profile.goal = goal;
    }
    if let Some(language) = self.language {
      profile.language = language;
    }
    Ok(profile)
  }
}

/// Copy the learner-editable fields of `edited` onto `profile`. Coins and progress
/// counters are left untouched.
pub fn merge_editable(profile: &mut LearnerProfile, edited: &LearnerProfile) {
  profile.name = edited.name.clone();
  profile.age = edited.age;
  profile.email = edited.email.clone();
  profile.avatar = edited.avatar.clone();
  profile.goal = edited.goal;
  profile.language = edited.language;
}

/// New avatar from a random five-character seed.
pub fn reroll_avatar(mut profile: LearnerProfile) -> LearnerProfile {
  let seed: String = rand::thread_rng().sample_iter(&Alphanumeric).take(5).map(char::from).collect();
  profile.avatar = avatar_url(&seed.to_lowercase());
  profile
}
