//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! Handlers stay thin: they parse input, call into here, and serialize the result.

use tracing::{info, instrument};

use crate::domain::LearnerProfile;
use crate::error::{ApiError, ProfileError};
use crate::leaderboard::rank;
use crate::openai::SpeechAudio;
use crate::profile::{reroll_avatar, sign_in, OnboardingForm, ProfileEdit};
use crate::protocol::{LeaderboardOut, RoadmapOut, SessionOut};
use crate::roadmap::roadmap;
use crate::session::ProgressionView;
use crate::state::AppState;
use crate::util::normalize_email;

#[instrument(level = "info", skip(state, password), fields(email = %normalize_email(email)))]
pub async fn do_sign_in(state: &AppState, email: &str, password: &str) -> Result<SessionOut, ApiError> {
  let email = sign_in(email, password)?;
  state.store.set_session(&email).await?;
  let profile = state.store.get(&email).await?;
  info!(target: "ai_mentor", onboarded = profile.is_some(), "Signed in");
  Ok(SessionOut { email: Some(email), profile })
}

pub async fn do_sign_out(state: &AppState) -> Result<SessionOut, ApiError> {
  if let Some(email) = state.store.session_email().await? {
    state.drop_session(&email).await;
    info!(target: "ai_mentor", %email, "Signed out");
  }
  state.store.clear_session().await?;
  Ok(SessionOut { email: None, profile: None })
}

pub async fn current_session(state: &AppState) -> Result<SessionOut, ApiError> {
  let email = state.store.session_email().await?;
  let profile = match &email {
    Some(e) => state.store.get(e).await?,
    None => None,
  };
  Ok(SessionOut { email, profile })
}

#[instrument(level = "info", skip(state, form), fields(goal = ?form.goal))]
pub async fn do_onboard(state: &AppState, form: OnboardingForm) -> Result<LearnerProfile, ApiError> {
  let profile = form.into_profile()?;
  if !state.store.insert_new(&profile).await? {
    return Err(ProfileError::AlreadyOnboarded(profile.email).into());
  }
  state.store.set_session(&profile.email).await?;
  info!(target: "ai_mentor", id = %profile.id, "Learner onboarded");
  Ok(profile)
}

/// Apply an edit through the learner's session, so it is serialized with lesson
/// progress, and follow an email change with the session map.
#[instrument(level = "info", skip(state, edit))]
pub async fn do_edit_profile(state: &AppState, email: &str, edit: ProfileEdit) -> Result<LearnerProfile, ApiError> {
  let session = state.session(email).await?;
  let (old_email, updated) = session.edit_profile(|p| edit.apply(p)).await?;
  if updated.email != old_email {
    state.move_session(&old_email, &updated.email).await;
  }
  Ok(updated)
}

pub async fn do_reroll_avatar(state: &AppState, email: &str) -> Result<LearnerProfile, ApiError> {
  let (_, updated) = state.session(email).await?.edit_profile(|p| Ok(reroll_avatar(p))).await?;
  Ok(updated)
}

pub async fn get_profile(state: &AppState, email: &str) -> Result<LearnerProfile, ApiError> {
  match state.live_session(email).await {
    Some(s) => Ok(s.view().await.profile),
    None => state.require_profile(email).await,
  }
}

pub async fn get_roadmap(state: &AppState, email: &str) -> Result<RoadmapOut, ApiError> {
  let profile = get_profile(state, email).await?;
  Ok(RoadmapOut {
    goal: profile.goal.label().to_string(),
    lessons_completed: profile.lessons_completed,
    nodes: roadmap(profile.goal, profile.lessons_completed),
  })
}

pub async fn get_lesson(state: &AppState, email: &str) -> Result<ProgressionView, ApiError> {
  Ok(state.session(email).await?.view().await)
}

pub async fn enter_node(state: &AppState, email: &str, node_id: &str) -> Result<ProgressionView, ApiError> {
  state.session(email).await?.enter(node_id).await
}

pub async fn retry_lesson(state: &AppState, email: &str) -> Result<ProgressionView, ApiError> {
  state.session(email).await?.retry().await
}

pub async fn submit_answer(state: &AppState, email: &str, selection: &str) -> Result<ProgressionView, ApiError> {
  state.session(email).await?.submit(selection).await
}

pub async fn next_task(state: &AppState, email: &str) -> Result<ProgressionView, ApiError> {
  state.session(email).await?.acknowledge().await
}

pub async fn exit_lesson(state: &AppState, email: &str) -> Result<ProgressionView, ApiError> {
  Ok(state.session(email).await?.exit().await)
}

pub async fn get_leaderboard(state: &AppState, email: &str) -> Result<LeaderboardOut, ApiError> {
  let current = get_profile(state, email).await?;
  let stored = state.store.all().await?;
  Ok(LeaderboardOut { entries: rank(&current, &stored, &state.seed_learners) })
}

#[instrument(level = "info", skip(state, text), fields(text_len = text.len()))]
pub async fn do_speak(state: &AppState, text: &str) -> Result<SpeechAudio, ApiError> {
  let oa = state.openai.as_ref().ok_or(ApiError::Unavailable("speech"))?;
  Ok(oa.speak(text).await?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{AppLanguage, Goal, Level, NodeStatus};
  use crate::error::StoreError;
  use crate::seeds::find_by_question;
  use crate::store::{LocalStore, ProfileStore};
  use crate::tutor::OfflineTutor;
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicBool, Ordering};
  use std::sync::Arc;
  use std::time::Duration;
  use tokio::sync::Notify;

  /// In-memory store whose next `put` parks until released once armed.
  #[derive(Default)]
  struct GatedStore {
    inner: LocalStore,
    armed: AtomicBool,
    parked: Notify,
    release: Notify,
  }

  #[async_trait]
  impl ProfileStore for GatedStore {
    async fn get(&self, email: &str) -> Result<Option<LearnerProfile>, StoreError> {
      self.inner.get(email).await
    }
    async fn put(&self, profile: &LearnerProfile) -> Result<(), StoreError> {
      if self.armed.swap(false, Ordering::SeqCst) {
        self.parked.notify_one();
        self.release.notified().await;
      }
      self.inner.put(profile).await
    }
    async fn insert_new(&self, profile: &LearnerProfile) -> Result<bool, StoreError> {
      self.inner.insert_new(profile).await
    }
    async fn rekey(&self, old_email: &str, profile: &LearnerProfile) -> Result<(), StoreError> {
      self.inner.rekey(old_email, profile).await
    }
    async fn all(&self) -> Result<Vec<LearnerProfile>, StoreError> {
      self.inner.all().await
    }
    async fn session_email(&self) -> Result<Option<String>, StoreError> {
      self.inner.session_email().await
    }
    async fn set_session(&self, email: &str) -> Result<(), StoreError> {
      self.inner.set_session(email).await
    }
    async fn clear_session(&self) -> Result<(), StoreError> {
      self.inner.clear_session().await
    }
  }

  fn form(email: &str) -> OnboardingForm {
    OnboardingForm {
      email: email.into(),
      name: "Laylo".into(),
      age: None,
      current_level: Level::Beginner,
      target_level: Level::Elementary,
      goal: Goal::Grammar,
      language: AppLanguage::En,
    }
  }

  #[tokio::test]
  async fn sign_in_then_onboard_then_session_lookup() {
    let state = AppState::offline();
    let s = do_sign_in(&state, "Laylo@x.io", "pw").await.unwrap();
    assert_eq!(s.email.as_deref(), Some("laylo@x.io"));
    assert!(s.profile.is_none());

    let p = do_onboard(&state, form("laylo@x.io")).await.unwrap();
    let s = current_session(&state).await.unwrap();
    assert_eq!(s.profile.unwrap().id, p.id);

    let err = do_onboard(&state, form("laylo@x.io")).await.unwrap_err();
    assert!(matches!(err, ApiError::Profile(ProfileError::AlreadyOnboarded(_))));

    do_sign_out(&state).await.unwrap();
    assert!(current_session(&state).await.unwrap().email.is_none());
  }

  #[tokio::test]
  async fn full_lesson_cycle_with_the_offline_tutor() {
    let state = AppState::offline();
    do_onboard(&state, form("l@x.io")).await.unwrap();

    let mut view = enter_node(&state, "l@x.io", "g1").await.unwrap();
    for _ in 0..crate::domain::TASKS_PER_LESSON {
      let lesson = view.lesson.clone().expect("lesson ready");
      let correct = find_by_question(&lesson.task.question).unwrap().correct_option();
      let graded = submit_answer(&state, "l@x.io", correct).await.unwrap();
      assert!(graded.verdict.as_ref().unwrap().success);
      view = next_task(&state, "l@x.io").await.unwrap();
    }
    assert_eq!(view.phase, "idle");

    let stored = state.store.get("l@x.io").await.unwrap().unwrap();
    assert_eq!((stored.lessons_completed, stored.current_task_index, stored.coins), (1, 0, 50));

    let map = get_roadmap(&state, "l@x.io").await.unwrap();
    assert_eq!(map.nodes[0].status, NodeStatus::Completed);
    assert_eq!(map.nodes[1].status, NodeStatus::Active);

    let board = get_leaderboard(&state, "l@x.io").await.unwrap();
    let me = board.entries.iter().find(|e| e.is_self).unwrap();
    assert_eq!(me.coins, 50);
  }

  #[tokio::test]
  async fn goal_edit_exits_the_lesson_and_keeps_progress() {
    let state = AppState::offline();
    do_onboard(&state, form("l@x.io")).await.unwrap();
    let v = enter_node(&state, "l@x.io", "g1").await.unwrap();
    assert_eq!(v.phase, "lesson_ready");

    let edit = ProfileEdit { goal: Some(Goal::Vocabulary), ..Default::default() };
    let p = do_edit_profile(&state, "l@x.io", edit).await.unwrap();
    assert_eq!(p.goal, Goal::Vocabulary);
    assert_eq!(get_lesson(&state, "l@x.io").await.unwrap().phase, "idle");
    assert_eq!(get_roadmap(&state, "l@x.io").await.unwrap().nodes[0].node.id, "v1");
  }

  #[tokio::test]
  async fn email_change_moves_the_record_and_the_live_session() {
    let state = AppState::offline();
    do_onboard(&state, form("old@x.io")).await.unwrap();
    enter_node(&state, "old@x.io", "g1").await.unwrap();

    let edit = ProfileEdit { email: Some("new@x.io".into()), ..Default::default() };
    do_edit_profile(&state, "old@x.io", edit).await.unwrap();
    assert!(state.store.get("old@x.io").await.unwrap().is_none());
    assert_eq!(get_lesson(&state, "new@x.io").await.unwrap().phase, "lesson_ready");
    assert!(matches!(get_lesson(&state, "old@x.io").await, Err(ApiError::UnknownProfile(_))));
  }

  #[tokio::test]
  async fn edit_racing_an_acknowledgement_keeps_the_new_progress() {
    let store = Arc::new(GatedStore::default());
    let state = AppState::new(
      store.clone(),
      Arc::new(OfflineTutor),
      Arc::new(OfflineTutor),
      None,
      vec![],
      Duration::from_secs(5),
    );
    do_onboard(&state, form("r@x.io")).await.unwrap();
    let view = enter_node(&state, "r@x.io", "g1").await.unwrap();
    let correct = find_by_question(&view.lesson.unwrap().task.question).unwrap().correct_option();
    submit_answer(&state, "r@x.io", correct).await.unwrap();

    store.armed.store(true, Ordering::SeqCst);
    let edit = {
      let state = state.clone();
      tokio::spawn(async move {
        let edit = ProfileEdit { name: Some("Renamed".into()), ..Default::default() };
        do_edit_profile(&state, "r@x.io", edit).await
      })
    };
    store.parked.notified().await;
    let ack = {
      let state = state.clone();
      tokio::spawn(async move { next_task(&state, "r@x.io").await })
    };
    for _ in 0..10 {
      tokio::task::yield_now().await;
    }
    store.release.notify_one();

    edit.await.unwrap().unwrap();
    let after = ack.await.unwrap().unwrap();
    let stored = state.store.get("r@x.io").await.unwrap().unwrap();
    assert_eq!((after.profile.coins, after.profile.current_task_index), (10, 1));
    assert_eq!((stored.coins, stored.current_task_index), (10, 1));
    assert_eq!((after.profile.name.as_str(), stored.name.as_str()), ("Renamed", "Renamed"));
  }

  #[tokio::test]
  async fn avatar_reroll_keeps_progress() {
    let state = AppState::offline();
    let before = do_onboard(&state, form("a@x.io")).await.unwrap();
    let after = do_reroll_avatar(&state, "a@x.io").await.unwrap();
    assert_ne!(after.avatar, before.avatar);
    assert_eq!(state.store.get("a@x.io").await.unwrap().unwrap(), after);
  }

  #[tokio::test]
  async fn speech_needs_a_provider() {
    let state = AppState::offline();
    assert!(matches!(do_speak(&state, "hello").await, Err(ApiError::Unavailable("speech"))));
  }
}
