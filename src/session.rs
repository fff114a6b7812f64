//! Async driver around `Progression`.
//!
//! The controller lock is never held across a generate/evaluate call: a request is
//! taken under the lock, the call runs unlocked (bounded by a timeout), and the
//! result is handed back under the lock. Persistence happens under the lock, before
//! any follow-up lesson request is issued.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

use crate::controller::{Cycle, GradeRequest, LessonRequest, Notice, Phase, Progression};
use crate::domain::{LearnerProfile, Lesson, Verdict, TASKS_PER_LESSON};
use crate::error::{ApiError, EvaluationError, GenerationError, ProfileError};
use crate::profile::merge_editable;
use crate::store::ProfileStore;
use crate::tutor::{ContentGenerator, Grader};

/// Client-facing snapshot of a learner's progression.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionView {
  pub phase: &'static str,
  pub busy: bool,
  pub cycle: Option<Cycle>,
  pub lesson: Option<Lesson>,
  pub selection: Option<String>,
  pub verdict: Option<Verdict>,
  pub notice: Option<Notice>,
  pub task_index: u32,
  pub tasks_per_lesson: u32,
  pub assistant: String,
  pub profile: LearnerProfile,
}

impl ProgressionView {
  pub fn of(ctl: &Progression) -> Self {
    let phase = ctl.phase();
    let (lesson, selection, verdict, notice) = match phase {
      Phase::LessonReady { lesson, selection, notice, .. } => {
        (Some(lesson.clone()), selection.clone(), None, notice.clone())
      }
      Phase::Grading { lesson, selection, .. } => (Some(lesson.clone()), Some(selection.clone()), None, None),
      Phase::VerdictReady { lesson, verdict, .. } => (Some(lesson.clone()), None, Some(verdict.clone()), None),
      Phase::Error { notice, .. } => (None, None, None, Some(notice.clone())),
      Phase::Idle | Phase::LessonLoading { .. } => (None, None, None, None),
    };
    Self {
      phase: phase.name(),
      busy: phase.in_flight(),
      cycle: phase.cycle().cloned(),
      lesson,
      selection,
      verdict,
      notice,
      task_index: ctl.task_position(),
      tasks_per_lesson: TASKS_PER_LESSON,
      assistant: ctl.assistant_line(),
      profile: ctl.profile().clone(),
    }
  }
}

/// One learner's live progression plus the collaborators it talks to.
pub struct LearningSession {
  progression: Mutex<Progression>,
  generator: Arc<dyn ContentGenerator>,
  grader: Arc<dyn Grader>,
  store: Arc<dyn ProfileStore>,
  call_timeout: Duration,
}

impl LearningSession {
  pub fn new(
    profile: LearnerProfile,
    generator: Arc<dyn ContentGenerator>,
    grader: Arc<dyn Grader>,
    store: Arc<dyn ProfileStore>,
    call_timeout: Duration,
  ) -> Self {
    Self { progression: Mutex::new(Progression::new(profile)), generator, grader, store, call_timeout }
  }

  pub async fn view(&self) -> ProgressionView {
    ProgressionView::of(&*self.progression.lock().await)
  }

  #[instrument(level = "info", skip(self))]
  pub async fn enter(&self, node_id: &str) -> Result<ProgressionView, ApiError> {
    let req = self.progression.lock().await.enter_node(node_id)?;
    self.run_lesson_request(req).await;
    Ok(self.view().await)
  }

  #[instrument(level = "info", skip(self))]
  pub async fn retry(&self) -> Result<ProgressionView, ApiError> {
    let req = self.progression.lock().await.retry()?;
    self.run_lesson_request(req).await;
    Ok(self.view().await)
  }

  #[instrument(level = "info", skip(self, selection), fields(selection_len = selection.len()))]
  pub async fn submit(&self, selection: &str) -> Result<ProgressionView, ApiError> {
    let req = self.progression.lock().await.submit(selection)?;
    self.run_grade_request(req).await;
    Ok(self.view().await)
  }

  /// Apply the verdict, persist, then fetch the next lesson if there is one.
  #[instrument(level = "info", skip(self))]
  pub async fn acknowledge(&self) -> Result<ProgressionView, ApiError> {
    let next = {
      let mut ctl = self.progression.lock().await;
      let ack = ctl.acknowledge()?;
      if ack.persist {
        if let Err(e) = self.store.put(ctl.profile()).await {
          error!(target: "progression", error = %e, "Persisting progress failed; leaving the lesson");
          ctl.exit();
          return Err(e.into());
        }
      }
      info!(
        target: "progression",
        coins_awarded = ack.coins_awarded,
        cycle_finished = ack.cycle_finished,
        coins = ctl.profile().coins,
        "Verdict applied"
      );
      ack.next
    };
    if let Some(req) = next {
      self.run_lesson_request(req).await;
    }
    Ok(self.view().await)
  }

  pub async fn exit(&self) -> ProgressionView {
    let mut ctl = self.progression.lock().await;
    ctl.exit();
    ProgressionView::of(&ctl)
  }

  /// Apply a profile edit to the live profile and persist the merged record.
  ///
  /// The controller lock is held across the store write, so an acknowledgement cannot
  /// land between reading the profile and saving it. Returns the email the record
  /// was stored under before the edit, and the merged profile.
  #[instrument(level = "info", skip_all)]
  pub async fn edit_profile<F>(&self, edit: F) -> Result<(String, LearnerProfile), ApiError>
  where
    F: FnOnce(LearnerProfile) -> Result<LearnerProfile, ProfileError>,
  {
    let mut ctl = self.progression.lock().await;
    let old_email = ctl.profile().email.clone();
    let edited = edit(ctl.profile().clone())?;
    let mut merged = ctl.profile().clone();
    merge_editable(&mut merged, &edited);
    if merged.email != old_email {
      self.store.rekey(&old_email, &merged).await?;
    } else {
      self.store.put(&merged).await?;
    }
    ctl.apply_edit(&merged);
    Ok((old_email, merged))
  }

  async fn run_lesson_request(&self, req: LessonRequest) {
    let result = match tokio::time::timeout(
      self.call_timeout,
      self.generator.generate_lesson(&req.profile, req.is_exam),
    )
    .await
    {
      Ok(r) => r,
      Err(_) => Err(GenerationError::Timeout(self.call_timeout)),
    };
    self.progression.lock().await.lesson_loaded(req.ticket, result);
  }

  async fn run_grade_request(&self, req: GradeRequest) {
    let result = match tokio::time::timeout(
      self.call_timeout,
      self.grader.evaluate_task(&req.profile, &req.question, &req.selection),
    )
    .await
    {
      Ok(r) => r,
      Err(_) => Err(EvaluationError::Timeout(self.call_timeout)),
    };
    self.progression.lock().await.verdict_received(req.ticket, result);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Goal, Task, TaskType};
  use crate::error::ControllerError;
  use crate::store::LocalStore;
  use async_trait::async_trait;
  use std::collections::VecDeque;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex as StdMutex;

  /// Replays scripted lesson results and records what it was asked for.
  #[derive(Default)]
  struct ScriptedGenerator {
    script: StdMutex<VecDeque<Result<Lesson, GenerationError>>>,
    seen: StdMutex<Vec<(u32, bool)>>,
    /// When set, each call records the task index the store holds at that moment.
    store: Option<Arc<LocalStore>>,
    stored_at_fetch: StdMutex<Vec<Option<u32>>>,
  }

  impl ScriptedGenerator {
    fn with(results: Vec<Result<Lesson, GenerationError>>) -> Self {
      Self { script: StdMutex::new(results.into()), ..Default::default() }
    }
  }

  #[async_trait]
  impl ContentGenerator for ScriptedGenerator {
    async fn generate_lesson(&self, profile: &LearnerProfile, is_exam: bool) -> Result<Lesson, GenerationError> {
      if let Some(store) = &self.store {
        let stored = store.get(&profile.email).await.unwrap().map(|p| p.current_task_index);
        self.stored_at_fetch.lock().unwrap().push(stored);
      }
      self.seen.lock().unwrap().push((profile.current_task_index, is_exam));
      self.script.lock().unwrap().pop_front().unwrap_or_else(|| Ok(lesson()))
    }
  }

  struct FixedGrader {
    success: bool,
    coins: u32,
    calls: AtomicUsize,
  }

  #[async_trait]
  impl Grader for FixedGrader {
    async fn evaluate_task(&self, _: &LearnerProfile, _: &str, _: &str) -> Result<Verdict, EvaluationError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Ok(Verdict {
        success: self.success,
        coins: self.coins,
        feedback: "fb".into(),
        mistakes: vec![],
        reason: String::new(),
        motivation: String::new(),
        next_task: None,
      })
    }
  }

  /// Never answers; exercises the call timeout.
  struct StuckGenerator;

  #[async_trait]
  impl ContentGenerator for StuckGenerator {
    async fn generate_lesson(&self, _: &LearnerProfile, _: bool) -> Result<Lesson, GenerationError> {
      std::future::pending().await
    }
  }

  fn lesson() -> Lesson {
    Lesson {
      title: "t".into(),
      explanation: "e".into(),
      examples: vec![],
      task: Task {
        task_type: TaskType::Mcq,
        question: "q".into(),
        options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        audio_prompt: None,
      },
      is_exam: false,
    }
  }

  fn learner(task: u32, completed: u32) -> LearnerProfile {
    LearnerProfile {
      id: "p1".into(),
      email: "p@x.io".into(),
      goal: Goal::Grammar,
      current_task_index: task,
      lessons_completed: completed,
      ..Default::default()
    }
  }

  fn session(
    profile: LearnerProfile,
    generator: Arc<dyn ContentGenerator>,
    grader: Arc<dyn Grader>,
    store: Arc<LocalStore>,
  ) -> LearningSession {
    LearningSession::new(profile, generator, grader, store, Duration::from_secs(5))
  }

  #[tokio::test]
  async fn success_on_last_task_persists_completion_before_returning_to_idle() {
    let store = Arc::new(LocalStore::in_memory());
    let generator = Arc::new(ScriptedGenerator::default());
    let grader = Arc::new(FixedGrader { success: true, coins: 10, calls: AtomicUsize::new(0) });
    let s = session(learner(4, 2), generator.clone(), grader, store.clone());

    let v = s.enter("g3").await.unwrap();
    assert_eq!(v.phase, "lesson_ready");
    let v = s.submit("a").await.unwrap();
    assert_eq!(v.phase, "verdict_ready");
    let v = s.acknowledge().await.unwrap();
    assert_eq!(v.phase, "idle");

    let stored = store.get("p@x.io").await.unwrap().unwrap();
    assert_eq!((stored.current_task_index, stored.lessons_completed, stored.coins), (0, 3, 10));
    assert_eq!(generator.seen.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn success_mid_lesson_persists_then_fetches_the_next_task() {
    let store = Arc::new(LocalStore::in_memory());
    let generator = Arc::new(ScriptedGenerator { store: Some(store.clone()), ..Default::default() });
    let grader = Arc::new(FixedGrader { success: true, coins: 10, calls: AtomicUsize::new(0) });
    let s = session(learner(1, 0), generator.clone(), grader, store.clone());

    s.enter("g1").await.unwrap();
    s.submit("a").await.unwrap();
    let v = s.acknowledge().await.unwrap();
    assert_eq!(v.phase, "lesson_ready");
    assert_eq!(v.task_index, 2);
    assert_eq!(store.get("p@x.io").await.unwrap().unwrap().current_task_index, 2);
    assert_eq!(*generator.seen.lock().unwrap(), vec![(1, false), (2, false)]);
    // The advanced index was already on disk when the follow-up lesson was requested.
    assert_eq!(*generator.stored_at_fetch.lock().unwrap(), vec![None, Some(2)]);
  }

  #[tokio::test]
  async fn edit_keeps_the_counters_the_controller_owns() {
    let store = Arc::new(LocalStore::in_memory());
    let grader = Arc::new(FixedGrader { success: true, coins: 10, calls: AtomicUsize::new(0) });
    let s = session(learner(0, 0), Arc::new(ScriptedGenerator::default()), grader, store.clone());
    let stale = s.view().await.profile;

    s.enter("g1").await.unwrap();
    s.submit("a").await.unwrap();
    s.acknowledge().await.unwrap();

    let (old_email, merged) = s
      .edit_profile(|_| Ok(LearnerProfile { name: "Renamed".into(), ..stale }))
      .await
      .unwrap();
    assert_eq!(old_email, "p@x.io");
    assert_eq!((merged.name.as_str(), merged.coins, merged.current_task_index), ("Renamed", 10, 1));
    assert_eq!(store.get("p@x.io").await.unwrap().unwrap(), merged);
    assert_eq!(s.view().await.phase, "lesson_ready");
  }

  #[tokio::test]
  async fn failure_regenerates_the_same_position_and_persists_nothing() {
    let store = Arc::new(LocalStore::in_memory());
    let generator = Arc::new(ScriptedGenerator::default());
    let grader = Arc::new(FixedGrader { success: false, coins: 2, calls: AtomicUsize::new(0) });
    let s = session(learner(2, 1), generator.clone(), grader, store.clone());

    s.enter("g2").await.unwrap();
    s.submit("a").await.unwrap();
    let v = s.acknowledge().await.unwrap();
    assert_eq!(v.phase, "lesson_ready");
    assert_eq!(v.profile.coins, 0);
    assert_eq!(v.profile.current_task_index, 2);
    assert!(store.get("p@x.io").await.unwrap().is_none());
    assert_eq!(*generator.seen.lock().unwrap(), vec![(2, false), (2, false)]);
  }

  #[tokio::test]
  async fn rate_limit_then_retry_reissues_the_same_request() {
    let store = Arc::new(LocalStore::in_memory());
    let generator = Arc::new(ScriptedGenerator::with(vec![Err(GenerationError::RateLimited("429".into()))]));
    let grader = Arc::new(FixedGrader { success: true, coins: 10, calls: AtomicUsize::new(0) });
    let s = session(learner(0, 5), generator.clone(), grader, store);

    let v = s.enter("g_exam").await.unwrap();
    assert_eq!(v.phase, "error");
    let notice = v.notice.unwrap();
    assert!(notice.retryable);
    assert_eq!(notice.kind, crate::controller::NoticeKind::RateLimited);
    assert_eq!(v.cycle.map(|c| c.node.id), Some("g_exam".to_string()));

    let v = s.retry().await.unwrap();
    assert_eq!(v.phase, "lesson_ready");
    assert!(v.lesson.unwrap().is_exam);
    assert_eq!(*generator.seen.lock().unwrap(), vec![(0, true), (0, true)]);
  }

  #[tokio::test]
  async fn locked_node_issues_no_request() {
    let generator = Arc::new(ScriptedGenerator::default());
    let grader = Arc::new(FixedGrader { success: true, coins: 10, calls: AtomicUsize::new(0) });
    let s = session(learner(0, 0), generator.clone(), grader, Arc::new(LocalStore::in_memory()));
    let err = s.enter("g2").await.unwrap_err();
    assert!(matches!(err, ApiError::Controller(ControllerError::NodeLocked { .. })));
    assert!(generator.seen.lock().unwrap().is_empty());
    assert_eq!(s.view().await.phase, "idle");
  }

  #[tokio::test(start_paused = true)]
  async fn stuck_generator_times_out_into_a_retryable_notice() {
    let grader = Arc::new(FixedGrader { success: true, coins: 10, calls: AtomicUsize::new(0) });
    let s = session(learner(0, 0), Arc::new(StuckGenerator), grader, Arc::new(LocalStore::in_memory()));
    let v = s.enter("g1").await.unwrap();
    assert_eq!(v.phase, "error");
    assert_eq!(v.notice.map(|n| n.kind), Some(crate::controller::NoticeKind::Timeout));
  }
}
