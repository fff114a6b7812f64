//! Lesson/task progression state machine.
//!
//! `Progression` is synchronous and owns the learner's profile for the session.
//! Every external call is split in two: a *begin* transition hands out a request
//! carrying a ticket, and a *complete* transition takes `(ticket, result)`. A
//! result whose ticket no longer matches the phase is dropped, which is how an
//! exit or re-entry cancels whatever was in flight.
//!
//! Counters only move in `acknowledge`, and only forward.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{
  AppLanguage, LearnerProfile, Lesson, NodeKind, NodeStatus, RoadmapNode, Verdict, TASKS_PER_LESSON,
};
use crate::error::{ControllerError, EvaluationError, GenerationError};
use crate::profile::merge_editable;
use crate::roadmap::{find_node, status_at, TRACK_LEN};

/// One visit to a roadmap node.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cycle {
  pub node_index: usize,
  pub node: RoadmapNode,
  /// Replaying an already completed node: coins only, no counter movement.
  pub replay: bool,
  #[serde(skip)]
  replay_task_index: u32,
}

impl Cycle {
  pub fn is_exam(&self) -> bool {
    self.node.kind == NodeKind::Exam
  }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
  RateLimited,
  Timeout,
  Invalid,
  Failed,
}

/// User-facing message for a failed external call.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Notice {
  pub kind: NoticeKind,
  pub message: String,
  pub retryable: bool,
}

impl Notice {
  fn new(kind: NoticeKind, message: &str) -> Self {
    Self { kind, message: message.into(), retryable: true }
  }

  pub fn from_generation(e: &GenerationError) -> Self {
    match e {
      GenerationError::RateLimited(_) => {
        Self::new(NoticeKind::RateLimited, "The tutor is getting a lot of requests. Try again shortly.")
      }
      GenerationError::Timeout(_) => Self::new(NoticeKind::Timeout, "Preparing the lesson took too long. Try again."),
      GenerationError::Invalid(_) => Self::new(NoticeKind::Invalid, "The lesson came back incomplete. Try again."),
      GenerationError::Upstream(_) => {
        Self::new(NoticeKind::Failed, "Something went wrong while preparing the lesson. Try again.")
      }
    }
  }

  pub fn from_evaluation(e: &EvaluationError) -> Self {
    match e {
      EvaluationError::RateLimited(_) => {
        Self::new(NoticeKind::RateLimited, "The tutor is getting a lot of requests. Try again shortly.")
      }
      EvaluationError::Timeout(_) => Self::new(NoticeKind::Timeout, "Checking your answer took too long. Try again."),
      EvaluationError::Invalid(_) => Self::new(NoticeKind::Invalid, "Your answer could not be checked. Try again."),
      EvaluationError::Upstream(_) => {
        Self::new(NoticeKind::Failed, "Something went wrong while checking your answer. Try again.")
      }
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
  Idle,
  LessonLoading { cycle: Cycle, ticket: u64 },
  LessonReady { cycle: Cycle, lesson: Lesson, selection: Option<String>, notice: Option<Notice> },
  Grading { cycle: Cycle, lesson: Lesson, selection: String, ticket: u64 },
  VerdictReady { cycle: Cycle, lesson: Lesson, verdict: Verdict },
  /// Lesson request failed; `retry` re-issues it for the same node.
  Error { cycle: Cycle, notice: Notice },
}

impl Phase {
  pub fn name(&self) -> &'static str {
    match self {
      Phase::Idle => "idle",
      Phase::LessonLoading { .. } => "lesson_loading",
      Phase::LessonReady { .. } => "lesson_ready",
      Phase::Grading { .. } => "grading",
      Phase::VerdictReady { .. } => "verdict_ready",
      Phase::Error { .. } => "error",
    }
  }

  pub fn in_flight(&self) -> bool {
    matches!(self, Phase::LessonLoading { .. } | Phase::Grading { .. })
  }

  pub fn cycle(&self) -> Option<&Cycle> {
    match self {
      Phase::Idle => None,
      Phase::LessonLoading { cycle, .. }
      | Phase::LessonReady { cycle, .. }
      | Phase::Grading { cycle, .. }
      | Phase::VerdictReady { cycle, .. }
      | Phase::Error { cycle, .. } => Some(cycle),
    }
  }
}

/// Ask the content generator for a lesson.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LessonRequest {
  pub ticket: u64,
  /// Snapshot whose `current_task_index` is the position being requested.
  pub profile: LearnerProfile,
  pub is_exam: bool,
}

/// Ask the grader for a verdict.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GradeRequest {
  pub ticket: u64,
  pub profile: LearnerProfile,
  pub question: String,
  pub selection: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
  Applied,
  /// The phase moved on; the result was dropped.
  Stale,
}

/// What `acknowledge` did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Acknowledged {
  pub coins_awarded: u32,
  /// Profile changed and must be persisted before `next` is issued.
  pub persist: bool,
  pub cycle_finished: bool,
  pub next: Option<LessonRequest>,
}

#[derive(Debug)]
pub struct Progression {
  profile: LearnerProfile,
  phase: Phase,
  next_ticket: u64,
}

impl Progression {
  /// Start idle. Counters from an older or hand-edited record are pulled back into range.
  pub fn new(mut profile: LearnerProfile) -> Self {
    profile.current_task_index = profile.current_task_index.min(TASKS_PER_LESSON - 1);
    profile.lessons_completed = profile.lessons_completed.min(TRACK_LEN as u32);
    Self { profile, phase: Phase::Idle, next_ticket: 1 }
  }

  pub fn profile(&self) -> &LearnerProfile {
    &self.profile
  }

  pub fn phase(&self) -> &Phase {
    &self.phase
  }

  fn invalid(&self, event: &'static str) -> ControllerError {
    ControllerError::InvalidTransition { event, phase: self.phase.name() }
  }

  fn lesson_request(&mut self, cycle: Cycle) -> LessonRequest {
    let ticket = self.next_ticket;
    self.next_ticket += 1;
    let mut profile = self.profile.clone();
    if cycle.replay {
      profile.current_task_index = cycle.replay_task_index;
    }
    let is_exam = cycle.is_exam();
    debug!(target: "progression", ticket, node = %cycle.node.id, task = profile.current_task_index, is_exam, "Requesting lesson");
    self.phase = Phase::LessonLoading { cycle, ticket };
    LessonRequest { ticket, profile, is_exam }
  }

  /// Enter a roadmap node of the learner's current goal.
  pub fn enter_node(&mut self, node_id: &str) -> Result<LessonRequest, ControllerError> {
    if self.phase.in_flight() {
      return Err(ControllerError::Busy);
    }
    if !matches!(self.phase, Phase::Idle | Phase::Error { .. }) {
      return Err(self.invalid("enter"));
    }
    let (node_index, node) =
      find_node(self.profile.goal, node_id).ok_or_else(|| ControllerError::UnknownNode(node_id.to_string()))?;
    let status = status_at(self.profile.lessons_completed, node_index);
    if status == NodeStatus::Locked {
      return Err(ControllerError::NodeLocked { node: node.id, completed: self.profile.lessons_completed });
    }
    let replay = status == NodeStatus::Completed;
    info!(target: "progression", node = %node.id, node_index, replay, "Entering node");
    Ok(self.lesson_request(Cycle { node_index, node, replay, replay_task_index: 0 }))
  }

  /// Re-issue the lesson request that failed.
  pub fn retry(&mut self) -> Result<LessonRequest, ControllerError> {
    match &self.phase {
      Phase::Error { cycle, .. } => {
        let cycle = cycle.clone();
        Ok(self.lesson_request(cycle))
      }
      p if p.in_flight() => Err(ControllerError::Busy),
      _ => Err(self.invalid("retry")),
    }
  }

  pub fn lesson_loaded(&mut self, ticket: u64, result: Result<Lesson, GenerationError>) -> Completion {
    let cycle = match &self.phase {
      Phase::LessonLoading { cycle, ticket: t } if *t == ticket => cycle.clone(),
      _ => {
        warn!(target: "progression", ticket, phase = self.phase.name(), "Dropping stale lesson result");
        return Completion::Stale;
      }
    };
    self.phase = match result {
      Ok(mut lesson) => {
        lesson.is_exam = cycle.is_exam();
        Phase::LessonReady { cycle, lesson, selection: None, notice: None }
      }
      Err(e) => {
        warn!(target: "progression", ticket, error = %e, "Lesson request failed");
        Phase::Error { notice: Notice::from_generation(&e), cycle }
      }
    };
    Completion::Applied
  }

  pub fn submit(&mut self, selection: &str) -> Result<GradeRequest, ControllerError> {
    if self.phase.in_flight() {
      return Err(ControllerError::Busy);
    }
    let selection = selection.trim();
    let Phase::LessonReady { cycle, lesson, .. } = &self.phase else {
      return Err(self.invalid("submit"));
    };
    if selection.is_empty() {
      return Err(ControllerError::EmptySelection);
    }
    let (cycle, lesson) = (cycle.clone(), lesson.clone());
    let ticket = self.next_ticket;
    self.next_ticket += 1;

    let mut profile = self.profile.clone();
    if cycle.replay {
      profile.current_task_index = cycle.replay_task_index;
    }
    let req = GradeRequest { ticket, profile, question: lesson.task.question.clone(), selection: selection.to_string() };
    debug!(target: "progression", ticket, node = %cycle.node.id, "Submitting answer");
    self.phase = Phase::Grading { cycle, lesson, selection: selection.to_string(), ticket };
    Ok(req)
  }

  pub fn verdict_received(&mut self, ticket: u64, result: Result<Verdict, EvaluationError>) -> Completion {
    let (cycle, lesson, selection) = match std::mem::replace(&mut self.phase, Phase::Idle) {
      Phase::Grading { cycle, lesson, selection, ticket: t } if t == ticket => (cycle, lesson, selection),
      other => {
        warn!(target: "progression", ticket, phase = other.name(), "Dropping stale verdict");
        self.phase = other;
        return Completion::Stale;
      }
    };
    self.phase = match result {
      Ok(verdict) => {
        info!(target: "progression", ticket, success = verdict.success, "Verdict ready");
        Phase::VerdictReady { cycle, lesson, verdict }
      }
      Err(e) => {
        warn!(target: "progression", ticket, error = %e, "Evaluation failed");
        Phase::LessonReady { cycle, lesson, selection: Some(selection), notice: Some(Notice::from_evaluation(&e)) }
      }
    };
    Completion::Applied
  }

  /// Apply the verdict and decide what comes next.
  pub fn acknowledge(&mut self) -> Result<Acknowledged, ControllerError> {
    if self.phase.in_flight() {
      return Err(ControllerError::Busy);
    }
    let (mut cycle, verdict) = match std::mem::replace(&mut self.phase, Phase::Idle) {
      Phase::VerdictReady { cycle, verdict, .. } => (cycle, verdict),
      other => {
        self.phase = other;
        return Err(self.invalid("acknowledge"));
      }
    };

    // A failed verdict never pays out, whatever the grader reported.
    let coins_awarded = if verdict.success { verdict.coins } else { 0 };
    self.profile.coins = self.profile.coins.saturating_add(coins_awarded);
    let mut persist = coins_awarded > 0;

    if !verdict.success {
      debug!(target: "progression", node = %cycle.node.id, "Retrying the same task with fresh content");
      let next = self.lesson_request(cycle);
      return Ok(Acknowledged { coins_awarded, persist, cycle_finished: false, next: Some(next) });
    }

    let finished = if cycle.replay {
      cycle.replay_task_index += 1;
      cycle.replay_task_index >= TASKS_PER_LESSON
    } else {
      persist = true;
      if self.profile.current_task_index.saturating_add(1) >= TASKS_PER_LESSON {
        self.profile.current_task_index = 0;
        self.profile.lessons_completed = self.profile.lessons_completed.saturating_add(1).min(TRACK_LEN as u32);
        true
      } else {
        self.profile.current_task_index += 1;
        false
      }
    };

    if finished {
      info!(
        target: "progression",
        node = %cycle.node.id,
        replay = cycle.replay,
        lessons_completed = self.profile.lessons_completed,
        "Lesson cycle complete"
      );
      return Ok(Acknowledged { coins_awarded, persist, cycle_finished: true, next: None });
    }
    let next = self.lesson_request(cycle);
    Ok(Acknowledged { coins_awarded, persist, cycle_finished: false, next: Some(next) })
  }

  /// Leave the lesson from any phase. Whatever is in flight becomes stale.
  pub fn exit(&mut self) {
    if !matches!(self.phase, Phase::Idle) {
      info!(target: "progression", phase = self.phase.name(), "Leaving lesson");
    }
    self.phase = Phase::Idle;
  }

  /// Copy the learner-editable fields of `edited`. Coins and progress counters are
  /// owned here and stay as they are. A goal change leaves the current lesson.
  pub fn apply_edit(&mut self, edited: &LearnerProfile) {
    if edited.goal != self.profile.goal {
      self.exit();
    }
    merge_editable(&mut self.profile, edited);
  }

  /// Position shown to the learner for the current cycle.
  pub fn task_position(&self) -> u32 {
    match self.phase.cycle() {
      Some(c) if c.replay => c.replay_task_index,
      _ => self.profile.current_task_index,
    }
  }

  /// The mascot's line for the current phase.
  pub fn assistant_line(&self) -> String {
    let lang = self.profile.language;
    match &self.phase {
      Phase::Idle => line(lang, Line::Greeting).into(),
      Phase::LessonLoading { .. } | Phase::Grading { .. } => line(lang, Line::Thinking).into(),
      Phase::LessonReady { lesson, .. } => format!("{} \"{}\"", line(lang, Line::TryIt), lesson.title),
      Phase::VerdictReady { verdict, .. } if verdict.success => line(lang, Line::Praise).into(),
      Phase::VerdictReady { .. } => line(lang, Line::Consolation).into(),
      Phase::Error { .. } => line(lang, Line::Oops).into(),
    }
  }
}

#[derive(Clone, Copy)]
enum Line {
  Greeting,
  Thinking,
  TryIt,
  Praise,
  Consolation,
  Oops,
}

fn line(lang: AppLanguage, which: Line) -> &'static str {
  use AppLanguage::*;
  match (which, lang) {
    (Line::Greeting, Uz) => "Salom! Bugun nimani o'rganamiz?",
    (Line::Greeting, Ru) => "Привет! Что будем учить сегодня?",
    (Line::Greeting, En) => "Hi! What shall we learn today?",
    (Line::Thinking, Uz) => "O'ylayapman...",
    (Line::Thinking, Ru) => "Думаю...",
    (Line::Thinking, En) => "Thinking...",
    (Line::TryIt, Uz) => "Qani, urinib ko'r! Mavzu:",
    (Line::TryIt, Ru) => "Давай попробуем! Тема:",
    (Line::TryIt, En) => "Give it a try! Topic:",
    (Line::Praise, Uz) => "Barakalla! To'g'ri topding!",
    (Line::Praise, Ru) => "Молодец! Верно!",
    (Line::Praise, En) => "Well done! That's right!",
    (Line::Consolation, Uz) => "Hm, biroz xato bo'ldi. Yana bir urinib ko'ramizmi?",
    (Line::Consolation, Ru) => "Почти! Попробуем ещё раз?",
    (Line::Consolation, En) => "Almost! Shall we try again?",
    (Line::Oops, Uz) => "Xatolik yuz berdi. Qayta urinib ko'ring.",
    (Line::Oops, Ru) => "Что-то пошло не так. Попробуйте ещё раз.",
    (Line::Oops, En) => "Something went wrong. Please try again.",
  }
}
