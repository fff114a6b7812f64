//! Goal-keyed roadmap tracks and the status derivation.
//!
//! Tracks are a fixed lookup table (four lessons, one treasure, one exam). Status is
//! never stored: it follows from `lessons_completed` alone.

use serde::Serialize;

use crate::domain::{Goal, NodeKind, NodeStatus, RoadmapNode};

/// Every track has the same length.
pub const TRACK_LEN: usize = 6;

fn node(id: &str, title: &str, icon: &str, kind: NodeKind) -> RoadmapNode {
  RoadmapNode { id: id.into(), title: title.into(), icon: icon.into(), kind }
}

pub fn nodes_for_goal(goal: Goal) -> Vec<RoadmapNode> {
  use NodeKind::*;
  match goal {
    Goal::Speaking => vec![
      node("s1", "Talaffuz asoslari", "🗣️", Lesson),
      node("s2", "Kundalik salomlashish", "🤝", Lesson),
      node("s3", "Savol berish", "❓", Lesson),
      node("s4", "Xazina: Speaking Bonus", "🎁", Treasure),
      node("s5", "Intonatsiya", "🎵", Lesson),
      node("s_exam", "Speaking Imtihoni", "🎓", Exam),
    ],
    Goal::Writing => vec![
      node("w1", "Imlo qoidalari", "✍️", Lesson),
      node("w2", "Gap qurilishi", "🏗️", Lesson),
      node("w3", "Punctuation", "📍", Lesson),
      node("w4", "Xazina: Writing Tips", "🎁", Treasure),
      node("w5", "Insho asoslari", "📝", Lesson),
      node("w_exam", "Writing Imtihoni", "🎓", Exam),
    ],
    Goal::Vocabulary => vec![
      node("v1", "Eng muhim 100 so'z", "📚", Lesson),
      node("v2", "Sifatlar", "✨", Lesson),
      node("v3", "Fe'llar dunyosi", "🏃", Lesson),
      node("v4", "Xazina: Lug'at to'plami", "🎁", Treasure),
      node("v5", "Idiomalar", "🧠", Lesson),
      node("v_exam", "Vocabulary Imtihoni", "🎓", Exam),
    ],
    Goal::Grammar => vec![
      node("g1", "Tobe fe'li", "🧩", Lesson),
      node("g2", "Hozirgi zamon", "⏰", Lesson),
      node("g3", "O'tgan zamon", "🔙", Lesson),
      node("g4", "Xazina: Grammar Cheat Sheet", "🎁", Treasure),
      node("g5", "Kelasi zamon", "🚀", Lesson),
      node("g_exam", "Grammar Imtihoni", "🎓", Exam),
    ],
  }
}

/// Status of the node at `index` given the completed-lesson counter.
pub fn status_at(lessons_completed: u32, index: usize) -> NodeStatus {
  let completed = lessons_completed as usize;
  if index < completed {
    NodeStatus::Completed
  } else if index == completed {
    NodeStatus::Active
  } else {
    NodeStatus::Locked
  }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct RoadmapItem {
  pub index: usize,
  #[serde(flatten)]
  pub node: RoadmapNode,
  pub status: NodeStatus,
}

pub fn roadmap(goal: Goal, lessons_completed: u32) -> Vec<RoadmapItem> {
  nodes_for_goal(goal)
    .into_iter()
    .enumerate()
    .map(|(index, node)| RoadmapItem { index, node, status: status_at(lessons_completed, index) })
    .collect()
}

/// Resolve a node id within a goal's track.
pub fn find_node(goal: Goal, node_id: &str) -> Option<(usize, RoadmapNode)> {
  nodes_for_goal(goal).into_iter().enumerate().find(|(_, n)| n.id == node_id)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_track_has_four_lessons_a_treasure_and_an_exam() {
    for goal in [Goal::Speaking, Goal::Grammar, Goal::Vocabulary, Goal::Writing] {
      let nodes = nodes_for_goal(goal);
      assert_eq!(nodes.len(), TRACK_LEN);
      assert_eq!(nodes.iter().filter(|n| n.kind == NodeKind::Lesson).count(), 4);
      assert_eq!(nodes.iter().filter(|n| n.kind == NodeKind::Treasure).count(), 1);
      assert_eq!(nodes.last().map(|n| n.kind), Some(NodeKind::Exam));
    }
  }

  #[test]
  fn status_is_a_function_of_completed_count_and_index() {
    for completed in 0..=TRACK_LEN as u32 {
      for index in 0..TRACK_LEN {
        let expected = if index < completed as usize {
          NodeStatus::Completed
        } else if index == completed as usize {
          NodeStatus::Active
        } else {
          NodeStatus::Locked
        };
        assert_eq!(status_at(completed, index), expected, "completed={completed} index={index}");
      }
    }
  }

  #[test]
  fn roadmap_marks_exactly_one_active_node_until_finished() {
    let items = roadmap(Goal::Vocabulary, 2);
    let statuses: Vec<_> = items.iter().map(|i| i.status).collect();
    assert_eq!(
      statuses,
      vec![
        NodeStatus::Completed,
        NodeStatus::Completed,
        NodeStatus::Active,
        NodeStatus::Locked,
        NodeStatus::Locked,
        NodeStatus::Locked,
      ]
    );
    let finished = roadmap(Goal::Vocabulary, TRACK_LEN as u32);
    assert!(finished.iter().all(|i| i.status == NodeStatus::Completed));
  }

  #[test]
  fn titles_are_the_ones_the_client_shows() {
    let grammar: Vec<_> = nodes_for_goal(Goal::Grammar).into_iter().map(|n| n.title).collect();
    assert_eq!(grammar[0], "Tobe fe'li");
    assert_eq!(grammar[1], "Hozirgi zamon");
    assert_eq!(grammar[5], "Grammar Imtihoni");
    assert_eq!(nodes_for_goal(Goal::Vocabulary)[3].title, "Xazina: Lug'at to'plami");
  }

  #[test]
  fn find_node_is_scoped_to_the_goal() {
    assert_eq!(find_node(Goal::Grammar, "g_exam").map(|(i, _)| i), Some(5));
    assert!(find_node(Goal::Grammar, "s1").is_none());
  }
}
