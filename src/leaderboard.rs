//! Leaderboard: stored profiles plus seed learners, coins descending.

use crate::domain::{LeaderboardEntry, LearnerProfile};

fn entry(p: &LearnerProfile, is_self: bool) -> LeaderboardEntry {
  LeaderboardEntry {
    id: p.id.clone(),
    name: p.name.clone(),
    coins: p.coins,
    avatar: Some(p.avatar.clone()).filter(|a| !a.is_empty()),
    is_self,
  }
}

/// Build the ranking for `current`.
///
/// `stored` is every known profile in insertion order. The current learner shows up
/// exactly once, from the live profile. Seed learners are added unless a listed
/// learner already has their name. Ties keep insertion order.
pub fn rank(current: &LearnerProfile, stored: &[LearnerProfile], seeds: &[LeaderboardEntry]) -> Vec<LeaderboardEntry> {
  let mut combined: Vec<LeaderboardEntry> = Vec::with_capacity(stored.len() + seeds.len() + 1);
  let mut self_listed = false;
  for p in stored {
    if p.id == current.id || p.email == current.email {
      if !self_listed {
        combined.push(entry(current, true));
        self_listed = true;
      }
    } else {
      combined.push(entry(p, false));
    }
  }
  if !self_listed {
    combined.push(entry(current, true));
  }
  for seed in seeds {
    if !combined.iter().any(|e| e.name == seed.name) {
      combined.push(LeaderboardEntry { is_self: false, ..seed.clone() });
    }
  }
  combined.sort_by(|a, b| b.coins.cmp(&a.coins));
  combined
}
