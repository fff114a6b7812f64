//! Seed data: built-in multiple-choice items for the offline tutor and the seed
//! learners shown on the leaderboard.

use crate::domain::{Goal, LeaderboardEntry};

/// One built-in multiple-choice item with its known answer.
#[derive(Clone, Copy, Debug)]
pub struct BankItem {
  pub goal: Goal,
  pub title: &'static str,
  pub explanation: &'static str,
  pub examples: &'static [(&'static str, &'static str)],
  pub question: &'static str,
  pub options: [&'static str; 4],
  pub answer: usize,
  pub why: &'static str,
}

impl BankItem {
  pub fn correct_option(&self) -> &'static str {
    self.options[self.answer]
  }
}

/// Minimal built-in bank that keeps lessons flowing without a model provider.
pub const BANK: &[BankItem] = &[
  BankItem {
    goal: Goal::Grammar,
    title: "The verb to be",
    explanation: "Use am with I, is with he/she/it, and are with you/we/they.",
    examples: &[("I am a student.", "Men talabaman."), ("They are at home.", "Ular uyda.")],
    question: "She ___ my sister.",
    options: ["am", "is", "are", "be"],
    answer: 1,
    why: "With he/she/it the present form of 'to be' is 'is'.",
  },
  BankItem {
    goal: Goal::Grammar,
    title: "Present simple",
    explanation: "For habits, add -s to the verb after he/she/it.",
    examples: &[("He works every day.", "U har kuni ishlaydi.")],
    question: "My brother ___ football on Sundays.",
    options: ["play", "playing", "plays", "played"],
    answer: 2,
    why: "A habit with a third-person singular subject takes the -s form.",
  },
  BankItem {
    goal: Goal::Grammar,
    title: "Past simple",
    explanation: "Regular verbs take -ed; many common verbs are irregular.",
    examples: &[("We went to Samarkand last year.", "O'tgan yili Samarqandga bordik.")],
    question: "Yesterday I ___ a great film.",
    options: ["see", "saw", "seen", "seeing"],
    answer: 1,
    why: "'Yesterday' needs the past simple, and the past of 'see' is 'saw'.",
  },
  BankItem {
    goal: Goal::Vocabulary,
    title: "Adjectives",
    explanation: "Adjectives describe nouns and usually come before them.",
    examples: &[("a tall building", "baland bino")],
    question: "Which word is the opposite of 'expensive'?",
    options: ["cheap", "rich", "heavy", "quiet"],
    answer: 0,
    why: "'Cheap' means low in price, the opposite of 'expensive'.",
  },
  BankItem {
    goal: Goal::Vocabulary,
    title: "Everyday verbs",
    explanation: "Some verbs pair with fixed nouns: make a mistake, do homework.",
    examples: &[("I do my homework after dinner.", "Uy vazifamni kechki ovqatdan keyin qilaman.")],
    question: "Choose the correct phrase: to ___ a mistake.",
    options: ["do", "make", "take", "have"],
    answer: 1,
    why: "The fixed collocation is 'make a mistake'.",
  },
  BankItem {
    goal: Goal::Vocabulary,
    title: "Idioms",
    explanation: "Idioms mean more than their individual words.",
    examples: &[("It's raining cats and dogs.", "Chelakdan quygandek yomg'ir yog'yapti.")],
    question: "'Piece of cake' means something is…",
    options: ["delicious", "very easy", "expensive", "broken"],
    answer: 1,
    why: "'A piece of cake' describes a task that is very easy.",
  },
  BankItem {
    goal: Goal::Speaking,
    title: "Everyday greetings",
    explanation: "Match the greeting to the situation and the time of day.",
    examples: &[("How are you doing?", "Ishlaring qalay?")],
    question: "Someone says 'How are you?'. The most natural reply is…",
    options: ["I'm fine, thanks. And you?", "I am 20 years old.", "Yes, I am.", "Goodbye!"],
    answer: 0,
    why: "'How are you?' asks about your wellbeing, so answer how you feel.",
  },
  BankItem {
    goal: Goal::Speaking,
    title: "Asking questions",
    explanation: "Questions in the present simple use do/does before the subject.",
    examples: &[("Do you like tea?", "Choy yoqtirasizmi?")],
    question: "Which question is correct?",
    options: ["You like coffee?", "Does you like coffee?", "Do you like coffee?", "Like you coffee?"],
    answer: 2,
    why: "With 'you' the auxiliary is 'do' and it comes first.",
  },
  BankItem {
    goal: Goal::Speaking,
    title: "Polite requests",
    explanation: "Could and would soften a request.",
    examples: &[("Could you help me, please?", "Menga yordam bera olasizmi?")],
    question: "Which request is the most polite?",
    options: ["Give me water.", "Water!", "Could I have some water, please?", "I want water now."],
    answer: 2,
    why: "'Could I have…, please?' is the polite form.",
  },
  BankItem {
    goal: Goal::Writing,
    title: "Punctuation",
    explanation: "Questions end with a question mark; statements with a full stop.",
    examples: &[("Where do you live?", "Qayerda yashaysiz?")],
    question: "Which sentence is punctuated correctly?",
    options: ["where is the bank.", "Where is the bank?", "Where is the bank", "where is the bank?"],
    answer: 1,
    why: "A question starts with a capital letter and ends with '?'.",
  },
  BankItem {
    goal: Goal::Writing,
    title: "Sentence building",
    explanation: "English follows subject, verb, object.",
    examples: &[("Aziza reads books.", "Aziza kitob o'qiydi.")],
    question: "Choose the correct word order.",
    options: ["Books reads Aziza.", "Reads Aziza books.", "Aziza books reads.", "Aziza reads books."],
    answer: 3,
    why: "Subject (Aziza), verb (reads), object (books).",
  },
  BankItem {
    goal: Goal::Writing,
    title: "Spelling rules",
    explanation: "Verbs ending in a consonant + y change y to i before -es/-ed.",
    examples: &[("study → studies", "o'qimoq → o'qiydi")],
    question: "Which spelling is correct?",
    options: ["studys", "studyes", "studies", "studeis"],
    answer: 2,
    why: "Consonant + y becomes -ies.",
  },
];

pub fn bank_for_goal(goal: Goal) -> Vec<&'static BankItem> {
  BANK.iter().filter(|i| i.goal == goal).collect()
}

pub fn find_by_question(question: &str) -> Option<&'static BankItem> {
  let q = question.trim();
  BANK.iter().find(|i| i.question == q)
}

fn seed_avatar(name: &str) -> Option<String> {
  Some(format!("https://api.dicebear.com/7.x/avataaars/svg?seed={}", name))
}

/// Learners merged into the leaderboard so it is never empty.
pub fn seed_leaderboard() -> Vec<LeaderboardEntry> {
  [("u1", "Dilshod", 2450), ("u2", "Malika", 1890), ("u3", "Sardor", 1560), ("u4", "Gulnoza", 1200)]
    .into_iter()
    .map(|(id, name, coins)| LeaderboardEntry {
      id: id.into(),
      name: name.into(),
      coins,
      avatar: seed_avatar(name),
      is_self: false,
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_goal_has_items_with_a_valid_answer_index() {
    for goal in [Goal::Speaking, Goal::Grammar, Goal::Vocabulary, Goal::Writing] {
      let items = bank_for_goal(goal);
      assert!(!items.is_empty(), "{goal:?} has no items");
      for item in items {
        assert!(item.answer < item.options.len());
      }
    }
  }

  #[test]
  fn questions_are_unique_so_grading_can_look_them_up() {
    for item in BANK {
      let hit = find_by_question(item.question).unwrap();
      assert_eq!(hit.title, item.title);
    }
  }
}
