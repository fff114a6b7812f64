//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{LeaderboardEntry, LearnerProfile};
use crate::openai::SpeechAudio;
use crate::profile::{OnboardingForm, ProfileEdit};
use crate::roadmap::RoadmapItem;
use crate::session::ProgressionView;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Auth {
        email: String,
        #[serde(default)]
        password: String,
    },
    Logout,
    Session,
    Onboarding {
        form: OnboardingForm,
    },
    Profile {
        email: String,
    },
    UpdateProfile {
        email: String,
        #[serde(default)]
        changes: ProfileEdit,
    },
    RerollAvatar {
        email: String,
    },
    Roadmap {
        email: String,
    },
    Lesson {
        email: String,
    },
    EnterNode {
        email: String,
        #[serde(rename = "nodeId")]
        node_id: String,
    },
    RetryLesson {
        email: String,
    },
    SubmitAnswer {
        email: String,
        selection: String,
    },
    NextTask {
        email: String,
    },
    ExitLesson {
        email: String,
    },
    Leaderboard {
        email: String,
    },
    Speak {
        text: String,
    },
}

impl ClientWsMessage {
    /// Message tag for logs. Payloads may carry credentials, so only this is logged.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientWsMessage::Ping => "ping",
            ClientWsMessage::Auth { .. } => "auth",
            ClientWsMessage::Logout => "logout",
            ClientWsMessage::Session => "session",
            ClientWsMessage::Onboarding { .. } => "onboarding",
            ClientWsMessage::Profile { .. } => "profile",
            ClientWsMessage::UpdateProfile { .. } => "update_profile",
            ClientWsMessage::RerollAvatar { .. } => "reroll_avatar",
            ClientWsMessage::Roadmap { .. } => "roadmap",
            ClientWsMessage::Lesson { .. } => "lesson",
            ClientWsMessage::EnterNode { .. } => "enter_node",
            ClientWsMessage::RetryLesson { .. } => "retry_lesson",
            ClientWsMessage::SubmitAnswer { .. } => "submit_answer",
            ClientWsMessage::NextTask { .. } => "next_task",
            ClientWsMessage::ExitLesson { .. } => "exit_lesson",
            ClientWsMessage::Leaderboard { .. } => "leaderboard",
            ClientWsMessage::Speak { .. } => "speak",
        }
    }
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session(SessionOut),
    Profile {
        profile: LearnerProfile,
    },
    Roadmap(RoadmapOut),
    Progression {
        progression: ProgressionView,
    },
    Leaderboard(LeaderboardOut),
    Speech(SpeechAudio),
    Error {
        error: String,
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Deserialize)]
pub struct AuthIn {
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionOut {
    pub email: Option<String>,
    pub profile: Option<LearnerProfile>,
}

/// `email` addresses the current record; `changes.email` (if any) is the new one.
#[derive(Deserialize)]
pub struct ProfileEditIn {
    pub email: String,
    #[serde(default)]
    pub changes: ProfileEdit,
}

#[derive(Debug, Serialize)]
pub struct RoadmapOut {
    pub goal: String,
    #[serde(rename = "lessonsCompleted")]
    pub lessons_completed: u32,
    pub nodes: Vec<RoadmapItem>,
}

#[derive(Deserialize)]
pub struct EnterIn {
    pub email: String,
    #[serde(rename = "nodeId")]
    pub node_id: String,
}

#[derive(Deserialize)]
pub struct AnswerIn {
    pub email: String,
    pub selection: String,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardOut {
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Deserialize)]
pub struct SpeechIn {
    pub text: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
