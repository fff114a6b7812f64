//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::error::ApiError;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::logic::*;
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "ai_mentor", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "ai_mentor", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "ai_mentor", kind = incoming.kind(), "WS received");
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { error: "invalid_json".into(), message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "error": "serialization", "message": format!("Serialization error: {}", e) })
            .to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "ai_mentor", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "ai_mentor", "WebSocket disconnected");
}

fn reply<T>(res: Result<T, ApiError>, wrap: impl FnOnce(T) -> ServerWsMessage) -> ServerWsMessage {
  match res {
    Ok(v) => wrap(v),
    Err(e) => ServerWsMessage::Error { error: e.code().into(), message: e.to_string() },
  }
}

fn progression(view: crate::session::ProgressionView) -> ServerWsMessage {
  ServerWsMessage::Progression { progression: view }
}

fn profile(profile: crate::domain::LearnerProfile) -> ServerWsMessage {
  ServerWsMessage::Profile { profile }
}

#[instrument(level = "info", skip(msg, state), fields(kind = msg.kind()))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Auth { email, password } => reply(do_sign_in(state, &email, &password).await, ServerWsMessage::Session),

    ClientWsMessage::Logout => reply(do_sign_out(state).await, ServerWsMessage::Session),

    ClientWsMessage::Session => reply(current_session(state).await, ServerWsMessage::Session),

    ClientWsMessage::Onboarding { form } => reply(do_onboard(state, form).await, profile),

    ClientWsMessage::Profile { email } => reply(get_profile(state, &email).await, profile),

    ClientWsMessage::UpdateProfile { email, changes } => {
      let res = do_edit_profile(state, &email, changes).await;
      tracing::info!(target: "ai_mentor", ok = res.is_ok(), "WS update_profile handled");
      reply(res, profile)
    }

    ClientWsMessage::RerollAvatar { email } => reply(do_reroll_avatar(state, &email).await, profile),

    ClientWsMessage::Roadmap { email } => reply(get_roadmap(state, &email).await, ServerWsMessage::Roadmap),

    ClientWsMessage::Lesson { email } => reply(get_lesson(state, &email).await, progression),

    ClientWsMessage::EnterNode { email, node_id } => {
      let res = enter_node(state, &email, &node_id).await;
      tracing::info!(target: "progression", node = %node_id, ok = res.is_ok(), "WS enter_node handled");
      reply(res, progression)
    }

    ClientWsMessage::RetryLesson { email } => reply(retry_lesson(state, &email).await, progression),

    ClientWsMessage::SubmitAnswer { email, selection } => {
      let res = submit_answer(state, &email, &selection).await;
      tracing::info!(target: "progression", ok = res.is_ok(), "WS submit_answer graded");
      reply(res, progression)
    }

    ClientWsMessage::NextTask { email } => reply(next_task(state, &email).await, progression),

    ClientWsMessage::ExitLesson { email } => reply(exit_lesson(state, &email).await, progression),

    ClientWsMessage::Leaderboard { email } => reply(get_leaderboard(state, &email).await, ServerWsMessage::Leaderboard),

    ClientWsMessage::Speak { text } => reply(do_speak(state, &text).await, ServerWsMessage::Speech),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::profile::OnboardingForm;
  use crate::domain::{AppLanguage, Goal, Level};

  #[test]
  fn client_messages_parse_from_tagged_json() {
    let m: ClientWsMessage = serde_json::from_str(r#"{"type":"enter_node","email":"a@x.io","nodeId":"s1"}"#).unwrap();
    assert!(matches!(m, ClientWsMessage::EnterNode { ref node_id, .. } if node_id == "s1"));
    let m: ClientWsMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
    assert!(matches!(m, ClientWsMessage::Ping));
  }

  async fn dispatch(state: &AppState, raw: serde_json::Value) -> serde_json::Value {
    let msg: ClientWsMessage = serde_json::from_value(raw).unwrap();
    serde_json::to_value(handle_client_ws(msg, state).await).unwrap()
  }

  #[tokio::test]
  async fn account_operations_work_over_the_socket() {
    let state = AppState::offline();
    let out = dispatch(&state, serde_json::json!({"type": "auth", "email": "Ws@X.io", "password": "pw"})).await;
    assert_eq!(out["type"], "session");
    assert_eq!(out["email"], "ws@x.io");

    let out = dispatch(&state, serde_json::json!({
      "type": "onboarding",
      "form": {
        "email": "ws@x.io",
        "name": "Dilnoza",
        "currentLevel": "Elementary",
        "targetLevel": "Intermediate",
        "goal": "Vocabulary",
        "language": "ru"
      }
    }))
    .await;
    assert_eq!(out["type"], "profile");
    assert_eq!(out["profile"]["name"], "Dilnoza");

    let out = dispatch(&state, serde_json::json!({
      "type": "update_profile",
      "email": "ws@x.io",
      "changes": {"name": "Dili"}
    }))
    .await;
    assert_eq!(out["profile"]["name"], "Dili");

    let before = dispatch(&state, serde_json::json!({"type": "profile", "email": "ws@x.io"})).await;
    let after = dispatch(&state, serde_json::json!({"type": "reroll_avatar", "email": "ws@x.io"})).await;
    assert_eq!(after["type"], "profile");
    assert_ne!(after["profile"]["avatar"], before["profile"]["avatar"]);

    let out = dispatch(&state, serde_json::json!({"type": "logout"})).await;
    assert_eq!(out["type"], "session");
    assert!(out["email"].is_null());
  }

  #[tokio::test]
  async fn errors_carry_their_code() {
    let state = AppState::offline();
    let out = handle_client_ws(ClientWsMessage::Lesson { email: "ghost@x.io".into() }, &state).await;
    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["type"], "error");
    assert_eq!(json["error"], "unknown_profile");
  }

  #[tokio::test]
  async fn enter_node_returns_the_progression_view() {
    let state = AppState::offline();
    let form = OnboardingForm {
      email: "w@x.io".into(),
      name: "Umid".into(),
      age: Some(30),
      current_level: Level::Intermediate,
      target_level: Level::UpperIntermediate,
      goal: Goal::Speaking,
      language: AppLanguage::Ru,
    };
    do_onboard(&state, form).await.unwrap();
    let msg = ClientWsMessage::EnterNode { email: "w@x.io".into(), node_id: "s1".into() };
    let json = serde_json::to_value(&handle_client_ws(msg, &state).await).unwrap();
    assert_eq!(json["type"], "progression");
    assert_eq!(json["progression"]["phase"], "lesson_ready");
  }
}
