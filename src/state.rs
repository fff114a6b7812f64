//! Application state: profile store, tutor backends, live learning sessions.
//!
//! This module owns:
//!   - the profile store (file-backed when MENTOR_DATA_PATH is set)
//!   - the content generator and grader (OpenAI when configured, offline otherwise)
//!   - the seed learners for the leaderboard
//!   - one `LearningSession` per signed-in email

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::config::{load_agent_config_from_env, ServerSettings};
use crate::domain::{LeaderboardEntry, LearnerProfile};
use crate::error::{ApiError, StoreError};
use crate::openai::OpenAI;
use crate::seeds::seed_leaderboard;
use crate::session::LearningSession;
use crate::store::{LocalStore, ProfileStore};
use crate::tutor::{ContentGenerator, Grader, OfflineTutor};
use crate::util::normalize_email;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProfileStore>,
    pub generator: Arc<dyn ContentGenerator>,
    pub grader: Arc<dyn Grader>,
    /// Present only with an API key; speech needs it.
    pub openai: Option<OpenAI>,
    pub seed_learners: Vec<LeaderboardEntry>,
    pub call_timeout: Duration,
    sessions: Arc<RwLock<HashMap<String, Arc<LearningSession>>>>,
}

impl AppState {
    /// Build state from env: load config, open the store, pick the tutor backend.
    #[instrument(level = "info", skip_all)]
    pub async fn from_env(settings: &ServerSettings) -> Result<Self, StoreError> {
        let cfg = load_agent_config_from_env().unwrap_or_default();

        let store: Arc<dyn ProfileStore> = match &settings.data_path {
            Some(path) => Arc::new(LocalStore::open(path.clone()).await?),
            None => {
                warn!(target: "store", "MENTOR_DATA_PATH not set; profiles live in memory only");
                Arc::new(LocalStore::in_memory())
            }
        };

        let openai = OpenAI::from_env(cfg.prompts.clone());
        let (generator, grader): (Arc<dyn ContentGenerator>, Arc<dyn Grader>) = match &openai {
            Some(oa) => {
                info!(target: "ai_mentor", base_url = %oa.base_url, fast_model = %oa.fast_model, strong_model = %oa.strong_model, tts_model = %oa.tts_model, "OpenAI enabled.");
                (Arc::new(oa.clone()), Arc::new(oa.clone()))
            }
            None => {
                info!(target: "ai_mentor", "OpenAI disabled (no OPENAI_API_KEY). Using the offline tutor.");
                (Arc::new(OfflineTutor), Arc::new(OfflineTutor))
            }
        };

        let seed_learners = if cfg.leaderboard_seed.is_empty() {
            seed_leaderboard()
        } else {
            cfg.leaderboard_seed.iter().map(|s| s.to_entry()).collect()
        };

        Ok(Self::new(store, generator, grader, openai, seed_learners, settings.call_timeout))
    }

    pub fn new(
        store: Arc<dyn ProfileStore>,
        generator: Arc<dyn ContentGenerator>,
        grader: Arc<dyn Grader>,
        openai: Option<OpenAI>,
        seed_learners: Vec<LeaderboardEntry>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            generator,
            grader,
            openai,
            seed_learners,
            call_timeout,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Offline tutor + in-memory store. Used by tests and local demos.
    pub fn offline() -> Self {
        Self::new(
            Arc::new(LocalStore::in_memory()),
            Arc::new(OfflineTutor),
            Arc::new(OfflineTutor),
            None,
            seed_leaderboard(),
            ServerSettings::default().call_timeout,
        )
    }

    pub async fn require_profile(&self, email: &str) -> Result<LearnerProfile, ApiError> {
        self.store
            .get(email)
            .await?
            .ok_or_else(|| ApiError::UnknownProfile(normalize_email(email)))
    }

    /// Live session for `email`, created from the stored profile on first use.
    #[instrument(level = "debug", skip(self))]
    pub async fn session(&self, email: &str) -> Result<Arc<LearningSession>, ApiError> {
        let key = normalize_email(email);
        if let Some(s) = self.sessions.read().await.get(&key) {
            return Ok(s.clone());
        }
        let profile = self.require_profile(&key).await?;
        let mut sessions = self.sessions.write().await;
        let s = sessions
            .entry(key)
            .or_insert_with(|| {
                Arc::new(LearningSession::new(
                    profile,
                    self.generator.clone(),
                    self.grader.clone(),
                    self.store.clone(),
                    self.call_timeout,
                ))
            })
            .clone();
        Ok(s)
    }

    /// Existing session only; does not create one.
    pub async fn live_session(&self, email: &str) -> Option<Arc<LearningSession>> {
        self.sessions.read().await.get(&normalize_email(email)).cloned()
    }

    /// Re-key a live session after an email change.
    pub async fn move_session(&self, old_email: &str, new_email: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(s) = sessions.remove(&normalize_email(old_email)) {
            sessions.insert(normalize_email(new_email), s);
        }
    }

    pub async fn drop_session(&self, email: &str) {
        self.sessions.write().await.remove(&normalize_email(email));
    }
}
