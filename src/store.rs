//! Profile persistence.
//!
//! `LocalStore` keeps the browser's local-storage layout: a string key/value map
//! holding one JSON record per email, an index of every known profile, and the
//! current session email. With a data path the map is mirrored to a JSON file
//! after every mutation.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::domain::LearnerProfile;
use crate::error::StoreError;
use crate::util::normalize_email;

const USER_KEY_PREFIX: &str = "ai_tutor_user_";
const INDEX_KEY: &str = "ai_tutor_all_users";
const SESSION_KEY: &str = "ai_tutor_email";

/// Durable profile records, unique per email.
#[async_trait]
pub trait ProfileStore: Send + Sync {
  async fn get(&self, email: &str) -> Result<Option<LearnerProfile>, StoreError>;
  /// Create a record for an email nobody holds yet. Returns false if it is taken.
  async fn insert_new(&self, profile: &LearnerProfile) -> Result<bool, StoreError>;
  /// Upsert keyed by email, and by id in the index.
  async fn put(&self, profile: &LearnerProfile) -> Result<(), StoreError>;
  /// Move a record to a new email. Fails if the old record is gone or the new email
  /// belongs to someone else.
  async fn rekey(&self, old_email: &str, profile: &LearnerProfile) -> Result<(), StoreError>;
  /// Every known profile, in insertion order.
  async fn all(&self) -> Result<Vec<LearnerProfile>, StoreError>;
  async fn session_email(&self) -> Result<Option<String>, StoreError>;
  async fn set_session(&self, email: &str) -> Result<(), StoreError>;
  async fn clear_session(&self) -> Result<(), StoreError>;
}

#[derive(Clone, Default)]
pub struct LocalStore {
  entries: Arc<RwLock<BTreeMap<String, String>>>,
  path: Option<PathBuf>,
}

fn user_key(email: &str) -> String {
  format!("{}{}", USER_KEY_PREFIX, normalize_email(email))
}

impl LocalStore {
  pub fn in_memory() -> Self {
    Self::default()
  }

  /// Load the map from `path` if it exists; start empty otherwise.
  #[instrument(level = "info", skip_all, fields(path = %path.display()))]
  pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
    let entries = match tokio::fs::read_to_string(&path).await {
      Ok(raw) => serde_json::from_str::<BTreeMap<String, String>>(&raw)?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        info!(target: "store", "No data file yet; starting empty");
        BTreeMap::new()
      }
      Err(e) => return Err(e.into()),
    };
    info!(target: "store", keys = entries.len(), "Profile store opened");
    Ok(Self { entries: Arc::new(RwLock::new(entries)), path: Some(path) })
  }

  async fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
    let Some(path) = &self.path else { return Ok(()) };
    let raw = serde_json::to_string_pretty(entries)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, raw).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!(target: "store", keys = entries.len(), "Flushed profile store");
    Ok(())
  }

  fn read_index(entries: &BTreeMap<String, String>) -> Vec<LearnerProfile> {
    match entries.get(INDEX_KEY) {
      Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(target: "store", error = %e, "Unreadable profile index; treating as empty");
        Vec::new()
      }),
      None => Vec::new(),
    }
  }

  fn write_record(entries: &mut BTreeMap<String, String>, profile: &LearnerProfile) -> Result<(), StoreError> {
    entries.insert(user_key(&profile.email), serde_json::to_string(profile)?);
    let mut index = Self::read_index(entries);
    match index.iter_mut().find(|p| p.id == profile.id) {
      Some(slot) => *slot = profile.clone(),
      None => index.push(profile.clone()),
    }
    entries.insert(INDEX_KEY.into(), serde_json::to_string(&index)?);
    Ok(())
  }
}

#[async_trait]
impl ProfileStore for LocalStore {
  async fn get(&self, email: &str) -> Result<Option<LearnerProfile>, StoreError> {
    let entries = self.entries.read().await;
    match entries.get(&user_key(email)) {
      Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
      None => Ok(None),
    }
  }

  #[instrument(level = "debug", skip(self, profile), fields(id = %profile.id))]
  async fn insert_new(&self, profile: &LearnerProfile) -> Result<bool, StoreError> {
    let mut entries = self.entries.write().await;
    if entries.contains_key(&user_key(&profile.email)) {
      return Ok(false);
    }
    Self::write_record(&mut entries, profile)?;
    self.flush(&entries).await?;
    Ok(true)
  }

  #[instrument(level = "debug", skip(self, profile), fields(id = %profile.id))]
  async fn put(&self, profile: &LearnerProfile) -> Result<(), StoreError> {
    let mut entries = self.entries.write().await;
    Self::write_record(&mut entries, profile)?;
    self.flush(&entries).await
  }

  #[instrument(level = "debug", skip(self, profile), fields(id = %profile.id))]
  async fn rekey(&self, old_email: &str, profile: &LearnerProfile) -> Result<(), StoreError> {
    let mut entries = self.entries.write().await;
    let new_key = user_key(&profile.email);
    let old_key = user_key(old_email);
    if !entries.contains_key(&old_key) {
      return Err(StoreError::NotFound(normalize_email(old_email)));
    }
    if new_key != old_key {
      if let Some(raw) = entries.get(&new_key) {
        let holder: LearnerProfile = serde_json::from_str(raw)?;
        if holder.id != profile.id {
          return Err(StoreError::EmailTaken(profile.email.clone()));
        }
      }
      entries.remove(&old_key);
      if entries.get(SESSION_KEY).map(|s| s.as_str()) == Some(normalize_email(old_email).as_str()) {
        entries.insert(SESSION_KEY.into(), normalize_email(&profile.email));
      }
    }
    Self::write_record(&mut entries, profile)?;
    self.flush(&entries).await
  }

  async fn all(&self) -> Result<Vec<LearnerProfile>, StoreError> {
    let entries = self.entries.read().await;
    Ok(Self::read_index(&entries))
  }

  async fn session_email(&self) -> Result<Option<String>, StoreError> {
    Ok(self.entries.read().await.get(SESSION_KEY).cloned())
  }

  async fn set_session(&self, email: &str) -> Result<(), StoreError> {
    let mut entries = self.entries.write().await;
    entries.insert(SESSION_KEY.into(), normalize_email(email));
    self.flush(&entries).await
  }

  async fn clear_session(&self) -> Result<(), StoreError> {
    let mut entries = self.entries.write().await;
    entries.remove(SESSION_KEY);
    self.flush(&entries).await
  }
}
