use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::game::{GameSession, Participant};
use crate::users::UserRecord;
use crate::vk::MemberProfile;

/// The narrow persistence contract the dispatcher and user directory talk
/// to. Sessions are saved whole; `save_participant` exists for partial
/// score/flag updates.
#[async_trait]
pub trait GameStore: Send + Sync {
    async fn load_unfinished_sessions(&self) -> Result<Vec<GameSession>, StoreError>;
    async fn create_session(&self, session: &GameSession) -> Result<(), StoreError>;
    async fn save_session(&self, session: &GameSession) -> Result<(), StoreError>;
    async fn save_participant(
        &self,
        session_id: Uuid,
        participant: &Participant,
    ) -> Result<(), StoreError>;
    async fn upsert_user(&self, profile: &MemberProfile) -> Result<UserRecord, StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreSnapshot {
    sessions: Vec<GameSession>,
    users: Vec<UserRecord>,
}

/// Snapshot-file implementation of [`GameStore`]: the whole state lives in
/// one JSON document, rewritten on every mutation. Plenty for a bot whose
/// entire hot state fits in memory; also runs without a file at all (tests,
/// `store.path` unset).
pub struct SnapshotStore {
    path: Option<PathBuf>,
    state: RwLock<StoreSnapshot>,
}

impl SnapshotStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: RwLock::new(StoreSnapshot::default()),
        }
    }

    /// Opens (or lazily creates) the snapshot file. A missing file is a
    /// first boot, not an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                serde_json::from_str(&raw).map_err(|e| StoreError::Parse(e.to_string()))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(store.path = %path.display(), "No snapshot file yet; starting empty");
                StoreSnapshot::default()
            }
            Err(e) => {
                return Err(StoreError::FileRead {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };
        tracing::info!(
            store.path = %path.display(),
            store.sessions = state.sessions.len(),
            store.users = state.users.len(),
            "Snapshot store opened"
        );
        Ok(Self {
            path: Some(path),
            state: RwLock::new(state),
        })
    }

    async fn persist(&self, state: &StoreSnapshot) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let raw = serde_json::to_string_pretty(state)
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        let write_err = |source| StoreError::FileWrite {
            path: path.display().to_string(),
            source,
        };
        tokio::fs::write(&tmp, raw).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(write_err)?;
        Ok(())
    }
}

#[async_trait]
impl GameStore for SnapshotStore {
    async fn load_unfinished_sessions(&self) -> Result<Vec<GameSession>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .sessions
            .iter()
            .filter(|s| s.finished_at.is_none())
            .cloned()
            .collect())
    }

    async fn create_session(&self, session: &GameSession) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state
            .sessions
            .iter()
            .any(|s| s.chat_id == session.chat_id && s.finished_at.is_none())
        {
            return Err(StoreError::SessionConflict(session.chat_id));
        }
        state.sessions.push(session.clone());
        self.persist(&state).await
    }

    async fn save_session(&self, session: &GameSession) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let slot = state
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session.session_id)
            .ok_or(StoreError::MissingSession(session.session_id))?;
        *slot = session.clone();
        self.persist(&state).await
    }

    async fn save_participant(
        &self,
        session_id: Uuid,
        participant: &Participant,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let session = state
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session_id)
            .ok_or(StoreError::MissingSession(session_id))?;
        if !session.update_participant(participant) {
            return Err(StoreError::MissingParticipant {
                session_id,
                user_id: participant.user_id,
            });
        }
        self.persist(&state).await
    }

    async fn upsert_user(&self, profile: &MemberProfile) -> Result<UserRecord, StoreError> {
        let mut state = self.state.write().await;
        let record = UserRecord::from_profile(profile);
        match state.users.iter_mut().find(|u| u.vk_id == profile.id) {
            Some(existing) => *existing = record.clone(),
            None => state.users.push(record.clone()),
        }
        self.persist(&state).await?;
        Ok(record)
    }
}
