use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::GameStore;
use crate::vk::MemberProfile;

/// Persistent identity behind a participant. Referenced from sessions by
/// VK id and display name only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub vk_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
}

impl UserRecord {
    pub fn from_profile(profile: &MemberProfile) -> Self {
        Self {
            vk_id: profile.id,
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            username: format!("@{}", profile.screen_name),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum MentionResolution {
    Resolved(Vec<UserRecord>),
    /// Mentions that matched nobody in the conversation. A user-input
    /// problem reported back to the chat, never an error.
    Unresolved(Vec<String>),
}

/// Resolves `@screen_name` mentions against the conversation member list,
/// creating missing user records through the persistence gateway.
pub struct UserDirectory {
    store: Arc<dyn GameStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    pub async fn resolve_mentions(
        &self,
        mentions: &[String],
        members: &[MemberProfile],
    ) -> Result<MentionResolution, StoreError> {
        let mut profiles = Vec::with_capacity(mentions.len());
        let mut unresolved = Vec::new();

        for mention in mentions {
            let wanted = mention.trim().trim_start_matches('@').to_lowercase();
            match members
                .iter()
                .find(|m| m.screen_name.to_lowercase() == wanted)
            {
                Some(profile) => profiles.push(profile),
                None => unresolved.push(mention.trim().to_string()),
            }
        }

        if !unresolved.is_empty() {
            return Ok(MentionResolution::Unresolved(unresolved));
        }

        let mut records = Vec::with_capacity(profiles.len());
        for profile in profiles {
            records.push(self.store.upsert_user(profile).await?);
        }
        Ok(MentionResolution::Resolved(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SnapshotStore;

    fn member(id: i64, screen_name: &str) -> MemberProfile {
        MemberProfile {
            id,
            first_name: "Имя".to_string(),
            last_name: "Фамилия".to_string(),
            screen_name: screen_name.to_string(),
        }
    }

    #[tokio::test]
    async fn resolves_mentions_case_insensitively() {
        let directory = UserDirectory::new(Arc::new(SnapshotStore::in_memory()));
        let members = vec![member(1, "anna_k"), member(2, "Boris")];
        let mentions = vec!["@anna_k".to_string(), "@boris".to_string()];

        match directory.resolve_mentions(&mentions, &members).await.unwrap() {
            MentionResolution::Resolved(records) => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[0].vk_id, 1);
                assert_eq!(records[0].username, "@anna_k");
            }
            other => panic!("expected Resolved, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reports_unknown_mentions() {
        let directory = UserDirectory::new(Arc::new(SnapshotStore::in_memory()));
        let members = vec![member(1, "anna_k")];
        let mentions = vec!["@anna_k".to_string(), "@ghost".to_string()];

        match directory.resolve_mentions(&mentions, &members).await.unwrap() {
            MentionResolution::Unresolved(missing) => {
                assert_eq!(missing, vec!["@ghost".to_string()]);
            }
            other => panic!("expected Unresolved, got {other:?}"),
        }
    }
}
