//! In-process user directory, for deployments where profiles are pushed in
//! by the host application.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::models::{UserId, UserProfile};
use crate::traits::UserDirectory;

#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    profiles: DashMap<UserId, UserProfile>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, profile: UserProfile) {
        self.profiles.insert(profile.id, profile);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn profiles(&self, ids: &[UserId]) -> anyhow::Result<HashMap<UserId, UserProfile>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.profiles.get(id).map(|p| (*id, p.value().clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn unknown_users_are_left_out() {
        let directory = InMemoryUserDirectory::new();
        let known = Uuid::now_v7();
        directory.upsert(UserProfile { id: known, username: "kiwi".into(), avatar: None });

        let found = directory.profiles(&[known, Uuid::now_v7()]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[&known].username, "kiwi");
    }
}
