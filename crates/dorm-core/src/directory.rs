use std::sync::Arc;

use chrono::Utc;

use crate::{
    domain::{UserId, UserProfile},
    errors::LogDefault,
    store::Store,
    Result,
};

/// User identity, activity and admin lookups on top of the store.
pub struct UserDirectory {
    store: Arc<dyn Store>,
    admin_ids: Vec<i64>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn Store>, admin_ids: Vec<i64>) -> Self {
        Self { store, admin_ids }
    }

    pub fn admin_ids(&self) -> &[i64] {
        &self.admin_ids
    }

    pub async fn user_exists(&self, id: UserId) -> Result<bool> {
        self.store.user_exists(id).await
    }

    pub async fn upsert_user(&self, profile: &UserProfile) -> Result<()> {
        self.store.upsert_user(profile, Utc::now()).await
    }

    /// Bump `last_activity` and reactivate. Failures are logged and swallowed.
    pub async fn touch_activity(&self, id: UserId) {
        if let Err(e) = self.store.touch_activity(id, Utc::now()).await {
            tracing::warn!(user_id = id.0, kind = e.kind(), error = %e, "touch_activity failed");
        }
    }

    /// Called for every inbound event: registers unknown users, otherwise
    /// only bumps activity. Keeps the user row ahead of any row referencing it.
    pub async fn observe(&self, profile: &UserProfile) {
        let id = profile.user_id();
        match self.store.user_exists(id).await {
            Ok(true) => self.touch_activity(id).await,
            Ok(false) => {
                if let Err(e) = self.upsert_user(profile).await {
                    tracing::warn!(user_id = id.0, kind = e.kind(), error = %e, "user registration failed");
                } else {
                    tracing::info!(user_id = id.0, "new user registered");
                }
            }
            Err(e) => {
                tracing::warn!(user_id = id.0, kind = e.kind(), error = %e, "user lookup failed");
            }
        }
    }

    /// Allow-list membership or the stored flag. Storage failures read as
    /// "not an admin" unless the allow-list already says yes.
    pub async fn is_admin(&self, id: UserId) -> bool {
        if self.admin_ids.contains(&id.0) {
            return true;
        }
        self.store
            .user_admin_flag(id)
            .await
            .or_log_default("user_admin_flag")
    }

    pub async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<()> {
        self.store.set_admin(id, is_admin).await?;
        tracing::info!(user_id = id.0, is_admin, "admin flag updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::Error, store::SqliteStore};

    fn profile(id: i64) -> UserProfile {
        UserProfile {
            id,
            username: Some(format!("user{id}")),
            first_name: None,
            last_name: None,
        }
    }

    async fn directory() -> (Arc<dyn Store>, UserDirectory) {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().await.unwrap());
        let dir = UserDirectory::new(store.clone(), vec![900]);
        (store, dir)
    }

    #[tokio::test]
    async fn allow_list_dominates_stored_flag() {
        let (_store, dir) = directory().await;
        dir.upsert_user(&profile(900)).await.unwrap();
        dir.upsert_user(&profile(5)).await.unwrap();

        assert!(dir.is_admin(UserId(900)).await);
        assert!(!dir.is_admin(UserId(5)).await);

        dir.set_admin(UserId(5), true).await.unwrap();
        assert!(dir.is_admin(UserId(5)).await);

        dir.set_admin(UserId(900), false).await.unwrap();
        assert!(dir.is_admin(UserId(900)).await);

        // Allow-listed ids need no row at all.
        let (_store, dir) = directory().await;
        assert!(dir.is_admin(UserId(900)).await);
    }

    #[tokio::test]
    async fn set_admin_on_unknown_user_is_not_found() {
        let (_store, dir) = directory().await;
        assert!(matches!(
            dir.set_admin(UserId(1), true).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn observe_registers_then_touches() {
        let (store, dir) = directory().await;
        let p = profile(7);

        dir.observe(&p).await;
        assert!(dir.user_exists(UserId(7)).await.unwrap());
        let first = store.get_user(UserId(7)).await.unwrap().unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        dir.observe(&p).await;
        let second = store.get_user(UserId(7)).await.unwrap().unwrap();
        assert!(second.last_activity > first.last_activity);
        assert_eq!(second.registration_date, first.registration_date);
    }

    #[tokio::test]
    async fn button_tap_brings_back_a_deactivated_user() {
        let (store, dir) = directory().await;
        let p = profile(8);
        dir.observe(&p).await;
        store.set_user_active(UserId(8), false).await.unwrap();

        dir.observe(&p).await;
        assert!(store.get_user(UserId(8)).await.unwrap().unwrap().is_active);
    }
}
