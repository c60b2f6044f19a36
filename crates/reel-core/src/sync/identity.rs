//! Per-installation device identity

use std::fmt;

use crate::db::LocalStore;
use crate::Result;

/// Opaque random id of this installation, used only to recognize our own
/// writes when the relay echoes them back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    /// Generate a new random identity
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Load the persisted identity, creating and storing one on first use
    pub async fn load_or_create(store: &LocalStore) -> Result<Self> {
        if let Some(existing) = store.load_device_id().await? {
            if !existing.trim().is_empty() {
                return Ok(Self(existing));
            }
        }

        let created = Self::generate();
        store.save_device_id(created.as_str()).await?;
        tracing::info!("Generated device identity {}", created);
        Ok(created)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn device_id_is_stable_across_loads() {
        let store = LocalStore::open_in_memory().await.unwrap();

        let first = DeviceId::load_or_create(&store).await.unwrap();
        let second = DeviceId::load_or_create(&store).await.unwrap();

        assert_eq!(first, second);
        assert!(uuid::Uuid::parse_str(first.as_str()).is_ok());
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(DeviceId::generate(), DeviceId::generate());
    }
}
