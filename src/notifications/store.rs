//! Subscription storage.
//!
//! The dispatcher only needs two operations, listing a recipient's
//! subscriptions and deleting one that the push service reports gone, which
//! [`SubscriptionStore`] captures. [`FileSubscriptionStore`] is a JSON-file
//! implementation used by the CLI; registration (`subscribe`) goes through
//! its inherent methods.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::push::PushSubscription;
use super::WebPushError;

/// A subscription as kept by a store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSubscription {
    /// Store-assigned identifier.
    pub id: String,
    /// Recipient (patient or staff user) the subscription belongs to.
    pub recipient_id: String,
    /// Endpoint and client keys.
    #[serde(flatten)]
    pub subscription: PushSubscription,
    /// When the subscription was first registered.
    pub created_at: DateTime<Utc>,
}

/// Storage operations the dispatcher depends on.
#[async_trait]
pub trait SubscriptionStore: Send + Sync + std::fmt::Debug {
    /// All subscriptions registered for `recipient_id`.
    ///
    /// # Errors
    ///
    /// Returns `WebPushError::Store` if the backing storage is unreadable.
    async fn list_subscriptions(&self, recipient_id: &str) -> Result<Vec<StoredSubscription>, WebPushError>;

    /// Delete a subscription by id. Deleting an unknown id is not an error.
    ///
    /// # Errors
    ///
    /// Returns `WebPushError::Store` if the change cannot be persisted.
    async fn delete_subscription(&self, id: &str) -> Result<(), WebPushError>;
}

/// In-memory subscription set with registration rules.
///
/// A browser endpoint belongs to exactly one recipient: registering an
/// endpoint already held by someone else moves it (shared clinic devices
/// change hands), and re-registering it for the same recipient refreshes
/// the keys while keeping the id.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SubscriptionRegistry {
    subscriptions: Vec<StoredSubscription>,
}

impl SubscriptionRegistry {
    /// Add or update a subscription, returning its id.
    pub fn upsert(&mut self, recipient_id: &str, subscription: PushSubscription) -> String {
        if let Some(existing) = self
            .subscriptions
            .iter_mut()
            .find(|s| s.recipient_id == recipient_id && s.subscription.endpoint == subscription.endpoint)
        {
            existing.subscription = subscription;
            return existing.id.clone();
        }

        let before = self.subscriptions.len();
        self.subscriptions
            .retain(|s| s.subscription.endpoint != subscription.endpoint);
        if self.subscriptions.len() != before {
            log::info!(
                "[WebPush] Endpoint re-registered by recipient {}, replacing stale subscription",
                recipient_id
            );
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.subscriptions.push(StoredSubscription {
            id: id.clone(),
            recipient_id: recipient_id.to_string(),
            subscription,
            created_at: Utc::now(),
        });
        id
    }

    /// Remove a subscription by id. Returns whether it existed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Subscriptions belonging to `recipient_id`.
    pub fn for_recipient(&self, recipient_id: &str) -> Vec<StoredSubscription> {
        self.subscriptions
            .iter()
            .filter(|s| s.recipient_id == recipient_id)
            .cloned()
            .collect()
    }

    /// Look up a subscription by id.
    pub fn get(&self, id: &str) -> Option<&StoredSubscription> {
        self.subscriptions.iter().find(|s| s.id == id)
    }

    /// Number of stored subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Remove duplicate subscriptions that share the same push endpoint.
    ///
    /// Keeps the most recently registered entry per endpoint. Returns the
    /// number of duplicates removed.
    pub fn dedup_by_endpoint(&mut self) -> usize {
        let mut newest: HashMap<&str, (DateTime<Utc>, &str)> = HashMap::new();
        for sub in &self.subscriptions {
            let entry = newest
                .entry(sub.subscription.endpoint.as_str())
                .or_insert((sub.created_at, sub.id.as_str()));
            if sub.created_at >= entry.0 {
                *entry = (sub.created_at, sub.id.as_str());
            }
        }
        let keep: Vec<String> = newest.values().map(|(_, id)| (*id).to_string()).collect();

        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| keep.contains(&s.id));
        before - self.subscriptions.len()
    }
}

/// [`SubscriptionStore`] persisted as a JSON file.
///
/// The whole registry is rewritten on every change, with owner-only
/// permissions on unix since subscriptions carry auth secrets.
#[derive(Debug)]
pub struct FileSubscriptionStore {
    path: PathBuf,
    registry: Mutex<SubscriptionRegistry>,
}

impl FileSubscriptionStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut registry = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read subscriptions file {}", path.display()))?;
            serde_json::from_str::<SubscriptionRegistry>(&content)
                .context("Failed to parse subscriptions file")?
        } else {
            SubscriptionRegistry::default()
        };

        let removed = registry.dedup_by_endpoint();
        if removed > 0 {
            log::info!("[WebPush] Removed {} duplicate subscription(s) on load", removed);
            save_registry(&path, &registry)?;
        }

        log::debug!("Loaded {} push subscription(s) from {:?}", registry.len(), path);
        Ok(Self {
            path,
            registry: Mutex::new(registry),
        })
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register a subscription for `recipient_id` and persist it.
    pub async fn upsert(&self, recipient_id: &str, subscription: PushSubscription) -> Result<String> {
        anyhow::ensure!(!recipient_id.trim().is_empty(), "recipient id must not be empty");
        anyhow::ensure!(
            reqwest::Url::parse(&subscription.endpoint).is_ok(),
            "subscription endpoint is not a URL: {}",
            subscription.endpoint
        );
        subscription
            .decode_keys()
            .context("subscription keys are invalid")?;

        let mut registry = self.registry.lock().await;
        let id = registry.upsert(recipient_id, subscription);
        save_registry(&self.path, &registry)?;
        Ok(id)
    }

    /// Remove a subscription and persist. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let mut registry = self.registry.lock().await;
        let removed = registry.remove(id);
        if removed {
            save_registry(&self.path, &registry)?;
        }
        Ok(removed)
    }

    /// Total number of stored subscriptions.
    pub async fn len(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Whether no subscriptions are stored.
    pub async fn is_empty(&self) -> bool {
        self.registry.lock().await.is_empty()
    }
}

#[async_trait]
impl SubscriptionStore for FileSubscriptionStore {
    async fn list_subscriptions(&self, recipient_id: &str) -> Result<Vec<StoredSubscription>, WebPushError> {
        Ok(self.registry.lock().await.for_recipient(recipient_id))
    }

    async fn delete_subscription(&self, id: &str) -> Result<(), WebPushError> {
        self.remove(id)
            .await
            .map(|_| ())
            .map_err(|e| WebPushError::Store(format!("{e:#}")))
    }
}

fn save_registry(path: &Path, registry: &SubscriptionRegistry) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("Failed to create subscriptions directory")?;
        }
    }

    let content =
        serde_json::to_string_pretty(registry).context("Failed to serialize subscriptions")?;
    fs::write(path, content).context("Failed to write subscriptions file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms).context("Failed to set subscriptions file permissions")?;
    }

    log::debug!("Saved {} push subscription(s) to {:?}", registry.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::base64url;
    use tempfile::TempDir;

    fn sub(endpoint: &str, seed: u8) -> PushSubscription {
        let mut p256dh = [seed; 65];
        p256dh[0] = 0x04;
        PushSubscription {
            endpoint: endpoint.to_string(),
            p256dh: base64url::encode(p256dh),
            auth: base64url::encode([seed; 16]),
        }
    }

    #[test]
    fn test_registry_upsert_keeps_id_for_same_recipient() {
        let mut registry = SubscriptionRegistry::default();
        assert!(registry.is_empty());

        let id = registry.upsert("patient-1", sub("https://push.example/1", 1));
        let again = registry.upsert("patient-1", sub("https://push.example/1", 2));
        assert_eq!(id, again);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&id).unwrap().subscription, sub("https://push.example/1", 2));

        registry.upsert("patient-1", sub("https://push.example/2", 3));
        assert_eq!(registry.for_recipient("patient-1").len(), 2);
    }

    #[test]
    fn test_registry_endpoint_moves_between_recipients() {
        let mut registry = SubscriptionRegistry::default();
        let old = registry.upsert("patient-1", sub("https://push.example/shared", 1));
        let new = registry.upsert("patient-2", sub("https://push.example/shared", 1));

        assert_ne!(old, new);
        assert_eq!(registry.len(), 1);
        assert!(registry.for_recipient("patient-1").is_empty());
        assert_eq!(registry.for_recipient("patient-2")[0].id, new);
    }

    #[test]
    fn test_registry_remove() {
        let mut registry = SubscriptionRegistry::default();
        let id = registry.upsert("patient-1", sub("https://push.example/1", 1));
        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dedup_by_endpoint_keeps_newest() {
        let older = StoredSubscription {
            id: "a".to_string(),
            recipient_id: "patient-1".to_string(),
            subscription: sub("https://push.example/1", 1),
            created_at: DateTime::from_timestamp(1_000, 0).unwrap(),
        };
        let newer = StoredSubscription {
            id: "b".to_string(),
            recipient_id: "patient-2".to_string(),
            created_at: DateTime::from_timestamp(2_000, 0).unwrap(),
            ..older.clone()
        };
        let mut registry = SubscriptionRegistry {
            subscriptions: vec![newer, older],
        };

        assert_eq!(registry.dedup_by_endpoint(), 1);
        assert!(registry.get("b").is_some());
        assert!(registry.get("a").is_none());
    }

    #[test]
    fn test_stored_subscription_json_shape() {
        let stored = StoredSubscription {
            id: "id-1".to_string(),
            recipient_id: "patient-1".to_string(),
            subscription: PushSubscription {
                endpoint: "https://push.example/1".to_string(),
                p256dh: "key1".to_string(),
                auth: "auth1".to_string(),
            },
            created_at: DateTime::from_timestamp(0, 0).unwrap(),
        };
        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["recipientId"], "patient-1");
        assert_eq!(value["endpoint"], "https://push.example/1");
        assert_eq!(value["p256dh"], "key1");
    }

    #[tokio::test]
    async fn test_file_store_persists_across_opens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("subscriptions.json");

        let store = FileSubscriptionStore::open(&path).unwrap();
        assert!(store.is_empty().await);
        let id = store.upsert("patient-1", sub("https://push.example/1", 1)).await.unwrap();
        store.upsert("patient-2", sub("https://push.example/2", 2)).await.unwrap();

        let reopened = FileSubscriptionStore::open(&path).unwrap();
        assert_eq!(reopened.len().await, 2);
        let listed = reopened.list_subscriptions("patient-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);

        reopened.delete_subscription(&id).await.unwrap();
        reopened.delete_subscription("unknown").await.unwrap();
        let reopened = FileSubscriptionStore::open(&path).unwrap();
        assert!(reopened.list_subscriptions("patient-1").await.unwrap().is_empty());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn test_file_store_rejects_invalid_registrations() {
        let dir = TempDir::new().unwrap();
        let store = FileSubscriptionStore::open(dir.path().join("subs.json")).unwrap();

        assert!(store.upsert("", sub("https://push.example/1", 1)).await.is_err());
        assert!(store.upsert("patient-1", sub("not a url", 1)).await.is_err());

        let mut bad_keys = sub("https://push.example/1", 1);
        bad_keys.auth = "short".to_string();
        assert!(store.upsert("patient-1", bad_keys).await.is_err());
        assert!(store.is_empty().await);
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("subs.json");
        fs::write(&path, "not json").unwrap();
        assert!(FileSubscriptionStore::open(&path).is_err());
    }
}
