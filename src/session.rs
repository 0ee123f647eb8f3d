use std::sync::Arc;

use chrono::Utc;
use rand::rngs::{OsRng, SmallRng};
use rand::{Rng, RngCore, SeedableRng};

use crate::storage::{KeyValueStore, StorageError};

/// Supplies the per-user identifier that correlates conversation turns with
/// the webhook backend.
#[derive(Clone)]
pub struct SessionIdProvider {
    store: Option<Arc<dyn KeyValueStore>>,
    storage_key: String,
}

impl SessionIdProvider {
    /// `store` is `None` when the process has nowhere to persist state.
    pub fn new(store: Option<Arc<dyn KeyValueStore>>, storage_key: impl Into<String>) -> Self {
        Self {
            store,
            storage_key: storage_key.into(),
        }
    }

    /// Persisted identifier, created and stored on first use.
    ///
    /// Returns an empty string when no persistent storage is available.
    pub fn session_id(&self) -> String {
        let Some(store) = &self.store else {
            return String::new();
        };

        match store.get_item(&self.storage_key) {
            Ok(Some(existing)) if !existing.is_empty() => return existing,
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "could not read session id, generating a new one");
            }
        }

        let session_id = generate_session_id();
        match store.set_item(&self.storage_key, &session_id) {
            Ok(()) => tracing::info!(session_id = %session_id, "created chat session"),
            Err(err) => {
                tracing::warn!(error = %err, "could not persist session id");
            }
        }
        session_id
    }

    /// Forget the persisted identifier so the next call starts a new session.
    pub fn reset(&self) -> Result<(), StorageError> {
        match &self.store {
            Some(store) => store.remove_item(&self.storage_key),
            None => Ok(()),
        }
    }
}

/// Random v4 UUID from the OS generator, or a timestamp with a random
/// suffix when the OS generator is unavailable.
pub fn generate_session_id() -> String {
    random_uuid().unwrap_or_else(fallback_session_id)
}

fn random_uuid() -> Option<String> {
    let mut bytes = [0u8; 16];
    OsRng.try_fill_bytes(&mut bytes).ok()?;
    Some(uuid::Builder::from_random_bytes(bytes).into_uuid().to_string())
}

fn fallback_session_id() -> String {
    let now = Utc::now();
    let millis = now.timestamp_millis();
    let seed = now.timestamp_nanos_opt().unwrap_or(millis) as u64;
    let suffix: u64 = SmallRng::seed_from_u64(seed).r#gen();
    format!("{}-{:x}", millis, suffix)
}
