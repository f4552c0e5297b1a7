//! Local persistence for session artifacts and the account identity.
//!
//! Artifacts are transient authentication state and live under the user's
//! cache directory, one JSON file per account. The identity is stored next
//! to them so follow-up commands can re-authenticate without re-prompting.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::AccountIdentity;
use crate::session::SessionArtifacts;

pub struct SessionStore {
    cache_dir: PathBuf,
}

impl SessionStore {
    /// Store rooted at `~/.cache/itau-sync/sessions/`.
    pub fn new() -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| Error::Store("could not find a cache directory".into()))?
            .join("itau-sync")
            .join("sessions");
        Self::with_path(cache_dir)
    }

    /// Store rooted at a custom location.
    pub fn with_path(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            Error::Store(format!(
                "failed to create session dir {}: {e}",
                cache_dir.display()
            ))
        })?;
        Ok(Self { cache_dir })
    }

    fn artifacts_file(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.json"))
    }

    fn identity_file(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.account.json"))
    }

    pub fn load(&self, identity: &AccountIdentity) -> Result<Option<SessionArtifacts>> {
        read_json(&self.artifacts_file(&identity.storage_key()))
    }

    pub fn save(&self, identity: &AccountIdentity, artifacts: &SessionArtifacts) -> Result<()> {
        write_json(&self.artifacts_file(&identity.storage_key()), artifacts)
    }

    pub fn delete(&self, identity: &AccountIdentity) -> Result<()> {
        let path = self.artifacts_file(&identity.storage_key());
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| {
                Error::Store(format!("failed to delete {}: {e}", path.display()))
            })?;
        }
        Ok(())
    }

    /// Persist the identity so later commands can re-login unattended.
    pub fn save_identity(&self, identity: &AccountIdentity) -> Result<()> {
        write_json(&self.identity_file(&identity.storage_key()), identity)
    }

    pub fn load_identity(&self, agency: &str, account: &str) -> Result<Option<AccountIdentity>> {
        let key = format!("{agency}_{account}");
        read_json(&self.identity_file(&key))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Store(format!("failed to read {}: {e}", path.display())))?;
    let value = serde_json::from_str(&content)
        .map_err(|e| Error::Store(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(value))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| Error::Store(format!("failed to serialize {}: {e}", path.display())))?;
    std::fs::write(path, content)
        .map_err(|e| Error::Store(format!("failed to write {}: {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::OperationCodes;
    use tempfile::TempDir;

    fn sample_artifacts() -> SessionArtifacts {
        SessionArtifacts {
            router_url: "https://internetpf.example/router-app/router".into(),
            client_id: "client-1".into(),
            auth_token: "token-1".into(),
            operations: OperationCodes {
                statement: Some("op-statement".into()),
                card_list: Some("op-cards".into()),
                card_detail: None,
                investments: Some("op-invest".into()),
            },
            captured_at: Some(1_700_000_000),
        }
    }

    #[test]
    fn artifacts_round_trip_including_unset_opcodes() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::with_path(dir.path()).unwrap();
        let identity = AccountIdentity::new("1234", "56789-0", "123456").unwrap();

        assert!(store.load(&identity).unwrap().is_none());

        let artifacts = sample_artifacts();
        store.save(&identity, &artifacts).unwrap();
        assert_eq!(store.load(&identity).unwrap().unwrap(), artifacts);

        store.delete(&identity).unwrap();
        assert!(store.load(&identity).unwrap().is_none());
    }

    #[test]
    fn identity_round_trips_by_agency_and_account() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::with_path(dir.path()).unwrap();
        let identity = AccountIdentity::new("1234", "56789-0", "123456").unwrap();

        store.save_identity(&identity).unwrap();
        let loaded = store.load_identity("1234", "567890").unwrap().unwrap();
        assert_eq!(loaded, identity);
    }
}
