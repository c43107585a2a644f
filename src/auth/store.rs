use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::token::CredentialPair;

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

const TOKEN_FILE_NAME: &str = "tokens.toml";
const TOKEN_FILE_VERSION: u32 = 1;

/// Durable storage for the access/refresh token pair.
///
/// Tokens are opaque; implementations never inspect them. Mutators write
/// through before returning.
pub trait TokenStore: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn set_access_token(&self, token: &str) -> Result<(), AuthError>;
    fn refresh_token(&self) -> Option<String>;
    fn set_refresh_token(&self, token: &str) -> Result<(), AuthError>;
    /// Remove both tokens.
    fn clear(&self) -> Result<(), AuthError>;

    fn has_access_token(&self) -> bool {
        self.access_token().is_some()
    }

    fn credentials(&self) -> CredentialPair {
        CredentialPair {
            access_token: self.access_token(),
            refresh_token: self.refresh_token(),
        }
    }
}

/// In-process token store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with both tokens.
    pub fn with_tokens(access_token: &str, refresh_token: &str) -> Self {
        let store = Self::new();
        {
            let mut entries = store.lock();
            entries.insert(ACCESS_TOKEN_KEY.to_string(), access_token.to_string());
            entries.insert(REFRESH_TOKEN_KEY.to_string(), refresh_token.to_string());
        }
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        self.lock().get(ACCESS_TOKEN_KEY).cloned()
    }

    fn set_access_token(&self, token: &str) -> Result<(), AuthError> {
        self.lock()
            .insert(ACCESS_TOKEN_KEY.to_string(), token.to_string());
        Ok(())
    }

    fn refresh_token(&self) -> Option<String> {
        self.lock().get(REFRESH_TOKEN_KEY).cloned()
    }

    fn set_refresh_token(&self, token: &str) -> Result<(), AuthError> {
        self.lock()
            .insert(REFRESH_TOKEN_KEY.to_string(), token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        let mut entries = self.lock();
        entries.remove(ACCESS_TOKEN_KEY);
        entries.remove(REFRESH_TOKEN_KEY);
        Ok(())
    }
}

/// File-backed token store: one TOML file with a key per token.
///
/// # Example
/// ```no_run
/// use autopart::auth::{FileTokenStore, TokenStore};
///
/// let store = FileTokenStore::new("/tmp/autopart");
/// store.set_access_token("access")?;
/// assert!(store.has_access_token());
/// # Ok::<(), autopart::auth::AuthError>(())
/// ```
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join(TOKEN_FILE_NAME),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, String>, AuthError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new())
            }
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        let file: TokenFile = toml::from_str(&raw)?;
        if file.version != TOKEN_FILE_VERSION {
            return Err(AuthError::UnsupportedVersion(file.version));
        }
        Ok(file.entries)
    }

    fn get(&self, key: &str) -> Option<String> {
        match self.read() {
            Ok(mut entries) => entries.remove(key),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to read token file");
                None
            }
        }
    }

    /// Entries to build the next write on. An unparseable or foreign-version
    /// file is dropped with a warning; only I/O failures are fatal.
    fn load_for_update(&self) -> Result<BTreeMap<String, String>, AuthError> {
        match self.read() {
            Ok(entries) => Ok(entries),
            Err(err @ AuthError::Io(_)) => Err(err),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "discarding unreadable token file");
                Ok(BTreeMap::new())
            }
        }
    }

    fn update(
        &self,
        mutate: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), AuthError> {
        let _guard = self.lock();
        let mut entries = self.load_for_update()?;
        mutate(&mut entries);
        if entries.is_empty() {
            return self.remove_file();
        }
        self.persist(entries)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove_file(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Replace the token file via a per-process staging file and a rename,
    /// so readers never observe a half-written file.
    fn persist(&self, entries: BTreeMap<String, String>) -> Result<(), AuthError> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = TokenFile {
            version: TOKEN_FILE_VERSION,
            saved_at: Utc::now(),
            entries,
        };
        let serialized = toml::to_string(&file)?;

        let staging = self
            .path
            .with_extension(format!("toml.{}.tmp", std::process::id()));
        let written = write_owner_only(&staging, serialized.as_bytes())
            .and_then(|()| fs::rename(&staging, &self.path));
        if written.is_err() {
            let _ = fs::remove_file(&staging);
        }
        written.map_err(AuthError::from)
    }
}

impl TokenStore for FileTokenStore {
    fn access_token(&self) -> Option<String> {
        self.get(ACCESS_TOKEN_KEY)
    }

    fn set_access_token(&self, token: &str) -> Result<(), AuthError> {
        self.update(|entries| {
            entries.insert(ACCESS_TOKEN_KEY.to_string(), token.to_string());
        })
    }

    fn refresh_token(&self) -> Option<String> {
        self.get(REFRESH_TOKEN_KEY)
    }

    fn set_refresh_token(&self, token: &str) -> Result<(), AuthError> {
        self.update(|entries| {
            entries.insert(REFRESH_TOKEN_KEY.to_string(), token.to_string());
        })
    }

    /// Drops the whole file; a corrupt file never blocks logout.
    fn clear(&self) -> Result<(), AuthError> {
        let _guard = self.lock();
        self.remove_file()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    version: u32,
    saved_at: DateTime<Utc>,
    entries: BTreeMap<String, String>,
}

fn write_owner_only(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path)?;
    // `mode` only applies on create; a leftover staging file keeps its bits.
    #[cfg(unix)]
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(data)?;
    file.sync_all()
}
