//! Pluggable key-value storage with per-key max-age.
//!
//! The [`Storage`] contract is what the session and cart layers persist
//! through. Two adapters are provided and selected by injection:
//!
//! - [`MemoryStorage`] keeps values in process memory (tests, servers).
//! - [`CookieStorage`] persists a cookie jar to a file. Every read goes to
//!   the file, so separate instances (or processes) pointing at the same path
//!   observe each other's writes the way browser tabs share cookies. Writes
//!   hold an exclusive lock on a sibling `.lock` file, so instances never
//!   overwrite each other's read-modify-write cycles.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::error::SdkError;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by storage adapters.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing file could not be read or written.
    #[error("storage I/O error at {path}: {source}")]
    Io {
        /// Path of the backing file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The backing file does not contain a valid jar.
    #[error("corrupt storage file {path}: {source}")]
    Corrupt {
        /// Path of the backing file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

impl From<StorageError> for SdkError {
    fn from(err: StorageError) -> Self {
        SdkError::storage(err.to_string())
    }
}

/// Options for [`Storage::set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageOptions {
    /// How long the value stays readable. `None` means no expiry.
    pub max_age: Option<Duration>,
}

impl StorageOptions {
    /// Options with the given max-age.
    #[must_use]
    pub const fn max_age(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
        }
    }
}

/// Key-value storage contract.
///
/// Implementations must provide atomic per-key reads and writes; callers do
/// no additional locking. An expired value reads as absent.
pub trait Storage: Send + Sync {
    /// Returns the value for `key`, if present and not expired.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`.
    fn set(&self, key: &str, value: &str, options: StorageOptions) -> StorageResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Logical keys persisted by the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// The short-lived user (access) token.
    UserToken,
    /// The long-lived refresh token.
    RefreshToken,
    /// The logged-in username.
    Username,
    /// The logged-in customer type.
    CustomerType,
    /// Max-age policy (seconds) chosen at login.
    AuthMaxAge,
    /// The current cart ID.
    CartId,
}

impl StorageKey {
    /// Keys cleared on logout or unrecoverable session expiry.
    pub const AUTH: [Self; 5] = [
        Self::UserToken,
        Self::RefreshToken,
        Self::Username,
        Self::CustomerType,
        Self::AuthMaxAge,
    ];

    /// Returns the persisted key name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserToken => "storefront_user_token",
            Self::RefreshToken => "storefront_refresh_token",
            Self::Username => "storefront_username",
            Self::CustomerType => "storefront_customer_type",
            Self::AuthMaxAge => "storefront_auth_max_age",
            Self::CartId => "storefront_cart_id",
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory storage adapter.
///
/// Cloning is not provided; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    /// Returns `true` if no live entries remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }
        // A concurrent `set` may have replaced the entry since the check.
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    fn set(&self, key: &str, value: &str, options: StorageOptions) -> StorageResult<()> {
        // An age past the clock's range never expires.
        let expires_at = options
            .max_age
            .and_then(|age| Instant::now().checked_add(age));
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Cookie {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires: Option<DateTime<Utc>>,
}

impl Cookie {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires.map_or(true, |at| at > now)
    }
}

/// File-backed cookie jar.
///
/// Values follow cookie semantics: a zero max-age deletes the entry, and
/// expired entries are purged on the next write.
///
/// # Example
///
/// ```no_run
/// use storefront_core::storage::{CookieStorage, Storage, StorageOptions};
/// use std::time::Duration;
///
/// let jar = CookieStorage::new("/tmp/storefront-cookies.json");
/// jar.set("cart", "c-1", StorageOptions::max_age(Duration::from_secs(3600)))?;
/// assert_eq!(jar.get("cart").as_deref(), Some("c-1"));
/// # Ok::<(), storefront_core::storage::StorageError>(())
/// ```
#[derive(Debug)]
pub struct CookieStorage {
    path: PathBuf,
    lock_path: PathBuf,
}

/// Exclusive hold on a jar's lock file, released on drop.
struct JarLock {
    file: File,
}

impl Drop for JarLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl CookieStorage {
    /// Creates a jar persisted at `path`. The file is created on first write,
    /// alongside a `<name>.lock` file that serializes writers.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Self { path, lock_path }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StorageResult<BTreeMap<String, Cookie>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(StorageError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn io_err(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn lock(&self) -> StorageResult<JarLock> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| self.io_err(e))?;
        FileExt::lock_exclusive(&file).map_err(|e| self.io_err(e))?;
        Ok(JarLock { file })
    }

    fn save(&self, jar: &BTreeMap<String, Cookie>) -> StorageResult<()> {
        let content = serde_json::to_string_pretty(jar).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        // Write a private temp file, then rename over the jar so readers
        // never see a half-written one.
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_err(e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| self.io_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_err(e.error))?;
        Ok(())
    }

    fn update<F>(&self, f: F) -> StorageResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, Cookie>),
    {
        let _lock = self.lock()?;
        let mut jar = self.load()?;
        let now = Utc::now();
        jar.retain(|_, cookie| cookie.is_live(now));
        f(&mut jar);
        self.save(&jar)
    }
}

impl Storage for CookieStorage {
    fn get(&self, key: &str) -> Option<String> {
        let jar = match self.load() {
            Ok(jar) => jar,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read cookie storage");
                return None;
            }
        };
        jar.get(key)
            .filter(|cookie| cookie.is_live(Utc::now()))
            .map(|cookie| cookie.value.clone())
    }

    fn set(&self, key: &str, value: &str, options: StorageOptions) -> StorageResult<()> {
        if options.max_age == Some(Duration::ZERO) {
            return self.remove(key);
        }
        let expires = options
            .max_age
            .and_then(|age| chrono::Duration::from_std(age).ok())
            .and_then(|age| Utc::now().checked_add_signed(age));

        self.update(|jar| {
            jar.insert(
                key.to_string(),
                Cookie {
                    value: value.to_string(),
                    expires,
                },
            );
        })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.update(|jar| {
            jar.remove(key);
        })
    }
}
