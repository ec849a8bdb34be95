//! Registry state and its persistence.
//!
//! The state is two append-only collections: `address → public key` records
//! and the set of consumed commitments. A registration adds one entry to each,
//! and both additions become visible (and durable) together or not at all.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::commitment::Commitment;
use crate::error::RegistrationError;
use crate::ethereum::Address;
use crate::keys::PublicPoint;

/// Persisted registry: `{ records, usedCommitments }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryState {
    pub records: BTreeMap<Address, PublicPoint>,
    pub used_commitments: BTreeSet<Commitment>,
}

impl RegistryState {
    #[must_use]
    pub fn is_registered(&self, address: &Address) -> bool {
        self.records.contains_key(address)
    }

    #[must_use]
    pub fn is_commitment_used(&self, commitment: &Commitment) -> bool {
        self.used_commitments.contains(commitment)
    }

    /// Returns the state with one more registration, leaving `self` untouched.
    fn with_registration(
        &self,
        address: Address,
        public_key: PublicPoint,
        commitment: Commitment,
    ) -> Result<Self, RegistrationError> {
        if self.is_registered(&address) {
            return Err(RegistrationError::AlreadyRegistered(address));
        }
        if self.is_commitment_used(&commitment) {
            return Err(RegistrationError::ReplayedCommitment(commitment));
        }
        let mut next = self.clone();
        next.records.insert(address, public_key);
        next.used_commitments.insert(commitment);
        Ok(next)
    }
}

/// Storage owned by a registrar.
pub trait RegistryStore {
    fn state(&self) -> &RegistryState;

    /// Records `address → public_key` and consumes `commitment` as one unit.
    ///
    /// On error nothing is recorded.
    fn commit(
        &mut self,
        address: Address,
        public_key: PublicPoint,
        commitment: Commitment,
    ) -> Result<(), RegistrationError>;
}

/// Volatile store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: RegistryState,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_state(state: RegistryState) -> Self {
        Self { state }
    }
}

impl RegistryStore for MemoryStore {
    fn state(&self) -> &RegistryState {
        &self.state
    }

    fn commit(
        &mut self,
        address: Address,
        public_key: PublicPoint,
        commitment: Commitment,
    ) -> Result<(), RegistrationError> {
        self.state = self
            .state
            .with_registration(address, public_key, commitment)?;
        Ok(())
    }
}

/// JSON file store.
///
/// Every commit takes an exclusive lock on `<registry>.lock`, re-reads the
/// registry file, applies the registration to what is on disk, then writes
/// the full next state to a temporary file in the same directory and renames
/// it over the registry file. Several processes may therefore share one
/// registry; each commit sees every earlier one.
///
/// The in-memory state is refreshed from disk on every commit attempt and
/// only includes the new registration once the rename succeeded.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    state: RegistryState,
}

fn storage_error(action: &str, path: &Path, err: impl std::fmt::Display) -> RegistrationError {
    RegistrationError::Storage(format!("failed to {action} {}: {err}", path.display()))
}

fn read_state(path: &Path) -> Result<RegistryState, RegistrationError> {
    if !path.exists() {
        return Ok(RegistryState::default());
    }
    let content = fs::read_to_string(path).map_err(|e| storage_error("read", path, e))?;
    serde_json::from_str(&content).map_err(|e| storage_error("parse", path, e))
}

impl FileStore {
    /// Opens the registry at `path`, starting empty if the file does not exist.
    ///
    /// # Errors
    /// [`RegistrationError::Storage`] if the file exists but cannot be read
    /// or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistrationError> {
        let path = path.into();
        if !path.exists() {
            debug!("No registry at {}, starting empty", path.display());
        }
        let state = read_state(&path)?;
        info!(
            "Opened registry {} with {} record(s)",
            path.display(),
            state.records.len()
        );

        let mut lock_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "registry".into());
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);

        Ok(Self {
            path,
            lock_path,
            state,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Blocks until this process holds the registry lock.
    ///
    /// The lock is released when the returned file is dropped.
    fn lock(&self) -> Result<File, RegistrationError> {
        let dir = self.directory();
        fs::create_dir_all(&dir).map_err(|e| storage_error("create directory", &dir, e))?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.lock_path)
            .map_err(|e| storage_error("open lock", &self.lock_path, e))?;
        file.lock_exclusive()
            .map_err(|e| storage_error("lock", &self.lock_path, e))?;
        Ok(file)
    }

    fn persist(&self, state: &RegistryState) -> Result<(), RegistrationError> {
        let dir = self.directory();
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| storage_error("serialize", &self.path, e))?;
        let mut tmp =
            NamedTempFile::new_in(&dir).map_err(|e| storage_error("create temp file in", &dir, e))?;
        tmp.write_all(&json)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| storage_error("write", tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| storage_error("replace", &self.path, e.error))?;

        // Make the rename itself durable.
        #[cfg(unix)]
        File::open(&dir)
            .and_then(|handle| handle.sync_all())
            .map_err(|e| storage_error("sync directory", &dir, e))?;
        Ok(())
    }
}

impl RegistryStore for FileStore {
    fn state(&self) -> &RegistryState {
        &self.state
    }

    fn commit(
        &mut self,
        address: Address,
        public_key: PublicPoint,
        commitment: Commitment,
    ) -> Result<(), RegistrationError> {
        let _lock = self.lock()?;
        let current = read_state(&self.path)?;
        if current != self.state {
            debug!("Registry {} changed on disk, reloaded", self.path.display());
        }

        let next = match current.with_registration(address, public_key, commitment) {
            Ok(next) => next,
            Err(err) => {
                self.state = current;
                return Err(err);
            }
        };
        if let Err(err) = self.persist(&next) {
            self.state = current;
            return Err(err);
        }
        self.state = next;
        Ok(())
    }
}
