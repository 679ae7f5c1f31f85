// User database: `<config_dir>/db.json`.
//
// Passwords are stored as argon2id PHC strings. Writes go through a temp file
// and rename so a crashed `droppy add` never leaves a truncated database.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fs::write_private_atomic;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub hash: String,
    #[serde(default)]
    pub privileged: bool,
}

/// Name and role of a user, without the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub name: String,
    pub privileged: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DbFile {
    #[serde(default)]
    users: BTreeMap<String, UserRecord>,
}

#[derive(Debug, Error)]
pub enum UserDbError {
    #[error("failed to read user database `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("user database `{path}` is malformed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write user database `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize user database: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error("user name must not be empty")]
    EmptyName,
}

/// In-memory view of `db.json`. Mutations are only persisted by [`UserDb::save`].
#[derive(Debug)]
pub struct UserDb {
    path: PathBuf,
    data: DbFile,
}

impl UserDb {
    /// Load the database at `path`. A missing file is an empty database.
    pub fn load(path: &Path) -> Result<Self, UserDbError> {
        let data = match std::fs::read(path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => DbFile::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|source| UserDbError::Parse { path: path.to_path_buf(), source })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DbFile::default(),
            Err(source) => return Err(UserDbError::Read { path: path.to_path_buf(), source }),
        };
        Ok(Self { path: path.to_path_buf(), data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_empty(&self) -> bool {
        self.data.users.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&UserRecord> {
        self.data.users.get(name)
    }

    /// All users ordered by name.
    pub fn users(&self) -> Vec<UserSummary> {
        self.data
            .users
            .iter()
            .map(|(name, record)| UserSummary { name: name.clone(), privileged: record.privileged })
            .collect()
    }

    /// Create or replace a user. Returns `true` when the user is new.
    pub fn add_or_update(
        &mut self,
        name: &str,
        password: &str,
        privileged: bool,
    ) -> Result<bool, UserDbError> {
        if name.is_empty() {
            return Err(UserDbError::EmptyName);
        }
        let hash = hash_password(password)?;
        let previous = self.data.users.insert(name.to_owned(), UserRecord { hash, privileged });
        Ok(previous.is_none())
    }

    /// Remove a user. Returns `false` when no such user existed.
    pub fn delete(&mut self, name: &str) -> bool {
        self.data.users.remove(name).is_some()
    }

    /// Check a password against the stored hash.
    pub fn verify(&self, name: &str, password: &str) -> bool {
        let Some(record) = self.data.users.get(name) else {
            return false;
        };
        PasswordHash::new(&record.hash)
            .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
            .unwrap_or(false)
    }

    pub fn save(&self) -> Result<(), UserDbError> {
        let mut contents =
            serde_json::to_vec_pretty(&self.data).map_err(UserDbError::Serialize)?;
        contents.push(b'\n');
        write_private_atomic(&self.path, &contents)
            .map_err(|source| UserDbError::Write { path: self.path.clone(), source })
    }
}

fn hash_password(password: &str) -> Result<String, UserDbError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|error| UserDbError::Hash(error.to_string()))
}
