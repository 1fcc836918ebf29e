//! Versioned document collections.
//!
//! Every marketplace entity is a [`Document`] stored in a named [`Collection`]. Updates carry
//! the version the caller read; a stale version is rejected instead of silently overwriting a
//! concurrent edit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Identifier newtypes share the same shape: an opaque string with a collection prefix.
macro_rules! document_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(format!(
                    "{}_{}",
                    $prefix,
                    ulid::Ulid::new().to_string().to_ascii_lowercase()
                ))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

pub(crate) use document_id;

/// A record that can live in a [`Collection`].
pub trait Document: Clone + Send + Sync + 'static {
    /// Collection name, matching the historical collection names.
    const COLLECTION: &'static str;

    fn key(&self) -> &str;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("{collection}/{id} already exists")]
    Conflict { collection: &'static str, id: String },
    #[error("{collection}/{id} not found")]
    NotFound { collection: &'static str, id: String },
    #[error("{collection}/{id} was modified concurrently (expected version {expected}, found {found})")]
    VersionMismatch {
        collection: &'static str,
        id: String,
        expected: u64,
        found: u64,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub fn not_found<T: Document>(id: &str) -> Self {
        Self::NotFound {
            collection: T::COLLECTION,
            id: id.to_string(),
        }
    }
}

/// Storage abstraction so services can be exercised against any backend.
pub trait Collection<T: Document>: Send + Sync {
    /// Insert a new document at version 1.
    fn insert(&self, document: T) -> Result<T, RepositoryError>;

    /// Insert unless a stored document `clashes` with the new one. The check and the write
    /// happen under one lock, so two racing writers cannot both pass the check.
    fn insert_unique(
        &self,
        document: T,
        clashes: &dyn Fn(&T) -> bool,
    ) -> Result<T, RepositoryError>;

    fn fetch(&self, id: &str) -> Result<Option<T>, RepositoryError>;

    /// Versioned update that is also refused when another document `clashes`. The document
    /// being replaced is never compared with itself.
    fn update_unique(
        &self,
        document: T,
        expected_version: u64,
        clashes: &dyn Fn(&T) -> bool,
    ) -> Result<T, RepositoryError>;

    /// Replace a document if its stored version still equals `expected_version`.
    fn update(&self, document: T, expected_version: u64) -> Result<T, RepositoryError>;

    /// Apply several updates atomically: either every version matches and all are written,
    /// or nothing is.
    fn update_many(&self, documents: Vec<(T, u64)>) -> Result<Vec<T>, RepositoryError>;

    fn delete(&self, id: &str) -> Result<T, RepositoryError>;

    fn scan(&self) -> Result<Vec<T>, RepositoryError>;

    fn get(&self, id: &str) -> Result<T, RepositoryError> {
        self.fetch(id)?
            .ok_or_else(|| RepositoryError::not_found::<T>(id))
    }
}

/// Mutex-guarded in-process collection.
pub struct MemoryCollection<T: Document> {
    documents: Arc<Mutex<HashMap<String, T>>>,
}

impl<T: Document> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self {
            documents: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T: Document> Clone for MemoryCollection<T> {
    fn clone(&self) -> Self {
        Self {
            documents: Arc::clone(&self.documents),
        }
    }
}

impl<T: Document> MemoryCollection<T> {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, T>>, RepositoryError> {
        self.documents
            .lock()
            .map_err(|_| RepositoryError::Unavailable(format!("{} mutex poisoned", T::COLLECTION)))
    }
}

fn find_clash<T: Document>(
    documents: &HashMap<String, T>,
    own_key: &str,
    clashes: &dyn Fn(&T) -> bool,
) -> Result<(), RepositoryError> {
    match documents
        .values()
        .find(|stored| stored.key() != own_key && clashes(stored))
    {
        Some(existing) => Err(RepositoryError::Conflict {
            collection: T::COLLECTION,
            id: existing.key().to_string(),
        }),
        None => Ok(()),
    }
}

fn check_version<T: Document>(
    stored: Option<&T>,
    id: &str,
    expected: u64,
) -> Result<(), RepositoryError> {
    let stored = stored.ok_or_else(|| RepositoryError::not_found::<T>(id))?;
    if stored.version() != expected {
        return Err(RepositoryError::VersionMismatch {
            collection: T::COLLECTION,
            id: id.to_string(),
            expected,
            found: stored.version(),
        });
    }
    Ok(())
}

impl<T: Document> Collection<T> for MemoryCollection<T> {
    fn insert(&self, mut document: T) -> Result<T, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.contains_key(document.key()) {
            return Err(RepositoryError::Conflict {
                collection: T::COLLECTION,
                id: document.key().to_string(),
            });
        }
        document.set_version(1);
        guard.insert(document.key().to_string(), document.clone());
        Ok(document)
    }

    fn insert_unique(
        &self,
        mut document: T,
        clashes: &dyn Fn(&T) -> bool,
    ) -> Result<T, RepositoryError> {
        let mut guard = self.lock()?;
        find_clash(&guard, "", clashes)?;
        if guard.contains_key(document.key()) {
            return Err(RepositoryError::Conflict {
                collection: T::COLLECTION,
                id: document.key().to_string(),
            });
        }
        document.set_version(1);
        guard.insert(document.key().to_string(), document.clone());
        Ok(document)
    }

    fn fetch(&self, id: &str) -> Result<Option<T>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.get(id).cloned())
    }

    fn update(&self, mut document: T, expected_version: u64) -> Result<T, RepositoryError> {
        let mut guard = self.lock()?;
        let id = document.key().to_string();
        check_version(guard.get(&id), &id, expected_version)?;
        document.set_version(expected_version + 1);
        guard.insert(id, document.clone());
        Ok(document)
    }

    fn update_unique(
        &self,
        mut document: T,
        expected_version: u64,
        clashes: &dyn Fn(&T) -> bool,
    ) -> Result<T, RepositoryError> {
        let mut guard = self.lock()?;
        let id = document.key().to_string();
        check_version(guard.get(&id), &id, expected_version)?;
        find_clash(&guard, &id, clashes)?;
        document.set_version(expected_version + 1);
        guard.insert(id, document.clone());
        Ok(document)
    }

    fn update_many(&self, documents: Vec<(T, u64)>) -> Result<Vec<T>, RepositoryError> {
        let mut guard = self.lock()?;
        for (document, expected) in &documents {
            check_version(guard.get(document.key()), document.key(), *expected)?;
        }

        let mut written = Vec::with_capacity(documents.len());
        for (mut document, expected) in documents {
            document.set_version(expected + 1);
            guard.insert(document.key().to_string(), document.clone());
            written.push(document);
        }
        Ok(written)
    }

    fn delete(&self, id: &str) -> Result<T, RepositoryError> {
        let mut guard = self.lock()?;
        guard
            .remove(id)
            .ok_or_else(|| RepositoryError::not_found::<T>(id))
    }

    fn scan(&self) -> Result<Vec<T>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.values().cloned().collect())
    }
}
