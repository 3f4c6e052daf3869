//! Record Store - an embedded document database on plain directories
//!
//! Provides MongoDB-style access to JSON documents with a three-level
//! address: root → database → collection.
//!
//! ## Schema Overview
//!
//! ```text
//! Store (root dir) ──< Database (ensemble) ──< Collection (member) ──< Document (timestep)
//! ```
//!
//! Directories are created lazily on first access and never removed by the
//! store. Documents are write-once: there is insert, read and delete, but no
//! update.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use spectre_monitor::store::{Document, Query, Store};
//!
//! # fn example() -> spectre_monitor::Result<()> {
//! let store = Store::open("monitoring")?;
//! let member = store.database("test")?.collection("memb000")?;
//!
//! let mut doc = Document::from([("time_tsnumber", 72), ("dynstat_eta_max", 1)]);
//! let id = member.insert(&mut doc)?;
//!
//! let found = member.find_one(&Query::new().eq("_id", id))?;
//! assert_eq!(found, Some(doc));
//! # Ok(())
//! # }
//! ```

mod collection;
mod document;
mod query;
mod timestamp;

pub use collection::Collection;
pub use document::{Document, ID_FIELD, JOB_ID_FIELD, SCRAPED_AT_FIELD, TIMESTEP_FIELD};
pub use query::Query;
pub use timestamp::{format_scraped_at, now_scraped_at, parse_scraped_at};

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::MonitorConfig;
use crate::{Error, Result};

/// Root of a directory-backed document store.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns error if the root directory cannot be created
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "Opened store");
        Ok(Self { root })
    }

    /// Open the store named by a monitor configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the root directory cannot be created
    pub fn from_config(config: &MonitorConfig) -> Result<Self> {
        Self::open(config.dbroot())
    }

    /// Store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get (creating if needed) a database.
    ///
    /// # Errors
    ///
    /// Returns error if the name is not a single path component or the
    /// directory cannot be created
    pub fn database(&self, name: &str) -> Result<Database> {
        let path = self.root.join(validate_name(name)?);
        fs::create_dir_all(&path)?;
        Ok(Database {
            name: name.to_string(),
            path,
        })
    }

    /// Names of all databases, sorted.
    ///
    /// # Errors
    ///
    /// Returns error if the root directory cannot be listed
    pub fn list_databases(&self) -> Result<Vec<String>> {
        list_subdirectories(&self.root)
    }
}

/// A named group of collections (one ensemble).
#[derive(Debug, Clone)]
pub struct Database {
    name: String,
    path: PathBuf,
}

impl Database {
    /// Database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the collections.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get (creating if needed) a collection.
    ///
    /// # Errors
    ///
    /// Returns error if the name is not a single path component or the
    /// directory cannot be created
    pub fn collection(&self, name: &str) -> Result<Collection> {
        Collection::open(name, self.path.join(validate_name(name)?))
    }

    /// Names of all collections, sorted.
    ///
    /// # Errors
    ///
    /// Returns error if the database directory cannot be listed
    pub fn list_collections(&self) -> Result<Vec<String>> {
        list_subdirectories(&self.path)
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name == "." || name == ".." {
        "name refers to a relative directory"
    } else if name.contains(['/', '\\', '\0']) {
        "name contains a path separator"
    } else {
        return Ok(name);
    };
    Err(Error::InvalidName {
        name: name.to_string(),
        reason,
    })
}

fn list_subdirectories(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
