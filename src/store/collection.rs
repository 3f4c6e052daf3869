//! Collection - a directory of one-file-per-document JSON records
//!
//! ## Layout
//!
//! ```text
//! <root>/<database>/<collection>/<id>.json
//! ```
//!
//! Every write goes to a hidden temp file in the collection directory, is
//! synced, and is then renamed into place. Readers either see a complete
//! document or no document at all.

use std::cmp::Ordering;
use std::fs;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

use super::{Document, Query, ID_FIELD};
use crate::value::Value;
use crate::{Error, Result};

const DOCUMENT_EXTENSION: &str = "json";

/// A named set of documents stored as JSON files in one directory.
///
/// All read operations scan the whole directory and re-parse every file.
/// There is no cache and no index: a collection holds one document per
/// simulation timestep, hundreds to low thousands of files.
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    path: PathBuf,
}

impl Collection {
    pub(crate) fn open(name: &str, path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&path)?;
        Ok(Self {
            name: name.to_string(),
            path,
        })
    }

    /// Collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the documents.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of documents currently persisted.
    ///
    /// # Errors
    ///
    /// Returns error if the collection directory cannot be listed
    pub fn len(&self) -> Result<usize> {
        Ok(self.document_paths()?.len())
    }

    /// Check if the collection holds no documents.
    ///
    /// # Errors
    ///
    /// Returns error if the collection directory cannot be listed
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Persist a document and return its id.
    ///
    /// A document without `_id` gets the first free id counting up from
    /// `len() + 1`. The id is reserved by an atomic no-clobber rename, so two
    /// writers racing on one collection never share an id. A caller-supplied
    /// id replaces any existing document of the same id.
    ///
    /// On success `doc` carries its `_id`.
    ///
    /// # Errors
    ///
    /// Returns error if the id is not usable as a file name or the write fails
    pub fn insert(&self, doc: &mut Document) -> Result<Value> {
        if let Some(id) = doc.id() {
            let id = id.clone();
            let target = self.document_path(&file_stem(&id)?);
            let tmp = self.write_temp(doc)?;
            tmp.persist(&target).map_err(|e| Error::Persist {
                path: target.clone(),
                source: e.error,
            })?;
            tracing::debug!(collection = %self.name, id = %id, "Inserted document");
            return Ok(id);
        }

        let mut candidate = self.len()? + 1;
        loop {
            let id = Value::Text(candidate.to_string());
            let target = self.document_path(&candidate.to_string());
            doc.insert(ID_FIELD, id.clone());

            let tmp = match self.write_temp(doc) {
                Ok(tmp) => tmp,
                Err(e) => {
                    doc.remove(ID_FIELD);
                    return Err(e);
                }
            };
            match tmp.persist_noclobber(&target) {
                Ok(_) => {
                    tracing::debug!(collection = %self.name, id = %id, "Inserted document");
                    return Ok(id);
                }
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                    candidate += 1;
                }
                Err(e) => {
                    doc.remove(ID_FIELD);
                    return Err(Error::Persist {
                        path: target,
                        source: e.error,
                    });
                }
            }
        }
    }

    /// First document matching `query`, in scan order.
    ///
    /// # Errors
    ///
    /// Returns error if the collection directory cannot be listed
    pub fn find_one(&self, query: &Query) -> Result<Option<Document>> {
        Ok(self
            .scan()?
            .map(|(_, doc)| doc)
            .find(|doc| query.matches(doc)))
    }

    /// Every document matching `query`.
    ///
    /// # Errors
    ///
    /// Returns error if the collection directory cannot be listed
    pub fn find_all(&self, query: &Query) -> Result<Vec<Document>> {
        Ok(self
            .scan()?
            .map(|(_, doc)| doc)
            .filter(|doc| query.matches(doc))
            .collect())
    }

    /// Every document in the collection.
    ///
    /// # Errors
    ///
    /// Returns error if the collection directory cannot be listed
    pub fn find(&self) -> Result<Vec<Document>> {
        self.find_all(&Query::new())
    }

    /// The matching document with the latest `_scraped_at`.
    ///
    /// Documents without a parseable `_scraped_at` are ignored. On a tie the
    /// document scanned last wins.
    ///
    /// # Errors
    ///
    /// Returns error if the collection directory cannot be listed
    pub fn find_most_recent_matching(&self, query: &Query) -> Result<Option<Document>> {
        let mut latest: Option<(DateTime<Utc>, Document)> = None;
        for (at, doc) in self.timestamped(query)? {
            if latest.as_ref().map_or(true, |(best, _)| at >= *best) {
                latest = Some((at, doc));
            }
        }
        Ok(latest.map(|(_, doc)| doc))
    }

    /// Every matching document sharing the latest `_scraped_at`.
    ///
    /// # Errors
    ///
    /// Returns error if the collection directory cannot be listed
    pub fn find_most_recent_matching_set(&self, query: &Query) -> Result<Vec<Document>> {
        let mut latest: Option<DateTime<Utc>> = None;
        let mut docs = Vec::new();
        for (at, doc) in self.timestamped(query)? {
            match latest.map(|best| at.cmp(&best)) {
                Some(Ordering::Less) => {}
                Some(Ordering::Equal) => docs.push(doc),
                None | Some(Ordering::Greater) => {
                    latest = Some(at);
                    docs.clear();
                    docs.push(doc);
                }
            }
        }
        Ok(docs)
    }

    /// Delete the first matching document. Returns the deleted count (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns error if the collection directory cannot be listed or the
    /// matched file cannot be removed
    pub fn delete_one(&self, query: &Query) -> Result<usize> {
        for (path, doc) in self.scan()? {
            if !query.matches(&doc) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(collection = %self.name, path = %path.display(), "Deleted document");
                    return Ok(1);
                }
                // Already gone: someone else deleted it between scan and unlink.
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(0)
    }

    /// Document file names (`<id>.json`), in scan order.
    ///
    /// # Errors
    ///
    /// Returns error if the collection directory cannot be listed
    pub fn list_documents(&self) -> Result<Vec<String>> {
        Ok(self
            .document_paths()?
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect())
    }

    fn document_path(&self, stem: &str) -> PathBuf {
        self.path.join(format!("{stem}.{DOCUMENT_EXTENSION}"))
    }

    fn write_temp(&self, doc: &Document) -> Result<NamedTempFile> {
        let bytes = serde_json::to_vec(doc)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".tmp")
            .tempfile_in(&self.path)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }

    /// Document files sorted by id: numeric ids ascending, then the rest by name.
    fn document_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let is_document = path.extension().is_some_and(|ext| ext == DOCUMENT_EXTENSION)
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| !n.starts_with('.'));
            if is_document {
                paths.push(path);
            }
        }
        paths.sort_by_cached_key(|p| {
            let stem = p
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let numeric = stem.parse::<u64>().ok();
            (numeric.is_none(), numeric, stem)
        });
        Ok(paths)
    }

    /// Parse every document, skipping files that cannot be read or parsed.
    fn scan(&self) -> Result<impl Iterator<Item = (PathBuf, Document)>> {
        let name = self.name.clone();
        Ok(self
            .document_paths()?
            .into_iter()
            .filter_map(move |path| match read_document(&path) {
                Ok(doc) => Some((path, doc)),
                Err(e) => {
                    tracing::warn!(collection = %name, path = %path.display(), error = %e, "Skipping unreadable document");
                    None
                }
            }))
    }

    fn timestamped(&self, query: &Query) -> Result<impl Iterator<Item = (DateTime<Utc>, Document)>> {
        let query = query.clone();
        Ok(self
            .scan()?
            .filter(move |(_, doc)| query.matches(doc))
            .filter_map(|(_, doc)| doc.scraped_at().map(|at| (at, doc))))
    }
}

fn read_document(path: &Path) -> Result<Document> {
    let file = fs::File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// File stem for a caller-supplied id.
fn file_stem(id: &Value) -> Result<String> {
    let stem = match id {
        Value::Int(v) => return Ok(v.to_string()),
        Value::Text(s) => s.as_str(),
        other => return Err(Error::InvalidId(other.to_string())),
    };
    if stem.is_empty() || stem.starts_with('.') || stem.contains(['/', '\\', '\0']) {
        return Err(Error::InvalidId(stem.to_string()));
    }
    Ok(stem.to_string())
}
