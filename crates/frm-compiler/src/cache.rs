//! On-disk caches.
//!
//! [`FileCache`] keeps the parse of every formula file the compiler has
//! read, keyed by path and invalidated by modification time. Its index is
//! saved as JSON in the cache directory so a new process starts warm;
//! reading or writing the index is best effort.
//!
//! [`artifact_hash`] names compiled artifacts after the generated code and
//! the command that builds it, so identical code is only ever compiled once.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use frm_ast::Formlist;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{CompilerError, Result};

/// File name of the persisted file cache index.
pub const INDEX_FILE: &str = "fc_index.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    /// `None` for inline sources, which never go stale.
    modified: Option<SystemTime>,
    hash: String,
    formlist: Formlist,
}

/// Parsed formula files by path.
#[derive(Debug, Default)]
pub struct FileCache {
    entries: IndexMap<PathBuf, Entry>,
    index: Option<PathBuf>,
    parses: usize,
}

impl FileCache {
    /// A cache persisted in `dir`, starting from the saved index if one can
    /// be read.
    pub fn open(dir: &Path) -> Self {
        let index = dir.join(INDEX_FILE);
        let entries = match fs::read_to_string(&index) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(index = %index.display(), error = %e, "ignoring unreadable file cache index");
                    IndexMap::new()
                }
            },
            Err(_) => IndexMap::new(),
        };
        debug!(entries = entries.len(), "opened file cache");
        Self {
            entries,
            index: Some(index),
            parses: 0,
        }
    }

    /// Parsed contents of `path`, reparsing only when the file changed.
    pub fn get(&mut self, path: &Path) -> Result<&Formlist> {
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| CompilerError::io(path, e))?;
        let fresh = self
            .entries
            .get(path)
            .is_some_and(|entry| entry.modified == Some(modified));
        if !fresh {
            let source = fs::read_to_string(path).map_err(|e| CompilerError::io(path, e))?;
            let formlist = self.parse(&path.display().to_string(), &source)?;
            debug!(path = %path.display(), formulas = formlist.formulas.len(), "loaded formula file");
            self.entries.insert(
                path.to_path_buf(),
                Entry {
                    modified: Some(modified),
                    hash: content_hash(&source),
                    formlist,
                },
            );
            self.save();
        }
        self.lookup(path)
    }

    /// Add source text that does not live on disk under a made-up path.
    pub fn insert_inline(&mut self, path: &Path, source: &str) -> Result<&Formlist> {
        let formlist = self.parse(&path.display().to_string(), source)?;
        self.entries.insert(
            path.to_path_buf(),
            Entry {
                modified: None,
                hash: content_hash(source),
                formlist,
            },
        );
        self.lookup(path)
    }

    /// Contents of an entry without touching the file system.
    pub fn cached(&self, path: &Path) -> Option<&Formlist> {
        self.entries.get(path).map(|e| &e.formlist)
    }

    /// SHA-256 of the source an entry was parsed from.
    pub fn content_hash(&self, path: &Path) -> Option<&str> {
        self.entries.get(path).map(|e| e.hash.as_str())
    }

    /// Paths of inline entries.
    pub fn inline_paths(&self) -> impl Iterator<Item = &Path> {
        self.entries
            .iter()
            .filter(|(_, e)| e.modified.is_none())
            .map(|(p, _)| p.as_path())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Files parsed by this cache since it was opened.
    pub fn parses(&self) -> usize {
        self.parses
    }

    /// Forget every entry and delete the saved index.
    pub fn clear(&mut self) {
        self.entries.clear();
        if let Some(index) = &self.index {
            if let Err(e) = fs::remove_file(index) {
                debug!(index = %index.display(), error = %e, "no file cache index to remove");
            }
        }
    }

    fn parse(&mut self, file: &str, source: &str) -> Result<Formlist> {
        self.parses += 1;
        frm_parser::parse(source).map_err(|source| CompilerError::Preprocess {
            file: file.to_string(),
            source,
        })
    }

    fn lookup(&self, path: &Path) -> Result<&Formlist> {
        self.cached(path)
            .ok_or_else(|| CompilerError::NotFound(path.display().to_string()))
    }

    /// Inline entries are not saved; their paths mean nothing to another
    /// process.
    fn save(&self) {
        let Some(index) = &self.index else {
            return;
        };
        let on_disk: IndexMap<&PathBuf, &Entry> = self
            .entries
            .iter()
            .filter(|(_, e)| e.modified.is_some())
            .collect();
        let result = serde_json::to_string(&on_disk)
            .map_err(|e| e.to_string())
            .and_then(|text| fs::write(index, text).map_err(|e| e.to_string()));
        if let Err(e) = result {
            warn!(index = %index.display(), error = %e, "could not save file cache index");
        }
    }
}

fn content_hash(source: &str) -> String {
    format!("{:x}", Sha256::digest(source.as_bytes()))
}

/// Cache key of a compiled artifact: SHA-256 over the generated source, the
/// compiler executable, its flags and the link libraries.
pub fn artifact_hash(source: &str, cc: &str, flags: &[String], libs: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([0]);
    hasher.update(cc.as_bytes());
    for part in flags.iter().chain(std::iter::once(&String::new())).chain(libs) {
        hasher.update([0]);
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(s: &[&str]) -> Vec<String> {
        s.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn test_artifact_hash_covers_the_command() {
        let flags = strings(&["-O2", "-shared"]);
        let libs = strings(&["-lm"]);
        let base = artifact_hash("int x;", "cc", &flags, &libs);
        assert_eq!(base.len(), 64);
        assert_eq!(base, artifact_hash("int x;", "cc", &flags, &libs));
        assert_ne!(base, artifact_hash("int y;", "cc", &flags, &libs));
        assert_ne!(base, artifact_hash("int x;", "gcc", &flags, &libs));
        assert_ne!(base, artifact_hash("int x;", "cc", &strings(&["-O2"]), &libs));
        assert_ne!(base, artifact_hash("int x;", "cc", &flags, &[]));
    }

    #[test]
    fn test_flags_and_libs_do_not_blur() {
        let a = artifact_hash("", "cc", &strings(&["-lm"]), &[]);
        let b = artifact_hash("", "cc", &[], &strings(&["-lm"]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_inline_entries() {
        let mut cache = FileCache::default();
        let path = Path::new("__inline__0.frm");
        let formlist = cache
            .insert_inline(path, "a {\nloop:\nz = z*z\n}\nb {\n}")
            .unwrap();
        assert_eq!(formlist.names().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(cache.inline_paths().collect::<Vec<_>>(), [path]);
        assert_eq!(cache.content_hash(path).map(str::len), Some(64));
        assert_eq!(cache.parses(), 1);
    }

    #[test]
    fn test_inline_preprocessor_errors_name_the_source() {
        let mut cache = FileCache::default();
        let err = cache
            .insert_inline(Path::new("__inline__0.frm"), "$IFDEF\nx {\n}")
            .unwrap_err();
        assert!(matches!(err, CompilerError::Preprocess { .. }));
        assert!(err.to_string().starts_with("__inline__0.frm:1"));
    }
}
