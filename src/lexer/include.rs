// Wed Oct 14 2026 - Alex

use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    /// `#include "file"`
    Quoted,
    /// `#include <file>`
    Angled,
}

#[derive(Debug, Clone)]
pub struct IncludeFile {
    /// Name used for positions and `#pragma once` bookkeeping.
    pub name: String,
    pub text: Arc<str>,
}

/// Supplies the text of `#include` targets. The preprocessor never touches
/// the filesystem itself.
pub trait IncludeResolver: Send + Sync {
    fn resolve(&self, path: &str, kind: IncludeKind, includer: &str) -> Option<IncludeFile>;
}

/// Resolver over a fixed set of named sources.
#[derive(Debug, Clone, Default)]
pub struct MemoryIncludes {
    files: IndexMap<String, Arc<str>>,
}

impl MemoryIncludes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: &str, text: &str) -> Self {
        self.add(name, text);
        self
    }

    pub fn add(&mut self, name: &str, text: &str) {
        self.files.insert(name.to_string(), Arc::from(text));
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl IncludeResolver for MemoryIncludes {
    fn resolve(&self, path: &str, kind: IncludeKind, includer: &str) -> Option<IncludeFile> {
        if kind == IncludeKind::Quoted {
            if let Some(dir) = Path::new(includer).parent().filter(|d| !d.as_os_str().is_empty()) {
                let joined = dir.join(path).to_string_lossy().into_owned();
                if let Some(text) = self.files.get(&joined) {
                    return Some(IncludeFile { name: joined, text: text.clone() });
                }
            }
        }
        let (name, text) = self
            .files
            .get_key_value(path)
            .or_else(|| self.files.iter().find(|(name, _)| name.ends_with(&format!("/{}", path))))?;
        Some(IncludeFile {
            name: name.clone(),
            text: text.clone(),
        })
    }
}

/// Resolver reading from disk. Quoted includes look next to the including
/// file first, then every form walks the search path in order.
#[derive(Debug, Clone, Default)]
pub struct SearchPathIncludes {
    search_paths: Vec<PathBuf>,
}

impl SearchPathIncludes {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    fn read(candidate: PathBuf) -> Option<IncludeFile> {
        if !candidate.is_file() {
            return None;
        }
        match fs::read_to_string(&candidate) {
            Ok(text) => Some(IncludeFile {
                name: candidate.to_string_lossy().into_owned(),
                text: Arc::from(text),
            }),
            Err(e) => {
                log::warn!("cannot read {}: {}", candidate.display(), e);
                None
            }
        }
    }
}

impl IncludeResolver for SearchPathIncludes {
    fn resolve(&self, path: &str, kind: IncludeKind, includer: &str) -> Option<IncludeFile> {
        if kind == IncludeKind::Quoted {
            let dir = Path::new(includer).parent().unwrap_or_else(|| Path::new("."));
            if let Some(file) = Self::read(dir.join(path)) {
                return Some(file);
            }
        }
        self.search_paths
            .iter()
            .find_map(|dir| Self::read(dir.join(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_relative_lookup() {
        let includes = MemoryIncludes::new()
            .with_file("samples/header.h", "#include \"yyy/somewhere.h\"")
            .with_file("samples/yyy/somewhere.h", "typedef unsigned char xxx;");
        let found = includes
            .resolve("yyy/somewhere.h", IncludeKind::Quoted, "samples/header.h")
            .unwrap();
        assert_eq!(found.name, "samples/yyy/somewhere.h");
    }

    #[test]
    fn test_memory_suffix_lookup() {
        let includes = MemoryIncludes::new().with_file("/usr/include/stddef.h", "");
        assert!(includes.resolve("stddef.h", IncludeKind::Angled, "a.c").is_some());
        assert!(includes.resolve("stdio.h", IncludeKind::Angled, "a.c").is_none());
    }

    #[test]
    fn test_search_path_missing() {
        let includes = SearchPathIncludes::new(vec![PathBuf::from("/nonexistent-dir")]);
        assert!(includes.resolve("nothing.h", IncludeKind::Angled, "x.c").is_none());
    }
}
