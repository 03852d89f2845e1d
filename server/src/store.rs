use std::{
    fs::{self, DirEntry},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use walkdir::WalkDir;

use crate::{archive::ArchiveSink, description, error::StoreError, paths::PathResolver};

/// Category name for files sitting directly in the store root.
pub const UNCATEGORIZED: &str = "Uncategorized";

// -----------------------------------------------------------------------------
// Types
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScriptEntry {
    pub name: String,
    /// Root-relative, `/`-separated; the stable identifier of the script.
    pub path: String,
    pub category: String,
    pub extension: String,
    pub size: u64,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Category {
    pub name: String,
    pub scripts: Vec<ScriptEntry>,
}

/// File-backed script repository.
///
/// The directory tree is the only state: every `list` re-walks it and
/// re-reads file headers, nothing is cached. A cache added here must be
/// invalidated by `write` and `delete`.
#[derive(Debug, Clone)]
pub struct ScriptStore {
    resolver: PathResolver,
}

impl ScriptStore {
    /// Opens the store at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> std::io::Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            resolver: PathResolver::new(root.as_ref())?,
        })
    }

    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    // -------------------------------------------
    // Listing
    // -------------------------------------------

    pub fn list(&self) -> Result<Vec<Category>, StoreError> {
        let mut categories = Vec::new();
        let mut uncategorized = Vec::new();

        for item in fs::read_dir(self.root())? {
            let Some(item) = visible(item) else { continue };
            let Ok(kind) = item.file_type() else { continue };

            if kind.is_file() {
                let name = item.file_name().to_string_lossy().into_owned();
                if let Some(entry) = self.entry_for(&item.path(), &name, UNCATEGORIZED) {
                    uncategorized.push(entry);
                }
            } else if kind.is_dir() {
                let category = item.file_name().to_string_lossy().into_owned();
                let scripts = self.scan_category(&item.path(), &category);
                if !scripts.is_empty() {
                    categories.push(Category {
                        name: category,
                        scripts,
                    });
                }
            }
        }

        if !uncategorized.is_empty() {
            categories.push(Category {
                name: UNCATEGORIZED.to_string(),
                scripts: uncategorized,
            });
        }

        Ok(categories)
    }

    fn scan_category(&self, dir: &Path, category: &str) -> Vec<ScriptEntry> {
        let items = match fs::read_dir(dir) {
            Ok(items) => items,
            Err(e) => {
                warn!("Skipping category {}: {}", category, e);
                return Vec::new();
            }
        };

        items
            .filter_map(visible)
            .filter(|item| item.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|item| {
                let name = item.file_name().to_string_lossy().into_owned();
                self.entry_for(&item.path(), &format!("{}/{}", category, name), category)
            })
            .collect()
    }

    fn entry_for(&self, full: &Path, relative: &str, category: &str) -> Option<ScriptEntry> {
        let meta = match fs::metadata(full) {
            Ok(m) => m,
            Err(e) => {
                warn!("Skipping {} during listing: {}", relative, e);
                return None;
            }
        };

        let name = relative.rsplit('/').next().unwrap_or(relative).to_string();

        Some(ScriptEntry {
            extension: extension_of(&name),
            name,
            path: relative.to_string(),
            category: category.to_string(),
            size: meta.len(),
            updated_at: meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now()),
            description: description::from_file(full),
        })
    }

    // -------------------------------------------
    // Read / write / delete
    // -------------------------------------------

    /// Full text of a script. Containment violations look like a missing file.
    pub fn read(&self, identifier: &str) -> Result<String, StoreError> {
        let full = self
            .resolver
            .resolve(identifier)
            .map_err(|_| StoreError::NotFound)?;

        if !full.is_file() {
            return Err(StoreError::NotFound);
        }

        let bytes = fs::read(&full)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Creates or replaces a script. Last writer wins.
    pub fn write(&self, identifier: &str, text: &str) -> Result<(), StoreError> {
        let full = self.resolver.resolve(identifier)?;

        self.replace_file(&full, text.as_bytes()).map_err(|e| {
            error!("Save failed for {}: {}", identifier, e);
            StoreError::Io(e)
        })
    }

    /// Writes into a hidden sibling and renames it over the target, so
    /// readers and concurrent writers only ever see whole files.
    fn replace_file(&self, full: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let parent = full.parent().unwrap_or(self.root());
        fs::create_dir_all(parent)?;

        let tmp = temp_sibling(full);
        let result = fs::File::create(&tmp)
            .and_then(|mut f| {
                f.write_all(bytes)?;
                f.sync_all()
            })
            .and_then(|_| fs::rename(&tmp, full));

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    /// Removes a script. Empty parent directories are left in place.
    pub fn delete(&self, identifier: &str) -> Result<(), StoreError> {
        let full = self.resolver.resolve(identifier)?;

        if !full.is_file() {
            return Err(StoreError::NotFound);
        }

        fs::remove_file(&full).map_err(|e| {
            error!("Delete failed for {}: {}", identifier, e);
            StoreError::Io(e)
        })
    }

    // -------------------------------------------
    // Export
    // -------------------------------------------

    /// Streams every visible file under the root into `sink`, recursively,
    /// named by root-relative path.
    pub fn export<S: ArchiveSink>(&self, sink: &mut S) -> Result<usize, StoreError> {
        let mut files = 0;
        let walker = WalkDir::new(self.root())
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(&e.file_name().to_string_lossy()));

        for entry in walker {
            let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
            let Some(name) = self.resolver.relative(entry.path()) else {
                continue;
            };

            if entry.file_type().is_dir() {
                sink.add_directory(&name)?;
            } else if entry.file_type().is_file() {
                sink.add_file(&name, &fs::read(entry.path())?)?;
                files += 1;
            }
        }

        Ok(files)
    }
}

/// Where a new script lands: the root for `Uncategorized` or no category,
/// otherwise `category/filename`.
pub fn target_path(category: Option<&str>, filename: &str) -> String {
    match category.map(str::trim) {
        None | Some("") | Some(UNCATEGORIZED) => filename.to_string(),
        Some(cat) => format!("{}/{}", cat.trim_end_matches('/'), filename),
    }
}

fn visible(item: std::io::Result<DirEntry>) -> Option<DirEntry> {
    let item = item.ok()?;
    if is_hidden(&item.file_name().to_string_lossy()) {
        None
    } else {
        Some(item)
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn temp_sibling(full: &Path) -> PathBuf {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    let name = full
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    full.with_file_name(format!(".{}.{}.tmp", name, suffix))
}
