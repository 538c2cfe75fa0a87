//! Name checks that run before anything is written to the store.

use crate::{entry::FileEntry, error::ImportError};
use std::collections::HashMap;
use unicode_normalization::is_nfc;

pub type Batch = Vec<Box<dyn FileEntry>>;

/// Result of matching the batch against the store's current names.
pub struct StoreCollisions {
    /// Entries dropped because the store already holds the same bytes.
    pub identical: usize,
    /// Entries whose name is taken by different content. Always removed
    /// from the batch.
    pub conflicts: Vec<Box<dyn FileEntry>>,
}

impl StoreCollisions {
    pub fn conflict_names(&self) -> Vec<&str> {
        self.conflicts.iter().map(|file| file.name()).collect()
    }
}

/// Names that differ from their NFC form, or were not valid UTF-8 to
/// begin with.
pub fn find_unnormalized_names(files: &[Box<dyn FileEntry>]) -> Vec<String> {
    files
        .iter()
        .filter(|file| !file.has_exact_name() || !is_nfc(file.name()))
        .map(|file| file.name().to_string())
        .collect()
}

/// Drops repeated names whose content matches the first occurrence and
/// returns how many were dropped. Same name with different content fails.
pub fn dedupe_batch(files: &mut Batch) -> Result<usize, ImportError> {
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let mut redundant = vec![false; files.len()];

    for (index, file) in files.iter().enumerate() {
        let Some(first) = first_seen.get(file.name()).copied() else {
            first_seen.insert(file.name(), index);
            continue;
        };
        let identical = file
            .is_identical(files[first].as_ref())
            .map_err(|source| ImportError::Compare {
                name: file.name().to_string(),
                source,
            })?;
        if !identical {
            return Err(ImportError::AmbiguousName(file.name().to_string()));
        }
        redundant[index] = true;
    }

    let dropped = redundant.iter().filter(|flag| **flag).count();
    let mut index = 0;
    files.retain(|_| {
        let keep = !redundant[index];
        index += 1;
        keep
    });
    Ok(dropped)
}

/// Removes every entry whose name already exists in the store. Identical
/// content is counted; different content is handed back as a conflict.
pub fn partition_store_collisions(
    files: &mut Batch,
    existing: &HashMap<String, Box<dyn FileEntry>>,
) -> Result<StoreCollisions, ImportError> {
    let mut identical = 0;
    let mut conflicts = Vec::new();
    let mut kept = Vec::with_capacity(files.len());

    for file in std::mem::take(files) {
        let Some(stored) = existing.get(file.name()) else {
            kept.push(file);
            continue;
        };
        let same = file
            .is_identical(stored.as_ref())
            .map_err(|source| ImportError::Compare {
                name: file.name().to_string(),
                source,
            })?;
        if same {
            identical += 1;
        } else {
            conflicts.push(file);
        }
    }

    *files = kept;
    Ok(StoreCollisions {
        identical,
        conflicts,
    })
}
