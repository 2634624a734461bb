//! Registry of open trees, keyed by tree name.
//!
//! Every structural mutation shifts rows across the whole tree, so two
//! mutations of the same tree must never interleave. The registry hands out
//! one shared `NestedSet` per name behind a `RwLock`: queries take the read
//! lock, mutations the write lock.
//!
//! # Invariants
//!
//! - Each tree name maps to exactly one `NestedSet` instance
//! - Trees are never removed once opened (for the lifetime of the registry)
//! - All tree names are validated before they reach the filesystem

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::store::{Database, StoreError};
use crate::tree::NestedSet;

/// Maximum length for a tree name.
const MAX_TREE_NAME_LENGTH: usize = 128;

/// A tree shared between callers.
pub type SharedTree = Arc<RwLock<NestedSet<Database>>>;

/// Registry of open trees, keyed by name.
pub struct TreeRegistry {
    /// Map from tree name to shared tree.
    trees: RwLock<HashMap<String, SharedTree>>,
    /// Directory holding one log file per tree.
    base_directory: PathBuf,
}

impl TreeRegistry {
    /// Create a registry storing each tree at `{base_directory}/{name}.wal`.
    #[must_use]
    pub fn new(base_directory: PathBuf) -> Self {
        Self {
            trees: RwLock::new(HashMap::new()),
            base_directory,
        }
    }

    #[must_use]
    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Get the tree with the given name, opening or creating its log file.
    #[allow(clippy::significant_drop_tightening)] // The write lock must be held across the insert
    pub fn get_or_create(&self, name: &str) -> Result<SharedTree, RegistryError> {
        validate_tree_name(name)?;

        {
            let trees = self.trees.read().map_err(|_| StoreError::LockPoisoned)?;
            if let Some(tree) = trees.get(name) {
                return Ok(Arc::clone(tree));
            }
        }

        let mut trees = self.trees.write().map_err(|_| StoreError::LockPoisoned)?;

        // Another caller may have opened it while we waited for the write lock.
        if let Some(tree) = trees.get(name) {
            return Ok(Arc::clone(tree));
        }

        let path = self.base_directory.join(format!("{name}.wal"));
        let (database, recovery_result) = Database::open_or_create(&path)?;
        if let Some(result) = recovery_result {
            tracing::info!(
                "Tree recovery for '{}': {} records scanned, {} transactions replayed, {} discarded, {} bytes truncated",
                name,
                result.records_scanned,
                result.transactions_replayed,
                result.transactions_discarded,
                result.truncated_bytes
            );
        }

        let tree = Arc::new(RwLock::new(NestedSet::new(database)));
        trees.insert(name.to_string(), Arc::clone(&tree));
        tracing::info!("Opened tree '{}'", name);
        Ok(tree)
    }

    /// Names of the trees opened so far, sorted.
    pub fn names(&self) -> Result<Vec<String>, RegistryError> {
        let trees = self.trees.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut names: Vec<String> = trees.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Error returned when validating a tree name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNameError {
    /// The name is empty.
    Empty,
    /// The name exceeds the maximum length.
    TooLong,
    /// The name contains invalid characters.
    InvalidCharacters,
}

impl fmt::Display for TreeNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "tree name must not be empty"),
            Self::TooLong => write!(
                f,
                "tree name exceeds maximum length of {MAX_TREE_NAME_LENGTH} characters"
            ),
            Self::InvalidCharacters => write!(
                f,
                "tree name contains invalid characters; only alphanumeric, hyphens, and underscores are allowed"
            ),
        }
    }
}

impl std::error::Error for TreeNameError {}

/// Validate that a tree name is safe to use as a file name.
///
/// # Examples
///
/// ```
/// use nestree::registry::validate_tree_name;
///
/// assert!(validate_tree_name("catalog-2024").is_ok());
/// assert!(validate_tree_name("org_chart").is_ok());
/// assert!(validate_tree_name("").is_err());
/// assert!(validate_tree_name("../evil").is_err());
/// ```
pub fn validate_tree_name(name: &str) -> Result<(), TreeNameError> {
    if name.is_empty() {
        return Err(TreeNameError::Empty);
    }
    if name.len() > MAX_TREE_NAME_LENGTH {
        return Err(TreeNameError::TooLong);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(TreeNameError::InvalidCharacters);
    }
    Ok(())
}

/// Errors that can occur when opening a tree.
#[derive(Debug)]
pub enum RegistryError {
    /// The tree name is not valid.
    InvalidName(TreeNameError),
    /// The tree's store could not be opened.
    Store(StoreError),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName(e) => write!(f, "invalid tree name: {e}"),
            Self::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidName(e) => Some(e),
            Self::Store(e) => Some(e),
        }
    }
}

impl From<TreeNameError> for RegistryError {
    fn from(e: TreeNameError) -> Self {
        Self::InvalidName(e)
    }
}

impl From<StoreError> for RegistryError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_validate_tree_name() {
        assert_eq!(validate_tree_name("default"), Ok(()));
        assert_eq!(validate_tree_name(""), Err(TreeNameError::Empty));
        assert_eq!(
            validate_tree_name(&"a".repeat(MAX_TREE_NAME_LENGTH + 1)),
            Err(TreeNameError::TooLong)
        );
        assert_eq!(
            validate_tree_name("a/b"),
            Err(TreeNameError::InvalidCharacters)
        );
        assert_eq!(
            validate_tree_name("tree.wal"),
            Err(TreeNameError::InvalidCharacters)
        );
    }

    #[test]
    fn test_same_name_shares_tree() {
        let dir = tempdir().expect("create temp dir");
        let registry = TreeRegistry::new(dir.path().to_path_buf());

        let a = registry.get_or_create("shared").expect("open");
        let b = registry.get_or_create("shared").expect("open again");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(dir.path().join("shared.wal").exists());
        assert_eq!(registry.names().expect("names"), vec!["shared".to_string()]);
    }

    #[test]
    fn test_invalid_name_rejected() {
        let dir = tempdir().expect("create temp dir");
        let registry = TreeRegistry::new(dir.path().to_path_buf());
        assert!(matches!(
            registry.get_or_create("../escape"),
            Err(RegistryError::InvalidName(TreeNameError::InvalidCharacters))
        ));
    }

    #[test]
    fn test_tree_survives_registry_restart() {
        let dir = tempdir().expect("create temp dir");

        let root_id = {
            let registry = TreeRegistry::new(dir.path().to_path_buf());
            let tree = registry.get_or_create("durable").expect("open");
            let mut tree = tree.write().expect("lock");
            let root = tree.create_root(b"root".to_vec()).expect("root");
            tree.append_child(root.id, b"child".to_vec()).expect("child");
            root.id
        };

        let registry = TreeRegistry::new(dir.path().to_path_buf());
        let tree = registry.get_or_create("durable").expect("reopen");
        let tree = tree.read().expect("lock");
        assert_eq!(tree.len().expect("len"), 2);
        assert_eq!(tree.size(root_id).expect("size"), 2);
    }
}
