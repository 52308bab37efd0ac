//! Directory hierarchy operations.

use std::time::Instant;

use tracing::{debug, info};
use uuid::Uuid;

use archipelago_core::{build_tree, DirTree, Directory, Error, Result};

use super::{NoteGuard, Stores};

/// Directories are shared by every authenticated user; only the notes
/// inside them are access controlled.
#[derive(Clone)]
pub struct DirectoryService {
    stores: Stores,
    guard: NoteGuard,
}

impl DirectoryService {
    pub fn new(stores: Stores) -> Self {
        let guard = NoteGuard::new(stores.notes.clone());
        Self { stores, guard }
    }

    pub async fn get(&self, id: i64) -> Result<Directory> {
        self.stores.dirs.get(id).await
    }

    pub async fn list_roots(&self) -> Result<Vec<Directory>> {
        self.stores.dirs.list_roots().await
    }

    /// Nested tree under `root_id` holding the notes the caller can read.
    ///
    /// Three store reads: the subtree's directories, the notes of those
    /// directories and the caller's access to those notes.
    pub async fn tree(&self, user_id: Uuid, root_id: i64) -> Result<DirTree> {
        let start = Instant::now();
        let dirs = self.stores.dirs.subtree(root_id).await?;
        let dir_ids: Vec<i64> = dirs.iter().map(|d| d.id).collect();

        let notes = self.stores.notes.list_by_dir_ids(&dir_ids).await?;
        let note_ids: Vec<Uuid> = notes.iter().map(|n| n.id).collect();
        let readable = self.guard.readable(&note_ids, user_id).await?;
        let notes: Vec<_> = notes
            .into_iter()
            .filter(|n| readable.contains_key(&n.id))
            .collect();

        let tree = build_tree(root_id, dirs, notes).ok_or(Error::DirectoryNotFound(root_id))?;
        debug!(
            subsystem = "api",
            component = "dirs",
            op = "tree",
            dir_id = root_id,
            user_id = %user_id,
            dir_count = tree.dir_count(),
            note_count = tree.note_count(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Directory tree built"
        );
        Ok(tree)
    }

    pub async fn create(&self, user_id: Uuid, name: &str, parent_id: Option<i64>) -> Result<Directory> {
        let dir = self.stores.dirs.create(name, parent_id).await?;
        info!(
            subsystem = "api",
            component = "dirs",
            op = "create",
            dir_id = dir.id,
            user_id = %user_id,
            "Directory created"
        );
        Ok(dir)
    }

    pub async fn rename(&self, id: i64, name: &str) -> Result<Directory> {
        self.stores.dirs.rename(id, name).await
    }

    pub async fn move_to(&self, user_id: Uuid, id: i64, new_parent_id: Option<i64>) -> Result<Directory> {
        let dir = self.stores.dirs.move_to(id, new_parent_id).await?;
        info!(
            subsystem = "api",
            component = "dirs",
            op = "move",
            dir_id = id,
            user_id = %user_id,
            new_parent_id = ?new_parent_id,
            "Directory moved"
        );
        Ok(dir)
    }

    pub async fn delete(&self, user_id: Uuid, id: i64) -> Result<()> {
        self.stores.dirs.delete(id).await?;
        info!(
            subsystem = "api",
            component = "dirs",
            op = "delete",
            dir_id = id,
            user_id = %user_id,
            "Directory deleted"
        );
        Ok(())
    }
}
