//! Directory tree assembly.
//!
//! The store returns a subtree as two flat sets: every directory whose path
//! lies under the requested root, and every note in those directories.
//! [`build_tree`] turns them into a nested [`DirTree`] without any
//! per-node queries and without comparing every directory to every other one:
//! each directory is keyed by its full materialized path, so its parent is
//! found with a single map lookup on its own ancestor chain.

use std::collections::HashMap;

use serde::Serialize;

use crate::{Directory, Note};

/// A directory with its nested children and notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirTree {
    pub id: i64,
    pub name: String,
    pub children: Vec<DirTree>,
    pub notes: Vec<Note>,
}

impl DirTree {
    /// Number of directories in this tree, including the root.
    pub fn dir_count(&self) -> usize {
        1 + self.children.iter().map(DirTree::dir_count).sum::<usize>()
    }

    /// Number of notes anywhere in this tree.
    pub fn note_count(&self) -> usize {
        self.notes.len() + self.children.iter().map(DirTree::note_count).sum::<usize>()
    }

    /// Depth-first search for a directory node.
    pub fn find(&self, id: i64) -> Option<&DirTree> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }
}

/// Assemble the tree rooted at `root_id`.
///
/// - A directory is attached under the directory whose full path equals its
///   ancestor chain; if no such directory is in `dirs` it is dropped.
/// - Notes are attached to the node of their `dir_id`; notes whose directory
///   is absent are dropped.
/// - Children and notes keep the order of the input slices.
/// - Repeated directory ids are ignored after their first occurrence.
///
/// Returns `None` when `root_id` is not among `dirs`.
pub fn build_tree(root_id: i64, dirs: Vec<Directory>, notes: Vec<Note>) -> Option<DirTree> {
    let mut slot_by_id: HashMap<i64, usize> = HashMap::with_capacity(dirs.len());
    let mut unique: Vec<Directory> = Vec::with_capacity(dirs.len());
    for dir in dirs {
        if slot_by_id.contains_key(&dir.id) {
            continue;
        }
        slot_by_id.insert(dir.id, unique.len());
        unique.push(dir);
    }

    let root_slot = *slot_by_id.get(&root_id)?;

    let slot_by_key: HashMap<String, usize> = unique
        .iter()
        .enumerate()
        .map(|(slot, dir)| (dir.full_path().key(), slot))
        .collect();

    let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); unique.len()];
    for (slot, dir) in unique.iter().enumerate() {
        if slot == root_slot || dir.path.is_root() {
            continue;
        }
        if let Some(&parent_slot) = slot_by_key.get(&dir.path.key()) {
            children_of[parent_slot].push(slot);
        }
    }

    let mut notes_of: Vec<Vec<Note>> = vec![Vec::new(); unique.len()];
    for note in notes {
        if let Some(&slot) = slot_by_id.get(&note.dir_id) {
            notes_of[slot].push(note);
        }
    }

    // Post-order over the root's subtree; every slot has at most one parent,
    // so each node is built exactly once.
    let mut built: Vec<Option<DirTree>> = (0..unique.len()).map(|_| None).collect();
    let mut stack: Vec<(usize, bool)> = vec![(root_slot, false)];
    while let Some((slot, expanded)) = stack.pop() {
        if expanded {
            let children = children_of[slot]
                .iter()
                .filter_map(|&child| built[child].take())
                .collect();
            let dir = &unique[slot];
            built[slot] = Some(DirTree {
                id: dir.id,
                name: dir.name.clone(),
                children,
                notes: std::mem::take(&mut notes_of[slot]),
            });
        } else {
            stack.push((slot, true));
            for &child in children_of[slot].iter().rev() {
                stack.push((child, false));
            }
        }
    }

    built[root_slot].take()
}
