//! Index handles held open inside the agent between requests.

use std::collections::HashMap;
use std::path::Path;

use git2::Repository;

use crate::error::{AgentError, Result};
use crate::store;
use crate::tree;
use crate::types::{IndexEntry, IndexId, IndexTimestamp, ObjectId, Rev};

struct Slot {
    index: git2::Index,
    /// The repository's own index file, as opposed to an in-memory index.
    on_disk: bool,
}

/// Worker-local table of open indexes.
#[derive(Default)]
pub struct IndexTable {
    next_id: u64,
    slots: HashMap<IndexId, Slot>,
}

fn to_native(entry: &IndexEntry) -> Result<git2::IndexEntry> {
    let path = tree::normalize(&entry.path)?;
    if path.is_empty() {
        return Err(AgentError::invalid("index entry path is required"));
    }
    Ok(git2::IndexEntry {
        ctime: git2::IndexTime::new(entry.ctime.seconds, entry.ctime.nanoseconds),
        mtime: git2::IndexTime::new(entry.mtime.seconds, entry.mtime.nanoseconds),
        dev: 0,
        ino: 0,
        mode: entry.mode,
        uid: 0,
        gid: 0,
        file_size: entry.file_size,
        id: entry.oid.raw(),
        flags: entry.flags,
        flags_extended: 0,
        path: path.into_bytes(),
    })
}

fn from_native(entry: &git2::IndexEntry) -> IndexEntry {
    IndexEntry {
        path: String::from_utf8_lossy(&entry.path).into_owned(),
        oid: entry.id.into(),
        mode: entry.mode,
        file_size: entry.file_size,
        ctime: IndexTimestamp {
            seconds: entry.ctime.seconds(),
            nanoseconds: entry.ctime.nanoseconds(),
        },
        mtime: IndexTimestamp {
            seconds: entry.mtime.seconds(),
            nanoseconds: entry.mtime.nanoseconds(),
        },
        // Path length bits are an encoding detail of libgit2.
        flags: entry.flags & !0x0fff,
    }
}

impl IndexTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn insert(&mut self, index: git2::Index, on_disk: bool) -> IndexId {
        self.next_id += 1;
        let id = IndexId(self.next_id);
        self.slots.insert(id, Slot { index, on_disk });
        id
    }

    fn slot(&mut self, id: IndexId) -> Result<&mut Slot> {
        self.slots
            .get_mut(&id)
            .ok_or_else(|| AgentError::not_found(format!("{id}")))
    }

    /// Fresh in-memory index.
    pub fn create(&mut self) -> Result<IndexId> {
        let index = git2::Index::new()?;
        Ok(self.insert(index, false))
    }

    /// The repository's index file.
    pub fn open(&mut self, repo: &Repository) -> Result<IndexId> {
        let index = repo.index()?;
        Ok(self.insert(index, true))
    }

    pub fn entries(&mut self, id: IndexId) -> Result<Vec<IndexEntry>> {
        let slot = self.slot(id)?;
        Ok(slot.index.iter().map(|e| from_native(&e)).collect())
    }

    pub fn add(&mut self, id: IndexId, entry: &IndexEntry) -> Result<()> {
        let native = to_native(entry)?;
        self.slot(id)?.index.add(&native)?;
        Ok(())
    }

    pub fn remove(&mut self, id: IndexId, path: &str) -> Result<()> {
        let path = tree::normalize(path)?;
        let slot = self.slot(id)?;
        if slot.index.get_path(Path::new(&path), 0).is_none() {
            return Err(AgentError::not_found(format!("path {path:?} in {id}")));
        }
        slot.index.remove(Path::new(&path), 0)?;
        Ok(())
    }

    /// Replace the index contents with `rev`'s tree.
    pub fn read_tree(&mut self, repo: &Repository, id: IndexId, rev: &Rev) -> Result<()> {
        let tree = store::find_tree(repo, rev)?;
        self.slot(id)?.index.read_tree(&tree)?;
        Ok(())
    }

    /// Write the index contents as tree objects and return the root oid.
    pub fn write_tree(&mut self, repo: &Repository, id: IndexId) -> Result<ObjectId> {
        let oid = self.slot(id)?.index.write_tree_to(repo)?;
        Ok(oid.into())
    }

    /// Persist a repository index back to its file.
    pub fn write(&mut self, id: IndexId) -> Result<()> {
        let slot = self.slot(id)?;
        if !slot.on_disk {
            return Err(AgentError::invalid(format!("{id} is in-memory and has no file")));
        }
        slot.index.write()?;
        Ok(())
    }

    pub fn release(&mut self, id: IndexId) -> Result<()> {
        self.slots
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AgentError::not_found(format!("{id}")))
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid() -> ObjectId {
        ObjectId::from_hex("3b18e512dba79e4c8300dd08aeb37f8e728b8dad").unwrap()
    }

    #[test]
    fn in_memory_index_add_list_remove() {
        let mut table = IndexTable::new();
        let id = table.create().unwrap();
        table.add(id, &IndexEntry::file("docs/a.md", oid(), 3)).unwrap();

        let entries = table.entries(id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "docs/a.md");
        assert_eq!(entries[0].mode, IndexEntry::MODE_FILE);

        table.remove(id, "docs/a.md").unwrap();
        assert!(table.entries(id).unwrap().is_empty());
        assert!(matches!(table.remove(id, "docs/a.md"), Err(AgentError::NotFound(_))));
    }

    #[test]
    fn released_handles_are_gone() {
        let mut table = IndexTable::new();
        let id = table.create().unwrap();
        table.release(id).unwrap();
        assert!(matches!(table.entries(id), Err(AgentError::NotFound(_))));
        assert!(matches!(table.release(id), Err(AgentError::NotFound(_))));
    }

    #[test]
    fn in_memory_index_cannot_be_written_to_disk() {
        let mut table = IndexTable::new();
        let id = table.create().unwrap();
        assert!(matches!(table.write(id), Err(AgentError::InvalidArgument(_))));
    }
}
