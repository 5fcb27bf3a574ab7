#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};

use paperref::error::{LibraryError, Result};
use paperref::sync::RemoteStore;
use paperref::Entry;

/// In-memory stand-in for the WebDAV file
pub struct MemoryStore {
    name: String,
    content: RefCell<Option<Vec<u8>>>,
    pub fetches: Cell<usize>,
    pub stores: Cell<usize>,
    pub offline: Cell<bool>,
}

impl MemoryStore {
    pub fn empty(name: &str) -> Self {
        MemoryStore {
            name: name.to_string(),
            content: RefCell::new(None),
            fetches: Cell::new(0),
            stores: Cell::new(0),
            offline: Cell::new(false),
        }
    }

    pub fn with_text(name: &str, text: &str) -> Self {
        let store = Self::empty(name);
        store.set_text(text);
        store
    }

    pub fn set_text(&self, text: &str) {
        *self.content.borrow_mut() = Some(text.as_bytes().to_vec());
    }

    pub fn text(&self) -> Option<String> {
        self.content
            .borrow()
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).to_string())
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.get() {
            return Err(LibraryError::RemoteUnavailable("offline".to_string()));
        }
        Ok(())
    }
}

impl RemoteStore for MemoryStore {
    fn filename(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<Vec<u8>> {
        self.fetches.set(self.fetches.get() + 1);
        self.check_online()?;
        self.content
            .borrow()
            .clone()
            .ok_or_else(|| LibraryError::RemoteNotFound(self.name.clone()))
    }

    fn store(&self, content: &[u8]) -> Result<()> {
        self.stores.set(self.stores.get() + 1);
        self.check_online()?;
        *self.content.borrow_mut() = Some(content.to_vec());
        Ok(())
    }

    fn exists(&self) -> Result<bool> {
        self.check_online()?;
        Ok(self.content.borrow().is_some())
    }
}

pub fn paper(key: &str, title: &str, year: &str) -> Entry {
    Entry::new(key, "article")
        .with_field("title", title)
        .with_field("year", year)
}

/// Write a `.bib` file into `dir` and return its path
pub fn write_bib(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}
