//! In-memory Drive used by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{LazyLock, Mutex};

use async_trait::async_trait;
use indicatif::ProgressBar;
use regex::Regex;

use gdrive_cli::api::DriveApi;
use gdrive_cli::error::{DriveError, Result};
use gdrive_cli::export::ExportPrompt;
use gdrive_cli::models::{Permission, RemoteEntry, FOLDER_MIME_TYPE};
use gdrive_cli::query::{ListingQuery, ALL_FILES_QUERY};

static PARENT_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^'((?:[^'\\]|\\.)*)' in parents").unwrap());
static NAME_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"name = '((?:[^'\\]|\\.)*)'").unwrap());

fn unescape(value: &str) -> String {
    value.replace("\\'", "'").replace("\\\\", "\\")
}

#[derive(Default)]
struct State {
    entries: Vec<RemoteEntry>,
    contents: HashMap<String, Vec<u8>>,
    permissions: HashMap<String, Vec<Permission>>,
    failing: HashSet<String>,
    failing_listings: HashSet<String>,
    listed: Vec<String>,
    next_id: usize,
}

impl State {
    fn find(&self, id: &str) -> Result<usize> {
        if self.failing.contains(id) {
            return Err(DriveError::ApiError {
                status: 500,
                message: format!("injected failure for {}", id),
            });
        }
        self.entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| DriveError::ApiError {
                status: 404,
                message: format!("File not found: {}.", id),
            })
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

/// A tiny Drive: entries with parent links, file contents and permissions.
#[derive(Default)]
pub struct FakeDrive {
    state: Mutex<State>,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&self, entry: RemoteEntry) -> RemoteEntry {
        self.state.lock().unwrap().entries.push(entry.clone());
        entry
    }

    pub fn add_folder(&self, id: &str, name: &str, parent: &str) -> RemoteEntry {
        self.add_entry(RemoteEntry {
            id: id.into(),
            name: name.into(),
            mime_type: Some(FOLDER_MIME_TYPE.into()),
            parents: vec![parent.into()],
            ..Default::default()
        })
    }

    pub fn add_file(&self, id: &str, name: &str, parent: &str, content: &str) -> RemoteEntry {
        let entry = self.add_entry(RemoteEntry {
            id: id.into(),
            name: name.into(),
            mime_type: Some("text/plain".into()),
            size: Some(content.len() as u64),
            parents: vec![parent.into()],
            ..Default::default()
        });
        self.state
            .lock()
            .unwrap()
            .contents
            .insert(id.into(), content.as_bytes().to_vec());
        entry
    }

    pub fn add_permission(&self, id: &str, permission: Permission) {
        self.state
            .lock()
            .unwrap()
            .permissions
            .entry(id.into())
            .or_default()
            .push(permission);
    }

    /// Every call touching this id fails.
    pub fn fail_on(&self, id: &str) {
        self.state.lock().unwrap().failing.insert(id.into());
    }

    /// Listing the children of this folder fails.
    pub fn fail_listing(&self, folder_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_listings
            .insert(folder_id.into());
    }

    pub fn entry(&self, id: &str) -> Option<RemoteEntry> {
        let state = self.state.lock().unwrap();
        state.entries.iter().find(|e| e.id == id).cloned()
    }

    pub fn children(&self, parent: &str) -> Vec<RemoteEntry> {
        let state = self.state.lock().unwrap();
        state
            .entries
            .iter()
            .filter(|e| e.parents.iter().any(|p| p == parent))
            .cloned()
            .collect()
    }

    pub fn permissions(&self, id: &str) -> Vec<Permission> {
        let state = self.state.lock().unwrap();
        state.permissions.get(id).cloned().unwrap_or_default()
    }

    /// Parent ids of every listing issued so far, in order.
    pub fn listed_parents(&self) -> Vec<String> {
        self.state.lock().unwrap().listed.clone()
    }
}

#[async_trait]
impl DriveApi for FakeDrive {
    async fn list(&self, query: &ListingQuery) -> Result<Vec<RemoteEntry>> {
        let mut state = self.state.lock().unwrap();
        let q = query.query();

        if q == ALL_FILES_QUERY {
            state.listed.push("root".into());
            return Ok(state
                .entries
                .iter()
                .filter(|e| !e.trashed)
                .filter(|e| e.parents.iter().any(|p| p == "root") || !e.is_owned_by_me())
                .cloned()
                .collect());
        }

        let parent = PARENT_CLAUSE
            .captures(q)
            .map(|c| unescape(&c[1]))
            .ok_or_else(|| DriveError::Validation(format!("unsupported query: {}", q)))?;
        let name = NAME_CLAUSE.captures(q).map(|c| unescape(&c[1]));

        state.listed.push(parent.clone());
        if state.failing_listings.contains(&parent) {
            return Err(DriveError::ApiError {
                status: 500,
                message: format!("cannot list {}", parent),
            });
        }

        Ok(state
            .entries
            .iter()
            .filter(|e| !e.trashed && e.parents.contains(&parent))
            .filter(|e| name.as_ref().map_or(true, |n| &e.name == n))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str, _fields: &str) -> Result<RemoteEntry> {
        let state = self.state.lock().unwrap();
        let i = state.find(id)?;
        Ok(state.entries[i].clone())
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<RemoteEntry> {
        let mut state = self.state.lock().unwrap();
        if state.failing.contains(parent_id) {
            return Err(DriveError::ApiError {
                status: 500,
                message: format!("injected failure for {}", parent_id),
            });
        }
        let entry = RemoteEntry {
            id: state.fresh_id("folder"),
            name: name.into(),
            mime_type: Some(FOLDER_MIME_TYPE.into()),
            parents: vec![parent_id.into()],
            ..Default::default()
        };
        state.entries.push(entry.clone());
        Ok(entry)
    }

    async fn create_text_file(
        &self,
        name: &str,
        parent_id: &str,
        contents: &str,
    ) -> Result<RemoteEntry> {
        let mut state = self.state.lock().unwrap();
        let entry = RemoteEntry {
            id: state.fresh_id("text"),
            name: name.into(),
            mime_type: Some("text/plain".into()),
            size: Some(contents.len() as u64),
            parents: vec![parent_id.into()],
            ..Default::default()
        };
        state
            .contents
            .insert(entry.id.clone(), contents.as_bytes().to_vec());
        state.entries.push(entry.clone());
        Ok(entry)
    }

    async fn upload_file(
        &self,
        local_path: &Path,
        name: &str,
        parent_id: &str,
        progress: &ProgressBar,
    ) -> Result<RemoteEntry> {
        let bytes = std::fs::read(local_path)?;
        progress.inc(bytes.len() as u64);
        let mut state = self.state.lock().unwrap();
        if state.failing.contains(name) {
            return Err(DriveError::ApiError {
                status: 500,
                message: format!("injected failure for {}", name),
            });
        }
        let entry = RemoteEntry {
            id: state.fresh_id("upload"),
            name: name.into(),
            size: Some(bytes.len() as u64),
            parents: vec![parent_id.into()],
            ..Default::default()
        };
        state.contents.insert(entry.id.clone(), bytes);
        state.entries.push(entry.clone());
        Ok(entry)
    }

    async fn rename(&self, id: &str, new_name: &str) -> Result<RemoteEntry> {
        let mut state = self.state.lock().unwrap();
        let i = state.find(id)?;
        state.entries[i].name = new_name.into();
        Ok(state.entries[i].clone())
    }

    async fn set_parents(
        &self,
        id: &str,
        add_parent: &str,
        remove_parents: &[String],
    ) -> Result<RemoteEntry> {
        let mut state = self.state.lock().unwrap();
        let i = state.find(id)?;
        let entry = &mut state.entries[i];
        entry.parents.retain(|p| !remove_parents.contains(p));
        if !entry.parents.iter().any(|p| p == add_parent) {
            entry.parents.push(add_parent.into());
        }
        Ok(entry.clone())
    }

    async fn set_trashed(&self, id: &str, trashed: bool) -> Result<RemoteEntry> {
        let mut state = self.state.lock().unwrap();
        let i = state.find(id)?;
        state.entries[i].trashed = trashed;
        Ok(state.entries[i].clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let i = state.find(id)?;
        state.entries.remove(i);
        state.contents.remove(id);
        Ok(())
    }

    async fn download(
        &self,
        entry: &RemoteEntry,
        export_mime: Option<&str>,
        destination: &Path,
        progress: &ProgressBar,
    ) -> Result<u64> {
        let bytes = {
            let state = self.state.lock().unwrap();
            state.find(&entry.id)?;
            match export_mime {
                Some(mime) => format!("exported as {}", mime).into_bytes(),
                None => state.contents.get(&entry.id).cloned().unwrap_or_default(),
            }
        };
        std::fs::write(destination, &bytes)?;
        progress.inc(bytes.len() as u64);
        Ok(bytes.len() as u64)
    }

    async fn create_permission(&self, id: &str, permission: &Permission) -> Result<Permission> {
        let mut state = self.state.lock().unwrap();
        state.find(id)?;
        let mut created = permission.clone();
        created.id = state.fresh_id("perm");
        state
            .permissions
            .entry(id.into())
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn list_permissions(&self, id: &str) -> Result<Vec<Permission>> {
        let state = self.state.lock().unwrap();
        state.find(id)?;
        Ok(state.permissions.get(id).cloned().unwrap_or_default())
    }

    async fn delete_permission(&self, id: &str, permission_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.find(id)?;
        if let Some(list) = state.permissions.get_mut(id) {
            list.retain(|p| p.id != permission_id);
        }
        Ok(())
    }
}

/// Export prompt answering from a fixed script.
pub struct ScriptedPrompt {
    answers: Mutex<Vec<String>>,
    asked: Mutex<usize>,
}

impl ScriptedPrompt {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().rev().map(|a| a.to_string()).collect()),
            asked: Mutex::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        *self.asked.lock().unwrap()
    }
}

impl ExportPrompt for ScriptedPrompt {
    fn choose(&self, _entry_name: &str, _options: &[String]) -> Result<String> {
        *self.asked.lock().unwrap() += 1;
        self.answers
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| DriveError::Validation("prompt script exhausted".into()))
    }
}
