//! Recursive folder listing keyed by logical path.
//!
//! Drive has no paths, only parent links. The traversal synthesizes a
//! path label for every folder it expands (`./MyDrive/Photos/2023`) and
//! groups each folder's direct children under that label.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use crate::api::DriveApi;
use crate::error::Result;
use crate::models::RemoteEntry;
use crate::query::{children_query, ListingQuery};

/// Root label for entries owned by the caller.
pub const MY_DRIVE: &str = "./MyDrive";

/// Root label for entries shared with the caller.
pub const SHARED_WITH_ME: &str = "./SharedWithMe";

/// A folder waiting to be expanded.
#[derive(Debug, Clone)]
pub struct TraversalTask {
    pub parent_path: String,
    pub segment: String,
    pub folder: RemoteEntry,
}

impl TraversalTask {
    pub fn path(&self) -> String {
        format!("{}/{}", self.parent_path, self.segment)
    }
}

/// Entries directly contained in one logical folder.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderGroup {
    pub path: String,
    pub entries: Vec<RemoteEntry>,
}

/// A folder whose children could not be listed.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalFailure {
    pub path: String,
    pub folder_id: String,
    pub message: String,
}

/// Result of a recursive listing, in discovery order.
#[derive(Debug, Default)]
pub struct Listing {
    groups: Vec<FolderGroup>,
    index: HashMap<String, usize>,
    failures: Vec<TraversalFailure>,
}

impl Listing {
    pub fn groups(&self) -> &[FolderGroup] {
        &self.groups
    }

    pub fn get(&self, path: &str) -> Option<&[RemoteEntry]> {
        self.index
            .get(path)
            .map(|&i| self.groups[i].entries.as_slice())
    }

    pub fn failures(&self) -> &[TraversalFailure] {
        &self.failures
    }

    pub fn entry_count(&self) -> usize {
        self.groups.iter().map(|g| g.entries.len()).sum()
    }

    fn group_mut(&mut self, path: &str) -> &mut Vec<RemoteEntry> {
        let i = match self.index.get(path) {
            Some(&i) => i,
            None => {
                self.groups.push(FolderGroup {
                    path: path.to_string(),
                    entries: Vec::new(),
                });
                self.index.insert(path.to_string(), self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        &mut self.groups[i].entries
    }
}

/// Replace characters that would break a path label.
pub fn sanitize_name(name: &str) -> String {
    name.replace('/', "\u{2215}")
}

/// A single path segment for a remote name.
///
/// Drive allows names such as `..` or the empty string, which would point
/// outside their folder once joined to a local path. Those get the id
/// attached so they always name a child.
pub fn path_segment(name: &str, id: &str) -> String {
    let name = sanitize_name(name);
    if name.is_empty() {
        id.to_string()
    } else if name == "." || name == ".." {
        format!("{} {}", name, id)
    } else {
        name
    }
}

/// Tracks which names are already taken inside each logical folder.
#[derive(Debug, Default)]
pub struct SiblingNames {
    taken: HashMap<String, HashSet<String>>,
}

impl SiblingNames {
    /// Claim a unique name for `entry` inside `parent`.
    ///
    /// The first entry keeps its name; later entries with the same name get
    /// their id appended.
    pub fn claim(&mut self, parent: &str, entry: &RemoteEntry) -> String {
        self.claim_name(parent, &entry.name, &entry.id)
    }

    /// Like [`SiblingNames::claim`], for a name that differs from the entry's
    /// own, such as an exported document with its extension attached.
    pub fn claim_name(&mut self, parent: &str, name: &str, id: &str) -> String {
        let name = path_segment(name, id);
        let taken = self.taken.entry(parent.to_string()).or_default();
        if taken.insert(name.clone()) {
            return name;
        }
        let unique = format!("{} {}", name, id);
        taken.insert(unique.clone());
        unique
    }
}

/// Walk every folder reachable from the results of `query`.
///
/// Fails only when the top-level listing fails; a failing child listing is
/// recorded in [`Listing::failures`] and the rest of the tree is still walked.
pub async fn traverse(api: &dyn DriveApi, query: &ListingQuery) -> Result<Listing> {
    let mut listing = Listing::default();
    let mut queue: VecDeque<TraversalTask> = VecDeque::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut names = SiblingNames::default();

    listing.group_mut(MY_DRIVE);
    for entry in api.list(query).await? {
        let label = if entry.is_owned_by_me() {
            MY_DRIVE
        } else {
            SHARED_WITH_ME
        };
        if entry.is_folder() && visited.insert(entry.id.clone()) {
            queue.push_back(TraversalTask {
                parent_path: label.to_string(),
                segment: names.claim(label, &entry),
                folder: entry.clone(),
            });
        }
        listing.group_mut(label).push(entry);
    }

    while let Some(task) = queue.pop_front() {
        let path = task.path();
        debug!(%path, id = %task.folder.id, "expanding folder");
        listing.group_mut(&path);

        let children = match api
            .list(&query.with_query(children_query(&task.folder.id)))
            .await
        {
            Ok(children) => children,
            Err(e) => {
                warn!(%path, error = %e, "cannot list folder");
                listing.failures.push(TraversalFailure {
                    path,
                    folder_id: task.folder.id.clone(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        for child in children {
            if child.is_folder() && visited.insert(child.id.clone()) {
                queue.push_back(TraversalTask {
                    parent_path: path.clone(),
                    segment: names.claim(&path, &child),
                    folder: child.clone(),
                });
            }
            listing.group_mut(&path).push(child);
        }
    }

    Ok(listing)
}
