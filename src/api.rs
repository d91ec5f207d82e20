//! The remote operations the CLI core needs from Google Drive.

use std::path::Path;

use async_trait::async_trait;
use indicatif::ProgressBar;

use crate::error::Result;
use crate::models::{Permission, RemoteEntry};
use crate::query::{named_child_query, ListingQuery};

/// Field mask for a parent reassignment.
pub const PARENT_FIELDS: &str = "id, parents";

/// Field mask for a rename.
pub const NAME_FIELDS: &str = "id, name, parents";

/// Remote Drive operations.
///
/// Implemented by [`crate::client::DriveClient`] over HTTP. Every call is
/// stateless so one handle can be shared by all dispatched units.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// List every entry matching the query, following pagination.
    async fn list(&self, query: &ListingQuery) -> Result<Vec<RemoteEntry>>;

    /// Fetch metadata for one entry restricted to `fields`.
    async fn get(&self, id: &str, fields: &str) -> Result<RemoteEntry>;

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<RemoteEntry>;

    async fn create_text_file(
        &self,
        name: &str,
        parent_id: &str,
        contents: &str,
    ) -> Result<RemoteEntry>;

    async fn upload_file(
        &self,
        local_path: &Path,
        name: &str,
        parent_id: &str,
        progress: &ProgressBar,
    ) -> Result<RemoteEntry>;

    async fn rename(&self, id: &str, new_name: &str) -> Result<RemoteEntry>;

    /// Add `add_parent` and remove `remove_parents` in a single call.
    async fn set_parents(
        &self,
        id: &str,
        add_parent: &str,
        remove_parents: &[String],
    ) -> Result<RemoteEntry>;

    async fn set_trashed(&self, id: &str, trashed: bool) -> Result<RemoteEntry>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Write an entry's content to `destination`, exporting when `export_mime` is set.
    ///
    /// Returns the number of bytes written.
    async fn download(
        &self,
        entry: &RemoteEntry,
        export_mime: Option<&str>,
        destination: &Path,
        progress: &ProgressBar,
    ) -> Result<u64>;

    async fn create_permission(&self, id: &str, permission: &Permission) -> Result<Permission>;

    async fn list_permissions(&self, id: &str) -> Result<Vec<Permission>>;

    async fn delete_permission(&self, id: &str, permission_id: &str) -> Result<()>;
}

/// Whether `parent_id` already holds a non-trashed entry called `name`.
pub async fn name_taken(api: &dyn DriveApi, parent_id: &str, name: &str) -> Result<bool> {
    let query = ListingQuery::new().with_query(named_child_query(parent_id, name));
    Ok(!api.list(&query).await?.is_empty())
}
