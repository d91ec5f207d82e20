//! Google Drive API v3 client.

use std::path::Path;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use indicatif::ProgressBar;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::api::DriveApi;
use crate::auth::Authenticator;
use crate::error::{DriveError, Result};
use crate::models::{
    ApiErrorResponse, FileListResponse, Permission, PermissionListResponse, RemoteEntry,
    FOLDER_MIME_TYPE,
};
use crate::query::{ListingQuery, DEFAULT_ENTRY_FIELDS};

/// Base URL for Google Drive API v3.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload URL for Google Drive API.
const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Threshold for resumable upload (500 MB).
const RESUMABLE_THRESHOLD: u64 = 500 * 1024 * 1024;

const PERMISSION_FIELDS: &str = "nextPageToken, permissions(id, type, role, emailAddress, domain)";

/// HTTP implementation of [`DriveApi`].
pub struct DriveClient {
    auth: Authenticator,
    http: Client,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    pub fn new(auth: Authenticator) -> Self {
        Self::with_base_urls(auth, DRIVE_API_BASE, UPLOAD_API_BASE)
    }

    /// Point the client at different endpoints (used against mock servers).
    pub fn with_base_urls(
        auth: Authenticator,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            http: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            upload_base: upload_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn file_url(&self, id: &str) -> String {
        format!("{}/files/{}", self.api_base, id)
    }

    async fn patch_file(
        &self,
        id: &str,
        query: &[(&str, &str)],
        body: serde_json::Value,
    ) -> Result<RemoteEntry> {
        let token = self.auth.get_access_token().await?;
        let response = self
            .http
            .patch(self.file_url(id))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true"), ("fields", DEFAULT_ENTRY_FIELDS)])
            .query(query)
            .json(&body)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Upload a file using multipart upload (for smaller files).
    async fn upload_multipart(
        &self,
        local_path: &Path,
        name: &str,
        parent_id: &str,
        mime_type: &str,
        progress: &ProgressBar,
    ) -> Result<RemoteEntry> {
        let file_content = tokio::fs::read(local_path).await?;
        let size = file_content.len() as u64;
        let file_part = Part::bytes(file_content)
            .file_name(name.to_string())
            .mime_str(mime_type)?;
        let entry = self.send_multipart(name, parent_id, None, file_part).await?;
        progress.inc(size);
        Ok(entry)
    }

    async fn send_multipart(
        &self,
        name: &str,
        parent_id: &str,
        mime_type: Option<&str>,
        content: Part,
    ) -> Result<RemoteEntry> {
        let token = self.auth.get_access_token().await?;

        let mut metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id]
        });
        if let Some(mime_type) = mime_type {
            metadata["mimeType"] = serde_json::Value::from(mime_type);
        }

        let metadata_part = Part::text(metadata.to_string()).mime_str("application/json")?;
        let form = Form::new()
            .part("metadata", metadata_part)
            .part("file", content);

        let response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&token)
            .query(&[
                ("uploadType", "multipart"),
                ("supportsAllDrives", "true"),
                ("fields", DEFAULT_ENTRY_FIELDS),
            ])
            .multipart(form)
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    /// Upload a file using resumable upload (for larger files).
    async fn upload_resumable(
        &self,
        local_path: &Path,
        name: &str,
        parent_id: &str,
        mime_type: &str,
        file_size: u64,
        progress: &ProgressBar,
    ) -> Result<RemoteEntry> {
        let token = self.auth.get_access_token().await?;

        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id]
        });

        // Step 1: Initiate resumable upload
        let init_response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&token)
            .query(&[("uploadType", "resumable"), ("supportsAllDrives", "true")])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", file_size.to_string())
            .json(&metadata)
            .send()
            .await?;
        let init_response = check(init_response).await?;

        let upload_url = init_response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| DriveError::ApiError {
                status: 500,
                message: "No upload URL in response".to_string(),
            })?
            .to_string();

        // Step 2: Stream the file content
        let pb = progress.clone();
        let stream = ReaderStream::new(File::open(local_path).await?)
            .inspect_ok(move |chunk| pb.inc(chunk.len() as u64));

        let upload_response = self
            .http
            .put(&upload_url)
            .header("Content-Type", mime_type)
            .header("Content-Length", file_size.to_string())
            .query(&[("fields", DEFAULT_ENTRY_FIELDS)])
            .body(Body::wrap_stream(stream))
            .send()
            .await?;

        Ok(check(upload_response).await?.json().await?)
    }
}

/// Turn a non-success response into [`DriveError::ApiError`].
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(DriveError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        });
    }
    Err(DriveError::ApiError {
        status: status.as_u16(),
        message: error_body,
    })
}

#[async_trait]
impl DriveApi for DriveClient {
    async fn list(&self, query: &ListingQuery) -> Result<Vec<RemoteEntry>> {
        let token = self.auth.get_access_token().await?;
        let params = query.to_params();
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(format!("{}/files", self.api_base))
                .bearer_auth(&token)
                .query(&params);

            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = check(request.send().await?).await?;
            let list_response: FileListResponse = response.json().await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(q = query.query(), count = all_files.len(), "listed files");
        Ok(all_files)
    }

    async fn get(&self, id: &str, fields: &str) -> Result<RemoteEntry> {
        let token = self.auth.get_access_token().await?;
        let response = self
            .http
            .get(self.file_url(id))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true"), ("fields", fields)])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<RemoteEntry> {
        let token = self.auth.get_access_token().await?;
        let metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent_id]
        });
        let response = self
            .http
            .post(format!("{}/files", self.api_base))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true"), ("fields", DEFAULT_ENTRY_FIELDS)])
            .json(&metadata)
            .send()
            .await?;
        let folder: RemoteEntry = check(response).await?.json().await?;
        debug!(id = %folder.id, name, parent_id, "created folder");
        Ok(folder)
    }

    async fn create_text_file(
        &self,
        name: &str,
        parent_id: &str,
        contents: &str,
    ) -> Result<RemoteEntry> {
        let part = Part::text(contents.to_string()).mime_str("text/plain")?;
        self.send_multipart(name, parent_id, Some("text/plain"), part)
            .await
    }

    async fn upload_file(
        &self,
        local_path: &Path,
        name: &str,
        parent_id: &str,
        progress: &ProgressBar,
    ) -> Result<RemoteEntry> {
        let file_size = tokio::fs::metadata(local_path).await?.len();
        let mime_type = mime_guess::from_path(local_path)
            .first_or_octet_stream()
            .to_string();
        progress.set_length(file_size);
        debug!(path = %local_path.display(), size = file_size, "uploading");

        if file_size > RESUMABLE_THRESHOLD {
            self.upload_resumable(local_path, name, parent_id, &mime_type, file_size, progress)
                .await
        } else {
            self.upload_multipart(local_path, name, parent_id, &mime_type, progress)
                .await
        }
    }

    async fn rename(&self, id: &str, new_name: &str) -> Result<RemoteEntry> {
        self.patch_file(id, &[], serde_json::json!({ "name": new_name }))
            .await
    }

    async fn set_parents(
        &self,
        id: &str,
        add_parent: &str,
        remove_parents: &[String],
    ) -> Result<RemoteEntry> {
        let remove = remove_parents.join(",");
        self.patch_file(
            id,
            &[("addParents", add_parent), ("removeParents", remove.as_str())],
            serde_json::json!({}),
        )
        .await
    }

    async fn set_trashed(&self, id: &str, trashed: bool) -> Result<RemoteEntry> {
        self.patch_file(id, &[], serde_json::json!({ "trashed": trashed }))
            .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let token = self.auth.get_access_token().await?;
        let response = self
            .http
            .delete(self.file_url(id))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true")])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn download(
        &self,
        entry: &RemoteEntry,
        export_mime: Option<&str>,
        destination: &Path,
        progress: &ProgressBar,
    ) -> Result<u64> {
        let token = self.auth.get_access_token().await?;

        let request = match export_mime {
            Some(mime) => self
                .http
                .get(format!("{}/export", self.file_url(&entry.id)))
                .query(&[("mimeType", mime)]),
            None => self
                .http
                .get(self.file_url(&entry.id))
                .query(&[("alt", "media"), ("supportsAllDrives", "true")]),
        };
        let response = check(request.bearer_auth(&token).send().await?).await?;

        if let Some(length) = response.content_length().or(entry.size) {
            progress.set_length(length);
        }

        // Stream to file
        let mut file = File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            progress.inc(chunk.len() as u64);
        }

        file.flush().await?;
        debug!(id = %entry.id, path = %destination.display(), bytes = written, "downloaded");
        Ok(written)
    }

    async fn create_permission(&self, id: &str, permission: &Permission) -> Result<Permission> {
        let token = self.auth.get_access_token().await?;
        let response = self
            .http
            .post(format!("{}/permissions", self.file_url(id)))
            .bearer_auth(&token)
            .query(&[
                ("supportsAllDrives", "true"),
                ("fields", "id, type, role, emailAddress, domain"),
            ])
            .json(permission)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn list_permissions(&self, id: &str) -> Result<Vec<Permission>> {
        let token = self.auth.get_access_token().await?;
        let mut permissions = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(format!("{}/permissions", self.file_url(id)))
                .bearer_auth(&token)
                .query(&[("supportsAllDrives", "true"), ("fields", PERMISSION_FIELDS)]);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = check(request.send().await?).await?;
            let page: PermissionListResponse = response.json().await?;
            permissions.extend(page.permissions);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(permissions)
    }

    async fn delete_permission(&self, id: &str, permission_id: &str) -> Result<()> {
        let token = self.auth.get_access_token().await?;
        let response = self
            .http
            .delete(format!("{}/permissions/{}", self.file_url(id), permission_id))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true")])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
