//! Data models for Google Drive API responses.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Prefix shared by all Google Workspace (virtual) MIME types.
pub const GOOGLE_APPS_PREFIX: &str = "application/vnd.google-apps.";

/// Metadata for a file or folder in Google Drive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: Option<u64>,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub owned_by_me: Option<bool>,
    #[serde(default)]
    pub owners: Vec<Owner>,
    #[serde(default)]
    pub capabilities: Option<Capabilities>,
    #[serde(default)]
    pub export_links: BTreeMap<String, String>,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub trashed: bool,
}

impl RemoteEntry {
    pub fn mime_type(&self) -> &str {
        self.mime_type.as_deref().unwrap_or_default()
    }

    pub fn is_folder(&self) -> bool {
        self.mime_type() == FOLDER_MIME_TYPE
    }

    /// Google Workspace documents have no byte content and must be exported.
    pub fn is_google_document(&self) -> bool {
        self.mime_type().starts_with(GOOGLE_APPS_PREFIX) && !self.is_folder()
    }

    /// Entries without the `ownedByMe` field are treated as owned.
    pub fn is_owned_by_me(&self) -> bool {
        self.owned_by_me.unwrap_or(true)
    }

    pub fn can_download(&self) -> bool {
        self.capabilities
            .as_ref()
            .and_then(|c| c.can_download)
            .unwrap_or(true)
    }

    pub fn owner_name(&self) -> Option<&str> {
        self.owners.first().and_then(|o| {
            o.display_name
                .as_deref()
                .or(o.email_address.as_deref())
        })
    }
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        Some(s) => s.parse::<u64>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    #[serde(default)]
    pub can_download: Option<bool>,
}

/// Response from the files.list API endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<RemoteEntry>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// A permission attached to a file or folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Response from the permissions.list API endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionListResponse {
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}

/// Service account credentials from JSON file.
#[derive(Debug, Deserialize)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: Option<String>,
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_entry_deserialize() {
        let json = r#"{
            "id": "abc123",
            "name": "test.txt",
            "mimeType": "text/plain",
            "size": "1024",
            "modifiedTime": "2024-03-01T10:20:30.000Z",
            "parents": ["root"],
            "ownedByMe": false,
            "capabilities": {"canDownload": false}
        }"#;

        let entry: RemoteEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, "abc123");
        assert_eq!(entry.size, Some(1024));
        assert_eq!(entry.parents, vec!["root".to_string()]);
        assert!(!entry.is_owned_by_me());
        assert!(!entry.can_download());
        assert!(entry.modified_time.is_some());
    }

    #[test]
    fn test_missing_flags_default_to_permissive() {
        let entry: RemoteEntry = serde_json::from_str(r#"{"id": "x"}"#).unwrap();
        assert!(entry.is_owned_by_me());
        assert!(entry.can_download());
        assert!(!entry.is_folder());
    }

    #[test]
    fn test_kind_helpers() {
        let folder = RemoteEntry {
            id: "f".into(),
            mime_type: Some(FOLDER_MIME_TYPE.into()),
            ..Default::default()
        };
        let doc = RemoteEntry {
            id: "d".into(),
            mime_type: Some("application/vnd.google-apps.document".into()),
            ..Default::default()
        };
        assert!(folder.is_folder());
        assert!(!folder.is_google_document());
        assert!(doc.is_google_document());
    }

    #[test]
    fn test_permission_serialize_skips_empty() {
        let permission = Permission {
            id: String::new(),
            kind: "anyone".into(),
            role: "reader".into(),
            email_address: None,
            domain: None,
        };
        let json = serde_json::to_value(&permission).unwrap();
        assert_eq!(json["type"], "anyone");
        assert!(json.get("id").is_none());
        assert!(json.get("emailAddress").is_none());
    }
}
