//! Search query construction and the typed `files.list` parameter set.

use std::fmt;
use std::str::FromStr;

use crate::error::{DriveError, Result};

/// Query used when no filter is given: non-trashed items at the drive root.
pub const DEFAULT_QUERY: &str = "'root' in parents and trashed = false";

/// Query used by the "all files" flag.
pub const ALL_FILES_QUERY: &str = "('root' in parents or sharedWithMe) and trashed = false";

/// Fields requested for every listed entry.
pub const DEFAULT_ENTRY_FIELDS: &str = "id, name, mimeType, size, createdTime, modifiedTime, \
     parents, ownedByMe, owners(displayName, emailAddress), capabilities(canDownload), \
     exportLinks, webViewLink, trashed";

const MAX_PAGE_SIZE: u32 = 1000;

/// Quote a value for use inside a Drive query string literal.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Query listing the non-trashed children of a folder.
pub fn children_query(folder_id: &str) -> String {
    format!("{} in parents and trashed = false", quote(folder_id))
}

/// Query matching a non-trashed item with an exact name inside a folder.
pub fn named_child_query(parent_id: &str, name: &str) -> String {
    format!(
        "{} in parents and trashed = false and name = {}",
        quote(parent_id),
        quote(name)
    )
}

/// User-facing filter flags that select which entries a command acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilter {
    pub query: Option<String>,
    pub all: bool,
    pub ids: Vec<String>,
    pub filenames: Vec<String>,
}

impl FileFilter {
    /// Build the single search query for these filters.
    ///
    /// Precedence: explicit query, then ids and/or filenames, then the
    /// "all" flag, then [`DEFAULT_QUERY`].
    pub fn build(&self) -> String {
        if let Some(query) = self.query.as_deref().filter(|q| !q.trim().is_empty()) {
            return query.to_string();
        }

        let ids: Vec<String> = self
            .ids
            .iter()
            .map(|id| format!("{} in parents", quote(id.trim())))
            .collect();
        let names: Vec<String> = self
            .filenames
            .iter()
            .map(|name| format!("name = {}", quote(name.trim())))
            .collect();

        match (ids.is_empty(), names.is_empty()) {
            (false, true) => ids.join(" or "),
            (true, false) => names.join(" or "),
            (false, false) => format!("{} or {}", ids.join(" or "), names.join(" or ")),
            (true, true) if self.all => ALL_FILES_QUERY.to_string(),
            (true, true) => DEFAULT_QUERY.to_string(),
        }
    }
}

/// Which collection of items a listing searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corpora {
    User,
    Drive,
    Domain,
    AllDrives,
}

impl Corpora {
    pub fn as_str(&self) -> &'static str {
        match self {
            Corpora::User => "user",
            Corpora::Drive => "drive",
            Corpora::Domain => "domain",
            Corpora::AllDrives => "allDrives",
        }
    }
}

impl FromStr for Corpora {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "user" => Ok(Corpora::User),
            "drive" => Ok(Corpora::Drive),
            "domain" => Ok(Corpora::Domain),
            "allDrives" => Ok(Corpora::AllDrives),
            other => Err(DriveError::Validation(format!(
                "corpora '{}' is not one of user, drive, domain, allDrives",
                other
            ))),
        }
    }
}

/// Sort keys accepted by `orderBy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKey {
    CreatedTime,
    Folder,
    ModifiedByMeTime,
    ModifiedTime,
    Name,
    NameNatural,
    QuotaBytesUsed,
    Recency,
    SharedWithMeTime,
    Starred,
    ViewedByMeTime,
}

impl OrderKey {
    const ALL: [OrderKey; 11] = [
        OrderKey::CreatedTime,
        OrderKey::Folder,
        OrderKey::ModifiedByMeTime,
        OrderKey::ModifiedTime,
        OrderKey::Name,
        OrderKey::NameNatural,
        OrderKey::QuotaBytesUsed,
        OrderKey::Recency,
        OrderKey::SharedWithMeTime,
        OrderKey::Starred,
        OrderKey::ViewedByMeTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKey::CreatedTime => "createdTime",
            OrderKey::Folder => "folder",
            OrderKey::ModifiedByMeTime => "modifiedByMeTime",
            OrderKey::ModifiedTime => "modifiedTime",
            OrderKey::Name => "name",
            OrderKey::NameNatural => "name_natural",
            OrderKey::QuotaBytesUsed => "quotaBytesUsed",
            OrderKey::Recency => "recency",
            OrderKey::SharedWithMeTime => "sharedWithMeTime",
            OrderKey::Starred => "starred",
            OrderKey::ViewedByMeTime => "viewedByMeTime",
        }
    }
}

/// One `orderBy` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub key: OrderKey,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(key: OrderKey) -> Self {
        Self {
            key,
            descending: false,
        }
    }

    pub fn desc(key: OrderKey) -> Self {
        Self {
            key,
            descending: true,
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "{} desc", self.key.as_str())
        } else {
            f.write_str(self.key.as_str())
        }
    }
}

impl FromStr for OrderBy {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let key = parts.next().unwrap_or_default();
        let descending = match parts.next() {
            None => false,
            Some("desc") => true,
            Some(other) => {
                return Err(DriveError::Validation(format!(
                    "unexpected sort direction '{}' in '{}'",
                    other, s
                )))
            }
        };
        if parts.next().is_some() {
            return Err(DriveError::Validation(format!("malformed orderBy term '{}'", s)));
        }
        let key = OrderKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == key)
            .ok_or_else(|| {
                DriveError::Validation(format!("'{}' is not a valid orderBy key", key))
            })?;
        Ok(Self { key, descending })
    }
}

/// Storage spaces a listing may search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    Drive,
    AppDataFolder,
}

impl Space {
    pub fn as_str(&self) -> &'static str {
        match self {
            Space::Drive => "drive",
            Space::AppDataFolder => "appDataFolder",
        }
    }
}

impl FromStr for Space {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "drive" => Ok(Space::Drive),
            "appDataFolder" => Ok(Space::AppDataFolder),
            other => Err(DriveError::Validation(format!(
                "space '{}' is not one of drive, appDataFolder",
                other
            ))),
        }
    }
}

/// Parameters for one `files.list` call.
///
/// Starts populated with defaults; every setter validates its input so an
/// invalid value never reaches the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    q: String,
    corpora: Option<Corpora>,
    drive_id: Option<String>,
    include_items_from_all_drives: bool,
    supports_all_drives: bool,
    page_size: u32,
    order_by: Vec<OrderBy>,
    spaces: Vec<Space>,
    fields: String,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            q: DEFAULT_QUERY.to_string(),
            corpora: None,
            drive_id: None,
            include_items_from_all_drives: true,
            supports_all_drives: true,
            page_size: MAX_PAGE_SIZE,
            order_by: vec![OrderBy::asc(OrderKey::Folder), OrderBy::asc(OrderKey::Name)],
            spaces: Vec::new(),
            fields: DEFAULT_ENTRY_FIELDS.to_string(),
        }
    }
}

impl ListingQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.q
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn order_by(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn fields(&self) -> &str {
        &self.fields
    }

    pub fn corpora(&self) -> Option<Corpora> {
        self.corpora
    }

    /// Copy of this query with only the search string replaced.
    pub fn with_query(&self, q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ..self.clone()
        }
    }

    pub fn set_query(&mut self, q: impl Into<String>) -> &mut Self {
        self.q = q.into();
        self
    }

    pub fn set_page_size(&mut self, page_size: u32) -> Result<&mut Self> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(DriveError::Validation(format!(
                "pageSize must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, page_size
            )));
        }
        self.page_size = page_size;
        Ok(self)
    }

    /// Replace the sort order with a comma separated list such as `folder,modifiedTime desc`.
    pub fn set_order_by(&mut self, spec: &str) -> Result<&mut Self> {
        self.order_by = parse_list(spec)?;
        Ok(self)
    }

    pub fn set_corpora(&mut self, corpora: &str) -> Result<&mut Self> {
        self.corpora = Some(corpora.parse()?);
        Ok(self)
    }

    pub fn set_spaces(&mut self, spaces: &str) -> Result<&mut Self> {
        self.spaces = parse_list(spaces)?;
        Ok(self)
    }

    pub fn set_drive_id(&mut self, drive_id: impl Into<String>) -> &mut Self {
        self.drive_id = Some(drive_id.into());
        self
    }

    pub fn set_fields(&mut self, fields: &str) -> Result<&mut Self> {
        if fields.trim().is_empty() {
            return Err(DriveError::Validation("fields must not be empty".to_string()));
        }
        self.fields = fields.trim().to_string();
        Ok(self)
    }

    /// Assign a parameter by its API name, rejecting unknown keys and bad values.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "q" => {
                self.set_query(value);
            }
            "corpora" => {
                self.set_corpora(value)?;
            }
            "driveId" => {
                self.set_drive_id(value);
            }
            "includeItemsFromAllDrives" => self.include_items_from_all_drives = parse_bool(key, value)?,
            "supportsAllDrives" => self.supports_all_drives = parse_bool(key, value)?,
            "pageSize" => {
                let page_size = value.trim().parse::<u32>().map_err(|_| {
                    DriveError::Validation(format!("pageSize expects an integer, got '{}'", value))
                })?;
                self.set_page_size(page_size)?;
            }
            "orderBy" => {
                self.set_order_by(value)?;
            }
            "spaces" => {
                self.set_spaces(value)?;
            }
            "fields" => {
                self.set_fields(value)?;
            }
            other => {
                return Err(DriveError::Validation(format!(
                    "request parameter '{}' does not exist",
                    other
                )))
            }
        }
        Ok(())
    }

    /// Parse and apply a `key=value` assignment.
    pub fn apply_assignment(&mut self, assignment: &str) -> Result<()> {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            DriveError::Validation(format!("expected key=value, got '{}'", assignment))
        })?;
        self.set(key.trim(), value.trim())
    }

    /// Render as HTTP query pairs for `files.list`.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", self.q.clone()),
            ("pageSize", self.page_size.to_string()),
            (
                "includeItemsFromAllDrives",
                self.include_items_from_all_drives.to_string(),
            ),
            ("supportsAllDrives", self.supports_all_drives.to_string()),
            ("fields", format!("nextPageToken, files({})", self.fields)),
        ];
        if !self.order_by.is_empty() {
            params.push(("orderBy", join_display(&self.order_by)));
        }
        if let Some(corpora) = self.corpora {
            params.push(("corpora", corpora.as_str().to_string()));
        }
        if let Some(ref drive_id) = self.drive_id {
            params.push(("driveId", drive_id.clone()));
        }
        if !self.spaces.is_empty() {
            let spaces: Vec<&str> = self.spaces.iter().map(Space::as_str).collect();
            params.push(("spaces", spaces.join(",")));
        }
        params
    }
}

fn parse_list<T: FromStr<Err = DriveError>>(spec: &str) -> Result<Vec<T>> {
    let items = spec
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<T>>>()?;
    if items.is_empty() {
        return Err(DriveError::Validation(format!("empty list '{}'", spec)));
    }
    Ok(items)
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(DriveError::Validation(format!(
            "{} expects true or false, got '{}'",
            key, other
        ))),
    }
}

fn join_display<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
