//! Terminal presentation of remote entries.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::{DriveError, Result};
use crate::models::RemoteEntry;

/// A displayable attribute of a [`RemoteEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Name,
    MimeType,
    Size,
    CreatedTime,
    ModifiedTime,
    Owner,
    Parents,
    Link,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Name => "name",
            Field::MimeType => "mimeType",
            Field::Size => "size",
            Field::CreatedTime => "createdTime",
            Field::ModifiedTime => "modifiedTime",
            Field::Owner => "owner",
            Field::Parents => "parents",
            Field::Link => "link",
        }
    }
}

impl FromStr for Field {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "id" => Ok(Field::Id),
            "name" | "title" => Ok(Field::Name),
            "mimeType" => Ok(Field::MimeType),
            "size" | "fileSize" => Ok(Field::Size),
            "createdTime" | "createdDate" => Ok(Field::CreatedTime),
            "modifiedTime" | "modifiedDate" => Ok(Field::ModifiedTime),
            "owner" | "ownerNames" => Ok(Field::Owner),
            "parents" => Ok(Field::Parents),
            "link" | "webViewLink" => Ok(Field::Link),
            other => Err(DriveError::Validation(format!("unknown display field '{}'", other))),
        }
    }
}

/// How a listing row is laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    Short,
    Long,
    Fields(Vec<Field>),
}

impl Layout {
    /// Parse a comma separated field list such as `name,id,createdTime`.
    pub fn from_fields(spec: &str) -> Result<Self> {
        let fields = spec
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Field>>>()?;
        if fields.is_empty() {
            return Err(DriveError::Validation("no display fields given".to_string()));
        }
        Ok(Layout::Fields(fields))
    }
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// `ls`-style timestamp: time of day for this year, the year otherwise.
pub fn format_timestamp(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if now.year() > time.year() {
        time.format("%b %e  %Y").to_string()
    } else {
        time.format("%b %e %H:%M").to_string()
    }
}

/// Plain text value of one field.
pub fn field_text(entry: &RemoteEntry, field: Field) -> String {
    let now = Utc::now();
    match field {
        Field::Id => entry.id.clone(),
        Field::Name => {
            if entry.is_folder() {
                format!("{}/", entry.name)
            } else {
                entry.name.clone()
            }
        }
        Field::MimeType => entry.mime_type().to_string(),
        Field::Size => entry.size.map(format_size).unwrap_or_else(|| "-".to_string()),
        Field::CreatedTime => entry
            .created_time
            .map(|t| format_timestamp(t, now))
            .unwrap_or_else(|| "-".to_string()),
        Field::ModifiedTime => entry
            .modified_time
            .map(|t| format_timestamp(t, now))
            .unwrap_or_else(|| "-".to_string()),
        Field::Owner => entry.owner_name().unwrap_or("-").to_string(),
        Field::Parents => entry.parents.join(","),
        Field::Link => entry.web_view_link.clone().unwrap_or_default(),
    }
}

/// Styled value of one field, padded to `width` before styling.
pub fn format_field(entry: &RemoteEntry, field: Field, width: usize) -> String {
    let text = field_text(entry, field);
    let padded = match field {
        Field::Size => format!("{:>width$}", text, width = width),
        _ => format!("{:<width$}", text, width = width),
    };
    match field {
        Field::Name if entry.is_folder() => style(padded).green().bold().to_string(),
        Field::Link => style(padded).blue().underlined().to_string(),
        Field::ModifiedTime | Field::CreatedTime => style(padded).dim().to_string(),
        _ => padded,
    }
}

/// Render one entry as a row (or a block, for a field list).
pub fn format_entry(entry: &RemoteEntry, layout: &Layout) -> String {
    match layout {
        Layout::Short => format!(
            "{}\t{}",
            format_field(entry, Field::Id, 40),
            format_field(entry, Field::Name, 0)
        ),
        Layout::Long => format!(
            "{}\t{}\t{}\t{}\t{}",
            format_field(entry, Field::Id, 40),
            format_field(entry, Field::Owner, 10),
            format_field(entry, Field::Size, 10),
            format_field(entry, Field::ModifiedTime, 12),
            format_field(entry, Field::Name, 0)
        ),
        Layout::Fields(fields) => {
            let mut block = String::new();
            for field in fields {
                block.push_str(&format!(
                    "{:<10}: {}\n",
                    field.label().to_uppercase(),
                    format_field(entry, *field, 0)
                ));
            }
            block
        }
    }
}

/// Header printed above the entries of one logical folder.
pub fn folder_header(path: &str) -> String {
    style(format!("{}:", path)).cyan().bold().to_string()
}

/// Byte progress bar for one transfer.
pub fn transfer_bar(length: u64, name: &str) -> ProgressBar {
    let bar = ProgressBar::new(length);
    if let Ok(bar_style) = ProgressStyle::with_template(
        "{spinner:.cyan} [{bar:30.cyan/blue}] {bytes}/{total_bytes} @ {bytes_per_sec} - {msg}",
    ) {
        bar.set_style(bar_style.progress_chars("━━╌"));
    }
    bar.set_message(name.to_string());
    bar
}
