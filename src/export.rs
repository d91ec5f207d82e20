//! Choosing download formats for Google Workspace documents.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::error::{DriveError, Result};
use crate::models::RemoteEntry;

const PDF: &str = "application/pdf";

/// Google Workspace document types that can be exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocumentKind {
    Document,
    Spreadsheet,
    Presentation,
    Drawing,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Document,
        DocumentKind::Spreadsheet,
        DocumentKind::Presentation,
        DocumentKind::Drawing,
    ];

    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentKind::Document => "application/vnd.google-apps.document",
            DocumentKind::Spreadsheet => "application/vnd.google-apps.spreadsheet",
            DocumentKind::Presentation => "application/vnd.google-apps.presentation",
            DocumentKind::Drawing => "application/vnd.google-apps.drawing",
        }
    }

    pub fn alias(&self) -> &'static str {
        match self {
            DocumentKind::Document => "document",
            DocumentKind::Spreadsheet => "spreadsheet",
            DocumentKind::Presentation => "presentation",
            DocumentKind::Drawing => "drawing",
        }
    }

    pub fn from_mime(mime_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.mime_type() == mime_type)
    }

    /// Resolve a user alias such as `spreadsheet`.
    pub fn from_alias(alias: &str) -> Result<Self> {
        match alias.trim() {
            "folder" => Err(DriveError::Validation(
                "folders have no export formats".to_string(),
            )),
            other => Self::ALL
                .into_iter()
                .find(|k| k.alias() == other)
                .ok_or_else(|| {
                    DriveError::Validation(format!(
                        "unknown document type '{}'; expected document, spreadsheet, presentation or drawing",
                        other
                    ))
                }),
        }
    }

    /// MIME types this document type can be exported to.
    pub fn exportable(&self) -> &'static [&'static str] {
        match self {
            DocumentKind::Document => &[
                "text/html",
                "application/zip",
                "text/plain",
                "application/rtf",
                "application/vnd.oasis.opendocument.text",
                PDF,
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "application/epub+zip",
            ],
            DocumentKind::Spreadsheet => &[
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "application/x-vnd.oasis.opendocument.spreadsheet",
                PDF,
                "text/csv",
                "text/tab-separated-values",
                "application/zip",
            ],
            DocumentKind::Presentation => &[
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
                "application/vnd.oasis.opendocument.presentation",
                PDF,
                "text/plain",
            ],
            DocumentKind::Drawing => &["image/jpeg", "image/png", "image/svg+xml", PDF],
        }
    }

    /// Format picked by `--auto-export`.
    pub fn default_export(&self) -> &'static str {
        match self {
            DocumentKind::Document => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentKind::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            DocumentKind::Presentation => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            DocumentKind::Drawing => "image/jpeg",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alias())
    }
}

/// File extension for an export format.
pub fn extension_for(mime_type: &str) -> Option<&'static str> {
    let ext = match mime_type {
        "application/pdf" => "pdf",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        "application/vnd.oasis.opendocument.text" => "odt",
        "application/x-vnd.oasis.opendocument.spreadsheet"
        | "application/vnd.oasis.opendocument.spreadsheet" => "ods",
        "application/vnd.oasis.opendocument.presentation" => "odp",
        "application/rtf" => "rtf",
        "application/epub+zip" => "epub",
        "application/zip" => "zip",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/csv" => "csv",
        "text/tab-separated-values" => "tsv",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/svg+xml" => "svg",
        other => return mime_guess::get_mime_extensions_str(other).and_then(|e| e.first().copied()),
    };
    Some(ext)
}

/// Caller preferences for export formats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportFormats {
    mapping: BTreeMap<DocumentKind, String>,
    pdf: bool,
    auto: bool,
}

impl ExportFormats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `alias=mime,alias=mime`, validating every pair immediately.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut formats = Self::new();
        for pair in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (alias, mime) = pair.split_once('=').ok_or_else(|| {
                DriveError::Validation(format!("expected type=mimetype, got '{}'", pair))
            })?;
            formats.set(DocumentKind::from_alias(alias)?, mime.trim())?;
        }
        Ok(formats)
    }

    pub fn set(&mut self, kind: DocumentKind, mime_type: &str) -> Result<()> {
        if !kind.exportable().contains(&mime_type) {
            return Err(DriveError::Validation(format!(
                "cannot export a {} to '{}'; available: {}",
                kind,
                mime_type,
                kind.exportable().join(", ")
            )));
        }
        self.mapping.insert(kind, mime_type.to_string());
        Ok(())
    }

    /// Export every document type without an explicit mapping to PDF.
    pub fn with_pdf(mut self, pdf: bool) -> Self {
        self.pdf = pdf;
        self
    }

    /// Use the default format for every document type without an explicit mapping.
    pub fn with_auto(mut self, auto: bool) -> Self {
        self.auto = auto;
        self
    }

    pub fn get(&self, kind: DocumentKind) -> Option<&str> {
        self.mapping.get(&kind).map(String::as_str)
    }

    /// The format chosen without asking: explicit mapping, then PDF, then defaults.
    pub fn preset(&self, kind: DocumentKind) -> Option<String> {
        if let Some(mime) = self.get(kind) {
            return Some(mime.to_string());
        }
        if self.pdf {
            return Some(PDF.to_string());
        }
        if self.auto {
            return Some(kind.default_export().to_string());
        }
        None
    }
}

/// Asks the user to pick an export format.
pub trait ExportPrompt {
    fn choose(&self, entry_name: &str, options: &[String]) -> Result<String>;
}

/// Interactive terminal prompt.
pub struct TerminalPrompt;

impl ExportPrompt for TerminalPrompt {
    fn choose(&self, entry_name: &str, options: &[String]) -> Result<String> {
        let prompt = format!("Choose an export mimetype for '{}'", entry_name);
        let selection = tokio::task::block_in_place(|| {
            dialoguer::Select::new()
                .with_prompt(prompt)
                .items(options)
                .default(0)
                .interact()
        })?;
        Ok(options[selection].clone())
    }
}

/// Pick the export format for a Google Workspace document.
///
/// Falls back to `prompt` when no preset applies; the prompt repeats until
/// it yields one of the entry's exportable formats.
pub fn resolve(
    formats: &ExportFormats,
    entry: &RemoteEntry,
    prompt: &dyn ExportPrompt,
) -> Result<String> {
    let kind = DocumentKind::from_mime(entry.mime_type());
    if let Some(mime) = kind.and_then(|k| formats.preset(k)) {
        return Ok(mime);
    }

    let options: Vec<String> = if !entry.export_links.is_empty() {
        entry.export_links.keys().cloned().collect()
    } else if let Some(kind) = kind {
        kind.exportable().iter().map(|m| m.to_string()).collect()
    } else {
        Vec::new()
    };
    if options.is_empty() {
        return Err(DriveError::Precondition(format!(
            "'{}' ({}) cannot be exported",
            entry.name,
            entry.mime_type()
        )));
    }

    loop {
        let choice = prompt.choose(&entry.name, &options)?;
        let choice = choice.trim();
        if options.iter().any(|o| o == choice) {
            return Ok(choice.to_string());
        }
        warn!(choice, "invalid export mimetype");
        eprintln!(">> Invalid mimetype: {}", choice);
    }
}
