//! Command-line interface definitions for `gdrive`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::batch::DEFAULT_JOBS;

/// Command line interface for Google Drive.
#[derive(Parser, Debug)]
#[command(name = "gdrive", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Maximum number of remote operations running at once.
    #[arg(short = 'j', long, global = true, default_value_t = DEFAULT_JOBS)]
    pub jobs: usize,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List files in your drive. By default, the top level of My Drive.
    List(ListArgs),

    /// Download files or folders.
    Download(DownloadArgs),

    /// Upload local files or folders.
    Upload(UploadArgs),

    /// Create a folder, or a text file when contents are given.
    Create(CreateArgs),

    /// Permanently delete files or folders.
    Delete(IdsArgs),

    /// Move files or folders to the trash.
    Trash(IdsArgs),

    /// Restore files or folders from the trash.
    Untrash(IdsArgs),

    /// Move files or folders into another folder.
    Move(MoveArgs),

    /// Rename a file or folder.
    Rename(RenameArgs),

    /// Grant access and print a shareable link.
    Share(ShareArgs),

    /// Remove access granted with `share`.
    Unshare(UnshareArgs),
}

/// Flags selecting which entries a command acts on.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Include files shared with you.
    #[arg(short, long)]
    pub all: bool,

    /// Show the contents of these folders (id or link).
    #[arg(short, long = "id")]
    pub ids: Vec<String>,

    /// Select files with exactly this name.
    #[arg(short = 'f', long = "filename")]
    pub filenames: Vec<String>,

    /// Raw search query; overrides every other filter.
    #[arg(short, long)]
    pub query: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Sort by modification time, newest first.
    #[arg(short, long)]
    pub time: bool,

    /// Show owner, size and modification time.
    #[arg(short, long)]
    pub long: bool,

    /// Descend into folders.
    #[arg(short, long)]
    pub recursive: bool,

    /// Show these comma separated fields instead, e.g. `name,id,createdTime`.
    #[arg(short = 'F', long)]
    pub fields: Option<String>,

    /// Extra listing parameter, e.g. `pageSize=100` or `orderBy=name desc`.
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DownloadArgs {
    /// Overwrite local files that already exist.
    #[arg(short = 'F', long)]
    pub force: bool,

    /// Download folders and everything inside them.
    #[arg(short, long)]
    pub recursive: bool,

    /// Destination directory (default: the configured downloads directory).
    #[arg(short = 'P', long)]
    pub path: Option<PathBuf>,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Export Google documents to their default formats without asking.
    #[arg(short = 'A', long)]
    pub auto_export: bool,

    /// Export Google documents to PDF.
    #[arg(short, long)]
    pub pdf: bool,

    /// Export formats, e.g. `document=application/pdf,spreadsheet=text/csv`.
    #[arg(short, long)]
    pub export_format: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct UploadArgs {
    /// Local files or folders; glob and brace patterns allowed without --rename.
    #[arg(short = 'f', long = "filename", required = true)]
    pub filenames: Vec<String>,

    /// Remote names, one per --filename.
    #[arg(short = 'n', long = "rename")]
    pub renames: Vec<String>,

    /// Upload even when a file with the same name exists.
    #[arg(short = 'd', long)]
    pub allow_duplicate: bool,

    /// Destination folder (id or link).
    #[arg(short = 'R', long, default_value = "root")]
    pub root: String,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CreateArgs {
    /// Name of the new file or folder.
    #[arg(short = 'f', long = "filename", default_value = "untitled")]
    pub filename: String,

    /// Parent folder (id or link).
    #[arg(short = 'R', long, default_value = "root")]
    pub root: String,

    /// Create even when an entry with the same name exists.
    #[arg(short = 'd', long)]
    pub allow_duplicate: bool,

    /// Create a text file with these contents instead of a folder.
    #[arg(short, long)]
    pub contents: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct IdsArgs {
    /// Ids or links of the files or folders.
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct MoveArgs {
    /// Sources followed by the destination folder (ids or links).
    #[arg(required = true, num_args = 2.., value_name = "SOURCE... DESTINATION")]
    pub paths: Vec<String>,
}

impl MoveArgs {
    /// The sources and the destination.
    pub fn split(&self) -> (&[String], &str) {
        match self.paths.split_last() {
            Some((destination, sources)) => (sources, destination.as_str()),
            None => (&[], ""),
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct RenameArgs {
    /// Id or link of the file or folder.
    pub id: String,

    /// The new name.
    pub name: String,

    /// Rename even when a sibling already has the new name.
    #[arg(short = 'd', long)]
    pub allow_duplicate: bool,
}

/// Who a permission is granted to.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccountType {
    User,
    Group,
    Domain,
    #[default]
    Anyone,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::User => "user",
            AccountType::Group => "group",
            AccountType::Domain => "domain",
            AccountType::Anyone => "anyone",
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ShareArgs {
    /// Ids or links of the files or folders.
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Account type to share with.
    #[arg(short = 't', long = "type", value_enum, default_value_t = AccountType::Anyone)]
    pub account_type: AccountType,

    /// Email address, required for `user` and `group`.
    #[arg(short, long)]
    pub user: Option<String>,

    /// Domain, required for `domain`.
    #[arg(long)]
    pub domain: Option<String>,

    /// Grant write access.
    #[arg(short, long, conflicts_with = "readable")]
    pub writable: bool,

    /// Grant read access (default).
    #[arg(short, long)]
    pub readable: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct UnshareArgs {
    /// Ids or links of the files or folders.
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Account type to revoke.
    #[arg(short = 't', long = "type", value_enum, default_value_t = AccountType::Anyone)]
    pub account_type: AccountType,

    /// Only revoke this email address.
    #[arg(short, long)]
    pub user: Option<String>,

    /// Only revoke this domain.
    #[arg(long)]
    pub domain: Option<String>,
}
