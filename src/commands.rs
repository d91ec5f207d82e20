//! One handler per `gdrive` subcommand.
//!
//! Handlers validate their arguments before the first remote call, then
//! either render a listing or hand their targets to the [`Dispatcher`].
//! Per-item problems end up in the returned [`BatchReport`]; only
//! validation and top-level listing errors are returned as `Err`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::MultiProgress;
use tracing::info;

use crate::api::{name_taken, DriveApi, NAME_FIELDS, PARENT_FIELDS};
use crate::batch::{BatchReport, Dispatcher, Outcome};
use crate::cli::{
    AccountType, CreateArgs, DownloadArgs, FilterArgs, ListArgs, MoveArgs, RenameArgs, ShareArgs,
    UnshareArgs, UploadArgs,
};
use crate::config::{default_config_path, Config};
use crate::download::{self, DownloadOptions};
use crate::error::{DriveError, Result};
use crate::export::{ExportFormats, ExportPrompt};
use crate::format::{folder_header, format_entry, Layout};
use crate::models::{Permission, RemoteEntry};
use crate::query::{FileFilter, ListingQuery};
use crate::traversal::{self, Listing};
use crate::upload;
use crate::url_parser::{extract_id, extract_ids};

const SHARE_FIELDS: &str = "id, name, webViewLink";

/// Turn filter flags into a [`FileFilter`], normalizing ids and links.
///
/// Download names may be typed with a trailing `/` for folders.
pub fn build_filter(args: &FilterArgs, strip_slash: bool) -> Result<FileFilter> {
    let filenames = args
        .filenames
        .iter()
        .map(|name| {
            let name = name.trim();
            if strip_slash {
                name.trim_end_matches('/').to_string()
            } else {
                name.to_string()
            }
        })
        .collect();
    Ok(FileFilter {
        query: args.query.clone(),
        all: args.all,
        ids: extract_ids(&args.ids)?,
        filenames,
    })
}

pub fn listing_query(args: &ListArgs) -> Result<ListingQuery> {
    let mut query = ListingQuery::new();
    query.set_query(build_filter(&args.filter, false)?.build());
    if args.time {
        query.set_order_by("folder,modifiedTime desc")?;
    }
    for param in &args.params {
        query.apply_assignment(param)?;
    }
    Ok(query)
}

pub fn layout(args: &ListArgs) -> Result<Layout> {
    match args.fields {
        Some(ref fields) => Layout::from_fields(fields),
        None if args.long => Ok(Layout::Long),
        None => Ok(Layout::Short),
    }
}

pub fn render_entries(entries: &[RemoteEntry], layout: &Layout) -> Vec<String> {
    entries.iter().map(|e| format_entry(e, layout)).collect()
}

/// Render a recursive listing path by path: a header, then the children.
pub fn render_listing(listing: &Listing, layout: &Layout) -> Vec<String> {
    let mut lines = Vec::new();
    for group in listing.groups() {
        lines.push(folder_header(&group.path));
        lines.extend(render_entries(&group.entries, layout));
        lines.push(String::new());
    }
    lines
}

pub async fn list(api: &dyn DriveApi, args: &ListArgs) -> Result<BatchReport> {
    let query = listing_query(args)?;
    let layout = layout(args)?;
    let mut report = BatchReport::new();

    if !args.recursive {
        for line in render_entries(&api.list(&query).await?, &layout) {
            println!("{}", line);
        }
        return Ok(report);
    }

    let listing = traversal::traverse(api, &query).await?;
    for line in render_listing(&listing, &layout) {
        println!("{}", line);
    }
    for failure in listing.failures() {
        report.record(Outcome::failed(
            failure.path.clone(),
            format!("cannot list '{}': {}", failure.path, failure.message),
        ));
    }
    Ok(report)
}

/// `--path` when given, otherwise the configured downloads directory.
pub fn download_destination(args: &DownloadArgs) -> Result<PathBuf> {
    match args.path {
        Some(ref path) => Ok(path.clone()),
        None => Ok(Config::load(default_config_path()?)?.download_dir()),
    }
}

pub async fn download(
    api: Arc<dyn DriveApi>,
    dispatcher: &Dispatcher,
    args: &DownloadArgs,
    destination: &Path,
    prompt: &dyn ExportPrompt,
) -> Result<BatchReport> {
    let formats = match args.export_format {
        Some(ref spec) => ExportFormats::parse(spec)?,
        None => ExportFormats::new(),
    }
    .with_pdf(args.pdf)
    .with_auto(args.auto_export);
    let mut query = ListingQuery::new();
    query.set_query(build_filter(&args.filter, true)?.build());

    tokio::fs::create_dir_all(destination)
        .await
        .map_err(|e| DriveError::from(e).context(format!("cannot create {}", destination.display())))?;

    let options = DownloadOptions {
        recursive: args.recursive,
        force: args.force,
        formats,
    };
    let plan = download::plan(api.as_ref(), &query, destination, &options, prompt).await?;

    let mut report = plan.report;
    report.merge(download::execute(api, plan.tasks, dispatcher, MultiProgress::new()).await);
    Ok(report)
}

pub async fn upload(
    api: Arc<dyn DriveApi>,
    dispatcher: &Dispatcher,
    args: &UploadArgs,
) -> Result<BatchReport> {
    let sources = upload::pair_sources(&args.filenames, &args.renames)?;
    let parent_id = extract_id(&args.root)?;

    let plan = upload::plan(api.as_ref(), sources, &parent_id, args.allow_duplicate).await;
    let mut report = plan.report;
    report.merge(upload::execute(api, plan.tasks, dispatcher, MultiProgress::new()).await);
    Ok(report)
}

pub async fn create(api: &dyn DriveApi, args: &CreateArgs) -> Result<BatchReport> {
    let parent_id = extract_id(&args.root)?;
    let name = args.filename.trim();
    let mut report = BatchReport::new();

    if !args.allow_duplicate && name_taken(api, &parent_id, name).await? {
        report.record(Outcome::failed(
            name,
            DriveError::AlreadyExists(name.to_string()).to_string(),
        ));
        return Ok(report);
    }

    let outcome = match args.contents {
        Some(ref contents) => match api.create_text_file(name, &parent_id, contents).await {
            Ok(entry) => Outcome::succeeded(name, format!("created file '{}' ({})", entry.name, entry.id)),
            Err(e) => Outcome::failed(name, e.context(format!("cannot create '{}'", name)).to_string()),
        },
        None => match api.create_folder(name, &parent_id).await {
            Ok(entry) => {
                Outcome::succeeded(name, format!("created folder '{}' ({})", entry.name, entry.id))
            }
            Err(e) => Outcome::failed(name, e.context(format!("cannot create '{}'", name)).to_string()),
        },
    };
    report.record(outcome);
    Ok(report)
}

fn label<'a>(entry: &'a RemoteEntry, id: &'a str) -> &'a str {
    if entry.name.is_empty() {
        id
    } else {
        &entry.name
    }
}

pub async fn delete(api: Arc<dyn DriveApi>, dispatcher: &Dispatcher, ids: &[String]) -> Result<BatchReport> {
    let ids = extract_ids(ids)?;
    Ok(dispatcher
        .run(ids, move |id: String| {
            let api = api.clone();
            async move {
                api.delete(&id)
                    .await
                    .map_err(|e| e.context(format!("cannot delete '{}'", id)))?;
                Ok(format!("deleted '{}'", id))
            }
        })
        .await)
}

async fn set_trashed(
    api: Arc<dyn DriveApi>,
    dispatcher: &Dispatcher,
    ids: &[String],
    trashed: bool,
) -> Result<BatchReport> {
    let ids = extract_ids(ids)?;
    let verb = if trashed { "trash" } else { "untrash" };
    Ok(dispatcher
        .run(ids, move |id: String| {
            let api = api.clone();
            async move {
                let entry = api
                    .set_trashed(&id, trashed)
                    .await
                    .map_err(|e| e.context(format!("cannot {} '{}'", verb, id)))?;
                Ok(format!("{}ed '{}'", verb, label(&entry, &id)))
            }
        })
        .await)
}

pub async fn trash(api: Arc<dyn DriveApi>, dispatcher: &Dispatcher, ids: &[String]) -> Result<BatchReport> {
    set_trashed(api, dispatcher, ids, true).await
}

pub async fn untrash(api: Arc<dyn DriveApi>, dispatcher: &Dispatcher, ids: &[String]) -> Result<BatchReport> {
    set_trashed(api, dispatcher, ids, false).await
}

/// Reparent every source under the destination, dropping all previous parents.
pub async fn move_entries(
    api: Arc<dyn DriveApi>,
    dispatcher: &Dispatcher,
    args: &MoveArgs,
) -> Result<BatchReport> {
    let (sources, destination) = args.split();
    let destination = extract_id(destination)?;
    let sources = extract_ids(sources)?;

    Ok(dispatcher
        .run(sources, move |id: String| {
            let api = api.clone();
            let destination = destination.clone();
            async move {
                let current = api
                    .get(&id, PARENT_FIELDS)
                    .await
                    .map_err(|e| e.context(format!("cannot look up '{}'", id)))?;
                let previous: Vec<String> = current
                    .parents
                    .into_iter()
                    .filter(|p| *p != destination)
                    .collect();
                api.set_parents(&id, &destination, &previous)
                    .await
                    .map_err(|e| e.context(format!("cannot move '{}'", id)))?;
                Ok(format!("moved '{}' to '{}'", id, destination))
            }
        })
        .await)
}

pub async fn rename(
    api: Arc<dyn DriveApi>,
    dispatcher: &Dispatcher,
    args: &RenameArgs,
) -> Result<BatchReport> {
    let id = extract_id(&args.id)?;
    let new_name = args.name.trim().to_string();
    if new_name.is_empty() {
        return Err(DriveError::Validation("the new name must not be empty".to_string()));
    }
    let allow_duplicate = args.allow_duplicate;

    Ok(dispatcher
        .run(vec![id], move |id: String| {
            let api = api.clone();
            let new_name = new_name.clone();
            async move {
                let current = api
                    .get(&id, NAME_FIELDS)
                    .await
                    .map_err(|e| e.context(format!("cannot look up '{}'", id)))?;
                if !allow_duplicate {
                    for parent in &current.parents {
                        let taken = name_taken(api.as_ref(), parent, &new_name)
                            .await
                            .map_err(|e| {
                                e.context(format!(
                                    "cannot check whether '{}' can be renamed to '{}'",
                                    current.name, new_name
                                ))
                            })?;
                        if taken {
                            return Err(DriveError::AlreadyExists(new_name));
                        }
                    }
                }
                api.rename(&id, &new_name)
                    .await
                    .map_err(|e| e.context(format!("cannot rename '{}'", current.name)))?;
                Ok(format!("renamed '{}' to '{}'", current.name, new_name))
            }
        })
        .await)
}

/// The permission `share` grants, validated against the account type.
pub fn share_permission(args: &ShareArgs) -> Result<Permission> {
    let (email_address, domain) = match args.account_type {
        AccountType::User | AccountType::Group => {
            let email = args.user.clone().ok_or_else(|| {
                DriveError::Validation(format!(
                    "--user is required when sharing with a {}",
                    args.account_type.as_str()
                ))
            })?;
            (Some(email), None)
        }
        AccountType::Domain => {
            let domain = args.domain.clone().ok_or_else(|| {
                DriveError::Validation("--domain is required when sharing with a domain".to_string())
            })?;
            (None, Some(domain))
        }
        AccountType::Anyone => (None, None),
    };
    Ok(Permission {
        id: String::new(),
        kind: args.account_type.as_str().to_string(),
        role: if args.writable { "writer" } else { "reader" }.to_string(),
        email_address,
        domain,
    })
}

pub async fn share(api: Arc<dyn DriveApi>, dispatcher: &Dispatcher, args: &ShareArgs) -> Result<BatchReport> {
    let permission = share_permission(args)?;
    let ids = extract_ids(&args.ids)?;

    Ok(dispatcher
        .run(ids, move |id: String| {
            let api = api.clone();
            let permission = permission.clone();
            async move {
                api.create_permission(&id, &permission)
                    .await
                    .map_err(|e| e.context(format!("cannot share '{}'", id)))?;
                let entry = api
                    .get(&id, SHARE_FIELDS)
                    .await
                    .map_err(|e| e.context(format!("cannot fetch the link of '{}'", id)))?;
                Ok(format!(
                    "shared '{}' ({} can {}): {}",
                    label(&entry, &id),
                    permission.kind,
                    if permission.role == "writer" { "edit" } else { "view" },
                    entry.web_view_link.as_deref().unwrap_or("-")
                ))
            }
        })
        .await)
}

/// Whether an existing permission is one `unshare` should remove.
pub fn permission_matches(permission: &Permission, args: &UnshareArgs) -> bool {
    permission.kind == args.account_type.as_str()
        && args
            .user
            .as_ref()
            .map_or(true, |u| permission.email_address.as_ref() == Some(u))
        && args
            .domain
            .as_ref()
            .map_or(true, |d| permission.domain.as_ref() == Some(d))
}

pub async fn unshare(
    api: Arc<dyn DriveApi>,
    dispatcher: &Dispatcher,
    args: &UnshareArgs,
) -> Result<BatchReport> {
    let ids = extract_ids(&args.ids)?;
    let args = Arc::new(args.clone());

    Ok(dispatcher
        .run(ids, move |id: String| {
            let api = api.clone();
            let args = args.clone();
            async move {
                let matching: Vec<Permission> = api
                    .list_permissions(&id)
                    .await
                    .map_err(|e| e.context(format!("cannot read permissions of '{}'", id)))?
                    .into_iter()
                    .filter(|p| permission_matches(p, &args))
                    .collect();
                if matching.is_empty() {
                    return Err(DriveError::Precondition(format!(
                        "'{}' is not shared with {}",
                        id,
                        args.account_type.as_str()
                    )));
                }
                for permission in &matching {
                    api.delete_permission(&id, &permission.id)
                        .await
                        .map_err(|e| e.context(format!("cannot unshare '{}'", id)))?;
                }
                info!(%id, removed = matching.len(), "unshared");
                Ok(format!("unshared '{}' ({} permission(s) removed)", id, matching.len()))
            }
        })
        .await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{OrderBy, OrderKey, DEFAULT_QUERY};

    #[test]
    fn test_download_names_drop_trailing_slash() {
        let args = FilterArgs {
            filenames: vec!["Photos/".into()],
            ..Default::default()
        };
        assert_eq!(build_filter(&args, true).unwrap().filenames, vec!["Photos"]);
        assert_eq!(build_filter(&args, false).unwrap().filenames, vec!["Photos/"]);
    }

    #[test]
    fn test_folder_links_become_ids() {
        let args = FilterArgs {
            ids: vec!["https://drive.google.com/drive/folders/abc123".into()],
            ..Default::default()
        };
        assert_eq!(build_filter(&args, false).unwrap().ids, vec!["abc123"]);
    }

    #[test]
    fn test_listing_query_time_order_and_params() {
        let query = listing_query(&ListArgs::default()).unwrap();
        assert_eq!(query.query(), DEFAULT_QUERY);

        let args = ListArgs {
            time: true,
            params: vec!["pageSize=10".into()],
            ..Default::default()
        };
        let query = listing_query(&args).unwrap();
        assert_eq!(
            query.order_by(),
            &[OrderBy::asc(OrderKey::Folder), OrderBy::desc(OrderKey::ModifiedTime)]
        );
        assert_eq!(query.page_size(), 10);
    }

    #[test]
    fn test_unknown_param_is_rejected() {
        let args = ListArgs {
            params: vec!["colour=blue".into()],
            ..Default::default()
        };
        assert!(matches!(listing_query(&args), Err(DriveError::Validation(_))));
    }

    #[test]
    fn test_permission_matching() {
        let permission = Permission {
            id: "p1".into(),
            kind: "user".into(),
            role: "reader".into(),
            email_address: Some("a@example.com".into()),
            domain: None,
        };
        let mut args = UnshareArgs {
            ids: vec!["f1".into()],
            account_type: AccountType::User,
            ..Default::default()
        };
        assert!(permission_matches(&permission, &args));
        args.user = Some("b@example.com".into());
        assert!(!permission_matches(&permission, &args));
        args.account_type = AccountType::Anyone;
        args.user = None;
        assert!(!permission_matches(&permission, &args));
    }
}
