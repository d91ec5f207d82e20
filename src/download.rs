//! Download planning and execution.
//!
//! Planning walks the selected entries (and, with `-r`, their folders)
//! sequentially, creating local directories, asking for export formats and
//! deciding what to skip. Execution then streams every planned file through
//! the [`Dispatcher`].

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use indicatif::MultiProgress;
use tracing::{debug, info, warn};

use crate::api::DriveApi;
use crate::batch::{BatchReport, Dispatcher, Outcome};
use crate::error::Result;
use crate::export::{self, extension_for, ExportFormats, ExportPrompt};
use crate::format::{format_size, transfer_bar};
use crate::models::RemoteEntry;
use crate::query::{children_query, ListingQuery};
use crate::traversal::{sanitize_name, SiblingNames};

/// One file to fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadTask {
    pub entry: RemoteEntry,
    pub path: PathBuf,
    /// Set for Google Workspace documents, which must be exported.
    pub export_mime: Option<String>,
}

impl fmt::Display for DownloadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    pub recursive: bool,
    pub force: bool,
    pub formats: ExportFormats,
}

/// Planned downloads plus the items already skipped or failed while planning.
#[derive(Debug, Default)]
pub struct DownloadPlan {
    pub tasks: Vec<DownloadTask>,
    pub report: BatchReport,
}

/// Local file name for an entry: its name plus the export extension.
pub fn local_name(name: &str, export_mime: Option<&str>) -> String {
    match export_mime.and_then(extension_for) {
        Some(ext) if !name.ends_with(&format!(".{}", ext)) => format!("{}.{}", name, ext),
        _ => name.to_string(),
    }
}

/// True when `target` names something strictly below `destination`.
fn is_within(destination: &Path, target: &Path) -> bool {
    match target.strip_prefix(destination) {
        Ok(rest) => {
            rest.components().next().is_some()
                && rest.components().all(|c| matches!(c, Component::Normal(_)))
        }
        Err(_) => false,
    }
}

fn outside_destination(target: String, destination: &Path) -> Outcome {
    Outcome::failed(
        target,
        format!("refusing to write outside '{}'", destination.display()),
    )
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Build the download tasks for everything `query` selects.
///
/// Only the top-level listing can fail the whole plan. Problems with single
/// entries or nested folders end up in [`DownloadPlan::report`].
pub async fn plan(
    api: &dyn DriveApi,
    query: &ListingQuery,
    destination: &Path,
    options: &DownloadOptions,
    prompt: &dyn ExportPrompt,
) -> Result<DownloadPlan> {
    let mut plan = DownloadPlan::default();
    let mut names = SiblingNames::default();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(ListingQuery, PathBuf)> = VecDeque::new();

    let top = api.list(query).await?;
    info!(entries = top.len(), "planning downloads");
    let mut pending = Some(top);
    queue.push_back((query.clone(), destination.to_path_buf()));

    while let Some((current, dir)) = queue.pop_front() {
        let entries = match pending.take() {
            Some(entries) => entries,
            None => match api.list(&current).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "cannot list folder");
                    plan.report.record(Outcome::failed(
                        dir.display().to_string(),
                        format!("cannot list folder '{}': {}", dir.display(), e),
                    ));
                    continue;
                }
            },
        };

        let parent_key = dir.display().to_string();
        for entry in entries {
            if !entry.can_download() {
                plan.report.record(Outcome::skipped(
                    entry.name.clone(),
                    "cannot be downloaded; probably you don't have permission to do so",
                ));
                continue;
            }

            if entry.is_folder() {
                let claimed = names.claim(&parent_key, &entry);
                let target = dir.join(&claimed);
                if !options.recursive {
                    plan.report.record(Outcome::skipped(
                        format!("{}/", claimed),
                        "-r not specified; omitting folder",
                    ));
                    continue;
                }
                if !is_within(destination, &target) {
                    plan.report.record(outside_destination(claimed, destination));
                    continue;
                }
                if exists(&target).await && !options.force {
                    plan.report.record(Outcome::skipped(
                        claimed,
                        "already exists; use --force to overwrite",
                    ));
                    continue;
                }
                if !visited.insert(entry.id.clone()) {
                    continue;
                }
                if let Err(e) = tokio::fs::create_dir_all(&target).await {
                    plan.report.record(Outcome::failed(
                        claimed,
                        format!("cannot create '{}': {}", target.display(), e),
                    ));
                    continue;
                }
                debug!(folder = %target.display(), "queued folder");
                queue.push_back((current.with_query(children_query(&entry.id)), target));
                continue;
            }

            let export_mime = if entry.is_google_document() {
                match export::resolve(&options.formats, &entry, prompt) {
                    Ok(mime) => Some(mime),
                    Err(e) => {
                        plan.report.record(Outcome::failed(entry.name.clone(), e.to_string()));
                        continue;
                    }
                }
            } else {
                None
            };

            let file_name = local_name(&sanitize_name(&entry.name), export_mime.as_deref());
            let claimed = names.claim_name(&parent_key, &file_name, &entry.id);
            let target = dir.join(&claimed);
            if !is_within(destination, &target) {
                plan.report.record(outside_destination(claimed, destination));
                continue;
            }
            if exists(&target).await && !options.force {
                plan.report.record(Outcome::skipped(
                    claimed,
                    "already exists; use --force to overwrite",
                ));
                continue;
            }

            plan.tasks.push(DownloadTask {
                entry,
                path: target,
                export_mime,
            });
        }
    }

    Ok(plan)
}

/// Download every planned task concurrently.
pub async fn execute(
    api: Arc<dyn DriveApi>,
    tasks: Vec<DownloadTask>,
    dispatcher: &Dispatcher,
    progress: MultiProgress,
) -> BatchReport {
    info!(tasks = tasks.len(), "downloading");
    let dispatcher = dispatcher.clone().with_progress(progress.clone());
    dispatcher
        .run(tasks, move |task: DownloadTask| {
            let api = api.clone();
            let progress = progress.clone();
            async move {
                let bar = progress.add(transfer_bar(
                    task.entry.size.unwrap_or(0),
                    &task.entry.name,
                ));
                let result = api
                    .download(&task.entry, task.export_mime.as_deref(), &task.path, &bar)
                    .await;
                bar.finish_and_clear();
                progress.remove(&bar);

                match result {
                    Ok(bytes) => Ok(format!(
                        "downloaded '{}' ({})",
                        task.path.display(),
                        format_size(bytes)
                    )),
                    Err(e) => {
                        let _ = tokio::fs::remove_file(&task.path).await;
                        Err(e.context(format!("cannot download '{}'", task.entry.name)))
                    }
                }
            }
        })
        .await
}
