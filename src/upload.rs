//! Upload planning and execution.
//!
//! Directories are mirrored while planning, since their remote id is the
//! parent of everything inside them. Plain files become [`UploadTask`]s that
//! are uploaded concurrently afterwards.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::glob;
use indicatif::MultiProgress;
use tracing::{debug, info, warn};

use crate::api::{name_taken, DriveApi};
use crate::batch::{BatchReport, Dispatcher, Outcome};
use crate::error::{DriveError, Result};
use crate::format::transfer_bar;

/// One local file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub path: PathBuf,
    pub name: String,
    pub parent_id: String,
}

impl fmt::Display for UploadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Planned uploads plus the folders created and the items rejected while planning.
#[derive(Debug, Default)]
pub struct UploadPlan {
    pub tasks: Vec<UploadTask>,
    pub report: BatchReport,
}

/// Expand brace patterns like file_{1,2,3}.txt into multiple patterns.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    if let Some(start) = pattern.find('{') {
        if let Some(end) = pattern[start..].find('}') {
            let end = start + end;
            let prefix = &pattern[..start];
            let suffix = &pattern[end + 1..];
            let alternatives = &pattern[start + 1..end];

            return alternatives
                .split(',')
                .flat_map(|alt| expand_braces(&format!("{}{}{}", prefix, alt.trim(), suffix)))
                .collect();
        }
    }

    vec![pattern.to_string()]
}

/// Expand glob and brace patterns into paths, keeping first-seen order.
///
/// A pattern that matches nothing is kept as a literal path so that a
/// missing file is reported by name later on.
pub fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut paths = Vec::new();

    for pattern in patterns {
        for expanded in expand_braces(pattern) {
            let matches: Vec<PathBuf> = glob(&expanded)?.filter_map(|r| r.ok()).collect();
            if matches.is_empty() {
                debug!(pattern = %expanded, "pattern matched nothing");
                let literal = PathBuf::from(&expanded);
                if seen.insert(literal.clone()) {
                    paths.push(literal);
                }
                continue;
            }
            for path in matches {
                if seen.insert(path.clone()) {
                    paths.push(path);
                }
            }
        }
    }

    Ok(paths)
}

// `.` and `..` have no file name of their own.
fn default_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            path.canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| "untitled".to_string())
}

/// Pair each source path with its remote name.
///
/// With renames, the counts must match and the sources are taken literally.
/// Without renames, every source may be a glob or brace pattern.
pub fn pair_sources(filenames: &[String], renames: &[String]) -> Result<Vec<(PathBuf, String)>> {
    if !renames.is_empty() {
        if renames.len() != filenames.len() {
            return Err(DriveError::Validation(
                "must provide as many --rename as --filename values".to_string(),
            ));
        }
        return Ok(filenames
            .iter()
            .zip(renames)
            .map(|(filename, rename)| {
                let path = PathBuf::from(filename);
                let name = Path::new(rename)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| default_name(&path));
                (path, name)
            })
            .collect());
    }

    Ok(expand_patterns(filenames)?
        .into_iter()
        .map(|path| {
            let name = default_name(&path);
            (path, name)
        })
        .collect())
}

/// Check every source, mirror directories remotely and collect file tasks.
pub async fn plan(
    api: &dyn DriveApi,
    sources: Vec<(PathBuf, String)>,
    parent_id: &str,
    allow_duplicate: bool,
) -> UploadPlan {
    let mut plan = UploadPlan::default();

    for (path, name) in sources {
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            plan.report.record(Outcome::failed(
                path.display().to_string(),
                DriveError::FileNotFound(path.clone()).to_string(),
            ));
            continue;
        }

        if !allow_duplicate {
            match name_taken(api, parent_id, &name).await {
                Ok(false) => {}
                Ok(true) => {
                    plan.report.record(Outcome::failed(
                        name.clone(),
                        DriveError::AlreadyExists(name).to_string(),
                    ));
                    continue;
                }
                Err(e) => {
                    plan.report.record(Outcome::failed(
                        name.clone(),
                        e.context(format!("cannot check for '{}'", name)).to_string(),
                    ));
                    continue;
                }
            }
        }

        add_path(api, path, name, parent_id.to_string(), &mut plan).await;
    }

    plan
}

async fn add_path(
    api: &dyn DriveApi,
    path: PathBuf,
    name: String,
    parent_id: String,
    plan: &mut UploadPlan,
) {
    let mut stack = vec![(path, name, parent_id)];
    // Resolved directories already mirrored; symbolic links may lead back to them.
    let mut mirrored: HashSet<PathBuf> = HashSet::new();

    while let Some((path, name, parent_id)) = stack.pop() {
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                plan.report.record(Outcome::failed(
                    path.display().to_string(),
                    format!("cannot read '{}': {}", path.display(), e),
                ));
                continue;
            }
        };
        if !metadata.is_dir() {
            plan.tasks.push(UploadTask {
                path,
                name,
                parent_id,
            });
            continue;
        }

        match tokio::fs::canonicalize(&path).await {
            Ok(resolved) if mirrored.contains(&resolved) => {
                warn!(path = %path.display(), "directory loop");
                plan.report.record(Outcome::skipped(
                    path.display().to_string(),
                    format!("'{}' is already being uploaded", resolved.display()),
                ));
                continue;
            }
            Ok(resolved) => {
                mirrored.insert(resolved);
            }
            Err(e) => {
                plan.report.record(Outcome::failed(
                    path.display().to_string(),
                    format!("cannot resolve '{}': {}", path.display(), e),
                ));
                continue;
            }
        }

        let folder = match api.create_folder(&name, &parent_id).await {
            Ok(folder) => folder,
            Err(e) => {
                plan.report.record(Outcome::failed(
                    path.display().to_string(),
                    e.context(format!("cannot create folder '{}'", name)).to_string(),
                ));
                continue;
            }
        };
        plan.report.record(Outcome::succeeded(
            path.display().to_string(),
            format!("created folder '{}' ({})", name, folder.id),
        ));

        let mut dir = match tokio::fs::read_dir(&path).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read directory");
                plan.report.record(Outcome::failed(
                    path.display().to_string(),
                    format!("cannot read '{}': {}", path.display(), e),
                ));
                continue;
            }
        };
        let mut children = Vec::new();
        while let Ok(Some(entry)) = dir.next_entry().await {
            children.push(entry.path());
        }
        children.sort();

        for child in children.into_iter().rev() {
            let child_name = default_name(&child);
            stack.push((child, child_name, folder.id.clone()));
        }
    }
}

/// Upload every planned task concurrently.
pub async fn execute(
    api: Arc<dyn DriveApi>,
    tasks: Vec<UploadTask>,
    dispatcher: &Dispatcher,
    progress: MultiProgress,
) -> BatchReport {
    info!(tasks = tasks.len(), "uploading");
    let dispatcher = dispatcher.clone().with_progress(progress.clone());
    dispatcher
        .run(tasks, move |task: UploadTask| {
            let api = api.clone();
            let progress = progress.clone();
            async move {
                let length = tokio::fs::metadata(&task.path)
                    .await
                    .map(|m| m.len())
                    .unwrap_or(0);
                let bar = progress.add(transfer_bar(length, &task.name));
                let result = api
                    .upload_file(&task.path, &task.name, &task.parent_id, &bar)
                    .await;
                bar.finish_and_clear();
                progress.remove(&bar);

                let entry = result
                    .map_err(|e| e.context(format!("cannot upload '{}'", task.path.display())))?;
                Ok(format!(
                    "uploaded '{}' as '{}' ({})",
                    task.path.display(),
                    entry.name,
                    entry.id
                ))
            }
        })
        .await
}
