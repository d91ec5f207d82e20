//! Download planning and execution against an in-memory drive.

mod common;

use std::path::Path;
use std::sync::Arc;

use common::{FakeDrive, ScriptedPrompt};
use gdrive_cli::batch::{Dispatcher, Status};
use gdrive_cli::download::{self, DownloadOptions, DownloadPlan};
use gdrive_cli::export::ExportFormats;
use gdrive_cli::models::{Capabilities, RemoteEntry};
use gdrive_cli::query::ListingQuery;
use gdrive_cli::DriveApi;
use indicatif::{MultiProgress, ProgressDrawTarget};
use tempfile::TempDir;

const DOCUMENT: &str = "application/vnd.google-apps.document";

fn options(recursive: bool, force: bool) -> DownloadOptions {
    DownloadOptions {
        recursive,
        force,
        formats: ExportFormats::new(),
    }
}

async fn plan_root(drive: &FakeDrive, dir: &Path, options: &DownloadOptions) -> DownloadPlan {
    download::plan(
        drive,
        &ListingQuery::new(),
        dir,
        options,
        &ScriptedPrompt::new(&[]),
    )
    .await
    .unwrap()
}

fn relative_paths(plan: &DownloadPlan, root: &Path) -> Vec<String> {
    plan.tasks
        .iter()
        .map(|t| t.path.strip_prefix(root).unwrap().display().to_string())
        .collect()
}

fn google_doc(id: &str, name: &str) -> RemoteEntry {
    RemoteEntry {
        id: id.into(),
        name: name.into(),
        mime_type: Some(DOCUMENT.into()),
        parents: vec!["root".into()],
        ..Default::default()
    }
}

fn hidden_progress() -> MultiProgress {
    MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
}

mod planning {
    use super::*;

    #[tokio::test]
    async fn plain_files_map_to_local_paths() {
        let drive = FakeDrive::new();
        drive.add_file("f1", "a.txt", "root", "a");
        drive.add_file("f2", "b.txt", "root", "b");
        let dir = TempDir::new().unwrap();

        let plan = plan_root(&drive, dir.path(), &options(false, false)).await;

        assert_eq!(relative_paths(&plan, dir.path()), vec!["a.txt", "b.txt"]);
        assert!(plan.report.outcomes().is_empty());
    }

    #[tokio::test]
    async fn folder_without_recursive_is_skipped() {
        let drive = FakeDrive::new();
        drive.add_folder("p", "Photos", "root");
        drive.add_file("f1", "beach.jpg", "p", "sand");
        let dir = TempDir::new().unwrap();

        let plan = plan_root(&drive, dir.path(), &options(false, false)).await;

        assert!(plan.tasks.is_empty());
        assert_eq!(plan.report.skipped(), 1);
        let outcome = &plan.report.outcomes()[0];
        assert_eq!(outcome.target, "Photos/");
        assert_eq!(
            outcome.status,
            Status::Skipped("-r not specified; omitting folder".into())
        );
        assert!(!dir.path().join("Photos").exists());
    }

    #[tokio::test]
    async fn recursive_download_mirrors_folders() {
        let drive = FakeDrive::new();
        drive.add_folder("p", "Photos", "root");
        drive.add_folder("y", "2023", "p");
        drive.add_file("f1", "beach.jpg", "y", "sand");
        let dir = TempDir::new().unwrap();

        let plan = plan_root(&drive, dir.path(), &options(true, false)).await;

        assert!(dir.path().join("Photos").join("2023").is_dir());
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(
            plan.tasks[0].path,
            dir.path().join("Photos").join("2023").join("beach.jpg")
        );
    }

    #[tokio::test]
    async fn existing_files_need_force() {
        let drive = FakeDrive::new();
        drive.add_file("f1", "a.txt", "root", "new");
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();

        let plan = plan_root(&drive, dir.path(), &options(false, false)).await;
        assert!(plan.tasks.is_empty());
        assert_eq!(plan.report.skipped(), 1);

        let plan = plan_root(&drive, dir.path(), &options(false, true)).await;
        assert_eq!(plan.tasks.len(), 1);
        assert!(plan.report.outcomes().is_empty());
    }

    #[tokio::test]
    async fn duplicate_names_get_the_id_appended() {
        let drive = FakeDrive::new();
        drive.add_file("f1", "a.txt", "root", "1");
        drive.add_file("f2", "a.txt", "root", "2");
        let dir = TempDir::new().unwrap();

        let plan = plan_root(&drive, dir.path(), &options(false, false)).await;

        assert_eq!(relative_paths(&plan, dir.path()), vec!["a.txt", "a.txt f2"]);
    }

    #[tokio::test]
    async fn dot_dot_folder_stays_inside_destination() {
        let drive = FakeDrive::new();
        drive.add_folder("up", "..", "root");
        drive.add_file("f1", "escaped.txt", "up", "x");
        drive.add_file("f2", ".", "root", "dot");
        let parent = TempDir::new().unwrap();
        let dir = parent.path().join("downloads");
        std::fs::create_dir(&dir).unwrap();

        let plan = plan_root(&drive, &dir, &options(true, true)).await;

        let mut paths = relative_paths(&plan, &dir);
        paths.sort();
        assert_eq!(paths, vec![". f2", ".. up/escaped.txt"]);
        assert!(dir.join(".. up").is_dir());
        assert!(!parent.path().join("escaped.txt").exists());
    }

    #[tokio::test]
    async fn unnamed_entry_uses_its_id() {
        let drive = FakeDrive::new();
        drive.add_file("f1", "", "root", "x");
        let dir = TempDir::new().unwrap();

        let plan = plan_root(&drive, dir.path(), &options(false, false)).await;

        assert_eq!(relative_paths(&plan, dir.path()), vec!["f1"]);
    }

    #[tokio::test]
    async fn entries_without_download_capability_are_skipped() {
        let drive = FakeDrive::new();
        drive.add_entry(RemoteEntry {
            id: "locked".into(),
            name: "locked.bin".into(),
            parents: vec!["root".into()],
            capabilities: Some(Capabilities {
                can_download: Some(false),
            }),
            ..Default::default()
        });
        let dir = TempDir::new().unwrap();

        let plan = plan_root(&drive, dir.path(), &options(false, false)).await;

        assert!(plan.tasks.is_empty());
        assert_eq!(plan.report.skipped(), 1);
        assert_eq!(plan.report.outcomes()[0].target, "locked.bin");
    }

    #[tokio::test]
    async fn failing_subfolder_is_recorded() {
        let drive = FakeDrive::new();
        drive.add_folder("bad", "Bad", "root");
        drive.add_folder("good", "Good", "root");
        drive.add_file("f1", "ok.txt", "good", "ok");
        drive.fail_listing("bad");
        let dir = TempDir::new().unwrap();

        let plan = plan_root(&drive, dir.path(), &options(true, false)).await;

        assert_eq!(plan.report.failed(), 1);
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].entry.name, "ok.txt");
    }
}

mod exports {
    use super::*;

    #[tokio::test]
    async fn pdf_preset_skips_the_prompt() {
        let drive = FakeDrive::new();
        drive.add_entry(google_doc("d1", "Budget"));
        let dir = TempDir::new().unwrap();
        let prompt = ScriptedPrompt::new(&[]);
        let options = DownloadOptions {
            formats: ExportFormats::new().with_pdf(true),
            ..options(false, false)
        };

        let plan = download::plan(&drive, &ListingQuery::new(), dir.path(), &options, &prompt)
            .await
            .unwrap();

        assert_eq!(prompt.asked(), 0);
        assert_eq!(plan.tasks[0].export_mime.as_deref(), Some("application/pdf"));
        assert_eq!(plan.tasks[0].path, dir.path().join("Budget.pdf"));
    }

    #[tokio::test]
    async fn explicit_mapping_wins_over_pdf() {
        let drive = FakeDrive::new();
        drive.add_entry(google_doc("d1", "Budget"));
        let dir = TempDir::new().unwrap();
        let options = DownloadOptions {
            formats: ExportFormats::parse("document=text/plain").unwrap().with_pdf(true),
            ..options(false, false)
        };

        let plan = plan_root(&drive, dir.path(), &options).await;

        assert_eq!(plan.tasks[0].path, dir.path().join("Budget.txt"));
    }

    #[tokio::test]
    async fn exported_name_does_not_clash_with_existing_file() {
        let drive = FakeDrive::new();
        drive.add_entry(google_doc("d1", "Budget"));
        drive.add_file("f1", "Budget.pdf", "root", "scan");
        let dir = TempDir::new().unwrap();
        let options = DownloadOptions {
            formats: ExportFormats::new().with_pdf(true),
            ..options(false, false)
        };

        let plan = plan_root(&drive, dir.path(), &options).await;

        assert_eq!(
            relative_paths(&plan, dir.path()),
            vec!["Budget.pdf", "Budget.pdf f1"]
        );
    }

    #[tokio::test]
    async fn prompt_repeats_until_a_valid_choice() {
        let drive = FakeDrive::new();
        drive.add_entry(google_doc("d1", "Notes"));
        let dir = TempDir::new().unwrap();
        let prompt = ScriptedPrompt::new(&["image/gif", "text/html"]);

        let plan = download::plan(
            &drive,
            &ListingQuery::new(),
            dir.path(),
            &options(false, false),
            &prompt,
        )
        .await
        .unwrap();

        assert_eq!(prompt.asked(), 2);
        assert_eq!(plan.tasks[0].export_mime.as_deref(), Some("text/html"));
        assert_eq!(plan.tasks[0].path, dir.path().join("Notes.html"));
    }

    #[tokio::test]
    async fn unanswered_prompt_fails_the_document() {
        let drive = FakeDrive::new();
        drive.add_entry(google_doc("d1", "Notes"));
        drive.add_file("f1", "plain.txt", "root", "p");
        let dir = TempDir::new().unwrap();

        let plan = plan_root(&drive, dir.path(), &options(false, false)).await;

        assert_eq!(plan.report.failed(), 1);
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].entry.name, "plain.txt");
    }
}

mod execution {
    use super::*;

    #[tokio::test]
    async fn planned_files_are_written() {
        let drive = Arc::new(FakeDrive::new());
        drive.add_file("f1", "a.txt", "root", "alpha");
        drive.add_entry(google_doc("d1", "Budget"));
        let dir = TempDir::new().unwrap();
        let options = DownloadOptions {
            formats: ExportFormats::new().with_pdf(true),
            ..options(false, false)
        };
        let plan = download::plan(
            &*drive,
            &ListingQuery::new(),
            dir.path(),
            &options,
            &ScriptedPrompt::new(&[]),
        )
        .await
        .unwrap();

        let api: Arc<dyn DriveApi> = drive.clone();
        let report = download::execute(api, plan.tasks, &Dispatcher::new(2), hidden_progress()).await;

        assert_eq!(report.succeeded(), 2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "alpha"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("Budget.pdf")).unwrap(),
            "exported as application/pdf"
        );
    }

    #[tokio::test]
    async fn failed_download_leaves_no_file() {
        let drive = Arc::new(FakeDrive::new());
        drive.add_file("f1", "a.txt", "root", "alpha");
        drive.add_file("f2", "b.txt", "root", "beta");
        let dir = TempDir::new().unwrap();
        let plan = plan_root(&drive, dir.path(), &options(false, false)).await;
        drive.fail_on("f1");

        let api: Arc<dyn DriveApi> = drive.clone();
        let report = download::execute(api, plan.tasks, &Dispatcher::default(), hidden_progress()).await;

        assert_eq!(report.failed(), 1);
        assert_eq!(report.succeeded(), 1);
        assert!(!dir.path().join("a.txt").exists());
        assert!(dir.path().join("b.txt").exists());
    }
}
