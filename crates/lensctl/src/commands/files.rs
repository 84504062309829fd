//! File subcommand handlers: ls, tree, get, rm.

use std::path::Path;

use lensctl_config::Profile;
use lensctl_core::{CapturedFile, DeviceTransport, FilePath, Session};
use serde::Serialize;
use tabled::Tabled;
use tracing::warn;

use crate::cli::{FilesArgs, FilesCommand, GlobalOpts};
use crate::commands::capture::SavedFile;
use crate::commands::util;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Clone, Serialize, Tabled)]
struct EntryRow {
    #[tabled(rename = "Type")]
    kind: &'static str,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Path")]
    path: String,
}

pub async fn handle<T: DeviceTransport>(
    session: &Session<T>,
    args: FilesArgs,
    profile: &Profile,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let catalog = session.files();

    match args.command {
        FilesCommand::Ls { path, recursive } => {
            let entries: Vec<EntryRow> = if recursive {
                catalog
                    .list_folders_recursive(&path)
                    .await?
                    .into_iter()
                    .map(|folder| EntryRow {
                        kind: "folder",
                        name: folder_name(&folder),
                        path: folder,
                    })
                    .collect()
            } else {
                let folders = catalog.list_folders(&path).await?;
                let files = catalog.list_files(&path).await?;
                let base = path.trim_end_matches('/');
                folders
                    .into_iter()
                    .map(|name| ("folder", name))
                    .chain(files.into_iter().map(|name| ("file", name)))
                    .map(|(kind, name)| EntryRow {
                        kind,
                        path: format!("{base}/{name}"),
                        name,
                    })
                    .collect::<Vec<_>>()
            };
            let out =
                output::render_list(global.output, &entries, EntryRow::clone, |e| e.path.clone())?;
            output::print_output(&out, global.quiet);
        }

        FilesCommand::Tree { path } => {
            let tree = catalog.tree(&path).await?;
            let out = output::render_single(global.output, &tree, render_tree, |t| {
                let mut paths = Vec::new();
                file_paths(t, &mut paths);
                paths.join("\n")
            })?;
            output::print_output(&out, global.quiet);
        }

        FilesCommand::Get {
            path,
            output_path,
            remove_on_failure,
        } => {
            let file = FilePath::parse(&path).ok_or_else(|| CliError::Validation {
                field: "path".into(),
                reason: format!("'{path}' is not an absolute file path"),
            })?;
            let dest = util::destination(
                output_path.as_deref(),
                profile.download_dir.as_deref(),
                &file.name,
            );
            util::ensure_parent(&dest).await?;

            let bytes = download_to(session, &file, &dest, !remove_on_failure).await?;
            let saved = SavedFile {
                camera_path: file.to_string(),
                local_path: dest.display().to_string(),
                bytes,
            };
            let out = output::render_list(
                global.output,
                std::slice::from_ref(&saved),
                SavedFile::clone,
                |s| s.local_path.clone(),
            )?;
            output::print_output(&out, global.quiet);
        }

        FilesCommand::Rm { path } => {
            let prompt = format!("Delete {path} from the camera?");
            if !util::confirm(&prompt, "files rm", global.yes)? {
                eprintln!("Aborted.");
                return Ok(());
            }
            catalog.delete_file(&path).await?;
            if !global.quiet {
                eprintln!("Deleted {path}");
            }
        }
    }
    Ok(())
}

/// Stream a camera file into `dest`. A partial local file is removed on failure.
async fn download_to<T: DeviceTransport>(
    session: &Session<T>,
    file: &FilePath,
    dest: &Path,
    keep_on_device: bool,
) -> Result<u64, CliError> {
    let mut sink = tokio::fs::File::create(dest).await?;
    match session
        .capture()
        .download(file, &mut sink, keep_on_device)
        .await
    {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            drop(sink);
            if let Err(rm) = tokio::fs::remove_file(dest).await {
                warn!(path = %dest.display(), error = %rm, "could not remove partial download");
            }
            Err(e.into())
        }
    }
}

fn folder_name(folder: &str) -> String {
    folder
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_owned()
}

fn file_paths(node: &CapturedFile, out: &mut Vec<String>) {
    if node.is_directory {
        for child in &node.children {
            file_paths(child, out);
        }
    } else {
        out.push(node.path());
    }
}

fn render_tree(root: &CapturedFile) -> String {
    let mut lines = vec![format!("{} ({} files)", root.path(), root.file_count())];
    tree_lines(root, "", &mut lines);
    lines.join("\n")
}

fn tree_lines(node: &CapturedFile, prefix: &str, lines: &mut Vec<String>) {
    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let last = i + 1 == count;
        let (branch, indent) = if last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        let suffix = if child.is_directory { "/" } else { "" };
        lines.push(format!("{prefix}{branch}{}{suffix}", child.name));
        if child.is_directory {
            tree_lines(child, &format!("{prefix}{indent}"), lines);
        }
    }
}
