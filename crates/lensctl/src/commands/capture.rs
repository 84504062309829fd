//! Capture subcommand handlers.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytesize::ByteSize;
use indicatif::{ProgressBar, ProgressStyle};
use lensctl_config::Profile;
use lensctl_core::{CancellationToken, CapturedImage, DeviceTransport, DrainReport, Session};
use serde::Serialize;
use tabled::Tabled;
use tracing::debug;

use crate::cli::{CaptureArgs, CaptureCommand, GlobalOpts};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

/// A camera file written to local disk.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct SavedFile {
    #[tabled(rename = "Camera path")]
    pub camera_path: String,
    #[tabled(rename = "Saved to")]
    pub local_path: String,
    #[tabled(rename = "Size", display_with = "display_size")]
    pub bytes: u64,
}

fn byte_len(data: &[u8]) -> u64 {
    u64::try_from(data.len()).unwrap_or(u64::MAX)
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn display_size(bytes: &u64) -> String {
    ByteSize::b(*bytes).to_string()
}

pub async fn handle<T: DeviceTransport>(
    session: &Session<T>,
    args: CaptureArgs,
    profile: &Profile,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        CaptureCommand::Still { output_path } => {
            let image = session.capture().still().await?;
            let saved = save_image(&image, output_path.as_deref(), profile).await?;
            print_saved(&saved, global)
        }

        CaptureCommand::Preview { output_path } => {
            let frame = session.capture().preview().await?;
            util::ensure_parent(&output_path).await?;
            tokio::fs::write(&output_path, &frame).await?;
            let saved = SavedFile {
                camera_path: "(live view)".into(),
                local_path: output_path.display().to_string(),
                bytes: byte_len(&frame),
            };
            print_saved(&saved, global)
        }

        CaptureCommand::Wait {
            timeout,
            output_path,
        } => {
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            let watcher = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let spinner = spinner(global, timeout);
            let result = session.capture().on_event(timeout, &cancel).await;
            spinner.finish_and_clear();
            watcher.abort();

            let image = result?;
            let saved = save_image(&image, output_path.as_deref(), profile).await?;
            print_saved(&saved, global)
        }

        CaptureCommand::Drain { window } => {
            let window = window.unwrap_or(session.config().drain_window);
            let report = session.capture().drain_events(window).await;
            let out = output::render_single(
                global.output,
                &report,
                |r| drain_detail(r, output::should_color(global.color)),
                |r| r.deleted.join("\n"),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

async fn save_image(
    image: &CapturedImage,
    explicit: Option<&Path>,
    profile: &Profile,
) -> Result<SavedFile, CliError> {
    let dest: PathBuf =
        util::destination(explicit, profile.download_dir.as_deref(), &image.file.name);
    util::ensure_parent(&dest).await?;
    tokio::fs::write(&dest, &image.data).await?;
    debug!(camera = %image.file, local = %dest.display(), "image saved");
    Ok(SavedFile {
        camera_path: image.file.to_string(),
        local_path: dest.display().to_string(),
        bytes: byte_len(&image.data),
    })
}

fn print_saved(saved: &SavedFile, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_list(
        global.output,
        std::slice::from_ref(saved),
        SavedFile::clone,
        |s| s.local_path.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn spinner(global: &GlobalOpts, timeout: Duration) -> ProgressBar {
    if global.quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        bar.set_style(style);
    }
    bar.set_message(format!(
        "Waiting up to {} for the camera (Ctrl-C to stop)",
        humantime::format_duration(timeout)
    ));
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn drain_detail(report: &DrainReport, color: bool) -> String {
    let mut pairs = vec![
        ("Polls", report.polls.to_string()),
        ("Deleted", report.deleted.len().to_string()),
        ("Stopped", report.stop.to_string()),
    ];
    if let Some(error) = &report.error {
        pairs.push(("Error", output::warn(error, color)));
    }
    let mut text = output::detail_lines(&pairs, color);
    for path in &report.deleted {
        text.push_str("\n  ");
        text.push_str(path);
    }
    text
}
