use std::io;
use std::path::PathBuf;

use clap::{Command, CommandFactory};

// Only the clap definitions are compiled here; they need nothing beyond the
// build-dependencies.
#[path = "src/cli.rs"]
mod cli;

/// Writes `lensctl.1`, `lensctl-capture.1`, `lensctl-capture-still.1`, ...
/// into `$OUT_DIR/man`.
fn main() -> io::Result<()> {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let out_dir = std::env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::other("OUT_DIR is not set"))?;
    let man_dir = out_dir.join("man");
    std::fs::create_dir_all(&man_dir)?;

    let mut pending: Vec<Command> = vec![cli::Cli::command()];
    while let Some(cmd) = pending.pop() {
        let mut page = Vec::new();
        clap_mangen::Man::new(cmd.clone()).render(&mut page)?;
        std::fs::write(man_dir.join(format!("{}.1", cmd.get_name())), page)?;

        let prefix = cmd.get_name().to_owned();
        pending.extend(
            cmd.get_subcommands()
                .filter(|sub| !sub.is_hide_set())
                .map(|sub| sub.clone().name(format!("{prefix}-{}", sub.get_name()))),
        );
    }
    Ok(())
}
