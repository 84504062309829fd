//! Profile subcommand handlers. None of these open the camera.

use std::collections::BTreeMap;

use lensctl_config::{Config, Profile};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{GlobalOpts, ProfileArgs, ProfileCommand};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Clone, Serialize, Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    #[serde(skip)]
    marker: &'static str,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Backend")]
    backend: String,
    #[tabled(rename = "Fixture")]
    fixture: String,
    #[tabled(rename = "Download dir")]
    download_dir: String,
}

pub fn handle(args: ProfileArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = util::config_file(global);

    match args.command {
        ProfileCommand::Init {
            name,
            fixture,
            download_dir,
        } => {
            if path.exists() {
                let prompt = format!("Overwrite {}?", path.display());
                if !util::confirm(&prompt, "profile init", global.yes)? {
                    eprintln!("Aborted.");
                    return Ok(());
                }
            }
            if let Some(fixture) = &fixture {
                // Fail now rather than on the first camera command.
                lensctl_config::load_fixture(fixture)?;
            }

            let cfg = Config {
                default_profile: Some(name.clone()),
                profiles: BTreeMap::from([(
                    name.clone(),
                    Profile {
                        fixture,
                        download_dir,
                        ..Profile::default()
                    },
                )]),
                ..Config::default()
            };
            lensctl_config::save_config_to(&cfg, &path)?;
            if !global.quiet {
                eprintln!("Wrote profile '{name}' to {}", path.display());
            }
        }

        ProfileCommand::Show => {
            let cfg = util::load_config(global)?;
            let color = output::should_color(global.color);
            let out = output::render_single(
                global.output,
                &cfg,
                |c| {
                    output::detail_lines(
                        &[
                            ("Config file", path.display().to_string()),
                            (
                                "Default profile",
                                c.default_profile.clone().unwrap_or_default(),
                            ),
                            ("Profiles", util::available_profiles(c)),
                            ("Busy policy", c.defaults.busy_policy.to_string()),
                            ("Poll interval", c.defaults.poll_interval.clone()),
                            ("Drain window", c.defaults.drain_window.clone()),
                            (
                                "Delete after download",
                                c.defaults.delete_after_download.to_string(),
                            ),
                            (
                                "Download chunk size",
                                c.defaults.download_chunk_size.to_string(),
                            ),
                        ],
                        color,
                    )
                },
                |c| c.default_profile.clone().unwrap_or_default(),
            )?;
            output::print_output(&out, global.quiet);
        }

        ProfileCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
        }

        ProfileCommand::List => {
            let cfg = util::load_config(global)?;
            let rows: Vec<ProfileRow> = cfg
                .profiles
                .iter()
                .map(|(name, p)| ProfileRow {
                    marker: if cfg.default_profile.as_deref() == Some(name) {
                        "*"
                    } else {
                        ""
                    },
                    name: name.clone(),
                    backend: p.backend.to_string(),
                    fixture: p
                        .fixture
                        .as_ref()
                        .map(|f| f.display().to_string())
                        .unwrap_or_else(|| "(built-in)".into()),
                    download_dir: p
                        .download_dir
                        .as_ref()
                        .map(|d| d.display().to_string())
                        .unwrap_or_default(),
                })
                .collect();
            let out =
                output::render_list(global.output, &rows, ProfileRow::clone, |r| r.name.clone())?;
            output::print_output(&out, global.quiet);
        }

        ProfileCommand::Use { name } => {
            let mut cfg = util::load_config(global)?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: util::available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            lensctl_config::save_config_to(&cfg, &path)?;
            if !global.quiet {
                eprintln!("Default profile is now '{name}'");
            }
        }
    }
    Ok(())
}
