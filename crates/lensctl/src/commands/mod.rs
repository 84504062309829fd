//! Command dispatch: bridges CLI args -> camera session -> output formatting.

pub mod capture;
pub mod config_cmd;
pub mod files;
pub mod profile;
pub mod util;

use std::sync::Arc;

use lensctl_config::{Backend, Profile, profile_fixture, profile_to_session_config};
use lensctl_core::{DeviceTransport, Session};
use lensctl_transport::simulated::SimulatedCamera;
use tracing::debug;

use crate::cli::{CaptureArgs, ConfigArgs, FilesArgs, GlobalOpts};
use crate::error::CliError;

/// Commands that need an open camera session.
#[derive(Debug)]
pub enum CameraCommand {
    Config(ConfigArgs),
    Capture(CaptureArgs),
    Files(FilesArgs),
}

/// Open the active profile's camera, run `cmd`, and close the camera again.
///
/// The session is disconnected even when the command fails; the command's
/// error wins over a teardown error.
pub async fn run(cmd: CameraCommand, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load_config(global)?;
    let (profile_name, profile) = util::resolve_profile(&cfg, global)?;
    let session_config = profile_to_session_config(&cfg.defaults, &profile)?;

    let transport = match profile.backend {
        Backend::Simulated => SimulatedCamera::new(profile_fixture(&profile)?),
    };
    debug!(profile = %profile_name, backend = %profile.backend, "opening camera session");

    let session = Session::new(Arc::new(transport), session_config);
    session.connect().await?;

    let result = dispatch(cmd, &session, &profile, global).await;
    let closed = session.disconnect().await;
    result?;
    closed.map_err(CliError::from)
}

async fn dispatch<T: DeviceTransport>(
    cmd: CameraCommand,
    session: &Session<T>,
    profile: &Profile,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    debug!(command = ?cmd, "dispatching command");
    match cmd {
        CameraCommand::Config(args) => config_cmd::handle(session, args, global).await,
        CameraCommand::Capture(args) => capture::handle(session, args, profile, global).await,
        CameraCommand::Files(args) => files::handle(session, args, profile, global).await,
    }
}
