//! Main CLI for swcp
// (c) 2024 Ross Younger

use std::{ffi::OsString, process::ExitCode};

use anstream::{eprintln, println};
use anyhow::{Context as _, Result};
use indicatif::{MultiProgress, ProgressDrawTarget};

use super::{
    args::{CliArgs, MainMode},
    styles::{ERROR, RESET},
};
use crate::{
    client::{MAX_UPDATE_FPS, Parameters, client_main},
    config::Manager,
    server::server_main,
};

/// Main CLI entrypoint
///
/// Call this from `main`, passing the arguments to use.
/// Normally you will call `cli(std::env::args_os())` but you can pass in alternate arguments for CLI testing.
///
/// This function may start a tokio runtime and perform work in it.
#[must_use]
pub fn cli<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match cli_inner(args) {
        Ok(true) => ExitCode::SUCCESS,
        // the failure has already been reported
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            if crate::util::tracing_is_initialised() {
                tracing::error!("{e:#}");
            } else {
                eprintln!("{ERROR}Error:{RESET} {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Inner CLI logic
///
/// # Return
/// true indicates success. false indicates a failure that has already been output.
fn cli_inner<I, T>(args: I) -> Result<bool>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let Some(args) = parse_args(args)? else {
        return Ok(true); // help/version shown; exit
    };
    let mut manager = Manager::standard(args.config.as_deref());
    manager.merge_provider(args.config_args.clone());
    handle_mode(args.mode(), manager, args.client_params)
}

fn parse_args<I, T>(args: I) -> Result<Option<Box<CliArgs>>>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    use clap::error::ErrorKind::{DisplayHelp, DisplayVersion};
    match CliArgs::custom_parse(args) {
        Ok(args) => Ok(Some(Box::new(args))),
        Err(e) if matches!(e.kind(), DisplayHelp | DisplayVersion) => {
            println!("{}", e.render().ansi());
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

// MODE HANDLERS ///////////////////////////////////////////////////////////

#[tokio::main(flavor = "current_thread")]
async fn handle_mode(mode: MainMode, manager: Manager, params: Parameters) -> Result<bool> {
    match mode {
        MainMode::ShowConfigFiles => {
            println!("{:?}", Manager::config_files());
            Ok(true)
        }
        MainMode::ShowConfig => show_config(manager),
        MainMode::Server => run_server(&manager, &params).await,
        MainMode::Client => run_client(&manager, &params).await,
    }
}

fn show_config(mut manager: Manager) -> Result<bool> {
    println!("{}", show_config_data(&mut manager));
    let _ = manager.configuration()?;
    Ok(true)
}

fn show_config_data(manager: &mut Manager) -> String {
    manager.apply_system_default();
    format!("Configuration:\n{}", manager.to_display_adapter())
}

async fn run_server(manager: &Manager, params: &Parameters) -> Result<bool> {
    let config = manager.configuration()?;
    server_main(&config, params)
        .await
        .context("[Server] failed")?;
    Ok(true)
}

async fn run_client(manager: &Manager, params: &Parameters) -> Result<bool> {
    let config = manager.configuration()?;
    let progress =
        MultiProgress::with_draw_target(ProgressDrawTarget::stderr_with_hz(MAX_UPDATE_FPS));
    // this mode may return false
    client_main(&config, &progress, params).await
}
