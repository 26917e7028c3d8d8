use std::process;

use clap::Parser;
use ptview::config::{ViewerConfig, set_config_path};
use ptview::styling::{eprintln, error_message};
use ptview::trace::{CancelToken, TraceError};

mod cli;
mod commands;

use cli::Cli;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(path) = &cli.config {
        set_config_path(path.clone());
    }

    let cancel = CancelToken::new();
    if let Err(e) = register_signals(&cancel) {
        log::warn!("Cannot install signal handlers: {e}");
    }

    if let Err(e) = run(&cli, &cancel) {
        // TraceError carries its own styling; anything else gets the generic treatment
        if let Some(err) = e.downcast_ref::<TraceError>() {
            eprintln!("{}", err.styled());
        } else {
            eprintln!("{}", error_message(format!("{e:#}")));
        }
        process::exit(1);
    }
}

fn run(cli: &Cli, cancel: &CancelToken) -> anyhow::Result<()> {
    if cli.detect {
        return commands::handle_detect(cli);
    }
    let config = ViewerConfig::load()?;
    commands::handle_view(cli, &config, cancel)
}

/// `-v` raises the level from warn; RUST_LOG wins when set.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

/// The first SIGINT/SIGTERM asks the loop to stop; a second one while the
/// flag is still set exits immediately.
#[cfg(unix)]
fn register_signals(cancel: &CancelToken) -> std::io::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::flag;

    for signal in [SIGINT, SIGTERM] {
        flag::register_conditional_shutdown(signal, 1, cancel.flag())?;
        flag::register(signal, cancel.flag())?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn register_signals(_cancel: &CancelToken) -> std::io::Result<()> {
    Ok(())
}
