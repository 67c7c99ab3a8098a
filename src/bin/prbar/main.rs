mod display;

use std::{
    io::{self, Write},
    sync::Arc,
    time::Instant,
};

use prbar::{
    Configuration, Forge, GitHub, OutputMode, Refresher, default_config_paths, parse_args,
    resolve_config_path,
};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use display::display_snapshot;

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn refresh_and_display<F: Forge + ?Sized + 'static>(
    refresher: &mut Refresher<F>,
    mode: &OutputMode,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let snapshot = refresher.refresh().await;
    info!(elapsed = ?start.elapsed(), stale = snapshot.stale, "Refreshed PRs");

    for error in &snapshot.errors {
        warn!("{error}");
    }

    let render_hidden = refresher.config().render_hidden();
    let mut stdout = io::stdout().lock();
    display_snapshot(&snapshot, mode, render_hidden, &mut stdout)?;
    stdout.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (spec, mode) = match parse_args(std::env::args_os()) {
        Ok(result) => result,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            } else {
                return Err(err);
            }
        }
    };

    init_tracing(spec.debug);

    let path = resolve_config_path(spec.config_path.as_deref(), &default_config_paths())?;
    info!(path = %path.display(), "Loading configuration");
    let config = spec.apply_overrides(Configuration::load(&path)?);
    let interval = config.refresh_interval();

    let forge = Arc::new(GitHub::connect(&config).await?);
    let mut refresher = Refresher::new(Arc::new(config), forge);

    if spec.once {
        return refresh_and_display(&mut refresher, &mode).await;
    }

    // Ticks that fire while a cycle is running are skipped, so at most one
    // refresh is ever in flight.
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let cycle = async {
            ticker.tick().await;
            refresh_and_display(&mut refresher, &mode).await
        };

        tokio::select! {
            result = cycle => result?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, exiting");
                return Ok(());
            }
        }
    }
}
