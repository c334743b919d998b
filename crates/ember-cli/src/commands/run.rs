//! `ember run`: the host loop.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use ember_config::HostConfig;
use ember_plugins::PluginManager;

use crate::console::HostCommand;

/// Start the host: trust list, autoload, then the tick/stdin loop until
/// `quit` or end of input. Every plugin is unloaded on the way out.
pub(crate) async fn run_host(config: HostConfig) -> Result<()> {
    let tick = Duration::from_millis(config.host.tick_interval_ms);
    info!(root = %config.plugins.root.display(), tick_ms = config.host.tick_interval_ms, "Starting host");

    let mut manager = PluginManager::with_default_modules(config);
    let trusted = manager.reload_trust_list();
    let summary = manager.load_autoload_list();
    info!(
        trusted,
        loaded = summary.loaded.len(),
        failed = summary.failed.len(),
        "Autoload finished"
    );
    for dir in &summary.failed {
        warn!(plugin = %dir, "Autoload entry failed");
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    host_loop(&mut manager, stdin, &mut stdout, tick).await?;

    manager.unload_all();
    info!("Host stopped");
    Ok(())
}

/// Drive ticks and apply commands read from `input` until `quit` or EOF.
pub(crate) async fn host_loop<R, W>(
    manager: &mut PluginManager,
    input: R,
    output: &mut W,
    tick: Duration,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Dispatch also applies queued admin requests.
                manager.tick();
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read command input")? else {
                    break;
                };
                let reply = match HostCommand::parse(&line) {
                    Ok(None) => continue,
                    Ok(Some(HostCommand::Quit)) => break,
                    Ok(Some(command)) => command.apply(manager),
                    Err(e) => e.to_string(),
                };
                output.write_all(reply.as_bytes()).await?;
                output.write_all(b"\n").await?;
                output.flush().await?;
            }
        }
    }
    Ok(())
}
