use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::normalize_server_url, load_settings, load_settings_from, ApplicationContext, Engine,
    EngineOptions, ForestEngine, HttpTransport,
};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod render;

use render::render_tree;

#[derive(Parser, Debug)]
#[command(name = "forest", about = "Drive a forest view server from the terminal")]
struct Cli {
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Navigate {
        template: String,
    },
    Invoke {
        template: String,
        instance_id: String,
        command: String,
        #[arg(long)]
        arg: Option<String>,
    },
    /// Re-navigate on an interval and print each change to the view tree.
    Watch {
        template: String,
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => load_settings_from(path),
        None => load_settings(),
    };
    if let Some(server_url) = cli.server_url {
        settings.server_url = normalize_server_url(&server_url);
    }
    info!(server_url = %settings.server_url, "forest: starting");

    let transport = HttpTransport::from_settings(&settings)
        .with_context(|| format!("failed to build transport for {}", settings.server_url))?;
    let engine = Engine::with_options(transport, EngineOptions::from(&settings));

    match cli.command {
        Command::Navigate { template } => {
            let context = navigate(engine.as_ref(), &template).await?;
            print!("{}", render_tree(&context.state));
        }
        Command::Invoke {
            template,
            instance_id,
            command,
            arg,
        } => {
            let arg: Option<Value> = arg
                .map(|raw| serde_json::from_str(&raw))
                .transpose()
                .context("--arg must be valid JSON")?;
            navigate(engine.as_ref(), &template).await?;

            let view = engine
                .view_context(&instance_id)
                .ok_or_else(|| anyhow!("no instance {instance_id} on {template}"))?;
            let handle = view.command(&command).ok_or_else(|| {
                let declared: Vec<&str> = view.command_names().collect();
                anyhow!(
                    "instance {instance_id} does not declare command {command} (declared: {})",
                    declared.join(", ")
                )
            })?;

            match handle.invoke(arg).await? {
                Some(context) => print!("{}", render_tree(&context.state)),
                None => println!("server returned no update for {instance_id}/{command}"),
            }
        }
        Command::Watch {
            template,
            interval_secs,
        } => {
            let mut changes = engine.subscribe();
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            let mut last_printed: Option<Arc<ApplicationContext>> = None;

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = engine.navigate(&template).await {
                            warn!(template = %template, error = %err, "forest: refresh failed");
                        }
                    }
                    change = changes.recv() => match change {
                        Ok(context) => {
                            let unchanged = last_printed
                                .as_ref()
                                .is_some_and(|last| last.state == context.state);
                            if !unchanged {
                                print!("{}", render_tree(&context.state));
                                last_printed = Some(context);
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "forest: watcher lagged behind store");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        }
    }

    Ok(())
}

async fn navigate(
    engine: &dyn ForestEngine,
    template: &str,
) -> Result<Arc<ApplicationContext>> {
    engine
        .navigate(template)
        .await
        .with_context(|| format!("navigation to {template} failed"))?
        .ok_or_else(|| anyhow!("server returned no view tree for {template}"))
}
