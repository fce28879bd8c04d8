mod csv;
mod display;
mod html;
mod progress;

use std::{fs::File, io::BufWriter};

use anyhow::Context;
use prqueue::{
    Command, Forge, GitHub, OutputFormat, QueueSpec, StatsSpec, build_review_queue,
    fetch_pull_request_history, parse_args, plural,
};

use crate::{
    csv::write_csv,
    display::display_queue_table,
    html::{open_in_browser, write_report},
    progress::{Spinner, status, with_spinner},
};

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

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run_queue<F: Forge + Sync>(spec: &QueueSpec, forge: &F) -> anyhow::Result<()> {
    let queue = build_review_queue(spec, forge, &Spinner).await?;

    match spec.output {
        OutputFormat::Html => {
            let path = with_spinner("Generating HTML report…", async {
                write_report(&queue, &spec.org)
            })
            .await?;
            status(format!("Report written to {}", path.display()));
            println!("{}", path.display());
            if spec.open_browser {
                open_in_browser(&path).await;
            }
        }
        OutputFormat::Table => {
            let mut stdout = std::io::stdout().lock();
            display_queue_table(&queue, &mut stdout)?;
        }
    }

    Ok(())
}

async fn run_stats<F: Forge + Sync>(spec: &StatsSpec, forge: &F) -> anyhow::Result<()> {
    let prs = with_spinner(
        format!("Fetching PRs for {}…", spec.repo),
        fetch_pull_request_history(spec, forge),
    )
    .await?;
    status(format!("Fetched {} PR{}", prs.len(), plural(prs.len())));

    match &spec.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create '{}'", path.display()))?;
            write_csv(&prs, &mut BufWriter::new(file))?;
            status(format!("Wrote {}", path.display()));
        }
        None => write_csv(&prs, &mut std::io::stdout().lock())?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before tracing, so RUST_LOG may come from .env.
    dotenvy::dotenv().ok();
    init_tracing();

    let command = match parse_args(std::env::args_os()) {
        Ok(command) => command,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            } else {
                return Err(err);
            }
        }
    };

    let github = GitHub::from_env()?;

    match command {
        Command::Queue(spec) => run_queue(&spec, &github).await,
        Command::Stats(spec) => run_stats(&spec, &github).await,
    }
}
