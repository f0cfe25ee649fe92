use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use contest_bench::{Cli, RunConfig, Runner, WebSessionFactory};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contest_bench=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> Result<()> {
    let config = Cli::parse().into_config(read_password)?;
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    let _guard = rt.enter();
    rt.block_on(run_bench(&config))
}

async fn run_bench(config: &RunConfig) -> Result<()> {
    let factory = Arc::new(WebSessionFactory::new(config.base_url.clone()));
    let global = Runner::from_config(config)
        .run(factory, &config.credentials)
        .await?;
    global.report();
    if let Some(path) = &config.json_report {
        let json = serde_json::to_vec_pretty(&global).context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }
    Ok(())
}

fn read_password() -> std::io::Result<String> {
    rpassword::prompt_password("password: ")
}
