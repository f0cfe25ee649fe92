use anyhow::{Context, Result};
use clap::Parser;
use fake_contest::FakeContest;
use tracing::info;

#[derive(Parser)]
#[command(name = "fake-contest")]
#[command(about = "Local stand-in for the BACS contest site")]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Account accepted by the login form, as username:password (repeatable)
    #[arg(long = "user", value_parser = parse_user)]
    users: Vec<(String, String)>,

    /// Monitor that should answer 503 (repeatable)
    #[arg(long = "broken-monitor")]
    broken_monitors: Vec<String>,
}

fn parse_user(raw: &str) -> Result<(String, String), String> {
    raw.split_once(':')
        .map(|(user, password)| (user.to_string(), password.to_string()))
        .ok_or_else(|| format!("expected username:password, got {raw:?}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("fake_contest=debug,info")
        .init();
    let cli = Cli::parse();
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    let _g = rt.enter();
    rt.block_on(run_server(cli))
}

async fn run_server(cli: Cli) -> Result<()> {
    let mut builder = FakeContest::builder();
    for (user, password) in cli.users {
        builder = builder.with_user(user, password);
    }
    for name in cli.broken_monitors {
        builder = builder.with_broken_monitor(name);
    }
    let listener = tokio::net::TcpListener::bind(&cli.listen)
        .await
        .with_context(|| format!("Failed to bind {}", cli.listen))?;
    info!("Serving fake contest site on {}", cli.listen);
    builder
        .build()
        .serve(listener)
        .await
        .context("Server failed")
}
