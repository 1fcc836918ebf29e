use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use directorio::error::AppError;

/// Business directory and marketplace service.
#[derive(Parser, Debug)]
#[command(name = "directorio-api", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the REST API (used when no subcommand is given)
    Serve(ServeArgs),
    /// Walk sample listings through review on an in-memory directory and print the result
    Demo(DemoArgs),
}

/// Bind overrides; anything left unset comes from `APP_HOST` / `APP_PORT`.
#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    #[arg(long)]
    pub(crate) host: Option<String>,
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    match Cli::parse().command {
        Some(Command::Demo(args)) => run_demo(args),
        Some(Command::Serve(args)) => server::run(args).await,
        None => server::run(ServeArgs::default()).await,
    }
}
