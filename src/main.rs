use anyhow::Result;
use clap::Parser;
use prompt_vault::cli::{Command, RootArgs};
use prompt_vault::workflow;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_ENV: &str = "PVAULT_LOG";

fn main() -> ExitCode {
    init_tracing();
    let args = RootArgs::parse();
    match dispatch(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(args: RootArgs) -> Result<bool> {
    match args.command {
        Command::Init(args) => workflow::run_init(args),
        Command::Validate(args) => workflow::run_validate(args),
        Command::Render(args) => workflow::run_render(args),
        Command::Eval(args) => workflow::run_eval(args),
        Command::Diff(args) => workflow::run_diff(args),
        Command::Resolve(args) => workflow::run_resolve(args),
        Command::Bundle(args) => workflow::run_bundle(args),
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}
