//! `v4-repl-check <port>`: run the V4 REPL smoke test against a device.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use clap::error::ErrorKind as ClapErrorKind;
use tracing::{error, info};
use v4_repl_check::{DriverConfig, ExpectError, ScriptRunner, logging, repl_smoke_test};

const USAGE: &str = "Usage: v4-repl-check [OPTIONS] <port>\nExample: v4-repl-check /dev/ttyACM0";

#[derive(Parser, Debug)]
#[command(name = "v4-repl-check")]
#[command(about = "Scripted smoke test for the V4 Forth REPL")]
#[command(version)]
struct Cli {
    /// Serial port (or other address) handed to `v4 repl --port`
    port: String,

    /// REPL executable [default: ./target/release/v4]
    #[arg(long, value_name = "PATH")]
    binary: Option<PathBuf>,

    /// Seconds to wait for each expected reply [default: 10]
    #[arg(long, value_name = "SECS", value_parser = parse_timeout)]
    timeout: Option<Duration>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Do not echo the REPL transcript
    #[arg(short, long)]
    quiet: bool,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if secs.is_finite() && secs > 0.0 {
        Ok(Duration::from_secs_f64(secs))
    } else {
        Err("timeout must be a positive number of seconds".to_string())
    }
}

impl Cli {
    fn driver_config(&self) -> v4_repl_check::Result<DriverConfig> {
        let mut config = DriverConfig::load(self.config.as_deref())?;
        if let Some(binary) = &self.binary {
            config.binary.clone_from(binary);
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if self.quiet {
            config.echo_output = false;
        }
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(
            err.kind(),
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion
        ) =>
        {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            println!("{USAGE}");
            let _ = err.print();
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> v4_repl_check::Result<()> {
    let config = cli.driver_config()?;
    info!(command = %config.command_line(&cli.port), timeout = ?config.timeout, "configured");

    let report = ScriptRunner::new(config)
        .run(&repl_smoke_test(), &cli.port)
        .await?;
    info!(passed = report.passed.len(), "all steps passed");
    Ok(())
}

fn report(err: &ExpectError) {
    match err.step_name() {
        Some(step) => error!(kind = %err.kind(), step, "run failed"),
        None => error!(kind = %err.kind(), "run failed"),
    }
    eprintln!("{}: {err}", err.kind());
}
