//! Stand-in for `v4 repl` that needs no device.
//!
//! Prints the same banner and replies as the real REPL. Faults are injected
//! through environment variables:
//!
//! - `V4_SIM_DELAY_MS`: sleep before every reply
//! - `V4_SIM_CRASH_ON`: exit with status 3, without a reply, on this exact line
//! - `V4_SIM_MUTE_ON`: read this exact line and print nothing
//! - `V4_SIM_IGNORE_TERM`: ignore SIGTERM
//! - `V4_SIM_STUCK`: keep running after stdin closes
//! - `V4_SIM_NO_BANNER`: skip the start-up banner

use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};
use signal_hook::consts::signal::SIGTERM;
use tracing::debug;
use v4_repl_check::logging;

const CRASH_EXIT_CODE: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "v4-repl-sim", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the interactive REPL
    Repl {
        /// Serial port of the (imaginary) device
        #[arg(long)]
        port: String,
    },
}

#[derive(Debug, Default)]
struct Faults {
    delay: Option<Duration>,
    crash_on: Option<String>,
    mute_on: Option<String>,
    ignore_term: bool,
    stuck: bool,
    no_banner: bool,
}

impl Faults {
    fn from_env() -> Self {
        let flag = |name: &str| std::env::var_os(name).is_some_and(|v| !v.is_empty() && v != "0");
        Self {
            delay: std::env::var("V4_SIM_DELAY_MS")
                .ok()
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis),
            crash_on: std::env::var("V4_SIM_CRASH_ON").ok(),
            mute_on: std::env::var("V4_SIM_MUTE_ON").ok(),
            ignore_term: flag("V4_SIM_IGNORE_TERM"),
            stuck: flag("V4_SIM_STUCK"),
            no_banner: flag("V4_SIM_NO_BANNER"),
        }
    }
}

enum Reply {
    Continue,
    Exit,
    Crash,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(0);

    let Commands::Repl { port } = cli.command;
    let faults = Faults::from_env();
    debug!(?faults, "starting simulator");

    // Registering a handler replaces the default action, so SIGTERM only
    // raises the flag.
    let terminated = Arc::new(AtomicBool::new(false));
    if faults.ignore_term {
        if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(&terminated)) {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    }

    match run(&port, &faults) {
        Ok(Reply::Crash) => ExitCode::from(CRASH_EXIT_CODE),
        Ok(_) => {
            debug!(sigterm = terminated.load(Ordering::Relaxed), "exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(port: &str, faults: &Faults) -> std::io::Result<Reply> {
    let stdin = std::io::stdin();
    let mut out = std::io::stdout().lock();

    if !faults.no_banner {
        writeln!(out, "V4 REPL v{}", env!("CARGO_PKG_VERSION"))?;
        writeln!(out, "Connected to {port}")?;
        writeln!(out, "Type 'bye' or press Ctrl+D to exit")?;
        writeln!(out, "Type '.help' for help")?;
        writeln!(out)?;
        writeln!(out, "Resetting device...")?;
        writeln!(out, "Device ready\n")?;
    }

    let mut line = String::new();
    loop {
        write!(out, "v4> ")?;
        out.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            writeln!(out, "Goodbye!")?;
            out.flush()?;
            if faults.stuck {
                loop {
                    std::thread::sleep(Duration::from_secs(60));
                }
            }
            return Ok(Reply::Exit);
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if faults.crash_on.as_deref() == Some(line) {
            return Ok(Reply::Crash);
        }
        if faults.mute_on.as_deref() == Some(line) {
            continue;
        }
        if let Some(delay) = faults.delay {
            std::thread::sleep(delay);
        }

        if let Reply::Exit = respond(&mut out, line)? {
            out.flush()?;
            return Ok(Reply::Exit);
        }
    }
}

fn respond(out: &mut impl Write, line: &str) -> std::io::Result<Reply> {
    match line {
        "bye" | "quit" | ".exit" => {
            writeln!(out, "Goodbye!")?;
            return Ok(Reply::Exit);
        }
        ".ping" => writeln!(out, "Device is responsive")?,
        ".help" => {
            writeln!(out, "Available commands:")?;
            writeln!(out, "  .help    - Show this help")?;
            writeln!(out, "  .ping    - Check device connection")?;
            writeln!(out, "  .reset   - Reset VM and compiler context")?;
            writeln!(out, "  .exit    - Exit REPL (same as 'bye')")?;
            writeln!(out, "  bye      - Exit REPL")?;
        }
        ".reset" => writeln!(out, "VM and compiler context reset")?,
        meta if meta.starts_with('.') => {
            let command = meta.split_whitespace().next().unwrap_or(meta);
            writeln!(out, "Unknown command: {command}")?;
            writeln!(out, "Type '.help' for available commands")?;
        }
        _ => writeln!(out, " ok")?,
    }
    Ok(Reply::Continue)
}
