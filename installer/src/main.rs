//! wirefetch CLI entrypoint.
//!
//! Loads configuration, builds the HTTP transport, and dispatches the
//! requested subcommand. Failures are printed with a remediation hint and the
//! command line to run again.

use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;
use wirefetch::error::{Error, Result};
use wirefetch::http::UreqTransport;
use wirefetch_installer::cli::Cli;
use wirefetch_installer::commands::{CommandContext, dispatch, load_settings, write_line};
use wirefetch_installer::dirs::SystemBaseDirs;
use wirefetch_installer::output::{render_error, rerun_command};

fn main() {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let rerun = rerun_command(std::env::args());
    let exit_code = exit_code_for_run_result(run_result, &rerun, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    let settings = load_settings(cli.config.as_deref(), &SystemBaseDirs)?;
    let cwd = current_dir()?;
    let transport = UreqTransport::new(settings.endpoints.lookup_timeout());
    let context = CommandContext {
        settings: &settings,
        transport: &transport,
        cwd: &cwd,
    };
    dispatch(&cli.command, &context, stdout, stderr)
}

fn current_dir() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::try_from(cwd).map_err(|err| Error::Io(err.into_io_error()))
}

fn exit_code_for_run_result(result: Result<()>, rerun: &str, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_line(stderr, render_error(&err, rerun));
            1
        }
    }
}
