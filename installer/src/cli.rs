//! CLI argument definitions for wirefetch.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Create ProcessWire projects and keep their modules current.
#[derive(Parser, Debug)]
#[command(name = "wirefetch")]
#[command(version, about)]
#[command(long_about = concat!(
    "Create ProcessWire projects and keep their modules current.\n\n",
    "`new` downloads a ProcessWire release (the stable master branch unless --sha ",
    "names another branch or commit) and unpacks it into a project directory. ",
    "Running it again in a finished install does nothing.\n\n",
    "`modules` compares the modules installed in a project with the versions ",
    "published in the ProcessWire module directory.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Create a project from the latest stable release:\n",
    "    $ wirefetch new shop\n\n",
    "  Create a project from the dev branch with the blank profile:\n",
    "    $ wirefetch new shop --sha dev --profile blank\n\n",
    "  Create a project from a release downloaded earlier:\n",
    "    $ wirefetch new shop --src ~/Downloads/processwire-master.zip\n\n",
    "  Check whether a newer core is available:\n",
    "    $ wirefetch upgrade --path shop\n\n",
    "  List modules with newer versions, as JSON:\n",
    "    $ wirefetch modules --only-new --json\n\n",
    "  Install a module from the module directory:\n",
    "    $ wirefetch module-install TracyDebugger\n\n",
    "CONFIGURATION:\n",
    "  Endpoints and the module service are read from wirefetch.toml in the\n",
    "  platform configuration directory, or from --config. The variables\n",
    "  WIREFETCH_MODULE_SERVICE_URL, WIREFETCH_MODULE_SERVICE_KEY, and\n",
    "  WIREFETCH_LOOKUP_TIMEOUT_MS override the file.",
))]
pub struct Cli {
    /// Configuration file [default: platform-specific].
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Download ProcessWire into a new project directory.
    New(NewArgs),

    /// Compare the installed core with a published release.
    Upgrade(UpgradeArgs),

    /// Compare installed modules with the module directory.
    Modules(ModulesArgs),

    /// Download a module into `site/modules`.
    ModuleInstall(ModuleInstallArgs),
}

/// Arguments for the `new` command.
#[derive(Args, Debug, Clone, Default)]
pub struct NewArgs {
    /// Directory where the project will be created [default: current directory].
    #[arg(value_name = "DIRECTORY")]
    pub directory: Option<Utf8PathBuf>,

    /// Branch name or commit to download instead of master.
    #[arg(long, value_name = "SHA", conflicts_with = "src")]
    pub sha: Option<String>,

    /// Pre-downloaded release: a directory, .zip, .tgz, or .tar.gz.
    #[arg(long, value_name = "PATH")]
    pub src: Option<Utf8PathBuf>,

    /// Site profile: `path/to/profile.zip` or one of the bundled names
    /// (`blank`, `beginner`, `classic`, `default`, `languages`).
    #[arg(long, value_name = "PROFILE")]
    pub profile: Option<String>,

    /// Suppress progress output (errors still shown).
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the `upgrade` command.
#[derive(Args, Debug, Clone, Default)]
pub struct UpgradeArgs {
    /// Branch name or commit to compare against instead of master.
    #[arg(long, value_name = "SHA")]
    pub sha: Option<String>,

    /// Directory inside the project [default: current directory].
    #[arg(long, value_name = "DIR")]
    pub path: Option<Utf8PathBuf>,

    /// Also list every known branch.
    #[arg(long)]
    pub branches: bool,
}

/// Arguments for the `modules` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ModulesArgs {
    /// Only report modules with a newer published version.
    #[arg(long)]
    pub only_new: bool,

    /// Output as JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Check a single module by class name.
    #[arg(long, value_name = "NAME")]
    pub module: Option<String>,

    /// Directory inside the project [default: current directory].
    #[arg(long, value_name = "DIR")]
    pub path: Option<Utf8PathBuf>,
}

/// Arguments for the `module-install` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ModuleInstallArgs {
    /// Module class name.
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Archive URL [default: looked up in the module directory].
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Directory inside the project [default: current directory].
    #[arg(long, value_name = "DIR")]
    pub path: Option<Utf8PathBuf>,

    /// Suppress progress output (errors still shown).
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
