mod commands;
mod core;
mod logging;
mod release;
mod ui;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand};
use core::error::{ExitCode, ReleaseError, ReleaseResult, print_error};
use release::PendingMutations;
use release::image::ImageOptions;
use release::package::PackageOptions;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::thread;

/// Release automation for a downstream fork
///
/// Do not run two fork-rail invocations against the same working tree at once:
/// overlaid files and their backups are not protected across processes.
#[derive(Parser)]
#[command(name = "fork-rail")]
#[command(version, about, long_about)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  // ============================================================================
  // Releases
  // ============================================================================
  /// Build the Python distributions and upload them to the registry
  ///
  /// Exit codes: 0 success, 1 partial failure, 2 configuration error, 3 critical error.
  Package {
    /// Cloud project that owns the registry
    project_id: String,
    /// Registry region (e.g. us-east1)
    region: String,
    /// Repository inside the registry
    repo_name: String,
    /// Also build every package under the integrations directory
    #[arg(value_parser = BoolishValueParser::new(), action = ArgAction::Set, default_value = "true")]
    build_integrations: bool,
    /// Show what would happen without building or uploading
    #[arg(value_parser = BoolishValueParser::new(), action = ArgAction::Set, default_value = "false")]
    dry_run: bool,
    /// Only accept X.Y.Z release tags
    #[arg(value_parser = BoolishValueParser::new(), action = ArgAction::Set, default_value = "false")]
    force_strict_version: bool,
  },

  /// Build the container image matrix and push it to the registry
  ///
  /// Exit codes: 0 success, 1 failure.
  Image {
    /// Cloud project that owns the registry
    project_id: String,
    /// Registry region (e.g. us-east1)
    region: String,
    /// Repository inside the registry
    repo_name: String,
    /// Show the tags that would be built without building
    #[arg(value_parser = BoolishValueParser::new(), action = ArgAction::Set, default_value = "false")]
    dry_run: bool,
    /// Build without pushing
    #[arg(value_parser = BoolishValueParser::new(), action = ArgAction::Set, default_value = "false")]
    no_push: bool,
    /// Only accept X.Y.Z release tags
    #[arg(value_parser = BoolishValueParser::new(), action = ArgAction::Set, default_value = "false")]
    force_strict_version: bool,
    /// Build a single python version instead of all configured ones
    #[arg(default_value = "")]
    single_runtime_version: String,
    /// Suffix appended to every image tag
    #[arg(default_value = "")]
    image_type_suffix: String,
  },

  /// Print the release version the current tags resolve to
  Version {
    /// Only accept X.Y.Z release tags
    #[arg(long)]
    strict: bool,
    /// Resolve `<package>-<version>` tags of an integration package
    #[arg(long)]
    package: Option<String>,
  },

  /// Put back files left overlaid by an interrupted run
  Restore,

  // ============================================================================
  // Branches
  // ============================================================================
  /// Sync the fork's main and release branches with upstream
  ///
  /// Exit codes: 0 success, 1 failure.
  Sync {
    /// Show the plan without fetching, rebasing or pushing
    #[arg(long)]
    dry_run: bool,
  },
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

/// Shell convention for a run terminated by `signal`
const fn interrupted_exit_code(signal: i32) -> i32 {
  128 + signal
}

/// Drain `pending` and exit with the signal's status on the first SIGINT or SIGTERM
fn install_interrupt_handler(pending: &PendingMutations) {
  let mut signals = match Signals::new([SIGINT, SIGTERM]) {
    Ok(signals) => signals,
    Err(e) => {
      tracing::warn!(error = %e, "failed to install interrupt handler");
      return;
    }
  };
  let pending = pending.clone();
  thread::spawn(move || {
    if let Some(signal) = signals.forever().next() {
      tracing::debug!(signal, "interrupted");
      pending.drain_and_exit(interrupted_exit_code(signal));
    }
  });
}

fn main() {
  let cli = Cli::parse();
  logging::init();

  // Restorations owed to the working tree; drained if the run is interrupted
  let pending = PendingMutations::new();
  install_interrupt_handler(&pending);

  match cli.command {
    Commands::Package {
      project_id,
      region,
      repo_name,
      build_integrations,
      dry_run,
      force_strict_version,
    } => {
      let options = PackageOptions {
        build_integrations,
        dry_run,
        strict: force_strict_version,
      };
      let result = commands::run_package(&pending, &project_id, &region, &repo_name, options);
      exit_with(result, ReleaseError::exit_code)
    }
    Commands::Image {
      project_id,
      region,
      repo_name,
      dry_run,
      no_push,
      force_strict_version,
      single_runtime_version,
      image_type_suffix,
    } => {
      let options = ImageOptions {
        dry_run,
        no_push,
        strict: force_strict_version,
        single_python: single_runtime_version,
        image_type: image_type_suffix,
      };
      let result = commands::run_image(&pending, &project_id, &region, &repo_name, &options);
      exit_with(result, |_| ExitCode::Partial)
    }
    Commands::Version { strict, package } => {
      exit_with(commands::run_version(strict, package).map(|()| ExitCode::Success), ReleaseError::exit_code)
    }
    Commands::Restore => exit_with(commands::run_restore().map(|()| ExitCode::Success), ReleaseError::exit_code),
    Commands::Sync { dry_run } => exit_with(commands::run_sync(dry_run).map(|()| ExitCode::Success), |_| {
      ExitCode::Partial
    }),
  }
}

/// Report the outcome and exit; `on_error` picks the code for a failed run
fn exit_with(result: ReleaseResult<ExitCode>, on_error: impl FnOnce(&ReleaseError) -> ExitCode) -> ! {
  match result {
    Ok(code) => std::process::exit(code.as_i32()),
    Err(err) => {
      print_error(&err);
      std::process::exit(on_error(&err).as_i32())
    }
  }
}
