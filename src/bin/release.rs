use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use go_provision::config::{FORGE_TOKEN_ENV, ReleaseConfig};
use go_provision::release::{CommandRunner, Release, ReleaseOptions};

/// Make a release.
#[derive(Parser, Debug)]
#[command(name = "release", version)]
struct Cli {
    /// The version to release. Will be set in metadata.json
    #[arg(value_name = "VERSION")]
    release_version: String,

    /// The one line summary of the release
    summary: String,

    /// May be left off if $PDK_FORGE_TOKEN is set
    #[arg(short = 't', long, env = "PDK_FORGE_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    forge_token: Option<String>,

    /// Don’t commit or publish any changes
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Just update files as if we were going to build a package to upload to
    /// the Forge
    #[arg(long)]
    just_forge_update: bool,

    /// Skip acceptance tests
    #[arg(long)]
    no_acceptance: bool,

    /// Skip unit tests
    #[arg(long)]
    no_unit: bool,

    /// Repository to release
    #[arg(short = 'C', long, value_name = "DIR", default_value = ".")]
    repo: PathBuf,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

fn usage_error(message: &str) -> ExitCode {
    eprintln!("{}", message);
    eprintln!();
    eprint!("{}", Cli::command().render_help());
    ExitCode::FAILURE
}

fn options(cli: &Cli) -> Result<ReleaseOptions, String> {
    if semver::Version::parse(&cli.release_version).is_err() {
        return Err(format!(
            "Invalid version {:?}: expected X.Y.Z",
            cli.release_version
        ));
    }

    Ok(ReleaseOptions {
        version: cli.release_version.clone(),
        summary: cli.summary.clone(),
        dry_run: cli.dry_run,
        just_forge_update: cli.just_forge_update,
        run_unit: !cli.no_unit,
        run_acceptance: !cli.no_acceptance,
    })
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    let token = match cli.forge_token.as_deref() {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => {
            return usage_error(&format!(
                "Must specify TOKEN (use ${} environment variable)",
                FORGE_TOKEN_ENV
            ));
        }
    };

    let options = match options(&cli) {
        Ok(options) => options,
        Err(message) => return usage_error(&message),
    };

    let _guard = match go_provision::logging::init(cli.verbose, None, false) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(cli.repo, options, token);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(repo: PathBuf, options: ReleaseOptions, token: String) -> anyhow::Result<()> {
    let config = ReleaseConfig::load(&repo)?;
    let runner = CommandRunner::new(options.dry_run)
        .with_working_dir(&repo)
        .with_env(FORGE_TOKEN_ENV, token);

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(async {
            let mut release = Release::new(&repo, options, config, runner);
            release.run().await
        })?;
    Ok(())
}
