use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use go_provision::config::{
    DEFAULT_INDEX_URL, DEFAULT_INSTALL_PATH, DEFAULT_LINK_DIR, DEFAULT_SOURCE_PREFIX,
};
use go_provision::install::fetch::HttpFetcher;
use go_provision::install::state_file::state_file;
use go_provision::install::{
    Installation, LinkEnsure, LinkedBinaries, Outcome, Platform, TarballEnsure, TarballResource,
};
use go_provision::version::Ensure;
use go_provision::version::cache::{LatestVersionCache, latest_version};
use go_provision::version::index::GoDevIndex;
use tracing::warn;
use url::Url;

#[derive(Parser)]
#[command(name = "go-provision")]
#[command(version, about = "Idempotent Go toolchain installation")]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the newest stable Go version
    LatestVersion {
        #[arg(long, default_value = DEFAULT_INDEX_URL)]
        url: String,
    },
    /// Print the sentinel file path for an installation directory
    StateFile { path: PathBuf },
    /// Install or remove an archive keyed by its source URL
    Tarball {
        path: PathBuf,
        #[arg(long)]
        source: Option<Url>,
        #[arg(long, default_value = "present")]
        ensure: TarballEnsure,
        #[arg(long, value_name = "PATH")]
        state_file: Option<PathBuf>,
        #[command(flatten)]
        ownership: OwnershipArgs,
    },
    /// Install or remove a Go version
    Install {
        path: PathBuf,
        #[command(flatten)]
        version: VersionArgs,
        #[command(flatten)]
        ownership: OwnershipArgs,
    },
    /// Maintain symlinks to an installation's binaries
    Link {
        source: PathBuf,
        #[arg(long, value_name = "DIR")]
        into_bin: PathBuf,
        #[arg(long, default_value = "present")]
        ensure: LinkEnsure,
    },
    /// Install Go and link its binaries
    Setup {
        #[arg(long, default_value = DEFAULT_INSTALL_PATH)]
        path: PathBuf,
        #[arg(long, value_name = "DIR", default_value = DEFAULT_LINK_DIR)]
        link_into: PathBuf,
        #[command(flatten)]
        version: VersionArgs,
        #[command(flatten)]
        ownership: OwnershipArgs,
        /// Deprecated and ignored; use --ensure
        #[arg(long = "version", hide = true, value_name = "VERSION")]
        legacy_version: Option<String>,
        /// Deprecated and ignored; use --ensure and --source-prefix
        #[arg(long = "source", hide = true, value_name = "URL")]
        legacy_source: Option<String>,
    },
}

#[derive(Args)]
struct VersionArgs {
    /// present, absent, latest or a version such as 1.19.1
    #[arg(long, default_value = "present")]
    ensure: Ensure,
    #[arg(long, default_value = DEFAULT_SOURCE_PREFIX)]
    source_prefix: String,
    #[arg(long, default_value = DEFAULT_INDEX_URL)]
    index_url: String,
    /// Override the detected OS (Go spelling, e.g. darwin)
    #[arg(long)]
    os: Option<String>,
    /// Override the detected architecture (Go spelling, e.g. arm64)
    #[arg(long)]
    arch: Option<String>,
}

#[derive(Args)]
struct OwnershipArgs {
    #[arg(long)]
    owner: Option<String>,
    #[arg(long)]
    group: Option<String>,
    /// Mode of the installation directory, in octal
    #[arg(long, value_parser = parse_mode, default_value = "0755")]
    mode: u32,
}

fn parse_mode(value: &str) -> Result<u32, String> {
    u32::from_str_radix(value, 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
        .ok_or_else(|| format!("invalid octal mode: {value}"))
}

impl VersionArgs {
    fn platform(&self) -> anyhow::Result<Platform> {
        let detected = Platform::current();
        match (&self.os, &self.arch, detected) {
            (Some(os), Some(arch), _) => Ok(Platform::new(os, arch)),
            (os, arch, Ok(current)) => Ok(Platform::new(
                os.clone().unwrap_or(current.os),
                arch.clone().unwrap_or(current.arch),
            )),
            (_, _, Err(e)) => Err(e).context("Pass --os and --arch to override"),
        }
    }

    fn installation(&self, path: &Path, ownership: &OwnershipArgs) -> anyhow::Result<Installation> {
        let mut installation = Installation::new(path, self.ensure.clone(), self.platform()?);
        installation.source_prefix = self.source_prefix.clone();
        installation.index_url = self.index_url.clone();
        installation.owner = ownership.owner.clone();
        installation.group = ownership.group.clone();
        installation.mode = ownership.mode;
        Ok(installation)
    }
}

/// Notices for `setup` options that are accepted but no longer have an effect
fn deprecations(legacy_version: Option<&str>, legacy_source: Option<&str>) -> Vec<String> {
    let mut notices = Vec::new();
    if let Some(version) = legacy_version {
        notices.push(format!(
            "--version {version} is deprecated and ignored; use --ensure {version}"
        ));
    }
    if let Some(source) = legacy_source {
        notices.push(format!("--source {source} is deprecated and ignored; use --source-prefix"));
    }
    notices
}

fn report(path: &Path, outcome: Outcome) {
    println!("{}: {}", path.display(), outcome);
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::LatestVersion { url } => {
            println!("{}", latest_version(&url).await?);
        }
        Command::StateFile { path } => {
            println!("{}", state_file(&path)?.display());
        }
        Command::Tarball {
            path,
            source,
            ensure,
            state_file,
            ownership,
        } => {
            let resource = TarballResource {
                path: path.clone(),
                ensure,
                source,
                state_file,
                owner: ownership.owner,
                group: ownership.group,
                mode: ownership.mode,
            };
            let outcome = resource
                .apply(&HttpFetcher::default())
                .await
                .with_context(|| format!("Failed to ensure {} {}", path.display(), ensure))?;
            report(&path, outcome);
        }
        Command::Install {
            path,
            version,
            ownership,
        } => {
            let installation = version.installation(&path, &ownership)?;
            let cache = LatestVersionCache::new(GoDevIndex::new());
            let outcome = installation
                .apply(&cache, &HttpFetcher::default())
                .await
                .with_context(|| {
                    format!("Failed to ensure Go {} at {}", version.ensure, path.display())
                })?;
            report(&path, outcome);
        }
        Command::Link {
            source,
            into_bin,
            ensure,
        } => {
            for change in LinkedBinaries::new(source, into_bin, ensure).apply()? {
                println!("{}", change);
            }
        }
        Command::Setup {
            path,
            link_into,
            version,
            ownership,
            legacy_version,
            legacy_source,
        } => {
            for notice in deprecations(legacy_version.as_deref(), legacy_source.as_deref()) {
                warn!("{}", notice);
            }
            let installation = version.installation(&path, &ownership)?;
            let link_ensure = match version.ensure {
                Ensure::Absent => LinkEnsure::Absent,
                _ => LinkEnsure::Present,
            };
            let links = LinkedBinaries::new(&path, &link_into, link_ensure);
            let cache = LatestVersionCache::new(GoDevIndex::new());
            let fetcher = HttpFetcher::default();

            // Links go first on removal so they never dangle into a missing tree
            if link_ensure == LinkEnsure::Absent {
                for change in links.apply()? {
                    println!("{}", change);
                }
            }

            let outcome = installation
                .apply(&cache, &fetcher)
                .await
                .with_context(|| {
                    format!("Failed to ensure Go {} at {}", version.ensure, path.display())
                })?;
            report(&path, outcome);

            if link_ensure == LinkEnsure::Present {
                for change in links.apply()? {
                    println!("{}", change);
                }
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_file = cli.log_file.as_deref();
    let _guard = match go_provision::logging::init(cli.verbose, log_file, cli.log_json) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(anyhow::Error::from)
        .and_then(|runtime| runtime.block_on(run(cli.command)));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use go_provision::config::DEFAULT_MODE;
    use rstest::rstest;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case("0755", Some(0o755))]
    #[case("700", Some(0o700))]
    #[case("04755", Some(0o4755))]
    #[case("0999", None)]
    #[case("77777", None)]
    fn parse_mode_reads_octal(#[case] input: &str, #[case] expected: Option<u32>) {
        assert_eq!(parse_mode(input).ok(), expected);
    }

    #[test]
    fn install_accepts_exact_version() {
        let cli = Cli::try_parse_from(["go-provision", "install", "/opt/go", "--ensure", "1.19.1"])
            .unwrap();

        match cli.command {
            Command::Install { version, .. } => {
                assert_eq!(version.ensure.to_string(), "1.19.1")
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn install_rejects_invalid_ensure() {
        let result =
            Cli::try_parse_from(["go-provision", "install", "/opt/go", "--ensure", "Present"]);

        assert!(result.is_err());
    }

    #[test]
    fn setup_accepts_deprecated_version_and_source() {
        let cli = Cli::try_parse_from([
            "go-provision",
            "setup",
            "--ensure",
            "latest",
            "--version",
            "1.19.1",
            "--source",
            "http://no-such-host",
        ])
        .unwrap();

        match cli.command {
            Command::Setup {
                version,
                legacy_version,
                legacy_source,
                ..
            } => {
                assert_eq!(version.ensure, Ensure::Latest);
                let notices = deprecations(legacy_version.as_deref(), legacy_source.as_deref());
                assert_eq!(notices.len(), 2);
                assert!(notices.iter().all(|notice| notice.contains("deprecated")));
            }
            _ => panic!("expected setup"),
        }
    }

    #[test]
    fn deprecations_are_empty_without_legacy_options() {
        assert!(deprecations(None, None).is_empty());
    }

    #[test]
    fn tarball_defaults_to_present_with_default_mode() {
        let cli = Cli::try_parse_from([
            "go-provision",
            "tarball",
            "/opt/go",
            "--source",
            "https://go.dev/dl/go1.19.1.linux-amd64.tar.gz",
        ])
        .unwrap();

        match cli.command {
            Command::Tarball {
                ensure, ownership, ..
            } => {
                assert_eq!(ensure, TarballEnsure::Present);
                assert_eq!(ownership.mode, DEFAULT_MODE);
            }
            _ => panic!("expected tarball"),
        }
    }
}
