//! Ordered release steps
//!
//! Every step runs in sequence and the first failure aborts the release.
//! Dry-run is handled by the [`Runner`]: steps mark which commands mutate
//! shared state (commits, tags, pushes, uploads) and those are skipped.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::ReleaseConfig;
use crate::release::changelog::Changelog;
use crate::release::command::{Runner, args};
use crate::release::error::ReleaseError;
use crate::release::forge;
use crate::release::markdown;
use crate::release::metadata::{self, Metadata};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseOptions {
    pub version: String,
    /// One line summary used in the commit, tag and release title
    pub summary: String,
    pub dry_run: bool,
    /// Stop after rewriting files for the Forge
    pub just_forge_update: bool,
    pub run_unit: bool,
    pub run_acceptance: bool,
}

impl ReleaseOptions {
    pub fn new(version: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            summary: summary.into(),
            dry_run: false,
            just_forge_update: false,
            run_unit: true,
            run_acceptance: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ConfirmClean,
    PrepareChangelog,
    UpdateMetadata,
    StageReleaseFiles,
    CheckReference,
    CheckTemplateUpdate,
    Validate,
    UnitTests,
    AcceptanceTests,
    CommitRelease,
    TagRelease,
    ForgeLinks,
    Build,
    Publish,
    RestoreWorkingTree,
    RestoreDevHeader,
    CommitDevHeader,
    Push,
    CreateRemoteRelease,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::ConfirmClean => "confirm clean",
            Step::PrepareChangelog => "prepare changelog",
            Step::UpdateMetadata => "update metadata",
            Step::StageReleaseFiles => "stage release files",
            Step::CheckReference => "check reference",
            Step::CheckTemplateUpdate => "check template update",
            Step::Validate => "validate",
            Step::UnitTests => "unit tests",
            Step::AcceptanceTests => "acceptance tests",
            Step::CommitRelease => "commit release",
            Step::TagRelease => "tag release",
            Step::ForgeLinks => "forge links",
            Step::Build => "build",
            Step::Publish => "publish",
            Step::RestoreWorkingTree => "restore working tree",
            Step::RestoreDevHeader => "restore dev header",
            Step::CommitDevHeader => "commit dev header",
            Step::Push => "push",
            Step::CreateRemoteRelease => "create remote release",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Steps to run, in order
pub fn plan(options: &ReleaseOptions, acceptance_available: bool) -> Vec<Step> {
    let mut steps = vec![Step::ConfirmClean, Step::PrepareChangelog, Step::UpdateMetadata];
    if options.just_forge_update {
        steps.push(Step::ForgeLinks);
        return steps;
    }

    steps.extend([
        Step::StageReleaseFiles,
        Step::CheckReference,
        Step::CheckTemplateUpdate,
        Step::Validate,
    ]);
    if options.run_unit {
        steps.push(Step::UnitTests);
    }
    if options.run_acceptance && acceptance_available {
        steps.push(Step::AcceptanceTests);
    }
    steps.extend([
        Step::CommitRelease,
        Step::TagRelease,
        Step::ForgeLinks,
        Step::Build,
        Step::Publish,
        Step::RestoreWorkingTree,
        Step::RestoreDevHeader,
        Step::CommitDevHeader,
        Step::Push,
        Step::CreateRemoteRelease,
    ]);
    steps
}

/// One release of the module in `repo`
pub struct Release<R: Runner> {
    repo: PathBuf,
    options: ReleaseOptions,
    config: ReleaseConfig,
    runner: R,
    changelog: Option<Changelog>,
    notes: String,
    metadata: Option<Metadata>,
}

impl<R: Runner> Release<R> {
    pub fn new(
        repo: impl Into<PathBuf>,
        options: ReleaseOptions,
        config: ReleaseConfig,
        runner: R,
    ) -> Self {
        Self {
            repo: repo.into(),
            options,
            config,
            runner,
            changelog: None,
            notes: String::new(),
            metadata: None,
        }
    }

    pub fn steps(&self) -> Vec<Step> {
        let acceptance_available = self.repo.join(&self.config.acceptance_dir).exists();
        plan(&self.options, acceptance_available)
    }

    /// Release notes captured from the changelog
    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub async fn run(&mut self) -> Result<(), ReleaseError> {
        for step in self.steps() {
            info!("Release step: {}", step);
            self.execute(step)
                .await
                .map_err(|source| ReleaseError::Step {
                    step,
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }

    async fn execute(&mut self, step: Step) -> Result<(), ReleaseError> {
        let version = self.options.version.clone();
        let commands = self.config.commands.clone();

        match step {
            Step::ConfirmClean => self.confirm_clean().await,
            Step::PrepareChangelog => {
                let mut changelog = Changelog::read(&self.changelog_path())?;
                self.notes = changelog.extract_release(&version)?;
                info!("Updating {} with release {}", changelog.path().display(), version);
                changelog.write()?;
                self.changelog = Some(changelog);
                Ok(())
            }
            Step::UpdateMetadata => {
                let path = self.repo.join(&self.config.metadata);
                self.metadata = Some(metadata::update(&path, &version)?);
                Ok(())
            }
            Step::StageReleaseFiles => {
                let changelog = self.changelog_arg();
                let metadata = self.metadata_arg();
                self.git(&["add", changelog.as_str(), metadata.as_str()], false)
                    .await
            }
            Step::CheckReference => {
                info!("Confirming that the reference is up-to-date");
                self.run_configured(&commands.reference, false).await?;
                self.confirm_clean().await
            }
            Step::CheckTemplateUpdate => {
                info!("Confirming that the template update does nothing");
                self.run_configured(&commands.template_update, false).await?;
                self.confirm_clean().await
            }
            Step::Validate => self.run_configured(&commands.validate, false).await,
            Step::UnitTests => self.run_configured(&commands.unit, false).await,
            Step::AcceptanceTests => self.run_configured(&commands.acceptance, false).await,
            Step::CommitRelease => {
                let summary = &self.options.summary;
                let summary = summary.strip_suffix('.').unwrap_or(summary);
                let message = format!("Release {}: {}.", version, summary);
                self.git(&["commit", "-m", message.as_str()], true).await
            }
            Step::TagRelease => {
                let tag = format!("v{}", version);
                let message = format!("{}: {}\n\n{}", version, self.options.summary, self.notes);
                self.git(&["tag", tag.as_str(), "-sm", message.as_str()], true)
                    .await
            }
            Step::ForgeLinks => {
                let metadata = self.metadata()?;
                forge::update_for_forge(&self.repo, &metadata)?;
                Ok(())
            }
            Step::Build => self.run_configured(&commands.build, false).await,
            Step::Publish => self.run_configured(&commands.publish, true).await,
            Step::RestoreWorkingTree => self.git(&["restore", "."], true).await,
            Step::RestoreDevHeader => {
                let mut changelog = match self.changelog.take() {
                    Some(changelog) => changelog,
                    None => Changelog::read(&self.changelog_path())?,
                };
                changelog.insert_dev_header(&self.config.dev_header)?;
                info!(
                    "Updating {} with {:?} header",
                    changelog.path().display(),
                    self.config.dev_header
                );
                changelog.write()?;
                self.changelog = Some(changelog);
                Ok(())
            }
            Step::CommitDevHeader => {
                let changelog = self.changelog_arg();
                self.git(&["add", changelog.as_str()], false).await?;
                let message = format!(
                    "Add “{}” header back to {}.",
                    self.config.dev_header, changelog
                );
                self.git(&["commit", "-m", message.as_str()], true).await
            }
            Step::Push => {
                let remote = self.config.remote.clone();
                let branch = self.config.branch.clone();
                self.git(&["push", "--tags", remote.as_str(), branch.as_str()], true)
                    .await
            }
            Step::CreateRemoteRelease => {
                let notes = markdown::unwrap(&self.notes);
                let artifact = self.artifact()?;
                let title = format!("{}: {}", version, self.options.summary);
                let tag = format!("v{}", version);
                let argv = args(&[
                    "release",
                    "create",
                    "--title",
                    title.as_str(),
                    "--notes",
                    notes.as_str(),
                    tag.as_str(),
                    artifact.as_str(),
                ]);
                self.runner.run("gh", &argv, true).await?;
                Ok(())
            }
        }
    }

    async fn confirm_clean(&self) -> Result<(), ReleaseError> {
        let untracked = self
            .runner
            .capture(
                "git",
                &args(&["ls-files", "--exclude-standard", "--other"]),
                false,
            )
            .await?;
        if !untracked.is_empty() {
            println!("{}", untracked.trim_end());
            return Err(ReleaseError::UntrackedFiles);
        }

        self.git(&["diff", "--color", "--exit-code"], false).await
    }

    async fn git(&self, words: &[&str], mutating: bool) -> Result<(), ReleaseError> {
        self.runner.run("git", &args(words), mutating).await?;
        Ok(())
    }

    async fn run_configured(&self, argv: &[String], mutating: bool) -> Result<(), ReleaseError> {
        let Some((program, rest)) = argv.split_first() else {
            warn!("No command configured; skipping");
            return Ok(());
        };
        self.runner.run(program, rest, mutating).await?;
        Ok(())
    }

    fn changelog_path(&self) -> PathBuf {
        self.repo.join(&self.config.changelog)
    }

    fn changelog_arg(&self) -> String {
        self.config.changelog.to_string_lossy().into_owned()
    }

    fn metadata_arg(&self) -> String {
        self.config.metadata.to_string_lossy().into_owned()
    }

    fn metadata(&self) -> Result<Metadata, ReleaseError> {
        match &self.metadata {
            Some(metadata) => Ok(metadata.clone()),
            None => metadata::read(&self.repo.join(&self.config.metadata)),
        }
    }

    /// First built package, relative to the repository
    fn artifact(&self) -> Result<String, ReleaseError> {
        let relative = self.config.artifact_pattern(&self.options.version);
        let pattern = format!(
            "{}/{}",
            glob::Pattern::escape(&self.repo.to_string_lossy()),
            relative
        );

        let first = glob::glob(&pattern)
            .map_err(|source| ReleaseError::Pattern {
                pattern: pattern.clone(),
                source,
            })?
            .filter_map(Result::ok)
            .next();

        match first {
            Some(path) => Ok(relative_to(&self.repo, &path)),
            None if self.options.dry_run => {
                warn!("No artifact matches {}", relative);
                Ok(relative)
            }
            None => Err(ReleaseError::MissingArtifact { pattern: relative }),
        }
    }
}

fn relative_to(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
