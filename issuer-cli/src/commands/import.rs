//! `issuer import`: create the issues of a CSV file

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use issuer_core::{load, read_rows, Config, FailurePolicy, Overrides, Schema};
use issuer_github::{GitHubClient, ProjectRegistry, UploadOptions, UploadReport, Uploader};
use tracing::info;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// CSV file listing the issues to create, one per row
    #[arg(short, long, value_name = "FILE")]
    pub issues_file: PathBuf,

    /// Maximum number of rows to import (0 imports all rows)
    #[arg(short, long, default_value_t = 0)]
    pub max_import: usize,

    /// Column convention: auto, meta or parent
    #[arg(long, default_value = "auto")]
    pub schema: Schema,

    /// What to do when an issue fails: skip, abort or retry-once
    #[arg(long)]
    pub on_failure: Option<FailurePolicy>,

    /// Skip rows whose title already exists in the repository
    #[arg(long)]
    pub skip_existing: bool,

    /// Do not link children to parents as GitHub sub-issues
    #[arg(long)]
    pub no_link: bool,

    /// Log what would be created without calling GitHub
    #[arg(long)]
    pub dry_run: bool,

    /// Print the upload report as JSON
    #[arg(long)]
    pub json: bool,
}

impl ImportArgs {
    /// Config overrides carried by this command's flags
    pub fn overrides(&self, log_dir: Option<PathBuf>) -> Overrides {
        Overrides {
            on_failure: self.on_failure,
            skip_existing: self.skip_existing.then_some(true),
            link_sub_issues: self.no_link.then_some(false),
            log_dir,
            ..Default::default()
        }
    }

    pub async fn execute(
        &self,
        config: &Config,
        token: &str,
        shutdown: Arc<AtomicBool>,
    ) -> anyhow::Result<()> {
        let rows = read_rows(&self.issues_file)
            .with_context(|| format!("Failed to read {}", self.issues_file.display()))?;
        let mut graph = load(&rows, self.max_import, self.schema)?;

        if self.max_import > 0 {
            info!(max = self.max_import, "Importing up to {} issues", self.max_import);
        }
        info!(
            issues = graph.issues.len(),
            meta_issues = graph.meta_issues.len(),
            links = graph.parents.len(),
            file = %self.issues_file.display(),
            "Loaded issues"
        );

        let client = GitHubClient::new(token, config)?.with_shutdown(shutdown);
        let mut options = UploadOptions::from_config(config);
        options.dry_run = self.dry_run;

        let mut uploader = Uploader::new(&client, ProjectRegistry::new(), options);
        uploader
            .check_repositories(&graph)
            .await
            .context("Repository check failed")?;
        let report = uploader.upload(&mut graph).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report, self.dry_run, graph.len());
        }
        Ok(())
    }
}

fn print_report(report: &UploadReport, dry_run: bool, total: usize) {
    if dry_run {
        println!("Dry run: {} issues would be created", total);
        return;
    }

    println!();
    println!("Created: {}", report.created);
    println!("Skipped: {}", report.skipped);
    println!("Linked:  {}", report.linked);
    if !report.failures.is_empty() {
        println!("Failed:  {}", report.failures.len());
        for failure in &report.failures {
            println!(
                "  row {} {:?} ({}): {}",
                failure.row, failure.title, failure.state, failure.error
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(skip_existing: bool, no_link: bool) -> ImportArgs {
        ImportArgs {
            issues_file: PathBuf::from("issues.csv"),
            max_import: 0,
            schema: Schema::Auto,
            on_failure: None,
            skip_existing,
            no_link,
            dry_run: false,
            json: false,
        }
    }

    #[test]
    fn test_unset_flags_do_not_override() {
        let overrides = args(false, false).overrides(None);
        assert_eq!(overrides.skip_existing, None);
        assert_eq!(overrides.link_sub_issues, None);
        assert_eq!(overrides.on_failure, None);

        let config = Config::default().with_cli_overrides(overrides);
        assert!(config.upload.link_sub_issues);
    }

    #[test]
    fn test_flags_override_config() {
        let config = Config::default().with_cli_overrides(args(true, true).overrides(None));
        assert!(config.upload.skip_existing);
        assert!(!config.upload.link_sub_issues);
    }

    #[tokio::test]
    async fn test_dry_run_needs_no_network() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, issuer_core::graph::META_SAMPLE.as_bytes()).unwrap();

        let mut import = args(false, false);
        import.issues_file = file.path().to_path_buf();
        import.dry_run = true;

        import
            .execute(&Config::default(), "", Arc::new(AtomicBool::new(false)))
            .await
            .unwrap();
    }
}
