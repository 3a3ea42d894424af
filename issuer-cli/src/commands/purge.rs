//! `issuer purge`: empty a project and close a repository's issues

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::bail;
use clap::Args;
use issuer_core::{Account, AccountType, Config};
use issuer_github::{close_all_issues, parse_repo, purge_items, GitHubClient, Project};
use tracing::info;

#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Kind of account owning the project and repository
    #[arg(long, default_value = "organization")]
    pub account_type: AccountType,

    /// Login of the account owning the project and repository
    #[arg(long)]
    pub account_name: String,

    /// Number of the project whose items are deleted
    #[arg(long)]
    pub project: Option<u64>,

    /// Repository whose open issues are closed (name, owner/repo or URL)
    #[arg(long)]
    pub repo: Option<String>,

    /// Leave the repository's issues open
    #[arg(long)]
    pub keep_issues: bool,
}

impl PurgeArgs {
    /// Owner and name of the repository to close issues in, if any
    fn repository(&self) -> anyhow::Result<Option<(String, String)>> {
        if self.keep_issues {
            return Ok(None);
        }
        match &self.repo {
            None => Ok(None),
            Some(repo) if repo.contains('/') || repo.contains(':') => Ok(Some(parse_repo(repo)?)),
            Some(name) => Ok(Some((self.account_name.clone(), name.clone()))),
        }
    }

    pub async fn execute(
        &self,
        config: &Config,
        token: &str,
        shutdown: Arc<AtomicBool>,
    ) -> anyhow::Result<()> {
        let repository = self.repository()?;
        if self.project.is_none() && repository.is_none() {
            bail!("Nothing to purge: pass --project and/or --repo");
        }

        let client = GitHubClient::new(token, config)?.with_shutdown(shutdown);

        if let Some(number) = self.project {
            let project = Project::new(Account::new(self.account_type, self.account_name.clone()), number);
            let report = purge_items(&client, &project).await?;
            println!(
                "Deleted {} items from {} ({} failed)",
                report.processed,
                project.url(),
                report.failed
            );
        }

        if let Some((owner, repo)) = repository {
            info!(repo = %format!("{}/{}", owner, repo), "Closing open issues");
            let report = close_all_issues(&client, &owner, &repo).await?;
            println!(
                "Closed {} issues in {}/{} ({} already closed, {} failed)",
                report.processed, owner, repo, report.skipped, report.failed
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(repo: Option<&str>, keep_issues: bool) -> PurgeArgs {
        PurgeArgs {
            account_type: AccountType::Organization,
            account_name: "acme".to_string(),
            project: Some(3),
            repo: repo.map(str::to_string),
            keep_issues,
        }
    }

    #[test]
    fn test_bare_repo_name_uses_account() {
        let repo = args(Some("widgets"), false).repository().unwrap();
        assert_eq!(repo, Some(("acme".to_string(), "widgets".to_string())));
    }

    #[test]
    fn test_full_repo_reference() {
        let repo = args(Some("https://github.com/other/tools"), false)
            .repository()
            .unwrap();
        assert_eq!(repo, Some(("other".to_string(), "tools".to_string())));
    }

    #[test]
    fn test_keep_issues_skips_repo() {
        assert_eq!(args(Some("widgets"), true).repository().unwrap(), None);
    }
}
