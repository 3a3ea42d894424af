//! `issuer copy`: copy the items of one project into another

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Args;
use issuer_core::{Account, AccountType, Config};
use issuer_github::{copy_items, GitHubClient, Project};
use tracing::info;

#[derive(Args, Debug)]
pub struct CopyArgs {
    /// Kind of account owning both projects
    #[arg(long, default_value = "organization")]
    pub account_type: AccountType,

    /// Login of the account owning both projects
    #[arg(long)]
    pub account_name: String,

    /// Number of the project to copy from
    #[arg(long)]
    pub source: u64,

    /// Number of the project to copy into
    #[arg(long)]
    pub target: u64,

    /// Maximum number of items to copy (0 copies all items)
    #[arg(long, default_value_t = 0)]
    pub max_items: usize,

    /// Print the source project's fields and items as JSON, then stop
    #[arg(long)]
    pub debug: bool,
}

impl CopyArgs {
    fn account(&self) -> Account {
        Account::new(self.account_type, self.account_name.clone())
    }

    pub async fn execute(
        &self,
        config: &Config,
        token: &str,
        shutdown: Arc<AtomicBool>,
    ) -> anyhow::Result<()> {
        let client = GitHubClient::new(token, config)?.with_shutdown(shutdown);
        let source = Project::new(self.account(), self.source);

        if self.debug {
            let fields = source.fields(&client).await?;
            println!("{}", serde_json::to_string_pretty(fields)?);
            let items = source.items(&client).await?;
            println!("{}", serde_json::to_string_pretty(&items)?);
            return Ok(());
        }

        let target = Project::new(self.account(), self.target);
        info!(source = %source.url(), target = %target.url(), "Copying project items");

        let report = copy_items(&client, &source, &target, &config.fields, self.max_items).await?;
        println!(
            "Copied {} items ({} skipped, {} failed)",
            report.processed, report.skipped, report.failed
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: CopyArgs,
    }

    #[test]
    fn test_defaults_to_organization() {
        let parsed = Harness::try_parse_from([
            "copy",
            "--account-name",
            "acme",
            "--source",
            "1",
            "--target",
            "2",
        ])
        .unwrap();
        assert_eq!(parsed.args.account(), Account::organization("acme"));
        assert_eq!(parsed.args.max_items, 0);
        assert!(!parsed.args.debug);
    }

    #[test]
    fn test_requires_target() {
        let result = Harness::try_parse_from(["copy", "--account-name", "acme", "--source", "1"]);
        assert!(result.is_err());
    }
}
