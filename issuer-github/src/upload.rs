//! Batch upload of an issue graph to GitHub
//!
//! The upload runs in three passes:
//! 1. primary issues (plain and sub issues) in CSV row order
//! 2. meta issues, whose body gets a checklist of their created sub issues
//! 3. sub-issue links from each child to its parent
//!
//! Each issue moves through [`IssueState`] and a failed issue can resume from
//! the state it reached. What happens after a failure is decided by the
//! [`FailurePolicy`].

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use issuer_core::{Config, FailurePolicy, FieldNames, Issue, IssueGraph, IssueState, NodeRef};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::graphql::{FieldUpdate, FieldValue};
use crate::issues::Repository;
use crate::project::{Project, ProjectRegistry};
use crate::{Error, GitHubClient, Result};

/// Options for uploading a batch
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub on_failure: FailurePolicy,
    /// Wait before the second attempt with [`FailurePolicy::RetryOnce`]
    pub failure_delay: Duration,
    /// Skip rows whose title already exists in the target repository
    pub skip_existing: bool,
    /// Link children to parents with GitHub sub-issues
    pub link_sub_issues: bool,
    /// Log what would be created without calling GitHub
    pub dry_run: bool,
    pub fields: FieldNames,
}

impl UploadOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            on_failure: config.upload.on_failure,
            failure_delay: config.upload.failure_delay,
            skip_existing: config.upload.skip_existing,
            link_sub_issues: config.upload.link_sub_issues,
            dry_run: false,
            fields: config.fields.clone(),
        }
    }
}

/// An issue or link that could not be completed
#[derive(Debug, Clone, Serialize)]
pub struct UploadFailure {
    pub row: usize,
    pub title: String,
    /// State the issue had reached when it failed
    pub state: IssueState,
    pub error: String,
}

/// Result of uploading a batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadReport {
    /// Issues created, meta issues included
    pub created: usize,
    /// Rows skipped because the title already exists
    pub skipped: usize,
    /// Sub-issue links made
    pub linked: usize,
    pub failures: Vec<UploadFailure>,
}

/// Uploads an [`IssueGraph`] through a [`GitHubClient`]
pub struct Uploader<'a> {
    client: &'a GitHubClient,
    registry: ProjectRegistry,
    options: UploadOptions,
    /// Existing issue titles per `owner/repo`
    existing_titles: HashMap<String, HashSet<String>>,
}

impl<'a> Uploader<'a> {
    pub fn new(client: &'a GitHubClient, registry: ProjectRegistry, options: UploadOptions) -> Self {
        Self {
            client,
            registry,
            options,
            existing_titles: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }

    /// Fetch every target repository of `graph` once
    ///
    /// Fails on the first repository that cannot be read, before anything is
    /// created. Does nothing on a dry run.
    pub async fn check_repositories(&self, graph: &IssueGraph) -> Result<Vec<Repository>> {
        if self.options.dry_run {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut repositories = Vec::new();
        let issues = graph
            .issues
            .iter()
            .chain(graph.meta_issues.iter().map(|m| &m.issue));
        for issue in issues {
            if seen.insert(issue.repo_full_name()) {
                let repository = self
                    .client
                    .get_repository(&issue.account.name, &issue.repo_name)
                    .await?;
                debug!(
                    repo = %repository.full_name,
                    private = repository.private,
                    "Repository reachable"
                );
                repositories.push(repository);
            }
        }
        Ok(repositories)
    }

    /// Upload every issue of `graph`, updating each issue's state in place
    pub async fn upload(&mut self, graph: &mut IssueGraph) -> Result<UploadReport> {
        let mut report = UploadReport::default();

        info!(
            issues = graph.issues.len(),
            meta_issues = graph.meta_issues.len(),
            dry_run = self.options.dry_run,
            "Uploading issues"
        );
        for i in 0..graph.issues.len() {
            let body = graph.issues[i].body.clone();
            self.upload_issue(graph, NodeRef::Issue(i), body, &mut report)
                .await?;
        }

        if !graph.meta_issues.is_empty() {
            info!(count = graph.meta_issues.len(), "Uploading meta issues");
        }
        for m in 0..graph.meta_issues.len() {
            let urls = graph.sub_issue_urls(m);
            let meta = &graph.meta_issues[m];
            let missing = meta.sub_issues.len() - urls.len();
            if missing > 0 && !self.options.dry_run {
                warn!(
                    meta = meta.id(),
                    missing,
                    "Sub issues not created, leaving them out of the checklist"
                );
            }
            let body = meta.body_with_checklist(urls.iter().map(String::as_str));
            self.upload_issue(graph, NodeRef::Meta(m), body, &mut report)
                .await?;
        }

        if self.options.link_sub_issues {
            self.link_sub_issues(graph, &mut report).await?;
        }

        info!(
            created = report.created,
            skipped = report.skipped,
            linked = report.linked,
            failed = report.failures.len(),
            "Upload finished"
        );
        Ok(report)
    }

    async fn upload_issue(
        &mut self,
        graph: &mut IssueGraph,
        node: NodeRef,
        body: String,
        report: &mut UploadReport,
    ) -> Result<()> {
        let issue = graph.get(node);

        if self.options.dry_run {
            info!(
                row = issue.row,
                repo = %issue.repo_full_name(),
                project = issue.project_number,
                title = %issue.title,
                "[DRY RUN] Would create issue"
            );
            return Ok(());
        }

        if self.options.skip_existing
            && self.existing_title(issue, report).await? != Some(false)
        {
            return Ok(());
        }

        let issue = graph.get_mut(node);
        let mut retried = false;
        loop {
            let was_created = issue.is_created();
            let outcome = self.drive(issue, &body).await;
            if !was_created && issue.is_created() {
                report.created += 1;
            }

            match outcome {
                Ok(()) => return Ok(()),
                Err(e) => {
                    let retry = self
                        .on_failure(e, retried, issue.row, &issue.title, issue.state, report)
                        .await?;
                    if !retry {
                        return Ok(());
                    }
                    retried = true;
                }
            }
        }
    }

    /// Run the remaining pipeline steps of one issue
    async fn drive(&mut self, issue: &mut Issue, body: &str) -> Result<()> {
        if issue.state < IssueState::Created {
            let remote = self
                .client
                .create_issue(
                    &issue.account.name,
                    &issue.repo_name,
                    &issue.title,
                    body,
                    &issue.labels,
                )
                .await?;
            issue.mark_created(remote.number, remote.node_id, Some(remote.html_url));
            info!(number = issue.number, url = %issue.url(), title = %issue.title, "Created issue");
        }

        if !issue.has_project() {
            return Ok(());
        }
        let project = self.registry.get(&issue.account, issue.project_number);

        if issue.state < IssueState::InProject {
            let item = project.add_item(self.client, &issue.node_id).await?;
            issue.mark_in_project(item);
            info!(number = issue.number, project = %project.url(), "Added issue to project");
        }

        if issue.state < IssueState::FieldsSet {
            let updates = self.field_updates(&project, issue).await?;
            project
                .update_fields(self.client, &issue.project_item_id, &updates)
                .await?;
            issue.advance(IssueState::FieldsSet);
        }

        Ok(())
    }

    /// Field values to set on the project item of `issue`
    async fn field_updates(&self, project: &Project, issue: &Issue) -> Result<Vec<FieldUpdate>> {
        let names = &self.options.fields;
        let mut updates = Vec::new();

        if issue.project_estimate != 0.0 {
            let field = project.field_id(self.client, &names.estimate).await?;
            updates.push(FieldUpdate::new(
                field,
                FieldValue::Number(issue.project_estimate),
            ));
        }

        if let Some(id) = &issue.project_issue_id {
            // optional on the board
            match project.fields(self.client).await?.fields.get(&names.issue_id) {
                Some(field) => {
                    updates.push(FieldUpdate::new(field.clone(), FieldValue::Text(id.clone())))
                }
                None => debug!(field = %names.issue_id, "Project has no issue id field"),
            }
        }

        if let Some(status) = &issue.status {
            match project.option_id(self.client, &names.status, status).await? {
                Some(option) => {
                    let field = project.field_id(self.client, &names.status).await?;
                    updates.push(FieldUpdate::new(field, FieldValue::SingleSelect(option)));
                }
                None => warn!(
                    status = %status,
                    project = %project.url(),
                    title = %issue.title,
                    "Unknown status option, leaving field unset"
                ),
            }
        }

        if let Some(iteration) = &issue.iteration {
            match project
                .iteration_id(self.client, &names.iteration, iteration)
                .await?
            {
                Some(id) => {
                    let field = project.field_id(self.client, &names.iteration).await?;
                    updates.push(FieldUpdate::new(field, FieldValue::Iteration(id)));
                }
                None => warn!(
                    iteration = %iteration,
                    project = %project.url(),
                    title = %issue.title,
                    "Unknown iteration, leaving field unset"
                ),
            }
        }

        Ok(updates)
    }

    async fn link_sub_issues(
        &mut self,
        graph: &mut IssueGraph,
        report: &mut UploadReport,
    ) -> Result<()> {
        let links = graph.links();
        if links.is_empty() {
            return Ok(());
        }
        info!(count = links.len(), "Linking sub issues");

        for (child, parent) in links {
            let (c, p) = (graph.get(child), graph.get(parent));

            if self.options.dry_run {
                info!(child = %c.title, parent = %p.title, "[DRY RUN] Would link sub issue");
                continue;
            }
            if !c.is_created() || !p.is_created() {
                debug!(child = %c.title, parent = %p.title, "Issue missing, not linking");
                continue;
            }
            if c.state >= IssueState::Linked {
                continue;
            }

            let (parent_node, child_node) = (p.node_id.clone(), c.node_id.clone());
            let parent_number = p.number;
            let mut retried = false;
            loop {
                match self.client.add_sub_issue(&parent_node, &child_node).await {
                    Ok(()) => {
                        let c = graph.get_mut(child);
                        c.advance(IssueState::Linked);
                        info!(child = c.number, parent = parent_number, "Linked sub issue");
                        report.linked += 1;
                        break;
                    }
                    Err(e) => {
                        let c = graph.get(child);
                        let retry = self
                            .on_failure(e, retried, c.row, &c.title, c.state, report)
                            .await?;
                        if !retry {
                            break;
                        }
                        retried = true;
                    }
                }
            }
        }

        Ok(())
    }

    /// Apply the failure policy
    ///
    /// Returns `Ok(true)` when the step should be retried, `Ok(false)` when it
    /// was recorded and skipped, and the error itself to stop the batch.
    async fn on_failure(
        &self,
        error: Error,
        retried: bool,
        row: usize,
        title: &str,
        state: IssueState,
        report: &mut UploadReport,
    ) -> Result<bool> {
        if matches!(error, Error::Interrupted) {
            return Err(error);
        }

        match self.options.on_failure {
            FailurePolicy::Abort => return Err(error),
            FailurePolicy::RetryOnce if !retried && error.is_retryable() => {
                warn!(
                    row,
                    title,
                    %state,
                    error = %error,
                    delay_secs = self.options.failure_delay.as_secs(),
                    "Upload step failed, retrying once"
                );
                self.client.pause(self.options.failure_delay).await;
                return Ok(true);
            }
            _ => {}
        }

        warn!(row, title, %state, error = %error, "Upload step failed, skipping");
        report.failures.push(UploadFailure {
            row,
            title: title.to_string(),
            state,
            error: error.to_string(),
        });
        Ok(false)
    }

    /// Check `issue`'s title against its repository, under the failure policy
    ///
    /// `Some(true)` means the title exists and the row is skipped; `None`
    /// means the check failed and the failure was recorded.
    async fn existing_title(
        &mut self,
        issue: &Issue,
        report: &mut UploadReport,
    ) -> Result<Option<bool>> {
        let mut retried = false;
        loop {
            match self.title_exists(issue).await {
                Ok(true) => {
                    info!(
                        repo = %issue.repo_full_name(),
                        title = %issue.title,
                        "Issue already exists, skipping"
                    );
                    report.skipped += 1;
                    return Ok(Some(true));
                }
                Ok(false) => return Ok(Some(false)),
                Err(e) => {
                    let retry = self
                        .on_failure(e, retried, issue.row, &issue.title, issue.state, report)
                        .await?;
                    if !retry {
                        return Ok(None);
                    }
                    retried = true;
                }
            }
        }
    }

    /// Whether `issue`'s title exists in its repository before this run
    async fn title_exists(&mut self, issue: &Issue) -> Result<bool> {
        let repo = issue.repo_full_name();
        if !self.existing_titles.contains_key(&repo) {
            let titles = self
                .client
                .list_issues(&issue.account.name, &issue.repo_name)
                .await?
                .into_iter()
                .filter(|i| !i.is_pull_request())
                .map(|i| i.title)
                .collect();
            self.existing_titles.insert(repo.clone(), titles);
        }
        Ok(self
            .existing_titles
            .get(&repo)
            .is_some_and(|titles| titles.contains(&issue.title)))
    }
}
