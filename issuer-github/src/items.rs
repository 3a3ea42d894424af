//! Project items: listing model, copying between projects and purging

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use issuer_core::FieldNames;

use crate::graphql::{FieldUpdate, FieldValue};
use crate::project::Project;
use crate::{GitHubClient, Result};

/// One row of a project board
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectItem {
    pub id: String,
    pub content: Option<ItemContent>,
    #[serde(default)]
    pub field_values: Connection<ItemFieldValue>,
}

/// `{ nodes: [...] }` wrapper used by GraphQL connections
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Connection<T> {
    pub nodes: Vec<T>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "__typename")]
pub enum ItemContent {
    Issue {
        id: String,
        number: u64,
        title: String,
        url: String,
    },
    PullRequest {
        id: String,
        number: u64,
        title: String,
        url: String,
    },
    DraftIssue {
        id: String,
        title: String,
        #[serde(default)]
        body: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FieldRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "__typename")]
pub enum ItemFieldValue {
    #[serde(rename = "ProjectV2ItemFieldNumberValue")]
    Number {
        number: Option<f64>,
        #[serde(default)]
        field: FieldRef,
    },
    #[serde(rename = "ProjectV2ItemFieldTextValue")]
    Text {
        text: Option<String>,
        #[serde(default)]
        field: FieldRef,
    },
    #[serde(rename = "ProjectV2ItemFieldDateValue")]
    Date {
        date: Option<String>,
        #[serde(default)]
        field: FieldRef,
    },
    #[serde(rename = "ProjectV2ItemFieldSingleSelectValue")]
    SingleSelect {
        name: Option<String>,
        #[serde(rename = "optionId")]
        option_id: Option<String>,
        #[serde(default)]
        field: FieldRef,
    },
    #[serde(rename = "ProjectV2ItemFieldIterationValue")]
    Iteration {
        title: Option<String>,
        #[serde(rename = "iterationId")]
        iteration_id: Option<String>,
        #[serde(default)]
        field: FieldRef,
    },
    /// Labels, assignees, repository and other values not copied
    #[serde(other)]
    Other,
}

impl ItemFieldValue {
    /// Name of the field this value belongs to
    pub fn field_name(&self) -> Option<&str> {
        match self {
            ItemFieldValue::Number { field, .. }
            | ItemFieldValue::Text { field, .. }
            | ItemFieldValue::Date { field, .. }
            | ItemFieldValue::SingleSelect { field, .. }
            | ItemFieldValue::Iteration { field, .. } => Some(field.name.as_str()),
            ItemFieldValue::Other => None,
        }
    }
}

impl ProjectItem {
    /// The value of field `name`, if set on this item
    pub fn value(&self, name: &str) -> Option<&ItemFieldValue> {
        self.field_values
            .nodes
            .iter()
            .find(|v| v.field_name() == Some(name))
    }

    pub fn title(&self) -> Option<&str> {
        match self.content.as_ref()? {
            ItemContent::Issue { title, .. }
            | ItemContent::PullRequest { title, .. }
            | ItemContent::DraftIssue { title, .. } => Some(title),
        }
    }
}

/// Outcome of a copy or purge run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Copy the items of `source` into `target`
///
/// Issues and pull requests are added by content id and get their
/// estimate, issue id, status, iteration and target date copied by field
/// name. Draft issues are recreated as drafts. `max` bounds the number of
/// source items read, 0 meaning all.
pub async fn copy_items(
    client: &GitHubClient,
    source: &Project,
    target: &Project,
    fields: &FieldNames,
    max: usize,
) -> Result<ItemReport> {
    let mut items = source.items(client).await?;
    if max > 0 {
        items.truncate(max);
    }
    info!(
        count = items.len(),
        source = %source.url(),
        target = %target.url(),
        "Copying project items"
    );

    let mut report = ItemReport::default();
    for item in &items {
        let Some(content) = &item.content else {
            debug!(item = %item.id, "Item has no content, skipping");
            report.skipped += 1;
            continue;
        };

        let copied = match content {
            ItemContent::Issue { id, .. } | ItemContent::PullRequest { id, .. } => {
                copy_linked_item(client, target, fields, item, id).await
            }
            ItemContent::DraftIssue { title, body, .. } => target
                .create_draft_issue(client, title, body)
                .await
                .map(|_| ()),
        };

        match copied {
            Ok(()) => {
                info!(title = item.title().unwrap_or_default(), "Copied item");
                report.processed += 1;
            }
            Err(e @ crate::Error::Interrupted) => return Err(e),
            Err(e) => {
                warn!(item = %item.id, error = %e, "Failed to copy item");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

async fn copy_linked_item(
    client: &GitHubClient,
    target: &Project,
    fields: &FieldNames,
    item: &ProjectItem,
    content_id: &str,
) -> Result<()> {
    let new_item = target.add_item(client, content_id).await?;
    let mut updates = Vec::new();

    if let Some(ItemFieldValue::Number {
        number: Some(n), ..
    }) = item.value(&fields.estimate)
    {
        let field = target.field_id(client, &fields.estimate).await?;
        updates.push(FieldUpdate::new(field, FieldValue::Number(*n)));
    }

    if let Some(ItemFieldValue::Text { text: Some(t), .. }) = item.value(&fields.issue_id) {
        let field = target.field_id(client, &fields.issue_id).await?;
        updates.push(FieldUpdate::new(field, FieldValue::Text(t.clone())));
    }

    if let Some(ItemFieldValue::SingleSelect { name: Some(label), .. }) = item.value(&fields.status)
    {
        match target.option_id(client, &fields.status, label).await? {
            Some(option) => {
                let field = target.field_id(client, &fields.status).await?;
                updates.push(FieldUpdate::new(field, FieldValue::SingleSelect(option)));
            }
            None => warn!(status = %label, "Status option missing in target project"),
        }
    }

    if let Some(ItemFieldValue::Iteration { title: Some(title), .. }) =
        item.value(&fields.iteration)
    {
        match target.iteration_id(client, &fields.iteration, title).await? {
            Some(iteration) => {
                let field = target.field_id(client, &fields.iteration).await?;
                updates.push(FieldUpdate::new(field, FieldValue::Iteration(iteration)));
            }
            None => warn!(iteration = %title, "Iteration missing in target project"),
        }
    }

    if let Some(ItemFieldValue::Date { date: Some(date), .. }) = item.value(&fields.target_date)
    {
        let field = target.field_id(client, &fields.target_date).await?;
        updates.push(FieldUpdate::new(field, FieldValue::Date(date.clone())));
    }

    target.update_fields(client, &new_item, &updates).await
}

/// Delete every item of `project`
///
/// Failures are logged and counted; the run continues with the next item.
pub async fn purge_items(client: &GitHubClient, project: &Project) -> Result<ItemReport> {
    let items = project.items(client).await?;
    info!(count = items.len(), project = %project.url(), "Deleting project items");

    let mut report = ItemReport::default();
    for item in &items {
        match project.delete_item(client, &item.id).await {
            Ok(()) => {
                debug!(item = %item.id, title = item.title().unwrap_or_default(), "Deleted item");
                report.processed += 1;
            }
            Err(e @ crate::Error::Interrupted) => return Err(e),
            Err(e) => {
                warn!(item = %item.id, error = %e, "Failed to delete item");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Close every open issue of `owner/repo`
pub async fn close_all_issues(client: &GitHubClient, owner: &str, repo: &str) -> Result<ItemReport> {
    let issues = client.list_issues(owner, repo).await?;
    let mut report = ItemReport::default();

    for issue in issues.iter().filter(|i| !i.is_pull_request()) {
        if issue.state == "closed" {
            report.skipped += 1;
            continue;
        }
        match client.close_issue(owner, repo, issue.number).await {
            Ok(_) => {
                info!(number = issue.number, title = %issue.title, "Closed issue");
                report.processed += 1;
            }
            Err(e @ crate::Error::Interrupted) => return Err(e),
            Err(e) => {
                warn!(number = issue.number, error = %e, "Failed to close issue");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}
