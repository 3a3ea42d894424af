//! Projects (v2) boards and their field definitions
//!
//! A [`Project`] resolves its node id and field list on first use and keeps
//! them for its own lifetime; field metadata is never refreshed. Projects are
//! shared through a [`ProjectRegistry`] keyed by account and number.

use std::collections::HashMap;
use std::sync::Arc;

use issuer_core::Account;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::graphql::{
    build_update_mutation, project_id_query, FieldUpdate, ADD_ITEM_MUTATION,
    DELETE_ITEM_MUTATION, DRAFT_ISSUE_MUTATION, FIELDS_QUERY, ITEMS_QUERY,
};
use crate::items::{Connection, ProjectItem};
use crate::{Error, GitHubClient, Result};

/// Field name to id maps of one project
#[derive(Debug, Clone, Default, Serialize)]
pub struct FieldMap {
    /// Every field, whatever its type
    pub fields: HashMap<String, String>,
    /// Single-select field name to `{option label: option id}`
    pub options: HashMap<String, HashMap<String, String>>,
    /// Iteration field name to `{iteration title: iteration id}`
    pub iterations: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
enum FieldNode {
    ProjectV2Field {
        id: String,
        name: String,
    },
    ProjectV2SingleSelectField {
        id: String,
        name: String,
        options: Vec<NamedId>,
    },
    ProjectV2IterationField {
        id: String,
        name: String,
        configuration: IterationConfig,
    },
}

#[derive(Debug, Deserialize)]
struct NamedId {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IterationConfig {
    #[serde(default)]
    iterations: Vec<Iteration>,
    #[serde(default)]
    completed_iterations: Vec<Iteration>,
}

#[derive(Debug, Deserialize)]
struct Iteration {
    id: String,
    title: String,
}

impl FieldMap {
    fn from_nodes(nodes: Vec<FieldNode>) -> Self {
        let mut map = FieldMap::default();
        for node in nodes {
            match node {
                FieldNode::ProjectV2Field { id, name } => {
                    map.fields.insert(name, id);
                }
                FieldNode::ProjectV2SingleSelectField { id, name, options } => {
                    let options = options.into_iter().map(|o| (o.name, o.id)).collect();
                    map.options.insert(name.clone(), options);
                    map.fields.insert(name, id);
                }
                FieldNode::ProjectV2IterationField {
                    id,
                    name,
                    configuration,
                } => {
                    let iterations = configuration
                        .completed_iterations
                        .into_iter()
                        .chain(configuration.iterations)
                        .map(|i| (i.title, i.id))
                        .collect();
                    map.iterations.insert(name.clone(), iterations);
                    map.fields.insert(name, id);
                }
            }
        }
        map
    }
}

#[derive(Debug, Deserialize)]
struct OwnerData {
    #[serde(alias = "user", alias = "organization")]
    owner: Option<ProjectNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectNode {
    project_v2: Option<ProjectIdNode>,
}

#[derive(Debug, Deserialize)]
struct ProjectIdNode {
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct NodeData<T> {
    node: Option<T>,
}

#[derive(Debug, Deserialize)]
struct FieldsNode {
    fields: Connection<FieldNode>,
}

#[derive(Debug, Deserialize)]
struct ItemsNode {
    items: ItemsPage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemsPage {
    page_info: PageInfo,
    nodes: Vec<ProjectItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

/// A Projects (v2) board owned by a user or organization
#[derive(Debug)]
pub struct Project {
    account: Account,
    number: u64,
    id: OnceCell<String>,
    fields: OnceCell<FieldMap>,
}

impl Project {
    pub fn new(account: Account, number: u64) -> Self {
        Self {
            account,
            number,
            id: OnceCell::new(),
            fields: OnceCell::new(),
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    /// Web URL of the board
    pub fn url(&self) -> String {
        format!(
            "https://github.com/{}/{}/projects/{}",
            self.account.kind.url_segment(),
            self.account.name,
            self.number
        )
    }

    /// The project node id, resolved once
    pub async fn project_id(&self, client: &GitHubClient) -> Result<&str> {
        let id = self
            .id
            .get_or_try_init(|| async {
                let data: OwnerData = client
                    .graphql(
                        &project_id_query(self.account.kind.as_str()),
                        json!({ "login": self.account.name, "number": self.number }),
                    )
                    .await?;
                let project = data
                    .owner
                    .and_then(|o| o.project_v2)
                    .ok_or_else(|| {
                        Error::MissingData(format!("Project {} not found", self.url()))
                    })?;
                info!(id = %project.id, title = %project.title, url = %self.url(), "Resolved project");
                Ok::<_, Error>(project.id)
            })
            .await?;
        Ok(id.as_str())
    }

    /// All field definitions, fetched once
    pub async fn fields(&self, client: &GitHubClient) -> Result<&FieldMap> {
        self.fields
            .get_or_try_init(|| async {
                let project_id = self.project_id(client).await?;
                let data: NodeData<FieldsNode> = client
                    .graphql(FIELDS_QUERY, json!({ "project": project_id }))
                    .await?;
                let node = data.node.ok_or_else(|| {
                    Error::MissingData(format!("No fields for project {}", self.url()))
                })?;
                let map = FieldMap::from_nodes(node.fields.nodes);
                debug!(count = map.fields.len(), project = %self.url(), "Fetched project fields");
                Ok::<_, Error>(map)
            })
            .await
    }

    /// Id of field `name`
    pub async fn field_id(&self, client: &GitHubClient, name: &str) -> Result<String> {
        self.fields(client)
            .await?
            .fields
            .get(name)
            .cloned()
            .ok_or_else(|| self.field_not_found(name))
    }

    /// Id of option `label` of single-select field `field`; `None` if unknown
    pub async fn option_id(
        &self,
        client: &GitHubClient,
        field: &str,
        label: &str,
    ) -> Result<Option<String>> {
        let map = self.fields(client).await?;
        if !map.fields.contains_key(field) {
            return Err(self.field_not_found(field));
        }
        Ok(map
            .options
            .get(field)
            .and_then(|options| options.get(label))
            .cloned())
    }

    /// Id of iteration `title` of iteration field `field`; `None` if unknown
    pub async fn iteration_id(
        &self,
        client: &GitHubClient,
        field: &str,
        title: &str,
    ) -> Result<Option<String>> {
        let map = self.fields(client).await?;
        if !map.fields.contains_key(field) {
            return Err(self.field_not_found(field));
        }
        Ok(map
            .iterations
            .get(field)
            .and_then(|iterations| iterations.get(title))
            .cloned())
    }

    fn field_not_found(&self, field: &str) -> Error {
        Error::FieldNotFound {
            project: self.url(),
            field: field.to_string(),
        }
    }

    /// Add an issue or pull request by node id; returns the item id
    pub async fn add_item(&self, client: &GitHubClient, content_id: &str) -> Result<String> {
        let project_id = self.project_id(client).await?;
        let data: Value = client
            .graphql(
                ADD_ITEM_MUTATION,
                json!({ "project": project_id, "content": content_id }),
            )
            .await?;
        string_at(&data, &["addProjectV2ItemById", "item", "id"])
    }

    /// Create a draft issue item; returns the item id
    pub async fn create_draft_issue(
        &self,
        client: &GitHubClient,
        title: &str,
        body: &str,
    ) -> Result<String> {
        let project_id = self.project_id(client).await?;
        let data: Value = client
            .graphql(
                DRAFT_ISSUE_MUTATION,
                json!({ "project": project_id, "title": title, "body": body }),
            )
            .await?;
        string_at(&data, &["addProjectV2DraftIssue", "projectItem", "id"])
    }

    /// Apply all `updates` to `item_id` in one mutation
    pub async fn update_fields(
        &self,
        client: &GitHubClient,
        item_id: &str,
        updates: &[FieldUpdate],
    ) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let project_id = self.project_id(client).await?;
        let (query, variables) = build_update_mutation(project_id, item_id, updates);
        let _: Value = client.graphql(&query, variables).await?;
        debug!(item = item_id, count = updates.len(), "Updated item fields");
        Ok(())
    }

    /// Every item of the board, 100 per page
    pub async fn items(&self, client: &GitHubClient) -> Result<Vec<ProjectItem>> {
        let project_id = self.project_id(client).await?;
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let data: NodeData<ItemsNode> = client
                .graphql(
                    ITEMS_QUERY,
                    json!({ "project": project_id, "cursor": cursor }),
                )
                .await?;
            let page = data
                .node
                .ok_or_else(|| {
                    Error::MissingData(format!("No items for project {}", self.url()))
                })?
                .items;

            items.extend(page.nodes);
            match page.page_info.end_cursor {
                Some(next) if page.page_info.has_next_page => cursor = Some(next),
                _ => break,
            }
        }

        debug!(count = items.len(), project = %self.url(), "Listed project items");
        Ok(items)
    }

    pub async fn delete_item(&self, client: &GitHubClient, item_id: &str) -> Result<()> {
        let project_id = self.project_id(client).await?;
        let _: Value = client
            .graphql(
                DELETE_ITEM_MUTATION,
                json!({ "project": project_id, "item": item_id }),
            )
            .await?;
        Ok(())
    }
}

/// Follow `path` into `data` and return the string found there
fn string_at(data: &Value, path: &[&str]) -> Result<String> {
    path.iter()
        .try_fold(data, |value, key| value.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::MissingData(path.join(".")))
}

/// Projects used during one run, keyed by account and number
#[derive(Debug, Default)]
pub struct ProjectRegistry {
    projects: HashMap<(Account, u64), Arc<Project>>,
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The project `number` of `account`, created on first request
    pub fn get(&mut self, account: &Account, number: u64) -> Arc<Project> {
        self.projects
            .entry((account.clone(), number))
            .or_insert_with(|| Arc::new(Project::new(account.clone(), number)))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::client::test_support::*;
    use crate::http::HttpMethod;

    #[tokio::test]
    async fn test_fields_fetched_once() {
        let (transport, _clock, client) = setup();
        transport.push_json(HttpMethod::Post, GRAPHQL, 200, project_id("P1"));
        transport.push_json(HttpMethod::Post, GRAPHQL, 200, fields());
        let project = Project::new(Account::organization("acme"), 1);

        assert_eq!(project.field_id(&client, "Estimate").await.unwrap(), "F_est");
        assert_eq!(project.field_id(&client, "Status").await.unwrap(), "F_st");
        assert_eq!(
            project.option_id(&client, "Status", "Done").await.unwrap(),
            Some("o_done".to_string())
        );
        assert_eq!(
            project.iteration_id(&client, "Iteration", "Sprint 0").await.unwrap(),
            Some("it0".to_string())
        );
        assert_eq!(project.project_id(&client).await.unwrap(), "P1");

        assert_eq!(transport.requests().len(), 2);
        let first = &transport.bodies(GRAPHQL)[0];
        assert_eq!(first["variables"]["login"], "acme");
        assert_eq!(first["variables"]["number"], 1);
    }

    #[tokio::test]
    async fn test_unknown_names() {
        let (transport, _clock, client) = setup();
        transport.push_json(HttpMethod::Post, GRAPHQL, 200, project_id("P1"));
        transport.push_json(HttpMethod::Post, GRAPHQL, 200, fields());
        let project = Project::new(Account::organization("acme"), 1);

        let err = project.field_id(&client, "Points").await.unwrap_err();
        assert!(matches!(err, Error::FieldNotFound { ref field, .. } if field == "Points"));
        assert!(!err.is_retryable());

        // labels match exactly
        assert_eq!(project.option_id(&client, "Status", "todo").await.unwrap(), None);
        assert_eq!(
            project.iteration_id(&client, "Iteration", "Sprint 9").await.unwrap(),
            None
        );
        assert!(project.option_id(&client, "Stage", "Todo").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_project() {
        let (transport, _clock, client) = setup();
        transport.push_json(
            HttpMethod::Post,
            GRAPHQL,
            200,
            json!({"data": {"user": {"projectV2": null}}}),
        );
        let project = Project::new(Account::user("octo"), 9);

        let err = project.project_id(&client).await.unwrap_err();
        assert!(matches!(err, Error::MissingData(_)));
        let sent = &transport.bodies(GRAPHQL)[0];
        assert!(sent["query"].as_str().unwrap().contains("user(login: $login)"));
    }

    #[tokio::test]
    async fn test_items_follow_cursor() {
        let (transport, _clock, client) = setup();
        transport.push_json(HttpMethod::Post, GRAPHQL, 200, project_id("P1"));
        transport.push_json(
            HttpMethod::Post,
            GRAPHQL,
            200,
            json!({"data": {"node": {"items": {
                "pageInfo": {"hasNextPage": true, "endCursor": "c1"},
                "nodes": [{"id": "A", "content": null}]
            }}}}),
        );
        transport.push_json(
            HttpMethod::Post,
            GRAPHQL,
            200,
            json!({"data": {"node": {"items": {
                "pageInfo": {"hasNextPage": false, "endCursor": "c2"},
                "nodes": [{"id": "B", "content": null}]
            }}}}),
        );
        let project = Project::new(Account::organization("acme"), 1);

        let items = project.items(&client).await.unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);

        let bodies = transport.bodies(GRAPHQL);
        assert_eq!(bodies[1]["variables"]["cursor"], Value::Null);
        assert_eq!(bodies[2]["variables"]["cursor"], "c1");
    }

    #[tokio::test]
    async fn test_update_fields_skips_empty() {
        let (transport, _clock, client) = setup();
        let project = Project::new(Account::organization("acme"), 1);
        project.update_fields(&client, "I1", &[]).await.unwrap();
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_registry_keys_by_account_and_number() {
        let mut registry = ProjectRegistry::new();
        let a = registry.get(&Account::organization("acme"), 1);
        let b = registry.get(&Account::organization("acme"), 1);
        let c = registry.get(&Account::user("acme"), 1);
        let d = registry.get(&Account::organization("other"), 1);

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(!Arc::ptr_eq(&a, &d));
        assert_eq!(registry.len(), 3);
        assert_eq!(a.url(), "https://github.com/orgs/acme/projects/1");
        assert_eq!(c.url(), "https://github.com/users/acme/projects/1");
    }
}
