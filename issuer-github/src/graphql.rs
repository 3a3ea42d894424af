//! GitHub GraphQL support: request envelope, documents and field updates

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::http::HttpMethod;
use crate::{Error, GitHubClient, Result};

/// GraphQL query response wrapper
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
    #[serde(default)]
    path: Vec<Value>,
}

impl GitHubClient {
    /// Run a GraphQL document against `{base_url}/graphql`
    ///
    /// An `errors` array fails the call even when HTTP status is 200.
    pub async fn graphql<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let url = self.api_url("graphql");
        let body = serde_json::to_vec(&json!({
            "query": query,
            "variables": variables,
        }))?;

        let response = self.send(HttpMethod::Post, &url, body).await?;
        let response: GraphQLResponse<T> = serde_json::from_slice(&response.body)
            .map_err(|e| Error::Parse(format!("Failed to parse GraphQL response: {}", e)))?;

        if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
            for error in &errors {
                debug!(message = %error.message, path = ?error.path, "GraphQL error");
            }
            return Err(Error::GraphQl {
                messages: errors.into_iter().map(|e| e.message).collect(),
                query: query.to_string(),
                variables,
            });
        }

        response
            .data
            .ok_or_else(|| Error::MissingData("GraphQL response has no data".to_string()))
    }
}

/// Project lookup; `{owner}` is `user` or `organization`
pub(crate) fn project_id_query(owner: &str) -> String {
    format!(
        r#"query($login: String!, $number: Int!) {{
  {owner}(login: $login) {{
    projectV2(number: $number) {{
      id
      title
    }}
  }}
}}"#
    )
}

pub(crate) const FIELDS_QUERY: &str = r#"query($project: ID!) {
  node(id: $project) {
    ... on ProjectV2 {
      fields(first: 50) {
        nodes {
          __typename
          ... on ProjectV2Field { id name }
          ... on ProjectV2SingleSelectField { id name options { id name } }
          ... on ProjectV2IterationField {
            id
            name
            configuration {
              iterations { id title startDate }
              completedIterations { id title startDate }
            }
          }
        }
      }
    }
  }
}"#;

pub(crate) const ITEMS_QUERY: &str = r#"query($project: ID!, $cursor: String) {
  node(id: $project) {
    ... on ProjectV2 {
      items(first: 100, after: $cursor) {
        pageInfo { hasNextPage endCursor }
        nodes {
          id
          content {
            __typename
            ... on Issue { id number title url }
            ... on PullRequest { id number title url }
            ... on DraftIssue { id title body }
          }
          fieldValues(first: 20) {
            nodes {
              __typename
              ... on ProjectV2ItemFieldNumberValue { number field { ... on ProjectV2FieldCommon { name } } }
              ... on ProjectV2ItemFieldTextValue { text field { ... on ProjectV2FieldCommon { name } } }
              ... on ProjectV2ItemFieldDateValue { date field { ... on ProjectV2FieldCommon { name } } }
              ... on ProjectV2ItemFieldSingleSelectValue { name optionId field { ... on ProjectV2FieldCommon { name } } }
              ... on ProjectV2ItemFieldIterationValue { title iterationId field { ... on ProjectV2FieldCommon { name } } }
            }
          }
        }
      }
    }
  }
}"#;

pub(crate) const ADD_ITEM_MUTATION: &str = r#"mutation($project: ID!, $content: ID!) {
  addProjectV2ItemById(input: {projectId: $project, contentId: $content}) {
    item { id }
  }
}"#;

pub(crate) const DRAFT_ISSUE_MUTATION: &str = r#"mutation($project: ID!, $title: String!, $body: String) {
  addProjectV2DraftIssue(input: {projectId: $project, title: $title, body: $body}) {
    projectItem { id }
  }
}"#;

pub(crate) const DELETE_ITEM_MUTATION: &str = r#"mutation($project: ID!, $item: ID!) {
  deleteProjectV2Item(input: {projectId: $project, itemId: $item}) {
    deletedItemId
  }
}"#;

pub(crate) const ADD_SUB_ISSUE_MUTATION: &str = r#"mutation($issue: ID!, $sub: ID!) {
  addSubIssue(input: {issueId: $issue, subIssueId: $sub}) {
    issue { number }
    subIssue { number }
  }
}"#;

/// A value for one project item field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    /// Option id of a single-select field
    SingleSelect(String),
    /// Iteration id of an iteration field
    Iteration(String),
    /// ISO 8601 date
    Date(String),
}

impl FieldValue {
    /// The `ProjectV2FieldValue` input object
    pub fn to_input(&self) -> Value {
        match self {
            FieldValue::Number(n) => json!({ "number": n }),
            FieldValue::Text(s) => json!({ "text": s }),
            FieldValue::SingleSelect(id) => json!({ "singleSelectOptionId": id }),
            FieldValue::Iteration(id) => json!({ "iterationId": id }),
            FieldValue::Date(d) => json!({ "date": d }),
        }
    }
}

/// Set field `field_id` of an item to `value`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldUpdate {
    pub field_id: String,
    pub value: FieldValue,
}

impl FieldUpdate {
    pub fn new(field_id: impl Into<String>, value: FieldValue) -> Self {
        Self {
            field_id: field_id.into(),
            value,
        }
    }
}

/// Build one mutation updating every field in `updates`
///
/// Each update becomes an aliased `updateProjectV2ItemFieldValue` with its own
/// `$fieldN` / `$valueN` variables, so values never get spliced into the
/// document.
pub fn build_update_mutation(
    project_id: &str,
    item_id: &str,
    updates: &[FieldUpdate],
) -> (String, Value) {
    let mut params = vec!["$project: ID!".to_string(), "$item: ID!".to_string()];
    let mut selections = Vec::with_capacity(updates.len());
    let mut variables = Map::new();
    variables.insert("project".to_string(), json!(project_id));
    variables.insert("item".to_string(), json!(item_id));

    for (i, update) in updates.iter().enumerate() {
        params.push(format!("$field{i}: ID!"));
        params.push(format!("$value{i}: ProjectV2FieldValue!"));
        selections.push(format!(
            "  update{i}: updateProjectV2ItemFieldValue(input: {{projectId: $project, itemId: $item, fieldId: $field{i}, value: $value{i}}}) {{\n    projectV2Item {{ id }}\n  }}"
        ));
        variables.insert(format!("field{i}"), json!(update.field_id));
        variables.insert(format!("value{i}"), update.value.to_input());
    }

    let query = format!(
        "mutation({}) {{\n{}\n}}",
        params.join(", "),
        selections.join("\n")
    );
    (query, Value::Object(variables))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::*;

    #[test]
    fn test_update_mutation_aliases_each_field() {
        let updates = vec![
            FieldUpdate::new("F_est", FieldValue::Number(3.0)),
            FieldUpdate::new("F_status", FieldValue::SingleSelect("opt1".to_string())),
            FieldUpdate::new("F_iter", FieldValue::Iteration("it2".to_string())),
        ];
        let (query, variables) = build_update_mutation("P1", "I1", &updates);

        assert!(query.starts_with("mutation($project: ID!, $item: ID!, $field0: ID!"));
        assert!(query.contains("update0: updateProjectV2ItemFieldValue"));
        assert!(query.contains("update2: updateProjectV2ItemFieldValue"));
        assert!(!query.contains("update3"));
        assert_eq!(variables["project"], "P1");
        assert_eq!(variables["item"], "I1");
        assert_eq!(variables["field1"], "F_status");
        assert_eq!(variables["value0"], json!({"number": 3.0}));
        assert_eq!(variables["value1"], json!({"singleSelectOptionId": "opt1"}));
        assert_eq!(variables["value2"], json!({"iterationId": "it2"}));
    }

    #[test]
    fn test_project_id_query_root() {
        assert!(project_id_query("user").contains("user(login: $login)"));
        assert!(project_id_query("organization").contains("organization(login: $login)"));
    }

    #[tokio::test]
    async fn test_graphql_errors_with_http_200() {
        let (transport, _clock, client) = setup();
        transport.push_json(
            HttpMethod::Post,
            GRAPHQL,
            200,
            json!({"data": null, "errors": [{"message": "Could not resolve to a node", "path": ["node"]}]}),
        );

        let err = client
            .graphql::<Value>(FIELDS_QUERY, json!({"project": "P1"}))
            .await
            .unwrap_err();
        match err {
            Error::GraphQl {
                messages,
                query,
                variables,
            } => {
                assert_eq!(messages, vec!["Could not resolve to a node".to_string()]);
                assert_eq!(query, FIELDS_QUERY);
                assert_eq!(variables["project"], "P1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_graphql_sends_query_and_variables() {
        let (transport, _clock, client) = setup();
        transport.push_json(
            HttpMethod::Post,
            GRAPHQL,
            200,
            json!({"data": {"deleteProjectV2Item": {"deletedItemId": "I1"}}}),
        );

        let data: Value = client
            .graphql(DELETE_ITEM_MUTATION, json!({"project": "P1", "item": "I1"}))
            .await
            .unwrap();
        assert_eq!(data["deleteProjectV2Item"]["deletedItemId"], "I1");

        let sent = transport.bodies(GRAPHQL);
        assert_eq!(sent[0]["query"], DELETE_ITEM_MUTATION);
        assert_eq!(sent[0]["variables"]["item"], "I1");
    }
}
