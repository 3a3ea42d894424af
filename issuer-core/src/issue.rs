//! Issue records built from CSV rows
//!
//! An [`Issue`] is created locally from one CSV row, then updated in place as
//! it moves through the upload pipeline (see [`IssueState`]). A [`MetaIssue`]
//! wraps an issue whose body gets a generated checklist of its sub issues.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of GitHub account owning repositories and projects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    User,
    #[default]
    Organization,
}

impl AccountType {
    /// Name used in CSV files and as the GraphQL root field
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::User => "user",
            AccountType::Organization => "organization",
        }
    }

    /// Path segment used in project URLs
    pub fn url_segment(&self) -> &'static str {
        match self {
            AccountType::User => "users",
            AccountType::Organization => "orgs",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "user" => Ok(AccountType::User),
            "organization" => Ok(AccountType::Organization),
            other => Err(format!(
                "unknown account type {:?}, expected \"user\" or \"organization\"",
                other
            )),
        }
    }
}

/// A GitHub account: its kind and login
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Account {
    pub kind: AccountType,
    pub name: String,
}

impl Account {
    pub fn new(kind: AccountType, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn organization(name: impl Into<String>) -> Self {
        Self::new(AccountType::Organization, name)
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self::new(AccountType::User, name)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// Upload pipeline state of an issue
///
/// States only ever move forward:
/// `Pending -> Created -> InProject -> FieldsSet -> Linked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    #[default]
    Pending,
    Created,
    InProject,
    FieldsSet,
    Linked,
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueState::Pending => "pending",
            IssueState::Created => "created",
            IssueState::InProject => "in_project",
            IssueState::FieldsSet => "fields_set",
            IssueState::Linked => "linked",
        };
        f.write_str(s)
    }
}

/// An issue to create at GitHub
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    /// 1-based CSV data row this issue was read from
    pub row: usize,

    pub title: String,
    pub body: String,
    pub account: Account,
    pub repo_name: String,

    /// Project number in the account, 0 when the issue is not added to a project
    pub project_number: u64,
    /// Value for the "Estimate" number field, 0 when unset
    pub project_estimate: f64,
    /// Label of the "Status" single-select option
    pub status: Option<String>,
    /// Title of the "Iteration" iteration
    pub iteration: Option<String>,
    pub labels: Vec<String>,

    /// Caller assigned id, unique across a batch
    pub project_issue_id: Option<String>,
    /// The `project_issue_id` of this issue's parent
    pub project_parent_issue_id: Option<String>,

    /// Set upon creation
    pub number: u64,
    /// GraphQL node id, set upon creation
    pub node_id: String,
    pub html_url: Option<String>,
    /// Project item node id, set once added to the project
    pub project_item_id: String,

    pub state: IssueState,
}

impl Issue {
    /// Create a pending issue with only the required fields set
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        account: Account,
        repo_name: impl Into<String>,
    ) -> Self {
        Self {
            row: 0,
            title: title.into(),
            body: body.into(),
            account,
            repo_name: repo_name.into(),
            project_number: 0,
            project_estimate: 0.0,
            status: None,
            iteration: None,
            labels: Vec::new(),
            project_issue_id: None,
            project_parent_issue_id: None,
            number: 0,
            node_id: String::new(),
            html_url: None,
            project_item_id: String::new(),
            state: IssueState::Pending,
        }
    }

    /// Repository in `owner/repo` form
    pub fn repo_full_name(&self) -> String {
        format!("{}/{}", self.account.name, self.repo_name)
    }

    /// Web URL of the issue; only meaningful once created
    pub fn url(&self) -> String {
        match &self.html_url {
            Some(url) => url.clone(),
            None => format!(
                "https://github.com/{}/{}/issues/{}",
                self.account.name, self.repo_name, self.number
            ),
        }
    }

    pub fn has_project(&self) -> bool {
        self.project_number != 0
    }

    /// Check if any project custom field value is set on this issue
    pub fn has_project_fields(&self) -> bool {
        self.project_estimate != 0.0
            || self.status.is_some()
            || self.iteration.is_some()
            || self.project_issue_id.is_some()
    }

    pub fn is_created(&self) -> bool {
        self.state >= IssueState::Created
    }

    /// Record the server assigned identity of a newly created issue
    pub fn mark_created(&mut self, number: u64, node_id: impl Into<String>, html_url: Option<String>) {
        self.number = number;
        self.node_id = node_id.into();
        self.html_url = html_url;
        self.advance(IssueState::Created);
    }

    /// Record the project item id after adding this issue to its project
    pub fn mark_in_project(&mut self, item_id: impl Into<String>) {
        self.project_item_id = item_id.into();
        self.advance(IssueState::InProject);
    }

    /// Move forward to `state`; moving backwards is ignored
    pub fn advance(&mut self, state: IssueState) {
        if state > self.state {
            self.state = state;
        }
    }
}

/// An issue whose body lists its sub issues as a task checklist
#[derive(Debug, Clone, PartialEq)]
pub struct MetaIssue {
    pub issue: Issue,
    /// Indexes of the owned sub issues in the batch issue list, in row order
    pub sub_issues: Vec<usize>,
}

impl MetaIssue {
    pub fn new(issue: Issue) -> Self {
        Self {
            issue,
            sub_issues: Vec::new(),
        }
    }

    /// The meta issue identifier
    pub fn id(&self) -> &str {
        self.issue.project_issue_id.as_deref().unwrap_or_default()
    }

    /// Build the body to send: the base body followed by a checklist of `urls`
    pub fn body_with_checklist<'a>(&self, urls: impl IntoIterator<Item = &'a str>) -> String {
        checklist_body(&self.issue.body, urls)
    }
}

/// Append a markdown task list of `urls` to `base`
///
/// GitHub renders each line as a task tracking the linked issue.
pub fn checklist_body<'a>(base: &str, urls: impl IntoIterator<Item = &'a str>) -> String {
    let mut body = format!("{}\n\n", base);
    for url in urls {
        body.push_str(&format!("- [ ] {}\n", url));
    }
    body.push('\n');
    body
}
