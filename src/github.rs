//! Forge read/update/search surface and its GitHub GraphQL implementation.

use crate::config::Config;
use crate::marker::{LABEL_ENGLISH_NATIVE, LABEL_TRANSLATED};
use crate::retry::{with_retry_if, RetryConfig};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Largest collection we read in one page. Anything bigger is rejected.
pub const MAX_PAGE_ITEMS: u64 = 100;

/// Login reported for deleted accounts.
pub const GHOST_LOGIN: &str = "ghost";

const USER_AGENT: &str = concat!("forge-translate/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQlError {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("forge API error ({status}): {body}")]
    Http { status: u16, body: String },
    #[error("failed to reach forge API: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("forge GraphQL request failed: {}", describe(.errors))]
    GraphQl { errors: Vec<GraphQlError> },
    #[error("too many {what}: {count} (at most {} supported)", MAX_PAGE_ITEMS)]
    TooManyItems { what: String, count: u64 },
    #[error("malformed forge response: {0}")]
    Malformed(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ForgeError {
    /// The node exists but cannot be modified by us: permissions, or the
    /// issue was converted to a discussion.
    pub fn is_forbidden(&self) -> bool {
        match self {
            ForgeError::GraphQl { errors } => errors.iter().any(|e| {
                matches!(e.kind.as_deref(), Some("FORBIDDEN") | Some("UNPROCESSABLE"))
            }),
            _ => false,
        }
    }

    fn is_transient(&self) -> bool {
        match self {
            ForgeError::Http { status, .. } => *status >= 500 || *status == 429,
            ForgeError::Transport(e) => !e.is_decode(),
            _ => false,
        }
    }
}

fn describe(errors: &[GraphQlError]) -> String {
    errors
        .iter()
        .map(|e| match &e.kind {
            Some(kind) => format!("{}: {}", kind, e.message),
            None => e.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

// ==================== Object Model ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Issue,
    Discussion,
    PullRequest,
}

impl ObjectKind {
    /// Search qualifier, e.g. `is:issue`.
    pub fn qualifier(&self) -> &'static str {
        match self {
            ObjectKind::Issue => "is:issue",
            ObjectKind::Discussion => "is:discussion",
            ObjectKind::PullRequest => "is:pr",
        }
    }

    fn repository_field(&self) -> &'static str {
        match self {
            ObjectKind::Issue => "issue",
            ObjectKind::Discussion => "discussion",
            ObjectKind::PullRequest => "pullRequest",
        }
    }

    fn from_path_segment(segment: &str) -> Option<Self> {
        match segment {
            "issues" => Some(ObjectKind::Issue),
            "pull" | "pulls" => Some(ObjectKind::PullRequest),
            "discussions" => Some(ObjectKind::Discussion),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Issue => "issue",
            ObjectKind::Discussion => "discussion",
            ObjectKind::PullRequest => "pull request",
        };
        f.write_str(name)
    }
}

/// Accepts `issue`, `pr`, `pullrequest`, `discussion`, with or without `is:`.
impl FromStr for ObjectKind {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let name = normalized.strip_prefix("is:").unwrap_or(&normalized);
        match name {
            "issue" | "issues" => Ok(ObjectKind::Issue),
            "pr" | "pullrequest" | "pull_request" => Ok(ObjectKind::PullRequest),
            "discussion" | "discussions" => Ok(ObjectKind::Discussion),
            _ => Err(ForgeError::InvalidInput(format!(
                "unknown object kind '{}', expected issue, pr or discussion",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    IssueComment,
    DiscussionComment,
    PullRequestReview,
    PullRequestReviewComment,
}

impl fmt::Display for CommentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommentKind::IssueComment => "comment",
            CommentKind::DiscussionComment => "discussion comment",
            CommentKind::PullRequestReview => "review",
            CommentKind::PullRequestReviewComment => "review comment",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse `https://github.com/<owner>/<name>[/...]`.
    pub fn parse(url: &str) -> Result<Self, ForgeError> {
        let segments = path_segments(url)?;
        match segments.as_slice() {
            [owner, name, ..] => Ok(Self::new(owner.as_str(), name.as_str())),
            _ => Err(ForgeError::InvalidInput(format!(
                "'{}' is not a repository URL",
                url
            ))),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub repo: RepoRef,
    pub kind: ObjectKind,
    pub number: u64,
}

impl ObjectRef {
    /// Parse an issue, pull request or discussion URL, e.g.
    /// `https://github.com/ossrs/srs/pull/3699`.
    pub fn parse(url: &str) -> Result<Self, ForgeError> {
        let segments = path_segments(url)?;
        let invalid = || ForgeError::InvalidInput(format!("'{}' is not an object URL", url));

        let [owner, name, kind, number, ..] = segments.as_slice() else {
            return Err(invalid());
        };
        let kind = ObjectKind::from_path_segment(kind).ok_or_else(invalid)?;
        let number = number.parse().map_err(|_| invalid())?;

        Ok(Self {
            repo: RepoRef::new(owner.as_str(), name.as_str()),
            kind,
            number,
        })
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}#{}", self.kind, self.repo, self.number)
    }
}

fn path_segments(url: &str) -> Result<Vec<String>, ForgeError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| ForgeError::InvalidInput(format!("'{}': {}", url, e)))?;
    Ok(parsed
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// A comment and, for discussions and reviews, its nested replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentNode {
    pub id: String,
    pub kind: CommentKind,
    pub author: String,
    pub url: String,
    pub body: String,
    pub replies: Vec<CommentNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTree {
    pub id: String,
    pub kind: ObjectKind,
    pub title: String,
    pub body: String,
    pub labels: Vec<Label>,
    pub comments: Vec<CommentNode>,
}

impl ObjectTree {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.name == name)
    }
}

/// Pull request fields used by title/body refinement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestInfo {
    pub id: String,
    pub title: String,
    pub body: String,
    pub author: String,
    pub participants: Vec<String>,
    pub labels: Vec<Label>,
    pub base_ref: Option<String>,
    pub head_ref: Option<String>,
    pub mergeable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub url: String,
    pub comment_count: u64,
}

/// Backlog query: untranslated objects of one kind, most discussed first.
pub fn search_filter(repo: &RepoRef, kind: ObjectKind) -> String {
    format!(
        "repo:{} {} sort:comments-desc -label:{} -label:{}",
        repo,
        kind.qualifier(),
        LABEL_TRANSLATED,
        LABEL_ENGLISH_NATIVE
    )
}

// ==================== Forge Trait ====================

#[async_trait]
pub trait Forge: Send + Sync {
    /// Object with its labels and full comment tree.
    async fn fetch_tree(&self, object: &ObjectRef) -> Result<ObjectTree, ForgeError>;

    async fn fetch_pull_request(&self, object: &ObjectRef)
        -> Result<PullRequestInfo, ForgeError>;

    async fn update_object(
        &self,
        kind: ObjectKind,
        id: &str,
        title: &str,
        body: &str,
    ) -> Result<(), ForgeError>;

    async fn update_comment(&self, kind: CommentKind, id: &str, body: &str)
        -> Result<(), ForgeError>;

    async fn label_id(&self, repo: &RepoRef, name: &str) -> Result<String, ForgeError>;

    async fn add_label(&self, labelable_id: &str, label_id: &str) -> Result<(), ForgeError>;

    async fn search(
        &self,
        repo: &RepoRef,
        kind: ObjectKind,
        count: u32,
    ) -> Result<Vec<SearchHit>, ForgeError>;
}

// ==================== GraphQL Documents ====================

const LABELS_FRAGMENT: &str = "labels(first: 100) { totalCount nodes { id name } }";

const QUERY_ISSUE: &str = r#"
query ($owner: String!, $name: String!, $number: Int!) {
  repository(owner: $owner, name: $name) {
    issue(number: $number) {
      id title body
      LABELS
      comments(first: 100) {
        totalCount
        nodes { id author { login } url body }
      }
    }
  }
}"#;

const QUERY_DISCUSSION: &str = r#"
query ($owner: String!, $name: String!, $number: Int!) {
  repository(owner: $owner, name: $name) {
    discussion(number: $number) {
      id title body
      LABELS
      comments(first: 100) {
        totalCount
        nodes {
          id author { login } url body
          replies(first: 100) {
            totalCount
            nodes { id author { login } url body }
          }
        }
      }
    }
  }
}"#;

const QUERY_PULL_REQUEST_TREE: &str = r#"
query ($owner: String!, $name: String!, $number: Int!) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      id title body
      LABELS
      comments(first: 100) {
        totalCount
        nodes { id author { login } url body }
      }
      reviews(first: 100) {
        totalCount
        nodes {
          id author { login } url body
          comments(first: 100) {
            totalCount
            nodes { id author { login } url body }
          }
        }
      }
    }
  }
}"#;

const QUERY_PULL_REQUEST: &str = r#"
query ($owner: String!, $name: String!, $number: Int!) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      id title body mergeable
      author { login }
      baseRef { name }
      headRef { name }
      participants(first: 100) { totalCount nodes { login } }
      LABELS
    }
  }
}"#;

const QUERY_LABEL_ID: &str = r#"
query ($owner: String!, $name: String!, $label: String!) {
  repository(owner: $owner, name: $name) {
    label(name: $label) { id }
  }
}"#;

const MUTATION_ADD_LABELS: &str = r#"
mutation ($id: ID!, $labelIds: [ID!]!) {
  addLabelsToLabelable(input: {labelableId: $id, labelIds: $labelIds}) {
    clientMutationId
  }
}"#;

const QUERY_SEARCH: &str = r#"
query ($query: String!, $type: SearchType!, $first: Int!) {
  search(query: $query, type: $type, first: $first) {
    nodes {
      ... on Issue { id title url comments { totalCount } }
      ... on PullRequest { id title url comments { totalCount } }
      ... on Discussion { id title url comments { totalCount } }
    }
  }
}"#;

fn object_mutation(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Issue => {
            "mutation ($id: ID!, $title: String!, $body: String!) { updateIssue(input: {id: $id, title: $title, body: $body}) { clientMutationId } }"
        }
        ObjectKind::Discussion => {
            "mutation ($id: ID!, $title: String!, $body: String!) { updateDiscussion(input: {discussionId: $id, title: $title, body: $body}) { clientMutationId } }"
        }
        ObjectKind::PullRequest => {
            "mutation ($id: ID!, $title: String!, $body: String!) { updatePullRequest(input: {pullRequestId: $id, title: $title, body: $body}) { clientMutationId } }"
        }
    }
}

fn comment_mutation(kind: CommentKind) -> &'static str {
    match kind {
        CommentKind::IssueComment => {
            "mutation ($id: ID!, $body: String!) { updateIssueComment(input: {id: $id, body: $body}) { clientMutationId } }"
        }
        CommentKind::DiscussionComment => {
            "mutation ($id: ID!, $body: String!) { updateDiscussionComment(input: {commentId: $id, body: $body}) { clientMutationId } }"
        }
        CommentKind::PullRequestReview => {
            "mutation ($id: ID!, $body: String!) { updatePullRequestReview(input: {pullRequestReviewId: $id, body: $body}) { clientMutationId } }"
        }
        CommentKind::PullRequestReviewComment => {
            "mutation ($id: ID!, $body: String!) { updatePullRequestReviewComment(input: {pullRequestReviewCommentId: $id, body: $body}) { clientMutationId } }"
        }
    }
}

// ==================== Response Shapes ====================

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
struct Connection<T> {
    total_count: u64,
    #[serde(default)]
    nodes: Vec<Option<T>>,
}

impl<T> Connection<T> {
    fn into_nodes(self, what: &str) -> Result<Vec<T>, ForgeError> {
        if self.total_count > MAX_PAGE_ITEMS {
            return Err(ForgeError::TooManyItems {
                what: what.to_string(),
                count: self.total_count,
            });
        }
        Ok(self.nodes.into_iter().flatten().collect())
    }
}

#[derive(Debug, Deserialize)]
struct Author {
    login: String,
}

fn login_or_ghost(author: Option<Author>) -> String {
    author
        .map(|a| a.login)
        .unwrap_or_else(|| GHOST_LOGIN.to_string())
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: String,
    author: Option<Author>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    body: Option<String>,
    replies: Option<Connection<RawComment>>,
    comments: Option<Connection<RawComment>>,
}

impl RawComment {
    fn into_node(
        self,
        kind: CommentKind,
        child_kind: CommentKind,
        what: &str,
    ) -> Result<CommentNode, ForgeError> {
        let replies = match self.replies.or(self.comments) {
            Some(children) => children
                .into_nodes(what)?
                .into_iter()
                .map(|c| c.into_node(child_kind, child_kind, what))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        Ok(CommentNode {
            id: self.id,
            kind,
            author: login_or_ghost(self.author),
            url: self.url,
            body: self.body.unwrap_or_default(),
            replies,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawObject {
    id: String,
    title: String,
    #[serde(default)]
    body: Option<String>,
    labels: Connection<Label>,
    comments: Option<Connection<RawComment>>,
    reviews: Option<Connection<RawComment>>,
}

impl RawObject {
    fn into_tree(self, kind: ObjectKind) -> Result<ObjectTree, ForgeError> {
        let (comment_kind, reply_kind) = match kind {
            ObjectKind::Discussion => (CommentKind::DiscussionComment, CommentKind::DiscussionComment),
            _ => (CommentKind::IssueComment, CommentKind::IssueComment),
        };

        let mut comments = Vec::new();
        if let Some(connection) = self.comments {
            for raw in connection.into_nodes("comments")? {
                comments.push(raw.into_node(comment_kind, reply_kind, "replies")?);
            }
        }
        if let Some(connection) = self.reviews {
            for raw in connection.into_nodes("reviews")? {
                comments.push(raw.into_node(
                    CommentKind::PullRequestReview,
                    CommentKind::PullRequestReviewComment,
                    "review comments",
                )?);
            }
        }

        Ok(ObjectTree {
            id: self.id,
            kind,
            title: self.title,
            body: self.body.unwrap_or_default(),
            labels: self.labels.into_nodes("labels")?,
            comments,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RefName {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPullRequest {
    id: String,
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    mergeable: Option<String>,
    author: Option<Author>,
    base_ref: Option<RefName>,
    head_ref: Option<RefName>,
    participants: Connection<Author>,
    labels: Connection<Label>,
}

#[derive(Debug, Deserialize)]
struct LabelIdData {
    repository: Option<LabelRepository>,
}

#[derive(Debug, Deserialize)]
struct LabelRepository {
    label: Option<IdNode>,
}

#[derive(Debug, Deserialize)]
struct IdNode {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    search: SearchConnection,
}

#[derive(Debug, Deserialize)]
struct SearchConnection {
    /// Hits of types the query has no fragment for come back as `{}`.
    #[serde(default)]
    nodes: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawSearchHit {
    id: String,
    title: String,
    url: String,
    comments: CountOnly,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountOnly {
    total_count: u64,
}

// ==================== GitHub Client ====================

pub struct GitHubClient {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    retry: RetryConfig,
}

impl GitHubClient {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            endpoint: config.github_graphql_url.clone(),
            token: config.github_token.clone(),
            retry: RetryConfig::forge(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, ForgeError> {
        with_retry_if(
            &self.retry,
            "GitHub GraphQL",
            || self.post_graphql(query, &variables),
            ForgeError::is_transient,
        )
        .await
    }

    async fn post_graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: &Value,
    ) -> Result<T, ForgeError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .header("User-Agent", USER_AGENT)
            .header("X-Github-Next-Global-ID", "1")
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(ForgeError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: GraphQlResponse<T> = response.json().await?;
        if !envelope.errors.is_empty() {
            return Err(ForgeError::GraphQl {
                errors: envelope.errors,
            });
        }
        envelope
            .data
            .ok_or_else(|| ForgeError::Malformed("response carried no data".to_string()))
    }

    /// Run an object query and pull `repository.<field>` out of the result.
    async fn query_object<T: DeserializeOwned>(
        &self,
        query: &str,
        object: &ObjectRef,
    ) -> Result<T, ForgeError> {
        let query = query.replace("LABELS", LABELS_FRAGMENT);
        let data: Value = self
            .graphql(
                &query,
                json!({
                    "owner": object.repo.owner,
                    "name": object.repo.name,
                    "number": object.number,
                }),
            )
            .await?;

        let node = data
            .get("repository")
            .and_then(|repo| repo.get(object.kind.repository_field()))
            .filter(|node| !node.is_null())
            .cloned()
            .ok_or_else(|| ForgeError::Malformed(format!("{} not found", object)))?;

        serde_json::from_value(node).map_err(|e| ForgeError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl Forge for GitHubClient {
    async fn fetch_tree(&self, object: &ObjectRef) -> Result<ObjectTree, ForgeError> {
        debug!("Fetching {}", object);
        let query = match object.kind {
            ObjectKind::Issue => QUERY_ISSUE,
            ObjectKind::Discussion => QUERY_DISCUSSION,
            ObjectKind::PullRequest => QUERY_PULL_REQUEST_TREE,
        };
        let raw: RawObject = self.query_object(query, object).await?;
        raw.into_tree(object.kind)
    }

    async fn fetch_pull_request(
        &self,
        object: &ObjectRef,
    ) -> Result<PullRequestInfo, ForgeError> {
        if object.kind != ObjectKind::PullRequest {
            return Err(ForgeError::InvalidInput(format!(
                "{} is not a pull request",
                object
            )));
        }
        debug!("Fetching {}", object);
        let raw: RawPullRequest = self.query_object(QUERY_PULL_REQUEST, object).await?;

        Ok(PullRequestInfo {
            id: raw.id,
            title: raw.title,
            body: raw.body.unwrap_or_default(),
            author: login_or_ghost(raw.author),
            participants: raw
                .participants
                .into_nodes("participants")?
                .into_iter()
                .map(|p| p.login)
                .collect(),
            labels: raw.labels.into_nodes("labels")?,
            base_ref: raw.base_ref.map(|r| r.name),
            head_ref: raw.head_ref.map(|r| r.name),
            mergeable: raw.mergeable.as_deref() == Some("MERGEABLE"),
        })
    }

    async fn update_object(
        &self,
        kind: ObjectKind,
        id: &str,
        title: &str,
        body: &str,
    ) -> Result<(), ForgeError> {
        debug!("Updating {} {}", kind, id);
        let _: Value = self
            .graphql(
                object_mutation(kind),
                json!({ "id": id, "title": title, "body": body }),
            )
            .await?;
        Ok(())
    }

    async fn update_comment(
        &self,
        kind: CommentKind,
        id: &str,
        body: &str,
    ) -> Result<(), ForgeError> {
        debug!("Updating {} {}", kind, id);
        let _: Value = self
            .graphql(comment_mutation(kind), json!({ "id": id, "body": body }))
            .await?;
        Ok(())
    }

    async fn label_id(&self, repo: &RepoRef, name: &str) -> Result<String, ForgeError> {
        let data: LabelIdData = self
            .graphql(
                QUERY_LABEL_ID,
                json!({ "owner": repo.owner, "name": repo.name, "label": name }),
            )
            .await?;

        data.repository
            .and_then(|r| r.label)
            .map(|l| l.id)
            .ok_or_else(|| ForgeError::Malformed(format!("label '{}' not found in {}", name, repo)))
    }

    async fn add_label(&self, labelable_id: &str, label_id: &str) -> Result<(), ForgeError> {
        let _: Value = self
            .graphql(
                MUTATION_ADD_LABELS,
                json!({ "id": labelable_id, "labelIds": [label_id] }),
            )
            .await?;
        Ok(())
    }

    async fn search(
        &self,
        repo: &RepoRef,
        kind: ObjectKind,
        count: u32,
    ) -> Result<Vec<SearchHit>, ForgeError> {
        let search_type = match kind {
            ObjectKind::Discussion => "DISCUSSION",
            _ => "ISSUE",
        };
        let filter = search_filter(repo, kind);
        debug!("Searching {} ({})", filter, search_type);

        let data: SearchData = self
            .graphql(
                QUERY_SEARCH,
                json!({ "query": filter, "type": search_type, "first": count }),
            )
            .await?;

        Ok(data
            .search
            .nodes
            .into_iter()
            .filter_map(|node| serde_json::from_value::<RawSearchHit>(node).ok())
            .map(|hit| SearchHit {
                id: hit.id,
                title: hit.title,
                url: hit.url,
                comment_count: hit.comments.total_count,
            })
            .collect())
    }
}
