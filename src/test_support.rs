//! In-memory fakes of the external collaborators, shared by unit tests.

use crate::completion::{Completer, CompletionError, Message};
use crate::github::{
    CommentKind, CommentNode, Forge, ForgeError, GraphQlError, Label, ObjectKind, ObjectRef,
    ObjectTree, PullRequestInfo, RepoRef, SearchHit,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// Reply used once the script runs out.
pub const DEFAULT_REPLY: &str = "Translated text";

/// Replays scripted replies and records the turns of every call.
pub struct ScriptedCompleter {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedCompleter {
    pub fn new(replies: Vec<Result<String, CompletionError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Completer for ScriptedCompleter {
    async fn complete(
        &self,
        _system: &str,
        turns: &[Message],
        _temperature: f32,
    ) -> Result<String, CompletionError> {
        self.calls.lock().unwrap().push(turns.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(DEFAULT_REPLY.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForgeCall {
    FetchTree(u64),
    FetchPullRequest(u64),
    UpdateObject { id: String, title: String, body: String },
    UpdateComment { kind: CommentKind, id: String, body: String },
    LabelId(String),
    AddLabel { labelable_id: String, label_id: String },
    Search { repo: String, kind: ObjectKind, count: u32 },
}

/// Forge backed by in-memory trees. Updates are applied to the stored state so
/// repeated runs observe earlier writes.
#[derive(Default)]
pub struct FakeForge {
    trees: Mutex<HashMap<u64, ObjectTree>>,
    pull_requests: Mutex<HashMap<u64, PullRequestInfo>>,
    forbidden: HashSet<String>,
    failing: HashSet<u64>,
    search_hits: Vec<SearchHit>,
    calls: Mutex<Vec<ForgeCall>>,
}

impl FakeForge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(self, number: u64, tree: ObjectTree) -> Self {
        self.trees.lock().unwrap().insert(number, tree);
        self
    }

    pub fn with_pull_request(self, number: u64, info: PullRequestInfo) -> Self {
        self.pull_requests.lock().unwrap().insert(number, info);
        self
    }

    /// Updates to this comment id fail with a FORBIDDEN GraphQL error.
    pub fn forbid(mut self, comment_id: &str) -> Self {
        self.forbidden.insert(comment_id.to_string());
        self
    }

    /// Fetching this object number fails with a server error.
    pub fn failing(mut self, number: u64) -> Self {
        self.failing.insert(number);
        self
    }

    pub fn with_search_hits(mut self, hits: Vec<SearchHit>) -> Self {
        self.search_hits = hits;
        self
    }

    pub fn calls(&self) -> Vec<ForgeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&ForgeCall) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    pub fn label_attach_count(&self) -> usize {
        self.count(|c| matches!(c, ForgeCall::AddLabel { .. }))
    }

    pub fn tree(&self, number: u64) -> Option<ObjectTree> {
        self.trees.lock().unwrap().get(&number).cloned()
    }

    pub fn pull_request(&self, number: u64) -> Option<PullRequestInfo> {
        self.pull_requests.lock().unwrap().get(&number).cloned()
    }

    fn record(&self, call: ForgeCall) {
        self.calls.lock().unwrap().push(call);
    }
}

fn update_node(nodes: &mut [CommentNode], id: &str, body: &str) -> bool {
    for node in nodes {
        if node.id == id {
            node.body = body.to_string();
            return true;
        }
        if update_node(&mut node.replies, id, body) {
            return true;
        }
    }
    false
}

fn not_found(what: impl std::fmt::Display) -> ForgeError {
    ForgeError::Malformed(format!("{} not found", what))
}

#[async_trait]
impl Forge for FakeForge {
    async fn fetch_tree(&self, object: &ObjectRef) -> Result<ObjectTree, ForgeError> {
        self.record(ForgeCall::FetchTree(object.number));
        if self.failing.contains(&object.number) {
            return Err(ForgeError::Http {
                status: 502,
                body: "Bad Gateway".to_string(),
            });
        }
        self.tree(object.number).ok_or_else(|| not_found(object))
    }

    async fn fetch_pull_request(
        &self,
        object: &ObjectRef,
    ) -> Result<PullRequestInfo, ForgeError> {
        self.record(ForgeCall::FetchPullRequest(object.number));
        self.pull_request(object.number)
            .ok_or_else(|| not_found(object))
    }

    async fn update_object(
        &self,
        _kind: ObjectKind,
        id: &str,
        title: &str,
        body: &str,
    ) -> Result<(), ForgeError> {
        self.record(ForgeCall::UpdateObject {
            id: id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });
        for tree in self.trees.lock().unwrap().values_mut() {
            if tree.id == id {
                tree.title = title.to_string();
                tree.body = body.to_string();
            }
        }
        for pr in self.pull_requests.lock().unwrap().values_mut() {
            if pr.id == id {
                pr.title = title.to_string();
                pr.body = body.to_string();
            }
        }
        Ok(())
    }

    async fn update_comment(
        &self,
        kind: CommentKind,
        id: &str,
        body: &str,
    ) -> Result<(), ForgeError> {
        self.record(ForgeCall::UpdateComment {
            kind,
            id: id.to_string(),
            body: body.to_string(),
        });
        if self.forbidden.contains(id) {
            return Err(ForgeError::GraphQl {
                errors: vec![GraphQlError {
                    kind: Some("FORBIDDEN".to_string()),
                    message: "Resource not accessible by personal access token".to_string(),
                }],
            });
        }
        for tree in self.trees.lock().unwrap().values_mut() {
            update_node(&mut tree.comments, id, body);
        }
        Ok(())
    }

    async fn label_id(&self, _repo: &RepoRef, name: &str) -> Result<String, ForgeError> {
        self.record(ForgeCall::LabelId(name.to_string()));
        Ok(format!("LA_{}", name))
    }

    async fn add_label(&self, labelable_id: &str, label_id: &str) -> Result<(), ForgeError> {
        self.record(ForgeCall::AddLabel {
            labelable_id: labelable_id.to_string(),
            label_id: label_id.to_string(),
        });
        let name = label_id.trim_start_matches("LA_").to_string();
        let label = Label {
            id: label_id.to_string(),
            name,
        };
        for tree in self.trees.lock().unwrap().values_mut() {
            if tree.id == labelable_id {
                tree.labels.push(label.clone());
            }
        }
        for pr in self.pull_requests.lock().unwrap().values_mut() {
            if pr.id == labelable_id {
                pr.labels.push(label.clone());
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        repo: &RepoRef,
        kind: ObjectKind,
        count: u32,
    ) -> Result<Vec<SearchHit>, ForgeError> {
        self.record(ForgeCall::Search {
            repo: repo.to_string(),
            kind,
            count,
        });
        Ok(self
            .search_hits
            .iter()
            .take(count as usize)
            .cloned()
            .collect())
    }
}

pub fn comment(id: &str, kind: CommentKind, body: &str) -> CommentNode {
    CommentNode {
        id: id.to_string(),
        kind,
        author: "octocat".to_string(),
        url: format!("https://github.com/ossrs/srs/issues/1#{}", id),
        body: body.to_string(),
        replies: Vec::new(),
    }
}

pub fn tree(kind: ObjectKind, title: &str, body: &str, comments: Vec<CommentNode>) -> ObjectTree {
    ObjectTree {
        id: "OBJ_1".to_string(),
        kind,
        title: title.to_string(),
        body: body.to_string(),
        labels: Vec::new(),
        comments,
    }
}

pub fn object_ref(kind: ObjectKind, number: u64) -> ObjectRef {
    ObjectRef {
        repo: RepoRef::new("ossrs", "srs"),
        kind,
        number,
    }
}
