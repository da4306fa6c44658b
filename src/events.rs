//! Typed view of inbound webhook deliveries.
//!
//! Only the fields the service reads or rewrites are typed. The full JSON
//! payload travels alongside the [`Event`] untouched, so whatever is forwarded
//! downstream is the sender's payload plus our edits.

use crate::github::{CommentKind, ForgeError, ObjectKind, ObjectRef};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("malformed {event} payload: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Url(#[from] ForgeError),
}

/// An issue, discussion or pull request that was just created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEvent {
    pub object: ObjectRef,
    pub title: String,
}

/// A single comment, review or review comment that was just posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEvent {
    pub kind: CommentKind,
    pub node_id: String,
    pub url: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Ping,
    IssueOpened(ObjectEvent),
    DiscussionCreated(ObjectEvent),
    PullRequestOpened(ObjectEvent),
    IssueCommentCreated(CommentEvent),
    DiscussionCommentCreated(CommentEvent),
    PullRequestReviewSubmitted(CommentEvent),
    PullRequestReviewCommentCreated(CommentEvent),
    /// Payments/membership notification, relayed verbatim.
    Membership,
    /// Anything else; forwarded unmodified.
    Other {
        event: String,
        action: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct Common {
    #[serde(default)]
    action: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectFields {
    html_url: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct CommentFields {
    node_id: String,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    body: Option<String>,
}

impl Event {
    /// Classify a delivery from its event header and JSON payload.
    pub fn classify(event: Option<&str>, payload: &Value) -> Result<Self, EventError> {
        let Some(event) = event else {
            if is_membership(payload) {
                return Ok(Event::Membership);
            }
            return Ok(Event::Other {
                event: String::new(),
                action: None,
            });
        };

        let common: Common = parse(event, payload)?;
        let action = common.action.as_deref();

        let classified = match (event, action) {
            ("ping", _) => Event::Ping,
            ("issues", Some("opened")) => Event::IssueOpened(object_event(event, payload, "issue")?),
            ("discussion", Some("created")) => {
                Event::DiscussionCreated(object_event(event, payload, "discussion")?)
            }
            ("pull_request", Some("opened")) => {
                Event::PullRequestOpened(object_event(event, payload, "pull_request")?)
            }
            ("issue_comment", Some("created")) => Event::IssueCommentCreated(comment_event(
                event,
                payload,
                "comment",
                CommentKind::IssueComment,
            )?),
            ("discussion_comment", Some("created")) => Event::DiscussionCommentCreated(
                comment_event(event, payload, "comment", CommentKind::DiscussionComment)?,
            ),
            ("pull_request_review", Some("submitted")) => Event::PullRequestReviewSubmitted(
                comment_event(event, payload, "review", CommentKind::PullRequestReview)?,
            ),
            ("pull_request_review_comment", Some("created")) => {
                Event::PullRequestReviewCommentCreated(comment_event(
                    event,
                    payload,
                    "comment",
                    CommentKind::PullRequestReviewComment,
                )?)
            }
            _ => Event::Other {
                event: event.to_string(),
                action: common.action.clone(),
            },
        };
        Ok(classified)
    }

    /// Whether the payload is relayed downstream at all.
    pub fn is_forwarded(&self) -> bool {
        !matches!(self, Event::Ping)
    }

    /// Payload key holding the object or comment this event rewrites.
    pub fn payload_key(&self) -> Option<&'static str> {
        match self {
            Event::IssueOpened(_) => Some("issue"),
            Event::DiscussionCreated(_) => Some("discussion"),
            Event::PullRequestOpened(_) => Some("pull_request"),
            Event::IssueCommentCreated(_)
            | Event::DiscussionCommentCreated(_)
            | Event::PullRequestReviewCommentCreated(_) => Some("comment"),
            Event::PullRequestReviewSubmitted(_) => Some("review"),
            _ => None,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Event::Ping => "ping".to_string(),
            Event::IssueOpened(_) => "issues.opened".to_string(),
            Event::DiscussionCreated(_) => "discussion.created".to_string(),
            Event::PullRequestOpened(_) => "pull_request.opened".to_string(),
            Event::IssueCommentCreated(_) => "issue_comment.created".to_string(),
            Event::DiscussionCommentCreated(_) => "discussion_comment.created".to_string(),
            Event::PullRequestReviewSubmitted(_) => "pull_request_review.submitted".to_string(),
            Event::PullRequestReviewCommentCreated(_) => {
                "pull_request_review_comment.created".to_string()
            }
            Event::Membership => "membership".to_string(),
            Event::Other { event, action } => match action {
                Some(action) => format!("{}.{}", event, action),
                None => event.clone(),
            },
        }
    }
}

/// Login of the account that triggered the delivery.
pub fn sender_login(payload: &Value) -> Option<&str> {
    payload.get("sender")?.get("login")?.as_str()
}

/// Membership deliveries carry no forge event header and have top-level
/// `ec` and `data` fields.
pub fn is_membership(payload: &Value) -> bool {
    payload.get("ec").is_some() && payload.get("data").is_some()
}

/// Replace `title`/`body` of the object under `key`.
pub fn rewrite_object(payload: &mut Value, key: &str, title: &str, body: &str) {
    if let Some(object) = payload.get_mut(key).and_then(Value::as_object_mut) {
        object.insert("title".to_string(), Value::from(title));
        object.insert("body".to_string(), Value::from(body));
    }
}

/// Replace `body` of the comment or review under `key`.
pub fn rewrite_body(payload: &mut Value, key: &str, body: &str) {
    if let Some(object) = payload.get_mut(key).and_then(Value::as_object_mut) {
        object.insert("body".to_string(), Value::from(body));
    }
}

/// Point `hook.config.url` at `url` when the payload has one. Returns whether
/// it did.
pub fn rewrite_hook_url(payload: &mut Value, url: &str) -> bool {
    match payload.pointer_mut("/hook/config/url") {
        Some(slot) => {
            *slot = Value::from(url);
            true
        }
        None => false,
    }
}

fn parse<T: DeserializeOwned>(event: &str, value: &Value) -> Result<T, EventError> {
    T::deserialize(value).map_err(|source| EventError::Payload {
        event: event.to_string(),
        source,
    })
}

fn object_event(event: &str, payload: &Value, key: &str) -> Result<ObjectEvent, EventError> {
    let fields: ObjectFields = parse(event, payload.get(key).unwrap_or(&Value::Null))?;
    let object = ObjectRef::parse(&fields.html_url)?;
    let expected = match key {
        "issue" => ObjectKind::Issue,
        "discussion" => ObjectKind::Discussion,
        _ => ObjectKind::PullRequest,
    };
    if object.kind != expected {
        return Err(EventError::Url(ForgeError::InvalidInput(format!(
            "{} payload points at a {}",
            event, object.kind
        ))));
    }
    Ok(ObjectEvent {
        object,
        title: fields.title,
    })
}

fn comment_event(
    event: &str,
    payload: &Value,
    key: &str,
    kind: CommentKind,
) -> Result<CommentEvent, EventError> {
    let fields: CommentFields = parse(event, payload.get(key).unwrap_or(&Value::Null))?;
    Ok(CommentEvent {
        kind,
        node_id: fields.node_id,
        url: fields.html_url,
        body: fields.body.unwrap_or_default(),
    })
}
