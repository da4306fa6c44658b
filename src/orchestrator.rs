//! Object-level translation: walk an issue, discussion or pull request tree,
//! translate what needs it, write back through the forge and label the object.
//!
//! Every write goes through [`marker::wrap`], so running [`Orchestrator::process`]
//! again on the same object makes no completion calls and no updates.

use crate::classifier::is_target_language;
use crate::completion::Completer;
use crate::github::{CommentKind, CommentNode, Forge, ObjectKind, ObjectRef, RepoRef};
use crate::marker::{self, LABEL_TRANSLATED};
use crate::translate::TranslationEngine;
use anyhow::{Context, Result};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// Title and body were left as they were.
    Unchanged,
    /// Title and/or body were rewritten in one update.
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelState {
    /// Nothing in the tree was machine-translated.
    NotNeeded,
    Added,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentOutcome {
    /// Already carried the sentinel.
    AlreadyTranslated,
    /// Nothing to translate.
    Untouched,
    Updated,
    /// Translated, but the forge refused the write.
    Forbidden,
}

/// What one [`Orchestrator::process`] run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    pub state: ObjectState,
    pub label: LabelState,
    pub comments_updated: usize,
    pub comments_forbidden: usize,
    /// Title and body as they now stand on the forge.
    pub title: String,
    pub body: String,
}

/// What one [`Orchestrator::process_batch`] run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub found: usize,
    pub processed: usize,
    /// URLs of the objects that failed, in search order.
    pub failed: Vec<String>,
}

pub struct Orchestrator<'a> {
    forge: &'a dyn Forge,
    engine: TranslationEngine<'a>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(forge: &'a dyn Forge, completer: &'a dyn Completer, temperature: f32) -> Self {
        Self {
            forge,
            engine: TranslationEngine::new(completer, temperature),
        }
    }

    /// Translate one object and its comments. Safe to call repeatedly.
    pub async fn process(&self, object: &ObjectRef) -> Result<ProcessReport> {
        let tree = self
            .forge
            .fetch_tree(object)
            .await
            .with_context(|| format!("Failed to fetch {}", object))?;

        info!(
            "Processing {} ({} comments, labels: [{}])",
            object,
            tree.comments.len(),
            tree.labels
                .iter()
                .map(|l| l.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut touched = false;
        let mut comments_updated = 0;
        let mut comments_forbidden = 0;

        for comment in &tree.comments {
            let nodes = std::iter::once(comment).chain(comment.replies.iter());
            for node in nodes {
                match self.visit_comment(node, &mut touched).await? {
                    CommentOutcome::Updated => comments_updated += 1,
                    CommentOutcome::Forbidden => comments_forbidden += 1,
                    _ => {}
                }
            }
        }

        let mut changed = false;
        let mut title = tree.title.clone();
        let mut body = tree.body.clone();

        if is_target_language(&tree.title) {
            info!("Title of {} is already English", object);
        } else {
            let result = self
                .engine
                .translate_title(&tree.title, false)
                .await
                .with_context(|| format!("Failed to translate title of {}", object))?;
            touched |= result.touched;
            if result.translated {
                changed = true;
                title = result.text;
            }
        }

        if marker::detect(&tree.body) {
            touched = true;
            info!("Body of {} is already translated", object);
        } else if is_target_language(&tree.body) {
            info!("Body of {} is already English", object);
        } else {
            let result = self
                .engine
                .translate(&tree.body, false)
                .await
                .with_context(|| format!("Failed to translate body of {}", object))?;
            touched |= result.touched;
            if result.translated {
                changed = true;
                body = result.text;
            }
        }

        let state = if changed {
            body = marker::wrap(&body);
            self.forge
                .update_object(tree.kind, &tree.id, &title, &body)
                .await
                .with_context(|| format!("Failed to update {}", object))?;
            info!("Updated {}", object);
            ObjectState::Updated
        } else {
            ObjectState::Unchanged
        };

        let label = if !touched {
            LabelState::NotNeeded
        } else if tree.has_label(LABEL_TRANSLATED) {
            LabelState::AlreadyPresent
        } else {
            let label_id = self
                .forge
                .label_id(&object.repo, LABEL_TRANSLATED)
                .await
                .with_context(|| format!("Failed to resolve label {}", LABEL_TRANSLATED))?;
            self.forge
                .add_label(&tree.id, &label_id)
                .await
                .with_context(|| format!("Failed to label {}", object))?;
            info!("Labeled {} with {}", object, LABEL_TRANSLATED);
            LabelState::Added
        };

        Ok(ProcessReport {
            state,
            label,
            comments_updated,
            comments_forbidden,
            title,
            body,
        })
    }

    /// Search the backlog of `repo` for up to `count` untranslated objects of
    /// `kind` and process each one. A failing object is logged and skipped.
    pub async fn process_batch(
        &self,
        repo: &RepoRef,
        kind: ObjectKind,
        count: u32,
    ) -> Result<BatchReport> {
        let hits = self
            .forge
            .search(repo, kind, count)
            .await
            .with_context(|| format!("Failed to search {}", repo))?;
        let total_comments: u64 = hits.iter().map(|hit| hit.comment_count).sum();
        info!(
            "Found {} {}(s) in {} with {} comment(s)",
            hits.len(),
            kind,
            repo,
            total_comments
        );

        let mut report = BatchReport {
            found: hits.len(),
            ..BatchReport::default()
        };
        for (index, hit) in hits.iter().enumerate() {
            info!("[{}/{}] {} {}", index + 1, hits.len(), hit.url, hit.title);
            let result = match ObjectRef::parse(&hit.url) {
                Ok(object) => self.process(&object).await,
                Err(e) => Err(e.into()),
            };
            match result {
                Ok(outcome) => {
                    info!(
                        "[{}/{}] {:?}, label {:?}, {} comment(s) updated",
                        index + 1,
                        hits.len(),
                        outcome.state,
                        outcome.label,
                        outcome.comments_updated
                    );
                    report.processed += 1;
                }
                Err(e) => {
                    error!("[{}/{}] {}: {:#}", index + 1, hits.len(), hit.url, e);
                    report.failed.push(hit.url.clone());
                }
            }
        }
        Ok(report)
    }

    /// Translate a single comment body in place. Returns the body as written
    /// back, or `None` when nothing was written.
    pub async fn translate_comment(
        &self,
        kind: CommentKind,
        id: &str,
        body: &str,
    ) -> Result<Option<String>> {
        if marker::detect(body) {
            return Ok(None);
        }
        let result = self
            .engine
            .translate(body, false)
            .await
            .with_context(|| format!("Failed to translate {} {}", kind, id))?;
        if !result.translated {
            return Ok(None);
        }

        let wrapped = marker::wrap(&result.text);
        match self.forge.update_comment(kind, id, &wrapped).await {
            Ok(()) => Ok(Some(wrapped)),
            Err(e) if e.is_forbidden() => {
                warn!("Ignoring update of {} {}: {}", kind, id, e);
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("Failed to update {} {}", kind, id)),
        }
    }

    async fn visit_comment(
        &self,
        node: &CommentNode,
        touched: &mut bool,
    ) -> Result<CommentOutcome> {
        if marker::detect(&node.body) {
            *touched = true;
            return Ok(CommentOutcome::AlreadyTranslated);
        }

        let result = self
            .engine
            .translate(&node.body, false)
            .await
            .with_context(|| format!("Failed to translate {} {}", node.kind, node.url))?;
        *touched |= result.touched;
        if !result.translated {
            return Ok(CommentOutcome::Untouched);
        }

        match self
            .forge
            .update_comment(node.kind, &node.id, &marker::wrap(&result.text))
            .await
        {
            Ok(()) => {
                info!("Updated {} {}", node.kind, node.url);
                Ok(CommentOutcome::Updated)
            }
            Err(e) if e.is_forbidden() => {
                warn!("Ignoring update of {} {}: {}", node.kind, node.url, e);
                Ok(CommentOutcome::Forbidden)
            }
            Err(e) => {
                Err(e).with_context(|| format!("Failed to update {} {}", node.kind, node.url))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{Label, SearchHit};
    use crate::test_support::{
        comment, object_ref, tree, FakeForge, ForgeCall, ScriptedCompleter, DEFAULT_REPLY,
    };

    fn sentinel_body(text: &str) -> String {
        marker::wrap(text)
    }

    // ==================== process ====================

    #[tokio::test]
    async fn test_translates_tree_and_labels_once() {
        let mut first = comment("IC_1", CommentKind::IssueComment, "我也遇到了");
        first.replies = vec![comment("IC_2", CommentKind::IssueComment, "Me too")];
        let forge = FakeForge::new().with_tree(
            1,
            tree(ObjectKind::Issue, "推流失败", "无法推流\n```\nlog\n```", vec![first]),
        );
        let completer = ScriptedCompleter::ok(&["I met it too", "Publish failed", "Cannot publish"]);
        let orchestrator = Orchestrator::new(&forge, &completer, 0.0);

        let report = orchestrator
            .process(&object_ref(ObjectKind::Issue, 1))
            .await
            .expect("Should process");

        assert_eq!(report.state, ObjectState::Updated);
        assert_eq!(report.label, LabelState::Added);
        assert_eq!(report.comments_updated, 1);
        assert_eq!(report.title, "Publish failed");
        assert_eq!(
            report.body,
            "Cannot publish\n```\nlog\n```\n\n`TRANS_BY_GPT4`"
        );
        assert_eq!(forge.label_attach_count(), 1);
        assert_eq!(
            forge.count(|c| matches!(c, ForgeCall::UpdateObject { .. })),
            1
        );
        assert!(forge.calls().contains(&ForgeCall::UpdateComment {
            kind: CommentKind::IssueComment,
            id: "IC_1".to_string(),
            body: "I met it too\n\n`TRANS_BY_GPT4`".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let forge = FakeForge::new().with_tree(
            1,
            tree(
                ObjectKind::Discussion,
                "问题",
                "内容",
                vec![comment("DC_1", CommentKind::DiscussionComment, "回复")],
            ),
        );
        let completer = ScriptedCompleter::ok(&[]);
        let orchestrator = Orchestrator::new(&forge, &completer, 0.0);
        let object = object_ref(ObjectKind::Discussion, 1);

        orchestrator.process(&object).await.expect("Should process");
        let calls_after_first = completer.call_count();
        let writes_after_first = forge.calls().len();

        let report = orchestrator.process(&object).await.expect("Should process again");

        assert_eq!(report.state, ObjectState::Unchanged);
        assert_eq!(report.label, LabelState::AlreadyPresent);
        assert_eq!(completer.call_count(), calls_after_first);
        // Only the second fetch was added.
        assert_eq!(forge.calls().len(), writes_after_first + 1);
        assert_eq!(forge.label_attach_count(), 1);
    }

    #[tokio::test]
    async fn test_existing_label_means_no_attach() {
        let mut object = tree(ObjectKind::Issue, "标题", "Body", vec![]);
        object.labels.push(Label {
            id: "LA_x".to_string(),
            name: LABEL_TRANSLATED.to_string(),
        });
        let forge = FakeForge::new().with_tree(7, object);
        let completer = ScriptedCompleter::ok(&["Title"]);
        let orchestrator = Orchestrator::new(&forge, &completer, 0.0);

        let report = orchestrator
            .process(&object_ref(ObjectKind::Issue, 7))
            .await
            .unwrap();

        assert_eq!(report.state, ObjectState::Updated);
        assert_eq!(report.label, LabelState::AlreadyPresent);
        assert_eq!(forge.label_attach_count(), 0);
        assert_eq!(forge.count(|c| matches!(c, ForgeCall::LabelId(_))), 0);
    }

    #[tokio::test]
    async fn test_english_object_is_unchanged_and_unlabeled() {
        let forge = FakeForge::new().with_tree(
            2,
            tree(
                ObjectKind::Issue,
                "Crash on start",
                "Steps below 🚀",
                vec![comment("IC_1", CommentKind::IssueComment, "Thanks")],
            ),
        );
        let completer = ScriptedCompleter::ok(&[]);
        let orchestrator = Orchestrator::new(&forge, &completer, 0.0);

        let report = orchestrator
            .process(&object_ref(ObjectKind::Issue, 2))
            .await
            .unwrap();

        assert_eq!(report.state, ObjectState::Unchanged);
        assert_eq!(report.label, LabelState::NotNeeded);
        assert_eq!(completer.call_count(), 0);
        assert_eq!(forge.calls(), vec![ForgeCall::FetchTree(2)]);
    }

    #[tokio::test]
    async fn test_sentinel_in_comment_still_labels() {
        let forge = FakeForge::new().with_tree(
            3,
            tree(
                ObjectKind::Issue,
                "Crash",
                "English body",
                vec![comment("IC_1", CommentKind::IssueComment, &sentinel_body("Done"))],
            ),
        );
        let completer = ScriptedCompleter::ok(&[]);
        let orchestrator = Orchestrator::new(&forge, &completer, 0.0);

        let report = orchestrator
            .process(&object_ref(ObjectKind::Issue, 3))
            .await
            .unwrap();

        assert_eq!(report.state, ObjectState::Unchanged);
        assert_eq!(report.label, LabelState::Added);
        assert_eq!(forge.label_attach_count(), 1);
    }

    #[tokio::test]
    async fn test_forbidden_reply_is_skipped() {
        let mut review = comment("PRR_1", CommentKind::PullRequestReview, "");
        review.replies = vec![
            comment("PRRC_1", CommentKind::PullRequestReviewComment, "这里有问题"),
            comment("PRRC_2", CommentKind::PullRequestReviewComment, "这里也是"),
        ];
        let forge = FakeForge::new()
            .with_tree(4, tree(ObjectKind::PullRequest, "Fix", "Body", vec![review]))
            .forbid("PRRC_1");
        let completer = ScriptedCompleter::ok(&[]);
        let orchestrator = Orchestrator::new(&forge, &completer, 0.0);

        let report = orchestrator
            .process(&object_ref(ObjectKind::PullRequest, 4))
            .await
            .expect("Forbidden update should not be fatal");

        assert_eq!(report.comments_forbidden, 1);
        assert_eq!(report.comments_updated, 1);
        assert!(forge.calls().contains(&ForgeCall::UpdateComment {
            kind: CommentKind::PullRequestReviewComment,
            id: "PRRC_2".to_string(),
            body: marker::wrap(DEFAULT_REPLY),
        }));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_fatal() {
        let forge = FakeForge::new().failing(5);
        let completer = ScriptedCompleter::ok(&[]);
        let orchestrator = Orchestrator::new(&forge, &completer, 0.0);

        let err = orchestrator
            .process(&object_ref(ObjectKind::Issue, 5))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to fetch"));
    }

    // ==================== process_batch ====================

    fn hit(number: u64, url: &str) -> SearchHit {
        SearchHit {
            id: format!("I_{}", number),
            title: format!("Object {}", number),
            url: url.to_string(),
            comment_count: number,
        }
    }

    #[tokio::test]
    async fn test_batch_continues_past_failures() {
        let forge = FakeForge::new()
            .with_tree(1, tree(ObjectKind::Issue, "推流失败", "Body", vec![]))
            .failing(2)
            .with_tree(3, tree(ObjectKind::Issue, "Crash", "Body", vec![]))
            .with_search_hits(vec![
                hit(1, "https://github.com/ossrs/srs/issues/1"),
                hit(2, "https://github.com/ossrs/srs/issues/2"),
                hit(4, "https://github.com/ossrs"),
                hit(3, "https://github.com/ossrs/srs/issues/3"),
            ]);
        let completer = ScriptedCompleter::ok(&["Publish failed"]);
        let orchestrator = Orchestrator::new(&forge, &completer, 0.0);
        let repo = RepoRef::new("ossrs", "srs");

        let report = orchestrator
            .process_batch(&repo, ObjectKind::Issue, 10)
            .await
            .expect("Should run the whole batch");

        assert_eq!(report.found, 4);
        assert_eq!(report.processed, 2);
        assert_eq!(
            report.failed,
            vec![
                "https://github.com/ossrs/srs/issues/2".to_string(),
                "https://github.com/ossrs".to_string(),
            ]
        );
        assert_eq!(
            forge.calls()[0],
            ForgeCall::Search {
                repo: repo.to_string(),
                kind: ObjectKind::Issue,
                count: 10,
            }
        );
        assert_eq!(forge.count(|c| matches!(c, ForgeCall::FetchTree(_))), 3);
        assert_eq!(forge.tree(1).expect("Should keep tree").title, "Publish failed");
    }

    #[tokio::test]
    async fn test_batch_respects_count() {
        let forge = FakeForge::new()
            .with_tree(1, tree(ObjectKind::Discussion, "Hello", "World", vec![]))
            .with_search_hits(vec![
                hit(1, "https://github.com/ossrs/srs/discussions/1"),
                hit(2, "https://github.com/ossrs/srs/discussions/2"),
            ]);
        let completer = ScriptedCompleter::ok(&[]);
        let orchestrator = Orchestrator::new(&forge, &completer, 0.0);

        let report = orchestrator
            .process_batch(&RepoRef::new("ossrs", "srs"), ObjectKind::Discussion, 1)
            .await
            .expect("Should run the batch");

        assert_eq!(report.found, 1);
        assert_eq!(report.processed, 1);
        assert!(report.failed.is_empty());
        assert_eq!(completer.call_count(), 0);
    }

    // ==================== translate_comment ====================

    #[tokio::test]
    async fn test_translate_single_comment() {
        let forge = FakeForge::new();
        let completer = ScriptedCompleter::ok(&["Looks good"]);
        let orchestrator = Orchestrator::new(&forge, &completer, 0.0);

        let written = orchestrator
            .translate_comment(CommentKind::IssueComment, "IC_9", "看起来不错")
            .await
            .unwrap();

        assert_eq!(written.as_deref(), Some("Looks good\n\n`TRANS_BY_GPT4`"));
        assert_eq!(forge.label_attach_count(), 0);
    }

    #[tokio::test]
    async fn test_translate_comment_skips_sentinel_and_english() {
        let forge = FakeForge::new();
        let completer = ScriptedCompleter::ok(&[]);
        let orchestrator = Orchestrator::new(&forge, &completer, 0.0);

        assert!(orchestrator
            .translate_comment(CommentKind::IssueComment, "IC_1", &sentinel_body("Hi"))
            .await
            .unwrap()
            .is_none());
        assert!(orchestrator
            .translate_comment(CommentKind::IssueComment, "IC_2", "LGTM")
            .await
            .unwrap()
            .is_none());
        assert!(forge.calls().is_empty());
        assert_eq!(completer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_translate_comment_tolerates_forbidden() {
        let forge = FakeForge::new().forbid("DC_1");
        let completer = ScriptedCompleter::ok(&[]);
        let orchestrator = Orchestrator::new(&forge, &completer, 0.0);

        let written = orchestrator
            .translate_comment(CommentKind::DiscussionComment, "DC_1", "你好")
            .await
            .expect("Forbidden should be tolerated");
        assert!(written.is_none());
    }
}
