//! The bounded conversation loop.
//!
//! ```text
//! user query ─► model ─► Text ───────────────────────────► Answer::Final
//!                 ▲  └─► ToolCalls ─► router (in order) ─┐
//!                 └──────────── outcomes ◄───────────────┘
//! ```
//!
//! At most `max_tool_calls` calls are made per query. Calls past the limit
//! still get a failure outcome, so the history never holds an unanswered
//! call, and the answer degrades instead of failing. A store failure ends
//! the query, but only after the rest of its batch is answered too.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::storage::GraphStore;
use crate::tools::{FailureKind, ToolDeclaration, ToolFailure, ToolInvocation, ToolOutcome, ToolRouter};
use crate::{Error, Result};
use super::{Confirmation, LanguageModel, Message, ModelReply};

/// Result of one user query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Answer {
    /// The model's final text.
    Final(String),
    /// The query was cut short; `reason` says why.
    Degraded { reason: String, tool_calls: usize },
}

impl Answer {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Answer::Degraded { .. })
    }

    pub fn text(&self) -> &str {
        match self {
            Answer::Final(text) => text,
            Answer::Degraded { reason, .. } => reason,
        }
    }
}

/// One conversation: its history, its router, and the model it talks to.
pub struct ConversationLoop<S: GraphStore> {
    router: ToolRouter<S>,
    model: Arc<dyn LanguageModel>,
    confirmation: Arc<dyn Confirmation>,
    history: Vec<Message>,
}

impl<S: GraphStore> ConversationLoop<S> {
    pub fn new(
        router: ToolRouter<S>,
        model: Arc<dyn LanguageModel>,
        confirmation: Arc<dyn Confirmation>,
    ) -> Self {
        Self { router, model, confirmation, history: Vec::new() }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn router(&self) -> &ToolRouter<S> {
        &self.router
    }

    /// Answer one user query.
    ///
    /// Errors only when the model or the store is unusable; everything a
    /// tool can get wrong is fed back to the model instead.
    pub async fn process_query(&mut self, query: &str) -> Result<Answer> {
        self.history.push(Message::user(query));
        let result = match self.router.catalog().await {
            Ok(tools) => self.drive(&tools).await,
            Err(err) => Err(err),
        };
        self.router.release_all();
        result
    }

    async fn drive(&mut self, tools: &[ToolDeclaration]) -> Result<Answer> {
        let limit = self.router.config().max_tool_calls;
        let mut calls_made = 0usize;
        let mut turn = 0usize;

        loop {
            turn += 1;
            debug!(turn, history = self.history.len(), "model turn");
            let reply = self.model.respond(&self.history, tools).await?;

            let calls = match reply {
                ModelReply::Text(text) => {
                    info!(turn, tool_calls = calls_made, "query answered");
                    self.history.push(Message::assistant(text.clone()));
                    return Ok(Answer::Final(text));
                }
                ModelReply::ToolCalls(calls) if calls.is_empty() => {
                    return Err(Error::Model("reply contained neither text nor tool calls".into()));
                }
                ModelReply::ToolCalls(calls) => calls,
            };

            self.history.push(Message::ToolCalls { calls: calls.clone() });
            let mut limited = false;
            for (i, call) in calls.iter().enumerate() {
                let outcome = if calls_made >= limit {
                    limited = true;
                    ToolOutcome::failure(call, ToolFailure::from(&Error::TurnLimitExceeded))
                } else {
                    calls_made += 1;
                    match self.answer(call).await {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            self.abandon(&calls[i..], &err);
                            return Err(err);
                        }
                    }
                };
                self.history.push(Message::ToolResult { outcome });
            }

            if limited {
                let reason = Error::TurnLimitExceeded.to_string();
                warn!(limit, tool_calls = calls_made, "tool call limit reached");
                return Ok(Answer::Degraded { reason, tool_calls: calls_made });
            }
        }
    }

    /// Close out a batch cut short by `err`: the failing call and every
    /// call after it get an `Internal` outcome.
    fn abandon(&mut self, rest: &[ToolInvocation], err: &Error) {
        warn!(error = %err, unanswered = rest.len(), "query aborted mid-batch");
        for (i, call) in rest.iter().enumerate() {
            let failure = if i == 0 {
                ToolFailure::from(err)
            } else {
                ToolFailure::new(FailureKind::Internal, format!("not run: {err}"))
            };
            self.history.push(Message::ToolResult { outcome: ToolOutcome::failure(call, failure) });
        }
    }

    async fn answer(&self, call: &ToolInvocation) -> Result<ToolOutcome> {
        if self.router.requires_confirmation(&call.name) && !self.confirmation.confirm(call).await {
            info!(call_id = %call.id, tool = %call.name, "write refused by user");
            return Ok(ToolOutcome::failure(call, ToolFailure::from(&Error::Cancelled)));
        }
        self.router.dispatch(call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    use crate::agent::{AutoApprove, ReadOnly};
    use crate::model::props;
    use crate::storage::MemoryStore;
    use crate::AgentConfig;

    /// Plays back canned replies; ends with a fixed text when it runs out.
    struct Scripted {
        replies: Mutex<VecDeque<ModelReply>>,
    }

    impl Scripted {
        fn new(replies: Vec<ModelReply>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()) })
        }
    }

    #[async_trait]
    impl LanguageModel for Scripted {
        async fn respond(&self, _history: &[Message], _tools: &[ToolDeclaration]) -> Result<ModelReply> {
            Ok(self.replies.lock().pop_front().unwrap_or_else(|| ModelReply::Text("done".into())))
        }
    }

    async fn router(max_tool_calls: usize) -> ToolRouter<MemoryStore> {
        let db = MemoryStore::new();
        let a = db.create_node(&["PROD_ROUTER"], props([("name", "R1")])).await.unwrap();
        let b = db.create_node(&["PROD_ROUTER"], props([("name", "R2")])).await.unwrap();
        db.create_relationship(a, b, "PROD_ROUTING_LINK", props([("igp_metric", 10)])).await.unwrap();
        let config = AgentConfig { max_tool_calls, ..AgentConfig::default() };
        ToolRouter::new(Arc::new(db), config)
    }

    fn path_call(id: &str) -> ToolInvocation {
        ToolInvocation::new(id, "find_shortest_path", json!({ "start_node": "R1", "end_node": "R2" }))
    }

    #[tokio::test]
    async fn test_text_reply_ends_query() {
        let model = Scripted::new(vec![ModelReply::Text("R1 reaches R2 directly.".into())]);
        let mut convo = ConversationLoop::new(router(4).await, model, Arc::new(AutoApprove));
        let answer = convo.process_query("how does R1 reach R2?").await.unwrap();
        assert_eq!(answer, Answer::Final("R1 reaches R2 directly.".into()));
        assert_eq!(convo.history().len(), 2);
    }

    #[tokio::test]
    async fn test_limit_answers_every_call() {
        let model = Scripted::new(vec![ModelReply::ToolCalls(vec![path_call("a"), path_call("b")])]);
        let mut convo = ConversationLoop::new(router(1).await, model, Arc::new(AutoApprove));
        let answer = convo.process_query("q").await.unwrap();

        assert!(answer.is_degraded());
        let outcomes: Vec<&ToolOutcome> = convo.history().iter()
            .filter_map(|m| match m {
                Message::ToolResult { outcome } => Some(outcome),
                _ => None,
            })
            .collect();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_success());
        assert_eq!(outcomes[1].correlation_id, "b");
        assert_eq!(outcomes[1].failure_kind(), Some(FailureKind::TurnLimitExceeded));
    }

    #[tokio::test]
    async fn test_refused_write_is_cancelled() {
        let write = ToolInvocation::new("w", "write_neo4j_cypher", json!({ "query": "CREATE (n)" }));
        let model = Scripted::new(vec![ModelReply::ToolCalls(vec![write])]);
        let mut convo = ConversationLoop::new(router(4).await, model, Arc::new(ReadOnly));
        let answer = convo.process_query("add a router").await.unwrap();

        assert_eq!(answer.text(), "done");
        let cancelled = convo.history().iter().any(|m| matches!(
            m,
            Message::ToolResult { outcome } if outcome.failure_kind() == Some(FailureKind::Cancelled)
        ));
        assert!(cancelled);
    }

    #[tokio::test]
    async fn test_resources_released_after_query() {
        let build = ToolInvocation::new("b", "build_projection", json!({}));
        let model = Scripted::new(vec![ModelReply::ToolCalls(vec![build, path_call("p")])]);
        let mut convo = ConversationLoop::new(router(4).await, model, Arc::new(AutoApprove));
        convo.process_query("q").await.unwrap();

        assert!(convo.router().projections().is_empty());
        assert_eq!(convo.router().stored_paths(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_answers_whole_batch() {
        let db = Arc::new(MemoryStore::new());
        let router = ToolRouter::new(Arc::clone(&db), AgentConfig::default());
        db.shutdown().await.unwrap();
        let model = Scripted::new(vec![ModelReply::ToolCalls(vec![path_call("a"), path_call("b")])]);
        let mut convo = ConversationLoop::new(router, model, Arc::new(AutoApprove));

        let err = convo.process_query("q").await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));

        let outcomes: Vec<&ToolOutcome> = convo.history().iter()
            .filter_map(|m| match m {
                Message::ToolResult { outcome } => Some(outcome),
                _ => None,
            })
            .collect();
        let ids: Vec<&str> = outcomes.iter().map(|o| o.correlation_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(outcomes.iter().all(|o| o.failure_kind() == Some(FailureKind::Internal)));
    }
}
