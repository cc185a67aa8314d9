use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::comment::{Comment, CommentId};
use crate::domain::request::RequestId;

/// Append-only comment log, oldest first per request. Comment
/// mandatoriness is enforced by the workflow engine before any mutation
/// reaches this log.
#[derive(Clone, Debug, Default)]
pub struct CommentLog {
    by_request: HashMap<String, Vec<Comment>>,
}

impl CommentLog {
    pub fn add(
        &mut self,
        request_id: &RequestId,
        author_email: impl Into<String>,
        body: impl Into<String>,
    ) -> Comment {
        let comment = Comment {
            id: CommentId(Uuid::new_v4().to_string()),
            request_id: request_id.clone(),
            author_email: author_email.into(),
            body: body.into(),
            created_at: Utc::now(),
        };
        self.by_request.entry(request_id.0.clone()).or_default().push(comment.clone());
        comment
    }

    pub fn list_for(&self, request_id: &RequestId) -> Vec<Comment> {
        self.by_request.get(&request_id.0).cloned().unwrap_or_default()
    }
}
