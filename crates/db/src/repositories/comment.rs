use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};

use spendy_core::domain::comment::{Comment, CommentId};
use spendy_core::domain::request::RequestId;

use super::{CommentRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCommentRepository {
    pool: DbPool,
}

impl SqlCommentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_comment(row: &sqlx::sqlite::SqliteRow) -> Result<Comment, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let request_id: String =
        row.try_get("request_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let author_email: String =
        row.try_get("author_email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let body: String = row.try_get("body").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Comment {
        id: CommentId(id),
        request_id: RequestId(request_id),
        author_email,
        body,
        created_at,
    })
}

pub(crate) async fn append_comment_in(
    conn: &mut SqliteConnection,
    comment: &Comment,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO comment (id, request_id, author_email, body, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&comment.id.0)
    .bind(&comment.request_id.0)
    .bind(&comment.author_email)
    .bind(&comment.body)
    .bind(comment.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[async_trait::async_trait]
impl CommentRepository for SqlCommentRepository {
    async fn append(&self, comment: Comment) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        append_comment_in(&mut *conn, &comment).await
    }

    async fn list_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Comment>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, request_id, author_email, body, created_at
             FROM comment WHERE request_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_comment).collect::<Result<Vec<_>, _>>()
    }
}
