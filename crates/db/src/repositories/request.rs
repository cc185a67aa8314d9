use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqliteConnection};

use spendy_core::domain::approver::ApproverId;
use spendy_core::domain::request::{
    CoachOpinion, ItemKind, Request, RequestId, RequestItem, RequestItemId, RequestStatus,
};

use super::{RepositoryError, RequestRepository};
use crate::DbPool;

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_status(s: &str) -> RequestStatus {
    match s {
        "submitted" => RequestStatus::Submitted,
        "resubmitted" => RequestStatus::Resubmitted,
        "awaiting_ceo_approval" => RequestStatus::AwaitingCeoApproval,
        "hr_processing" => RequestStatus::HrProcessing,
        "rejected" => RequestStatus::Rejected,
        "booking" => RequestStatus::Booking,
        "completed" => RequestStatus::Completed,
        _ => RequestStatus::Draft,
    }
}

pub fn request_status_as_str(status: &RequestStatus) -> &'static str {
    match status {
        RequestStatus::Draft => "draft",
        RequestStatus::Submitted => "submitted",
        RequestStatus::Resubmitted => "resubmitted",
        RequestStatus::AwaitingCeoApproval => "awaiting_ceo_approval",
        RequestStatus::HrProcessing => "hr_processing",
        RequestStatus::Rejected => "rejected",
        RequestStatus::Booking => "booking",
        RequestStatus::Completed => "completed",
    }
}

fn parse_kind(s: &str) -> ItemKind {
    match s {
        "travel" => ItemKind::Travel,
        "accommodation" => ItemKind::Accommodation,
        "software" => ItemKind::Software,
        _ => ItemKind::Training,
    }
}

pub fn item_kind_as_str(kind: &ItemKind) -> &'static str {
    match kind {
        ItemKind::Training => "training",
        ItemKind::Travel => "travel",
        ItemKind::Accommodation => "accommodation",
        ItemKind::Software => "software",
    }
}

fn parse_opinion(s: &str) -> Option<CoachOpinion> {
    match s {
        "approve" => Some(CoachOpinion::Approve),
        "disapprove" => Some(CoachOpinion::Disapprove),
        _ => None,
    }
}

pub fn opinion_as_str(opinion: &CoachOpinion) -> &'static str {
    match opinion {
        CoachOpinion::Approve => "approve",
        CoachOpinion::Disapprove => "disapprove",
    }
}

fn decode<T>(result: Result<T, sqlx::Error>) -> Result<T, RepositoryError> {
    result.map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<Request, RepositoryError> {
    let id: String = decode(row.try_get("id"))?;
    let title: String = decode(row.try_get("title"))?;
    let status_str: String = decode(row.try_get("status"))?;
    let total_cost_str: String = decode(row.try_get("total_cost"))?;
    let author_email: String = decode(row.try_get("author_email"))?;
    let author_name: String = decode(row.try_get("author_name"))?;
    let approver_id: String = decode(row.try_get("approver_id"))?;
    let opinion_str: Option<String> = decode(row.try_get("team_coach_opinion"))?;
    let approved_by_ceo: bool = decode(row.try_get("approved_by_ceo"))?;
    let changed_by_hr: bool = decode(row.try_get("changed_by_hr"))?;
    let budget_committed: bool = decode(row.try_get("budget_committed"))?;
    let submission_date_str: Option<String> = decode(row.try_get("submission_date"))?;
    let deadline_date_str: Option<String> = decode(row.try_get("deadline_date"))?;
    let version: i64 = decode(row.try_get("version"))?;
    let created_at_str: String = decode(row.try_get("created_at"))?;
    let updated_at_str: String = decode(row.try_get("updated_at"))?;

    let total_cost = Decimal::from_str(&total_cost_str)
        .map_err(|e| RepositoryError::Decode(format!("total_cost `{total_cost_str}`: {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let submission_date = submission_date_str
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let deadline_date = deadline_date_str.and_then(|s| NaiveDate::from_str(&s).ok());

    Ok(Request {
        id: RequestId(id),
        title,
        status: parse_status(&status_str),
        total_cost,
        author_email,
        author_name,
        approver_id: ApproverId(approver_id),
        team_coach_opinion: opinion_str.as_deref().and_then(parse_opinion),
        approved_by_ceo,
        changed_by_hr,
        budget_committed,
        submission_date,
        deadline_date,
        version: u32::try_from(version).unwrap_or(1),
        items: Vec::new(),
        created_at,
        updated_at,
    })
}

fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<RequestItem, RepositoryError> {
    let id: String = decode(row.try_get("id"))?;
    let kind_str: String = decode(row.try_get("kind"))?;
    let description: String = decode(row.try_get("description"))?;
    let cost_str: String = decode(row.try_get("cost"))?;
    let start_date_str: Option<String> = decode(row.try_get("start_date"))?;

    let cost = Decimal::from_str(&cost_str)
        .map_err(|e| RepositoryError::Decode(format!("item cost `{cost_str}`: {e}")))?;

    Ok(RequestItem {
        id: RequestItemId(id),
        kind: parse_kind(&kind_str),
        description,
        cost,
        start_date: start_date_str.and_then(|s| NaiveDate::from_str(&s).ok()),
    })
}

const REQUEST_COLUMNS: &str = "id, title, status, total_cost, author_email, author_name,
       approver_id, team_coach_opinion, approved_by_ceo, changed_by_hr,
       budget_committed, submission_date, deadline_date, version,
       created_at, updated_at";

pub(crate) async fn fetch_request_in(
    conn: &mut SqliteConnection,
    id: &RequestId,
) -> Result<Option<Request>, RepositoryError> {
    let row = sqlx::query(&format!("SELECT {REQUEST_COLUMNS} FROM request WHERE id = ?"))
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await?;

    let mut request = match row {
        Some(ref r) => row_to_request(r)?,
        None => return Ok(None),
    };

    let item_rows = sqlx::query(
        "SELECT id, kind, description, cost, start_date
         FROM request_item WHERE request_id = ? ORDER BY id ASC",
    )
    .bind(&id.0)
    .fetch_all(&mut *conn)
    .await?;

    request.items = item_rows.iter().map(row_to_item).collect::<Result<Vec<_>, _>>()?;
    Ok(Some(request))
}

async fn replace_items_in(
    conn: &mut SqliteConnection,
    request: &Request,
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM request_item WHERE request_id = ?")
        .bind(&request.id.0)
        .execute(&mut *conn)
        .await?;

    for item in &request.items {
        sqlx::query(
            "INSERT INTO request_item (id, request_id, kind, description, cost, start_date)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id.0)
        .bind(&request.id.0)
        .bind(item_kind_as_str(&item.kind))
        .bind(&item.description)
        .bind(item.cost.to_string())
        .bind(item.start_date.map(|d| d.to_string()))
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub(crate) async fn upsert_request_in(
    conn: &mut SqliteConnection,
    request: &Request,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO request (id, title, status, total_cost, author_email, author_name,
                              approver_id, team_coach_opinion, approved_by_ceo, changed_by_hr,
                              budget_committed, submission_date, deadline_date, version,
                              created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             title = excluded.title,
             status = excluded.status,
             total_cost = excluded.total_cost,
             team_coach_opinion = excluded.team_coach_opinion,
             approved_by_ceo = excluded.approved_by_ceo,
             changed_by_hr = excluded.changed_by_hr,
             budget_committed = excluded.budget_committed,
             submission_date = excluded.submission_date,
             deadline_date = excluded.deadline_date,
             version = excluded.version,
             updated_at = excluded.updated_at",
    )
    .bind(&request.id.0)
    .bind(&request.title)
    .bind(request_status_as_str(&request.status))
    .bind(request.total_cost.to_string())
    .bind(&request.author_email)
    .bind(&request.author_name)
    .bind(&request.approver_id.0)
    .bind(request.team_coach_opinion.as_ref().map(opinion_as_str))
    .bind(request.approved_by_ceo)
    .bind(request.changed_by_hr)
    .bind(request.budget_committed)
    .bind(request.submission_date.map(|dt| dt.to_rfc3339()))
    .bind(request.deadline_date.map(|d| d.to_string()))
    .bind(i64::from(request.version))
    .bind(request.created_at.to_rfc3339())
    .bind(request.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    replace_items_in(conn, request).await
}

pub(crate) async fn update_request_expecting_version_in(
    conn: &mut SqliteConnection,
    request: &Request,
    expected_version: u32,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE request SET
             title = ?,
             status = ?,
             total_cost = ?,
             team_coach_opinion = ?,
             approved_by_ceo = ?,
             changed_by_hr = ?,
             budget_committed = ?,
             submission_date = ?,
             deadline_date = ?,
             version = ?,
             updated_at = ?
         WHERE id = ? AND version = ?",
    )
    .bind(&request.title)
    .bind(request_status_as_str(&request.status))
    .bind(request.total_cost.to_string())
    .bind(request.team_coach_opinion.as_ref().map(opinion_as_str))
    .bind(request.approved_by_ceo)
    .bind(request.changed_by_hr)
    .bind(request.budget_committed)
    .bind(request.submission_date.map(|dt| dt.to_rfc3339()))
    .bind(request.deadline_date.map(|d| d.to_string()))
    .bind(i64::from(request.version))
    .bind(request.updated_at.to_rfc3339())
    .bind(&request.id.0)
    .bind(i64::from(expected_version))
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        // Zero rows means either a lost version race or a row that is
        // gone entirely; callers need to tell the two apart.
        let exists = sqlx::query("SELECT 1 FROM request WHERE id = ?")
            .bind(&request.id.0)
            .fetch_optional(&mut *conn)
            .await?;
        return Err(match exists {
            Some(_) => RepositoryError::Conflict {
                entity: "request",
                id: request.id.0.clone(),
                expected: expected_version,
            },
            None => RepositoryError::NotFound { entity: "request", id: request.id.0.clone() },
        });
    }

    replace_items_in(conn, request).await
}

pub(crate) async fn delete_request_in(
    conn: &mut SqliteConnection,
    id: &RequestId,
) -> Result<(), RepositoryError> {
    // request_item and comment rows go with it via ON DELETE CASCADE.
    sqlx::query("DELETE FROM request WHERE id = ?").bind(&id.0).execute(&mut *conn).await?;
    Ok(())
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_request_in(&mut *conn, id).await
    }

    async fn save(&self, request: Request) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        upsert_request_in(&mut *tx, &request).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn save_expecting_version(
        &self,
        request: Request,
        expected_version: u32,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        update_request_expecting_version_in(&mut *tx, &request, expected_version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_with_items(&self, id: &RequestId) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        delete_request_in(&mut *conn, id).await
    }
}
