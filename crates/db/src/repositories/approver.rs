use sqlx::Row;

use spendy_core::domain::approver::{ApproverId, ApproverRecord};
use spendy_core::roles::normalize_email;

use super::{ApproverRepository, RepositoryError};
use crate::DbPool;

pub struct SqlApproverRepository {
    pool: DbPool,
}

impl SqlApproverRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_approver(row: &sqlx::sqlite::SqliteRow) -> Result<ApproverRecord, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let team_member_email: String =
        row.try_get("team_member_email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let team_coach_email: String =
        row.try_get("team_coach_email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let team_coach_title: String =
        row.try_get("team_coach_title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let practice_lead_email: String =
        row.try_get("practice_lead_email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let practice_lead_title: String =
        row.try_get("practice_lead_title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let ceo_email: String =
        row.try_get("ceo_email").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(ApproverRecord {
        id: ApproverId(id),
        team_member_email,
        team_coach_email,
        team_coach_title,
        practice_lead_email,
        practice_lead_title,
        ceo_email,
    })
}

const APPROVER_COLUMNS: &str = "id, team_member_email, team_coach_email, team_coach_title,
       practice_lead_email, practice_lead_title, ceo_email";

pub(crate) async fn fetch_approver_in(
    conn: &mut sqlx::SqliteConnection,
    id: &ApproverId,
) -> Result<Option<ApproverRecord>, RepositoryError> {
    let row = sqlx::query(&format!("SELECT {APPROVER_COLUMNS} FROM approver WHERE id = ?"))
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(ref r) => Ok(Some(row_to_approver(r)?)),
        None => Ok(None),
    }
}

#[async_trait::async_trait]
impl ApproverRepository for SqlApproverRepository {
    async fn find_by_id(&self, id: &ApproverId) -> Result<Option<ApproverRecord>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_approver_in(&mut *conn, id).await
    }

    async fn find_by_member_email(
        &self,
        team_member_email: &str,
    ) -> Result<Option<ApproverRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {APPROVER_COLUMNS} FROM approver WHERE team_member_email = ?"
        ))
        .bind(normalize_email(team_member_email))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_approver(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, approver: ApproverRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO approver (id, team_member_email, team_coach_email, team_coach_title,
                                   practice_lead_email, practice_lead_title, ceo_email)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 team_member_email = excluded.team_member_email,
                 team_coach_email = excluded.team_coach_email,
                 team_coach_title = excluded.team_coach_title,
                 practice_lead_email = excluded.practice_lead_email,
                 practice_lead_title = excluded.practice_lead_title,
                 ceo_email = excluded.ceo_email",
        )
        .bind(&approver.id.0)
        .bind(normalize_email(&approver.team_member_email))
        .bind(normalize_email(&approver.team_coach_email))
        .bind(&approver.team_coach_title)
        .bind(normalize_email(&approver.practice_lead_email))
        .bind(&approver.practice_lead_title)
        .bind(normalize_email(&approver.ceo_email))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use spendy_core::domain::approver::{ApproverId, ApproverRecord};

    use super::SqlApproverRepository;
    use crate::repositories::ApproverRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_approver(id: &str, member: &str) -> ApproverRecord {
        ApproverRecord {
            id: ApproverId(id.to_string()),
            team_member_email: member.to_string(),
            team_coach_email: "coach@example.com".to_string(),
            team_coach_title: "Team Coach".to_string(),
            practice_lead_email: "lead@example.com".to_string(),
            practice_lead_title: "Practice Lead".to_string(),
            ceo_email: "ceo@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn save_and_find_by_id() {
        let pool = setup().await;
        let repo = SqlApproverRepository::new(pool);

        repo.save(sample_approver("APV-1", "dev@example.com")).await.expect("save");

        let found = repo
            .find_by_id(&ApproverId("APV-1".to_string()))
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(found.practice_lead_email, "lead@example.com");
        assert_eq!(found.ceo_email, "ceo@example.com");
    }

    #[tokio::test]
    async fn find_by_member_email_normalizes_lookup() {
        let pool = setup().await;
        let repo = SqlApproverRepository::new(pool);

        repo.save(sample_approver("APV-1", "Dev@Example.COM")).await.expect("save");

        let found = repo.find_by_member_email("  dev@example.com ").await.expect("find");
        assert!(found.is_some());

        let missing = repo.find_by_member_email("other@example.com").await.expect("find");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn save_upserts_on_conflict() {
        let pool = setup().await;
        let repo = SqlApproverRepository::new(pool);

        repo.save(sample_approver("APV-1", "dev@example.com")).await.expect("save");

        let mut updated = sample_approver("APV-1", "dev@example.com");
        updated.practice_lead_email = "newlead@example.com".to_string();
        repo.save(updated).await.expect("upsert");

        let found = repo
            .find_by_id(&ApproverId("APV-1".to_string()))
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(found.practice_lead_email, "newlead@example.com");
    }
}
