use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::{Row, SqliteConnection};

use spendy_core::domain::budget::{Budget, BudgetId};
use spendy_core::roles::normalize_email;

use super::{BudgetRepository, RepositoryError};
use crate::DbPool;

pub struct SqlBudgetRepository {
    pool: DbPool,
}

impl SqlBudgetRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Budget amounts are stored as whole cents so that the available amount
/// can be adjusted atomically with integer arithmetic in SQL.
pub(crate) fn decimal_to_cents(amount: Decimal) -> Result<i64, RepositoryError> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| RepositoryError::Decode(format!("amount `{amount}` out of cents range")))
}

pub(crate) fn cents_to_decimal(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn row_to_budget(row: &sqlx::sqlite::SqliteRow) -> Result<Budget, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let team_coach_email: String =
        row.try_get("team_coach_email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let year: i64 = row.try_get("year").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total_cents: i64 =
        row.try_get("total_cents").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let available_cents: i64 =
        row.try_get("available_cents").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Budget {
        id: BudgetId(id),
        team_coach_email,
        year: i32::try_from(year)
            .map_err(|_| RepositoryError::Decode(format!("year `{year}` out of range")))?,
        total: cents_to_decimal(total_cents),
        available: cents_to_decimal(available_cents),
    })
}

pub(crate) async fn fetch_budget_by_coach_and_year_in(
    conn: &mut SqliteConnection,
    team_coach_email: &str,
    year: i32,
) -> Result<Option<Budget>, RepositoryError> {
    let row = sqlx::query(
        "SELECT id, team_coach_email, year, total_cents, available_cents
         FROM budget WHERE team_coach_email = ? AND year = ?",
    )
    .bind(normalize_email(team_coach_email))
    .bind(year)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(ref r) => Ok(Some(row_to_budget(r)?)),
        None => Ok(None),
    }
}

pub(crate) async fn adjust_available_in(
    conn: &mut SqliteConnection,
    id: &BudgetId,
    delta: Decimal,
) -> Result<Decimal, RepositoryError> {
    let delta_cents = decimal_to_cents(delta)?;

    let row = sqlx::query(
        "UPDATE budget SET available_cents = available_cents + ?
         WHERE id = ?
         RETURNING available_cents",
    )
    .bind(delta_cents)
    .bind(&id.0)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(r) => {
            let available_cents: i64 = r
                .try_get("available_cents")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            Ok(cents_to_decimal(available_cents))
        }
        None => {
            Err(RepositoryError::NotFound { entity: "budget", id: id.0.clone() })
        }
    }
}

#[async_trait::async_trait]
impl BudgetRepository for SqlBudgetRepository {
    async fn find_by_coach_and_year(
        &self,
        team_coach_email: &str,
        year: i32,
    ) -> Result<Option<Budget>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_budget_by_coach_and_year_in(&mut *conn, team_coach_email, year).await
    }

    async fn save(&self, budget: Budget) -> Result<(), RepositoryError> {
        let total_cents = decimal_to_cents(budget.total)?;
        let available_cents = decimal_to_cents(budget.available)?;

        sqlx::query(
            "INSERT INTO budget (id, team_coach_email, year, total_cents, available_cents)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 team_coach_email = excluded.team_coach_email,
                 year = excluded.year,
                 total_cents = excluded.total_cents,
                 available_cents = excluded.available_cents",
        )
        .bind(&budget.id.0)
        .bind(normalize_email(&budget.team_coach_email))
        .bind(budget.year)
        .bind(total_cents)
        .bind(available_cents)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn adjust_available(
        &self,
        id: &BudgetId,
        delta: Decimal,
    ) -> Result<Decimal, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        adjust_available_in(&mut *conn, id, delta).await
    }
}
