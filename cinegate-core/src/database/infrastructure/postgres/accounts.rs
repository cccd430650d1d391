use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinegate_model::{AccountId, InviteId, Plan, ViewerAccount};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::{classify, from_db_count, to_db_count};
use crate::database::ports::accounts::{
    AccountMutation, AccountStore, CreditOutcome,
};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn not_found(id: AccountId) -> StoreError {
        StoreError::NotFound {
            entity: "account",
            id: id.to_string(),
        }
    }

    fn map_row(row: &PgRow) -> StoreResult<ViewerAccount> {
        let read = |column: &str, e: sqlx::Error| {
            StoreError::Corrupt(format!("Failed to read account {column}: {e}"))
        };

        let id: Uuid = row.try_get("id").map_err(|e| read("id", e))?;
        let email: String = row.try_get("email").map_err(|e| read("email", e))?;
        let plan: String = row.try_get("plan").map_err(|e| read("plan", e))?;
        let premium_until: Option<DateTime<Utc>> = row
            .try_get("premium_until")
            .map_err(|e| read("premium_until", e))?;
        let daily_views_consumed: i32 = row
            .try_get("daily_views_consumed")
            .map_err(|e| read("daily_views_consumed", e))?;
        let last_reset_at: DateTime<Utc> = row
            .try_get("last_reset_at")
            .map_err(|e| read("last_reset_at", e))?;
        let bonus_views_available: i32 = row
            .try_get("bonus_views_available")
            .map_err(|e| read("bonus_views_available", e))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| read("created_at", e))?;

        Ok(ViewerAccount {
            id: AccountId::from(id),
            email,
            plan: plan
                .parse::<Plan>()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            premium_until,
            daily_views_consumed: from_db_count(
                daily_views_consumed,
                "daily_views_consumed",
            )?,
            last_reset_at,
            bonus_views_available: from_db_count(
                bonus_views_available,
                "bonus_views_available",
            )?,
            created_at,
        })
    }
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn insert_account(
        &self,
        account: ViewerAccount,
    ) -> StoreResult<ViewerAccount> {
        let row = sqlx::query(
            r#"
            INSERT INTO accounts (
                id,
                email,
                plan,
                premium_until,
                daily_views_consumed,
                last_reset_at,
                bonus_views_available,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                id,
                email,
                plan,
                premium_until,
                daily_views_consumed,
                last_reset_at,
                bonus_views_available,
                created_at
            "#,
        )
        .bind(account.id.to_uuid())
        .bind(&account.email)
        .bind(account.plan.as_str())
        .bind(account.premium_until)
        .bind(to_db_count(
            account.daily_views_consumed,
            "daily_views_consumed",
        )?)
        .bind(account.last_reset_at)
        .bind(to_db_count(
            account.bonus_views_available,
            "bonus_views_available",
        )?)
        .bind(account.created_at)
        .fetch_one(self.pool())
        .await
        .map_err(|err| {
            if err
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                StoreError::Duplicate {
                    entity: "account",
                    detail: format!(
                        "email {} is already registered",
                        account.email
                    ),
                }
            } else {
                classify(err)
            }
        })?;

        Self::map_row(&row)
    }

    async fn get_account(
        &self,
        id: AccountId,
    ) -> StoreResult<Option<ViewerAccount>> {
        let row = sqlx::query(
            r#"
            SELECT
                id,
                email,
                plan,
                premium_until,
                daily_views_consumed,
                last_reset_at,
                bonus_views_available,
                created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id.to_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(classify)?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn find_by_email(
        &self,
        email: &str,
    ) -> StoreResult<Option<ViewerAccount>> {
        let row = sqlx::query(
            r#"
            SELECT
                id,
                email,
                plan,
                premium_until,
                daily_views_consumed,
                last_reset_at,
                bonus_views_available,
                created_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(self.pool())
        .await
        .map_err(classify)?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn atomic_update_account(
        &self,
        id: AccountId,
        update: AccountMutation<'_>,
    ) -> StoreResult<ViewerAccount> {
        let mut tx = self.pool().begin().await.map_err(classify)?;

        let row = sqlx::query(
            r#"
            SELECT
                id,
                email,
                plan,
                premium_until,
                daily_views_consumed,
                last_reset_at,
                bonus_views_available,
                created_at
            FROM accounts
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.to_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify)?
        .ok_or_else(|| Self::not_found(id))?;

        let current = Self::map_row(&row)?;
        let mut draft = current.clone();
        if !update(&mut draft) {
            tx.rollback().await.map_err(classify)?;
            return Ok(current);
        }

        sqlx::query(
            r#"
            UPDATE accounts
            SET plan = $2,
                premium_until = $3,
                daily_views_consumed = $4,
                last_reset_at = $5,
                bonus_views_available = $6,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.to_uuid())
        .bind(draft.plan.as_str())
        .bind(draft.premium_until)
        .bind(to_db_count(
            draft.daily_views_consumed,
            "daily_views_consumed",
        )?)
        .bind(draft.last_reset_at)
        .bind(to_db_count(
            draft.bonus_views_available,
            "bonus_views_available",
        )?)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        tx.commit().await.map_err(classify)?;

        Ok(ViewerAccount {
            id: current.id,
            email: current.email,
            created_at: current.created_at,
            ..draft
        })
    }

    async fn credit_bonus_once(
        &self,
        id: AccountId,
        key: InviteId,
        amount: u32,
    ) -> StoreResult<CreditOutcome> {
        let amount = to_db_count(amount, "amount")?;
        let mut tx = self.pool().begin().await.map_err(classify)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO bonus_credits (account_id, invite_id, amount)
            VALUES ($1, $2, $3)
            ON CONFLICT (account_id, invite_id) DO NOTHING
            "#,
        )
        .bind(id.to_uuid())
        .bind(key.to_uuid())
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            if err
                .as_database_error()
                .is_some_and(|db| db.is_foreign_key_violation())
            {
                Self::not_found(id)
            } else {
                classify(err)
            }
        })?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await.map_err(classify)?;
            return Ok(CreditOutcome::AlreadyApplied);
        }

        let balance: i32 = sqlx::query(
            r#"
            UPDATE accounts
            SET bonus_views_available = bonus_views_available + $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING bonus_views_available
            "#,
        )
        .bind(id.to_uuid())
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify)?
        .ok_or_else(|| Self::not_found(id))?
        .try_get("bonus_views_available")
        .map_err(|e| {
            StoreError::Corrupt(format!("Failed to read bonus balance: {e}"))
        })?;

        tx.commit().await.map_err(classify)?;

        Ok(CreditOutcome::Applied {
            balance: from_db_count(balance, "bonus_views_available")?,
        })
    }
}
