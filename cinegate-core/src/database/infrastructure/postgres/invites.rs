use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinegate_model::{AccountId, Invite, InviteId, InviteStatus};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::classify;
use crate::database::ports::invites::InviteStore;
use crate::error::{StoreError, StoreResult};

const CODE_CONSTRAINT: &str = "invites_code_key";
const PENDING_CONSTRAINT: &str = "invites_pending_invitee_idx";

#[derive(Debug, Clone)]
pub struct PostgresInviteStore {
    pool: PgPool,
}

impl PostgresInviteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> StoreResult<Invite> {
        let read = |column: &str, e: sqlx::Error| {
            StoreError::Corrupt(format!("Failed to read invite {column}: {e}"))
        };

        let id: Uuid = row.try_get("id").map_err(|e| read("id", e))?;
        let inviter_id: Uuid =
            row.try_get("inviter_id").map_err(|e| read("inviter_id", e))?;
        let invitee_email: String = row
            .try_get("invitee_email")
            .map_err(|e| read("invitee_email", e))?;
        let code: String = row.try_get("code").map_err(|e| read("code", e))?;
        let status: String =
            row.try_get("status").map_err(|e| read("status", e))?;
        let created_at: DateTime<Utc> =
            row.try_get("created_at").map_err(|e| read("created_at", e))?;
        let expires_at: DateTime<Utc> =
            row.try_get("expires_at").map_err(|e| read("expires_at", e))?;
        let accepted_at: Option<DateTime<Utc>> = row
            .try_get("accepted_at")
            .map_err(|e| read("accepted_at", e))?;

        Ok(Invite {
            id: InviteId::from(id),
            inviter_id: AccountId::from(inviter_id),
            invitee_email,
            code,
            status: status
                .parse::<InviteStatus>()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            created_at,
            expires_at,
            accepted_at,
        })
    }

    fn duplicate(err: sqlx::Error, invite: &Invite) -> StoreError {
        let constraint = err
            .as_database_error()
            .filter(|db| db.is_unique_violation())
            .map(|db| db.constraint().map(str::to_owned));

        match constraint {
            Some(Some(name)) if name == CODE_CONSTRAINT => {
                StoreError::Duplicate {
                    entity: "invite code",
                    detail: invite.code.clone(),
                }
            }
            Some(Some(name)) if name == PENDING_CONSTRAINT => {
                StoreError::Duplicate {
                    entity: "pending invite",
                    detail: invite.invitee_email.clone(),
                }
            }
            Some(_) => StoreError::Duplicate {
                entity: "invite",
                detail: invite.id.to_string(),
            },
            None => classify(err),
        }
    }
}

#[async_trait]
impl InviteStore for PostgresInviteStore {
    async fn insert_invite(&self, invite: Invite) -> StoreResult<Invite> {
        let row = sqlx::query(
            r#"
            INSERT INTO invites (
                id,
                inviter_id,
                invitee_email,
                code,
                status,
                created_at,
                expires_at,
                accepted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                id,
                inviter_id,
                invitee_email,
                code,
                status,
                created_at,
                expires_at,
                accepted_at
            "#,
        )
        .bind(invite.id.to_uuid())
        .bind(invite.inviter_id.to_uuid())
        .bind(&invite.invitee_email)
        .bind(&invite.code)
        .bind(invite.status.as_str())
        .bind(invite.created_at)
        .bind(invite.expires_at)
        .bind(invite.accepted_at)
        .fetch_one(self.pool())
        .await
        .map_err(|err| Self::duplicate(err, &invite))?;

        Self::map_row(&row)
    }

    async fn get_invite(&self, id: InviteId) -> StoreResult<Option<Invite>> {
        let row = sqlx::query(
            r#"
            SELECT
                id,
                inviter_id,
                invitee_email,
                code,
                status,
                created_at,
                expires_at,
                accepted_at
            FROM invites
            WHERE id = $1
            "#,
        )
        .bind(id.to_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(classify)?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn find_by_code(&self, code: &str) -> StoreResult<Option<Invite>> {
        let row = sqlx::query(
            r#"
            SELECT
                id,
                inviter_id,
                invitee_email,
                code,
                status,
                created_at,
                expires_at,
                accepted_at
            FROM invites
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(self.pool())
        .await
        .map_err(classify)?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn find_pending(
        &self,
        inviter: AccountId,
        email: &str,
    ) -> StoreResult<Option<Invite>> {
        let row = sqlx::query(
            r#"
            SELECT
                id,
                inviter_id,
                invitee_email,
                code,
                status,
                created_at,
                expires_at,
                accepted_at
            FROM invites
            WHERE inviter_id = $1
              AND invitee_email = $2
              AND status = 'pending'
            "#,
        )
        .bind(inviter.to_uuid())
        .bind(email)
        .fetch_optional(self.pool())
        .await
        .map_err(classify)?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn list_by_inviter(
        &self,
        inviter: AccountId,
    ) -> StoreResult<Vec<Invite>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                inviter_id,
                invitee_email,
                code,
                status,
                created_at,
                expires_at,
                accepted_at
            FROM invites
            WHERE inviter_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(inviter.to_uuid())
        .fetch_all(self.pool())
        .await
        .map_err(classify)?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn mark_accepted(
        &self,
        id: InviteId,
        now: DateTime<Utc>,
    ) -> StoreResult<Invite> {
        sqlx::query(
            r#"
            UPDATE invites
            SET status = 'accepted',
                accepted_at = $2
            WHERE id = $1
              AND status = 'pending'
              AND expires_at >= $2
            "#,
        )
        .bind(id.to_uuid())
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(classify)?;

        self.get_invite(id).await?.ok_or_else(|| StoreError::NotFound {
            entity: "invite",
            id: id.to_string(),
        })
    }

    async fn mark_expired(&self, id: InviteId) -> StoreResult<Invite> {
        sqlx::query(
            r#"
            UPDATE invites
            SET status = 'expired'
            WHERE id = $1
              AND status = 'pending'
            "#,
        )
        .bind(id.to_uuid())
        .execute(self.pool())
        .await
        .map_err(classify)?;

        self.get_invite(id).await?.ok_or_else(|| StoreError::NotFound {
            entity: "invite",
            id: id.to_string(),
        })
    }

    async fn expire_pending(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE invites
            SET status = 'expired'
            WHERE status = 'pending'
              AND expires_at < $1
            "#,
        )
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(classify)?;

        Ok(result.rows_affected())
    }
}
