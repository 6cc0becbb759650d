use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreatePaymentParams, PaymentsRepo, RepoError};
use crate::domain::entities::PaymentRecord;
use crate::domain::types::{PaymentProviderKind, PaymentStatus};

use super::PostgresRepositories;
use super::util::map_sqlx_error;

const PAYMENT_COLUMNS: &str = "id, amount_minor, status, provider, transaction_id, user_id, \
     listing_id, metadata, refund_reason, refunded_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    amount_minor: i64,
    status: PaymentStatus,
    provider: PaymentProviderKind,
    transaction_id: Option<String>,
    user_id: Uuid,
    listing_id: Uuid,
    metadata: serde_json::Value,
    refund_reason: Option<String>,
    refunded_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PaymentRow> for PaymentRecord {
    fn from(row: PaymentRow) -> Self {
        PaymentRecord {
            id: row.id,
            amount_minor: row.amount_minor,
            status: row.status,
            provider: row.provider,
            transaction_id: row.transaction_id,
            user_id: row.user_id,
            listing_id: row.listing_id,
            metadata: row.metadata,
            refund_reason: row.refund_reason,
            refunded_at: row.refunded_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl PaymentsRepo for PostgresRepositories {
    async fn insert(&self, params: CreatePaymentParams) -> Result<PaymentRecord, RepoError> {
        let row: PaymentRow = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            INSERT INTO payments (id, amount_minor, status, provider, user_id, listing_id, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.amount_minor)
        .bind(params.status)
        .bind(params.provider)
        .bind(params.user_id)
        .bind(params.listing_id)
        .bind(params.metadata)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<PaymentRecord>, RepoError> {
        let row: Option<PaymentRow> = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, RepoError> {
        let row: Option<PaymentRow> = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn attach_transaction(
        &self,
        id: Uuid,
        transaction_id: String,
    ) -> Result<PaymentRecord, RepoError> {
        let row: PaymentRow = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            UPDATE payments
            SET transaction_id = $2, updated_at = now()
            WHERE id = $1
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(transaction_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn complete_where_pending(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, RepoError> {
        // The status guard makes duplicate deliveries race to a single
        // winner inside the database, not in application code.
        let row: Option<PaymentRow> = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            UPDATE payments
            SET status = 'completed'::payment_status, updated_at = now()
            WHERE transaction_id = $1 AND status = 'pending'::payment_status
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(transaction_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn fail_where_pending(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, RepoError> {
        let row: Option<PaymentRow> = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            UPDATE payments
            SET status = 'failed'::payment_status, updated_at = now()
            WHERE transaction_id = $1 AND status = 'pending'::payment_status
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(transaction_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn refund_where_completed(
        &self,
        id: Uuid,
        reason: String,
        at: OffsetDateTime,
    ) -> Result<Option<PaymentRecord>, RepoError> {
        let row: Option<PaymentRow> = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            UPDATE payments
            SET status = 'refunded'::payment_status,
                refund_reason = $2,
                refunded_at = $3,
                updated_at = $3
            WHERE id = $1
              AND status = 'completed'::payment_status
              AND refunded_at IS NULL
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(reason)
        .bind(at)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<PaymentRecord>, RepoError> {
        let rows: Vec<PaymentRow> = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
