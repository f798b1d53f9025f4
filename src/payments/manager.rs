/// Payment records
use super::{Payment, PaymentStatus, PaymentType};
use crate::{
    db,
    error::{MarketError, MarketResult},
};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};

const PAYMENT_COLUMNS: &str = "payment_id, order_code, ad_id, user_id, payment_type, amount, status,
     transaction_id, created_at, completed_at";

/// Payment manager
pub struct PaymentManager {
    db: SqlitePool,
}

impl PaymentManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Store a pending payment for a freshly created gateway order
    pub async fn record_order(
        &self,
        order_code: i64,
        ad_id: &str,
        user_id: &str,
        payment_type: PaymentType,
    ) -> MarketResult<Payment> {
        let payment = Payment {
            payment_id: db::generate_id("pay", 12),
            order_code,
            ad_id: ad_id.to_string(),
            user_id: user_id.to_string(),
            payment_type,
            amount: payment_type.amount(),
            status: PaymentStatus::Pending,
            transaction_id: None,
            created_at: Utc::now(),
            completed_at: None,
        };

        sqlx::query(
            "INSERT INTO payments (payment_id, order_code, ad_id, user_id, payment_type, amount, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&payment.payment_id)
        .bind(payment.order_code)
        .bind(&payment.ad_id)
        .bind(&payment.user_id)
        .bind(payment.payment_type.as_str())
        .bind(payment.amount)
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .execute(&self.db)
        .await?;

        tracing::info!(
            "Recorded {} order {} for ad {}",
            payment_type.as_str(),
            order_code,
            ad_id
        );

        Ok(payment)
    }

    pub async fn find_by_order_code(&self, order_code: i64) -> MarketResult<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE order_code = ?1",
            PAYMENT_COLUMNS
        ))
        .bind(order_code)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(payment_from_row).transpose()
    }

    /// Mark a pending payment completed
    ///
    /// Returns the payment only when this call performed the transition.
    /// An order that is already completed, or a transaction id that already
    /// completed another order, yields `None`.
    pub async fn complete(
        &self,
        order_code: i64,
        transaction_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> MarketResult<Option<Payment>> {
        let mut conn = self.db.acquire().await?;
        Self::complete_on(&mut *conn, order_code, transaction_id, now).await
    }

    /// [`PaymentManager::complete`] on a caller-owned connection, so the
    /// transition can share a transaction with the ad effect it pays for
    pub async fn complete_on(
        conn: &mut SqliteConnection,
        order_code: i64,
        transaction_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> MarketResult<Option<Payment>> {
        let row = sqlx::query(&format!(
            "UPDATE payments SET status = 'completed', transaction_id = ?1, completed_at = ?2
             WHERE order_code = ?3 AND status = 'pending'
               AND (?1 IS NULL OR NOT EXISTS (SELECT 1 FROM payments WHERE transaction_id = ?1))
             RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(transaction_id)
        .bind(now)
        .bind(order_code)
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(payment_from_row).transpose()
    }

    /// Completed payment count and revenue in minor units
    pub async fn completed_totals(&self) -> MarketResult<(i64, i64)> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, COALESCE(SUM(amount), 0) AS revenue
             FROM payments WHERE status = 'completed'",
        )
        .fetch_one(&self.db)
        .await?;

        Ok((row.try_get("total")?, row.try_get("revenue")?))
    }
}

fn payment_from_row(row: &SqliteRow) -> MarketResult<Payment> {
    let payment_type: String = row.try_get("payment_type")?;
    let status: String = row.try_get("status")?;

    Ok(Payment {
        payment_id: row.try_get("payment_id")?,
        order_code: row.try_get("order_code")?,
        ad_id: row.try_get("ad_id")?,
        user_id: row.try_get("user_id")?,
        payment_type: PaymentType::from_str(&payment_type).map_err(|_| {
            MarketError::Internal(format!("Unknown stored payment type: {}", payment_type))
        })?,
        amount: row.try_get("amount")?,
        status: PaymentStatus::from_str(&status)?,
        transaction_id: row.try_get("transaction_id")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}
