use crate::entities::DepositStatus;
use crate::framework::DatabaseProcessor;
use depo_sdk::objects::DepositResponse;
use depo_sdk::objects::admin::AdminDepositResponse;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Deposit {
    pub id: Uuid,
    pub user_id: String,
    pub order_id: String,
    pub amount_usd: Decimal,
    pub status: DepositStatus,
    pub external_payment_id: String,
    pub pay_currency_amount: Decimal,
    pub pay_address: String,
    pub payment_url: Option<String>,
    pub is_demo: bool,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub confirmed_at: Option<OffsetDateTime>,
    pub credited_at: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

impl Deposit {
    /// Whether an open, not yet confirmed deposit has outlived its session at `now`.
    pub fn is_overdue(&self, now: OffsetDateTime) -> bool {
        self.status.expires_lazily() && now >= self.expires_at
    }

    pub fn to_response(&self) -> DepositResponse {
        DepositResponse {
            id: self.id,
            order_id: self.order_id.clone(),
            amount_usd: self.amount_usd,
            status: self.status.into(),
            external_payment_id: self.external_payment_id.clone(),
            pay_currency_amount: self.pay_currency_amount,
            pay_address: self.pay_address.clone(),
            payment_url: self.payment_url.clone(),
            created_at: self.created_at.unix_timestamp(),
            expires_at: self.expires_at.unix_timestamp(),
            confirmed_at: self.confirmed_at.map(OffsetDateTime::unix_timestamp),
            credited_at: self.credited_at.map(OffsetDateTime::unix_timestamp),
            is_demo: self.is_demo,
        }
    }

    pub fn to_admin_response(&self) -> AdminDepositResponse {
        AdminDepositResponse {
            user_id: self.user_id.clone(),
            deposit: self.to_response(),
            updated_at: self.updated_at.unix_timestamp(),
        }
    }
}

/// Data for inserting a new deposit.
///
/// Built by the payment initiator only after the provider opened a session.
#[derive(Debug, Clone)]
pub struct DepositInsert {
    pub id: Uuid,
    pub user_id: String,
    pub order_id: String,
    pub amount_usd: Decimal,
    pub external_payment_id: String,
    pub pay_currency_amount: Decimal,
    pub pay_address: String,
    pub payment_url: Option<String>,
    pub is_demo: bool,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl DepositInsert {
    /// The row as it exists right after insertion.
    pub fn into_deposit(self) -> Deposit {
        Deposit {
            id: self.id,
            user_id: self.user_id,
            order_id: self.order_id,
            amount_usd: self.amount_usd,
            status: DepositStatus::Pending,
            external_payment_id: self.external_payment_id,
            pay_currency_amount: self.pay_currency_amount,
            pay_address: self.pay_address,
            payment_url: self.payment_url,
            is_demo: self.is_demo,
            created_at: self.created_at,
            expires_at: self.expires_at,
            confirmed_at: None,
            credited_at: None,
            updated_at: self.created_at,
        }
    }
}

/// Per-user sum of credited deposit amounts.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CreditedTotal {
    pub user_id: String,
    pub total: Decimal,
}

const DEPOSIT_COLUMNS: &str = r#"
    id, user_id, order_id, amount_usd, status, external_payment_id,
    pay_currency_amount, pay_address, payment_url, is_demo,
    created_at, expires_at, confirmed_at, credited_at, updated_at
"#;

#[derive(Debug, Clone)]
/// Insert a freshly opened deposit in `pending`.
pub struct InsertDeposit {
    pub insert: DepositInsert,
}

impl Processor<InsertDeposit> for DatabaseProcessor {
    type Output = Deposit;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertDeposit")]
    async fn process(&self, cmd: InsertDeposit) -> Result<Deposit, sqlx::Error> {
        let i = cmd.insert;
        let sql = format!(
            r#"
            INSERT INTO deposits
                (id, user_id, order_id, amount_usd, status, external_payment_id,
                 pay_currency_amount, pay_address, payment_url, is_demo,
                 created_at, expires_at, updated_at)
            VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7, $8, $9, $10, $11, $10)
            RETURNING {DEPOSIT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Deposit>(&sql)
            .bind(i.id)
            .bind(i.user_id)
            .bind(i.order_id)
            .bind(i.amount_usd)
            .bind(i.external_payment_id)
            .bind(i.pay_currency_amount)
            .bind(i.pay_address)
            .bind(i.payment_url)
            .bind(i.is_demo)
            .bind(i.created_at)
            .bind(i.expires_at)
            .fetch_one(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct GetDepositById {
    pub id: Uuid,
}

impl Processor<GetDepositById> for DatabaseProcessor {
    type Output = Option<Deposit>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetDepositById")]
    async fn process(&self, query: GetDepositById) -> Result<Option<Deposit>, sqlx::Error> {
        let sql = format!("SELECT {DEPOSIT_COLUMNS} FROM deposits WHERE id = $1");
        sqlx::query_as::<_, Deposit>(&sql)
            .bind(query.id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct GetDepositByOrderId {
    pub order_id: String,
}

impl Processor<GetDepositByOrderId> for DatabaseProcessor {
    type Output = Option<Deposit>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetDepositByOrderId")]
    async fn process(&self, query: GetDepositByOrderId) -> Result<Option<Deposit>, sqlx::Error> {
        let sql = format!("SELECT {DEPOSIT_COLUMNS} FROM deposits WHERE order_id = $1");
        sqlx::query_as::<_, Deposit>(&sql)
            .bind(query.order_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct GetDepositByPaymentId {
    pub external_payment_id: String,
}

impl Processor<GetDepositByPaymentId> for DatabaseProcessor {
    type Output = Option<Deposit>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetDepositByPaymentId")]
    async fn process(&self, query: GetDepositByPaymentId) -> Result<Option<Deposit>, sqlx::Error> {
        let sql = format!("SELECT {DEPOSIT_COLUMNS} FROM deposits WHERE external_payment_id = $1");
        sqlx::query_as::<_, Deposit>(&sql)
            .bind(query.external_payment_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// A user's deposits, newest first.
pub struct ListUserDeposits {
    pub user_id: String,
    pub limit: i64,
    pub offset: i64,
}

impl Processor<ListUserDeposits> for DatabaseProcessor {
    type Output = Vec<Deposit>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListUserDeposits")]
    async fn process(&self, query: ListUserDeposits) -> Result<Vec<Deposit>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {DEPOSIT_COLUMNS}
            FROM deposits
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        );
        sqlx::query_as::<_, Deposit>(&sql)
            .bind(query.user_id)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await
    }
}

#[derive(Debug, Clone, Default)]
/// Admin listing with optional filters.
pub struct ListDeposits {
    pub status: Option<DepositStatus>,
    pub user_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Processor<ListDeposits> for DatabaseProcessor {
    type Output = Vec<Deposit>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListDeposits")]
    async fn process(&self, query: ListDeposits) -> Result<Vec<Deposit>, sqlx::Error> {
        let mut builder = sqlx::QueryBuilder::<sqlx::Postgres>::new(format!(
            "SELECT {DEPOSIT_COLUMNS} FROM deposits WHERE TRUE"
        ));
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(user_id) = query.user_id {
            builder.push(" AND user_id = ").push_bind(user_id);
        }
        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);
        builder
            .build_query_as::<Deposit>()
            .fetch_all(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Conditional status write: only succeeds while the row is still in `expected`.
///
/// `confirmed_at` is stamped the first time a credit-triggering status lands.
/// Returns `None` when another writer moved the row first.
pub struct CompareAndSetDepositStatus {
    pub id: Uuid,
    pub expected: DepositStatus,
    pub new_status: DepositStatus,
    pub at: OffsetDateTime,
}

impl Processor<CompareAndSetDepositStatus> for DatabaseProcessor {
    type Output = Option<Deposit>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CompareAndSetDepositStatus")]
    async fn process(
        &self,
        cmd: CompareAndSetDepositStatus,
    ) -> Result<Option<Deposit>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE deposits
            SET status = $3,
                updated_at = $4,
                confirmed_at = CASE
                    WHEN $5 THEN COALESCE(confirmed_at, $4)
                    ELSE confirmed_at
                END
            WHERE id = $1 AND status = $2
            RETURNING {DEPOSIT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Deposit>(&sql)
            .bind(cmd.id)
            .bind(cmd.expected)
            .bind(cmd.new_status)
            .bind(cmd.at)
            .bind(cmd.new_status.triggers_credit())
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// The single-credit claim: `confirmed|completed -> credited`.
///
/// Exactly one caller gets `Some`; everybody else gets `None`.
pub struct ClaimDepositCredit {
    pub id: Uuid,
    pub at: OffsetDateTime,
}

impl Processor<ClaimDepositCredit> for DatabaseProcessor {
    type Output = Option<Deposit>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ClaimDepositCredit")]
    async fn process(&self, cmd: ClaimDepositCredit) -> Result<Option<Deposit>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE deposits
            SET status = 'credited',
                credited_at = $2,
                updated_at = $2,
                confirmed_at = COALESCE(confirmed_at, $2)
            WHERE id = $1 AND status IN ('confirmed', 'completed')
            RETURNING {DEPOSIT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Deposit>(&sql)
            .bind(cmd.id)
            .bind(cmd.at)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Deposits stuck in a credit-triggering status, oldest first.
pub struct ListCreditableDeposits {
    pub limit: i64,
}

impl Processor<ListCreditableDeposits> for DatabaseProcessor {
    type Output = Vec<Deposit>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListCreditableDeposits")]
    async fn process(&self, query: ListCreditableDeposits) -> Result<Vec<Deposit>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {DEPOSIT_COLUMNS}
            FROM deposits
            WHERE status IN ('confirmed', 'completed')
            ORDER BY updated_at ASC
            LIMIT $1
            "#
        );
        sqlx::query_as::<_, Deposit>(&sql)
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct GetCreditedTotal {
    pub user_id: String,
}

impl Processor<GetCreditedTotal> for DatabaseProcessor {
    type Output = Decimal;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetCreditedTotal")]
    async fn process(&self, query: GetCreditedTotal) -> Result<Decimal, sqlx::Error> {
        sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(amount_usd), 0)
            FROM deposits
            WHERE user_id = $1 AND status = 'credited'
            "#,
        )
        .bind(query.user_id)
        .fetch_one(&self.pool)
        .await
    }
}

#[derive(Debug, Clone, Copy)]
/// Credited sums for every user with at least one credited deposit.
pub struct ListCreditedTotals;

impl Processor<ListCreditedTotals> for DatabaseProcessor {
    type Output = Vec<CreditedTotal>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListCreditedTotals")]
    async fn process(&self, _: ListCreditedTotals) -> Result<Vec<CreditedTotal>, sqlx::Error> {
        sqlx::query_as::<_, CreditedTotal>(
            r#"
            SELECT user_id, SUM(amount_usd) AS total
            FROM deposits
            WHERE status = 'credited'
            GROUP BY user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::Duration;

    fn sample(status: DepositStatus) -> Deposit {
        let now = OffsetDateTime::now_utc();
        Deposit {
            id: Uuid::now_v7(),
            user_id: "u1".into(),
            order_id: "deposit_u1_1".into(),
            amount_usd: dec!(50),
            status,
            external_payment_id: "123".into(),
            pay_currency_amount: dec!(0.00111111),
            pay_address: "bc1q".into(),
            payment_url: None,
            is_demo: false,
            created_at: now,
            expires_at: now + Duration::minutes(30),
            confirmed_at: None,
            credited_at: None,
            updated_at: now,
        }
    }

    #[test]
    fn test_overdue_only_for_open_sessions() {
        let pending = sample(DepositStatus::Pending);
        let later = pending.expires_at + Duration::seconds(1);
        assert!(!pending.is_overdue(pending.created_at));
        assert!(pending.is_overdue(pending.expires_at));
        assert!(pending.is_overdue(later));
        assert!(sample(DepositStatus::Confirming).is_overdue(later));
        assert!(!sample(DepositStatus::Confirmed).is_overdue(later));
        assert!(sample(DepositStatus::Unknown).is_overdue(later));
        assert!(!sample(DepositStatus::Unknown).is_overdue(pending.created_at));
    }

    #[test]
    fn test_response_uses_unix_seconds() {
        let d = sample(DepositStatus::Credited);
        let resp = d.to_response();
        assert_eq!(resp.created_at, d.created_at.unix_timestamp());
        assert_eq!(resp.status, depo_sdk::objects::DepositStatus::Credited);
        let admin = d.to_admin_response();
        assert_eq!(admin.user_id, "u1");
    }
}
