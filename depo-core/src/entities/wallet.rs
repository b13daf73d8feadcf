use crate::framework::DatabaseProcessor;
use depo_sdk::objects::WalletResponse;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Wallet {
    pub user_id: String,
    pub balance: Decimal,
    pub total_deposited: Decimal,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Wallet {
    /// A zeroed wallet, as created on first read.
    pub fn empty(user_id: impl Into<String>, at: OffsetDateTime) -> Self {
        Wallet {
            user_id: user_id.into(),
            balance: Decimal::ZERO,
            total_deposited: Decimal::ZERO,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn to_response(&self) -> WalletResponse {
        WalletResponse {
            user_id: self.user_id.clone(),
            balance: self.balance,
            total_deposited: self.total_deposited,
            updated_at: self.updated_at.unix_timestamp(),
        }
    }
}

const WALLET_COLUMNS: &str = "user_id, balance, total_deposited, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct GetWallet {
    pub user_id: String,
}

impl Processor<GetWallet> for DatabaseProcessor {
    type Output = Option<Wallet>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetWallet")]
    async fn process(&self, query: GetWallet) -> Result<Option<Wallet>, sqlx::Error> {
        let sql = format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1");
        sqlx::query_as::<_, Wallet>(&sql)
            .bind(query.user_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Read a wallet, inserting a zeroed one first if the user has none.
///
/// The insert is `ON CONFLICT DO NOTHING`, so concurrent readers never
/// create two wallets.
pub struct GetOrCreateWallet {
    pub user_id: String,
    pub at: OffsetDateTime,
}

impl Processor<GetOrCreateWallet> for DatabaseProcessor {
    type Output = Wallet;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOrCreateWallet")]
    async fn process(&self, cmd: GetOrCreateWallet) -> Result<Wallet, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO wallets (user_id, balance, total_deposited, created_at, updated_at)
            VALUES ($1, 0, 0, $2, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(&cmd.user_id)
        .bind(cmd.at)
        .execute(&self.pool)
        .await?;
        let sql = format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1");
        sqlx::query_as::<_, Wallet>(&sql)
            .bind(cmd.user_id)
            .fetch_one(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Conditional credit: add `delta` to balance and total only while
/// `total_deposited` still equals `expected_total`.
///
/// A missing wallet counts as `expected_total = 0` and is created by the
/// same statement. Returns `None` when the wallet moved in between.
pub struct ApplyWalletCredit {
    pub user_id: String,
    pub expected_total: Decimal,
    pub delta: Decimal,
    pub at: OffsetDateTime,
}

impl Processor<ApplyWalletCredit> for DatabaseProcessor {
    type Output = Option<Wallet>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ApplyWalletCredit")]
    async fn process(&self, cmd: ApplyWalletCredit) -> Result<Option<Wallet>, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO wallets (user_id, balance, total_deposited, created_at, updated_at)
            SELECT $1, $3, $3, $4, $4
            WHERE $2 = 0
            ON CONFLICT (user_id) DO UPDATE
            SET balance = wallets.balance + $3,
                total_deposited = wallets.total_deposited + $3,
                updated_at = $4
            WHERE wallets.total_deposited = $2
            RETURNING {WALLET_COLUMNS}
            "#
        );
        let inserted = sqlx::query_as::<_, Wallet>(&sql)
            .bind(&cmd.user_id)
            .bind(cmd.expected_total)
            .bind(cmd.delta)
            .bind(cmd.at)
            .fetch_optional(&self.pool)
            .await?;
        if inserted.is_some() || cmd.expected_total.is_zero() {
            return Ok(inserted);
        }
        // A non-zero expectation can only be met by an existing row.
        let sql = format!(
            r#"
            UPDATE wallets
            SET balance = balance + $3,
                total_deposited = total_deposited + $3,
                updated_at = $4
            WHERE user_id = $1 AND total_deposited = $2
            RETURNING {WALLET_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Wallet>(&sql)
            .bind(cmd.user_id)
            .bind(cmd.expected_total)
            .bind(cmd.delta)
            .bind(cmd.at)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Subtract `amount` from the balance if it covers it. `None` otherwise.
pub struct DebitWallet {
    pub user_id: String,
    pub amount: Decimal,
    pub at: OffsetDateTime,
}

impl Processor<DebitWallet> for DatabaseProcessor {
    type Output = Option<Wallet>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DebitWallet")]
    async fn process(&self, cmd: DebitWallet) -> Result<Option<Wallet>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE wallets
            SET balance = balance - $2, updated_at = $3
            WHERE user_id = $1 AND balance >= $2
            RETURNING {WALLET_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Wallet>(&sql)
            .bind(cmd.user_id)
            .bind(cmd.amount)
            .bind(cmd.at)
            .fetch_optional(&self.pool)
            .await
    }
}
