pub mod admin;
pub mod deposit;
pub mod ipn;
pub mod provider;
pub mod wallet;
pub mod ws;

pub use deposit::{CreateDepositRequest, DepositHistoryQuery, DepositResponse, PollDepositQuery};
pub use ipn::{IpnAck, IpnNotification};
pub use wallet::{DebitRequest, WalletResponse};

use serde::{Deserialize, Serialize};

/// Canonical deposit status for API responses.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `depo-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    Pending,
    Confirming,
    Confirmed,
    Completed,
    Failed,
    Expired,
    Unknown,
    Credited,
}

impl std::fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DepositStatus::Pending => write!(f, "pending"),
            DepositStatus::Confirming => write!(f, "confirming"),
            DepositStatus::Confirmed => write!(f, "confirmed"),
            DepositStatus::Completed => write!(f, "completed"),
            DepositStatus::Failed => write!(f, "failed"),
            DepositStatus::Expired => write!(f, "expired"),
            DepositStatus::Unknown => write!(f, "unknown"),
            DepositStatus::Credited => write!(f, "credited"),
        }
    }
}

/// Accepts a JSON string or number and keeps it as a string.
///
/// The provider sends payment ids as numbers in some payloads and as strings
/// in others.
pub(crate) mod string_or_number {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        UInt(u64),
    }

    impl From<Raw> for String {
        fn from(raw: Raw) -> Self {
            match raw {
                Raw::Str(s) => s,
                Raw::Int(i) => i.to_string(),
                Raw::UInt(u) => u.to_string(),
            }
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Raw::deserialize(deserializer).map(String::from)
    }

    pub mod option {
        use super::Raw;
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Ok(Option::<Raw>::deserialize(deserializer)?
                .map(String::from)
                .filter(|s| !s.is_empty()))
        }
    }
}
