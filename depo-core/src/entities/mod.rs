pub mod deposit;
pub mod wallet;

use depo_sdk::objects::DepositStatus as SdkDepositStatus;

/// Deposit status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `depo_sdk::objects::DepositStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "deposit_status")]
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

/// What to do with a provider observation given the stored status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The deposit is still open; persist the observed status.
    Apply,
    /// The deposit already reflects this observation.
    Duplicate,
    /// A settled deposit received an older, non-terminal status.
    Stale,
    /// A settled deposit received a different final outcome.
    Anomaly,
}

impl DepositStatus {
    /// Terminal statuses never change again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DepositStatus::Credited | DepositStatus::Failed | DepositStatus::Expired
        )
    }

    /// Statuses that entitle the owner to a credit.
    pub fn triggers_credit(self) -> bool {
        matches!(self, DepositStatus::Confirmed | DepositStatus::Completed)
    }

    /// Statuses that turn into `Expired` once `expires_at` has passed.
    pub fn expires_lazily(self) -> bool {
        matches!(
            self,
            DepositStatus::Pending | DepositStatus::Confirming | DepositStatus::Unknown
        )
    }

    /// Decide how an `observed` provider status applies to a deposit
    /// currently in `self`.
    ///
    /// A confirmed or completed deposit only moves on to `credited`, through
    /// the ledger's claim. Observations never take it out of the creditable
    /// set.
    pub fn transition_to(self, observed: DepositStatus) -> Transition {
        if self.triggers_credit() {
            return if observed.triggers_credit() {
                Transition::Duplicate
            } else if observed.is_terminal() {
                Transition::Anomaly
            } else {
                Transition::Stale
            };
        }
        if !self.is_terminal() {
            return Transition::Apply;
        }
        let same_outcome = match (self, observed) {
            (
                DepositStatus::Credited,
                DepositStatus::Confirmed | DepositStatus::Completed | DepositStatus::Credited,
            ) => true,
            (current, observed) => current == observed,
        };
        if same_outcome {
            Transition::Duplicate
        } else if observed.is_terminal() || observed.triggers_credit() {
            Transition::Anomaly
        } else {
            Transition::Stale
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DepositStatus::Pending => "pending",
            DepositStatus::Confirming => "confirming",
            DepositStatus::Confirmed => "confirmed",
            DepositStatus::Completed => "completed",
            DepositStatus::Failed => "failed",
            DepositStatus::Expired => "expired",
            DepositStatus::Unknown => "unknown",
            DepositStatus::Credited => "credited",
        }
    }
}

impl std::fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DepositStatus> for SdkDepositStatus {
    fn from(value: DepositStatus) -> Self {
        match value {
            DepositStatus::Pending => SdkDepositStatus::Pending,
            DepositStatus::Confirming => SdkDepositStatus::Confirming,
            DepositStatus::Confirmed => SdkDepositStatus::Confirmed,
            DepositStatus::Completed => SdkDepositStatus::Completed,
            DepositStatus::Failed => SdkDepositStatus::Failed,
            DepositStatus::Expired => SdkDepositStatus::Expired,
            DepositStatus::Unknown => SdkDepositStatus::Unknown,
            DepositStatus::Credited => SdkDepositStatus::Credited,
        }
    }
}

impl From<SdkDepositStatus> for DepositStatus {
    fn from(value: SdkDepositStatus) -> Self {
        match value {
            SdkDepositStatus::Pending => DepositStatus::Pending,
            SdkDepositStatus::Confirming => DepositStatus::Confirming,
            SdkDepositStatus::Confirmed => DepositStatus::Confirmed,
            SdkDepositStatus::Completed => DepositStatus::Completed,
            SdkDepositStatus::Failed => DepositStatus::Failed,
            SdkDepositStatus::Expired => DepositStatus::Expired,
            SdkDepositStatus::Unknown => DepositStatus::Unknown,
            SdkDepositStatus::Credited => DepositStatus::Credited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DepositStatus::*;
    use super::*;

    #[test]
    fn test_open_deposits_accept_any_observation() {
        for current in [Pending, Confirming, Unknown] {
            for observed in [Pending, Confirming, Confirmed, Completed, Failed, Expired, Unknown] {
                assert_eq!(current.transition_to(observed), Transition::Apply);
            }
        }
    }

    #[test]
    fn test_confirmed_deposits_wait_for_credit() {
        for current in [Confirmed, Completed] {
            assert_eq!(current.transition_to(Confirmed), Transition::Duplicate);
            assert_eq!(current.transition_to(Completed), Transition::Duplicate);
            assert_eq!(current.transition_to(Failed), Transition::Anomaly);
            assert_eq!(current.transition_to(Expired), Transition::Anomaly);
            assert_eq!(current.transition_to(Pending), Transition::Stale);
            assert_eq!(current.transition_to(Confirming), Transition::Stale);
            assert_eq!(current.transition_to(Unknown), Transition::Stale);
        }
    }

    #[test]
    fn test_credited_absorbs_repeated_confirmations() {
        assert_eq!(Credited.transition_to(Confirmed), Transition::Duplicate);
        assert_eq!(Credited.transition_to(Completed), Transition::Duplicate);
        assert_eq!(Credited.transition_to(Confirming), Transition::Stale);
        assert_eq!(Credited.transition_to(Unknown), Transition::Stale);
        assert_eq!(Credited.transition_to(Failed), Transition::Anomaly);
        assert_eq!(Credited.transition_to(Expired), Transition::Anomaly);
    }

    #[test]
    fn test_failed_and_expired_never_reopen() {
        assert_eq!(Failed.transition_to(Failed), Transition::Duplicate);
        assert_eq!(Expired.transition_to(Expired), Transition::Duplicate);
        assert_eq!(Expired.transition_to(Completed), Transition::Anomaly);
        assert_eq!(Failed.transition_to(Confirmed), Transition::Anomaly);
        assert_eq!(Expired.transition_to(Pending), Transition::Stale);
        assert_eq!(Expired.transition_to(Failed), Transition::Anomaly);
    }
}
