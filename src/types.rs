use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for a credit application
pub type CreditId = Uuid;

/// unique identifier for a sponsor guarantee
pub type GuaranteeId = Uuid;

/// unique identifier for a savings group
pub type GroupId = Uuid;

/// customer identifier as issued by the surrounding system
pub type CustomerId = String;

/// purpose-typed sub-accounts; six exist per customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    /// everyday transactional account
    Standard,
    /// restricted savings gating credit eligibility, first-recourse collateral
    MandatorySavings,
    /// collateral holding a fixed percentage of an approved credit
    Caution,
    /// credit-disbursement account; receives disbursals and collections
    Credit,
    /// programmed savings cycles (seasonal product prerequisite)
    ProgrammedSavings,
    /// penalties assessed against the customer
    Fines,
}

impl AccountType {
    pub const ALL: [AccountType; 6] = [
        AccountType::Standard,
        AccountType::MandatorySavings,
        AccountType::Caution,
        AccountType::Credit,
        AccountType::ProgrammedSavings,
        AccountType::Fines,
    ];
}

/// account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Active,
    Inactive,
}

/// the five credit products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductKind {
    /// short daily overdraft, auto-renewable
    ShortOverdraft,
    /// medium-term individual loan
    IndividualTerm,
    /// loan backed by a third-party guarantor
    SponsorGuaranteed,
    /// seasonal agricultural loan
    Seasonal,
    /// loan against pooled group savings
    GroupSavings,
}

/// credit application lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditStatus {
    /// initial eligibility evaluation
    EligibilityCheck,
    /// waiting for the customer to submit documents
    DocumentsPending,
    /// documents received, awaiting review
    DocumentsSubmitted,
    /// under administrative review
    AdminReview,
    /// approved pending caution deposit
    CautionPending,
    /// fully approved, ready to disburse
    Approved,
    /// funds released; settlement cascade applies at maturity
    Disbursed,
    /// performing after disbursement
    Active,
    /// fully repaid
    Completed,
    /// terminal default
    Defaulted,
    /// delinquency sub-state with a temporary restriction
    VirtualPrison,
    /// escalated to legal recovery
    LegalPursuit,
    /// withdrawn before completion
    Cancelled,
}

impl CreditStatus {
    /// closed states; of these only Defaulted still moves, to LegalPursuit
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CreditStatus::Completed | CreditStatus::Defaulted | CreditStatus::Cancelled
        )
    }

    /// whether the credit can still receive repayments
    pub fn accepts_repayment(&self) -> bool {
        matches!(
            self,
            CreditStatus::Disbursed | CreditStatus::Active | CreditStatus::VirtualPrison
        )
    }

    /// valid forward transitions of the lifecycle machine
    pub fn can_transition_to(&self, next: CreditStatus) -> bool {
        use CreditStatus::*;

        // cancellation reachable from any non-terminal state
        if next == Cancelled {
            return !self.is_terminal() && *self != LegalPursuit;
        }

        matches!(
            (self, next),
            (EligibilityCheck, DocumentsPending)
                | (EligibilityCheck, CautionPending)
                | (DocumentsPending, DocumentsSubmitted)
                | (DocumentsSubmitted, AdminReview)
                | (AdminReview, CautionPending)
                | (CautionPending, Approved)
                | (Approved, Disbursed)
                | (Disbursed, Active)
                | (Disbursed, Completed)
                | (Disbursed, Defaulted)
                | (Disbursed, VirtualPrison)
                | (Active, Completed)
                | (Active, Defaulted)
                | (Active, VirtualPrison)
                | (VirtualPrison, Active)
                | (VirtualPrison, Completed)
                | (VirtualPrison, Defaulted)
                | (VirtualPrison, LegalPursuit)
                | (Defaulted, LegalPursuit)
        )
    }
}

/// customer standing gating or widening credit access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Standing {
    Blacklisted,
    #[default]
    Neutral,
    Whitelisted,
}

/// notification categories handed to the notification collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    CreditApproved,
    CreditDisbursed,
    RepaymentReceived,
    MaturityReminder,
    DetentionOpened,
    DetentionReleased,
    SponsorLiability,
    RenewalBlocked,
}
