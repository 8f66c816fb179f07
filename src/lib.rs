pub mod application;
pub mod config;
pub mod decimal;
pub mod detention;
pub mod eligibility;
pub mod engine;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod products;
pub mod settlement;
pub mod sponsor;
pub mod types;
pub mod view;

// re-export key types
pub use application::{CreditApplication, Repayment};
pub use config::{EngineConfig, LimitTier};
pub use decimal::{Currency, Money, Rate};
pub use detention::{DetentionRegistry, OutstandingSnapshot, VirtualDetention};
pub use eligibility::{
    calculate_score, EligibilityProfile, EligibilityResult, EligibilityService, RepaymentStats,
};
pub use engine::{
    AuditSink, CreditEngine, CreditRequest, NoopAudit, NoopNotifier, NotificationSender,
    SavingsGroup,
};
pub use errors::{CreditError, Result};
pub use events::{Event, EventStore};
pub use ledger::{Account, Ledger};
pub use products::{
    rules_for, EligibilityReport, EligibilitySnapshot, GroupSnapshot, MaturityOffset, ProductRules,
    ProductTerms, SponsorSnapshot, StreakRequirement,
};
pub use settlement::{settle_credit, CascadeOutcome};
pub use sponsor::{SponsorGuarantee, SponsorLedger};
pub use types::{
    AccountStatus, AccountType, CreditId, CreditStatus, CustomerId, GroupId, NotificationKind,
    ProductKind, Standing,
};
pub use view::CreditView;

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
