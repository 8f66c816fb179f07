use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::application::{CreditApplication, Repayment};
use crate::config::EngineConfig;
use crate::decimal::{Currency, Money};
use crate::detention::{DetentionRegistry, VirtualDetention};
use crate::eligibility::{EligibilityProfile, EligibilityService};
use crate::errors::{CreditError, Result};
use crate::events::{Event, EventStore};
use crate::ledger::Ledger;
use crate::products::{
    rules_for, EligibilityReport, EligibilitySnapshot, GroupSnapshot, MaturityOffset,
    SponsorSnapshot,
};
use crate::settlement::{settle_credit, CascadeOutcome};
use crate::sponsor::{SponsorGuarantee, SponsorLedger};
use crate::types::{
    AccountType, CreditId, CreditStatus, CustomerId, GroupId, NotificationKind, ProductKind,
};
use crate::view::CreditView;

/// outbound customer messaging; delivery failures never fail the operation
pub trait NotificationSender {
    fn notify(
        &self,
        customer_id: &str,
        kind: NotificationKind,
        message: &str,
    ) -> std::result::Result<(), String>;
}

/// discards every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl NotificationSender for NoopNotifier {
    fn notify(
        &self,
        _customer_id: &str,
        _kind: NotificationKind,
        _message: &str,
    ) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// administrative audit trail for manual decisions
pub trait AuditSink {
    fn record(&self, actor: &str, action: &str, details: &str);
}

/// discards every audit entry
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAudit;

impl AuditSink for NoopAudit {
    fn record(&self, _actor: &str, _action: &str, _details: &str) {}
}

/// a registered savings group backing the group-savings product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsGroup {
    pub id: GroupId,
    pub name: String,
    pub members: Vec<CustomerId>,
    pub registered_at: DateTime<Utc>,
}

/// everything needed to open a credit application
#[derive(Debug, Clone)]
pub struct CreditRequest {
    pub customer_id: CustomerId,
    pub product: ProductKind,
    pub currency: Currency,
    pub amount: Money,
    pub duration_months: u32,
    pub sponsor_id: Option<CustomerId>,
    pub group_id: Option<GroupId>,
}

/// the credit engine: accounts, eligibility, the five products, settlement,
/// sponsorship, and detention behind one facade
pub struct CreditEngine<N = NoopNotifier, A = NoopAudit> {
    config: EngineConfig,
    ledger: Ledger,
    eligibility: EligibilityService,
    sponsors: SponsorLedger,
    detentions: DetentionRegistry,
    applications: HashMap<CreditId, CreditApplication>,
    groups: HashMap<GroupId, SavingsGroup>,
    events: EventStore,
    notifier: N,
    audit: A,
}

impl CreditEngine<NoopNotifier, NoopAudit> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_collaborators(config, NoopNotifier, NoopAudit)
    }
}

impl<N: NotificationSender, A: AuditSink> CreditEngine<N, A> {
    pub fn with_collaborators(config: EngineConfig, notifier: N, audit: A) -> Self {
        Self {
            config,
            ledger: Ledger::new(),
            eligibility: EligibilityService::new(),
            sponsors: SponsorLedger::new(),
            detentions: DetentionRegistry::new(),
            applications: HashMap::new(),
            groups: HashMap::new(),
            events: EventStore::new(),
            notifier,
            audit,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    pub fn application(&self, credit_id: CreditId) -> Result<&CreditApplication> {
        self.applications
            .get(&credit_id)
            .ok_or(CreditError::CreditNotFound { credit_id })
    }

    pub fn detention(&self, credit_id: CreditId) -> Option<&VirtualDetention> {
        self.detentions.active_for_credit(credit_id)
    }

    pub fn guarantee(&self, credit_id: CreditId) -> Option<&SponsorGuarantee> {
        self.sponsors.guarantee(credit_id)
    }

    /// serializable snapshot of one credit for upstream reporting
    pub fn credit_view(&self, credit_id: CreditId) -> Result<CreditView> {
        let app = self.application(credit_id)?;
        Ok(CreditView::from_parts(
            app,
            self.sponsors.guarantee(credit_id),
            self.detentions.active_for_credit(credit_id),
        ))
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }

    /// open the six purpose-typed sub-accounts; idempotent
    pub fn register_customer(&mut self, customer_id: &str, time_provider: &SafeTimeProvider) {
        let now = time_provider.now();
        self.ledger.open_customer_accounts(customer_id, now);
        self.eligibility.profile_mut(customer_id, &self.config, now);
    }

    /// register a savings group; pooled savings are read from the members'
    /// programmed-savings accounts at check time, never cached
    pub fn register_group(
        &mut self,
        name: &str,
        members: Vec<CustomerId>,
        time_provider: &SafeTimeProvider,
    ) -> GroupId {
        let group = SavingsGroup {
            id: Uuid::new_v4(),
            name: name.to_string(),
            members,
            registered_at: time_provider.now(),
        };
        let id = group.id;
        self.groups.insert(id, group);
        id
    }

    pub fn customer_profile(&self, customer_id: &str) -> Result<&EligibilityProfile> {
        self.eligibility.profile(customer_id)
    }

    /// direct access for importing repayment histories from an upstream core
    pub fn eligibility_mut(&mut self) -> &mut EligibilityService {
        &mut self.eligibility
    }

    /// full eligibility decision for a prospective request: the service-level
    /// gate plus the product predicate, with every unmet condition reported
    #[instrument(skip(self, time_provider), fields(customer = %request.customer_id, product = ?request.product))]
    pub fn check_eligibility(
        &mut self,
        request: &CreditRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<EligibilityReport> {
        let now = time_provider.now();
        let snapshot = self.build_snapshot(request, now)?;
        let report = rules_for(request.product).check(&snapshot);
        if !report.eligible {
            info!(reasons = ?report.reasons, "eligibility check failed");
        }
        Ok(report)
    }

    fn build_snapshot(
        &mut self,
        request: &CreditRequest,
        now: DateTime<Utc>,
    ) -> Result<EligibilitySnapshot> {
        let customer = request.customer_id.as_str();
        let currency = request.currency;
        let service = self
            .eligibility
            .check(customer, request.amount, &self.config, now);
        let profile = self.eligibility.profile(customer)?;
        let recent_default = profile.defaulted_within(self.config.default_lookback_days, now);
        let programmed_cycles_completed = profile.programmed_cycles_completed;

        let mandatory_savings_balance = self
            .ledger
            .balance(customer, AccountType::MandatorySavings, currency)
            .unwrap_or(Money::ZERO);
        let today = now.date_naive();
        let deposit_day_streak =
            self.ledger
                .consecutive_deposit_days(customer, AccountType::MandatorySavings, today);
        let deposit_week_streak =
            self.ledger
                .consecutive_deposit_weeks(customer, AccountType::MandatorySavings, today);
        let account_age_days = self
            .ledger
            .account(customer, AccountType::Standard)
            .map(|a| (now - a.opened_at).num_days())
            .unwrap_or(0);

        let sponsor = match (&request.sponsor_id, request.product) {
            (Some(sponsor_id), ProductKind::SponsorGuaranteed) => {
                let savings = self
                    .ledger
                    .balance(sponsor_id, AccountType::MandatorySavings, currency)
                    .unwrap_or(Money::ZERO);
                Some(SponsorSnapshot {
                    sponsor_id: sponsor_id.clone(),
                    free_capacity: self.sponsors.free_capacity(sponsor_id, savings, currency),
                    required_lock: request.amount.apply_rate(self.config.guarantee_ratio),
                    active_guarantees: self.sponsors.active_count(sponsor_id),
                    ceiling: self.config.sponsor_ceiling,
                })
            }
            _ => None,
        };

        let group = match (&request.group_id, request.product) {
            (Some(group_id), ProductKind::GroupSavings) => {
                let group = self
                    .groups
                    .get(group_id)
                    .ok_or(CreditError::GroupNotFound { group_id: *group_id })?;
                let pooled_savings = group
                    .members
                    .iter()
                    .map(|m| {
                        self.ledger
                            .balance(m, AccountType::ProgrammedSavings, currency)
                            .unwrap_or(Money::ZERO)
                    })
                    .sum();
                Some(GroupSnapshot {
                    is_member: group.members.iter().any(|m| m == customer),
                    pooled_savings,
                    pool_ceiling: self.config.group_pool_ceiling,
                })
            }
            _ => None,
        };

        Ok(EligibilitySnapshot {
            amount: request.amount,
            duration_months: request.duration_months,
            service,
            mandatory_savings_balance,
            deposit_day_streak,
            deposit_week_streak,
            recent_default,
            detention_active: self.detentions.customer_detained(customer),
            programmed_cycles_completed,
            account_age_days,
            sponsor,
            group,
        })
    }

    /// open a credit application; the request is re-validated, the processing
    /// fee and interest rate are fixed from the product tables, and a sponsor
    /// guarantee is locked as an accounting hold before any state is stored
    #[instrument(skip(self, time_provider), fields(customer = %request.customer_id, product = ?request.product, amount = %request.amount))]
    pub fn request_credit(
        &mut self,
        request: CreditRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<CreditId> {
        let now = time_provider.now();
        let report = self.check_eligibility(&request, time_provider)?;
        if !report.eligible {
            return Err(CreditError::NotEligible {
                reasons: report.reasons,
            });
        }

        let rules = rules_for(request.product);
        let terms = rules.terms();
        let processing_fee = rules.processing_fee(request.amount)?;
        let interest_rate = rules.interest_rate(request.amount, request.duration_months)?;

        let mut app = CreditApplication::new(
            request.customer_id.clone(),
            request.product,
            request.currency,
            request.amount,
            processing_fee,
            interest_rate,
            terms.caution_rate,
            request.duration_months,
            CreditStatus::EligibilityCheck,
            now,
        );
        app.sponsor_id = request.sponsor_id.clone();
        let credit_id = app.id;

        if let (Some(sponsor_id), ProductKind::SponsorGuaranteed) =
            (&request.sponsor_id, request.product)
        {
            let savings = self
                .ledger
                .balance(sponsor_id, AccountType::MandatorySavings, request.currency)
                .unwrap_or(Money::ZERO);
            let guarantee = self.sponsors.lock_guarantee(
                sponsor_id,
                credit_id,
                self.config.guarantee_ratio,
                request.amount,
                request.currency,
                savings,
                self.config.sponsor_ceiling,
                now,
            )?;
            self.events.emit(Event::GuaranteeLocked {
                credit_id,
                sponsor_id: sponsor_id.clone(),
                locked_amount: guarantee.locked_amount,
                timestamp: now,
            });
        }

        self.events.emit(Event::CreditRequested {
            credit_id,
            customer_id: request.customer_id.clone(),
            product: request.product,
            amount: request.amount,
            currency: request.currency,
            timestamp: now,
        });

        if terms.requires_documents {
            self.change_status(&mut app, CreditStatus::DocumentsPending, now)?;
        } else {
            self.change_status(&mut app, CreditStatus::CautionPending, now)?;
            if app.caution_amount.is_zero() {
                self.approve(&mut app, now)?;
            }
        }

        self.applications.insert(credit_id, app);
        Ok(credit_id)
    }

    /// customer hands in the required documents
    pub fn submit_documents(
        &mut self,
        credit_id: CreditId,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let now = time_provider.now();
        let mut app = self.take_application(credit_id)?;
        let outcome = self.change_status(&mut app, CreditStatus::DocumentsSubmitted, now);
        self.applications.insert(credit_id, app);
        outcome
    }

    /// administrative document review; rejection cancels the application and
    /// releases any sponsor hold
    pub fn validate_documents(
        &mut self,
        credit_id: CreditId,
        reviewer_id: &str,
        approved: bool,
        comments: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let now = time_provider.now();
        let mut app = self.take_application(credit_id)?;

        let outcome = (|| {
            self.change_status(&mut app, CreditStatus::AdminReview, now)?;
            self.events.emit(Event::DocumentsReviewed {
                credit_id,
                reviewer_id: reviewer_id.to_string(),
                approved,
                timestamp: now,
            });
            self.audit.record(reviewer_id, "validate_documents", comments);

            if approved {
                self.change_status(&mut app, CreditStatus::CautionPending, now)?;
                if app.caution_amount.is_zero() {
                    self.approve(&mut app, now)?;
                }
            } else {
                self.cancel(&mut app, "documents rejected", now)?;
            }
            Ok(())
        })();

        self.applications.insert(credit_id, app);
        outcome
    }

    /// collect the caution deposit from the standard account and approve
    pub fn pay_caution(
        &mut self,
        credit_id: CreditId,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let now = time_provider.now();
        let mut app = self.take_application(credit_id)?;

        let outcome = (|| {
            if app.status != CreditStatus::CautionPending {
                return Err(CreditError::InvalidTransition {
                    current: app.status,
                    requested: CreditStatus::Approved,
                });
            }
            self.ledger.transfer(
                &app.customer_id,
                AccountType::Standard,
                AccountType::Caution,
                app.currency,
                app.caution_amount,
                now,
            )?;
            self.events.emit(Event::CautionCollected {
                credit_id,
                amount: app.caution_amount,
                timestamp: now,
            });
            self.approve(&mut app, now)
        })();

        self.applications.insert(credit_id, app);
        outcome
    }

    /// release funds: the approved amount net of the processing fee lands on
    /// the credit account, the maturity date is fixed, and the customer's
    /// in-use limit grows by the approved amount
    #[instrument(skip(self, time_provider), fields(credit = %credit_id))]
    pub fn disburse_credit(
        &mut self,
        credit_id: CreditId,
        time_provider: &SafeTimeProvider,
    ) -> Result<Money> {
        let now = time_provider.now();
        let mut app = self.take_application(credit_id)?;

        let outcome = (|| {
            // every fallible step runs before the application is touched, so
            // a failed payout leaves the credit approved and nothing booked
            if !app.status.can_transition_to(CreditStatus::Disbursed) {
                return Err(CreditError::InvalidTransition {
                    current: app.status,
                    requested: CreditStatus::Disbursed,
                });
            }

            let net = app.approved_amount - app.processing_fee;
            let maturity = match rules_for(app.product).terms().maturity {
                MaturityOffset::Days(days) => now + Duration::days(days),
                MaturityOffset::RequestedMonths => {
                    now + Duration::days(30 * app.duration_months as i64)
                }
                MaturityOffset::Months(months) => now + Duration::days(30 * months as i64),
            };
            let interest = app.approved_amount.apply_rate(app.interest_rate);

            self.ledger
                .ensure_account(&app.customer_id, AccountType::Credit, now);
            self.ledger
                .credit(&app.customer_id, AccountType::Credit, app.currency, net, now)?;
            self.change_status(&mut app, CreditStatus::Disbursed, now)?;
            app.record_disbursement(net, interest, maturity);
            self.eligibility.adjust_used(
                &app.customer_id,
                app.approved_amount,
                true,
                &self.config,
                now,
            );

            self.events.emit(Event::CreditDisbursed {
                credit_id,
                net_amount: net,
                processing_fee: app.processing_fee,
                maturity_date: maturity,
                timestamp: now,
            });
            self.send(
                &app.customer_id,
                NotificationKind::CreditDisbursed,
                &format!("credit {} disbursed: {} {}", credit_id, net, app.currency),
            );
            Ok(net)
        })();

        self.applications.insert(credit_id, app);
        outcome
    }

    /// record a manual repayment into the credit account; full repayment
    /// completes the credit, updates the score inputs, and releases any
    /// sponsor hold and detention
    #[instrument(skip(self, time_provider), fields(credit = %credit_id, amount = %amount))]
    pub fn record_repayment(
        &mut self,
        credit_id: CreditId,
        amount: Money,
        currency: Currency,
        time_provider: &SafeTimeProvider,
    ) -> Result<Repayment> {
        let now = time_provider.now();
        let mut app = self.take_application(credit_id)?;

        let outcome = (|| {
            if !app.status.accepts_repayment() {
                return Err(CreditError::InvalidTransition {
                    current: app.status,
                    requested: CreditStatus::Completed,
                });
            }
            if currency != app.currency {
                return Err(CreditError::CurrencyMismatch {
                    expected: app.currency,
                    provided: currency,
                });
            }
            if !amount.is_positive() || amount > app.remaining_balance {
                return Err(CreditError::InvalidPaymentAmount { amount });
            }

            self.ledger
                .credit(&app.customer_id, AccountType::Credit, currency, amount, now)?;
            let days_late = app.days_late(now);
            let repayment = Repayment {
                id: Uuid::new_v4(),
                credit_id,
                amount,
                currency,
                from_mandatory_savings: false,
                from_caution: false,
                on_time: days_late == 0,
                days_late,
                recorded_at: now,
            };
            app.apply_collection(repayment.clone());
            self.events.emit(Event::RepaymentRecorded {
                credit_id,
                amount,
                on_time: days_late == 0,
                days_late,
                remaining_balance: app.remaining_balance,
                timestamp: now,
            });
            self.send(
                &app.customer_id,
                NotificationKind::RepaymentReceived,
                &format!("payment of {} {} received", amount, currency),
            );

            if app.is_fully_repaid() {
                self.complete(&mut app, now)?;
            }
            Ok(repayment)
        })();

        self.applications.insert(credit_id, app);
        outcome
    }

    /// run the settlement cascade over every credit past maturity with an
    /// open balance; one credit failing never stops the pass
    #[instrument(skip(self, time_provider))]
    pub fn run_settlement_pass(
        &mut self,
        time_provider: &SafeTimeProvider,
    ) -> Vec<CascadeOutcome> {
        let now = time_provider.now();
        let due: Vec<CreditId> = self
            .applications
            .values()
            .filter(|app| app.is_pending_settlement(now))
            .map(|app| app.id)
            .collect();

        let mut outcomes = Vec::new();
        for credit_id in due {
            let Some(mut app) = self.applications.remove(&credit_id) else {
                continue;
            };
            let result = settle_credit(
                &mut app,
                &mut self.ledger,
                &mut self.sponsors,
                &mut self.detentions,
                &mut self.events,
                now,
            );
            match result {
                Ok(outcome) => {
                    if outcome.completed {
                        self.close_out(&app, now);
                    }
                    if outcome.from_sponsor.is_positive() {
                        if let Some(guarantee) = self.sponsors.guarantee(credit_id) {
                            let sponsor_id = guarantee.sponsor_id.clone();
                            self.send(
                                &sponsor_id,
                                NotificationKind::SponsorLiability,
                                &format!(
                                    "guarantee called: {} {} debited for credit {}",
                                    outcome.from_sponsor, app.currency, credit_id
                                ),
                            );
                        }
                    }
                    if outcome.detention_opened {
                        self.send(
                            &app.customer_id,
                            NotificationKind::DetentionOpened,
                            &format!(
                                "account restricted: {} {} remains unpaid on credit {}",
                                outcome.shortfall, app.currency, credit_id
                            ),
                        );
                    }
                    outcomes.push(outcome);
                }
                Err(err) => {
                    warn!(credit = %credit_id, error = %err, "settlement cascade failed");
                }
            }
            self.applications.insert(credit_id, app);
        }
        outcomes
    }

    /// auto-renew fully repaid short overdrafts; renewal waits on full
    /// repayment and eligibility only, and an ineligible customer gets a
    /// renewal-blocked notice instead of a new credit
    #[instrument(skip(self, time_provider))]
    pub fn run_renewal_pass(&mut self, time_provider: &SafeTimeProvider) -> Vec<CreditId> {
        let now = time_provider.now();
        let already_renewed: Vec<CreditId> = self
            .applications
            .values()
            .filter_map(|app| app.renewal_of)
            .collect();
        let candidates: Vec<(CreditId, CustomerId, Money, Currency)> = self
            .applications
            .values()
            .filter(|app| {
                app.renewable
                    && app.status == CreditStatus::Completed
                    && !already_renewed.contains(&app.id)
            })
            .map(|app| {
                (
                    app.id,
                    app.customer_id.clone(),
                    app.approved_amount,
                    app.currency,
                )
            })
            .collect();

        let mut renewed = Vec::new();
        for (old_id, customer_id, amount, currency) in candidates {
            let request = CreditRequest {
                customer_id: customer_id.clone(),
                product: ProductKind::ShortOverdraft,
                currency,
                amount,
                duration_months: 0,
                sponsor_id: None,
                group_id: None,
            };
            let report = match self.check_eligibility(&request, time_provider) {
                Ok(report) => report,
                Err(err) => {
                    warn!(credit = %old_id, error = %err, "renewal check failed");
                    continue;
                }
            };
            if !report.eligible {
                self.events.emit(Event::RenewalBlocked {
                    credit_id: old_id,
                    customer_id: customer_id.clone(),
                    reasons: report.reasons.clone(),
                    timestamp: now,
                });
                self.send(
                    &customer_id,
                    NotificationKind::RenewalBlocked,
                    &format!("overdraft renewal refused: {}", report.reasons.join("; ")),
                );
                continue;
            }

            let new_id = match self.request_credit(request, time_provider) {
                Ok(id) => id,
                Err(err) => {
                    warn!(credit = %old_id, error = %err, "renewal request failed");
                    continue;
                }
            };
            if let Some(new_app) = self.applications.get_mut(&new_id) {
                new_app.renewal_of = Some(old_id);
            }
            if let Err(err) = self.disburse_credit(new_id, time_provider) {
                warn!(credit = %new_id, error = %err, "renewal disbursement failed");
                continue;
            }
            self.events.emit(Event::CreditRenewed {
                old_credit_id: old_id,
                new_credit_id: new_id,
                amount,
                timestamp: now,
            });
            renewed.push(new_id);
        }
        renewed
    }

    /// remind every borrower whose maturity falls inside the reminder window
    pub fn run_weekly_reminder_pass(&mut self, time_provider: &SafeTimeProvider) -> usize {
        let now = time_provider.now();
        let window = Duration::days(self.config.reminder_window_days);
        let mut sent = 0;
        for app in self.applications.values() {
            let Some(maturity) = app.maturity_date else {
                continue;
            };
            let due_soon = maturity > now && maturity - now <= window;
            if app.status == CreditStatus::Disbursed
                && app.remaining_balance.is_positive()
                && due_soon
            {
                self.send(
                    &app.customer_id,
                    NotificationKind::MaturityReminder,
                    &format!(
                        "credit {} matures on {}: {} {} outstanding",
                        app.id,
                        maturity.date_naive(),
                        app.remaining_balance,
                        app.currency
                    ),
                );
                sent += 1;
            }
        }
        sent
    }

    /// administrative blacklist; blocks every product immediately
    pub fn blacklist_customer(
        &mut self,
        customer_id: &str,
        reason: &str,
        actor_id: &str,
        time_provider: &SafeTimeProvider,
    ) {
        let now = time_provider.now();
        self.eligibility
            .blacklist(customer_id, reason, &self.config, now);
        self.events.emit(Event::CustomerBlacklisted {
            customer_id: customer_id.to_string(),
            reason: reason.to_string(),
            actor_id: actor_id.to_string(),
            timestamp: now,
        });
        self.audit.record(actor_id, "blacklist_customer", reason);
    }

    /// administrative whitelist; optionally raises the limit above the tier
    pub fn whitelist_customer(
        &mut self,
        customer_id: &str,
        new_limit: Option<Money>,
        actor_id: &str,
        time_provider: &SafeTimeProvider,
    ) {
        let now = time_provider.now();
        self.eligibility
            .whitelist(customer_id, new_limit, &self.config, now);
        self.events.emit(Event::CustomerWhitelisted {
            customer_id: customer_id.to_string(),
            actor_id: actor_id.to_string(),
            new_limit,
            timestamp: now,
        });
        self.audit.record(actor_id, "whitelist_customer", customer_id);
    }

    /// withdraw a credit at any non-terminal stage; a collected caution
    /// flows back to the standard account, any sponsor hold is released,
    /// and a disbursed credit frees its share of the in-use limit
    pub fn cancel_credit(
        &mut self,
        credit_id: CreditId,
        reason: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let now = time_provider.now();
        let mut app = self.take_application(credit_id)?;
        let outcome = self.cancel(&mut app, reason, now);
        self.applications.insert(credit_id, app);
        outcome
    }

    /// terminal default; feeds the score and frees the in-use limit
    pub fn declare_default(
        &mut self,
        credit_id: CreditId,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let now = time_provider.now();
        let mut app = self.take_application(credit_id)?;

        let outcome = (|| {
            self.change_status(&mut app, CreditStatus::Defaulted, now)?;
            self.eligibility
                .record_default(&app.customer_id, &self.config, now);
            self.eligibility.adjust_used(
                &app.customer_id,
                app.approved_amount,
                false,
                &self.config,
                now,
            );
            self.events.emit(Event::CreditDefaulted {
                credit_id,
                outstanding: app.remaining_balance,
                timestamp: now,
            });
            Ok(())
        })();

        self.applications.insert(credit_id, app);
        outcome
    }

    /// escalate a defaulted credit to legal recovery
    pub fn escalate_to_legal(
        &mut self,
        credit_id: CreditId,
        actor_id: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let now = time_provider.now();
        let mut app = self.take_application(credit_id)?;
        let outcome = self.change_status(&mut app, CreditStatus::LegalPursuit, now);
        if outcome.is_ok() {
            self.audit
                .record(actor_id, "escalate_to_legal", &credit_id.to_string());
        }
        self.applications.insert(credit_id, app);
        outcome
    }

    /// admin override lifting a detention; the credit returns to servicing
    pub fn release_detention(
        &mut self,
        credit_id: CreditId,
        released_by: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let now = time_provider.now();
        let mut app = self.take_application(credit_id)?;

        let outcome = (|| {
            self.detentions.release(credit_id, released_by, now)?;
            if app.status == CreditStatus::VirtualPrison {
                self.change_status(&mut app, CreditStatus::Active, now)?;
            }
            self.events.emit(Event::DetentionReleased {
                credit_id,
                released_by: released_by.to_string(),
                timestamp: now,
            });
            self.audit
                .record(released_by, "release_detention", &credit_id.to_string());
            self.send(
                &app.customer_id,
                NotificationKind::DetentionReleased,
                "account restriction lifted",
            );
            Ok(())
        })();

        self.applications.insert(credit_id, app);
        outcome
    }

    // internal helpers

    fn take_application(&mut self, credit_id: CreditId) -> Result<CreditApplication> {
        self.applications
            .remove(&credit_id)
            .ok_or(CreditError::CreditNotFound { credit_id })
    }

    fn change_status(
        &mut self,
        app: &mut CreditApplication,
        next: CreditStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let old_status = app.status;
        app.transition_to(next, now)?;
        self.events.emit(Event::StatusChanged {
            credit_id: app.id,
            old_status,
            new_status: next,
            timestamp: now,
        });
        Ok(())
    }

    fn approve(&mut self, app: &mut CreditApplication, now: DateTime<Utc>) -> Result<()> {
        self.change_status(app, CreditStatus::Approved, now)?;
        self.events.emit(Event::CreditApproved {
            credit_id: app.id,
            approved_amount: app.approved_amount,
            interest_rate: app.interest_rate,
            timestamp: now,
        });
        self.send(
            &app.customer_id,
            NotificationKind::CreditApproved,
            &format!(
                "credit approved: {} {} over {} months",
                app.approved_amount, app.currency, app.duration_months
            ),
        );
        Ok(())
    }

    fn cancel(
        &mut self,
        app: &mut CreditApplication,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let caution_collected = self
            .ledger
            .balance(&app.customer_id, AccountType::Caution, app.currency)
            .unwrap_or(Money::ZERO)
            .min(app.caution_amount);
        let had_caution = app.status == CreditStatus::Approved && caution_collected.is_positive();

        self.change_status(app, CreditStatus::Cancelled, now)?;
        if had_caution {
            self.ledger.transfer(
                &app.customer_id,
                AccountType::Caution,
                AccountType::Standard,
                app.currency,
                caution_collected,
                now,
            )?;
        }
        // a disbursed credit grew the in-use limit at payout; cancelling it
        // hands the headroom back (released funds are recovered out of band)
        if app.disbursed_at.is_some() {
            self.eligibility.adjust_used(
                &app.customer_id,
                app.approved_amount,
                false,
                &self.config,
                now,
            );
        }
        self.release_guarantee(app, now);
        self.events.emit(Event::CreditCancelled {
            credit_id: app.id,
            reason: reason.to_string(),
            timestamp: now,
        });
        Ok(())
    }

    fn complete(&mut self, app: &mut CreditApplication, now: DateTime<Utc>) -> Result<()> {
        self.change_status(app, CreditStatus::Completed, now)?;
        self.events.emit(Event::CreditCompleted {
            credit_id: app.id,
            total_paid: app.total_paid,
            timestamp: now,
        });
        self.close_out(app, now);
        if self.detentions.active_for_credit(app.id).is_some() {
            // full settlement is itself a release condition
            self.detentions.release(app.id, "system", now)?;
            self.events.emit(Event::DetentionReleased {
                credit_id: app.id,
                released_by: "system".to_string(),
                timestamp: now,
            });
        }
        Ok(())
    }

    /// post-completion bookkeeping shared by manual repayment and the cascade
    fn close_out(&mut self, app: &CreditApplication, now: DateTime<Utc>) {
        let (on_time, late) = app.punctuality();
        self.eligibility
            .record_completion(&app.customer_id, on_time, late, &self.config, now);
        self.eligibility.adjust_used(
            &app.customer_id,
            app.approved_amount,
            false,
            &self.config,
            now,
        );
        self.release_guarantee(app, now);
    }

    fn release_guarantee(&mut self, app: &CreditApplication, now: DateTime<Utc>) {
        let mut released_sponsor = None;
        if let Ok(guarantee) = self.sponsors.release(app.id, now) {
            released_sponsor = Some(guarantee.sponsor_id.clone());
        }
        if let Some(sponsor_id) = released_sponsor {
            self.events.emit(Event::GuaranteeReleased {
                credit_id: app.id,
                sponsor_id,
                timestamp: now,
            });
        }
    }

    fn send(&self, customer_id: &str, kind: NotificationKind, message: &str) {
        if let Err(err) = self.notifier.notify(customer_id, kind, message) {
            warn!(customer = %customer_id, ?kind, error = %err, "notification delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hourglass_rs::TimeSource;

    fn test_time() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ))
    }

    /// savings at half the request plus a 26-day deposit streak
    fn fund_overdraft_prereqs(engine: &mut CreditEngine, customer: &str, time: &SafeTimeProvider) {
        let now = time.now();
        for i in 0..26 {
            engine
                .ledger_mut()
                .credit(
                    customer,
                    AccountType::MandatorySavings,
                    Currency::Cdf,
                    Money::from_major(2),
                    now - Duration::days(i),
                )
                .unwrap();
        }
    }

    fn overdraft_request(customer: &str, amount: i64) -> CreditRequest {
        CreditRequest {
            customer_id: customer.to_string(),
            product: ProductKind::ShortOverdraft,
            currency: Currency::Cdf,
            amount: Money::from_major(amount),
            duration_months: 0,
            sponsor_id: None,
            group_id: None,
        }
    }

    #[test]
    fn test_overdraft_auto_approves_without_documents() {
        let time = test_time();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);
        fund_overdraft_prereqs(&mut engine, "CUST-1", &time);

        let credit_id = engine.request_credit(overdraft_request("CUST-1", 100), &time).unwrap();
        let app = engine.application(credit_id).unwrap();
        assert_eq!(app.status, CreditStatus::Approved);
        assert_eq!(app.processing_fee, Money::from_major(5));
        assert_eq!(app.caution_amount, Money::ZERO);
    }

    #[test]
    fn test_disbursement_nets_fee_and_sets_maturity() {
        let time = test_time();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);
        fund_overdraft_prereqs(&mut engine, "CUST-1", &time);

        let credit_id = engine.request_credit(overdraft_request("CUST-1", 100), &time).unwrap();
        let net = engine.disburse_credit(credit_id, &time).unwrap();
        assert_eq!(net, Money::from_major(95));

        let app = engine.application(credit_id).unwrap();
        assert_eq!(app.status, CreditStatus::Disbursed);
        assert_eq!(app.remaining_balance, Money::from_major(100));
        assert_eq!(app.maturity_date, Some(time.now() + Duration::days(1)));
        assert_eq!(
            engine.ledger().balance("CUST-1", AccountType::Credit, Currency::Cdf).unwrap(),
            Money::from_major(95)
        );
    }

    #[test]
    fn test_full_repayment_completes_and_updates_profile() {
        let time = test_time();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);
        fund_overdraft_prereqs(&mut engine, "CUST-1", &time);

        let credit_id = engine.request_credit(overdraft_request("CUST-1", 100), &time).unwrap();
        engine.disburse_credit(credit_id, &time).unwrap();
        engine
            .record_repayment(credit_id, Money::from_major(100), Currency::Cdf, &time)
            .unwrap();

        let app = engine.application(credit_id).unwrap();
        assert_eq!(app.status, CreditStatus::Completed);
        let profile = engine.customer_profile("CUST-1").unwrap();
        assert_eq!(profile.stats.completed_loans, 1);
        assert_eq!(profile.stats.on_time_payments, 1);
        assert_eq!(profile.credit_used, Money::ZERO);
    }

    #[test]
    fn test_repayment_rejects_wrong_currency_and_overpayment() {
        let time = test_time();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);
        fund_overdraft_prereqs(&mut engine, "CUST-1", &time);

        let credit_id = engine.request_credit(overdraft_request("CUST-1", 100), &time).unwrap();
        engine.disburse_credit(credit_id, &time).unwrap();

        let wrong_currency =
            engine.record_repayment(credit_id, Money::from_major(10), Currency::Usd, &time);
        assert!(matches!(wrong_currency, Err(CreditError::CurrencyMismatch { .. })));

        let too_much =
            engine.record_repayment(credit_id, Money::from_major(500), Currency::Cdf, &time);
        assert!(matches!(too_much, Err(CreditError::InvalidPaymentAmount { .. })));
    }

    #[test]
    fn test_blacklisted_customer_is_refused() {
        let time = test_time();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);
        fund_overdraft_prereqs(&mut engine, "CUST-1", &time);
        engine.blacklist_customer("CUST-1", "fraud investigation", "ADMIN-1", &time);

        let refused = engine.request_credit(overdraft_request("CUST-1", 100), &time);
        match refused {
            Err(CreditError::NotEligible { reasons }) => {
                assert!(reasons.iter().any(|r| r.contains("blacklisted")));
            }
            other => panic!("expected NotEligible, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_caution_flow_for_term_credit() {
        let time = test_time();
        let now = time.now();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);

        // 30% savings and funds for the 10% caution
        engine
            .ledger_mut()
            .credit("CUST-1", AccountType::MandatorySavings, Currency::Cdf, Money::from_major(300), now)
            .unwrap();
        engine
            .ledger_mut()
            .credit("CUST-1", AccountType::Standard, Currency::Cdf, Money::from_major(150), now)
            .unwrap();

        let request = CreditRequest {
            customer_id: "CUST-1".to_string(),
            product: ProductKind::IndividualTerm,
            currency: Currency::Cdf,
            amount: Money::from_major(1000),
            duration_months: 6,
            sponsor_id: None,
            group_id: None,
        };
        let credit_id = engine.request_credit(request, &time).unwrap();
        assert_eq!(engine.application(credit_id).unwrap().status, CreditStatus::DocumentsPending);

        engine.submit_documents(credit_id, &time).unwrap();
        engine.validate_documents(credit_id, "ADMIN-1", true, "complete file", &time).unwrap();
        assert_eq!(engine.application(credit_id).unwrap().status, CreditStatus::CautionPending);

        engine.pay_caution(credit_id, &time).unwrap();
        let app = engine.application(credit_id).unwrap();
        assert_eq!(app.status, CreditStatus::Approved);
        assert_eq!(app.caution_amount, Money::from_major(100));
        assert_eq!(
            engine.ledger().balance("CUST-1", AccountType::Caution, Currency::Cdf).unwrap(),
            Money::from_major(100)
        );
    }

    #[test]
    fn test_rejected_documents_cancel_and_release_hold() {
        let time = test_time();
        let now = time.now();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);
        engine.register_customer("SPONSOR-1", &time);

        engine
            .ledger_mut()
            .credit("CUST-1", AccountType::MandatorySavings, Currency::Cdf, Money::from_major(200), now)
            .unwrap();
        for i in 0..5 {
            engine
                .ledger_mut()
                .credit(
                    "CUST-1",
                    AccountType::MandatorySavings,
                    Currency::Cdf,
                    Money::from_major(1),
                    now - Duration::weeks(i),
                )
                .unwrap();
        }
        engine
            .ledger_mut()
            .credit("SPONSOR-1", AccountType::MandatorySavings, Currency::Cdf, Money::from_major(1000), now)
            .unwrap();

        let request = CreditRequest {
            customer_id: "CUST-1".to_string(),
            product: ProductKind::SponsorGuaranteed,
            currency: Currency::Cdf,
            amount: Money::from_major(500),
            duration_months: 6,
            sponsor_id: Some("SPONSOR-1".to_string()),
            group_id: None,
        };
        let credit_id = engine.request_credit(request, &time).unwrap();
        assert!(engine
            .events()
            .iter()
            .any(|e| matches!(e, Event::GuaranteeLocked { locked_amount, .. } if *locked_amount == Money::from_major(200))));

        engine.submit_documents(credit_id, &time).unwrap();
        engine
            .validate_documents(credit_id, "ADMIN-1", false, "inconsistent payslips", &time)
            .unwrap();

        let app = engine.application(credit_id).unwrap();
        assert_eq!(app.status, CreditStatus::Cancelled);
        assert!(engine
            .events()
            .iter()
            .any(|e| matches!(e, Event::GuaranteeReleased { .. })));
    }

    #[test]
    fn test_unpaid_overdraft_cascades_and_detains() {
        let time = test_time();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);
        fund_overdraft_prereqs(&mut engine, "CUST-1", &time);

        let credit_id = engine.request_credit(overdraft_request("CUST-1", 100), &time).unwrap();
        engine.disburse_credit(credit_id, &time).unwrap();

        // by maturity only 30 savings and 20 caution remain
        let now = time.now();
        engine
            .ledger_mut()
            .debit("CUST-1", AccountType::MandatorySavings, Currency::Cdf, Money::from_major(22))
            .unwrap();
        engine
            .ledger_mut()
            .credit("CUST-1", AccountType::Caution, Currency::Cdf, Money::from_major(20), now)
            .unwrap();

        let control = time.test_control().unwrap();
        control.advance(Duration::hours(25));

        let outcomes = engine.run_settlement_pass(&time);
        assert_eq!(outcomes.len(), 1);
        let outcome = &outcomes[0];
        assert_eq!(outcome.from_mandatory_savings, Money::from_major(30));
        assert_eq!(outcome.from_caution, Money::from_major(20));
        assert!(outcome.detention_opened);

        let app = engine.application(credit_id).unwrap();
        assert_eq!(app.status, CreditStatus::VirtualPrison);
        // 5% surcharge on the uncovered 50
        assert_eq!(app.remaining_balance, Money::from_str_exact("52.50").unwrap());
        let detention = engine.detention(credit_id).unwrap();
        assert_eq!(detention.outstanding.principal, Money::from_major(50));

        // re-running the pass on an already-settled credit changes nothing
        let again = engine.run_settlement_pass(&time);
        assert!(again.is_empty());
        assert_eq!(
            engine.application(credit_id).unwrap().remaining_balance,
            Money::from_str_exact("52.50").unwrap()
        );
    }

    #[test]
    fn test_sponsor_liability_settles_through_engine() {
        let time = test_time();
        let now = time.now();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);
        engine.register_customer("SPONSOR-1", &time);

        // weekly deposits build the streak and 275 of savings
        for i in 0..5 {
            engine
                .ledger_mut()
                .credit(
                    "CUST-1",
                    AccountType::MandatorySavings,
                    Currency::Cdf,
                    Money::from_major(55),
                    now - Duration::weeks(i),
                )
                .unwrap();
        }
        engine
            .ledger_mut()
            .credit("CUST-1", AccountType::Standard, Currency::Cdf, Money::from_major(25), now)
            .unwrap();
        engine
            .ledger_mut()
            .credit("SPONSOR-1", AccountType::MandatorySavings, Currency::Cdf, Money::from_major(1000), now)
            .unwrap();

        let request = CreditRequest {
            customer_id: "CUST-1".to_string(),
            product: ProductKind::SponsorGuaranteed,
            currency: Currency::Cdf,
            amount: Money::from_major(500),
            duration_months: 6,
            sponsor_id: Some("SPONSOR-1".to_string()),
            group_id: None,
        };
        let credit_id = engine.request_credit(request, &time).unwrap();
        engine.submit_documents(credit_id, &time).unwrap();
        engine.validate_documents(credit_id, "ADMIN-1", true, "ok", &time).unwrap();
        engine.pay_caution(credit_id, &time).unwrap();
        engine.disburse_credit(credit_id, &time).unwrap();

        let control = time.test_control().unwrap();
        control.advance(Duration::days(181));
        let outcomes = engine.run_settlement_pass(&time);
        assert_eq!(outcomes.len(), 1);

        // own accounts covered 275 + 25; the guarantor absorbed exactly the
        // 200 locked under the 40% ratio
        let outcome = &outcomes[0];
        assert_eq!(outcome.from_mandatory_savings, Money::from_major(275));
        assert_eq!(outcome.from_caution, Money::from_major(25));
        assert_eq!(outcome.from_sponsor, Money::from_major(200));
        assert_eq!(
            engine
                .ledger()
                .balance("SPONSOR-1", AccountType::MandatorySavings, Currency::Cdf)
                .unwrap(),
            Money::from_major(800)
        );
        let guarantee = engine.guarantee(credit_id).unwrap();
        assert!(guarantee.liability_triggered);
        assert_eq!(guarantee.sponsor_paid, Money::from_major(200));
    }

    #[test]
    fn test_low_score_refused_regardless_of_collateral() {
        let time = test_time();
        let now = time.now();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);
        fund_overdraft_prereqs(&mut engine, "CUST-1", &time);

        let config = EngineConfig::default();
        engine.eligibility_mut().record_default("CUST-1", &config, now);
        assert!(engine.customer_profile("CUST-1").unwrap().score < 30);

        let report = engine
            .check_eligibility(&overdraft_request("CUST-1", 100), &time)
            .unwrap();
        assert!(!report.eligible);
        assert!(report.reasons.iter().any(|r| r.contains("score below minimum 30")));
    }

    #[test]
    fn test_repaid_overdraft_renews_in_one_pass() {
        let time = test_time();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);
        fund_overdraft_prereqs(&mut engine, "CUST-1", &time);
        engine
            .ledger_mut()
            .credit("CUST-1", AccountType::Standard, Currency::Cdf, Money::from_major(100), time.now())
            .unwrap();

        let old_id = engine.request_credit(overdraft_request("CUST-1", 50), &time).unwrap();
        engine.disburse_credit(old_id, &time).unwrap();
        engine
            .record_repayment(old_id, Money::from_major(50), Currency::Cdf, &time)
            .unwrap();
        assert_eq!(engine.application(old_id).unwrap().status, CreditStatus::Completed);

        let control = time.test_control().unwrap();
        control.advance(Duration::hours(25));
        // keep the deposit streak alive across the advance
        engine
            .ledger_mut()
            .credit("CUST-1", AccountType::MandatorySavings, Currency::Cdf, Money::from_major(2), time.now())
            .unwrap();

        let renewed = engine.run_renewal_pass(&time);
        assert_eq!(renewed.len(), 1);
        let new_app = engine.application(renewed[0]).unwrap();
        assert_eq!(new_app.status, CreditStatus::Disbursed);
        assert_eq!(new_app.approved_amount, Money::from_major(50));
        assert_eq!(new_app.renewal_of, Some(old_id));
        assert!(engine
            .events()
            .iter()
            .any(|e| matches!(e, Event::CreditRenewed { old_credit_id, .. } if *old_credit_id == old_id)));

        // the pass is deterministic: the renewed parent is never renewed again
        let again = engine.run_renewal_pass(&time);
        assert!(again.is_empty());
    }

    #[test]
    fn test_blocked_renewal_records_reasons() {
        let time = test_time();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);
        fund_overdraft_prereqs(&mut engine, "CUST-1", &time);

        let old_id = engine.request_credit(overdraft_request("CUST-1", 50), &time).unwrap();
        engine.disburse_credit(old_id, &time).unwrap();
        engine
            .record_repayment(old_id, Money::from_major(50), Currency::Cdf, &time)
            .unwrap();

        engine.blacklist_customer("CUST-1", "account takeover suspected", "ADMIN-1", &time);
        let control = time.test_control().unwrap();
        control.advance(Duration::hours(25));

        let renewed = engine.run_renewal_pass(&time);
        assert!(renewed.is_empty());
        match engine
            .events()
            .iter()
            .find(|e| matches!(e, Event::RenewalBlocked { .. }))
        {
            Some(Event::RenewalBlocked { reasons, .. }) => {
                assert!(reasons.iter().any(|r| r.contains("blacklisted")));
            }
            _ => panic!("expected a RenewalBlocked event"),
        }
    }

    #[test]
    fn test_detention_release_returns_credit_to_servicing() {
        let time = test_time();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);
        fund_overdraft_prereqs(&mut engine, "CUST-1", &time);

        let credit_id = engine.request_credit(overdraft_request("CUST-1", 100), &time).unwrap();
        engine.disburse_credit(credit_id, &time).unwrap();
        engine
            .ledger_mut()
            .debit("CUST-1", AccountType::MandatorySavings, Currency::Cdf, Money::from_major(52))
            .unwrap();

        let control = time.test_control().unwrap();
        control.advance(Duration::hours(25));
        engine.run_settlement_pass(&time);
        assert_eq!(engine.application(credit_id).unwrap().status, CreditStatus::VirtualPrison);

        engine.release_detention(credit_id, "ADMIN-1", &time).unwrap();
        assert_eq!(engine.application(credit_id).unwrap().status, CreditStatus::Active);
        assert!(engine.detention(credit_id).is_none());

        // the balance survives the release and can still be repaid
        let remaining = engine.application(credit_id).unwrap().remaining_balance;
        engine.record_repayment(credit_id, remaining, Currency::Cdf, &time).unwrap();
        assert_eq!(engine.application(credit_id).unwrap().status, CreditStatus::Completed);
    }

    #[test]
    fn test_failed_disbursement_leaves_credit_approved() {
        let time = test_time();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);
        fund_overdraft_prereqs(&mut engine, "CUST-1", &time);

        let credit_id = engine.request_credit(overdraft_request("CUST-1", 100), &time).unwrap();
        engine.ledger_mut().deactivate("CUST-1", AccountType::Credit).unwrap();

        let err = engine.disburse_credit(credit_id, &time).unwrap_err();
        assert!(matches!(err, CreditError::AccountInactive { .. }));

        // the failed payout booked nothing: no status move, no open balance,
        // no maturity, no in-use limit
        let app = engine.application(credit_id).unwrap();
        assert_eq!(app.status, CreditStatus::Approved);
        assert_eq!(app.remaining_balance, Money::ZERO);
        assert_eq!(app.maturity_date, None);
        assert_eq!(engine.customer_profile("CUST-1").unwrap().credit_used, Money::ZERO);
    }

    #[test]
    fn test_settlement_failure_leaves_accounts_for_retry() {
        let time = test_time();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);
        fund_overdraft_prereqs(&mut engine, "CUST-1", &time);

        let credit_id = engine.request_credit(overdraft_request("CUST-1", 100), &time).unwrap();
        engine.disburse_credit(credit_id, &time).unwrap();
        engine.ledger_mut().deactivate("CUST-1", AccountType::Credit).unwrap();

        let control = time.test_control().unwrap();
        control.advance(Duration::hours(25));

        // the pass refuses the credit whole; no debit lands without its
        // matching credit
        let outcomes = engine.run_settlement_pass(&time);
        assert!(outcomes.is_empty());
        assert_eq!(
            engine
                .ledger()
                .balance("CUST-1", AccountType::MandatorySavings, Currency::Cdf)
                .unwrap(),
            Money::from_major(52)
        );
        let app = engine.application(credit_id).unwrap();
        assert_eq!(app.status, CreditStatus::Disbursed);
        assert_eq!(app.total_paid, Money::ZERO);

        // a repeated pass drains nothing either
        engine.run_settlement_pass(&time);
        assert_eq!(
            engine
                .ledger()
                .balance("CUST-1", AccountType::MandatorySavings, Currency::Cdf)
                .unwrap(),
            Money::from_major(52)
        );
    }

    #[test]
    fn test_same_day_repayment_renews_without_waiting_for_maturity() {
        let time = test_time();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);
        fund_overdraft_prereqs(&mut engine, "CUST-1", &time);

        let old_id = engine.request_credit(overdraft_request("CUST-1", 50), &time).unwrap();
        engine.disburse_credit(old_id, &time).unwrap();
        engine
            .record_repayment(old_id, Money::from_major(50), Currency::Cdf, &time)
            .unwrap();
        assert_eq!(engine.application(old_id).unwrap().status, CreditStatus::Completed);

        // renewal waits on full repayment and eligibility only, never on the
        // maturity date
        let renewed = engine.run_renewal_pass(&time);
        assert_eq!(renewed.len(), 1);
        assert_eq!(engine.application(renewed[0]).unwrap().renewal_of, Some(old_id));
    }

    #[test]
    fn test_cancelling_disbursed_credit_frees_the_limit() {
        let time = test_time();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);
        fund_overdraft_prereqs(&mut engine, "CUST-1", &time);

        let credit_id = engine.request_credit(overdraft_request("CUST-1", 100), &time).unwrap();
        engine.disburse_credit(credit_id, &time).unwrap();
        assert_eq!(
            engine.customer_profile("CUST-1").unwrap().credit_used,
            Money::from_major(100)
        );

        engine.cancel_credit(credit_id, "restructured at the agency", &time).unwrap();
        assert_eq!(engine.application(credit_id).unwrap().status, CreditStatus::Cancelled);
        assert_eq!(engine.customer_profile("CUST-1").unwrap().credit_used, Money::ZERO);
    }

    #[test]
    fn test_group_credit_draws_on_pooled_programmed_savings() {
        let time = test_time();
        let now = time.now();
        let mut engine = CreditEngine::new(EngineConfig::default());
        for member in ["GRP-1", "GRP-2", "GRP-3"] {
            engine.register_customer(member, &time);
            engine
                .ledger_mut()
                .credit(member, AccountType::ProgrammedSavings, Currency::Cdf, Money::from_major(400), now)
                .unwrap();
        }
        let group_id = engine.register_group(
            "likelemba du marche",
            vec!["GRP-1".to_string(), "GRP-2".to_string(), "GRP-3".to_string()],
            &time,
        );
        // weekly deposits keep the borrower's streak alive
        for i in 0..5 {
            engine
                .ledger_mut()
                .credit(
                    "GRP-1",
                    AccountType::MandatorySavings,
                    Currency::Cdf,
                    Money::from_major(10),
                    now - Duration::weeks(i),
                )
                .unwrap();
        }

        // pool 1200 at the 80% ceiling caps the credit at 960
        let mut request = CreditRequest {
            customer_id: "GRP-1".to_string(),
            product: ProductKind::GroupSavings,
            currency: Currency::Cdf,
            amount: Money::from_major(1000),
            duration_months: 6,
            sponsor_id: None,
            group_id: Some(group_id),
        };
        let report = engine.check_eligibility(&request, &time).unwrap();
        assert!(!report.eligible);
        assert!(report.reasons.iter().any(|r| r.contains("group ceiling")));

        request.amount = Money::from_major(900);
        let credit_id = engine.request_credit(request, &time).unwrap();
        let app = engine.application(credit_id).unwrap();
        // no caution and no documents for the group product
        assert_eq!(app.status, CreditStatus::Approved);
        assert_eq!(app.processing_fee, Money::from_major(15));
        assert_eq!(app.caution_amount, Money::ZERO);
    }

    #[test]
    fn test_seasonal_credit_requires_savings_track_record() {
        let time = test_time();
        let config = EngineConfig::default();
        let mut engine = CreditEngine::new(EngineConfig::default());
        engine.register_customer("CUST-1", &time);

        // the account has to season before the campaign credit opens
        let control = time.test_control().unwrap();
        control.advance(Duration::days(200));
        let now = time.now();
        engine
            .ledger_mut()
            .credit("CUST-1", AccountType::MandatorySavings, Currency::Cdf, Money::from_major(250), now)
            .unwrap();
        engine
            .ledger_mut()
            .credit("CUST-1", AccountType::Standard, Currency::Cdf, Money::from_major(150), now)
            .unwrap();

        let request = CreditRequest {
            customer_id: "CUST-1".to_string(),
            product: ProductKind::Seasonal,
            currency: Currency::Cdf,
            amount: Money::from_major(1000),
            duration_months: 3,
            sponsor_id: None,
            group_id: None,
        };
        // without completed programmed-savings cycles the request is refused
        let report = engine.check_eligibility(&request, &time).unwrap();
        assert!(!report.eligible);
        assert!(report.reasons.iter().any(|r| r.contains("programmed-savings cycles")));

        engine
            .eligibility_mut()
            .profile_mut("CUST-1", &config, now)
            .programmed_cycles_completed = 2;

        let credit_id = engine.request_credit(request, &time).unwrap();
        assert_eq!(engine.application(credit_id).unwrap().status, CreditStatus::DocumentsPending);
        engine.submit_documents(credit_id, &time).unwrap();
        engine.validate_documents(credit_id, "ADMIN-1", true, "field visit done", &time).unwrap();
        engine.pay_caution(credit_id, &time).unwrap();
        let net = engine.disburse_credit(credit_id, &time).unwrap();
        assert_eq!(net, Money::from_major(985));

        let app = engine.application(credit_id).unwrap();
        // 8% flat over the fixed three-month season
        assert_eq!(app.remaining_balance, Money::from_major(1080));
        assert_eq!(app.maturity_date, Some(now + Duration::days(90)));
        assert_eq!(app.caution_amount, Money::from_major(100));
    }
}
