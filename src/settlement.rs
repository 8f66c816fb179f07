use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::{CreditApplication, Repayment};
use crate::decimal::Money;
use crate::detention::{DetentionRegistry, OutstandingSnapshot};
use crate::errors::Result;
use crate::events::{Event, EventStore};
use crate::ledger::Ledger;
use crate::products::rules_for;
use crate::sponsor::SponsorLedger;
use crate::types::{AccountType, CreditId, CreditStatus};

/// what one settlement cascade did to a credit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeOutcome {
    pub credit_id: CreditId,
    pub from_mandatory_savings: Money,
    pub from_caution: Money,
    pub from_sponsor: Money,
    /// uncovered balance after the cascade and any sponsor fallback
    pub shortfall: Money,
    pub late_interest: Money,
    pub penalty_posted: Money,
    pub detention_opened: bool,
    pub completed: bool,
}

/// cascade a mature unpaid credit across its linked accounts
///
/// debit order is fixed: mandatory savings first, then caution, each bounded
/// by its current balance; the sum actually collected lands in the
/// credit-disbursement account. For the sponsor-guaranteed product a
/// remaining shortfall is absorbed by the guarantor up to the locked amount
/// before any detention is considered. The whole cascade for one credit
/// either runs or is not started: every posting target is validated before
/// the first debit.
pub fn settle_credit(
    app: &mut CreditApplication,
    ledger: &mut Ledger,
    sponsors: &mut SponsorLedger,
    detentions: &mut DetentionRegistry,
    events: &mut EventStore,
    now: DateTime<Utc>,
) -> Result<CascadeOutcome> {
    let currency = app.currency;
    let customer = app.customer_id.clone();
    let days_late = app.days_late(now);
    let outstanding = app.remaining_balance;

    // every account the cascade may post to must accept funds before the
    // first debit lands; a refusal here leaves balances untouched so the
    // next pass can retry the credit from its pre-failure state
    for account_type in [
        AccountType::MandatorySavings,
        AccountType::Caution,
        AccountType::Credit,
        AccountType::Fines,
    ] {
        ledger.require_active(&customer, account_type)?;
    }
    if let Some(guarantee) = sponsors.active_guarantee(app.id) {
        ledger.require_active(&guarantee.sponsor_id, AccountType::MandatorySavings)?;
    }

    // 1. cascade debit: mandatory savings, then caution, never below zero
    let from_savings =
        ledger.debit_up_to(&customer, AccountType::MandatorySavings, currency, outstanding)?;
    let from_caution = ledger.debit_up_to(
        &customer,
        AccountType::Caution,
        currency,
        outstanding - from_savings,
    )?;
    let collected = from_savings + from_caution;

    if collected.is_positive() {
        // conservation: everything debited is credited to the credit account
        ledger.credit(&customer, AccountType::Credit, currency, collected, now)?;
        app.apply_collection(Repayment {
            id: Uuid::new_v4(),
            credit_id: app.id,
            amount: collected,
            currency,
            from_mandatory_savings: from_savings.is_positive(),
            from_caution: from_caution.is_positive(),
            on_time: false,
            days_late,
            recorded_at: now,
        });
    }

    let mut shortfall = app.remaining_balance;
    events.emit(Event::CascadeSettled {
        credit_id: app.id,
        from_mandatory_savings: from_savings,
        from_caution,
        shortfall,
        timestamp: now,
    });

    // 2. sponsor liability fallback before any detention
    let mut from_sponsor = Money::ZERO;
    if shortfall.is_positive() {
        if let Some(guarantee) = sponsors.active_guarantee(app.id).cloned() {
            let headroom = (guarantee.locked_amount - guarantee.sponsor_paid).max(Money::ZERO);
            let wanted = shortfall.min(headroom);
            if wanted.is_positive() {
                from_sponsor = ledger.debit_up_to(
                    &guarantee.sponsor_id,
                    AccountType::MandatorySavings,
                    currency,
                    wanted,
                )?;
            }
            if from_sponsor.is_positive() {
                ledger.credit(&customer, AccountType::Credit, currency, from_sponsor, now)?;
                sponsors.trigger_liability(app.id, from_sponsor)?;
                app.apply_collection(Repayment {
                    id: Uuid::new_v4(),
                    credit_id: app.id,
                    amount: from_sponsor,
                    currency,
                    from_mandatory_savings: false,
                    from_caution: false,
                    on_time: false,
                    days_late,
                    recorded_at: now,
                });
                events.emit(Event::SponsorLiabilityTriggered {
                    credit_id: app.id,
                    sponsor_id: guarantee.sponsor_id.clone(),
                    amount: from_sponsor,
                    timestamp: now,
                });
                shortfall = app.remaining_balance;
            }
        }
    }

    // 3. shortfall handling: surcharge, penalty to fines, detention
    let mut late_interest = Money::ZERO;
    let mut penalty_posted = Money::ZERO;
    let mut detention_opened = false;
    let mut completed = false;

    if shortfall.is_zero() {
        app.transition_to(CreditStatus::Completed, now)?;
        completed = true;
        events.emit(Event::CreditCompleted {
            credit_id: app.id,
            total_paid: app.total_paid,
            timestamp: now,
        });
    } else {
        // snapshot before the surcharge so the detention records what was
        // actually left uncollected
        let unpaid_principal = (app.approved_amount - app.total_paid).max(Money::ZERO).min(shortfall);
        let snapshot = OutstandingSnapshot {
            principal: unpaid_principal,
            interest: shortfall - unpaid_principal,
            penalty: app.late_interest,
        };

        let late_rate = rules_for(app.product).terms().late_interest_rate;
        late_interest = shortfall.apply_rate(late_rate);
        if late_interest.is_positive() {
            app.apply_late_interest(late_interest);
            events.emit(Event::LateInterestApplied {
                credit_id: app.id,
                amount: late_interest,
                rate: late_rate,
                timestamp: now,
            });
        }

        penalty_posted = app.processing_fee;
        if penalty_posted.is_positive() {
            ledger.credit(&customer, AccountType::Fines, currency, penalty_posted, now)?;
            events.emit(Event::PenaltyPosted {
                credit_id: app.id,
                customer_id: customer.clone(),
                amount: penalty_posted,
                timestamp: now,
            });
        }

        detentions.open(
            &customer,
            app.id,
            "maturity passed with uncovered balance",
            snapshot,
            now,
        );
        detention_opened = true;
        app.transition_to(CreditStatus::VirtualPrison, now)?;
        events.emit(Event::DetentionOpened {
            credit_id: app.id,
            customer_id: customer,
            outstanding_principal: snapshot.principal,
            timestamp: now,
        });
    }

    Ok(CascadeOutcome {
        credit_id: app.id,
        from_mandatory_savings: from_savings,
        from_caution,
        from_sponsor,
        shortfall: app.remaining_balance,
        late_interest,
        penalty_posted,
        detention_opened,
        completed,
    })
}
