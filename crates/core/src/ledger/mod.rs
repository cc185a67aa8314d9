use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::domain::budget::Budget;
use crate::roles::normalize_email;
use crate::workflow::actions::BudgetEffect;

/// In-memory budget ledger keyed by (team coach, year). This is the
/// reference implementation of the ledger semantics; persistent callers
/// get the same arithmetic through a single atomic column update in the
/// db crate. `available` has no floor — negative means over-committed.
#[derive(Clone, Debug, Default)]
pub struct BudgetLedger {
    budgets: HashMap<(String, i32), Budget>,
}

impl BudgetLedger {
    pub fn new(budgets: Vec<Budget>) -> Self {
        let mut ledger = Self::default();
        for budget in budgets {
            ledger.insert(budget);
        }
        ledger
    }

    pub fn insert(&mut self, budget: Budget) {
        self.budgets.insert(key(&budget.team_coach_email, budget.year), budget);
    }

    pub fn available(&self, team_coach_email: &str, year: i32) -> Option<&Budget> {
        self.budgets.get(&key(team_coach_email, year))
    }

    /// Returns the new available amount, or None when no budget record
    /// exists (the deduction is skipped, not an error).
    pub fn deduct(&mut self, team_coach_email: &str, year: i32, amount: Decimal) -> Option<Decimal> {
        let budget = self.budgets.get_mut(&key(team_coach_email, year))?;
        budget.available -= amount;
        Some(budget.available)
    }

    pub fn restore(
        &mut self,
        team_coach_email: &str,
        year: i32,
        amount: Decimal,
    ) -> Option<Decimal> {
        let budget = self.budgets.get_mut(&key(team_coach_email, year))?;
        budget.available += amount;
        Some(budget.available)
    }

    pub fn apply_effect(
        &mut self,
        team_coach_email: &str,
        year: i32,
        effect: &BudgetEffect,
    ) -> Option<Decimal> {
        match effect {
            BudgetEffect::None => {
                self.available(team_coach_email, year).map(|budget| budget.available)
            }
            BudgetEffect::Deduct { amount } => self.deduct(team_coach_email, year, *amount),
            BudgetEffect::Restore { amount } => self.restore(team_coach_email, year, *amount),
        }
    }

    /// Advisory check; a missing budget can never warn.
    pub fn is_over_budget(&self, team_coach_email: &str, year: i32, request_cost: Decimal) -> bool {
        self.available(team_coach_email, year)
            .map(|budget| budget.is_over_budget(request_cost))
            .unwrap_or(false)
    }
}

fn key(team_coach_email: &str, year: i32) -> (String, i32) {
    (normalize_email(team_coach_email), year)
}
