use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BudgetId(pub String);

/// Yearly spending budget for one team coach. `available` has no floor;
/// a negative value represents over-commitment, not an error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: BudgetId,
    pub team_coach_email: String,
    pub year: i32,
    pub total: Decimal,
    pub available: Decimal,
}

impl Budget {
    pub fn is_over_budget(&self, request_cost: Decimal) -> bool {
        self.available < request_cost
    }
}
