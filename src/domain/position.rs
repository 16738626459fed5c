//! Per-symbol holdings.

/// Long-only holding of one symbol.
///
/// `average_cost` is the weighted average acquisition price of every open
/// lot and is zero whenever nothing is held.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Position {
    pub amount_held: u64,
    pub average_cost: f64,
    pub realized_profit: f64,
}

impl Position {
    pub fn is_holding(&self) -> bool {
        self.amount_held > 0
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.amount_held as f64 * price
    }

    pub fn unrealized_profit(&self, price: f64) -> f64 {
        self.amount_held as f64 * (price - self.average_cost)
    }

    /// Adds a lot and folds its price into the average cost.
    pub(crate) fn add_lot(&mut self, shares: u64, price: f64) {
        let new_amount = self.amount_held + shares;
        self.average_cost = (self.amount_held as f64 * self.average_cost
            + shares as f64 * price)
            / new_amount as f64;
        self.amount_held = new_amount;
    }

    /// Closes the whole position, booking `profit`.
    pub(crate) fn liquidate(&mut self, profit: f64) {
        self.amount_held = 0;
        self.average_cost = 0.0;
        self.realized_profit += profit;
    }
}

/// Whether a symbol currently holds shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Holding,
}

impl From<&Position> for PositionState {
    fn from(position: &Position) -> Self {
        if position.is_holding() {
            PositionState::Holding
        } else {
            PositionState::Flat
        }
    }
}
