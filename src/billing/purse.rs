/// Prepaid balance with tick-sized debits.
///
/// The only way down is [`try_debit`](Purse::try_debit), which removes
/// exactly one tick cost or nothing at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purse {
    balance: u64,
    tick_cost: u64,
}

impl Purse {
    pub fn new(tick_cost: u64) -> Self {
        Self {
            balance: 0,
            tick_cost,
        }
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn tick_cost(&self) -> u64 {
        self.tick_cost
    }

    /// Pay one tick if the balance covers it. A short balance is untouched.
    pub fn try_debit(&mut self) -> bool {
        match self.balance.checked_sub(self.tick_cost) {
            Some(rest) => {
                self.balance = rest;
                true
            }
            None => false,
        }
    }

    /// Add funds and return the new balance.
    pub fn credit(&mut self, amount: u64) -> u64 {
        self.balance = self.balance.saturating_add(amount);
        self.balance
    }
}
