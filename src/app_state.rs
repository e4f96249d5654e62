use crate::{dispatcher::Inventory, ledger::ledger::Ledger};

pub struct AppState<L: Ledger> {
    pub inventory: Inventory<L>,
}

impl<L: Ledger> Clone for AppState<L> {
    fn clone(&self) -> Self {
        Self {
            inventory: self.inventory.clone(),
        }
    }
}
