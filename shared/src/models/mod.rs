//! Domain models for the Agarbatti ERP ledger

mod batch;
mod formulation;
mod item;
mod movement;
mod plan;
mod stock;

pub use batch::*;
pub use formulation::*;
pub use item::*;
pub use movement::*;
pub use plan::*;
pub use stock::*;
