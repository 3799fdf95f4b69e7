//! Billing ledger domain: identifiers, budgets, billing periods, budget leases, and usage reports.

pub mod budget;
pub mod id;
pub mod lease;
pub mod period;
pub mod report;

pub use budget::*;
pub use id::*;
pub use lease::*;
pub use period::*;
pub use report::*;
