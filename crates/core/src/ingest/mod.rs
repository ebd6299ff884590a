pub mod accounts;
pub mod demo;
pub mod provider;
pub mod types;

pub use accounts::{parse_accounts, AccountSpec};
pub use provider::{collect, BillingSource, HttpJsonBillingSource};
