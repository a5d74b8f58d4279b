// File: agoradeals-common/src/traits/mod.rs
pub mod repository_traits;
pub mod ledger_traits;
