// src/lib.rs

pub mod api;
pub mod config;
pub mod db;
pub mod http;
pub mod ledger;
pub mod qr;
pub mod repositories;
pub mod services;
pub mod utils;
pub mod test_utils;

pub use agoradeals_common::error::Error;
pub use config::AppConfig;
pub use db::Database;
pub use crate::http::{DefaultHttpClient, HttpClient};
