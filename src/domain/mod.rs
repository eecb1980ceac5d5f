//! Core domain types and logic.

pub mod account;
pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod execution;
pub mod indicator;
pub mod live;
pub mod metrics;
pub mod ohlcv;
pub mod order;
pub mod position;
pub mod risk;
pub mod signal;
pub mod strategy;
