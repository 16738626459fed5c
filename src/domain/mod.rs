//! Core domain types and logic.

pub mod bar;
pub mod calendar;
pub mod config_validation;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod position;
pub mod series;
pub mod signal;
pub mod simulation;
pub mod snapshot;
pub mod valuation;
