//! Revenue projection service.
//!
//! Serves MRR, invoice schedules and cash forecasts computed by
//! `forecast-engine` over a snapshot of active subscriptions.

pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod services;
pub mod startup;
