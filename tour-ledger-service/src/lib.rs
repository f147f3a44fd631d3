//! Tour Ledger Service - keeps booking attachments, ledger rows and salary
//! schedules consistent for a tour operator back office.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod workers;
