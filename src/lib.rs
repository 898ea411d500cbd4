//! Facility-maintenance reporting service: users file damage reports, staff
//! triage and assign technicians, technicians submit fix feedback, and
//! reporters rate completed repairs.

pub mod config;
pub mod error;
pub mod reports;
pub mod telemetry;
