//! Time clock plugin for FieldOps.
//!
//! Technicians clock in and out, optionally against a ticket. Entries live
//! in the tenant's `time_entries` collection; completed tickets are
//! annotated with the minutes logged against them.

pub mod config;
pub mod hooks;
pub mod models;
pub mod plugin;
pub mod routes;
pub mod service;

pub use plugin::{NAME, TimeClockPlugin, source};
