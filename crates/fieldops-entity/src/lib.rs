//! # fieldops-entity
//!
//! Entity models for the FieldOps plugin catalog. Every struct in this
//! crate represents a database table row or a domain value object. Database
//! entities derive `sqlx::FromRow`.

pub mod plugin;
