//! Risk scoring for insured vehicles travelling South African roads.
//!
//! The crate blends weather, crime and vehicle data into a composite score in
//! `[0, 100]`, caches external weather lookups with a TTL, and exposes the
//! scoring operations over an axum router.

pub mod cache;
pub mod config;
pub mod error;
pub mod geo;
pub mod providers;
pub mod routes;
pub mod scoring;
pub mod telemetry;
