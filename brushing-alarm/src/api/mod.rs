//! HTTP API for the alarm.
//!
//! A thin shell over [`crate::service::AlarmHandle`]: every handler
//! forwards to the alarm service and renders the resulting snapshot or
//! error as JSON.

pub mod commands;
mod server;
mod v0;

pub use server::{SharedState, router, serve};
