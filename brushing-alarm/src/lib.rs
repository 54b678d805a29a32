//! Brushing alarm.
//!
//! A wake-up alarm that keeps ringing until the user photographs a
//! toothbrush. The [`alarm`] module holds the lifecycle controller;
//! everything else is plumbing around it: the wake timer and sound
//! player it drives, the image verifier it consults, and the HTTP shell
//! that exposes it.

pub mod alarm;
pub mod api;
pub mod api_client;
pub mod camera;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod error;
pub mod playback;
pub mod service;
#[cfg(test)]
mod testing;
pub mod tracing;
pub mod verifier;
pub mod wake;
