//! Platform abstraction layer
//!
//! - `input`: raw host events to per-tick intents (all targets)
//! - `web`: browser host mounting a game onto a canvas (wasm32 only)

pub mod input;

#[cfg(target_arch = "wasm32")]
pub mod web;
