//! Lorebound battle client - quiz-gated turn-based battles over a REST
//! backend, built on tui-dispatch.
//!
//! This library exposes the app's modules for integration tests.

pub mod action;
pub mod api;
pub mod battle;
pub mod effect;
pub mod effects;
pub mod quiz;
pub mod reducer;
pub mod state;
pub mod tutorial;
pub mod ui;
