//! ohmytasks - Self-hosted gateway for the Oh My Tasks task manager
//!
//! The pieces the web client leans on, minus any UI: the voice transcript
//! parser, the normalization layer that tames the upstream task API's loose
//! wire shapes, a short-lived task cache, the upstream HTTP client, and the
//! authenticated gateway API that glues them together.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod models;
pub mod normalize;
pub mod reminders;
pub mod settings;
pub mod voice;
