//! Turnstile - Fixed-Window Rate Limiting Service
//!
//! This crate implements the quota checks used by a tournament-event site's
//! edge functions. Each check counts a request against an epoch-aligned
//! window in a durable key-value store, falling back to an in-process
//! counter map whenever the store misbehaves.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
