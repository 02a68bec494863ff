//! Chatguard - rate limiting and access control for a chat API
//!
//! This crate provides an axum middleware chain that sits in front of chat
//! routes: caller identification, request logging, a time-of-day access
//! gate, role checks on moderation routes, and a per-client sliding-window
//! limit on posted messages.

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod ratelimit;
pub mod scope;
pub mod server;
