//! Authorizing, pacing relay in front of hosted chat-completion APIs.
//!
//! - [`auth`]: access-code gate, credential policy and signed upstream tokens
//! - [`proxy`]: passthrough forwarder, paced chat sessions, HTTP surface
//! - [`models`]: config and wire types
//! - [`modules`]: config loading, logging, locale

pub mod auth;
pub mod models;
pub mod modules;
pub mod proxy;
