//! Playbook - scored, tagged knowledge for LLM context injection
//!
//! This crate keeps a bounded collection of knowledge items distilled from
//! conversation history and serves temperature-controlled, relevance-ranked
//! subsets of it back to the host on demand.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extraction;
pub mod hooks;
pub mod injection;
pub mod memory;
pub mod storage;

pub use error::PlaybookError;
