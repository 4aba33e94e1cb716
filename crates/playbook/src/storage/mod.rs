//! Playbook persistence

pub mod json;

pub use json::{PlaybookStore, decode_document, encode_document};
