//! Inbox Hub: multi-account Gmail dashboard backend.

pub mod accounts;
pub mod ai;
pub mod api;
pub mod categories;
pub mod config;
pub mod error;
pub mod google;
pub mod llm;
pub mod mail;
pub mod pipeline;
pub mod store;
pub mod tasks;
