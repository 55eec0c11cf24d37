//! Inbox synchronization pipeline.
//!
//! A sync for one linked account flows through:
//! 1. `ensure_fresh()`: refresh the access token if it is about to expire
//! 2. `GmailApi::list_messages()` + `get_message()`: bounded-concurrency fetch
//! 3. `normalize()` + contact photo lookup: build `InboxMail` rows
//! 4. `Database::upsert_mail()`: mirror, never overwriting a user category
//! 5. `EmailCategorizer::categorize()`: file uncategorized mail in one LLM call

pub mod sync;

pub use sync::{CategorizedMail, InboxSync, SyncReport};
