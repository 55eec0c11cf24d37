//! Linked Gmail accounts and their OAuth credentials.

pub mod credentials;
pub mod model;

pub use credentials::ensure_fresh;
pub use model::{AccountSummary, GmailAccount, LinkedAccount};
