//! Gmail message normalization, the mirrored-mail model, and outgoing
//! message composition.

pub mod compose;
pub mod model;
pub mod normalize;

pub use compose::{OutgoingAttachment, OutgoingMail};
pub use model::{Attachment, GmailCategory, InboxMail, NormalizedMail};
pub use normalize::normalize;
