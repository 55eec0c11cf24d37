//! User-defined mail categories.

pub mod model;

pub use model::{CategoryColor, CategoryPatch, NewCategory, UserCategory};
