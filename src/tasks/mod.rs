//! Kanban tasks, created by hand or extracted from mail.

pub mod model;

pub use model::{NewTask, Task, TaskPatch, TaskPriority, TaskStatus, is_valid_link, parse_due_date};
