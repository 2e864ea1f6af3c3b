//! Data models for Prospect

mod actor;
mod call_log;
mod category;
mod id;
mod lead;

pub use actor::{Actor, Role};
pub use call_log::CallLog;
pub use category::{Category, CategoryType};
pub use id::RecordId;
pub use lead::{Lead, LeadStatus};
