pub mod auth;
pub mod call_log;
pub mod category;
pub mod common;
pub mod lead;
pub mod sync;
