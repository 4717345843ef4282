//! Command implementations for the doccollect CLI

mod config;
mod fetch;
mod status;

pub use config::execute as show_config;
pub use fetch::execute as fetch_documents;
pub use status::execute as show_status;
