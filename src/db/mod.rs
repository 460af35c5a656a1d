pub mod models;
pub mod queries;

pub use models::{PayloadKind, PayloadRef, ShareLink, Token};
pub use queries::{init_db, DbPool, ShareLinkRepo};

#[cfg(test)]
pub use queries::setup_test_db;
