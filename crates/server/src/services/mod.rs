//! Business logic services.

pub mod auth;
pub mod email;
pub mod orders;
pub mod storage;

pub use email::EmailService;
pub use orders::OrderPoller;
pub use storage::StorageClient;
