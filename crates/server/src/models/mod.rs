//! Domain models for the scratch card server.

pub mod admin_user;
pub mod card;
pub mod session;
pub mod template;

pub use admin_user::AdminUser;
pub use card::{CardTransaction, NewCard};
pub use session::{CurrentAdmin, keys as session_keys};
pub use template::Template;
