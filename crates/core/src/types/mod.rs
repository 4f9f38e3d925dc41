//! Core types for the scratch card service.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod card;
pub mod email;
pub mod id;
pub mod username;

pub use card::{CUSTOMIZATION_WINDOW_DAYS, CardSection, CardState, customization_deadline};
pub use email::{Email, EmailError};
pub use id::*;
pub use username::{Username, UsernameError};
