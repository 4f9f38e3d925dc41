//! Scratch card service library.
//!
//! Backend for an Etsy storefront add-on: customers who buy a digital
//! scratch card receive a link, personalize the card's text, and share a
//! reveal page. Shop admins manage the card templates assigned to Etsy
//! listings.
//!
//! This crate provides the server functionality as a library, allowing it
//! to be tested and reused.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod etsy;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
