pub mod analysis;
pub mod chat;
pub mod error;
pub mod models;
pub mod prompt;
pub mod selection;
pub mod service;
pub mod session;
pub mod store;
