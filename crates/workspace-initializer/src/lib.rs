pub mod cli;
pub mod config;
pub mod controllers;
pub mod credentials;
pub mod endpoint;
pub mod objects;

mod error;

pub use error::*;
