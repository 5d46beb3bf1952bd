pub mod action;
pub mod backend;
pub mod client;
pub mod config;
pub mod desktop;
pub mod errors;
pub mod focus;
pub mod handlers;
pub mod input;
pub mod layout;
pub mod state;
pub mod status;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use errors::{Result, WmError};
pub use state::Wren;
