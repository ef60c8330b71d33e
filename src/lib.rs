//! PRism assess: guided repository-fit conversations.

pub mod assess;
pub mod cli;
pub mod config;
pub mod delivery;
pub mod error;
pub mod gateway;
pub mod selection;
