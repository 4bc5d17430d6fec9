//! Command handlers

pub mod catalog;
pub mod config;
pub mod status;
