//! Command-line front end for the browser relay.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod notice;
pub mod styles;
