//! Core engine: the poll, decide, withdraw and notify loop.

pub mod address;
pub mod commands;
pub mod decision;
pub mod sweeper;
