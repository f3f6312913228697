//! Terminal dashboard for painminer analysis jobs.
//!
//! The [`sync`] module keeps a client-side cache of backend state current
//! while views are watching it; [`builder`] assembles job requests; [`ui`]
//! renders both with ratatui.

pub mod api;
pub mod app;
pub mod builder;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod sync;
pub mod ui;
