//! Library surface for the paneltop client: wire types, the event bus, the
//! console and stats consumers, and the ratatui front end.

pub mod ansi;
pub mod app;
pub mod chart;
pub mod console;
pub mod details;
pub mod events;
pub mod history;
pub mod logging;
pub mod power;
pub mod profiles;
pub mod session;
pub mod stats;
pub mod store;
pub mod types;
pub mod ui;
pub mod ws;
