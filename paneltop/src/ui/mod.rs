//! UI module root: exposes drawing functions for individual panels.

pub mod charts;
pub mod console;
pub mod details;
pub mod header;
pub mod power;
pub mod theme;
pub mod util;
