//! LifeGrid: a life calendar of weeks.
//!
//! The [`grid`] module derives the week cells from the user's [`Settings`]
//! and saved [`WeekRecord`]s; the [`db`] module stores both in a local
//! SQLite file. [`html`], [`server`] and the `lifegrid` binary are thin
//! surfaces over those two.

pub mod config;
pub mod db;
pub mod error;
pub mod grid;
pub mod html;
pub mod server;
pub mod types;

pub use error::{Error, Result};
pub use types::{CellStatus, CellView, Mood, ProgressStats, Settings, WeekEdit, WeekRecord};
