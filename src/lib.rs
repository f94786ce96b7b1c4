//! Mine Clicker round core
//!
//! Simulation of one timed mining round: stage progression with boss gates,
//! grid generation, area-of-effect combat, levels and boosts, and the
//! read-modify-write save boundary. Rendering and navigation are delegated
//! to a [`frontend::Frontend`] implementation supplied by the host.

pub mod config;
pub mod frontend;
pub mod game;
pub mod metrics;
pub mod save;
pub mod util;
