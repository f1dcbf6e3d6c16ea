//! Judging core for four-panel dance rhythm games.
//!
//! A [`crate::game::gameplay::Round`] is ticked once per frame with the elapsed song
//! time. It maps that time to a beat through a [`crate::game::timing::TempoMap`],
//! polls its [`crate::core::input::DancePad`] and grades the arrows of its
//! [`crate::game::timeline::StepTimeline`]. A [`crate::game::session::Session`] runs several
//! rounds against one playback transport.

pub mod config;
pub mod core;
pub mod error;
pub mod game;
