//! # Audio Module
//!
//! Per-guild playback for the bot.
//!
//! ## Architecture
//!
//! ### [`controller`] - Playback state machine
//! - Idle / Playing / Paused transitions
//! - `advance` picks the next song, falls back to radio, or goes idle
//! - Songs that cannot be started are skipped without ending the session
//!
//! ### [`session`] - Session actor
//! - One task per guild owns the controller; commands and track-end events
//!   are processed one at a time
//! - [`session::SessionRegistry`] maps guild ids to live sessions
//!
//! ### [`transport`] - Voice transport
//! - Songbird call wrapper, ffmpeg transcoder or direct HTTP input
//! - Forwards track end/error events back to the session
//!
//! ### [`queue`] - FIFO queue of catalog songs

pub mod controller;
pub mod queue;
pub mod session;
pub mod transport;
