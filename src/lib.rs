//! neurodark: an acid-bass step sequencer.
//!
//! The core is a look-ahead scheduler that turns a coarse polling clock into
//! sample-accurate note onsets, plus the per-note synthesis chain those onsets
//! drive. The same dispatch path feeds both the live cpal output and the
//! offline WAV renderer.

pub mod audio;
pub mod audio_api;
pub mod config;
pub mod error;
pub mod pipeline;

pub use error::{Error, Result};
