//! Talking Pet
//!
//! Turns a pet photo, a motion prompt and an optional script into a short
//! video: speech synthesis, remote image-to-video generation, audio muxing,
//! object storage and a metadata record, run as one sequential pipeline per
//! request.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
