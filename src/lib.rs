//! Object removal through a generative image model.
//!
//! The `cleanse` binary runs [`local_server`], a proxy that keeps the provider
//! credential server-side and relays requests to a [`gemini::ImageEditor`].
//! The `cleanse-client` binary drives a [`session::Session`] against that proxy.

pub mod config;
pub mod error;
pub mod gemini;
pub mod local_server;
pub mod prompt;
pub mod session;
pub mod utils;
pub mod wire;
