//! # framekit-feeder: frame source for the streaming server
//!
//! Drives `framekit-core` from the command line and a TOML config file.
//!
//! ## Modes
//!
//! - **Run**: loop a raw YUV file sequence through a warm frame pool at a
//!   fixed frame rate, optionally dumping ROI frames to disk.
//! - **Convert**: turn a packed RGB capture into a planar YUV file.
//! - **Golomb**: decode exp-Golomb fields from a hex string.

pub mod config;
pub mod service;
pub mod tools;
