//! Core library: path store, scanning, dispatch and classification.

pub mod classifier;
pub mod config;
pub mod dispatch;
pub mod models;
pub mod pipeline;
pub mod scanner;
pub mod store;
