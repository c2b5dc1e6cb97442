//! Threshold choropleth classification, SVG rendering and a hover API
//! driving a single tooltip and annotation layer.

pub mod classify;
pub mod config;
pub mod data;
pub mod format;
pub mod interaction;
pub mod overlay;
pub mod render;
pub mod server;
pub mod types;
