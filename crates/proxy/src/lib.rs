//! HTTP surface and configuration for the stats proxy

pub mod api;
pub mod config;
