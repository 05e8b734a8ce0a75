//! Integration test crate for MetalTool.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on every metaltool crate to verify they work together.

#[cfg(test)]
mod config;

#[cfg(test)]
mod gpu;

#[cfg(test)]
mod graph;

#[cfg(test)]
mod view;
