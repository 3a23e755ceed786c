//! Test utilities for costbench.
//!
//! This crate provides utilities to facilitate testing the benchmark against stores with
//! controlled behavior. See the modules for all available utilities.

pub mod store;
pub mod tracing;
