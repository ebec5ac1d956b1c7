//! # Integration Tests
//!
//! End-to-end tests across crates.
//!
//! Covers:
//! - Multi-rate alignment through real source and processor nodes
//! - Deferred wiring, node removal and rewire
//! - Position estimator boundary behaviour inside a graph
//! - Mock drivers feeding a ticking graph

#[cfg(test)]
mod bench;

#[cfg(test)]
mod alignment_tests;

#[cfg(test)]
mod wiring_tests;

#[cfg(test)]
mod position_tests;

#[cfg(test)]
mod e2e_tests;
