//! Integration test suite for Lendpool.
//!
//! `tests/e2e.rs` replays multi-year reference scenarios across several
//! reward authorities. `tests/adversarial.rs` checks that rejected
//! operations leave the pool untouched under randomized inputs.

pub mod helpers;
