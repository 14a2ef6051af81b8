// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Shared types for the QR URL scanner
//!
//! This crate provides the wire-level types that both the classification core
//! and the HTTP service speak, avoiding a dependency from the core on axum.

pub mod verdict;

pub use verdict::{BENIGN_CATEGORIES, Verdict, is_malicious};
