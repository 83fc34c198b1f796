//! Passport SDK.
//!
//! This crate only re-exports [`passport_core`] so the Swift and Kotlin bindings are generated
//! from a single library named `passport`.
#![deny(clippy::all, clippy::pedantic, clippy::nursery, missing_docs)]

pub use passport_core::*;

passport_core::uniffi_reexport_scaffolding!();
