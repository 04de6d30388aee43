//! # Engine Module
//!
//! Internal implementation of the entity store.
//!
//! This module contains all core building blocks:
//! - Component type registry
//! - Range-segmented component storage
//! - Archetype table and entity identity
//! - Context lifecycle and mutation engine
//! - Foreach planning and the iterator driver
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod types;
pub mod error;
pub mod component;
pub mod storage;
pub mod archetype;
pub mod context;
pub mod foreach;
