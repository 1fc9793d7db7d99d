//! Persistence layer for the JSON notes document.
//!
//! # Responsibility
//! - Read the document file into the canonical model.
//! - Write the document crash-safely under external file contention.
//!
//! # Invariants
//! - The canonical file is replaced atomically or not at all.
//! - Read paths never fail; malformed content falls back to seeded data.

pub mod atomic_writer;
pub mod document_file;
