//! Purpose: Client-side object model for remote graph APIs.
//! Exports: `core` (attributes, tracked nodes, cursors, errors, transport seam) and `api`.
//! Role: Library backing the `graphkit` CLI; `api` is the stable public surface.
//! Invariants: Only caller-modified fields are ever sent on writes.
//! Invariants: Cursors hold one page at a time; navigation replaces it.
pub mod api;
pub mod core;
