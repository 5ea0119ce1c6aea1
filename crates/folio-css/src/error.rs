//! Fatal layout errors.
//!
//! Recoverable conditions never travel through this type: they are logged
//! through [`folio_common::warning::warn_once`] and layout continues with a
//! documented fallback. Everything here aborts the render call.

use thiserror::Error;

/// An unrecoverable failure during layout.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// A forced page advance could not produce any usable space: the page
    /// content area (page height minus vertical margins) is zero or negative.
    #[error("page {page} has no usable content height ({usable}px)")]
    DegeneratePage {
        /// The page index that was being opened.
        page: usize,
        /// The computed usable height.
        usable: f32,
    },

    /// An internal invariant was violated, e.g. a measured text run reported
    /// zero width for non-empty content.
    #[error("layout invariant violated: {0}")]
    Invariant(String),
}
