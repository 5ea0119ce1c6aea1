//! Cascade resolution, box tree, and paged layout for the Folio engine.
//!
//! This crate is the core of the system: it takes the generic element tree
//! (from `folio-dom`) plus a [`style::Stylesheet`], and produces a
//! [`tree::BoxTree`] whose nodes carry positioned, page-scoped fragments.
//!
//! # Relevant Specifications
//!
//! - [CSS 2.1 Visual Formatting Model](https://www.w3.org/TR/CSS2/visuren.html)
//! - [CSS Cascading and Inheritance Level 4](https://www.w3.org/TR/css-cascade-4/)
//! - [CSS 2.1 Tables](https://www.w3.org/TR/CSS2/tables.html)
//! - [CSS 2.1 Paged media](https://www.w3.org/TR/CSS2/page.html)
//!
//! # Module Structure
//!
//! - [`style`] - stylesheet data model, selector interface, value parsing
//! - [`cascade`] - per-node lazy cascade with shorthand expansion
//! - [`tree`] - the box tree arena and fragment types
//! - [`structure`] - display/structure pass (float sides, anonymous boxes,
//!   cell numbering)
//! - [`whitespace`] - inline whitespace collapsing
//! - [`device`] - measuring surface, page geometry, resource interfaces
//! - [`page`] - the page-flow cursor threaded through layout
//! - [`float`] - float placement and clearance
//! - [`line`] - inline layout with greedy line breaking
//! - [`block`] - recursive block layout, margin collapsing, pagination
//! - [`positioned`] - absolute/fixed constraint solving
//! - [`table`] - column negotiation and row layout

pub mod block;
pub mod cascade;
pub mod device;
pub mod error;
pub mod float;
pub mod line;
pub mod page;
pub mod positioned;
pub mod structure;
pub mod style;
pub mod table;
pub mod tree;
pub mod whitespace;

// Re-exports for convenience
pub use block::{LayoutEnv, layout_document};
pub use device::{
    FixedMetrics, FontMetrics, FontSpec, FontStyle, NoResources, PageGeometry, ResourceResolver,
    Side, TextMeasurement, TextMeasurer, UniformPages,
};
pub use error::LayoutError;
pub use page::PageState;
pub use style::values::{AutoLength, Color, Length};
pub use style::{Declaration, Ruleset, Selector, SimpleSelector, Specificity, Stylesheet};
pub use tree::{
    BlockFragment, BoxId, BoxKind, BoxNode, BoxTree, ElementKind, FloatSide, InlineFragment,
    PositionScheme,
};
