//! Render driver and paint layer for the Folio engine.
//!
//! # Scope
//!
//! This crate provides:
//! - **Device interfaces** - the paint surface, page factory, and CSS
//!   frontend contracts
//! - **Render driver** - the parse → style → layout → paint orchestration
//! - **Paint layer** - backgrounds, borders, text, and images per page
//! - **Reference raster device** - fontdue-backed headless page output
//! - **Resource resolution** - intrinsic sizes for `data:` URI images

pub mod device;
pub mod driver;
pub mod paint;
pub mod raster;
pub mod resource;

pub use device::{CssParser, Device, PageProvider};
pub use driver::{RenderError, Renderer};
pub use raster::{RasterDevice, RasterPages};
pub use resource::DataUriResolver;

pub use folio_css as css;
pub use folio_dom as dom;
