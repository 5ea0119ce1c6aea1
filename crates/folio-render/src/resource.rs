//! Intrinsic-size resolution for embedded resources.
//!
//! The engine only ever needs a resource's intrinsic dimensions; decoding
//! for display belongs to the device. The bundled resolver handles inline
//! `data:` URIs by decoding the payload and probing it with the `image`
//! crate. Anything else resolves to `None` and layout falls back to
//! attribute sizes or the replaced-content default.

use folio_common::data_uri::parse_data_uri;
use folio_css::ResourceResolver;

/// Resolves intrinsic sizes for `data:` URI images.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUriResolver;

impl ResourceResolver for DataUriResolver {
    fn intrinsic_size(&self, src: &str) -> Option<(f32, f32)> {
        let payload = parse_data_uri(src).ok()?;
        let decoded = image::load_from_memory(&payload.bytes).ok()?;
        #[allow(clippy::cast_precision_loss)]
        Some((decoded.width() as f32, decoded.height() as f32))
    }
}
