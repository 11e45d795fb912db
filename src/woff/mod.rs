//! WOFF 1.0 and WOFF 2.0 container decoding.

pub mod decompress_woff1;
pub(crate) mod glyf_decoder;
pub mod headers;
pub(crate) mod hmtx_decoder;
pub mod woff2;
