//! Pure Rust typeface metadata and text measurement.
//!
//! Reads TrueType, OpenType CFF, TrueType collections, WOFF and WOFF2
//! containers. A cheap *info* read describes every face in a container
//! (family, weight, width, style, embedding restrictions); a *full* read
//! decodes one face's tables so a line of text can be measured against
//! its horizontal metrics.
//!
//! ```no_run
//! use typeface::{TypeMeasureOptions, TypefaceReader};
//!
//! let reader = TypefaceReader::new();
//! let info = reader.read_info("Roboto-Regular.ttf")?;
//! let font = reader.read_font("Roboto-Regular.ttf", info.faces.first())?;
//! let line = font.measure_line("Hello world", 0, 12.0, 200.0, TypeMeasureOptions::default())?;
//! println!("{} characters fit in {}pt", line.chars_fitted, line.required_width);
//! # Ok::<(), typeface::ReadError>(())
//! ```

pub mod buffer;
pub mod error;
pub mod measure;
pub mod reader;
pub mod sfnt;
pub mod source;
pub mod table_tags;
pub mod tables;
pub mod typeface;
pub mod variable_length;
pub mod version;
pub mod woff;

#[cfg(test)]
mod test_helpers;

pub use error::ReadError;
pub use measure::{FontUnits, LineSize, TypeMeasureOptions, TypefaceMetrics};
pub use reader::{
    DirectoryScan, DirectoryScanIter, TypefaceReader, read_font_from_bytes, read_info_from_bytes,
};
pub use source::{FileSystemSource, FontSource};
pub use typeface::{
    FontFormat, FontRestrictions, FontSelection, FontWeight, FontWidth, TypefaceFont,
    TypefaceInfo, TypefaceReference,
};
pub use woff::decompress_woff1::decompress_woff1;
#[cfg(feature = "brotli")]
pub use woff::woff2::decompress_woff2;

// Round a value up to the nearest multiple of 4. Don't round the value in the
// case that rounding up overflows.
//
// Implemented as a macro to make it generic over the type without horrible type bounds
macro_rules! Round4 {
    ($value:expr) => {
        match $value.checked_add(3) {
            Some(value_plus_3) => value_plus_3 & !3,
            None => $value,
        }
    };
}
pub(crate) use Round4;
