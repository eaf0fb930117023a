//! Style resolution: font data, the inheritance cascade, and colors.

pub mod cascade;
pub mod color;
pub mod fontdata;

pub use cascade::{CascadeContext, MasterTextStyles, effective_portion_font, resolve_font};
pub use color::ColorRef;
pub use fontdata::{FontCache, FontData};
