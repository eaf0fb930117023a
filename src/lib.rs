//! Pomelo - an object model for PowerPoint (.pptx) presentations
//!
//! This library reads, queries and mutates presentation packages: zip
//! archives of XML parts connected by named relationships.
//!
//! # Features
//!
//! - **Part graph**: load and save the package, add/remove parts, allocate
//!   relationship ids that never resurrect after removal
//! - **Shape trees**: enumerate and mutate the shapes of slides, layouts
//!   and masters, with tree-scoped id and name invariants
//! - **Style cascade**: resolve a shape's effective font and colors through
//!   slide -> layout -> master -> theme inheritance
//! - **Copy engine**: duplicate shapes and slides, within a package or
//!   across packages, keeping identifiers and relationships consistent
//! - **Auto-fit**: recompute a text box's extent from measured text
//!
//! # Example - Reading a presentation
//!
//! ```no_run
//! use pomelo::Presentation;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pres = Presentation::open("deck.pptx")?;
//! println!("{} slides", pres.slide_count());
//!
//! for position in 1..=pres.slide_count() {
//!     println!("slide {}: {}", position, pres.slide_text(position)?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Duplicating a shape
//!
//! ```no_run
//! use pomelo::Presentation;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pres = Presentation::open("deck.pptx")?;
//!
//! // Clone shape 2 on the first slide; the copy gets a fresh id and a
//! // suffix-law name ("Logo" -> "Logo 2").
//! let new_id = pres.duplicate_shape(1, 2)?;
//! println!("created shape {}", new_id);
//!
//! pres.save("deck-out.pptx")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Resolving effective style
//!
//! ```no_run
//! use pomelo::Presentation;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pres = Presentation::open("deck.pptx")?;
//!
//! // Effective font of shape 2 on slide 1 at outline level 0, resolved
//! // through the slide -> layout -> master -> theme cascade.
//! let font = pres.resolve_font(1, 2, 0)?;
//! println!("size: {:?}, typeface: {:?}", font.size, font.latin);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod opc;
pub mod pptx;

pub use error::{Error, Result};
pub use pptx::autofit::TextMeasurer;
pub use pptx::presentation::Presentation;
pub use pptx::shapes::{
    AutofitMode, Paragraph, PlaceholderKey, Portion, Shape, ShapeKind, ShapeTree, TextFrame,
    Transform,
};
pub use pptx::style::{ColorRef, FontData};
