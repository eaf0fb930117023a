//! Shape trees and their node types.

pub mod shape;
pub mod textframe;
pub mod tree;

pub use shape::{PlaceholderKey, Shape, ShapeKind, Transform};
pub use textframe::{AutofitMode, BodyProperties, Margins, Paragraph, Portion, TextFrame};
pub use tree::ShapeTree;
