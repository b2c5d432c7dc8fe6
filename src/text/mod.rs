//! Markup parsing, text layout, and the overlay text object.

pub mod layout;
mod markup;
mod object;

pub use layout::{layout, measure, LayoutItem};
pub use object::TextObject;
