//! Locating symbol figures inside loosely structured exchange tables.

pub mod layout;
mod locator;

pub use locator::TableLocator;
