pub mod catalog;
pub mod file;

pub use catalog::Catalog;
pub use file::{Download, FileService};
