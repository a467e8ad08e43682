mod file;
mod tag;

pub use file::*;
pub use tag::*;
