//! Record streams over format adapters

mod modifier;
mod reader;
mod writer;

pub use modifier::Modifier;
pub use reader::Reader;
pub use writer::Writer;
