pub mod annotation;
pub mod page;
pub mod selection;
pub mod tree;

pub use annotation::*;
pub use page::*;
pub use selection::*;
pub use tree::*;
