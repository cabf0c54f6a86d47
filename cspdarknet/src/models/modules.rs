//! Building blocks of the backbone.

mod conv_block;
mod multi_concat;
mod transition;

pub use conv_block::*;
pub use multi_concat::*;
pub use transition::*;
