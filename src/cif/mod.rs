//! Line-level access to mmCIF text: locating markers, reading the loops the
//! augmentation needs and appending aligned loop blocks.

pub mod locator;
pub mod reader;
pub mod writer;

pub use locator::{find_line, find_line_from, require_line};
pub use reader::{LoopTable, tokenize};
pub use writer::{
    LoopBlock, append_multi_loop, append_single_loop, append_text, ends_with_line, quote_value,
};

pub const BLOCK_SEPARATOR: &str = "#";
pub const LOOP_MARKER: &str = "loop_";
pub const PLACEHOLDER: &str = "?";
pub const NOT_AVAILABLE: &str = ".";
