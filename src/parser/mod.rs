//! Expression text parsing: list tokenization and reference grammar.

pub mod error;
pub mod expression;
pub mod tokenizer;

pub use error::{ParseResult, SyntaxError};
pub use expression::{
    item_reference, metadata_reference, property_reference, whole_item_reference,
};
pub(crate) use expression::skip_reference;
pub use tokenizer::{ListTokenizer, may_be_list, split_list};
