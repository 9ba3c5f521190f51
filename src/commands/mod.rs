pub mod extract;

pub use extract::{extract, ExtractRequest, ExtractResponse, Operation};
