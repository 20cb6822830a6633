//! The built-in tool catalogue and its registry.
//!
//! Every tool follows one execution contract: parse the structured input,
//! validate, check cancellation, and return a JSON envelope encoded as a
//! compact string. Expected failures (missing file, bad range, non-zero
//! exit) are error envelopes, never `Err`.

pub mod edit;
pub mod fsops;
pub mod grep;
pub mod list_dir;
pub mod read;
pub mod registry;
pub mod relocate;
pub mod shell;
pub mod write;

pub use registry::{Tool, ToolOutcome, ToolRegistry};
