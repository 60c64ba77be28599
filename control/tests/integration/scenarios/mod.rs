//! Integration scenarios

pub mod debounced_rebuild;
