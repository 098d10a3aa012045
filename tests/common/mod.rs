//! Fakes shared with the library's unit tests
#![allow(dead_code)]

pub use querykit::{embedding, llm};

#[path = "../../src/test_support.rs"]
mod fakes;

pub use fakes::*;
