//! Shared pieces of the read-ahead command line tools.

#![forbid(unsafe_code)]

pub mod common;
