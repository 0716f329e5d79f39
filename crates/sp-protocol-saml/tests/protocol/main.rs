//! Protocol engine integration tests.
//!
//! Everything runs in process: the identity provider side is played by
//! fixtures in `common`.

mod common;

mod canonicalization;
mod end_to_end;
mod endpoint_resolution;
mod logout;
mod signatures;
mod validation;
