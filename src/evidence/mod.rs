//! Parsers for the supply-chain evidence that ships next to a release binary.
//!
//! Each parser is a pure function from file contents to a typed view. None of
//! them decide pass/fail; that is the job of the check units in
//! [`crate::checks`].

pub mod attestation;
pub mod manifest;
pub mod sbom;
pub mod sigbundle;
pub mod walk;
