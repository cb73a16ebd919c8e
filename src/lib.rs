//! # provcheck -- release self-verification
//!
//! Establishes that a packaged binary is authentic, unmodified and traceable
//! to its build by checking the supply-chain evidence shipped next to it:
//! checksum manifests, Sigstore bundles, Rekor entries, GitHub attestations,
//! SBOMs, vulnerability scans and SLSA provenance.
//!
//! A [`session::Session`] runs a fixed battery of fourteen independent checks
//! and returns a [`session::Report`]. Each check yields exactly one
//! [`result::CheckResult`]; missing evidence, malformed files, absent tools
//! and timeouts all become failing results rather than errors.
//!
//! ## Security Properties
//!
//! - **`#![forbid(unsafe_code)]`**: No `unsafe` blocks anywhere.
//! - **Read-only**: evidence is never created, modified or deleted.
//! - **Defensive input handling**: All evidence reads are symlink-checked and
//!   size-bounded via [`fs_guard::read_validated`].
//! - **Delegated crypto**: Signature and attestation verification are done
//!   by `cosign` and `gh`. The only local cryptographic operation is SHA-256
//!   hashing via the `sha2` crate.
//! - **Bounded tools**: every external invocation has a timeout and its
//!   stderr is redacted before it reaches a report.
//!
//! ## Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`fs_guard`] | Symlink-safe, size-bounded file reads |
//! | [`digest`] | Streaming SHA-256 of the binary |
//! | [`config`] | `provcheck.json` loading and defaults |
//! | [`locate`] | Binary, version and evidence path resolution |
//! | [`evidence`] | Parsers for manifests, bundles, attestations, SBOMs |
//! | [`tools`] | External tool runner with timeouts |
//! | [`checks`] | The fourteen check units |
//! | [`result`] | Check names and results |
//! | [`session`] | Aggregation and report rendering |

#![forbid(unsafe_code)]

/// Symlink-safe, size-bounded file reads. Single source of truth for all
/// evidence file I/O.
pub mod fs_guard;

/// Streaming SHA-256 over the binary under test.
pub mod digest;

/// Verifier configuration: loads `provcheck.json` and provides defaults.
pub mod config;

/// Binary and version resolution, and the evidence file names beside it.
pub mod locate;

/// Parsers for the evidence formats released alongside a binary.
pub mod evidence;

/// External tool invocation behind the [`tools::ToolRunner`] trait.
pub mod tools;

/// The fourteen check units and the fixed order they run in.
pub mod checks;

/// Check names and the immutable per-check result.
pub mod result;

/// Session resolution, the check battery run, and the report.
pub mod session;

pub use result::{CheckKind, CheckResult};
pub use session::{Report, Session, VerifyRequest};
