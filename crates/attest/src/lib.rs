#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`AttestError`)
//! - [`signer`]: Cosign image signing and verification (`CosignSigner`)
//! - [`sbom`]: SBOM generation, attach, and verification (`SbomManager`)
//!
//! # Architecture
//!
//! ```text
//! image ref ----> CosignSigner::sign ------> cosign sign (keyless | --key)
//!           \---> CosignSigner::verify ----> cosign verify --output json
//!           \---> SbomManager::generate ---> syft -o <format>
//!                        |
//!                 SbomManager::attach -----> cosign attest --predicate --type
//!                        |
//!                 SbomManager::verify -----> cosign verify-attestation
//!                                            (DSSE payload -> in-toto predicate)
//! ```

pub mod error;
pub mod sbom;
pub mod signer;

// --- Public API Re-exports ---

pub use error::AttestError;
pub use sbom::SbomManager;
pub use signer::{CosignSigner, fail_open};
