//! Signature verification collaborator.
//!
//! Authenticode checking needs a platform certificate store and is out of
//! scope for the parser; the trait keeps the contract narrow and lets
//! deployment tooling plug a real verifier in.

use std::path::Path;

use serde::Serialize;

use crate::err::Result;

/// Verdict of an external signature check. Unsigned is a legitimate, common
/// outcome, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SigningInfo {
    pub is_signed: bool,
    pub catalog_file: String,
    pub digital_signer: String,
    pub digital_signer_version: String,
}

pub trait SignatureVerifier: Send + Sync {
    /// Checks the signing status of the driver package owning `path`.
    /// Errors are absorbed by the batch as an unsigned verdict.
    fn verify(&self, path: &Path) -> Result<SigningInfo>;
}

/// Reports every package as unsigned.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullVerifier;

impl SignatureVerifier for NullVerifier {
    fn verify(&self, _path: &Path) -> Result<SigningInfo> {
        Ok(SigningInfo::default())
    }
}
