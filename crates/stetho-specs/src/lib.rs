//! Declarative spec loading and normalization for stetho.
//!
//! Turns spec sources (files, stdin, URIs, cluster references, OCI
//! artifacts) into a single normalized [`SpecSet`] in the canonical
//! schema, resolving external references and follow-up URIs on the way.

pub mod error;
pub mod loader;
pub mod oci;
pub mod source;
pub mod template;
pub mod types;

pub use error::SpecError;
pub use loader::{split_documents, LoadOptions, SpecLoader};
pub use source::SpecSource;
pub use types::*;
