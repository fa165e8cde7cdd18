#![deny(missing_docs)]
#![doc = "Shared error taxonomy, labels and deterministic helpers for the pseudo-Cl estimator."]

pub mod errors;
pub mod hash;
pub mod labels;
pub mod provenance;
pub mod rng;
pub mod serde;

pub use errors::{ErrorInfo, PclError, Warning};
pub use hash::{hash_f64_arrays, stable_hash_string};
pub use labels::{AnalysisMode, Convention, Field, SpectrumLabel};
pub use provenance::SchemaVersion;
pub use rng::{derive_substream_seed, RngHandle};
pub use serde::to_canonical_json_bytes;
