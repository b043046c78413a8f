//! Omics data structures for the Physalia bioinformatics ecosystem.
//!
//! This crate provides the logical variant-call model consumed and produced
//! by the codecs in `physalia-io`:
//!
//! - **Variant calls** — [`VariantCall`] with site attributes, ordered INFO
//!   fields, and per-sample genotypes
//! - **Attribute values** — the typed [`AttrValue`] union used for INFO and
//!   FORMAT data
//! - **Genotypes** — [`SampleGenotype`] with allele indices, phasing, and
//!   the standard inline fields (DP, GQ, AD, PL, FT)

pub mod variant;

pub use variant::{
    AttrValue, SampleGenotype, VariantCall, VariantFilter, VariantType,
};
