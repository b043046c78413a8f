//! File format support for the Physalia bioinformatics ecosystem.
//!
//! Supported formats:
//! - **VCF headers** — structured build/parse/serialize of VCF 4.3 header
//!   metadata, via [`vcf_header`]
//! - **BCF2** — the binary VCF container, minor versions 2.1 and 2.2, with
//!   a streaming reader ([`bcf::BcfReader`], lazy genotype decoding) and
//!   writer ([`bcf_write::BcfWriter`])
//! - **BGZF** — the blocked gzip framing `.bcf` files are stored in, via
//!   [`bgzf`]

pub mod bgzf;
pub mod vcf_header;

pub mod bcf;
pub mod bcf_dictionary;
pub mod bcf_field_read;
pub mod bcf_field_write;
pub mod bcf_schema;
pub mod bcf_typed;
pub mod bcf_write;

// Re-exports for convenience.

pub use bcf::{bcf_stats, read_bcf, BcfReader, BcfRecord, BcfStats};
pub use bcf_dictionary::BcfDictionary;
pub use bcf_schema::{BcfSchema, FieldCount, FieldSchema, FieldType};
pub use bcf_typed::BcfVersion;
pub use bcf_write::{write_bcf, write_bcf_bytes, BcfWriter};
pub use vcf_header::VcfHeader;
