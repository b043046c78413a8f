//! Header schema tables for the BCF2 codec.
//!
//! The embedded VCF header is text; the codec needs typed facts per field:
//! value type, cardinality, dictionary offset. [`BcfSchema`] projects a
//! parsed [`VcfHeader`] into those tables once per stream. Schemas are
//! immutable after construction and shared between the stream codec and the
//! lazy genotype blocks it hands out.

use std::collections::HashMap;
use std::sync::Arc;

use physalia_core::{PhysaliaError, Result};

use crate::bcf_dictionary::BcfDictionary;
use crate::bcf_typed::BcfVersion;
use crate::vcf_header::{FieldDef, VcfHeader};

/// The declared value type of an INFO or FORMAT field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Float,
    Flag,
    Str,
    Character,
}

impl FieldType {
    fn parse(raw: &str, id: &str) -> Result<Self> {
        match raw {
            "Integer" => Ok(FieldType::Integer),
            "Float" => Ok(FieldType::Float),
            "Flag" => Ok(FieldType::Flag),
            "String" => Ok(FieldType::Str),
            "Character" => Ok(FieldType::Character),
            other => Err(PhysaliaError::InvalidHeader(format!(
                "field {id} has unknown type '{other}'"
            ))),
        }
    }
}

/// The declared per-record cardinality of an INFO or FORMAT field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCount {
    /// A fixed number of values.
    Fixed(usize),
    /// One value per alternate allele (`Number=A`).
    Alleles,
    /// One value per allele including the reference (`Number=R`).
    AllAlleles,
    /// One value per possible genotype (`Number=G`).
    Genotypes,
    /// Unknown or variable (`Number=.`).
    Unbounded,
}

impl FieldCount {
    fn parse(raw: &str, id: &str) -> Result<Self> {
        match raw {
            "A" => Ok(FieldCount::Alleles),
            "R" => Ok(FieldCount::AllAlleles),
            "G" => Ok(FieldCount::Genotypes),
            "." => Ok(FieldCount::Unbounded),
            n => n.parse().map(FieldCount::Fixed).map_err(|_| {
                PhysaliaError::InvalidHeader(format!("field {id} has unknown Number '{raw}'"))
            }),
        }
    }

    /// Resolve the declared cardinality against a record's shape.
    ///
    /// `None` means unbounded (the observed count governs).
    pub fn resolve(self, n_alleles: usize, max_ploidy: usize) -> Option<usize> {
        match self {
            FieldCount::Fixed(n) => Some(n),
            FieldCount::Alleles => Some(n_alleles.saturating_sub(1)),
            FieldCount::AllAlleles => Some(n_alleles),
            FieldCount::Genotypes => Some(genotype_count(n_alleles.max(1), max_ploidy)),
            FieldCount::Unbounded => None,
        }
    }
}

/// Number of distinct unordered genotypes: C(ploidy + alleles - 1, ploidy).
fn genotype_count(n_alleles: usize, ploidy: usize) -> usize {
    let n = (ploidy + n_alleles - 1) as u64;
    let k = ploidy as u64;
    let mut acc: u64 = 1;
    for i in 1..=k {
        acc = acc.saturating_mul(n - k + i) / i;
    }
    usize::try_from(acc).unwrap_or(usize::MAX)
}

/// Typed facts about one FILTER/INFO/FORMAT field, as consumed by the field
/// encoders and decoders.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub id: String,
    pub value_type: FieldType,
    pub count: FieldCount,
    /// Offset of this ID in the string dictionary.
    pub dictionary_offset: u32,
}

impl FieldSchema {
    /// True when the header does not bound the value count.
    pub fn is_unbounded(&self) -> bool {
        self.count == FieldCount::Unbounded
    }

    /// Resolve the declared cardinality against a record's shape.
    ///
    /// `None` means unbounded (the observed count governs).
    pub fn count_for(&self, n_alleles: usize, max_ploidy: usize) -> Option<usize> {
        self.count.resolve(n_alleles, max_ploidy)
    }
}

/// Canonical contracts for the standard FORMAT keys. Writing or reading a
/// header whose standard-key lines disagree is a hard error.
const STANDARD_FORMAT_KEYS: &[(&str, FieldType, FieldCount)] = &[
    ("GT", FieldType::Str, FieldCount::Fixed(1)),
    ("FT", FieldType::Str, FieldCount::Fixed(1)),
    ("GQ", FieldType::Integer, FieldCount::Fixed(1)),
    ("DP", FieldType::Integer, FieldCount::Fixed(1)),
    ("AD", FieldType::Integer, FieldCount::AllAlleles),
    ("PL", FieldType::Integer, FieldCount::Genotypes),
];

/// True when `id` is one of the FORMAT keys with a canonical contract.
pub fn is_standard_format_key(id: &str) -> bool {
    STANDARD_FORMAT_KEYS.iter().any(|(k, _, _)| *k == id)
}

/// The complete schema for one BCF stream: dictionaries plus per-field
/// tables, built once after the textual header is parsed.
#[derive(Debug)]
pub struct BcfSchema {
    pub version: BcfVersion,
    pub strings: BcfDictionary,
    pub contigs: BcfDictionary,
    pub info: HashMap<String, FieldSchema>,
    pub format: HashMap<String, FieldSchema>,
    pub samples: Vec<String>,
}

impl BcfSchema {
    /// Build the schema tables from a parsed header.
    pub fn build(header: &VcfHeader, version: BcfVersion) -> Result<Arc<Self>> {
        let version = version.validate()?;
        let strings = BcfDictionary::string_dictionary(header, version)?;
        let contigs = BcfDictionary::contig_dictionary(header, version)?;

        let mut info = HashMap::with_capacity(header.info_fields.len());
        for def in &header.info_fields {
            let schema = field_schema(def, &strings)?;
            info.insert(def.id.clone(), schema);
        }

        let mut format = HashMap::with_capacity(header.format_fields.len());
        for def in &header.format_fields {
            let schema = field_schema(def, &strings)?;
            if schema.value_type == FieldType::Flag {
                return Err(PhysaliaError::InvalidHeader(format!(
                    "FORMAT field {} cannot have type Flag",
                    def.id
                )));
            }
            validate_standard_key(&schema)?;
            format.insert(def.id.clone(), schema);
        }

        Ok(Arc::new(Self {
            version,
            strings,
            contigs,
            info,
            format,
            samples: header.samples.clone(),
        }))
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn info_field(&self, id: &str) -> Option<&FieldSchema> {
        self.info.get(id)
    }

    pub fn format_field(&self, id: &str) -> Option<&FieldSchema> {
        self.format.get(id)
    }
}

fn field_schema(def: &FieldDef, strings: &BcfDictionary) -> Result<FieldSchema> {
    let value_type = FieldType::parse(&def.field_type, &def.id)?;
    let count = FieldCount::parse(&def.number, &def.id)?;
    let dictionary_offset = strings.offset_of(&def.id).ok_or_else(|| {
        PhysaliaError::InvalidHeader(format!("field {} missing from string dictionary", def.id))
    })?;
    Ok(FieldSchema {
        id: def.id.clone(),
        value_type,
        count,
        dictionary_offset,
    })
}

fn validate_standard_key(schema: &FieldSchema) -> Result<()> {
    for (key, value_type, count) in STANDARD_FORMAT_KEYS {
        if schema.id == *key {
            if schema.value_type != *value_type || schema.count != *count {
                return Err(PhysaliaError::InvalidHeader(format!(
                    "standard FORMAT key {} declared with nonstandard type or count",
                    schema.id
                )));
            }
            return Ok(());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_header() -> VcfHeader {
        let mut h = VcfHeader::new();
        h.add_contig("chr1", Some(1000));
        h.add_filter("q10", "Quality below 10");
        h.add_info("DP", "1", "Integer", "Total Depth");
        h.add_info("AF", "A", "Float", "Allele Frequency");
        h.add_format("GT", "1", "String", "Genotype");
        h.add_format("PL", "G", "Integer", "Genotype Likelihoods");
        h.add_sample("S1");
        h.add_sample("S2");
        h
    }

    #[test]
    fn build_resolves_offsets() {
        let schema = BcfSchema::build(&full_header(), BcfVersion::V2_2).unwrap();
        // PASS=0, q10=1, DP=2, AF=3, GT=4, PL=5
        assert_eq!(schema.info_field("DP").unwrap().dictionary_offset, 2);
        assert_eq!(schema.format_field("GT").unwrap().dictionary_offset, 4);
        assert_eq!(schema.n_samples(), 2);
        assert_eq!(schema.contigs.get(0), Some("chr1"));
    }

    #[test]
    fn count_parsing() {
        let h = {
            let mut h = VcfHeader::new();
            h.add_info("A1", "A", "Integer", "");
            h.add_info("R1", "R", "Integer", "");
            h.add_info("G1", "G", "Integer", "");
            h.add_info("U1", ".", "Integer", "");
            h.add_info("F3", "3", "Integer", "");
            h
        };
        let schema = BcfSchema::build(&h, BcfVersion::V2_2).unwrap();
        assert_eq!(schema.info_field("A1").unwrap().count, FieldCount::Alleles);
        assert_eq!(
            schema.info_field("R1").unwrap().count,
            FieldCount::AllAlleles
        );
        assert_eq!(
            schema.info_field("G1").unwrap().count,
            FieldCount::Genotypes
        );
        assert!(schema.info_field("U1").unwrap().is_unbounded());
        assert_eq!(
            schema.info_field("F3").unwrap().count,
            FieldCount::Fixed(3)
        );
    }

    #[test]
    fn junk_number_rejected() {
        let mut h = VcfHeader::new();
        h.add_info("X", "two", "Integer", "");
        assert!(matches!(
            BcfSchema::build(&h, BcfVersion::V2_2),
            Err(PhysaliaError::InvalidHeader(_))
        ));
    }

    #[test]
    fn junk_type_rejected() {
        let mut h = VcfHeader::new();
        h.add_info("X", "1", "Text", "");
        assert!(matches!(
            BcfSchema::build(&h, BcfVersion::V2_2),
            Err(PhysaliaError::InvalidHeader(_))
        ));
    }

    #[test]
    fn cardinality_resolution() {
        let schema = BcfSchema::build(&full_header(), BcfVersion::V2_2).unwrap();
        let af = schema.info_field("AF").unwrap();
        // A: one per alt allele
        assert_eq!(af.count_for(3, 2), Some(2));

        let pl = schema.format_field("PL").unwrap();
        // G, diploid: C(n+1, 2)
        assert_eq!(pl.count_for(2, 2), Some(3));
        assert_eq!(pl.count_for(3, 2), Some(6));
        // triploid, 2 alleles: C(4, 3) = 4
        assert_eq!(pl.count_for(2, 3), Some(4));

        let dp = schema.info_field("DP").unwrap();
        assert_eq!(dp.count_for(5, 2), Some(1));
    }

    #[test]
    fn genotype_count_math() {
        assert_eq!(genotype_count(2, 2), 3);
        assert_eq!(genotype_count(4, 2), 10);
        assert_eq!(genotype_count(1, 2), 1);
        assert_eq!(genotype_count(3, 1), 3);
    }

    #[test]
    fn format_flag_rejected() {
        let mut h = VcfHeader::new();
        h.add_format("XF", "0", "Flag", "impossible");
        assert!(matches!(
            BcfSchema::build(&h, BcfVersion::V2_2),
            Err(PhysaliaError::InvalidHeader(_))
        ));
    }

    #[test]
    fn standard_key_contract_enforced() {
        // GT declared as Integer is rejected
        let mut h = VcfHeader::new();
        h.add_format("GT", "1", "Integer", "Genotype");
        assert!(matches!(
            BcfSchema::build(&h, BcfVersion::V2_2),
            Err(PhysaliaError::InvalidHeader(_))
        ));

        // AD must be Number=R
        let mut h = VcfHeader::new();
        h.add_format("AD", "2", "Integer", "Allele Depths");
        assert!(BcfSchema::build(&h, BcfVersion::V2_2).is_err());

        // canonical AD passes
        let mut h = VcfHeader::new();
        h.add_format("AD", "R", "Integer", "Allele Depths");
        assert!(BcfSchema::build(&h, BcfVersion::V2_2).is_ok());
    }

    #[test]
    fn standard_key_probe() {
        assert!(is_standard_format_key("GT"));
        assert!(is_standard_format_key("PL"));
        assert!(!is_standard_format_key("GL"));
    }

    #[test]
    fn unsupported_version_rejected_at_build() {
        let h = full_header();
        assert!(matches!(
            BcfSchema::build(&h, BcfVersion::new(2, 3)),
            Err(PhysaliaError::UnsupportedVersion(_))
        ));
    }
}
