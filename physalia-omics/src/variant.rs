//! Genomic variant representation (VCF-style).
//!
//! Types for representing variant calls the way VCF/BCF model them: a site
//! (chrom, position, alleles, quality, filters), an ordered set of INFO
//! attributes, and per-sample genotypes with the standard inline fields.
//!
//! Positions are 1-based following VCF convention.

use physalia_core::{PhysaliaError, Result, Summarizable};

/// The class of a genomic variant.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VariantType {
    /// Single nucleotide variant (ref and alt are both 1 base).
    Snv,
    /// Insertion (alt is longer than ref).
    Insertion,
    /// Deletion (ref is longer than alt).
    Deletion,
    /// Multi-nucleotide variant (ref and alt are equal length > 1).
    Mnv,
    /// Complex variant (none of the above).
    Complex,
}

/// Filter status for a variant call.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VariantFilter {
    /// Passed all filters.
    Pass,
    /// Failed one or more filters.
    Fail(Vec<String>),
    /// Filter status not available.
    Missing,
}

/// A typed attribute value, as carried by INFO fields and per-sample FORMAT
/// fields.
///
/// Vector variants hold `Option` elements: a `None` entry is a
/// per-element missing value ("." inside a VCF list). [`AttrValue::Missing`]
/// is the whole-value missing marker (the attribute is declared for the
/// record but carries no data).
///
/// Floats are `f32` because that is the width every variant container
/// stores; keeping the model at wire width makes encode/decode round-trips
/// exact.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttrValue {
    /// A single integer.
    Int(i32),
    /// A vector of integers, possibly with missing elements.
    Ints(Vec<Option<i32>>),
    /// A single float.
    Float(f32),
    /// A vector of floats, possibly with missing elements.
    Floats(Vec<Option<f32>>),
    /// A presence flag.
    Flag(bool),
    /// A single string (also used for `Character`-typed fields).
    String(String),
    /// A list of strings.
    Strings(Vec<String>),
    /// Declared but valueless ("." in VCF).
    Missing,
}

impl AttrValue {
    /// True for the whole-value missing marker.
    pub fn is_missing(&self) -> bool {
        matches!(self, AttrValue::Missing)
    }
}

/// A single sample's genotype call.
///
/// `alleles` holds indices into the owning record's allele list (0 = REF,
/// 1 = first ALT, ...); a `None` entry is a no-call (`.`). The standard
/// fields DP, GQ, AD, PL, and FT are stored inline; all other FORMAT values
/// live in `attributes`, keyed by FORMAT ID in record order.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleGenotype {
    /// Allele indices, one per ploidy; `None` = no-call.
    pub alleles: Vec<Option<usize>>,
    /// Whether the call is phased (`|` separator in VCF).
    pub phased: bool,
    /// Read depth (DP).
    pub dp: Option<i32>,
    /// Genotype quality (GQ).
    pub gq: Option<i32>,
    /// Allele depths (AD), one per allele.
    pub ad: Option<Vec<i32>>,
    /// Phred-scaled genotype likelihoods (PL), one per genotype.
    pub pl: Option<Vec<i32>>,
    /// Per-sample filter string (FT).
    pub filters: Option<String>,
    /// Remaining FORMAT values, in record FORMAT order.
    pub attributes: Vec<(String, AttrValue)>,
}

impl SampleGenotype {
    /// A called genotype with the given allele indices.
    pub fn new(alleles: Vec<Option<usize>>, phased: bool) -> Self {
        Self {
            alleles,
            phased,
            ..Self::default()
        }
    }

    /// Diploid unphased call, e.g. `diploid(0, 1)` for `0/1`.
    pub fn diploid(a: usize, b: usize) -> Self {
        Self::new(vec![Some(a), Some(b)], false)
    }

    /// Diploid phased call, e.g. `diploid_phased(1, 1)` for `1|1`.
    pub fn diploid_phased(a: usize, b: usize) -> Self {
        Self::new(vec![Some(a), Some(b)], true)
    }

    /// A wholly absent genotype: no alleles, every field missing.
    pub fn absent() -> Self {
        Self::default()
    }

    /// The sample's ploidy (number of allele slots).
    pub fn ploidy(&self) -> usize {
        self.alleles.len()
    }

    /// True when no allele was called and no field carries data.
    pub fn is_absent(&self) -> bool {
        self.alleles.is_empty()
            && self.dp.is_none()
            && self.gq.is_none()
            && self.ad.is_none()
            && self.pl.is_none()
            && self.filters.is_none()
            && self.attributes.is_empty()
    }

    /// True when every allele slot is a no-call.
    pub fn is_no_call(&self) -> bool {
        !self.alleles.is_empty() && self.alleles.iter().all(|a| a.is_none())
    }

    /// Look up a FORMAT attribute by key.
    pub fn attribute(&self, key: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

/// A variant call (VCF/BCF-style representation).
///
/// INFO attributes are stored as an ordered list so that encoding preserves
/// the source iteration order; `format` lists the FORMAT keys in the order
/// their per-sample values appear.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VariantCall {
    pub chrom: String,
    /// 1-based position (VCF convention).
    pub position: u64,
    /// Optional identifier (e.g. rs12345).
    pub id: Option<String>,
    /// Reference allele.
    pub ref_allele: Vec<u8>,
    /// Alternate alleles.
    pub alt_alleles: Vec<Vec<u8>>,
    /// Phred-scaled quality score.
    pub quality: Option<f32>,
    /// Filter status.
    pub filter: VariantFilter,
    /// INFO attributes in source order.
    pub info: Vec<(String, AttrValue)>,
    /// FORMAT keys in the order genotype fields are laid out.
    pub format: Vec<String>,
    /// Per-sample genotypes, in header sample order.
    pub genotypes: Vec<SampleGenotype>,
}

impl VariantCall {
    /// Create a new variant call with minimal fields.
    ///
    /// Validates that reference and alternate alleles are non-empty.
    pub fn new(
        chrom: impl Into<String>,
        position: u64,
        ref_allele: Vec<u8>,
        alt_alleles: Vec<Vec<u8>>,
    ) -> Result<Self> {
        if ref_allele.is_empty() {
            return Err(PhysaliaError::InvalidInput(
                "reference allele must not be empty".into(),
            ));
        }
        for (i, alt) in alt_alleles.iter().enumerate() {
            if alt.is_empty() {
                return Err(PhysaliaError::InvalidInput(format!(
                    "alternate allele {i} must not be empty"
                )));
            }
        }
        Ok(Self {
            chrom: chrom.into(),
            position,
            id: None,
            ref_allele,
            alt_alleles,
            quality: None,
            filter: VariantFilter::Missing,
            info: Vec::new(),
            format: Vec::new(),
            genotypes: Vec::new(),
        })
    }

    /// Total allele count (REF + ALTs).
    pub fn n_alleles(&self) -> usize {
        1 + self.alt_alleles.len()
    }

    /// Allele bytes by index (0 = REF).
    pub fn allele(&self, i: usize) -> Option<&[u8]> {
        if i == 0 {
            Some(&self.ref_allele)
        } else {
            self.alt_alleles.get(i - 1).map(|a| a.as_slice())
        }
    }

    /// Maximum ploidy across genotypes, clamped below by `floor`.
    ///
    /// The floor exists because a record with no called genotypes is still
    /// treated as diploid by genotype-count cardinalities.
    pub fn max_ploidy(&self, floor: usize) -> usize {
        self.genotypes
            .iter()
            .map(SampleGenotype::ploidy)
            .max()
            .unwrap_or(0)
            .max(floor)
    }

    /// Look up an INFO attribute by key.
    pub fn info_attribute(&self, key: &str) -> Option<&AttrValue> {
        self.info.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Infer the variant type from the first alternate allele.
    pub fn variant_type(&self) -> VariantType {
        let ref_len = self.ref_allele.len();
        let alt_len = match self.alt_alleles.first() {
            Some(a) => a.len(),
            None => return VariantType::Complex,
        };

        if ref_len == 1 && alt_len == 1 {
            VariantType::Snv
        } else if ref_len == alt_len {
            VariantType::Mnv
        } else if ref_len < alt_len {
            VariantType::Insertion
        } else {
            VariantType::Deletion
        }
    }

    /// True for single-nucleotide variants.
    pub fn is_snv(&self) -> bool {
        self.variant_type() == VariantType::Snv
    }

    /// True for insertions and deletions.
    pub fn is_indel(&self) -> bool {
        matches!(
            self.variant_type(),
            VariantType::Insertion | VariantType::Deletion
        )
    }

    /// True for purine<->purine or pyrimidine<->pyrimidine SNVs.
    pub fn is_transition(&self) -> bool {
        if !self.is_snv() {
            return false;
        }
        let r = self.ref_allele[0].to_ascii_uppercase();
        let a = self.alt_alleles[0][0].to_ascii_uppercase();
        matches!(
            (r, a),
            (b'A', b'G') | (b'G', b'A') | (b'C', b'T') | (b'T', b'C')
        )
    }

    /// True for SNVs that are not transitions.
    pub fn is_transversion(&self) -> bool {
        self.is_snv() && !self.is_transition()
    }
}

impl Summarizable for VariantCall {
    fn summary(&self) -> String {
        format!(
            "{}:{} {}>{} ({} sample{})",
            self.chrom,
            self.position,
            String::from_utf8_lossy(&self.ref_allele),
            self.alt_alleles
                .iter()
                .map(|a| String::from_utf8_lossy(a).into_owned())
                .collect::<Vec<_>>()
                .join(","),
            self.genotypes.len(),
            if self.genotypes.len() == 1 { "" } else { "s" },
        )
    }
}
