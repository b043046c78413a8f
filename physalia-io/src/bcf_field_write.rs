//! Per-field BCF2 encoders for INFO and FORMAT data.
//!
//! One writer is built per header line and owned by the stream writer for
//! its lifetime; the strategy is picked once from the schema (standard
//! FORMAT keys first, then declared type and count). INFO writers are a
//! single pass: the value itself determines the typing byte. FORMAT writers
//! are two passes, because the typing byte must declare the narrowest
//! integer width and the largest vector length across every sample, and
//! both are known only after all samples have been inspected.

use std::collections::HashMap;

use physalia_core::{PhysaliaError, Result};
use physalia_omics::{AttrValue, SampleGenotype, VariantCall};

use crate::bcf_schema::{BcfSchema, FieldCount, FieldSchema, FieldType};
use crate::bcf_typed::{Bcf2Encoder, TypeTag};

// ---------------------------------------------------------------------------
// INFO writers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum InfoStrategy {
    AtomicInt,
    AtomicFloat,
    Flag,
    VecInt,
    VecFloat,
    Char,
    Str,
}

/// Encoder for one INFO header line.
#[derive(Debug)]
pub struct InfoFieldWriter {
    key: String,
    offset: i32,
    offset_tag: TypeTag,
    count: FieldCount,
    strategy: InfoStrategy,
}

impl InfoFieldWriter {
    fn new(schema: &FieldSchema) -> Result<Self> {
        let strategy = match (schema.value_type, schema.count) {
            (FieldType::Integer, FieldCount::Fixed(1)) => InfoStrategy::AtomicInt,
            (FieldType::Integer, _) => InfoStrategy::VecInt,
            (FieldType::Float, FieldCount::Fixed(1)) => InfoStrategy::AtomicFloat,
            (FieldType::Float, _) => InfoStrategy::VecFloat,
            (FieldType::Flag, _) => InfoStrategy::Flag,
            (FieldType::Str, _) => InfoStrategy::Str,
            (FieldType::Character, _) => InfoStrategy::Char,
        };
        let offset = schema.dictionary_offset as i32;
        Ok(Self {
            key: schema.id.clone(),
            offset,
            offset_tag: TypeTag::for_int(offset)?,
            count: schema.count,
            strategy,
        })
    }

    /// Resolve the logical value count for this record; errors when the
    /// observed count exceeds a bounded declaration.
    fn resolve_count(&self, observed: usize, vc: &VariantCall) -> Result<usize> {
        match bound_for(self.count, vc) {
            None => Ok(observed),
            Some(bound) if observed > bound => Err(PhysaliaError::CardinalityViolation(format!(
                "INFO {}: observed {observed} values, header allows {bound}",
                self.key
            ))),
            Some(bound) => Ok(bound),
        }
    }

    /// Emit the dictionary-offset key followed by the typed value.
    pub fn encode(
        &self,
        vc: &VariantCall,
        value: &AttrValue,
        enc: &mut Bcf2Encoder,
    ) -> Result<()> {
        enc.encode_typed_int_as(self.offset, self.offset_tag)?;
        match self.strategy {
            InfoStrategy::AtomicInt => match value {
                AttrValue::Missing => enc.encode_typed_missing(TypeTag::Int8),
                AttrValue::Int(v) => enc.encode_typed_int(*v),
                other => self.incompatible(other),
            },
            InfoStrategy::AtomicFloat => match value {
                AttrValue::Missing => enc.encode_typed_missing(TypeTag::Float),
                AttrValue::Float(v) => enc.encode_typed_float(*v),
                other => self.incompatible(other),
            },
            InfoStrategy::Flag => match value {
                AttrValue::Flag(true) => {
                    enc.encode_type(1, TypeTag::Int8)?;
                    enc.encode_raw_int(1, TypeTag::Int8)
                }
                AttrValue::Flag(false) | AttrValue::Missing => {
                    enc.encode_typed_missing(TypeTag::Int8)
                }
                other => self.incompatible(other),
            },
            InfoStrategy::VecInt => match value {
                AttrValue::Missing => enc.encode_typed_missing(TypeTag::Int8),
                AttrValue::Ints(vs) => {
                    let n = self.resolve_count(vs.len(), vc)?;
                    enc.encode_typed_ints(vs, n)
                }
                AttrValue::Int(v) => {
                    // Vectors pruned to one element may arrive as the bare value
                    let n = self.resolve_count(1, vc)?;
                    let tag = TypeTag::for_int(*v)?;
                    enc.encode_type(n, tag)?;
                    enc.encode_raw_int(*v, tag)?;
                    enc.encode_padding_values(n - 1, tag);
                    Ok(())
                }
                other => self.incompatible(other),
            },
            InfoStrategy::VecFloat => match value {
                AttrValue::Missing => enc.encode_typed_missing(TypeTag::Float),
                AttrValue::Floats(vs) => {
                    let n = self.resolve_count(vs.len(), vc)?;
                    enc.encode_typed_floats(vs, n)
                }
                AttrValue::Float(v) => {
                    let n = self.resolve_count(1, vc)?;
                    enc.encode_type(n, TypeTag::Float)?;
                    enc.encode_raw_float(*v);
                    enc.encode_padding_values(n - 1, TypeTag::Float);
                    Ok(())
                }
                other => self.incompatible(other),
            },
            InfoStrategy::Char => match value {
                AttrValue::Missing => enc.encode_typed_missing(TypeTag::Char),
                AttrValue::String(s) => {
                    let bytes = s.as_bytes();
                    let n = self.resolve_count(bytes.len(), vc)?;
                    enc.encode_typed_string_padded(bytes, n)
                }
                other => self.incompatible(other),
            },
            InfoStrategy::Str => match value {
                AttrValue::Missing => enc.encode_typed_missing(TypeTag::Char),
                AttrValue::String(s) => enc.encode_typed_string(s.as_bytes()),
                AttrValue::Strings(list) => {
                    self.resolve_count(list.len(), vc)?;
                    let bytes = enc.compact_strings(list);
                    enc.encode_typed_string(&bytes)
                }
                other => self.incompatible(other),
            },
        }
    }

    fn incompatible(&self, value: &AttrValue) -> Result<()> {
        Err(PhysaliaError::IncompatibleValue(format!(
            "INFO {}: value {value:?} does not match the declared type",
            self.key
        )))
    }
}

// ---------------------------------------------------------------------------
// FORMAT writers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum FormatStrategy {
    Gt,
    Ft,
    Dp,
    Gq,
    Ad,
    Pl,
    AtomicInt,
    AtomicFloat,
    VecInt,
    VecFloat,
    Char,
    Str,
}

/// Encoder for one FORMAT header line.
///
/// FORMAT payloads are sample-major: one typing byte declaring the common
/// `(width, length)`, then exactly `n_samples x n_values` values. The
/// preprocess pass scans every sample to find that common shape; the write
/// pass emits the rows, padding short ones.
#[derive(Debug)]
pub struct FormatFieldWriter {
    key: String,
    offset: i32,
    offset_tag: TypeTag,
    count: FieldCount,
    strategy: FormatStrategy,
    // per-record scratch, reset by preprocess
    tag: TypeTag,
    n_values: usize,
    strings: Vec<Option<Vec<u8>>>,
}

impl FormatFieldWriter {
    fn new(schema: &FieldSchema) -> Result<Self> {
        let strategy = match schema.id.as_str() {
            "GT" => FormatStrategy::Gt,
            "FT" => FormatStrategy::Ft,
            "DP" => FormatStrategy::Dp,
            "GQ" => FormatStrategy::Gq,
            "AD" => FormatStrategy::Ad,
            "PL" => FormatStrategy::Pl,
            _ => match (schema.value_type, schema.count) {
                (FieldType::Integer, FieldCount::Fixed(1)) => FormatStrategy::AtomicInt,
                (FieldType::Integer, _) => FormatStrategy::VecInt,
                (FieldType::Float, FieldCount::Fixed(1)) => FormatStrategy::AtomicFloat,
                (FieldType::Float, _) => FormatStrategy::VecFloat,
                (FieldType::Str, _) => FormatStrategy::Str,
                (FieldType::Character, _) => FormatStrategy::Char,
                (FieldType::Flag, _) => {
                    return Err(PhysaliaError::InvalidHeader(format!(
                        "FORMAT field {} cannot have type Flag",
                        schema.id
                    )))
                }
            },
        };
        let offset = schema.dictionary_offset as i32;
        Ok(Self {
            key: schema.id.clone(),
            offset,
            offset_tag: TypeTag::for_int(offset)?,
            count: schema.count,
            strategy,
            tag: TypeTag::Int8,
            n_values: 0,
            strings: Vec::new(),
        })
    }

    /// Emit the dictionary-offset key, typing byte, and all sample rows.
    pub fn encode(&mut self, vc: &VariantCall, enc: &mut Bcf2Encoder) -> Result<()> {
        enc.encode_typed_int_as(self.offset, self.offset_tag)?;
        self.preprocess(vc, enc)?;
        enc.encode_type(self.n_values, self.tag)?;
        self.write(vc, enc)
    }

    fn bounded_count(&self, vc: &VariantCall) -> Result<usize> {
        bound_for(self.count, vc).ok_or_else(|| {
            PhysaliaError::InvalidHeader(format!(
                "FORMAT {} requires a bounded count",
                self.key
            ))
        })
    }

    fn check_bound(&self, observed: usize, bound: usize) -> Result<()> {
        if observed > bound {
            return Err(PhysaliaError::CardinalityViolation(format!(
                "FORMAT {}: observed {observed} values, header allows {bound}",
                self.key
            )));
        }
        Ok(())
    }

    /// First pass: determine `(tag, n_values)` and cache byte rows where
    /// building them twice would be wasteful.
    fn preprocess(&mut self, vc: &VariantCall, enc: &Bcf2Encoder) -> Result<()> {
        self.tag = TypeTag::Int8;
        self.n_values = 0;
        self.strings.clear();

        match self.strategy {
            FormatStrategy::Gt => {
                self.n_values = vc.max_ploidy(2);
                // The widest value a GT payload can hold is the last allele's
                // encoding, (n_alleles << 1) | 1, so size the width from it
                self.tag = TypeTag::for_int(((vc.n_alleles() as i32) << 1) | 1)?;
            }
            FormatStrategy::Ft => {
                self.tag = TypeTag::Char;
                for g in &vc.genotypes {
                    let bytes = match &g.filters {
                        Some(f) => f.as_bytes().to_vec(),
                        // An unfiltered genotype is written as literal PASS
                        None => b"PASS".to_vec(),
                    };
                    self.n_values = self.n_values.max(bytes.len());
                    self.strings.push(Some(bytes));
                }
            }
            FormatStrategy::Dp | FormatStrategy::Gq => {
                self.n_values = 1;
                for g in &vc.genotypes {
                    let v = if matches!(self.strategy, FormatStrategy::Dp) {
                        g.dp
                    } else {
                        g.gq
                    };
                    if let Some(v) = v {
                        self.tag = self.tag.max_int(TypeTag::for_int(v)?);
                        if self.tag == TypeTag::Int32 {
                            break;
                        }
                    }
                }
            }
            FormatStrategy::Ad | FormatStrategy::Pl => {
                self.n_values = self.bounded_count(vc)?;
                'samples: for g in &vc.genotypes {
                    let vs = if matches!(self.strategy, FormatStrategy::Ad) {
                        &g.ad
                    } else {
                        &g.pl
                    };
                    if let Some(vs) = vs {
                        self.check_bound(vs.len(), self.n_values)?;
                        for v in vs {
                            self.tag = self.tag.max_int(TypeTag::for_int(*v)?);
                            if self.tag == TypeTag::Int32 {
                                break 'samples;
                            }
                        }
                    }
                }
            }
            FormatStrategy::AtomicInt => {
                self.n_values = 1;
                for g in &vc.genotypes {
                    if let Some(v) = self.int_attr(g)? {
                        self.tag = self.tag.max_int(TypeTag::for_int(v)?);
                        if self.tag == TypeTag::Int32 {
                            break;
                        }
                    }
                }
            }
            FormatStrategy::AtomicFloat => {
                self.tag = TypeTag::Float;
                self.n_values = 1;
            }
            FormatStrategy::VecInt => {
                let mut max_len = 0;
                for g in &vc.genotypes {
                    match attr(g, &self.key) {
                        None => {}
                        Some(AttrValue::Ints(vs)) => {
                            max_len = max_len.max(vs.len());
                            self.tag = self.tag.max_int(TypeTag::for_ints(vs.iter())?);
                        }
                        Some(AttrValue::Int(v)) => {
                            max_len = max_len.max(1);
                            self.tag = self.tag.max_int(TypeTag::for_int(*v)?);
                        }
                        Some(other) => return self.incompatible(other),
                    }
                }
                self.n_values = match bound_for(self.count, vc) {
                    None => max_len,
                    Some(bound) => {
                        self.check_bound(max_len, bound)?;
                        bound
                    }
                };
            }
            FormatStrategy::VecFloat => {
                self.tag = TypeTag::Float;
                let mut max_len = 0;
                for g in &vc.genotypes {
                    match attr(g, &self.key) {
                        None => {}
                        Some(AttrValue::Floats(vs)) => max_len = max_len.max(vs.len()),
                        Some(AttrValue::Float(_)) => max_len = max_len.max(1),
                        Some(other) => return self.incompatible(other),
                    }
                }
                self.n_values = match bound_for(self.count, vc) {
                    None => max_len,
                    Some(bound) => {
                        self.check_bound(max_len, bound)?;
                        bound
                    }
                };
            }
            FormatStrategy::Char => {
                self.tag = TypeTag::Char;
                let mut max_len = 0;
                for g in &vc.genotypes {
                    match attr(g, &self.key) {
                        None => self.strings.push(None),
                        Some(AttrValue::String(s)) => {
                            let bytes = s.as_bytes().to_vec();
                            max_len = max_len.max(bytes.len());
                            self.strings.push(Some(bytes));
                        }
                        Some(other) => return self.incompatible(other),
                    }
                }
                self.n_values = match bound_for(self.count, vc) {
                    None => max_len,
                    Some(bound) => {
                        self.check_bound(max_len, bound)?;
                        bound
                    }
                };
            }
            FormatStrategy::Str => {
                self.tag = TypeTag::Char;
                let mut observed = 0;
                for g in &vc.genotypes {
                    match attr(g, &self.key) {
                        None => self.strings.push(None),
                        Some(AttrValue::String(s)) => {
                            observed = observed.max(1);
                            let bytes = s.as_bytes().to_vec();
                            self.n_values = self.n_values.max(bytes.len());
                            self.strings.push(Some(bytes));
                        }
                        Some(AttrValue::Strings(list)) => {
                            observed = observed.max(list.len());
                            let bytes = enc.compact_strings(list);
                            self.n_values = self.n_values.max(bytes.len());
                            self.strings.push(Some(bytes));
                        }
                        Some(other) => return self.incompatible(other),
                    }
                }
                if let Some(bound) = bound_for(self.count, vc) {
                    self.check_bound(observed, bound)?;
                }
            }
        }
        Ok(())
    }

    /// Second pass: emit one row per sample.
    fn write(&mut self, vc: &VariantCall, enc: &mut Bcf2Encoder) -> Result<()> {
        match self.strategy {
            FormatStrategy::Gt => {
                for g in &vc.genotypes {
                    if g.alleles.is_empty() {
                        // Entirely missing genotype: a vector of no-calls
                        for _ in 0..self.n_values {
                            enc.encode_raw_int(0, self.tag)?;
                        }
                        continue;
                    }
                    for (j, allele) in g.alleles.iter().enumerate() {
                        let idx = match allele {
                            Some(i) => {
                                if *i >= vc.n_alleles() {
                                    return Err(PhysaliaError::InvalidInput(format!(
                                        "GT allele index {i} out of range for {} alleles",
                                        vc.n_alleles()
                                    )));
                                }
                                *i as i32
                            }
                            None => -1,
                        };
                        let phase = i32::from(g.phased && j > 0);
                        enc.encode_raw_int(((idx + 1) << 1) | phase, self.tag)?;
                    }
                    enc.encode_padding_values(self.n_values - g.ploidy(), self.tag);
                }
            }
            FormatStrategy::Ft => {
                for bytes in &self.strings {
                    // preprocess filled every slot
                    let bytes = bytes.as_deref().unwrap_or(b"PASS");
                    enc.encode_raw_string(bytes, self.n_values);
                }
            }
            FormatStrategy::Dp | FormatStrategy::Gq => {
                for g in &vc.genotypes {
                    let v = if matches!(self.strategy, FormatStrategy::Dp) {
                        g.dp
                    } else {
                        g.gq
                    };
                    match v {
                        Some(v) => enc.encode_raw_int(v, self.tag)?,
                        None => enc.encode_raw_missing(self.tag),
                    }
                }
            }
            FormatStrategy::Ad | FormatStrategy::Pl => {
                for g in &vc.genotypes {
                    let vs = if matches!(self.strategy, FormatStrategy::Ad) {
                        &g.ad
                    } else {
                        &g.pl
                    };
                    let written = match vs {
                        Some(vs) => {
                            for v in vs {
                                enc.encode_raw_int(*v, self.tag)?;
                            }
                            vs.len()
                        }
                        None => 0,
                    };
                    enc.encode_padding_values(self.n_values - written, self.tag);
                }
            }
            FormatStrategy::AtomicInt => {
                for g in &vc.genotypes {
                    match self.int_attr(g)? {
                        Some(v) => enc.encode_raw_int(v, self.tag)?,
                        None => enc.encode_raw_missing(self.tag),
                    }
                }
            }
            FormatStrategy::AtomicFloat => {
                for g in &vc.genotypes {
                    match attr(g, &self.key) {
                        Some(AttrValue::Float(v)) => enc.encode_raw_float(*v),
                        None => enc.encode_raw_missing(TypeTag::Float),
                        Some(other) => return self.incompatible(other),
                    }
                }
            }
            FormatStrategy::VecInt => {
                for g in &vc.genotypes {
                    match attr(g, &self.key) {
                        Some(AttrValue::Ints(vs)) => {
                            enc.encode_raw_ints(vs, self.n_values, self.tag)?
                        }
                        Some(AttrValue::Int(v)) => {
                            enc.encode_raw_int(*v, self.tag)?;
                            enc.encode_padding_values(self.n_values - 1, self.tag);
                        }
                        None => enc.encode_padding_values(self.n_values, self.tag),
                        Some(other) => return self.incompatible(other),
                    }
                }
            }
            FormatStrategy::VecFloat => {
                for g in &vc.genotypes {
                    match attr(g, &self.key) {
                        Some(AttrValue::Floats(vs)) => enc.encode_raw_floats(vs, self.n_values),
                        Some(AttrValue::Float(v)) => {
                            enc.encode_raw_float(*v);
                            enc.encode_padding_values(self.n_values - 1, TypeTag::Float);
                        }
                        None => enc.encode_padding_values(self.n_values, TypeTag::Float),
                        Some(other) => return self.incompatible(other),
                    }
                }
            }
            FormatStrategy::Char | FormatStrategy::Str => {
                for bytes in &self.strings {
                    match bytes {
                        Some(bytes) => enc.encode_raw_string(bytes, self.n_values),
                        None => enc.encode_raw_missing_values(self.n_values, TypeTag::Char),
                    }
                }
            }
        }
        Ok(())
    }

    fn int_attr(&self, g: &SampleGenotype) -> Result<Option<i32>> {
        match attr(g, &self.key) {
            None => Ok(None),
            Some(AttrValue::Int(v)) => Ok(Some(*v)),
            Some(other) => Err(PhysaliaError::IncompatibleValue(format!(
                "FORMAT {}: value {other:?} does not match the declared type",
                self.key
            ))),
        }
    }

    fn incompatible(&self, value: &AttrValue) -> Result<()> {
        Err(PhysaliaError::IncompatibleValue(format!(
            "FORMAT {}: value {value:?} does not match the declared type",
            self.key
        )))
    }
}

/// Look up a genotype attribute, treating an explicit `Missing` as absent.
fn attr<'a>(g: &'a SampleGenotype, key: &str) -> Option<&'a AttrValue> {
    g.attribute(key).filter(|v| !v.is_missing())
}

/// Resolve a declared count against a record's shape; `None` = unbounded.
fn bound_for(count: FieldCount, vc: &VariantCall) -> Option<usize> {
    count.resolve(vc.n_alleles(), vc.max_ploidy(2))
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// The per-stream table of field writers, one per INFO/FORMAT header line.
#[derive(Debug)]
pub struct FieldWriterManager {
    info: HashMap<String, InfoFieldWriter>,
    format: HashMap<String, FormatFieldWriter>,
}

impl FieldWriterManager {
    pub fn new(schema: &BcfSchema) -> Result<Self> {
        let mut info = HashMap::with_capacity(schema.info.len());
        for (id, field) in &schema.info {
            info.insert(id.clone(), InfoFieldWriter::new(field)?);
        }
        let mut format = HashMap::with_capacity(schema.format.len());
        for (id, field) in &schema.format {
            format.insert(id.clone(), FormatFieldWriter::new(field)?);
        }
        Ok(Self { info, format })
    }

    pub fn info_writer(&self, key: &str) -> Result<&InfoFieldWriter> {
        self.info.get(key).ok_or_else(|| {
            PhysaliaError::InvalidHeader(format!("INFO field {key} not declared in header"))
        })
    }

    pub fn format_writer_mut(&mut self, key: &str) -> Result<&mut FormatFieldWriter> {
        self.format.get_mut(key).ok_or_else(|| {
            PhysaliaError::InvalidHeader(format!("FORMAT field {key} not declared in header"))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
