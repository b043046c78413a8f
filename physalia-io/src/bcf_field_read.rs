//! Per-field BCF2 decoders for INFO and FORMAT data.
//!
//! Decoding is inspection-driven: after reading a field's typed dictionary
//! key, the header schema picks the strategy, which then reads one typing
//! byte and the payload. INFO fields materialize a single [`AttrValue`];
//! FORMAT fields materialize sample-major rows into the per-sample
//! genotypes, with the standard keys (GT, FT, DP, GQ, AD, PL) routed to the
//! genotype's inline fields instead of its attribute map.

use physalia_core::{PhysaliaError, Result};
use physalia_omics::{AttrValue, SampleGenotype};

use crate::bcf_schema::{BcfSchema, FieldCount, FieldSchema, FieldType};
use crate::bcf_typed::{
    Bcf2Decoder, BcfVersion, TypeTag, FLOAT_EOV_BITS, FLOAT_MISSING_BITS,
};

/// Read a typed dictionary-offset key (a single typed integer).
pub fn read_dictionary_key(dec: &mut Bcf2Decoder) -> Result<u32> {
    let (n, tag) = dec.read_type_descriptor()?;
    if n != 1 || !tag.is_int() {
        return Err(PhysaliaError::InvalidTyping(format!(
            "dictionary key must be a single integer, found {n} x {tag:?}"
        )));
    }
    let offset = dec.decode_int(tag)?;
    if offset < 0 {
        return Err(PhysaliaError::MalformedRecord(format!(
            "negative dictionary offset {offset}"
        )));
    }
    Ok(offset as u32)
}

// ---------------------------------------------------------------------------
// INFO decoding
// ---------------------------------------------------------------------------

/// Decode one INFO value according to its header schema.
pub fn decode_info_value(
    dec: &mut Bcf2Decoder,
    field: &FieldSchema,
    version: BcfVersion,
) -> Result<AttrValue> {
    let (size, tag) = dec.read_type_descriptor()?;

    // A flag is present by virtue of being encoded at all; legacy writers
    // emit anything from a missing INT8 to a literal 1
    if field.value_type == FieldType::Flag {
        dec.decode_raw_bytes(size * tag.size_bytes())?;
        return Ok(AttrValue::Flag(true));
    }

    if size == 0 {
        return Ok(AttrValue::Missing);
    }

    match field.value_type {
        FieldType::Integer => {
            if !tag.is_int() {
                return Err(type_mismatch(field, tag));
            }
            let mut values = Vec::with_capacity(size);
            for _ in 0..size {
                values.push(dec.decode_int(tag)?);
            }
            trim_int_padding(&mut values, tag, version);
            if scalar_shaped(field) {
                match values.first() {
                    None => Ok(AttrValue::Missing),
                    Some(v) if tag.is_missing_int(*v) => Ok(AttrValue::Missing),
                    Some(v) => Ok(AttrValue::Int(*v)),
                }
            } else {
                Ok(AttrValue::Ints(
                    values
                        .into_iter()
                        .map(|v| (!tag.is_missing_int(v)).then_some(v))
                        .collect(),
                ))
            }
        }
        FieldType::Float => {
            if tag != TypeTag::Float {
                return Err(type_mismatch(field, tag));
            }
            let mut values = Vec::with_capacity(size);
            for _ in 0..size {
                values.push(dec.decode_float()?);
            }
            trim_float_padding(&mut values, version);
            if scalar_shaped(field) {
                match values.first() {
                    None => Ok(AttrValue::Missing),
                    Some(v) if f32_is_missing(*v) => Ok(AttrValue::Missing),
                    Some(v) => Ok(AttrValue::Float(*v)),
                }
            } else {
                Ok(AttrValue::Floats(
                    values
                        .into_iter()
                        .map(|v| (!f32_is_missing(v)).then_some(v))
                        .collect(),
                ))
            }
        }
        FieldType::Character => {
            if tag != TypeTag::Char {
                return Err(type_mismatch(field, tag));
            }
            let s = char_payload(dec, size)?;
            Ok(AttrValue::String(s))
        }
        FieldType::Str => {
            if tag != TypeTag::Char {
                return Err(type_mismatch(field, tag));
            }
            let s = char_payload(dec, size)?;
            Ok(unpack_string(s, field, version))
        }
        FieldType::Flag => unreachable!("handled above"),
    }
}

// ---------------------------------------------------------------------------
// FORMAT decoding
// ---------------------------------------------------------------------------

/// Strategy selector for one FORMAT field, mirroring the writer dispatch.
#[derive(Debug, Clone, Copy)]
enum FormatDecoder {
    Gt,
    Ft,
    Dp,
    Gq,
    Ad,
    Pl,
    Int,
    Float,
    Char,
    Str,
}

impl FormatDecoder {
    fn for_field(field: &FieldSchema) -> Self {
        match field.id.as_str() {
            "GT" => FormatDecoder::Gt,
            "FT" => FormatDecoder::Ft,
            "DP" => FormatDecoder::Dp,
            "GQ" => FormatDecoder::Gq,
            "AD" => FormatDecoder::Ad,
            "PL" => FormatDecoder::Pl,
            _ => match field.value_type {
                FieldType::Integer => FormatDecoder::Int,
                FieldType::Float => FormatDecoder::Float,
                FieldType::Character => FormatDecoder::Char,
                _ => FormatDecoder::Str,
            },
        }
    }
}

/// Decode an entire genotype block: `n_format` fields of `n_samples` rows.
///
/// Returns the record's FORMAT key order and the materialized genotypes.
pub fn decode_genotype_block(
    dec: &mut Bcf2Decoder,
    schema: &BcfSchema,
    n_format: usize,
    n_samples: usize,
) -> Result<(Vec<String>, Vec<SampleGenotype>)> {
    let mut format = Vec::with_capacity(n_format);
    let mut genotypes = vec![SampleGenotype::default(); n_samples];

    for _ in 0..n_format {
        let offset = read_dictionary_key(dec)?;
        let key = schema.strings.get(offset).ok_or_else(|| {
            PhysaliaError::InvalidHeader(format!("dictionary offset {offset} is unassigned"))
        })?;
        let field = schema.format_field(key).ok_or_else(|| {
            PhysaliaError::InvalidHeader(format!("FORMAT field {key} not declared in header"))
        })?;
        decode_format_field(dec, field, schema.version, &mut genotypes)?;
        format.push(field.id.clone());
    }

    Ok((format, genotypes))
}

/// Decode one FORMAT field's sample-major payload into the genotypes.
pub fn decode_format_field(
    dec: &mut Bcf2Decoder,
    field: &FieldSchema,
    version: BcfVersion,
    genotypes: &mut [SampleGenotype],
) -> Result<()> {
    let (n_values, tag) = dec.read_type_descriptor()?;
    let decoder = FormatDecoder::for_field(field);

    match decoder {
        FormatDecoder::Gt => {
            if !tag.is_int() {
                return Err(type_mismatch(field, tag));
            }
            for g in genotypes.iter_mut() {
                decode_gt_row(dec, tag, n_values, g)?;
            }
        }
        FormatDecoder::Dp | FormatDecoder::Gq => {
            if !tag.is_int() {
                return Err(type_mismatch(field, tag));
            }
            for g in genotypes.iter_mut() {
                let mut value = None;
                for i in 0..n_values {
                    let v = dec.decode_int(tag)?;
                    if i == 0 && !tag.is_missing_int(v) && !tag.is_eov_int(v) {
                        value = Some(v);
                    }
                }
                match decoder {
                    FormatDecoder::Dp => g.dp = value,
                    _ => g.gq = value,
                }
            }
        }
        FormatDecoder::Ad | FormatDecoder::Pl => {
            if !tag.is_int() {
                return Err(type_mismatch(field, tag));
            }
            for g in genotypes.iter_mut() {
                let values = int_row_prefix(dec, tag, n_values)?;
                let values = (!values.is_empty()).then_some(values);
                match decoder {
                    FormatDecoder::Ad => g.ad = values,
                    _ => g.pl = values,
                }
            }
        }
        FormatDecoder::Ft => {
            if tag != TypeTag::Char {
                return Err(type_mismatch(field, tag));
            }
            for g in genotypes.iter_mut() {
                let s = char_payload(dec, n_values)?;
                g.filters = (!s.is_empty()).then_some(s);
            }
        }
        FormatDecoder::Int => {
            if !tag.is_int() {
                return Err(type_mismatch(field, tag));
            }
            for g in genotypes.iter_mut() {
                let mut values = Vec::with_capacity(n_values);
                for _ in 0..n_values {
                    values.push(dec.decode_int(tag)?);
                }
                trim_int_padding(&mut values, tag, version);
                if values.is_empty() {
                    continue;
                }
                let value = if scalar_shaped(field) {
                    if tag.is_missing_int(values[0]) {
                        continue;
                    }
                    AttrValue::Int(values[0])
                } else {
                    AttrValue::Ints(
                        values
                            .into_iter()
                            .map(|v| (!tag.is_missing_int(v)).then_some(v))
                            .collect(),
                    )
                };
                g.attributes.push((field.id.clone(), value));
            }
        }
        FormatDecoder::Float => {
            if tag != TypeTag::Float {
                return Err(type_mismatch(field, tag));
            }
            for g in genotypes.iter_mut() {
                let mut values = Vec::with_capacity(n_values);
                for _ in 0..n_values {
                    values.push(dec.decode_float()?);
                }
                trim_float_padding(&mut values, version);
                if values.is_empty() {
                    continue;
                }
                let value = if scalar_shaped(field) {
                    if f32_is_missing(values[0]) {
                        continue;
                    }
                    AttrValue::Float(values[0])
                } else {
                    AttrValue::Floats(
                        values
                            .into_iter()
                            .map(|v| (!f32_is_missing(v)).then_some(v))
                            .collect(),
                    )
                };
                g.attributes.push((field.id.clone(), value));
            }
        }
        FormatDecoder::Char => {
            if tag != TypeTag::Char {
                return Err(type_mismatch(field, tag));
            }
            for g in genotypes.iter_mut() {
                let s = char_payload(dec, n_values)?;
                if !s.is_empty() {
                    g.attributes.push((field.id.clone(), AttrValue::String(s)));
                }
            }
        }
        FormatDecoder::Str => {
            if tag != TypeTag::Char {
                return Err(type_mismatch(field, tag));
            }
            for g in genotypes.iter_mut() {
                let s = char_payload(dec, n_values)?;
                if !s.is_empty() {
                    g.attributes
                        .push((field.id.clone(), unpack_string(s, field, version)));
                }
            }
        }
    }
    Ok(())
}

/// Decode one sample's GT row: ploidy is the prefix before the first
/// sentinel, each allele is `(raw >> 1) - 1` with the low bit carrying the
/// inter-allele phase.
fn decode_gt_row(
    dec: &mut Bcf2Decoder,
    tag: TypeTag,
    n_values: usize,
    g: &mut SampleGenotype,
) -> Result<()> {
    let mut alleles = Vec::with_capacity(n_values);
    let mut phased = n_values > 1;
    let mut ended = false;
    for i in 0..n_values {
        let raw = dec.decode_int(tag)?;
        if ended {
            continue;
        }
        if tag.is_missing_int(raw) || tag.is_eov_int(raw) {
            ended = true;
            continue;
        }
        let idx = (raw >> 1) - 1;
        alleles.push((idx >= 0).then_some(idx as usize));
        if i > 0 && raw & 1 == 0 {
            phased = false;
        }
    }
    g.phased = phased && alleles.len() > 1;
    g.alleles = alleles;
    Ok(())
}

/// Read an integer row, keeping the prefix before the first sentinel.
fn int_row_prefix(dec: &mut Bcf2Decoder, tag: TypeTag, n_values: usize) -> Result<Vec<i32>> {
    let mut values = Vec::with_capacity(n_values);
    let mut ended = false;
    for _ in 0..n_values {
        let v = dec.decode_int(tag)?;
        if ended || tag.is_missing_int(v) || tag.is_eov_int(v) {
            ended = true;
            continue;
        }
        values.push(v);
    }
    Ok(values)
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn scalar_shaped(field: &FieldSchema) -> bool {
    field.count == FieldCount::Fixed(1)
}

fn type_mismatch(field: &FieldSchema, tag: TypeTag) -> PhysaliaError {
    PhysaliaError::InvalidTyping(format!(
        "field {}: wire type {tag:?} does not match the declared {:?}",
        field.id, field.value_type
    ))
}

fn char_payload(dec: &mut Bcf2Decoder, size: usize) -> Result<String> {
    let bytes = dec.decode_raw_bytes(size)?;
    let s = std::str::from_utf8(bytes)
        .map_err(|_| PhysaliaError::MalformedRecord("invalid UTF-8 in CHAR payload".into()))?;
    Ok(s.trim_end_matches('\0').to_string())
}

/// Drop trailing vector padding: EOV always, and in v2.1 also trailing
/// missing sentinels (v2.1 pads with missing, so a trailing missing run is
/// indistinguishable from padding).
fn trim_int_padding(values: &mut Vec<i32>, tag: TypeTag, version: BcfVersion) {
    while let Some(&last) = values.last() {
        if tag.is_eov_int(last) || (version.minor <= 1 && tag.is_missing_int(last)) {
            values.pop();
        } else {
            break;
        }
    }
}

fn trim_float_padding(values: &mut Vec<f32>, version: BcfVersion) {
    while let Some(&last) = values.last() {
        if f32_is_eov(last) || (version.minor <= 1 && f32_is_missing(last)) {
            values.pop();
        } else {
            break;
        }
    }
}

fn f32_is_missing(v: f32) -> bool {
    v.to_bits() == FLOAT_MISSING_BITS
}

fn f32_is_eov(v: f32) -> bool {
    v.to_bits() == FLOAT_EOV_BITS
}

/// Reverse the version-specific multi-string packing.
///
/// v2.1 collapsed lists always start with a comma, so they split without
/// ambiguity. In v2.2 a payload splits only when the schema admits more
/// than one value; a `Number=1` string keeps embedded commas intact.
fn unpack_string(s: String, field: &FieldSchema, version: BcfVersion) -> AttrValue {
    if version.minor <= 1 {
        if let Some(rest) = s.strip_prefix(',') {
            return AttrValue::Strings(rest.split(',').map(str::to_string).collect());
        }
        return AttrValue::String(s);
    }
    if !scalar_shaped(field) && s.contains(',') {
        AttrValue::Strings(s.split(',').map(str::to_string).collect())
    } else {
        AttrValue::String(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bcf_field_write::FieldWriterManager;
    use crate::bcf_typed::Bcf2Encoder;
    use crate::vcf_header::VcfHeader;
    use physalia_omics::VariantCall;

    fn decoder_for(bytes: Vec<u8>) -> Bcf2Decoder {
        let mut d = Bcf2Decoder::new();
        d.set_block(bytes);
        d
    }

    fn site(alts: &[&str]) -> VariantCall {
        VariantCall::new(
            "chr1",
            100,
            b"A".to_vec(),
            alts.iter().map(|a| a.as_bytes().to_vec()).collect(),
        )
        .unwrap()
    }

    /// Encode one INFO value with the writer stack and decode it back.
    fn info_roundtrip(
        header: &VcfHeader,
        version: BcfVersion,
        vc: &VariantCall,
        key: &str,
        value: &AttrValue,
    ) -> AttrValue {
        let schema = BcfSchema::build(header, version).unwrap();
        let manager = FieldWriterManager::new(&schema).unwrap();
        let mut enc = Bcf2Encoder::new(version);
        manager
            .info_writer(key)
            .unwrap()
            .encode(vc, value, &mut enc)
            .unwrap();
        let mut dec = decoder_for(enc.take_record_bytes());

        let offset = read_dictionary_key(&mut dec).unwrap();
        let name = schema.strings.get(offset).unwrap();
        let field = schema.info_field(name).unwrap();
        decode_info_value(&mut dec, field, version).unwrap()
    }

    /// Encode one FORMAT field and decode it back into fresh genotypes.
    fn format_roundtrip(
        header: &VcfHeader,
        version: BcfVersion,
        vc: &VariantCall,
        key: &str,
    ) -> Vec<SampleGenotype> {
        let schema = BcfSchema::build(header, version).unwrap();
        let mut manager = FieldWriterManager::new(&schema).unwrap();
        let mut enc = Bcf2Encoder::new(version);
        manager
            .format_writer_mut(key)
            .unwrap()
            .encode(vc, &mut enc)
            .unwrap();
        let mut dec = decoder_for(enc.take_record_bytes());

        let offset = read_dictionary_key(&mut dec).unwrap();
        let name = schema.strings.get(offset).unwrap().to_string();
        let field = schema.format_field(&name).unwrap();
        let mut genotypes = vec![SampleGenotype::default(); vc.genotypes.len()];
        decode_format_field(&mut dec, field, version, &mut genotypes).unwrap();
        genotypes
    }

    #[test]
    fn info_int_roundtrip() {
        let mut h = VcfHeader::new();
        h.add_info("DP", "1", "Integer", "Depth");
        let vc = site(&["G"]);
        assert_eq!(
            info_roundtrip(&h, BcfVersion::V2_2, &vc, "DP", &AttrValue::Int(30)),
            AttrValue::Int(30)
        );
        assert_eq!(
            info_roundtrip(&h, BcfVersion::V2_2, &vc, "DP", &AttrValue::Missing),
            AttrValue::Missing
        );
    }

    #[test]
    fn info_vector_roundtrip_both_versions() {
        let mut h = VcfHeader::new();
        h.add_info("AC", "A", "Integer", "Allele count");
        let vc = site(&["G", "T"]); // bound 2
        let value = AttrValue::Ints(vec![Some(5)]);

        // The padding element is stripped again on decode in both versions
        for version in [BcfVersion::V2_1, BcfVersion::V2_2] {
            assert_eq!(
                info_roundtrip(&h, version, &vc, "AC", &value),
                value,
                "{version}"
            );
        }
    }

    #[test]
    fn info_vector_interior_missing_preserved() {
        let mut h = VcfHeader::new();
        h.add_info("AC", "A", "Integer", "Allele count");
        let vc = site(&["G", "T"]);
        let value = AttrValue::Ints(vec![None, Some(7)]);
        assert_eq!(info_roundtrip(&h, BcfVersion::V2_2, &vc, "AC", &value), value);
    }

    #[test]
    fn info_float_vector_roundtrip() {
        let mut h = VcfHeader::new();
        h.add_info("AF", "A", "Float", "Frequencies");
        let vc = site(&["G", "T"]);
        let value = AttrValue::Floats(vec![Some(0.25), Some(0.5)]);
        assert_eq!(info_roundtrip(&h, BcfVersion::V2_2, &vc, "AF", &value), value);
    }

    #[test]
    fn info_flag_materializes_true() {
        let mut h = VcfHeader::new();
        h.add_info("DB", "0", "Flag", "Membership");
        let vc = site(&["G"]);
        assert_eq!(
            info_roundtrip(&h, BcfVersion::V2_2, &vc, "DB", &AttrValue::Flag(true)),
            AttrValue::Flag(true)
        );
        // Even a missing-encoded flag decodes as present
        assert_eq!(
            info_roundtrip(&h, BcfVersion::V2_2, &vc, "DB", &AttrValue::Flag(false)),
            AttrValue::Flag(true)
        );
    }

    #[test]
    fn info_multi_string_roundtrip_both_versions() {
        let mut h = VcfHeader::new();
        h.add_info("EFFECT", ".", "String", "Effects");
        let vc = site(&["G"]);
        let value = AttrValue::Strings(vec!["mis".into(), "non".into()]);
        for version in [BcfVersion::V2_1, BcfVersion::V2_2] {
            assert_eq!(
                info_roundtrip(&h, version, &vc, "EFFECT", &value),
                value,
                "{version}"
            );
        }
    }

    #[test]
    fn info_single_string_with_comma_kept_whole() {
        let mut h = VcfHeader::new();
        h.add_info("NOTE", "1", "String", "Free text");
        let vc = site(&["G"]);
        let value = AttrValue::String("a,b".into());
        assert_eq!(info_roundtrip(&h, BcfVersion::V2_2, &vc, "NOTE", &value), value);
    }

    #[test]
    fn gt_row_roundtrip() {
        let mut h = VcfHeader::new();
        h.add_format("GT", "1", "String", "Genotype");
        h.add_sample("S0");
        h.add_sample("S1");
        h.add_sample("S2");
        let mut vc = site(&["T"]);
        vc.format = vec!["GT".into()];
        vc.genotypes = vec![
            SampleGenotype::diploid(0, 1),
            SampleGenotype::diploid_phased(1, 1),
            SampleGenotype::new(vec![None, None], false),
        ];
        let decoded = format_roundtrip(&h, BcfVersion::V2_2, &vc, "GT");
        assert_eq!(decoded[0].alleles, vec![Some(0), Some(1)]);
        assert!(!decoded[0].phased);
        assert_eq!(decoded[1].alleles, vec![Some(1), Some(1)]);
        assert!(decoded[1].phased);
        assert_eq!(decoded[2].alleles, vec![None, None]);
        assert!(!decoded[2].phased);
    }

    #[test]
    fn gt_ploidy_detected_from_padding() {
        let mut h = VcfHeader::new();
        h.add_format("GT", "1", "String", "Genotype");
        h.add_sample("S0");
        h.add_sample("S1");
        let mut vc = site(&["T"]);
        vc.format = vec!["GT".into()];
        vc.genotypes = vec![
            SampleGenotype::new(vec![Some(0), Some(1), Some(1)], false),
            SampleGenotype::new(vec![Some(1)], false),
        ];
        for version in [BcfVersion::V2_1, BcfVersion::V2_2] {
            let decoded = format_roundtrip(&h, version, &vc, "GT");
            assert_eq!(decoded[0].ploidy(), 3, "{version}");
            assert_eq!(decoded[1].alleles, vec![Some(1)], "{version}");
            assert!(!decoded[1].phased);
        }
    }

    #[test]
    fn dp_gq_inline_fields() {
        let mut h = VcfHeader::new();
        h.add_format("DP", "1", "Integer", "Depth");
        h.add_format("GQ", "1", "Integer", "Quality");
        h.add_sample("S0");
        h.add_sample("S1");
        let mut vc = site(&["T"]);
        vc.format = vec!["DP".into(), "GQ".into()];
        vc.genotypes = vec![
            SampleGenotype {
                dp: Some(33),
                gq: Some(99),
                ..SampleGenotype::diploid(0, 1)
            },
            SampleGenotype::absent(),
        ];
        let decoded = format_roundtrip(&h, BcfVersion::V2_2, &vc, "DP");
        assert_eq!(decoded[0].dp, Some(33));
        assert_eq!(decoded[1].dp, None);

        let decoded = format_roundtrip(&h, BcfVersion::V2_2, &vc, "GQ");
        assert_eq!(decoded[0].gq, Some(99));
        assert_eq!(decoded[1].gq, None);
    }

    #[test]
    fn ad_pl_inline_vectors() {
        let mut h = VcfHeader::new();
        h.add_format("AD", "R", "Integer", "Allele depths");
        h.add_format("PL", "G", "Integer", "Likelihoods");
        h.add_sample("S0");
        h.add_sample("S1");
        let mut vc = site(&["T"]);
        vc.format = vec!["AD".into(), "PL".into()];
        vc.genotypes = vec![
            SampleGenotype {
                ad: Some(vec![12, 8]),
                pl: Some(vec![50, 0, 180]),
                ..SampleGenotype::diploid(0, 1)
            },
            SampleGenotype::absent(),
        ];
        for version in [BcfVersion::V2_1, BcfVersion::V2_2] {
            let decoded = format_roundtrip(&h, version, &vc, "AD");
            assert_eq!(decoded[0].ad, Some(vec![12, 8]), "{version}");
            assert_eq!(decoded[1].ad, None);

            let decoded = format_roundtrip(&h, version, &vc, "PL");
            assert_eq!(decoded[0].pl, Some(vec![50, 0, 180]), "{version}");
            assert_eq!(decoded[1].pl, None);
        }
    }

    #[test]
    fn ft_strings_roundtrip() {
        let mut h = VcfHeader::new();
        h.add_format("FT", "1", "String", "Filters");
        h.add_sample("S0");
        h.add_sample("S1");
        let mut vc = site(&["T"]);
        vc.format = vec!["FT".into()];
        vc.genotypes = vec![
            SampleGenotype {
                filters: Some("q10".into()),
                ..SampleGenotype::diploid(0, 1)
            },
            SampleGenotype::diploid(0, 0),
        ];
        let decoded = format_roundtrip(&h, BcfVersion::V2_2, &vc, "FT");
        assert_eq!(decoded[0].filters.as_deref(), Some("q10"));
        // An unfiltered genotype was written as literal PASS
        assert_eq!(decoded[1].filters.as_deref(), Some("PASS"));
    }

    #[test]
    fn generic_format_attributes_roundtrip() {
        let mut h = VcfHeader::new();
        h.add_format("HQ", "2", "Integer", "Haplotype qualities");
        h.add_format("GL", "G", "Float", "Log likelihoods");
        h.add_sample("S0");
        h.add_sample("S1");
        let mut vc = site(&["T"]);
        vc.format = vec!["HQ".into(), "GL".into()];
        vc.genotypes = vec![
            SampleGenotype {
                attributes: vec![
                    ("HQ".into(), AttrValue::Ints(vec![Some(40), Some(22)])),
                    (
                        "GL".into(),
                        AttrValue::Floats(vec![Some(-0.1), Some(-1.5), Some(-9.0)]),
                    ),
                ],
                ..SampleGenotype::diploid(0, 1)
            },
            SampleGenotype::diploid(0, 0),
        ];
        let decoded = format_roundtrip(&h, BcfVersion::V2_2, &vc, "HQ");
        assert_eq!(
            decoded[0].attribute("HQ"),
            Some(&AttrValue::Ints(vec![Some(40), Some(22)]))
        );
        // The sample without the field stays without it
        assert_eq!(decoded[1].attribute("HQ"), None);

        let decoded = format_roundtrip(&h, BcfVersion::V2_2, &vc, "GL");
        assert_eq!(
            decoded[0].attribute("GL"),
            Some(&AttrValue::Floats(vec![Some(-0.1), Some(-1.5), Some(-9.0)]))
        );
    }

    #[test]
    fn wire_type_mismatch_rejected() {
        let mut h = VcfHeader::new();
        h.add_info("DP", "1", "Integer", "Depth");
        let schema = BcfSchema::build(&h, BcfVersion::V2_2).unwrap();
        let field = schema.info_field("DP").unwrap();
        // A float payload under an Integer schema
        let mut dec = decoder_for(vec![0x15, 0, 0, 0x80, 0x3F]);
        assert!(matches!(
            decode_info_value(&mut dec, field, BcfVersion::V2_2),
            Err(PhysaliaError::InvalidTyping(_))
        ));
    }

    #[test]
    fn bad_dictionary_key_rejected() {
        // A float cannot be a dictionary key
        let mut dec = decoder_for(vec![0x15, 0, 0, 0, 0]);
        assert!(matches!(
            read_dictionary_key(&mut dec),
            Err(PhysaliaError::InvalidTyping(_))
        ));
    }
}
