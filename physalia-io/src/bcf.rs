//! BCF (Binary Call Format) reader.
//!
//! BCF2 is the binary encoding of VCF: a `BCF\x02` prologue embedding the
//! text VCF header, then per record a sites block and a genotypes block,
//! each length-prefixed. Site data decodes eagerly; the genotypes block is
//! kept as a raw byte slab and decoded only when a caller first asks for
//! genotypes.
//!
//! [`BcfReader`] consumes an uncompressed byte stream; `.bcf` files on disk
//! are BGZF-compressed, which [`read_bcf`] and [`bcf_stats`] handle.

use std::cell::{OnceCell, RefCell};
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use physalia_core::{PhysaliaError, Result};
use physalia_omics::{SampleGenotype, VariantCall, VariantFilter};

use crate::bcf_field_read::{decode_genotype_block, decode_info_value, read_dictionary_key};
use crate::bcf_schema::BcfSchema;
use crate::bcf_typed::{with_context, Bcf2Decoder, BcfVersion, TypeTag, FLOAT_MISSING_BITS};
use crate::bgzf;
use crate::vcf_header::VcfHeader;

/// Sanity cap on the embedded header length (8 MiB).
const MAX_HEADER_SIZE: usize = 0x0800_0000;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One decoded BCF record: eager site data plus a lazily decoded genotype
/// block.
///
/// The genotype slab is owned by the record and freed once decoded; repeated
/// accessor calls return the cached result.
#[derive(Debug)]
pub struct BcfRecord {
    call: VariantCall,
    lazy: Option<LazyGenotypes>,
}

#[derive(Debug)]
struct LazyGenotypes {
    schema: Arc<BcfSchema>,
    n_format: usize,
    n_samples: usize,
    slab: RefCell<Option<Vec<u8>>>,
    decoded: OnceCell<(Vec<String>, Vec<SampleGenotype>)>,
}

impl LazyGenotypes {
    fn force(&self) -> Result<&(Vec<String>, Vec<SampleGenotype>)> {
        if let Some(decoded) = self.decoded.get() {
            return Ok(decoded);
        }
        let slab = self.slab.borrow_mut().take().unwrap_or_default();
        let mut dec = Bcf2Decoder::new();
        dec.set_block(slab);
        let block = decode_genotype_block(&mut dec, &self.schema, self.n_format, self.n_samples)?;
        Ok(self.decoded.get_or_init(|| block))
    }
}

impl BcfRecord {
    /// The site-level data (genotypes and format keys are empty here; use
    /// [`BcfRecord::genotypes`] or [`BcfRecord::into_variant_call`]).
    pub fn call(&self) -> &VariantCall {
        &self.call
    }

    /// Number of per-sample genotype entries carried by this record.
    pub fn n_samples(&self) -> usize {
        self.lazy.as_ref().map_or(0, |l| l.n_samples)
    }

    /// True once the genotype block has been decoded.
    pub fn genotypes_decoded(&self) -> bool {
        self.lazy.as_ref().map_or(true, |l| l.decoded.get().is_some())
    }

    /// The per-sample genotypes, decoding the block on first access.
    pub fn genotypes(&self) -> Result<&[SampleGenotype]> {
        match &self.lazy {
            None => Ok(&[]),
            Some(lazy) => Ok(&lazy.force()?.1),
        }
    }

    /// The record's FORMAT keys in wire order, decoding on first access.
    pub fn format_keys(&self) -> Result<&[String]> {
        match &self.lazy {
            None => Ok(&[]),
            Some(lazy) => Ok(&lazy.force()?.0),
        }
    }

    /// Materialize the full variant call, decoding genotypes if needed.
    pub fn into_variant_call(self) -> Result<VariantCall> {
        let mut call = self.call;
        if let Some(lazy) = self.lazy {
            lazy.force()?;
            if let Some((format, genotypes)) = lazy.decoded.into_inner() {
                call.format = format;
                call.genotypes = genotypes;
            }
        }
        Ok(call)
    }
}

// ---------------------------------------------------------------------------
// Stream reader
// ---------------------------------------------------------------------------

/// Streaming BCF2 reader over an uncompressed byte source.
#[derive(Debug)]
pub struct BcfReader<R: Read> {
    input: R,
    version: BcfVersion,
    header: VcfHeader,
    schema: Arc<BcfSchema>,
    decoder: Bcf2Decoder,
    record_no: usize,
    stream_pos: u64,
}

impl<R: Read> BcfReader<R> {
    /// Parse the prologue (magic, version, embedded header) and build the
    /// dictionaries and schema tables.
    pub fn new(mut input: R) -> Result<Self> {
        let version = BcfVersion::read(&mut input)?.validate()?;

        let mut len_bytes = [0u8; 4];
        input.read_exact(&mut len_bytes).map_err(|e| {
            PhysaliaError::InvalidHeader(format!("truncated header length: {e}"))
        })?;
        let header_len = u32::from_le_bytes(len_bytes) as usize;
        if header_len == 0 || header_len > MAX_HEADER_SIZE {
            return Err(PhysaliaError::InvalidHeader(format!(
                "header length {header_len} outside (0, {MAX_HEADER_SIZE}]"
            )));
        }

        let mut text = vec![0u8; header_len];
        input.read_exact(&mut text).map_err(|e| {
            PhysaliaError::InvalidHeader(format!("truncated embedded header: {e}"))
        })?;
        let nul = text.iter().position(|&b| b == 0).ok_or_else(|| {
            PhysaliaError::InvalidHeader("embedded header is not NUL-terminated".into())
        })?;
        let text = std::str::from_utf8(&text[..nul]).map_err(|_| {
            PhysaliaError::InvalidHeader("embedded header is not valid UTF-8".into())
        })?;

        let header = VcfHeader::parse(text)?;
        let schema = BcfSchema::build(&header, version)?;

        Ok(Self {
            input,
            version,
            header,
            schema,
            decoder: Bcf2Decoder::new(),
            record_no: 0,
            stream_pos: 9 + header_len as u64,
        })
    }

    pub fn version(&self) -> BcfVersion {
        self.version
    }

    pub fn header(&self) -> &VcfHeader {
        &self.header
    }

    pub fn schema(&self) -> &Arc<BcfSchema> {
        &self.schema
    }

    /// Read the next record, or `None` at a clean end of stream.
    pub fn read_record(&mut self) -> Result<Option<BcfRecord>> {
        let record_start = self.stream_pos;
        let Some(sites_size) = Bcf2Decoder::read_block_size(&mut self.input)? else {
            return Ok(None);
        };
        self.record_no += 1;
        let record_no = self.record_no;
        let ctx = move |e| {
            with_context(
                e,
                &format!("record {record_no} at byte offset {record_start}"),
            )
        };

        let genotypes_size = Bcf2Decoder::read_block_size(&mut self.input)
            .map_err(ctx)?
            .ok_or_else(|| {
                ctx(PhysaliaError::MalformedRecord(
                    "missing genotype block size".into(),
                ))
            })?;

        self.decoder
            .read_block(sites_size, &mut self.input)
            .map_err(ctx)?;
        let (call, n_format, n_samples) = self.decode_site().map_err(ctx)?;

        let mut slab = vec![0u8; genotypes_size];
        self.input.read_exact(&mut slab).map_err(|e| {
            ctx(PhysaliaError::MalformedRecord(format!(
                "truncated genotype block: {e}"
            )))
        })?;
        self.stream_pos += 8 + sites_size as u64 + genotypes_size as u64;

        let lazy = (n_samples > 0).then(|| LazyGenotypes {
            schema: Arc::clone(&self.schema),
            n_format,
            n_samples,
            slab: RefCell::new(Some(slab)),
            decoded: OnceCell::new(),
        });

        Ok(Some(BcfRecord { call, lazy }))
    }

    /// Iterator adapter over [`BcfReader::read_record`].
    pub fn records(&mut self) -> impl Iterator<Item = Result<BcfRecord>> + '_ {
        std::iter::from_fn(move || self.read_record().transpose())
    }

    /// Decode the sites block currently loaded in the decoder.
    fn decode_site(&mut self) -> Result<(VariantCall, usize, usize)> {
        let dec = &mut self.decoder;

        // Implicit untyped fields
        let contig_offset = dec.decode_int(TypeTag::Int32)?;
        if contig_offset < 0 {
            return Err(PhysaliaError::MalformedRecord(format!(
                "negative contig offset {contig_offset}"
            )));
        }
        let chrom = self
            .schema
            .contigs
            .get(contig_offset as u32)
            .ok_or_else(|| {
                PhysaliaError::MalformedRecord(format!(
                    "contig offset {contig_offset} is unassigned"
                ))
            })?
            .to_string();

        let pos0 = dec.decode_int(TypeTag::Int32)?;
        if pos0 < 0 {
            return Err(PhysaliaError::MalformedRecord(format!(
                "negative start position {pos0}"
            )));
        }
        let _ref_len = dec.decode_int(TypeTag::Int32)?;
        let qual = dec.decode_float()?;
        let quality =
            (!(qual.is_nan() || qual.to_bits() == FLOAT_MISSING_BITS)).then_some(qual);

        // Packed count words
        let word = dec.decode_int(TypeTag::Int32)? as u32;
        let n_alleles = (word >> 16) as usize;
        let n_info = (word & 0xFFFF) as usize;
        let word = dec.decode_int(TypeTag::Int32)? as u32;
        let n_format = (word >> 24) as usize;
        let n_samples = (word & 0x00FF_FFFF) as usize;

        if n_alleles < 1 {
            return Err(PhysaliaError::MalformedRecord(
                "record must carry at least the reference allele".into(),
            ));
        }
        if n_samples != self.schema.n_samples() {
            return Err(PhysaliaError::MalformedRecord(format!(
                "record has {n_samples} samples but the header declares {}",
                self.schema.n_samples()
            )));
        }

        let id = dec.decode_typed_string()?;

        // Alleles: REF first, all CHAR vectors
        let mut alleles: Vec<Vec<u8>> = Vec::with_capacity(n_alleles);
        for i in 0..n_alleles {
            let (size, tag) = dec.read_type_descriptor()?;
            if tag != TypeTag::Char {
                return Err(PhysaliaError::MalformedRecord(format!(
                    "allele {i} has type {tag:?}, expected CHAR"
                )));
            }
            let bytes = dec.decode_raw_bytes(size)?.to_vec();
            if i == 0 && bytes.is_empty() {
                return Err(PhysaliaError::MalformedRecord(
                    "reference allele must not be empty".into(),
                ));
            }
            alleles.push(bytes);
        }

        // FILTER offsets
        let offsets = dec.decode_typed_ints()?;
        let filter = if offsets.is_empty() {
            VariantFilter::Missing
        } else if offsets == [0] {
            VariantFilter::Pass
        } else {
            let mut names = Vec::with_capacity(offsets.len());
            for offset in offsets {
                if offset < 0 {
                    return Err(PhysaliaError::MalformedRecord(format!(
                        "negative filter offset {offset}"
                    )));
                }
                let name = self.schema.strings.get(offset as u32).ok_or_else(|| {
                    PhysaliaError::MalformedRecord(format!(
                        "filter offset {offset} is unassigned"
                    ))
                })?;
                names.push(name.to_string());
            }
            VariantFilter::Fail(names)
        };

        // INFO pairs
        let mut info = Vec::with_capacity(n_info);
        for _ in 0..n_info {
            let offset = read_dictionary_key(dec)?;
            let key = self.schema.strings.get(offset).ok_or_else(|| {
                PhysaliaError::InvalidHeader(format!("dictionary offset {offset} is unassigned"))
            })?;
            let field = self.schema.info_field(key).ok_or_else(|| {
                PhysaliaError::InvalidHeader(format!("INFO field {key} not declared in header"))
            })?;
            let value = decode_info_value(dec, field, self.version)?;
            info.push((field.id.clone(), value));
        }

        let mut alleles = alleles.into_iter();
        let ref_allele = alleles.next().ok_or_else(|| {
            PhysaliaError::MalformedRecord("missing reference allele".into())
        })?;
        let call = VariantCall {
            chrom,
            position: pos0 as u64 + 1,
            id,
            ref_allele,
            alt_alleles: alleles.collect(),
            quality,
            filter,
            info,
            format: Vec::new(),
            genotypes: Vec::new(),
        };
        Ok((call, n_format, n_samples))
    }
}

// ---------------------------------------------------------------------------
// Convenience API
// ---------------------------------------------------------------------------

/// Parse a BGZF-compressed BCF file into fully materialized variant calls.
pub fn read_bcf(path: impl AsRef<Path>) -> Result<Vec<VariantCall>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        PhysaliaError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    let data = bgzf::decompress_all(&mut BufReader::new(file))?;

    let mut reader = BcfReader::new(&data[..])?;
    let mut calls = Vec::new();
    while let Some(record) = reader.read_record()? {
        calls.push(record.into_variant_call()?);
    }
    Ok(calls)
}

/// Summary statistics over a BCF file.
#[derive(Debug, Clone)]
pub struct BcfStats {
    pub variant_count: u64,
    pub snv_count: u64,
    pub indel_count: u64,
    pub pass_count: u64,
    /// Chromosomes in order of first appearance.
    pub chromosomes: Vec<String>,
}

/// Compute variant statistics from a BCF file.
pub fn bcf_stats(path: impl AsRef<Path>) -> Result<BcfStats> {
    let calls = read_bcf(path)?;

    let mut snv_count = 0u64;
    let mut indel_count = 0u64;
    let mut pass_count = 0u64;
    let mut chroms = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for call in &calls {
        if call.is_snv() {
            snv_count += 1;
        }
        if call.is_indel() {
            indel_count += 1;
        }
        if call.filter == VariantFilter::Pass {
            pass_count += 1;
        }
        if seen.insert(call.chrom.clone()) {
            chroms.push(call.chrom.clone());
        }
    }

    Ok(BcfStats {
        variant_count: calls.len() as u64,
        snv_count,
        indel_count,
        pass_count,
        chromosomes: chroms,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bcf_typed::Bcf2Encoder;
    use crate::bcf_write::{write_bcf, write_bcf_bytes, BcfWriter};
    use physalia_omics::AttrValue;
    use std::io::Write;

    fn sample_header() -> VcfHeader {
        let mut h = VcfHeader::new();
        h.add_contig("chr1", Some(1000));
        h.add_contig("chr2", Some(2000));
        h.add_format("GT", "1", "String", "Genotype");
        h.add_format("DP", "1", "Integer", "Read depth");
        h.add_sample("S0");
        h.add_sample("S1");
        h
    }

    fn genotyped_record() -> VariantCall {
        let mut vc = VariantCall::new("chr1", 100, b"A".to_vec(), vec![b"G".to_vec()]).unwrap();
        vc.filter = VariantFilter::Pass;
        vc.format = vec!["GT".into(), "DP".into()];
        vc.genotypes = vec![
            SampleGenotype {
                dp: Some(20),
                ..SampleGenotype::diploid(0, 1)
            },
            SampleGenotype {
                dp: Some(31),
                ..SampleGenotype::diploid_phased(1, 1)
            },
        ];
        vc
    }

    fn raw_stream(header: &VcfHeader, calls: &[VariantCall]) -> Vec<u8> {
        let mut writer = BcfWriter::new(Vec::new(), header, BcfVersion::V2_2).unwrap();
        for call in calls {
            writer.write_record(call).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn header_only_stream() {
        let raw = raw_stream(&VcfHeader::new(), &[]);
        let mut reader = BcfReader::new(&raw[..]).unwrap();
        assert_eq!(reader.version(), BcfVersion::V2_2);
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn header_contents_roundtrip() {
        let raw = raw_stream(&sample_header(), &[]);
        let reader = BcfReader::new(&raw[..]).unwrap();
        assert_eq!(reader.header().contigs.len(), 2);
        assert_eq!(reader.header().samples, vec!["S0", "S1"]);
        assert_eq!(reader.schema().strings.get(0), Some("PASS"));
    }

    #[test]
    fn genotypes_decode_lazily_and_cache() {
        let raw = raw_stream(&sample_header(), &[genotyped_record()]);
        let mut reader = BcfReader::new(&raw[..]).unwrap();
        let record = reader.read_record().unwrap().unwrap();

        assert!(!record.genotypes_decoded());
        assert_eq!(record.n_samples(), 2);
        // Site data is available without touching the genotype block
        assert_eq!(record.call().chrom, "chr1");
        assert!(!record.genotypes_decoded());

        let genotypes = record.genotypes().unwrap();
        assert_eq!(genotypes.len(), 2);
        assert_eq!(genotypes[0].dp, Some(20));
        assert!(record.genotypes_decoded());

        // Second access returns the cached decode
        let again = record.genotypes().unwrap();
        assert_eq!(again[1].alleles, vec![Some(1), Some(1)]);
        assert!(again[1].phased);
        assert_eq!(record.format_keys().unwrap(), &["GT", "DP"]);
    }

    #[test]
    fn sites_only_record_has_no_genotypes() {
        let mut h = VcfHeader::new();
        h.add_contig("chr1", Some(1000));
        let vc = VariantCall::new("chr1", 42, b"A".to_vec(), vec![b"C".to_vec()]).unwrap();
        let raw = raw_stream(&h, &[vc]);

        let mut reader = BcfReader::new(&raw[..]).unwrap();
        let record = reader.read_record().unwrap().unwrap();
        assert_eq!(record.n_samples(), 0);
        assert!(record.genotypes_decoded());
        assert!(record.genotypes().unwrap().is_empty());
        assert!(record.format_keys().unwrap().is_empty());
        let call = record.into_variant_call().unwrap();
        assert_eq!(call.position, 42);
    }

    #[test]
    fn invalid_magic_rejected() {
        let err = BcfReader::new(&b"VCF\x02\x02garbage"[..]).unwrap_err();
        assert!(matches!(err, PhysaliaError::InvalidMagic(_)));
    }

    #[test]
    fn unsupported_minor_version_rejected() {
        let err = BcfReader::new(&b"BCF\x02\x03"[..]).unwrap_err();
        assert!(matches!(err, PhysaliaError::UnsupportedVersion(_)));
    }

    #[test]
    fn truncated_record_rejected() {
        let mut raw = raw_stream(&sample_header(), &[genotyped_record()]);
        raw.truncate(raw.len() - 3);
        let mut reader = BcfReader::new(&raw[..]).unwrap();
        let err = reader.read_record().unwrap_err();
        assert!(matches!(err, PhysaliaError::MalformedRecord(_)));
    }

    /// Hand-assemble one record (sizes + site block) onto a valid prologue.
    fn splice_record(header: &VcfHeader, site: Vec<u8>) -> Vec<u8> {
        let mut raw = raw_stream(header, &[]);
        raw.extend_from_slice(&(site.len() as u32).to_le_bytes());
        raw.extend_from_slice(&0u32.to_le_bytes());
        raw.extend_from_slice(&site);
        raw
    }

    fn implicit_fields(enc: &mut Bcf2Encoder, contig: u32, n_alleles: u32, n_samples: u32) {
        enc.encode_raw_word(contig);
        enc.encode_raw_word(99); // pos0
        enc.encode_raw_word(1); // ref length
        enc.encode_raw_missing(TypeTag::Float);
        enc.encode_raw_word(n_alleles << 16);
        enc.encode_raw_word(n_samples);
    }

    #[test]
    fn unassigned_contig_offset_rejected() {
        let mut h = VcfHeader::new();
        h.add_contig("chr1", Some(1000));
        let mut enc = Bcf2Encoder::new(BcfVersion::V2_2);
        implicit_fields(&mut enc, 5, 1, 0);
        let raw = splice_record(&h, enc.take_record_bytes());

        let err = BcfReader::new(&raw[..])
            .unwrap()
            .read_record()
            .unwrap_err();
        assert!(matches!(err, PhysaliaError::MalformedRecord(_)));
    }

    #[test]
    fn zero_alleles_rejected() {
        let mut h = VcfHeader::new();
        h.add_contig("chr1", Some(1000));
        let mut enc = Bcf2Encoder::new(BcfVersion::V2_2);
        implicit_fields(&mut enc, 0, 0, 0);
        let raw = splice_record(&h, enc.take_record_bytes());

        let err = BcfReader::new(&raw[..])
            .unwrap()
            .read_record()
            .unwrap_err();
        assert!(matches!(err, PhysaliaError::MalformedRecord(_)));
    }

    #[test]
    fn non_char_allele_rejected() {
        let mut h = VcfHeader::new();
        h.add_contig("chr1", Some(1000));
        let mut enc = Bcf2Encoder::new(BcfVersion::V2_2);
        implicit_fields(&mut enc, 0, 1, 0);
        enc.encode_typed_missing(TypeTag::Char).unwrap(); // ID
        enc.encode_typed_int(1).unwrap(); // allele as INT8 instead of CHAR
        let raw = splice_record(&h, enc.take_record_bytes());

        let err = BcfReader::new(&raw[..])
            .unwrap()
            .read_record()
            .unwrap_err();
        assert!(matches!(err, PhysaliaError::MalformedRecord(_)));
    }

    #[test]
    fn record_sample_count_must_match_header() {
        // Header declares two samples; the record claims zero
        let h = sample_header();
        let mut enc = Bcf2Encoder::new(BcfVersion::V2_2);
        implicit_fields(&mut enc, 0, 1, 0);
        let raw = splice_record(&h, enc.take_record_bytes());

        let err = BcfReader::new(&raw[..])
            .unwrap()
            .read_record()
            .unwrap_err();
        assert!(matches!(err, PhysaliaError::MalformedRecord(_)));
    }

    #[test]
    fn error_context_names_record_and_offset() {
        let mut raw = raw_stream(&sample_header(), &[genotyped_record()]);
        raw.truncate(raw.len() - 3);
        let mut reader = BcfReader::new(&raw[..]).unwrap();
        let msg = reader.read_record().unwrap_err().to_string();
        assert!(msg.contains("record 1"), "{msg}");
        assert!(msg.contains("byte offset"), "{msg}");
    }

    #[test]
    fn bcf_file_roundtrip_and_stats() {
        let mut h = sample_header();
        h.add_info("DP", "1", "Integer", "Total depth");

        let mut snv = genotyped_record();
        snv.info = vec![("DP".into(), AttrValue::Int(51))];
        let mut indel =
            VariantCall::new("chr2", 300, b"GAT".to_vec(), vec![b"G".to_vec()]).unwrap();
        indel.filter = VariantFilter::Missing;
        indel.format = vec!["GT".into()];
        indel.genotypes = vec![SampleGenotype::diploid(0, 1), SampleGenotype::absent()];

        let tmp = tempfile::NamedTempFile::with_suffix(".bcf").unwrap();
        write_bcf(&h, &[snv.clone(), indel.clone()], tmp.path()).unwrap();

        let calls = read_bcf(tmp.path()).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].info, snv.info);
        assert_eq!(calls[1].chrom, "chr2");
        assert_eq!(calls[1].ref_allele, b"GAT");

        let stats = bcf_stats(tmp.path()).unwrap();
        assert_eq!(stats.variant_count, 2);
        assert_eq!(stats.snv_count, 1);
        assert_eq!(stats.indel_count, 1);
        assert_eq!(stats.pass_count, 1);
        assert_eq!(stats.chromosomes, vec!["chr1", "chr2"]);
    }

    #[test]
    fn records_iterator_yields_all() {
        let bytes = write_bcf_bytes(
            &sample_header(),
            &[genotyped_record(), genotyped_record()],
            BcfVersion::V2_2,
        )
        .unwrap();
        let mut file = tempfile::NamedTempFile::with_suffix(".bcf").unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let data = bgzf::decompress_all(&mut std::fs::File::open(file.path()).unwrap()).unwrap();
        let mut reader = BcfReader::new(&data[..]).unwrap();
        let records: Vec<_> = reader.records().collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn indexed_header_roundtrip() {
        // All string-dictionary lines carry explicit, non-contiguous IDX
        let mut h = VcfHeader::new();
        h.add_contig("chr1", Some(1000));
        h.add_filter("PASS", "All filters passed");
        h.filter_fields[0].idx = Some(0);
        h.add_filter("q10", "Quality below 10");
        h.filter_fields[1].idx = Some(5);
        h.add_info("DP", "1", "Integer", "Total depth");
        h.info_fields[0].idx = Some(2);
        h.add_format("GT", "1", "String", "Genotype");
        h.format_fields[0].idx = Some(9);
        h.add_sample("S0");

        let mut vc = VariantCall::new("chr1", 77, b"A".to_vec(), vec![b"T".to_vec()]).unwrap();
        vc.filter = VariantFilter::Fail(vec!["q10".into()]);
        vc.info = vec![("DP".into(), AttrValue::Int(14))];
        vc.format = vec!["GT".into()];
        vc.genotypes = vec![SampleGenotype::diploid(0, 1)];

        let raw = raw_stream(&h, &[vc.clone()]);
        let mut reader = BcfReader::new(&raw[..]).unwrap();
        assert_eq!(reader.schema().strings.get(5), Some("q10"));
        assert_eq!(reader.schema().strings.get(9), Some("GT"));
        assert_eq!(reader.schema().strings.get(1), None);

        let got = reader
            .read_record()
            .unwrap()
            .unwrap()
            .into_variant_call()
            .unwrap();
        assert_eq!(got.filter, vc.filter);
        assert_eq!(got.info, vc.info);
        assert_eq!(got.genotypes[0].alleles, vec![Some(0), Some(1)]);
    }

    #[test]
    fn pass_decodes_from_offset_zero_without_declaration() {
        // No FILTER lines in the embedded header at all; offset 0 must
        // still decode as PASS
        let mut h = VcfHeader::new();
        h.add_contig("chr1", Some(1000));

        let mut raw = Vec::new();
        BcfVersion::V2_2.write(&mut raw).unwrap();
        let text = h.to_vcf_string();
        raw.extend_from_slice(&((text.len() + 1) as u32).to_le_bytes());
        raw.extend_from_slice(text.as_bytes());
        raw.push(0);

        let mut enc = Bcf2Encoder::new(BcfVersion::V2_2);
        implicit_fields(&mut enc, 0, 1, 0);
        enc.encode_typed_missing(TypeTag::Char).unwrap(); // ID
        enc.encode_typed_string(b"A").unwrap(); // REF
        enc.encode_typed_ints(&[Some(0)], 1).unwrap(); // FILTER = [0]
        let site = enc.take_record_bytes();
        raw.extend_from_slice(&(site.len() as u32).to_le_bytes());
        raw.extend_from_slice(&0u32.to_le_bytes());
        raw.extend_from_slice(&site);

        let mut reader = BcfReader::new(&raw[..]).unwrap();
        assert_eq!(reader.schema().strings.get(0), Some("PASS"));
        let call = reader
            .read_record()
            .unwrap()
            .unwrap()
            .into_variant_call()
            .unwrap();
        assert_eq!(call.filter, VariantFilter::Pass);
    }

    #[test]
    fn multiallelic_read() {
        let mut h = VcfHeader::new();
        h.add_contig("chr1", Some(1000));
        let vc = VariantCall::new(
            "chr1",
            10,
            b"A".to_vec(),
            vec![b"G".to_vec(), b"T".to_vec(), b"C".to_vec()],
        )
        .unwrap();
        let raw = raw_stream(&h, &[vc]);
        let mut reader = BcfReader::new(&raw[..]).unwrap();
        let call = reader
            .read_record()
            .unwrap()
            .unwrap()
            .into_variant_call()
            .unwrap();
        assert_eq!(call.alt_alleles.len(), 3);
        assert_eq!(call.alt_alleles[2], b"C");
    }
}
