//! BCF2 binary writer.
//!
//! Writes [`VariantCall`] records in BCF2 format: the `BCF\x02` prologue
//! with the embedded text header, then per record a sites block and a
//! genotypes block, each length-prefixed. [`BcfWriter`] produces the raw
//! (uncompressed) stream over any `Write`; the convenience functions wrap it
//! in BGZF the way `.bcf` files on disk are stored.
//!
//! The minor version (2.1 or 2.2) is fixed at construction and governs the
//! vector padding sentinel and multi-string packing throughout the stream.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use physalia_core::{PhysaliaError, Result};
use physalia_omics::{VariantCall, VariantFilter};

use crate::bcf_field_write::FieldWriterManager;
use crate::bcf_schema::BcfSchema;
use crate::bcf_typed::{with_context, Bcf2Encoder, BcfVersion, TypeTag};
use crate::bgzf;
use crate::vcf_header::{FilterDef, VcfHeader};

/// Streaming BCF2 writer over an uncompressed byte sink.
///
/// The prologue (magic, version, embedded header) is written at
/// construction; records follow strictly in call order.
pub struct BcfWriter<W: Write> {
    out: W,
    header: VcfHeader,
    schema: Arc<BcfSchema>,
    writers: FieldWriterManager,
    site_enc: Bcf2Encoder,
    gt_enc: Bcf2Encoder,
    record_no: usize,
}

impl<W: Write> BcfWriter<W> {
    /// Create a writer and emit the stream prologue.
    ///
    /// The header is normalized so a `PASS` FILTER definition is present
    /// (it always occupies string-dictionary offset 0), except for
    /// explicitly indexed headers, whose layout is taken as-is.
    pub fn new(mut out: W, header: &VcfHeader, version: BcfVersion) -> Result<Self> {
        let version = version.validate()?;
        let header = normalize_header(header);
        let schema = BcfSchema::build(&header, version)?;
        let writers = FieldWriterManager::new(&schema)?;

        version.write(&mut out)?;
        let text = header.to_vcf_string();
        let header_len = (text.len() + 1) as u32; // +1 for NUL
        out.write_all(&header_len.to_le_bytes())?;
        out.write_all(text.as_bytes())?;
        out.write_all(&[0])?;

        Ok(Self {
            out,
            header,
            schema,
            writers,
            site_enc: Bcf2Encoder::new(version),
            gt_enc: Bcf2Encoder::new(version),
            record_no: 0,
        })
    }

    /// The header as written into the stream (after normalization).
    pub fn header(&self) -> &VcfHeader {
        &self.header
    }

    pub fn version(&self) -> BcfVersion {
        self.schema.version
    }

    pub fn schema(&self) -> &Arc<BcfSchema> {
        &self.schema
    }

    /// Encode and write one record.
    pub fn write_record(&mut self, vc: &VariantCall) -> Result<()> {
        self.record_no += 1;
        let record_no = self.record_no;
        if let Err(e) = self.encode_record(vc) {
            // Drop any partial output so the stream is not poisoned
            self.site_enc.take_record_bytes();
            self.gt_enc.take_record_bytes();
            return Err(with_context(e, &format!("record {record_no}")));
        }

        let sites = self.site_enc.take_record_bytes();
        let genotypes = self.gt_enc.take_record_bytes();
        self.out.write_all(&(sites.len() as u32).to_le_bytes())?;
        self.out
            .write_all(&(genotypes.len() as u32).to_le_bytes())?;
        self.out.write_all(&sites)?;
        self.out.write_all(&genotypes)?;
        Ok(())
    }

    /// Flush and return the underlying sink.
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn encode_record(&mut self, vc: &VariantCall) -> Result<()> {
        let n_samples = self.schema.n_samples();
        if vc.genotypes.len() != n_samples {
            return Err(PhysaliaError::MalformedRecord(format!(
                "record has {} genotypes but the header declares {} samples",
                vc.genotypes.len(),
                n_samples
            )));
        }
        if vc.ref_allele.is_empty() {
            return Err(PhysaliaError::MalformedRecord(
                "reference allele must not be empty".into(),
            ));
        }

        let n_alleles = vc.n_alleles();
        let n_info = vc.info.len();
        let n_format = if n_samples == 0 { 0 } else { vc.format.len() };
        if n_alleles > 0xFFFF || n_info > 0xFFFF {
            return Err(PhysaliaError::MalformedRecord(format!(
                "allele count {n_alleles} or INFO count {n_info} exceeds the 16-bit field"
            )));
        }
        if n_format > 0xFF || n_samples >= 0x0100_0000 {
            return Err(PhysaliaError::MalformedRecord(format!(
                "FORMAT count {n_format} or sample count {n_samples} exceeds its packed field"
            )));
        }

        let contig_offset = self.schema.contigs.offset_of(&vc.chrom).ok_or_else(|| {
            PhysaliaError::InvalidInput(format!("contig {} not declared in header", vc.chrom))
        })?;
        if vc.position == 0 || vc.position - 1 > i32::MAX as u64 {
            return Err(PhysaliaError::MalformedRecord(format!(
                "position {} outside the representable range",
                vc.position
            )));
        }

        // Implicit untyped fields: contig, 0-based start, ref length, qual
        self.site_enc.encode_raw_word(contig_offset);
        self.site_enc.encode_raw_word((vc.position - 1) as u32);
        self.site_enc.encode_raw_word(vc.ref_allele.len() as u32);
        match vc.quality {
            Some(q) => self.site_enc.encode_raw_float(q),
            None => self.site_enc.encode_raw_missing(TypeTag::Float),
        }

        // Packed count words
        self.site_enc
            .encode_raw_word(((n_alleles as u32) << 16) | n_info as u32);
        self.site_enc
            .encode_raw_word(((n_format as u32) << 24) | n_samples as u32);

        // ID
        match &vc.id {
            Some(id) => self.site_enc.encode_typed_string(id.as_bytes())?,
            None => self.site_enc.encode_typed_missing(TypeTag::Char)?,
        }

        // Alleles, REF first
        self.site_enc.encode_typed_string(&vc.ref_allele)?;
        for alt in &vc.alt_alleles {
            self.site_enc.encode_typed_string(alt)?;
        }

        // FILTER offsets: empty = unfiltered, a single 0 = PASS
        match &vc.filter {
            VariantFilter::Missing => self.site_enc.encode_type(0, TypeTag::Int8)?,
            VariantFilter::Pass => self.site_enc.encode_typed_ints(&[Some(0)], 1)?,
            VariantFilter::Fail(names) => {
                let mut offsets = Vec::with_capacity(names.len());
                for name in names {
                    let offset = self.schema.strings.offset_of(name).ok_or_else(|| {
                        PhysaliaError::InvalidInput(format!(
                            "filter {name} not declared in header"
                        ))
                    })?;
                    offsets.push(Some(offset as i32));
                }
                let n = offsets.len();
                self.site_enc.encode_typed_ints(&offsets, n)?;
            }
        }

        // INFO pairs, in source order
        for (key, value) in &vc.info {
            self.writers
                .info_writer(key)?
                .encode(vc, value, &mut self.site_enc)?;
        }

        // Genotype block: sample-major FORMAT fields, in record key order
        if n_samples > 0 {
            for key in &vc.format {
                self.writers
                    .format_writer_mut(key)?
                    .encode(vc, &mut self.gt_enc)?;
            }
        }

        Ok(())
    }
}

/// Ensure the header declares PASS (dictionary offset 0). Indexed headers
/// are left untouched so their explicit layout survives.
fn normalize_header(header: &VcfHeader) -> VcfHeader {
    let mut header = header.clone();
    let indexed = header.filter_fields.iter().any(|f| f.idx.is_some())
        || header.info_fields.iter().any(|f| f.idx.is_some())
        || header.format_fields.iter().any(|f| f.idx.is_some());
    if !indexed && !header.filter_fields.iter().any(|f| f.id == "PASS") {
        header.filter_fields.insert(
            0,
            FilterDef {
                id: "PASS".to_string(),
                description: "All filters passed".to_string(),
                idx: None,
            },
        );
    }
    header
}

/// Write variants in BCF 2.2 format (BGZF-compressed) to a file.
///
/// The header defines contig and dictionary ordering for integer encoding.
pub fn write_bcf(
    header: &VcfHeader,
    calls: &[VariantCall],
    path: impl AsRef<Path>,
) -> Result<()> {
    let data = write_bcf_bytes(header, calls, BcfVersion::V2_2)?;
    let path = path.as_ref();
    std::fs::write(path, data).map_err(|e| {
        PhysaliaError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })
}

/// Write variants in BCF format to a BGZF-compressed byte vector.
pub fn write_bcf_bytes(
    header: &VcfHeader,
    calls: &[VariantCall],
    version: BcfVersion,
) -> Result<Vec<u8>> {
    let mut writer = BcfWriter::new(Vec::new(), header, version)?;
    for call in calls {
        writer.write_record(call)?;
    }
    let raw = writer.finish()?;
    bgzf::compress_all(&raw)
}
