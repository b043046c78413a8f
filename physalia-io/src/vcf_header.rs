//! Structured VCF header construction and parsing.
//!
//! Provides [`VcfHeader`] for building, serializing, and parsing VCF 4.3
//! headers with contig, INFO, FORMAT, and FILTER field definitions.
//!
//! Header lines may carry an `IDX=` attribute (written by BCF encoders that
//! use explicit dictionary indices); it is preserved through parse and
//! serialize so that BCF round-trips keep their dictionary layout.

use physalia_core::{PhysaliaError, Result};

/// A contig (reference sequence) definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigLine {
    /// Contig identifier (e.g. "chr1").
    pub id: String,
    /// Optional contig length.
    pub length: Option<u64>,
    /// Optional explicit dictionary index.
    pub idx: Option<u32>,
}

/// An INFO or FORMAT field definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field identifier.
    pub id: String,
    /// Number of values (e.g. "1", "A", "R", "G", ".").
    pub number: String,
    /// Value type (e.g. "Integer", "Float", "String", "Flag", "Character").
    pub field_type: String,
    /// Human-readable description.
    pub description: String,
    /// Optional explicit dictionary index.
    pub idx: Option<u32>,
}

/// A FILTER field definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDef {
    /// Filter identifier.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Optional explicit dictionary index.
    pub idx: Option<u32>,
}

/// A structured VCF header.
///
/// Build headers programmatically with [`VcfHeader::new`] and the `add_*`
/// methods, or parse from text with [`VcfHeader::parse`].
#[derive(Debug, Clone, Default)]
pub struct VcfHeader {
    /// Contig (reference sequence) definitions.
    pub contigs: Vec<ContigLine>,
    /// INFO field definitions.
    pub info_fields: Vec<FieldDef>,
    /// FORMAT field definitions.
    pub format_fields: Vec<FieldDef>,
    /// FILTER definitions.
    pub filter_fields: Vec<FilterDef>,
    /// Sample names (columns after FORMAT).
    pub samples: Vec<String>,
    /// Extra header lines not covered above (stored verbatim).
    pub extra_lines: Vec<String>,
}

impl VcfHeader {
    /// Create an empty VCF header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a contig definition.
    pub fn add_contig(&mut self, id: &str, length: Option<u64>) {
        self.contigs.push(ContigLine {
            id: id.to_string(),
            length,
            idx: None,
        });
    }

    /// Add an INFO field definition.
    pub fn add_info(&mut self, id: &str, number: &str, field_type: &str, desc: &str) {
        self.info_fields.push(FieldDef {
            id: id.to_string(),
            number: number.to_string(),
            field_type: field_type.to_string(),
            description: desc.to_string(),
            idx: None,
        });
    }

    /// Add a FORMAT field definition.
    pub fn add_format(&mut self, id: &str, number: &str, field_type: &str, desc: &str) {
        self.format_fields.push(FieldDef {
            id: id.to_string(),
            number: number.to_string(),
            field_type: field_type.to_string(),
            description: desc.to_string(),
            idx: None,
        });
    }

    /// Add a FILTER definition.
    pub fn add_filter(&mut self, id: &str, desc: &str) {
        self.filter_fields.push(FilterDef {
            id: id.to_string(),
            description: desc.to_string(),
            idx: None,
        });
    }

    /// Add a sample name.
    pub fn add_sample(&mut self, name: &str) {
        self.samples.push(name.to_string());
    }

    /// Serialize the header to VCF text (including the `#CHROM` line).
    pub fn to_vcf_string(&self) -> String {
        let mut out = String::new();
        out.push_str("##fileformat=VCFv4.3\n");

        for c in &self.contigs {
            out.push_str("##contig=<ID=");
            out.push_str(&c.id);
            if let Some(len) = c.length {
                out.push_str(&format!(",length={len}"));
            }
            if let Some(idx) = c.idx {
                out.push_str(&format!(",IDX={idx}"));
            }
            out.push_str(">\n");
        }

        for f in &self.info_fields {
            out.push_str(&format!(
                "##INFO=<ID={},Number={},Type={},Description=\"{}\"{}>\n",
                f.id,
                f.number,
                f.field_type,
                f.description,
                idx_suffix(f.idx),
            ));
        }

        for f in &self.format_fields {
            out.push_str(&format!(
                "##FORMAT=<ID={},Number={},Type={},Description=\"{}\"{}>\n",
                f.id,
                f.number,
                f.field_type,
                f.description,
                idx_suffix(f.idx),
            ));
        }

        for f in &self.filter_fields {
            out.push_str(&format!(
                "##FILTER=<ID={},Description=\"{}\"{}>\n",
                f.id,
                f.description,
                idx_suffix(f.idx),
            ));
        }

        for line in &self.extra_lines {
            out.push_str(line);
            if !line.ends_with('\n') {
                out.push('\n');
            }
        }

        out.push_str("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO");
        if !self.samples.is_empty() {
            out.push_str("\tFORMAT");
            for s in &self.samples {
                out.push('\t');
                out.push_str(s);
            }
        }
        out.push('\n');

        out
    }

    /// Parse a VCF header from text.
    ///
    /// Expects lines starting with `##` (meta-information) and one `#CHROM`
    /// header line. Only header lines are parsed; data lines are ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let mut header = Self::new();

        for line in text.lines() {
            let line = line.trim();
            if line.starts_with("##contig=<") {
                let meta = MetaLine::parse(line, "contig")?;
                header.contigs.push(ContigLine {
                    id: meta.required("ID")?.to_string(),
                    length: meta.get("length").and_then(|v| v.parse().ok()),
                    idx: meta.idx()?,
                });
            } else if line.starts_with("##INFO=<") {
                header
                    .info_fields
                    .push(MetaLine::parse(line, "INFO")?.into_field_def()?);
            } else if line.starts_with("##FORMAT=<") {
                header
                    .format_fields
                    .push(MetaLine::parse(line, "FORMAT")?.into_field_def()?);
            } else if line.starts_with("##FILTER=<") {
                let meta = MetaLine::parse(line, "FILTER")?;
                header.filter_fields.push(FilterDef {
                    id: meta.required("ID")?.to_string(),
                    description: meta.description(),
                    idx: meta.idx()?,
                });
            } else if line.starts_with("#CHROM") {
                // Parse sample names from the #CHROM line
                let cols: Vec<&str> = line.split('\t').collect();
                // Standard columns: CHROM POS ID REF ALT QUAL FILTER INFO [FORMAT sample1 ...]
                if cols.len() > 9 {
                    for sample in &cols[9..] {
                        header.samples.push(sample.to_string());
                    }
                }
            } else if line.starts_with("##fileformat=") {
                // Skip fileformat line (we always write VCFv4.3)
            } else if line.starts_with("##") {
                header.extra_lines.push(line.to_string());
            }
            // Skip data lines (don't start with #)
        }

        Ok(header)
    }
}

fn idx_suffix(idx: Option<u32>) -> String {
    match idx {
        Some(i) => format!(",IDX={i}"),
        None => String::new(),
    }
}

/// One structured `##KEY=<name=value,...>` header line, split into fields.
///
/// Quoted values may contain commas; the quotes are consumed during the
/// split. The `IDX` attribute used by BCF dictionary indexing gets a typed
/// accessor so every structured line handles it the same way.
struct MetaLine<'a> {
    key: &'a str,
    fields: Vec<(&'a str, &'a str)>,
}

impl<'a> MetaLine<'a> {
    fn parse(line: &'a str, key: &'a str) -> Result<Self> {
        let body = line
            .strip_prefix("##")
            .and_then(|s| s.strip_prefix(key))
            .and_then(|s| s.strip_prefix("=<"))
            .and_then(|s| s.strip_suffix('>'))
            .ok_or_else(|| PhysaliaError::Parse(format!("malformed ##{key} header line")))?;

        let mut fields = Vec::new();
        let mut rest = body;
        while !rest.is_empty() {
            let (name, after) = rest.split_once('=').ok_or_else(|| {
                PhysaliaError::Parse(format!("##{key}: '{rest}' is not a name=value field"))
            })?;
            let (value, tail) = if let Some(quoted) = after.strip_prefix('"') {
                let close = quoted.find('"').ok_or_else(|| {
                    PhysaliaError::Parse(format!("##{key}: unterminated quote in {name}"))
                })?;
                let tail = &quoted[close + 1..];
                (&quoted[..close], tail.strip_prefix(',').unwrap_or(tail))
            } else {
                match after.split_once(',') {
                    Some((value, tail)) => (value, tail),
                    None => (after, ""),
                }
            };
            fields.push((name, value));
            rest = tail;
        }

        Ok(Self { key, fields })
    }

    fn get(&self, name: &str) -> Option<&'a str> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    fn required(&self, name: &str) -> Result<&'a str> {
        self.get(name).ok_or_else(|| {
            PhysaliaError::Parse(format!("##{} line missing {name}", self.key))
        })
    }

    fn description(&self) -> String {
        self.get("Description").unwrap_or_default().to_string()
    }

    /// The explicit dictionary index, when annotated.
    fn idx(&self) -> Result<Option<u32>> {
        match self.get("IDX") {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| PhysaliaError::Parse(format!("invalid IDX value '{raw}'"))),
        }
    }

    fn into_field_def(self) -> Result<FieldDef> {
        Ok(FieldDef {
            id: self.required("ID")?.to_string(),
            number: self.get("Number").unwrap_or(".").to_string(),
            field_type: self.get("Type").unwrap_or("String").to_string(),
            description: self.description(),
            idx: self.idx()?,
        })
    }
}
