//! BCF2 dictionaries: the ordered string tables whose offsets appear in the
//! record stream.
//!
//! A BCF file carries two dictionaries, both derived from the embedded VCF
//! header: the string dictionary (FILTER/INFO/FORMAT IDs, with `PASS`
//! guaranteed present) and the contig dictionary. Offsets are either ordinal
//! (position in header order) or, for BCF 2.2 headers annotated with `IDX=`
//! attributes, explicit and possibly sparse.
//!
//! Offsets must be derived identically every time a header is seen — the
//! record stream encodes nothing but the offsets.

use std::collections::{BTreeMap, HashSet};

use physalia_core::{PhysaliaError, Result};

use crate::bcf_typed::BcfVersion;
use crate::vcf_header::VcfHeader;

/// The FILTER value that is always present in a string dictionary.
pub const PASS: &str = "PASS";

/// An ordered `offset -> string` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BcfDictionary {
    /// Dense table; offset == position in header order.
    Ordinal(Vec<String>),
    /// Sparse table built from explicit `IDX=` annotations.
    Indexed(BTreeMap<u32, String>),
}

impl BcfDictionary {
    /// Build the string dictionary (FILTER/INFO/FORMAT IDs).
    ///
    /// IDs are deduplicated with the first occurrence winning, so an ID
    /// declared both as INFO and FORMAT (e.g. `DP`) gets a single offset.
    /// `PASS` is seeded at offset 0 unless an explicitly indexed
    /// `FILTER=PASS` line placed it elsewhere.
    pub fn string_dictionary(header: &VcfHeader, version: BcfVersion) -> Result<Self> {
        let lines: Vec<(&str, Option<u32>)> = header
            .filter_fields
            .iter()
            .map(|f| (f.id.as_str(), f.idx))
            .chain(header.info_fields.iter().map(|f| (f.id.as_str(), f.idx)))
            .chain(header.format_fields.iter().map(|f| (f.id.as_str(), f.idx)))
            .collect();
        Self::build(&lines, version, true)
    }

    /// Build the contig dictionary.
    pub fn contig_dictionary(header: &VcfHeader, version: BcfVersion) -> Result<Self> {
        let lines: Vec<(&str, Option<u32>)> = header
            .contigs
            .iter()
            .map(|c| (c.id.as_str(), c.idx))
            .collect();
        Self::build(&lines, version, false)
    }

    fn build(lines: &[(&str, Option<u32>)], version: BcfVersion, seed_pass: bool) -> Result<Self> {
        // All-or-none IDX rule: explicit indices exist only in 2.2 headers,
        // and if any candidate line carries one, every line must.
        let indexed = version.minor >= 2 && lines.first().is_some_and(|(_, idx)| idx.is_some());
        for (id, idx) in lines {
            if version.minor < 2 && idx.is_some() {
                return Err(PhysaliaError::InvalidHeader(format!(
                    "header line {id} carries IDX but the file is BCF2.{}",
                    version.minor
                )));
            }
            if idx.is_some() != indexed {
                return Err(PhysaliaError::InvalidHeader(format!(
                    "inconsistent IDX usage: line {id} {}",
                    if indexed {
                        "is missing the expected IDX field"
                    } else {
                        "has an unexpected IDX field"
                    }
                )));
            }
        }

        let mut seen: HashSet<&str> = HashSet::new();
        if indexed {
            let mut map = BTreeMap::new();
            for (id, idx) in lines {
                if !seen.insert(id) {
                    continue;
                }
                let idx = idx.ok_or_else(|| {
                    PhysaliaError::InvalidHeader(format!("line {id} missing IDX"))
                })?;
                if map.insert(idx, id.to_string()).is_some() {
                    return Err(PhysaliaError::InvalidHeader(format!(
                        "duplicate dictionary index {idx} (line {id})"
                    )));
                }
            }
            if seed_pass && !seen.contains(PASS) && map.insert(0, PASS.to_string()).is_some() {
                return Err(PhysaliaError::InvalidHeader(
                    "dictionary index 0 is reserved for PASS".into(),
                ));
            }
            Ok(BcfDictionary::Indexed(map))
        } else {
            let mut strings = Vec::with_capacity(lines.len() + 1);
            if seed_pass {
                seen.insert(PASS);
                strings.push(PASS.to_string());
            }
            for (id, _) in lines {
                if seen.insert(id) {
                    strings.push(id.to_string());
                }
            }
            Ok(BcfDictionary::Ordinal(strings))
        }
    }

    /// The string at an offset.
    pub fn get(&self, offset: u32) -> Option<&str> {
        match self {
            BcfDictionary::Ordinal(v) => v.get(offset as usize).map(String::as_str),
            BcfDictionary::Indexed(m) => m.get(&offset).map(String::as_str),
        }
    }

    /// The offset assigned to a string.
    pub fn offset_of(&self, id: &str) -> Option<u32> {
        match self {
            BcfDictionary::Ordinal(v) => v.iter().position(|s| s == id).map(|p| p as u32),
            BcfDictionary::Indexed(m) => {
                m.iter().find(|(_, s)| s.as_str() == id).map(|(o, _)| *o)
            }
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        match self {
            BcfDictionary::Ordinal(v) => v.len(),
            BcfDictionary::Indexed(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in offset order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (u32, &str)> + '_> {
        match self {
            BcfDictionary::Ordinal(v) => Box::new(
                v.iter()
                    .enumerate()
                    .map(|(i, s)| (i as u32, s.as_str())),
            ),
            BcfDictionary::Indexed(m) => {
                Box::new(m.iter().map(|(o, s)| (*o, s.as_str())))
            }
        }
    }
}
