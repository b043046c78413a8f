//! Shared BGZF (Blocked GNU Zip Format) utilities.
//!
//! BGZF is a series of concatenated gzip members, each carrying a `BC`
//! extra subfield that records the member's compressed size, so a reader
//! can walk blocks without inflating them. Uncompressed payloads are capped
//! below 64 KiB per block. `.bcf` streams are stored in BGZF; this module
//! provides the sequential read and write paths.

use std::io::{self, Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use physalia_core::{PhysaliaError, Result};

/// Fixed gzip member magic (ID1, ID2, deflate method).
const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

/// FLG bit indicating an extra field is present.
const FEXTRA: u8 = 0x04;

/// Bytes of gzip member header through XLEN.
const FIXED_HEADER_LEN: usize = 12;

/// Bytes of CRC32 + ISIZE trailer.
const TRAILER_LEN: usize = 8;

/// Maximum bytes of uncompressed payload per block.
const MAX_BLOCK: usize = 60 * 1024;

/// Read and decompress the next BGZF block from a reader.
///
/// Returns `Ok(None)` at EOF, `Ok(Some(data))` for a valid block.
/// An empty `Vec` signals the BGZF EOF marker block.
pub fn read_bgzf_block(reader: &mut impl Read) -> Result<Option<Vec<u8>>> {
    // Fixed member header through XLEN; a clean EOF here ends the stream
    let mut fixed = [0u8; FIXED_HEADER_LEN];
    match reader.read_exact(&mut fixed) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(PhysaliaError::Io(e)),
    }
    if fixed[..3] != GZIP_MAGIC || fixed[3] & FEXTRA == 0 {
        return Err(PhysaliaError::Parse(
            "not a BGZF block: bad gzip header or missing extra field".into(),
        ));
    }

    let xlen = u16::from_le_bytes([fixed[10], fixed[11]]) as usize;
    let mut extra = vec![0u8; xlen];
    reader.read_exact(&mut extra).map_err(PhysaliaError::Io)?;
    let total = block_total_size(&extra)?;

    // Everything left in the member, trailer included, in one read
    let deflated_len = total
        .checked_sub(FIXED_HEADER_LEN + xlen + TRAILER_LEN)
        .ok_or_else(|| {
            PhysaliaError::Parse(format!(
                "BGZF block size {total} is smaller than its own framing"
            ))
        })?;
    let mut body = vec![0u8; deflated_len + TRAILER_LEN];
    reader.read_exact(&mut body).map_err(PhysaliaError::Io)?;

    let (deflated, trailer) = body.split_at(deflated_len);
    let stored_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let inflated_len =
        u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]) as usize;
    if inflated_len == 0 {
        return Ok(Some(Vec::new()));
    }

    let mut inflated = Vec::with_capacity(inflated_len);
    DeflateDecoder::new(deflated)
        .read_to_end(&mut inflated)
        .map_err(|e| PhysaliaError::Parse(format!("BGZF decompression failed: {e}")))?;
    if inflated.len() != inflated_len {
        return Err(PhysaliaError::Parse(format!(
            "BGZF block inflated to {} bytes, trailer promised {inflated_len}",
            inflated.len()
        )));
    }
    if crc32(&inflated) != stored_crc {
        return Err(PhysaliaError::Parse("BGZF block CRC mismatch".into()));
    }

    Ok(Some(inflated))
}

/// Walk the extra-field subfields for `BC` and return the full member size.
fn block_total_size(extra: &[u8]) -> Result<usize> {
    let mut rest = extra;
    while let [id0, id1, len0, len1, tail @ ..] = rest {
        let len = u16::from_le_bytes([*len0, *len1]) as usize;
        if len > tail.len() {
            break;
        }
        if (*id0, *id1) == (b'B', b'C') && len == 2 {
            // BSIZE stores total member size minus one
            return Ok(u16::from_le_bytes([tail[0], tail[1]]) as usize + 1);
        }
        rest = &tail[len..];
    }
    Err(PhysaliaError::Parse(
        "BGZF extra field missing BC subfield".into(),
    ))
}

/// Decompress an entire BGZF stream into a single buffer.
///
/// Stops at the EOF marker block or at end of input.
pub fn decompress_all(reader: &mut impl Read) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(block) = read_bgzf_block(reader)? {
        if block.is_empty() {
            break;
        }
        data.extend_from_slice(&block);
    }
    Ok(data)
}

/// BGZF-compress a buffer into blocks followed by the EOF marker.
pub fn compress_all(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for chunk in data.chunks(MAX_BLOCK) {
        append_block(&mut out, chunk)?;
    }
    // EOF marker: a member with an empty payload
    append_block(&mut out, &[])?;
    Ok(out)
}

/// Deflate one payload and append it as a complete BGZF member.
fn append_block(out: &mut Vec<u8>, payload: &[u8]) -> Result<()> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(payload)
        .map_err(|e| PhysaliaError::Io(io::Error::new(e.kind(), format!("BGZF compress: {e}"))))?;
    let deflated = encoder
        .finish()
        .map_err(|e| PhysaliaError::Io(io::Error::new(e.kind(), format!("BGZF finish: {e}"))))?;

    let bsize = FIXED_HEADER_LEN + 6 + deflated.len() + TRAILER_LEN - 1;

    out.extend_from_slice(&GZIP_MAGIC);
    out.push(FEXTRA);
    out.extend_from_slice(&[0u8; 6]); // MTIME, XFL, OS
    out.extend_from_slice(&6u16.to_le_bytes()); // XLEN

    // The single BC subfield carrying BSIZE
    out.extend_from_slice(b"BC");
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&(bsize as u16).to_le_bytes());

    out.extend_from_slice(&deflated);
    out.extend_from_slice(&crc32(payload).to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    Ok(())
}

/// CRC-32 (IEEE) over an uncompressed payload, four bits at a time.
fn crc32(data: &[u8]) -> u32 {
    let mut table = [0u32; 16];
    for (i, slot) in table.iter_mut().enumerate() {
        let mut c = i as u32;
        for _ in 0..4 {
            c = (c >> 1) ^ ((c & 1) * 0xEDB8_8320);
        }
        *slot = c;
    }

    let mut crc = !0u32;
    for &byte in data {
        crc ^= u32::from(byte);
        crc = (crc >> 4) ^ table[(crc & 0x0F) as usize];
        crc = (crc >> 4) ^ table[(crc & 0x0F) as usize];
    }
    !crc
}
