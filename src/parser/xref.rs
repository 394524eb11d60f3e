//! Cross-reference loader
//!
//! Reconstructs the object registry from the xref chain rooted at the
//! `startxref` offset, per ISO 32000-1 Section 7.5.4 (classical tables)
//! and 7.5.8 (cross-reference streams).
//!
//! The chain is walked newest-first: the entry first registered for an
//! object number is authoritative, and entries for the same number found
//! further down the `Prev` chain are skipped. This is what gives PDF
//! incremental updates their semantics, so every insertion site checks
//! `find` before `add`.

use super::object_stream;
use super::objects::{PdfDictionary, PdfObject, PdfStream};
use super::page_tree;
use super::{ParseError, ParseResult};
use crate::file::PdfFile;
use crate::parser::lexer::{Lexer, Token};
use std::io::SeekFrom;

/// Load the xref chain starting at `xref_offset`, then resolve the trailer
/// and flatten the page tree.
pub(crate) fn load_xref(pdf: &mut PdfFile, mut xref_offset: u64) -> ParseResult<()> {
    loop {
        if let Err(e) = pdf.io.seek(SeekFrom::Start(xref_offset)) {
            pdf.report("Unable to seek to start of xref table.");
            return Err(e.into());
        }

        let line = match pdf.io.read_line() {
            Ok(Some(line)) => line,
            Ok(None) => {
                pdf.report("Unable to read start of xref table.");
                return Err(ParseError::SyntaxError {
                    position: xref_offset,
                    message: "Unable to read start of xref table.".to_string(),
                });
            }
            Err(e) => {
                pdf.report("Unable to read start of xref table.");
                return Err(e.into());
            }
        };

        log::debug!("load_xref: xref_offset={xref_offset}, line={line:?}");
        let trimmed = line.trim();

        let trailer = if trimmed == "xref" {
            load_classic_xref(pdf)?
        } else if looks_like_object_header(trimmed) {
            let Some((number, generation)) = parse_object_header(trimmed) else {
                return Err(pdf.error(ParseError::InvalidXrefHeader(trimmed.to_string())));
            };
            load_stream_xref(pdf, number, generation, xref_offset)?
        } else {
            return Err(pdf.error(ParseError::InvalidXrefHeader(trimmed.to_string())));
        };

        // The first trailer in the chain is authoritative
        if pdf.trailer.is_none() {
            pdf.trailer = Some(trailer.clone());
        }

        match trailer.get("Prev").and_then(|o| o.as_integer()) {
            Some(prev) if prev > 0 => xref_offset = prev as u64,
            _ => break,
        }
    }

    resolve_document(pdf)
}

/// A cross-reference stream begins with the identifier of the stream
/// object itself: `<digits> <digits> obj`.
fn looks_like_object_header(line: &str) -> bool {
    line.as_bytes().first().is_some_and(|b| b.is_ascii_digit()) && line.ends_with("obj")
}

fn parse_object_header(line: &str) -> Option<(u32, u16)> {
    let mut parts = line.split_whitespace();
    let number = parts.next()?.parse::<i64>().ok()?;
    let generation = parts.next()?.parse::<i64>().ok()?;
    if parts.next()? != "obj" || parts.next().is_some() {
        return None;
    }
    if number < 1 || !(0..=65535).contains(&generation) {
        return None;
    }
    Some((number as u32, generation as u16))
}

/// Classical xref table: subsections of 20-byte entries, then `trailer`
/// followed by the trailer dictionary.
fn load_classic_xref(pdf: &mut PdfFile) -> ParseResult<PdfDictionary> {
    loop {
        let line = match pdf.io.read_line() {
            Ok(Some(line)) => line,
            Ok(None) => return Err(pdf.error(ParseError::MissingTrailer)),
            Err(e) => {
                pdf.report("Unable to read xref table.");
                return Err(e.into());
            }
        };
        let line = line.trim();

        if line == "trailer" {
            break;
        }
        if line.is_empty() {
            continue;
        }

        let Some((first, count)) = parse_subsection_header(line) else {
            return Err(pdf.error(ParseError::MalformedXrefSection(line.to_string())));
        };

        for index in 0..count {
            let number = first + index;

            let mut entry = [0u8; 20];
            if let Err(e) = pdf.io.read_exact(&mut entry) {
                pdf.report("Unable to read xref table entry.");
                return Err(e.into());
            }

            let (offset, generation, in_use) = match parse_xref_entry(&entry) {
                Some(fields) => fields,
                None => {
                    let literal = String::from_utf8_lossy(&entry).trim_end().to_string();
                    return Err(pdf.error(ParseError::MalformedXrefEntry(literal)));
                }
            };

            if !in_use {
                continue;
            }

            // Don't replace an entry from a newer revision
            if pdf.registry.find(number).is_none() {
                pdf.registry.add(number, generation, offset);
            }
        }
    }

    let value = {
        let reader = pdf.io.reader()?;
        let mut lexer = Lexer::new(reader);
        PdfObject::parse(&mut lexer)
    };

    match value {
        Ok(PdfObject::Dictionary(dict)) => Ok(dict),
        Ok(_) => Err(pdf.error(ParseError::TrailerNotDictionary)),
        Err(e) => {
            log::debug!("trailer dictionary parse failed: {e}");
            pdf.report("Unable to read trailer dictionary.");
            Err(e)
        }
    }
}

/// Subsection header: `first-number count`
fn parse_subsection_header(line: &str) -> Option<(u32, u32)> {
    let mut parts = line.split_whitespace();
    let first = parts.next()?.parse::<i64>().ok()?;
    let count = parts.next()?.parse::<i64>().ok()?;
    if parts.next().is_some() || first < 0 || count < 0 {
        return None;
    }
    let last = first.checked_add(count)?;
    if last > u32::MAX as i64 {
        return None;
    }
    Some((first as u32, count as u32))
}

/// A 20-byte entry: `oooooooooo ggggg t` with a two-byte terminator in
/// {`\r\n`, ` \n`, ` \r`}. Returns (offset, generation, in-use).
fn parse_xref_entry(entry: &[u8; 20]) -> Option<(u64, u16, bool)> {
    let terminator = &entry[18..20];
    if terminator != b"\r\n" && terminator != b" \n" && terminator != b" \r" {
        return None;
    }
    if entry[10] != b' ' || entry[16] != b' ' {
        return None;
    }

    let offset = std::str::from_utf8(&entry[0..10]).ok()?.parse::<u64>().ok()?;
    let generation = std::str::from_utf8(&entry[11..16]).ok()?.parse::<u32>().ok()?;
    if generation > 65535 {
        return None;
    }

    let in_use = match entry[17] {
        b'n' => true,
        b'f' => false,
        _ => return None,
    };

    Some((offset, generation as u16, in_use))
}

/// Cross-reference stream: the stream object's dictionary doubles as the
/// trailer; the decoded body holds fixed-width binary records.
fn load_stream_xref(
    pdf: &mut PdfFile,
    number: u32,
    generation: u16,
    xref_offset: u64,
) -> ParseResult<PdfDictionary> {
    log::debug!("load_xref: loading xref stream object {number} {generation}");
    pdf.registry.add(number, generation, xref_offset);

    let parsed = (|| -> ParseResult<(PdfObject, u64)> {
        let reader = pdf.io.reader()?;
        let mut lexer = Lexer::new(reader);

        let value = PdfObject::parse(&mut lexer).map_err(|e| {
            log::debug!("xref stream dictionary parse failed: {e}");
            ParseError::XrefStreamDictionary
        })?;

        match lexer.next_token() {
            Ok(Token::Stream) => {}
            _ => return Err(ParseError::XrefStreamBegin),
        }
        lexer.read_newline().map_err(|_| ParseError::XrefStreamBegin)?;

        let data_offset = lexer.position()?;
        Ok((value, data_offset))
    })();

    let (value, data_offset) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => return Err(pdf.error(e)),
    };

    let dict = match value {
        PdfObject::Dictionary(dict) => dict,
        _ => return Err(pdf.error(ParseError::XrefStreamNotDictionary)),
    };

    // Dictionary entries of an xref stream must be direct, so Length is a
    // plain integer here.
    let Some(length) = dict
        .get("Length")
        .and_then(|o| o.as_integer())
        .filter(|n| *n >= 0)
    else {
        pdf.report("Unable to open cross-reference stream.");
        return Err(ParseError::MissingKey("Length".to_string()));
    };

    let raw = match pdf.io.read_exact_vec(length as usize) {
        Ok(raw) => raw,
        Err(e) => {
            pdf.report("Unable to open cross-reference stream.");
            return Err(e.into());
        }
    };

    let decoded = match super::filters::decode_stream(&raw, &dict) {
        Ok(decoded) => decoded,
        Err(e) => {
            log::debug!("xref stream decode failed: {e}");
            pdf.report("Unable to open cross-reference stream.");
            return Err(e);
        }
    };

    if let Some(record) = pdf.registry.find_mut(number) {
        record.set_value(PdfObject::Stream(PdfStream {
            dict: dict.clone(),
            data: raw,
        }));
        record.set_stream_offset(data_offset);
    }

    // Index: optional [first count]; only a single pair is supported
    let mut obj_number: i64 = 0;
    if let Some(index) = dict.get("Index").and_then(|o| o.as_array()) {
        if index.len() > 2 {
            return Err(pdf.error(ParseError::MultipleIndices));
        }
        obj_number = index.get(0).and_then(|o| o.as_integer()).unwrap_or(0);
    }

    // W: field widths in bytes of (type, field2, field3)
    let Some(w_array) = dict.get("W").and_then(|o| o.as_array()) else {
        return Err(pdf.error(ParseError::MissingWKey));
    };
    let w0 = w_array.get(0).and_then(|o| o.as_integer()).unwrap_or(0).max(0) as usize;
    let w1 = w_array.get(1).and_then(|o| o.as_integer()).unwrap_or(0).max(0) as usize;
    let w2 = w_array.get(2).and_then(|o| o.as_integer()).unwrap_or(0).max(0) as usize;
    let w_total = w0 + w1 + w2;

    if w1 == 0 || w2 > 2 || w_total > 32 {
        return Err(pdf.error(ParseError::InvalidWKey));
    }

    let mut pending: Vec<u32> = Vec::new();

    for chunk in decoded.chunks_exact(w_total) {
        // Without a type field every record is an uncompressed object
        let entry_type = if w0 > 0 { read_field(&chunk[..w0]) } else { 1 };

        if entry_type == 0 {
            // Free object
            obj_number += 1;
            continue;
        }

        let field2 = read_field(&chunk[w0..w0 + w1]);
        let field3 = read_field(&chunk[w0 + w1..w_total]);

        let Ok(num) = u32::try_from(obj_number) else {
            obj_number += 1;
            continue;
        };

        // Don't replace an entry from a newer revision
        if pdf.registry.find(num).is_some() {
            obj_number += 1;
            continue;
        }

        if w0 > 0 && entry_type == 2 {
            // Compressed member: field2 names the owning object stream.
            // If that stream is already registered, decode it now;
            // otherwise queue it for after the record walk.
            let owner = field2 as u32;
            if pdf.registry.find(owner).is_some() {
                object_stream::load_object_stream(pdf, owner)?;
            } else if !pending.contains(&owner) {
                pending.push(owner);
            }
        } else {
            pdf.registry.add(num, field3 as u16, field2);
        }

        obj_number += 1;
    }

    log::debug!(
        "load_xref: {} compressed object streams to load",
        pending.len()
    );

    for owner in pending {
        if pdf.registry.find(owner).is_some() {
            object_stream::load_object_stream(pdf, owner)?;
        } else {
            return Err(pdf.error(ParseError::ObjectStreamNotFound(owner)));
        }
    }

    Ok(dict)
}

/// Big-endian unsigned integer of up to eight bytes
fn read_field(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// After the whole chain is loaded: resolve the document-level objects
/// named by the trailer and flatten the page tree.
fn resolve_document(pdf: &mut PdfFile) -> ParseResult<()> {
    let trailer = pdf.trailer.clone().unwrap_or_default();

    let registered = |pdf: &PdfFile, key: &str| -> Option<u32> {
        trailer
            .get(key)
            .and_then(|o| o.as_reference())
            .map(|(number, _)| number)
            .filter(|number| pdf.registry.find(*number).is_some())
    };

    let Some(root) = registered(pdf, "Root") else {
        return Err(pdf.error(ParseError::MissingRoot));
    };
    pdf.root = Some(root);
    pdf.info = registered(pdf, "Info");
    pdf.encrypt = registered(pdf, "Encrypt");
    pdf.id_array = trailer.get("ID").and_then(|o| o.as_array()).cloned();

    log::debug!("load_xref: Root object {root}");

    let pages = match pdf.object_dict(root) {
        Ok(Some(dict)) => dict
            .get("Pages")
            .and_then(|o| o.as_reference())
            .map(|(number, _)| number)
            .filter(|number| pdf.registry.find(*number).is_some()),
        Ok(None) => None,
        Err(e) => {
            log::debug!("catalog load failed: {e}");
            None
        }
    };

    page_tree::load_pages(pdf, pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_xref_entry() {
        let entry: &[u8; 20] = b"0000000017 00000 n\r\n";
        assert_eq!(parse_xref_entry(entry), Some((17, 0, true)));

        let entry: &[u8; 20] = b"0000000000 65535 f \n";
        assert_eq!(parse_xref_entry(entry), Some((0, 65535, false)));

        let entry: &[u8; 20] = b"0000000123 00002 n \r";
        assert_eq!(parse_xref_entry(entry), Some((123, 2, true)));
    }

    #[test]
    fn test_parse_xref_entry_rejects_bad_terminator() {
        let entry: &[u8; 20] = b"0000000017 00000 n  ";
        assert_eq!(parse_xref_entry(entry), None);
    }

    #[test]
    fn test_parse_xref_entry_rejects_bad_flag() {
        let entry: &[u8; 20] = b"0000000017 00000 x\r\n";
        assert_eq!(parse_xref_entry(entry), None);
    }

    #[test]
    fn test_parse_subsection_header() {
        assert_eq!(parse_subsection_header("0 5"), Some((0, 5)));
        assert_eq!(parse_subsection_header("17 1"), Some((17, 1)));
        assert_eq!(parse_subsection_header("trailer"), None);
        assert_eq!(parse_subsection_header("1 2 3"), None);
        assert_eq!(parse_subsection_header("-1 2"), None);
    }

    #[test]
    fn test_parse_object_header() {
        assert_eq!(parse_object_header("12 0 obj"), Some((12, 0)));
        assert_eq!(parse_object_header("3  1  obj"), Some((3, 1)));
        assert_eq!(parse_object_header("0 0 obj"), None);
        assert_eq!(parse_object_header("5 65536 obj"), None);
        assert_eq!(parse_object_header("5 0 obj extra"), None);
    }

    #[test]
    fn test_read_field_big_endian() {
        assert_eq!(read_field(&[]), 0);
        assert_eq!(read_field(&[0x12]), 0x12);
        assert_eq!(read_field(&[0x01, 0x02, 0x03]), 0x010203);
    }
}
