//! Write-path serialization
//!
//! Close is the trailer-commit point for a write-mode file: every
//! registered object is serialized in number order, followed by the xref
//! table, the trailer dictionary, `startxref`, and `%%EOF`. The trailer's
//! `Root` entry references the registered object whose dictionary carries
//! `/Type /Catalog`; committing a trailer without one would produce an
//! unreadable file, so that is a hard error instead.

use crate::error::{PdfError, Result};
use crate::file::PdfFile;
use crate::parser::objects::{PdfDictionary, PdfName, PdfObject};

/// Serialize all objects plus the xref table and trailer envelope.
pub(crate) fn write_file_tail(pdf: &mut PdfFile) -> Result<()> {
    let root = pdf
        .registry
        .iter()
        .find(|record| {
            record
                .value()
                .and_then(|value| value.as_dict())
                .and_then(|dict| dict.get_type())
                == Some("Catalog")
        })
        .map(|record| (record.number(), record.generation()));

    let Some((root_number, root_generation)) = root else {
        pdf.report("Missing catalog object.");
        return Err(PdfError::MissingCatalog);
    };

    // Objects, recording the offset each one actually lands at
    for index in 0..pdf.registry.len() {
        let (number, generation, value) = {
            let record = pdf.registry.get(index).expect("index in range");
            (
                record.number(),
                record.generation(),
                record.value().cloned().unwrap_or(PdfObject::Null),
            )
        };

        let offset = match pdf.io.tell() {
            Ok(offset) => offset,
            Err(e) => return Err(pdf.fail_io("Unable to write object.", e)),
        };

        let mut out = Vec::new();
        out.extend_from_slice(format!("{number} {generation} obj\n").as_bytes());
        serialize_value(&value, &mut out);
        out.extend_from_slice(b"\nendobj\n");

        if let Err(e) = pdf.io.write_all(&out) {
            return Err(pdf.fail_io("Unable to write object.", e));
        }

        pdf.registry
            .get_mut(index)
            .expect("index in range")
            .set_offset(offset);
    }

    let xref_offset = match pdf.io.tell() {
        Ok(offset) => offset,
        Err(e) => return Err(pdf.fail_io("Unable to write xref table.", e)),
    };

    let max_number = pdf
        .registry
        .iter()
        .map(|record| record.number())
        .max()
        .unwrap_or(0);

    // Single subsection from 0, entry 0 being the free-list head
    let mut out = Vec::new();
    out.extend_from_slice(format!("xref\n0 {}\n", max_number + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for number in 1..=max_number {
        match pdf.registry.find(number) {
            Some(record) => out.extend_from_slice(
                format!("{:010} {:05} n \n", record.offset(), record.generation()).as_bytes(),
            ),
            None => out.extend_from_slice(b"0000000000 00000 f \n"),
        }
    }

    let mut trailer = PdfDictionary::new();
    trailer.insert("Size", PdfObject::Integer(i64::from(max_number) + 1));
    trailer.insert("Root", PdfObject::Reference(root_number, root_generation));

    out.extend_from_slice(b"trailer\n");
    serialize_value(&PdfObject::Dictionary(trailer.clone()), &mut out);
    out.extend_from_slice(format!("\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes());

    if let Err(e) = pdf.io.write_all(&out) {
        return Err(pdf.fail_io("Unable to write trailer.", e));
    }

    pdf.trailer = Some(trailer);
    Ok(())
}

/// Serialize one value in PDF syntax.
///
/// Dictionary entries are written in sorted key order so output is
/// deterministic.
pub(crate) fn serialize_value(value: &PdfObject, out: &mut Vec<u8>) {
    match value {
        PdfObject::Null => out.extend_from_slice(b"null"),
        PdfObject::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        PdfObject::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
        PdfObject::Real(r) => {
            let text = format!("{r:.6}");
            let text = text.trim_end_matches('0').trim_end_matches('.');
            out.extend_from_slice(text.as_bytes());
        }
        PdfObject::String(s) => {
            out.push(b'(');
            for &byte in s.as_bytes() {
                match byte {
                    b'\\' | b'(' | b')' => {
                        out.push(b'\\');
                        out.push(byte);
                    }
                    b'\r' => out.extend_from_slice(b"\\r"),
                    b'\n' => out.extend_from_slice(b"\\n"),
                    _ => out.push(byte),
                }
            }
            out.push(b')');
        }
        PdfObject::Name(name) => serialize_name(name, out),
        PdfObject::Array(array) => {
            out.push(b'[');
            for (i, element) in array.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                serialize_value(element, out);
            }
            out.push(b']');
        }
        PdfObject::Dictionary(dict) => serialize_dict(dict, out),
        PdfObject::Stream(stream) => {
            serialize_dict(&stream.dict, out);
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(&stream.data);
            out.extend_from_slice(b"\nendstream");
        }
        PdfObject::Reference(number, generation) => {
            out.extend_from_slice(format!("{number} {generation} R").as_bytes());
        }
    }
}

fn serialize_dict(dict: &PdfDictionary, out: &mut Vec<u8>) {
    let mut keys: Vec<&PdfName> = dict.0.keys().collect();
    keys.sort_by(|a, b| a.as_str().cmp(b.as_str()));

    out.extend_from_slice(b"<<");
    for key in keys {
        out.push(b'\n');
        serialize_name(key, out);
        out.push(b' ');
        serialize_value(&dict.0[key], out);
    }
    out.extend_from_slice(b"\n>>");
}

fn serialize_name(name: &PdfName, out: &mut Vec<u8>) {
    out.push(b'/');
    for &byte in name.as_str().as_bytes() {
        let delimiter = matches!(
            byte,
            b'#' | b'/' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'%'
        );
        if byte <= b' ' || byte > b'~' || delimiter {
            out.extend_from_slice(format!("#{byte:02X}").as_bytes());
        } else {
            out.push(byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::{PdfArray, PdfString};

    fn serialized(value: &PdfObject) -> String {
        let mut out = Vec::new();
        serialize_value(value, &mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_serialize_scalars() {
        assert_eq!(serialized(&PdfObject::Null), "null");
        assert_eq!(serialized(&PdfObject::Boolean(true)), "true");
        assert_eq!(serialized(&PdfObject::Integer(-42)), "-42");
        assert_eq!(serialized(&PdfObject::Real(1.5)), "1.5");
        assert_eq!(serialized(&PdfObject::Real(2.0)), "2");
        assert_eq!(serialized(&PdfObject::Reference(7, 0)), "7 0 R");
    }

    #[test]
    fn test_serialize_string_escapes() {
        let value = PdfObject::String(PdfString::new(b"a(b)\\c".to_vec()));
        assert_eq!(serialized(&value), "(a\\(b\\)\\\\c)");
    }

    #[test]
    fn test_serialize_name_escapes() {
        assert_eq!(serialized(&PdfObject::Name(PdfName::new("Type"))), "/Type");
        assert_eq!(serialized(&PdfObject::Name(PdfName::new("A B"))), "/A#20B");
    }

    #[test]
    fn test_serialize_array_and_dict() {
        let mut array = PdfArray::new();
        array.push(PdfObject::Integer(1));
        array.push(PdfObject::Name(PdfName::new("Two")));
        assert_eq!(serialized(&PdfObject::Array(array)), "[1 /Two]");

        let mut dict = PdfDictionary::new();
        dict.insert("Type", PdfObject::Name(PdfName::new("Catalog")));
        dict.insert("Pages", PdfObject::Reference(2, 0));
        assert_eq!(
            serialized(&PdfObject::Dictionary(dict)),
            "<<\n/Pages 2 0 R\n/Type /Catalog\n>>"
        );
    }
}
