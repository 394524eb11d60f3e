//! Object-stream decoder
//!
//! An object stream (ISO 32000-1 Section 7.5.7) is a single indirect
//! object whose decoded stream body holds the textual representation of
//! many other objects. The body opens with whitespace-delimited pairs of
//! object number and byte offset, ended by the first token that does not
//! start with a digit; the member values follow in declaration order. The
//! whole stream is materialized into registry entries at once, so member
//! lookups never have to re-enter compressed data.

use super::lexer::{Lexer, Token};
use super::objects::PdfObject;
use super::{ParseError, ParseResult};
use crate::file::PdfFile;
use std::io::Cursor;

/// Upper bound on the number of members a single object stream may declare.
const MAX_STREAM_OBJECTS: usize = 1000;

/// Decode the object stream owned by object `number`, materializing its
/// members as top-level registry entries.
pub(crate) fn load_object_stream(pdf: &mut PdfFile, number: u32) -> ParseResult<()> {
    if let Err(e) = pdf.ensure_object_loaded(number) {
        log::debug!("object stream {number} load failed: {e}");
        return Err(pdf.error(ParseError::ObjectStreamOpen(number)));
    }

    let decoded: ParseResult<Vec<u8>> = match pdf
        .registry
        .find(number)
        .and_then(|record| record.value())
        .and_then(|value| value.as_stream())
    {
        Some(stream) => stream.decode(),
        None => Err(ParseError::ObjectStreamOpen(number)),
    };

    let decoded = match decoded {
        Ok(decoded) => decoded,
        Err(e) => {
            log::debug!("object stream {number} decode failed: {e}");
            return Err(pdf.error(ParseError::ObjectStreamOpen(number)));
        }
    };

    let mut cursor = Cursor::new(decoded);
    let mut lexer = Lexer::new(&mut cursor);

    // Member declarations: (object number, offset) pairs. The offset is
    // informational; members are parsed sequentially in declaration order,
    // which also lets forward references within the stream resolve.
    let mut members: Vec<(u32, bool)> = Vec::new();

    loop {
        let token = match lexer.next_token() {
            Ok(token) => token,
            Err(e) => {
                log::debug!("object stream {number} preamble failed: {e}");
                return Err(pdf.error(ParseError::ObjectStreamRead(number)));
            }
        };

        match token {
            Token::Integer(member_number) => {
                if members.len() >= MAX_STREAM_OBJECTS {
                    return Err(pdf.error(ParseError::TooManyCompressedObjects));
                }

                let offset = lexer.next_token();
                if !matches!(offset, Ok(Token::Integer(_))) {
                    return Err(pdf.error(ParseError::ObjectStreamRead(number)));
                }

                let Ok(member) = u32::try_from(member_number) else {
                    return Err(pdf.error(ParseError::ObjectStreamRead(number)));
                };

                // A member number already present belongs to a newer
                // revision; its value here is parsed but discarded.
                let is_new = pdf.registry.find(member).is_none();
                if is_new {
                    pdf.registry.add(member, 0, 0);
                }
                members.push((member, is_new));
            }
            Token::Eof => {
                // The preamble must end at the first value token
                return Err(pdf.error(ParseError::ObjectStreamRead(number)));
            }
            other => {
                lexer.push_token(other);
                break;
            }
        }
    }

    for (member, is_new) in members {
        let value = match PdfObject::parse(&mut lexer) {
            Ok(value) => value,
            Err(e) => {
                log::debug!("object stream {number} member {member} failed: {e}");
                return Err(pdf.error(ParseError::ObjectStreamRead(number)));
            }
        };

        if is_new {
            pdf.registry
                .find_mut(member)
                .expect("member registered above")
                .set_value(value);
        }
    }

    Ok(())
}
