//! PDF Stream Filters
//!
//! Handles decompression and decoding of stream bodies according to
//! ISO 32000-1 Section 7.4. Cross-reference and object streams need
//! FlateDecode (usually with a PNG predictor); everything beyond that is
//! out of scope for this engine and reported as unsupported.

use super::objects::{PdfDictionary, PdfObject};
use super::{ParseError, ParseResult};
use flate2::read::ZlibDecoder;
use std::io::Read;

/// Supported stream filters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Filter {
    /// ASCII hex decode
    ASCIIHexDecode,

    /// Flate decode (zlib/deflate compression)
    FlateDecode,
}

impl Filter {
    /// Parse filter from name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ASCIIHexDecode" => Some(Filter::ASCIIHexDecode),
            "FlateDecode" => Some(Filter::FlateDecode),
            _ => None,
        }
    }
}

/// Decode stream data according to the `/Filter` entry of its dictionary
pub fn decode_stream(data: &[u8], dict: &PdfDictionary) -> ParseResult<Vec<u8>> {
    let filters = match dict.get("Filter") {
        Some(PdfObject::Name(name)) => vec![name.as_str()],
        Some(PdfObject::Array(array)) => {
            let mut names = Vec::new();
            for obj in array.iter() {
                match obj {
                    PdfObject::Name(name) => names.push(name.as_str()),
                    _ => {
                        return Err(ParseError::StreamDecode(
                            "Invalid filter in array".to_string(),
                        ))
                    }
                }
            }
            names
        }
        None => return Ok(data.to_vec()),
        _ => return Err(ParseError::StreamDecode("Invalid Filter type".to_string())),
    };

    let mut result = data.to_vec();
    for (index, name) in filters.iter().enumerate() {
        let filter = Filter::from_name(name)
            .ok_or_else(|| ParseError::StreamDecode(format!("Unsupported filter: {name}")))?;

        result = match filter {
            Filter::FlateDecode => decode_flate(&result)?,
            Filter::ASCIIHexDecode => decode_ascii_hex(&result)?,
        };

        if let Some(parms) = decode_parms(dict, index) {
            result = apply_predictor(&result, &parms)?;
        }
    }

    Ok(result)
}

/// `/DecodeParms` is either a single dictionary or an array parallel to the
/// filter array.
fn decode_parms(dict: &PdfDictionary, index: usize) -> Option<PdfDictionary> {
    match dict.get("DecodeParms").or_else(|| dict.get("DP")) {
        Some(PdfObject::Dictionary(parms)) if index == 0 => Some(parms.clone()),
        Some(PdfObject::Array(array)) => match array.get(index) {
            Some(PdfObject::Dictionary(parms)) => Some(parms.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn decode_flate(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut result = Vec::new();
    decoder
        .read_to_end(&mut result)
        .map_err(|e| ParseError::StreamDecode(format!("Flate decode failed: {e}")))?;
    Ok(result)
}

fn decode_ascii_hex(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut result = Vec::new();
    let mut pending: Option<u8> = None;

    for &byte in data {
        if byte == b'>' {
            break;
        }
        if byte.is_ascii_whitespace() {
            continue;
        }
        let digit = (byte as char)
            .to_digit(16)
            .ok_or_else(|| ParseError::StreamDecode("Invalid hex digit".to_string()))?
            as u8;
        match pending.take() {
            Some(hi) => result.push((hi << 4) | digit),
            None => pending = Some(digit),
        }
    }

    // An odd final digit is padded with zero
    if let Some(hi) = pending {
        result.push(hi << 4);
    }

    Ok(result)
}

/// Undo the `/Predictor` transform named in the decode parameters.
///
/// Predictor 2 is the TIFF horizontal differencing predictor; 10..=15 are
/// the PNG row filters (the per-row filter byte selects the actual
/// algorithm, so all PNG variants decode identically).
fn apply_predictor(data: &[u8], parms: &PdfDictionary) -> ParseResult<Vec<u8>> {
    let predictor = parms.get("Predictor").and_then(|o| o.as_integer()).unwrap_or(1);
    let colors = parms.get("Colors").and_then(|o| o.as_integer()).unwrap_or(1) as usize;
    let bits = parms
        .get("BitsPerComponent")
        .and_then(|o| o.as_integer())
        .unwrap_or(8) as usize;
    let columns = parms.get("Columns").and_then(|o| o.as_integer()).unwrap_or(1) as usize;

    let bytes_per_pixel = (colors * bits).div_ceil(8).max(1);
    let bytes_per_row = (columns * colors * bits).div_ceil(8);

    match predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff_predictor(data, bytes_per_pixel, bytes_per_row),
        10..=15 => decode_png_predictor(data, bytes_per_pixel, bytes_per_row),
        other => Err(ParseError::StreamDecode(format!(
            "Unsupported predictor: {other}"
        ))),
    }
}

fn decode_tiff_predictor(
    data: &[u8],
    bytes_per_pixel: usize,
    bytes_per_row: usize,
) -> ParseResult<Vec<u8>> {
    if bytes_per_row == 0 || data.len() % bytes_per_row != 0 {
        return Err(ParseError::StreamDecode(
            "Data length not divisible by row length".to_string(),
        ));
    }

    let mut result = data.to_vec();
    for row in result.chunks_mut(bytes_per_row) {
        for i in bytes_per_pixel..row.len() {
            row[i] = row[i].wrapping_add(row[i - bytes_per_pixel]);
        }
    }
    Ok(result)
}

fn decode_png_predictor(
    data: &[u8],
    bytes_per_pixel: usize,
    bytes_per_row: usize,
) -> ParseResult<Vec<u8>> {
    let row_len = bytes_per_row + 1; // leading filter-type byte
    if row_len < 2 || data.len() % row_len != 0 {
        return Err(ParseError::StreamDecode(
            "Data length not divisible by predictor row length".to_string(),
        ));
    }

    let mut result = Vec::with_capacity(data.len() / row_len * bytes_per_row);
    let mut previous = vec![0u8; bytes_per_row];

    for row in data.chunks(row_len) {
        let filter_type = row[0];
        let mut current = row[1..].to_vec();

        match filter_type {
            0 => {}
            1 => {
                // Sub
                for i in bytes_per_pixel..bytes_per_row {
                    current[i] = current[i].wrapping_add(current[i - bytes_per_pixel]);
                }
            }
            2 => {
                // Up
                for i in 0..bytes_per_row {
                    current[i] = current[i].wrapping_add(previous[i]);
                }
            }
            3 => {
                // Average
                for i in 0..bytes_per_row {
                    let left = if i >= bytes_per_pixel {
                        current[i - bytes_per_pixel] as u16
                    } else {
                        0
                    };
                    let up = previous[i] as u16;
                    current[i] = current[i].wrapping_add(((left + up) / 2) as u8);
                }
            }
            4 => {
                // Paeth
                for i in 0..bytes_per_row {
                    let left = if i >= bytes_per_pixel {
                        current[i - bytes_per_pixel] as i16
                    } else {
                        0
                    };
                    let up = previous[i] as i16;
                    let up_left = if i >= bytes_per_pixel {
                        previous[i - bytes_per_pixel] as i16
                    } else {
                        0
                    };
                    let p = left + up - up_left;
                    let predicted = if (p - left).abs() <= (p - up).abs()
                        && (p - left).abs() <= (p - up_left).abs()
                    {
                        left
                    } else if (p - up).abs() <= (p - up_left).abs() {
                        up
                    } else {
                        up_left
                    };
                    current[i] = current[i].wrapping_add(predicted as u8);
                }
            }
            other => {
                return Err(ParseError::StreamDecode(format!(
                    "Invalid PNG filter type: {other}"
                )));
            }
        }

        result.extend_from_slice(&current);
        previous = current;
    }

    Ok(result)
}
