//! PDF Object Parser
//!
//! Parses PDF values from tokens according to ISO 32000-1 Section 7.3

use super::lexer::{Lexer, Token};
use super::{ParseError, ParseResult};
use std::collections::HashMap;
use std::io::{BufRead, Seek};

/// PDF Name object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PdfName(pub String);

/// PDF String object
#[derive(Debug, Clone, PartialEq)]
pub struct PdfString(pub Vec<u8>);

/// PDF Array object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfArray(pub Vec<PdfObject>);

/// PDF Dictionary object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfDictionary(pub HashMap<PdfName, PdfObject>);

/// PDF Stream object: a dictionary plus its raw (still encoded) body
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    pub dict: PdfDictionary,
    pub data: Vec<u8>,
}

impl PdfStream {
    /// Get the decoded stream data
    pub fn decode(&self) -> ParseResult<Vec<u8>> {
        super::filters::decode_stream(&self.data, &self.dict)
    }

    /// Get the raw (possibly compressed) stream data
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }
}

/// PDF value types
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(PdfString),
    Name(PdfName),
    Array(PdfArray),
    Dictionary(PdfDictionary),
    Stream(PdfStream),
    Reference(u32, u16), // object number, generation number
}

impl PdfObject {
    /// Parse a PDF value from a lexer
    ///
    /// Stream bodies are not consumed here: a dictionary followed by the
    /// `stream` keyword parses as the dictionary, with the keyword left for
    /// the caller (which knows how to resolve the stream length).
    pub fn parse<R: BufRead + Seek>(lexer: &mut Lexer<R>) -> ParseResult<Self> {
        let token = lexer.next_token()?;
        Self::parse_from_token(lexer, token)
    }

    fn parse_from_token<R: BufRead + Seek>(lexer: &mut Lexer<R>, token: Token) -> ParseResult<Self> {
        match token {
            Token::Null => Ok(PdfObject::Null),
            Token::Boolean(b) => Ok(PdfObject::Boolean(b)),
            Token::Integer(i) => Self::parse_integer_or_reference(lexer, i),
            Token::Real(r) => Ok(PdfObject::Real(r)),
            Token::String(s) => Ok(PdfObject::String(PdfString(s))),
            Token::Name(n) => Ok(PdfObject::Name(PdfName(n))),
            Token::ArrayStart => Self::parse_array(lexer),
            Token::DictStart => Self::parse_dictionary(lexer),
            Token::Comment(_) => Self::parse(lexer),
            Token::Eof => Err(ParseError::SyntaxError {
                position: lexer.position().unwrap_or(0),
                message: "Unexpected end of file".to_string(),
            }),
            other => Err(ParseError::UnexpectedToken {
                expected: "PDF value".to_string(),
                found: format!("{other:?}"),
            }),
        }
    }

    /// An integer may begin an indirect reference: `<num> <gen> R`
    fn parse_integer_or_reference<R: BufRead + Seek>(
        lexer: &mut Lexer<R>,
        value: i64,
    ) -> ParseResult<Self> {
        let second = lexer.next_token()?;
        if let Token::Integer(generation) = second {
            let third = lexer.next_token()?;
            if third == Token::R
                && (0..=u32::MAX as i64).contains(&value)
                && (0..=u16::MAX as i64).contains(&generation)
            {
                return Ok(PdfObject::Reference(value as u32, generation as u16));
            }
            lexer.push_token(third);
        }
        lexer.push_token(second);
        Ok(PdfObject::Integer(value))
    }

    fn parse_array<R: BufRead + Seek>(lexer: &mut Lexer<R>) -> ParseResult<Self> {
        let mut elements = Vec::new();

        loop {
            let token = lexer.next_token()?;
            match token {
                Token::ArrayEnd => break,
                Token::Comment(_) => continue,
                _ => elements.push(Self::parse_from_token(lexer, token)?),
            }
        }

        Ok(PdfObject::Array(PdfArray(elements)))
    }

    fn parse_dictionary<R: BufRead + Seek>(lexer: &mut Lexer<R>) -> ParseResult<Self> {
        let mut dict = HashMap::new();

        loop {
            let token = lexer.next_token()?;
            match token {
                Token::DictEnd => break,
                Token::Comment(_) => continue,
                Token::Name(key) => {
                    let value = Self::parse(lexer)?;
                    dict.insert(PdfName(key), value);
                }
                other => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "dictionary key (name) or >>".to_string(),
                        found: format!("{other:?}"),
                    });
                }
            }
        }

        Ok(PdfObject::Dictionary(PdfDictionary(dict)))
    }

    /// Check if this object is null
    pub fn is_null(&self) -> bool {
        matches!(self, PdfObject::Null)
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PdfObject::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PdfObject::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as real number (integers widen)
    pub fn as_real(&self) -> Option<f64> {
        match self {
            PdfObject::Real(r) => Some(*r),
            PdfObject::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            PdfObject::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as name
    pub fn as_name(&self) -> Option<&PdfName> {
        match self {
            PdfObject::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Get as array
    pub fn as_array(&self) -> Option<&PdfArray> {
        match self {
            PdfObject::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get as dictionary (a stream exposes its dictionary)
    pub fn as_dict(&self) -> Option<&PdfDictionary> {
        match self {
            PdfObject::Dictionary(d) => Some(d),
            PdfObject::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// Get as stream
    pub fn as_stream(&self) -> Option<&PdfStream> {
        match self {
            PdfObject::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// Get as reference
    pub fn as_reference(&self) -> Option<(u32, u16)> {
        match self {
            PdfObject::Reference(num, gen) => Some((*num, *gen)),
            _ => None,
        }
    }
}

impl PdfDictionary {
    /// Create a new empty dictionary
    pub fn new() -> Self {
        PdfDictionary(HashMap::new())
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        self.0.get(&PdfName(key.to_string()))
    }

    /// Insert a key-value pair
    pub fn insert(&mut self, key: impl Into<String>, value: PdfObject) {
        self.0.insert(PdfName(key.into()), value);
    }

    /// Check if dictionary contains a key
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(&PdfName(key.to_string()))
    }

    /// Get the dictionary type (value of /Type key)
    pub fn get_type(&self) -> Option<&str> {
        self.get("Type").and_then(|obj| obj.as_name()).map(|n| n.as_str())
    }
}

impl PdfArray {
    /// Create a new empty array
    pub fn new() -> Self {
        PdfArray(Vec::new())
    }

    /// Get array length
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if array is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get element at index
    pub fn get(&self, index: usize) -> Option<&PdfObject> {
        self.0.get(index)
    }

    /// Push an element
    pub fn push(&mut self, obj: PdfObject) {
        self.0.push(obj);
    }

    /// Iterate over elements
    pub fn iter(&self) -> std::slice::Iter<'_, PdfObject> {
        self.0.iter()
    }
}

impl PdfString {
    /// Create a new PDF string
    pub fn new(data: Vec<u8>) -> Self {
        PdfString(data)
    }

    /// Get as UTF-8 string if possible
    pub fn as_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.0)
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl PdfName {
    /// Create a new PDF name
    pub fn new(name: impl Into<String>) -> Self {
        PdfName(name.into())
    }

    /// Get the name as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
