//! PDF file lifecycle
//!
//! One [`PdfFile`] represents one opened document. Opening a file for
//! reading validates the header, locates `startxref` in the file tail, and
//! hands off to the xref loader, which seeds the object registry with
//! records pointing at file offsets. Object values are materialized on
//! demand from those offsets. Creating a file for writing emits the header
//! lines; the xref table and trailer are committed by [`PdfFile::close`].
//!
//! The file handle is the single owner of every record, value, and page
//! slot derived from it; dropping the handle releases everything.

use crate::error::{PdfError, Result};
use crate::io::FileIo;
use crate::parser::header;
use crate::parser::lexer::{Lexer, Token};
use crate::parser::objects::{PdfArray, PdfDictionary, PdfObject, PdfStream};
use crate::parser::xref;
use crate::parser::{ParseError, ParseResult};
use crate::registry::{ObjectRecord, ObjectRegistry};
use std::fs::{File, OpenOptions};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

/// How a file was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Write,
}

/// Error reporter installed at open/create time. Invoked exactly once per
/// fatal diagnostic, with the filename and a human-readable message, before
/// the failing operation returns.
pub type ErrorReporter = Box<dyn FnMut(&Path, &str)>;

fn default_reporter() -> ErrorReporter {
    Box::new(|filename, message| log::error!("{}: {message}", filename.display()))
}

/// An open PDF document.
pub struct PdfFile {
    filename: PathBuf,
    version: String,
    mode: FileMode,
    pub(crate) io: FileIo,
    pub(crate) registry: ObjectRegistry,
    pub(crate) pages: Vec<u32>,
    pub(crate) trailer: Option<PdfDictionary>,
    pub(crate) root: Option<u32>,
    pub(crate) info: Option<u32>,
    pub(crate) encrypt: Option<u32>,
    pub(crate) id_array: Option<PdfArray>,
    reporter: ErrorReporter,
}

impl PdfFile {
    /// Open a PDF file for reading.
    ///
    /// Diagnostics go to the `log` crate; use
    /// [`PdfFile::open_with_reporter`] to capture them instead.
    pub fn open(filename: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_reporter(filename, default_reporter())
    }

    /// Open a PDF file for reading with an explicit error reporter.
    pub fn open_with_reporter(
        filename: impl AsRef<Path>,
        mut reporter: ErrorReporter,
    ) -> Result<Self> {
        let filename = filename.as_ref().to_path_buf();

        let file = match File::open(&filename) {
            Ok(file) => file,
            Err(e) => {
                reporter(&filename, &format!("Unable to open file - {e}."));
                return Err(e.into());
            }
        };

        let mut pdf = PdfFile {
            filename,
            version: String::new(),
            mode: FileMode::Read,
            io: FileIo::reading(file),
            registry: ObjectRegistry::new(),
            pages: Vec::new(),
            trailer: None,
            root: None,
            info: None,
            encrypt: None,
            id_array: None,
            reporter,
        };

        // On failure the partially constructed handle is dropped, which
        // releases the descriptor and everything loaded so far.
        pdf.load()?;
        Ok(pdf)
    }

    /// Create a PDF file for writing.
    ///
    /// `version` defaults to `"2.0"` and must match `[12].<digit>`.
    pub fn create(filename: impl AsRef<Path>, version: Option<&str>) -> Result<Self> {
        Self::create_with_reporter(filename, version, default_reporter())
    }

    /// Create a PDF file for writing with an explicit error reporter.
    pub fn create_with_reporter(
        filename: impl AsRef<Path>,
        version: Option<&str>,
        mut reporter: ErrorReporter,
    ) -> Result<Self> {
        let filename = filename.as_ref().to_path_buf();
        let version = version.unwrap_or("2.0");

        if !header::is_valid_version(version) {
            reporter(&filename, &format!("Invalid PDF version '{version}'."));
            return Err(PdfError::InvalidVersion(version.to_string()));
        }

        let file = match OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&filename)
        {
            Ok(file) => file,
            Err(e) => {
                reporter(&filename, &format!("Unable to create file - {e}."));
                return Err(e.into());
            }
        };

        let mut pdf = PdfFile {
            filename,
            version: version.to_string(),
            mode: FileMode::Write,
            io: FileIo::writing(file),
            registry: ObjectRegistry::new(),
            pages: Vec::new(),
            trailer: None,
            root: None,
            info: None,
            encrypt: None,
            id_array: None,
            reporter,
        };

        if let Err(e) = pdf.write_header() {
            let err = pdf.fail_io("Unable to write PDF header.", e);
            let _ = std::fs::remove_file(&pdf.filename);
            return Err(err);
        }

        Ok(pdf)
    }

    /// Close the file.
    ///
    /// For a write-mode file this is the trailer-commit point: every
    /// registered object is serialized, followed by the xref table and
    /// trailer. Resources are released in both modes regardless of the
    /// outcome. Dropping a write-mode handle without calling `close`
    /// abandons the trailer and leaves the file unreadable.
    pub fn close(mut self) -> Result<()> {
        let mut result = Ok(());

        if self.mode == FileMode::Write {
            result = crate::writer::write_file_tail(&mut self);
        }

        if let Err(e) = self.io.finish() {
            let err = self.fail_io("Unable to close file.", e);
            if result.is_ok() {
                result = Err(err);
            }
        }

        result
    }

    /// The filename this handle was opened or created with.
    pub fn name(&self) -> &Path {
        &self.filename
    }

    /// The PDF version string, e.g. `"1.7"`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Read or write mode.
    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// The file's ID array from the trailer, if any.
    pub fn id(&self) -> Option<&PdfArray> {
        self.id_array.as_ref()
    }

    /// The trailer dictionary, once the xref chain has been loaded.
    pub fn trailer(&self) -> Option<&PdfDictionary> {
        self.trailer.as_ref()
    }

    /// Find an object by its object number.
    ///
    /// This differs from [`PdfFile::get_object`], which takes an index into
    /// the list of objects.
    pub fn find_object(&self, number: u32) -> Option<&ObjectRecord> {
        self.registry.find(number)
    }

    /// Get an object by index (starting at 0). The index is informational
    /// only and is not stable across loader revisions.
    pub fn get_object(&self, index: usize) -> Option<&ObjectRecord> {
        self.registry.get(index)
    }

    /// Number of objects in the file.
    pub fn num_objects(&self) -> usize {
        self.registry.len()
    }

    /// Get a page object by page index (starting at 0).
    pub fn get_page(&self, index: usize) -> Option<&ObjectRecord> {
        let number = *self.pages.get(index)?;
        self.registry.find(number)
    }

    /// Number of pages in the file.
    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// The catalog (Root) object record.
    pub fn root_object(&self) -> Option<&ObjectRecord> {
        self.registry.find(self.root?)
    }

    /// The Info object record, if the trailer names one.
    pub fn info_object(&self) -> Option<&ObjectRecord> {
        self.registry.find(self.info?)
    }

    /// The Encrypt object record, if the trailer names one. Encryption is
    /// recorded but not resolved by this engine.
    pub fn encrypt_object(&self) -> Option<&ObjectRecord> {
        self.registry.find(self.encrypt?)
    }

    /// Materialize and return an object's value.
    pub fn object_value(&mut self, number: u32) -> Result<&PdfObject> {
        if let Err(e) = self.ensure_object_loaded(number) {
            return Err(self.error(e).into());
        }
        Ok(self
            .registry
            .find(number)
            .and_then(|record| record.value())
            .expect("value present after load"))
    }

    /// The document catalog dictionary.
    pub fn catalog(&mut self) -> Result<PdfDictionary> {
        let Some(root) = self.root else {
            return Err(self.error(ParseError::MissingRoot).into());
        };
        match self.object_dict(root) {
            Ok(Some(dict)) => Ok(dict),
            Ok(None) => Err(self.error(ParseError::MissingRoot).into()),
            Err(e) => Err(self.error(e).into()),
        }
    }

    /// The document information dictionary, if any.
    pub fn info_dict(&mut self) -> Result<Option<PdfDictionary>> {
        let Some(info) = self.info else {
            return Ok(None);
        };
        self.object_dict(info).map_err(|e| self.error(e).into())
    }

    /// Create a new object in a write-mode file.
    ///
    /// The object takes the next free object number, generation 0, and the
    /// current file position as its offset; the dictionary becomes its
    /// value. Returns the object number; the record is reachable through
    /// [`PdfFile::find_object`].
    pub fn create_object(&mut self, dict: PdfDictionary) -> Result<u32> {
        if self.mode != FileMode::Write {
            self.report("Unable to create objects in a read-mode file.");
            return Err(PdfError::NotWritable);
        }

        let number = self.registry.len() as u32 + 1;
        let offset = self.io.tell().map_err(PdfError::Io)?;
        self.registry.add(number, 0, offset);
        self.registry
            .find_mut(number)
            .expect("record just added")
            .set_value(PdfObject::Dictionary(dict));
        Ok(number)
    }

    // Internal: read-path orchestration

    fn load(&mut self) -> Result<()> {
        let line = match self.io.read_line() {
            Ok(Some(line)) => line,
            Ok(None) => {
                return Err(self.error(ParseError::InvalidHeader(String::new())).into());
            }
            Err(e) => return Err(self.fail_io("Unable to read PDF header.", e)),
        };

        self.version = match header::parse_header_line(&line) {
            Ok(version) => version,
            Err(e) => return Err(self.error(e).into()),
        };

        let xref_offset = self.find_startxref()?;
        xref::load_xref(self, xref_offset)?;
        Ok(())
    }

    /// Locate the `startxref` offset in the last 32 bytes of the file.
    fn find_startxref(&mut self) -> Result<u64> {
        let mut tail = [0u8; 32];
        if let Err(e) = self.io.seek(SeekFrom::End(-32)) {
            return Err(self.fail_io("Unable to read startxref data.", e));
        }
        if let Err(e) = self.io.read_exact(&mut tail) {
            return Err(self.fail_io("Unable to read startxref data.", e));
        }

        let text = String::from_utf8_lossy(&tail).into_owned();
        let Some(pos) = text.find("startxref") else {
            return Err(self.error(ParseError::XrefLocate).into());
        };

        let digits: String = text[pos + "startxref".len()..]
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();

        match digits.parse::<u64>() {
            Ok(offset) => Ok(offset),
            Err(_) => Err(self.error(ParseError::XrefLocate).into()),
        }
    }

    /// Materialize an object's value from its recorded file offset, if it
    /// has not been loaded yet. Does not report; callers add context.
    pub(crate) fn ensure_object_loaded(&mut self, number: u32) -> ParseResult<()> {
        let (offset, generation) = match self.registry.find(number) {
            Some(record) => {
                if record.value().is_some() {
                    return Ok(());
                }
                (record.offset(), record.generation())
            }
            None => return Err(ParseError::InvalidReference(number, 0)),
        };

        if offset == 0 {
            // A record without a stored offset gets its value from an
            // object-stream decode, never from a file seek.
            return Err(ParseError::InvalidReference(number, generation));
        }

        self.io.seek(SeekFrom::Start(offset))?;

        let (value, stream_start) = {
            let reader = self.io.reader()?;
            let mut lexer = Lexer::new(reader);

            let read_number = expect_integer(&mut lexer, "object number")?;
            let read_generation = expect_integer(&mut lexer, "generation number")?;
            if read_number != i64::from(number) || read_generation != i64::from(generation) {
                return Err(ParseError::SyntaxError {
                    position: offset,
                    message: format!(
                        "Object header mismatch: expected {number} {generation} obj, found {read_number} {read_generation} obj"
                    ),
                });
            }
            expect_token(&mut lexer, Token::Obj, "obj")?;

            let value = PdfObject::parse(&mut lexer)?;

            match lexer.next_token()? {
                Token::Stream => {
                    lexer.read_newline()?;
                    (value, Some(lexer.position()?))
                }
                Token::EndObj => (value, None),
                other => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "endobj or stream".to_string(),
                        found: format!("{other:?}"),
                    });
                }
            }
        };

        let value = match stream_start {
            None => value,
            Some(data_offset) => {
                let dict = match value {
                    PdfObject::Dictionary(dict) => dict,
                    _ => {
                        return Err(ParseError::SyntaxError {
                            position: data_offset,
                            message: "stream keyword without a dictionary".to_string(),
                        });
                    }
                };

                let length = self.stream_length(&dict)?;
                self.io.seek(SeekFrom::Start(data_offset))?;
                let data = self.io.read_exact_vec(length)?;

                {
                    let reader = self.io.reader()?;
                    let mut lexer = Lexer::new(reader);
                    expect_token(&mut lexer, Token::EndStream, "endstream")?;
                    expect_token(&mut lexer, Token::EndObj, "endobj")?;
                }

                PdfObject::Stream(PdfStream { dict, data })
            }
        };

        let record = self.registry.find_mut(number).expect("record exists");
        record.set_value(value);
        if let Some(data_offset) = stream_start {
            record.set_stream_offset(data_offset);
        }
        Ok(())
    }

    /// Materialize an object and clone its dictionary, if it has one.
    pub(crate) fn object_dict(&mut self, number: u32) -> ParseResult<Option<PdfDictionary>> {
        self.ensure_object_loaded(number)?;
        Ok(self
            .registry
            .find(number)
            .and_then(|record| record.value())
            .and_then(|value| value.as_dict())
            .cloned())
    }

    /// Resolve a stream's `/Length`, loading the referenced object when the
    /// entry is indirect.
    fn stream_length(&mut self, dict: &PdfDictionary) -> ParseResult<usize> {
        match dict.get("Length") {
            Some(PdfObject::Integer(n)) if *n >= 0 => Ok(*n as usize),
            Some(PdfObject::Reference(num, gen)) => {
                let (num, gen) = (*num, *gen);
                self.ensure_object_loaded(num)?;
                let length = self
                    .registry
                    .find(num)
                    .and_then(|record| record.value())
                    .and_then(|value| value.as_integer());
                match length {
                    Some(n) if n >= 0 => Ok(n as usize),
                    _ => Err(ParseError::InvalidReference(num, gen)),
                }
            }
            _ => Err(ParseError::MissingKey("Length".to_string())),
        }
    }

    fn write_header(&mut self) -> std::io::Result<()> {
        self.io
            .write_all(format!("%PDF-{}\n", self.version).as_bytes())?;
        let mut marker = Vec::with_capacity(6);
        marker.push(b'%');
        marker.extend_from_slice(&header::BINARY_MARKER);
        marker.push(b'\n');
        self.io.write_all(&marker)
    }

    // Internal: diagnostics

    pub(crate) fn report(&mut self, message: &str) {
        (self.reporter)(&self.filename, message);
    }

    /// Report a fatal parse diagnostic and hand the error back for
    /// propagation. Call this where the error is produced, not where it is
    /// passed along, so each diagnostic is reported exactly once.
    pub(crate) fn error(&mut self, err: ParseError) -> ParseError {
        let message = err.to_string();
        self.report(&message);
        err
    }

    pub(crate) fn fail_io(&mut self, message: &str, err: std::io::Error) -> PdfError {
        self.report(message);
        PdfError::Io(err)
    }
}

fn expect_integer<R: std::io::BufRead + std::io::Seek>(
    lexer: &mut Lexer<R>,
    what: &str,
) -> ParseResult<i64> {
    match lexer.next_token()? {
        Token::Integer(n) => Ok(n),
        other => Err(ParseError::UnexpectedToken {
            expected: what.to_string(),
            found: format!("{other:?}"),
        }),
    }
}

fn expect_token<R: std::io::BufRead + std::io::Seek>(
    lexer: &mut Lexer<R>,
    expected: Token,
    what: &str,
) -> ParseResult<()> {
    let token = lexer.next_token()?;
    if token == expected {
        Ok(())
    } else {
        Err(ParseError::UnexpectedToken {
            expected: what.to_string(),
            found: format!("{token:?}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_writes_header_and_binary_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("header.pdf");

        let pdf = PdfFile::create(&path, Some("1.7")).unwrap();
        assert_eq!(pdf.version(), "1.7");
        assert_eq!(pdf.mode(), FileMode::Write);
        drop(pdf);

        let content = std::fs::read(&path).unwrap();
        assert!(content.starts_with(b"%PDF-1.7\n"));
        assert_eq!(&content[9..15], &[b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n']);
    }

    #[test]
    fn test_create_defaults_to_version_2_0() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.pdf");

        let pdf = PdfFile::create(&path, None).unwrap();
        assert_eq!(pdf.version(), "2.0");
    }

    #[test]
    fn test_create_rejects_bad_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pdf");

        match PdfFile::create(&path, Some("3.0")) {
            Err(PdfError::InvalidVersion(v)) => assert_eq!(v, "3.0"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected InvalidVersion"),
        }
    }

    #[test]
    fn test_create_object_requires_write_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.pdf");

        let mut pdf = PdfFile::create(&path, None).unwrap();
        let number = pdf.create_object(PdfDictionary::new()).unwrap();
        assert_eq!(number, 1);
        assert_eq!(pdf.num_objects(), 1);
        // Offset is the file position at creation time
        assert_eq!(pdf.find_object(1).unwrap().offset(), 15);
    }

    #[test]
    fn test_open_missing_file_reports() {
        use std::sync::{Arc, Mutex};

        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&messages);
        let result = PdfFile::open_with_reporter(
            "/nonexistent/definitely-missing.pdf",
            Box::new(move |_, message| sink.lock().unwrap().push(message.to_string())),
        );
        assert!(result.is_err());
        let messages = messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Unable to open file"));
    }
}
