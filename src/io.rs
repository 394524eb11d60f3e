//! Byte-I/O layer over the backing file descriptor
//!
//! A file handle is either a buffered reader or a position-tracked buffered
//! writer; all higher layers go through this module so that logical file
//! positions stay exact across seeks, line reads, and token scans.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};

/// Maximum length of a single line read from a PDF file.
const LINE_LIMIT: usize = 1024;

pub(crate) enum FileIo {
    Read(BufReader<File>),
    Write { out: BufWriter<File>, position: u64 },
}

impl FileIo {
    pub(crate) fn reading(file: File) -> Self {
        FileIo::Read(BufReader::new(file))
    }

    pub(crate) fn writing(file: File) -> Self {
        FileIo::Write {
            out: BufWriter::new(file),
            position: 0,
        }
    }

    pub(crate) fn reader(&mut self) -> io::Result<&mut BufReader<File>> {
        match self {
            FileIo::Read(reader) => Ok(reader),
            FileIo::Write { .. } => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "file is not open for reading",
            )),
        }
    }

    pub(crate) fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader()?.seek(pos)
    }

    /// Current logical position, accounting for buffering on both sides.
    pub(crate) fn tell(&mut self) -> io::Result<u64> {
        match self {
            FileIo::Read(reader) => reader.stream_position(),
            FileIo::Write { position, .. } => Ok(*position),
        }
    }

    pub(crate) fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.reader()?.read_exact(buf)
    }

    pub(crate) fn read_exact_vec(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read one line, consuming the terminating `\n`, `\r`, or `\r\n` but
    /// not including it in the result. Returns `None` at end of file.
    pub(crate) fn read_line(&mut self) -> io::Result<Option<String>> {
        let reader = self.reader()?;
        let mut bytes = Vec::new();

        loop {
            let available = reader.fill_buf()?;
            let Some(&byte) = available.first() else {
                // EOF
                if bytes.is_empty() {
                    return Ok(None);
                }
                break;
            };
            reader.consume(1);

            match byte {
                b'\n' => break,
                b'\r' => {
                    if reader.fill_buf()?.first() == Some(&b'\n') {
                        reader.consume(1);
                    }
                    break;
                }
                _ => {
                    bytes.push(byte);
                    if bytes.len() >= LINE_LIMIT {
                        break;
                    }
                }
            }
        }

        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    pub(crate) fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            FileIo::Write { out, position } => {
                out.write_all(bytes)?;
                *position += bytes.len() as u64;
                Ok(())
            }
            FileIo::Read(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "file is not open for writing",
            )),
        }
    }

    /// Flush buffered output. A no-op for read handles.
    pub(crate) fn finish(&mut self) -> io::Result<()> {
        match self {
            FileIo::Write { out, .. } => out.flush(),
            FileIo::Read(_) => Ok(()),
        }
    }
}
