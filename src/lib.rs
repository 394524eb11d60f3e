//! # ferropdf
//!
//! The file/xref core of a PDF engine: open a PDF byte stream, rebuild its
//! object graph from the cross-reference data at the tail of the file, and
//! expose that graph to higher-level consumers.
//!
//! ## Features
//!
//! - **Cross-reference loading**: classical xref tables and cross-reference
//!   streams, chained through `Prev` across incremental updates
//! - **Object streams**: compressed object streams are materialized into
//!   individually addressable objects
//! - **Page tree flattening**: the recursive Pages structure becomes an
//!   ordered page list
//! - **Lazy object loading**: object values are parsed on demand from their
//!   recorded file offsets
//! - **Writing**: file creation with header emission, and close-time
//!   commitment of objects, xref table, and trailer
//!
//! ## Reading
//!
//! ```rust,no_run
//! use ferropdf::PdfFile;
//!
//! # fn main() -> ferropdf::Result<()> {
//! let pdf = PdfFile::open("document.pdf")?;
//! println!("version: {}", pdf.version());
//! println!("{} objects, {} pages", pdf.num_objects(), pdf.num_pages());
//!
//! if let Some(page) = pdf.get_page(0) {
//!     println!("first page is object {}", page.number());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Writing
//!
//! ```rust,no_run
//! use ferropdf::{PdfDictionary, PdfFile, PdfName, PdfObject};
//!
//! # fn main() -> ferropdf::Result<()> {
//! let mut pdf = PdfFile::create("output.pdf", Some("1.7"))?;
//!
//! let mut pages = PdfDictionary::new();
//! pages.insert("Type", PdfObject::Name(PdfName::new("Pages")));
//! pages.insert("Kids", PdfObject::Array(ferropdf::PdfArray::new()));
//! pages.insert("Count", PdfObject::Integer(0));
//! let pages_number = pdf.create_object(pages)?;
//!
//! let mut catalog = PdfDictionary::new();
//! catalog.insert("Type", PdfObject::Name(PdfName::new("Catalog")));
//! catalog.insert("Pages", PdfObject::Reference(pages_number, 0));
//! pdf.create_object(catalog)?;
//!
//! // Close commits the xref table and trailer
//! pdf.close()?;
//! # Ok(())
//! # }
//! ```

mod error;
mod file;
mod io;
pub mod parser;
mod registry;
mod writer;

pub use error::{PdfError, Result};
pub use file::{ErrorReporter, FileMode, PdfFile};
pub use parser::{
    ParseError, ParseResult, PdfArray, PdfDictionary, PdfName, PdfObject, PdfStream, PdfString,
};
pub use registry::ObjectRecord;
