//! Page-tree flattener
//!
//! Walks the recursive Pages structure depth-first, left-to-right, and
//! appends each terminal page's object number to the file's page list.
//! Intermediate nodes carry `/Type /Pages` and a `/Kids` array; terminal
//! nodes carry `/Type /Page`. Cycles in a malformed tree are not detected.

use super::{ParseError, ParseResult};
use crate::file::PdfFile;

/// Flatten the page tree rooted at the given object into `pdf.pages`.
///
/// `None` means the caller failed to resolve the node (a missing `Pages`
/// entry or a `Kids` element that is not a registered reference), which is
/// fatal.
pub(crate) fn load_pages(pdf: &mut PdfFile, number: Option<u32>) -> ParseResult<()> {
    let Some(number) = number else {
        return Err(pdf.error(ParseError::PageTree(
            "Unable to find pages object.".to_string(),
        )));
    };

    let dict = match pdf.object_dict(number) {
        Ok(Some(dict)) => dict,
        Ok(None) => {
            return Err(pdf.error(ParseError::PageTree(
                "No dictionary for pages object.".to_string(),
            )));
        }
        Err(e) => {
            log::debug!("page tree node {number} load failed: {e}");
            return Err(pdf.error(ParseError::PageTree(
                "Unable to find pages object.".to_string(),
            )));
        }
    };

    match dict.get_type() {
        Some("Pages") | Some("Page") => {}
        other => {
            return Err(pdf.error(ParseError::PageTree(format!(
                "Invalid page tree node type '{}'.",
                other.unwrap_or_default()
            ))));
        }
    }

    if let Some(kids) = dict.get("Kids").and_then(|o| o.as_array()).cloned() {
        // Interior node: walk the children in order
        for kid in kids.iter() {
            let kid_number = kid
                .as_reference()
                .map(|(number, _)| number)
                .filter(|number| pdf.registry.find(*number).is_some());
            load_pages(pdf, kid_number)?;
        }
    } else {
        pdf.pages.push(number);
    }

    Ok(())
}
