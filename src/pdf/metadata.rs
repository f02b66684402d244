//! PDF metadata extraction

use std::path::Path;

use lopdf::{Document, Object};

use crate::error::{Error, Result};

/// Count pages by reading the Count field from the Pages dictionary
/// This is more reliable than get_pages() which doesn't handle nested page trees
fn count_pages_from_catalog(doc: &Document) -> Option<usize> {
    let catalog_id = match doc.trailer.get(b"Root").ok()? {
        Object::Reference(id) => *id,
        _ => return None,
    };

    let catalog = doc.get_object(catalog_id).ok()?.as_dict().ok()?;

    let pages_id = match catalog.get(b"Pages").ok()? {
        Object::Reference(id) => *id,
        _ => return None,
    };

    let pages = doc.get_object(pages_id).ok()?.as_dict().ok()?;

    match pages.get(b"Count").ok()? {
        Object::Integer(n) => Some(*n as usize),
        _ => None,
    }
}

/// Count the number of pages in a PDF file
pub fn count_pages(path: &Path) -> Result<usize> {
    let doc = Document::load(path).map_err(|source| Error::DocumentRead {
        path: path.to_path_buf(),
        source,
    })?;

    // Fall back to walking the page tree when the catalog Count is absent
    // or malformed.
    let page_count =
        count_pages_from_catalog(&doc).unwrap_or_else(|| doc.get_pages().len());

    if page_count == 0 {
        return Err(Error::EmptyDocument(path.to_path_buf()));
    }

    Ok(page_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_pages_nonexistent_file() {
        let result = count_pages(Path::new("nonexistent.pdf"));
        assert!(matches!(result, Err(Error::DocumentRead { .. })));
    }

    // Counting over real documents is covered in tests/integration.rs
}
