//! Concatenation stage
//!
//! Splices the pages of every input document, in list order, into a single
//! in-memory document. Based on the lopdf merge example:
//! https://github.com/J-F-Liu/lopdf/blob/main/examples/merge.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};

/// Concatenate the given PDFs into one document
///
/// Pages keep their original per-file order; the output order is the input
/// order. The result is not written anywhere, the pipeline owns file
/// staging.
///
/// Fails with [`Error::DocumentRead`] on the first input that cannot be
/// loaded and [`Error::EmptyDocument`] on an input without pages.
pub fn concatenate(paths: &[PathBuf]) -> Result<Document> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let doc = Document::load(path).map_err(|source| Error::DocumentRead {
            path: path.clone(),
            source,
        })?;

        if doc.get_pages().is_empty() {
            return Err(Error::EmptyDocument(path.clone()));
        }

        documents.push(doc);
    }

    // Renumber every document into one id space, collecting page ids in
    // merge order and all objects into a single map.
    let mut max_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut doc in documents {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        let pages = doc.get_pages();
        page_ids.extend(pages.into_values());

        objects.extend(doc.objects);
    }

    let mut merged = Document::with_version("1.5");
    merged.objects.extend(objects);

    // max_id must reflect the ids just imported, otherwise new_object_id()
    // hands out ids that collide with existing objects.
    merged.max_id = max_id - 1;

    let pages_id = merged.new_object_id();

    let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();

    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", Object::Integer(page_ids.len() as i64));
    pages_dict.set("Kids", Object::Array(kids));

    let catalog_id = merged.new_object_id();
    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));

    merged.objects.insert(catalog_id, Object::Dictionary(catalog));
    merged.objects.insert(pages_id, Object::Dictionary(pages_dict));
    merged.trailer.set("Root", Object::Reference(catalog_id));

    // Every page now hangs off the new Pages node.
    for &page_id in &page_ids {
        if let Ok(Object::Dictionary(ref mut dict)) = merged.get_object_mut(page_id) {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenate_nonexistent_file_reports_path() {
        let missing = PathBuf::from("does-not-exist.pdf");
        let err = concatenate(&[missing.clone()]).unwrap_err();
        match err {
            Error::DocumentRead { path, .. } => assert_eq!(path, missing),
            other => panic!("expected DocumentRead, got {other:?}"),
        }
    }

    // Concatenation over real documents is covered in tests/integration.rs
}
