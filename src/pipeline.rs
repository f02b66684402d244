//! Two-stage merge pipeline
//!
//! Concatenates the requested documents into a scratch file next to the
//! output, optionally stamps page numbers onto the scratch file, then
//! publishes it with a single atomic rename. A failure at any point
//! removes the scratch file and leaves whatever was at the output path
//! untouched.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use lopdf::Document;

use crate::error::{Error, Result};
use crate::pdf::{concatenate, stamp_page_numbers};

/// One merge invocation, built by the shell from the document list
#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// Input PDF file paths in the order they should be merged
    pub ordered_paths: Vec<PathBuf>,
    /// Whether to stamp sequential page numbers onto the result
    pub number_pages: bool,
    /// Where the merged document is written
    pub output_path: PathBuf,
}

/// Outcome of a successful merge
#[derive(Debug, Clone)]
pub struct MergeReport {
    /// The written output file
    pub output_path: PathBuf,
    /// Total pages in the merged document
    pub page_count: usize,
}

/// Merge the requested documents into a single output file
///
/// Fails with [`Error::EmptyInput`] when the request has no inputs. Any
/// other failure is reported from the stage that hit it; in every failure
/// case no file is left at the output path that was not already there.
pub fn merge(request: &MergeRequest) -> Result<MergeReport> {
    if request.ordered_paths.is_empty() {
        return Err(Error::EmptyInput);
    }

    let scratch = scratch_path(&request.output_path);
    let result = run_stages(request, &scratch);
    if result.is_err() {
        // Best-effort: the scratch file must not outlive the invocation
        let _ = fs::remove_file(&scratch);
    }
    result
}

fn run_stages(request: &MergeRequest, scratch: &Path) -> Result<MergeReport> {
    let mut merged = concatenate(&request.ordered_paths)?;
    let page_count = merged.get_pages().len();

    write_document(&mut merged, scratch)?;

    if request.number_pages {
        let mut staged = Document::load(scratch).map_err(|source| Error::DocumentRead {
            path: scratch.to_path_buf(),
            source,
        })?;
        stamp_page_numbers(&mut staged)?;
        write_document(&mut staged, scratch)?;
    }

    // Single publish point for both branches: either the scratch file
    // becomes the output or the operation has already failed.
    fs::rename(scratch, &request.output_path).map_err(|source| Error::DocumentWrite {
        path: request.output_path.clone(),
        source,
    })?;

    Ok(MergeReport {
        output_path: request.output_path.clone(),
        page_count,
    })
}

/// Scratch file beside the output, `<stem>_tmp.pdf`
///
/// Staying in the output's directory keeps the final rename on one
/// filesystem.
fn scratch_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("merged");
    output.with_file_name(format!("{stem}_tmp.pdf"))
}

fn write_document(doc: &mut Document, path: &Path) -> Result<()> {
    doc.compress();

    let file = File::create(path).map_err(|source| Error::DocumentWrite {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    doc.save_to(&mut writer)
        .map_err(|e| Error::DocumentWrite {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?;

    writer.flush().map_err(|source| Error::DocumentWrite {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_request_is_rejected() {
        let request = MergeRequest {
            ordered_paths: vec![],
            number_pages: false,
            output_path: PathBuf::from("out.pdf"),
        };
        assert!(matches!(merge(&request), Err(Error::EmptyInput)));
    }

    #[test]
    fn scratch_path_is_suffixed_beside_output() {
        let scratch = scratch_path(Path::new("/tmp/out/merged.pdf"));
        assert_eq!(scratch, Path::new("/tmp/out/merged_tmp.pdf"));
    }

    #[test]
    fn scratch_path_without_extension_still_derives() {
        let scratch = scratch_path(Path::new("output"));
        assert_eq!(scratch, Path::new("output_tmp.pdf"));
    }

    // The pipeline stages over real documents are covered in
    // tests/integration.rs
}
