//! Numbering stage
//!
//! Stamps a 1-based page index near the bottom-right of every page. Each
//! stamp is a tiny content stream in a Form XObject, appended after the
//! page's own content so the number draws on top of it. Form XObjects keep
//! their own coordinate system, which shields the stamp from transforms
//! left open by the page's content.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{Error, Result};

/// Stamp font size in points
const STAMP_FONT_SIZE: f32 = 10.0;

/// Stamp position, absolute from the page origin (bottom-left). Matches a
/// Letter page: 112pt in from the right edge, 20pt up from the bottom.
/// Non-Letter pages keep the same absolute offset.
const STAMP_X: f32 = 500.0;
const STAMP_Y: f32 = 20.0;

/// Represents a PDF transformation matrix [a b c d e f]
/// where: x' = a*x + c*y + e, y' = b*x + d*y + f
#[derive(Debug, Clone)]
struct TransformMatrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl TransformMatrix {
    fn identity() -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 }
    }

    /// Calculate the inverse of this transformation matrix
    fn inverse(&self) -> Self {
        // det = a*d - b*c; a singular matrix falls back to identity
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < 1e-10 {
            return Self::identity();
        }

        Self {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            e: (self.c * self.f - self.d * self.e) / det,
            f: (self.b * self.e - self.a * self.f) / det,
        }
    }

    fn is_identity(&self) -> bool {
        (self.a - 1.0).abs() < 0.001
            && self.b.abs() < 0.001
            && self.c.abs() < 0.001
            && (self.d - 1.0).abs() < 0.001
            && self.e.abs() < 0.001
            && self.f.abs() < 0.001
    }
}

/// Stamp sequential page numbers onto every page of `doc`
///
/// Indices are 1-based and run monotonically across the whole document;
/// there are no per-file restarts. Any failure to build or attach an
/// overlay is fatal for the whole merge, so output is never partially
/// numbered.
pub fn stamp_page_numbers(doc: &mut Document) -> Result<()> {
    // Decompress for content stream parsing
    doc.decompress();

    let font_id = helvetica_font(doc);

    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();

    for (i, page_id) in pages.into_iter().enumerate() {
        let page_number = i + 1;

        let transform = detect_page_transformation(doc, page_id)
            .map_err(|e| overlay_error(page_number, e))?;

        let content = stamp_content(page_number);
        let xobject_id = stamp_form_xobject(doc, content, font_id, &transform);

        add_xobject_to_page_resources(doc, page_id, xobject_id)
            .map_err(|e| overlay_error(page_number, e))?;

        let invoke_id = doc.add_object(Stream::new(
            Dictionary::new(),
            b"q\n/PageNum Do\nQ\n".to_vec(),
        ));
        append_content_to_page(doc, page_id, invoke_id)
            .map_err(|e| overlay_error(page_number, e))?;
    }

    doc.compress();

    Ok(())
}

fn overlay_error(page: usize, source: lopdf::Error) -> Error {
    Error::OverlayRender {
        page,
        reason: source.to_string(),
    }
}

/// Helvetica, one of the 14 standard PDF fonts. A stamp that only draws
/// decimal digits needs no embedded font.
fn helvetica_font(doc: &mut Document) -> ObjectId {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));

    doc.add_object(Object::Dictionary(font))
}

/// Content stream operators for one page's stamp
fn stamp_content(page_number: usize) -> String {
    let mut content = String::new();
    content.push_str("0 g\n"); // black fill
    content.push_str("BT\n");
    content.push_str(&format!("/F1 {STAMP_FONT_SIZE} Tf\n"));
    content.push_str(&format!("1 0 0 1 {STAMP_X} {STAMP_Y} Tm\n"));
    content.push_str(&format!("({page_number}) Tj\n"));
    content.push_str("ET\n");
    content
}

/// Detect the transformation matrix applied at the start of a page's
/// content stream
///
/// Some producers (Google Docs among them) open their content with a `cm`
/// that is never restored, which would drag any appended content along
/// with it. Returns identity when no such transform is found.
fn detect_page_transformation(
    doc: &Document,
    page_id: ObjectId,
) -> std::result::Result<TransformMatrix, lopdf::Error> {
    let page_obj = doc.get_object(page_id)?;

    if let Object::Dictionary(page_dict) = page_obj {
        if let Ok(contents) = page_dict.get(b"Contents") {
            let content_ids: Vec<ObjectId> = match contents {
                Object::Reference(id) => vec![*id],
                Object::Array(arr) => arr
                    .iter()
                    .filter_map(|o| {
                        if let Object::Reference(id) = o {
                            Some(*id)
                        } else {
                            None
                        }
                    })
                    .collect(),
                _ => vec![],
            };

            // Only the first stream can establish an unrestored transform
            if let Some(content_id) = content_ids.first() {
                if let Ok(Object::Stream(stream)) = doc.get_object(*content_id) {
                    let content_str = String::from_utf8_lossy(&stream.content);
                    return Ok(parse_initial_transformation(&content_str));
                }
            }
        }
    }

    Ok(TransformMatrix::identity())
}

/// Parse the initial transformation matrix from a content stream
///
/// A `cm` wrapped in q/Q is restored before appended content runs and can
/// be ignored; an unwrapped one persists and must be counteracted.
fn parse_initial_transformation(content: &str) -> TransformMatrix {
    let content = content.trim();

    if let Some(cm_pos) = content.find(" cm") {
        let before_cm = &content[..cm_pos];
        let parts: Vec<&str> = before_cm.split_whitespace().collect();

        if parts.len() >= 6 {
            let start = parts.len() - 6;

            let has_q_before = parts[..start].iter().any(|&p| p == "q");
            let starts_with_q = content.starts_with("q ");

            if has_q_before || starts_with_q {
                return TransformMatrix::identity();
            }

            let nums: Vec<f32> = parts[start..]
                .iter()
                .filter_map(|s| s.parse::<f32>().ok())
                .collect();

            if nums.len() == 6 {
                return TransformMatrix {
                    a: nums[0],
                    b: nums[1],
                    c: nums[2],
                    d: nums[3],
                    e: nums[4],
                    f: nums[5],
                };
            }
        }
    }

    TransformMatrix::identity()
}

/// Create the stamp's Form XObject, counteracting any page transform
fn stamp_form_xobject(
    doc: &mut Document,
    content: String,
    font_id: ObjectId,
    page_transform: &TransformMatrix,
) -> ObjectId {
    let mut fonts = Dictionary::new();
    fonts.set("F1", Object::Reference(font_id));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));

    let mut xobject_dict = Dictionary::new();
    xobject_dict.set("Type", Object::Name(b"XObject".to_vec()));
    xobject_dict.set("Subtype", Object::Name(b"Form".to_vec()));
    xobject_dict.set("FormType", Object::Integer(1));

    // The form's own coordinate space, Letter-sized like the stamp offsets
    xobject_dict.set(
        "BBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(792),
        ]),
    );

    // When the form is invoked via Do the page's CTM is in effect; apply
    // the inverse so the stamp lands where the offsets say it should.
    if page_transform.is_identity() {
        xobject_dict.set(
            "Matrix",
            Object::Array(vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
            ]),
        );
    } else {
        let inverse = page_transform.inverse();
        xobject_dict.set(
            "Matrix",
            Object::Array(vec![
                Object::Real(inverse.a),
                Object::Real(inverse.b),
                Object::Real(inverse.c),
                Object::Real(inverse.d),
                Object::Real(inverse.e),
                Object::Real(inverse.f),
            ]),
        );
    }

    xobject_dict.set("Resources", Object::Dictionary(resources));

    let xobject_stream = Stream {
        dict: xobject_dict,
        content: content.into_bytes(),
        allows_compression: true,
        start_position: None,
    };

    doc.add_object(Object::Stream(xobject_stream))
}

/// Register the stamp as /PageNum in the page's Resources
fn add_xobject_to_page_resources(
    doc: &mut Document,
    page_id: ObjectId,
    xobject_id: ObjectId,
) -> std::result::Result<(), lopdf::Error> {
    // Resolve the Resources dictionary first; it may sit behind a
    // reference shared between pages.
    let resources_dict = {
        let page_obj = doc.get_object(page_id)?;
        if let Object::Dictionary(page_dict) = page_obj {
            match page_dict.get(b"Resources") {
                Ok(Object::Dictionary(dict)) => dict.clone(),
                Ok(Object::Reference(res_id)) => {
                    if let Ok(Object::Dictionary(dict)) = doc.get_object(*res_id) {
                        dict.clone()
                    } else {
                        Dictionary::new()
                    }
                }
                _ => Dictionary::new(),
            }
        } else {
            Dictionary::new()
        }
    };

    let page_obj = doc.get_object_mut(page_id)?;

    if let Object::Dictionary(ref mut page_dict) = page_obj {
        let mut new_resources = resources_dict;

        let mut xobjects = if let Ok(Object::Dictionary(xo)) = new_resources.get(b"XObject") {
            xo.clone()
        } else {
            Dictionary::new()
        };

        xobjects.set("PageNum", Object::Reference(xobject_id));
        new_resources.set("XObject", Object::Dictionary(xobjects));

        // Give the page its own Resources copy so shared dictionaries on
        // other pages are left untouched.
        page_dict.set("Resources", Object::Dictionary(new_resources));
    }

    Ok(())
}

/// Append a content stream to a page's Contents
///
/// Appending after the original content draws the stamp on top, not under
/// background fills.
fn append_content_to_page(
    doc: &mut Document,
    page_id: ObjectId,
    new_content_id: ObjectId,
) -> std::result::Result<(), lopdf::Error> {
    let page_obj = doc.get_object_mut(page_id)?;

    if let Object::Dictionary(ref mut page_dict) = page_obj {
        let existing_content = page_dict.get(b"Contents").ok().cloned();

        match existing_content {
            Some(Object::Reference(content_id)) => {
                let new_contents = vec![
                    Object::Reference(content_id),
                    Object::Reference(new_content_id),
                ];
                page_dict.set("Contents", Object::Array(new_contents));
            }
            Some(Object::Array(mut content_array)) => {
                content_array.push(Object::Reference(new_content_id));
                page_dict.set("Contents", Object::Array(content_array));
            }
            _ => {
                page_dict.set("Contents", Object::Array(vec![Object::Reference(new_content_id)]));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_content_draws_the_decimal_index() {
        let content = stamp_content(7);
        assert!(content.contains("(7) Tj"));
        assert!(content.contains("/F1 10 Tf"));
        assert!(content.contains("1 0 0 1 500 20 Tm"));
    }

    #[test]
    fn stamp_content_has_no_leading_zeros_or_suffix() {
        let content = stamp_content(3);
        assert!(content.contains("(3) Tj"));
        assert!(!content.contains("(03)"));
        assert!(!content.contains("of"));
    }

    #[test]
    fn unwrapped_cm_is_detected() {
        let matrix = parse_initial_transformation(".24 0 0 -.24 0 792 cm\nBT ET");
        assert!(!matrix.is_identity());
        assert!((matrix.a - 0.24).abs() < 0.001);
        assert!((matrix.f - 792.0).abs() < 0.001);
    }

    #[test]
    fn wrapped_cm_is_ignored() {
        let matrix = parse_initial_transformation("q 0.12 0 0 0.12 0 0 cm\nBT ET Q");
        assert!(matrix.is_identity());
    }

    #[test]
    fn content_without_cm_yields_identity() {
        let matrix = parse_initial_transformation("BT /F1 12 Tf (hi) Tj ET");
        assert!(matrix.is_identity());
    }

    #[test]
    fn inverse_undoes_a_scale_translate() {
        let matrix = TransformMatrix {
            a: 0.5,
            b: 0.0,
            c: 0.0,
            d: 0.5,
            e: 10.0,
            f: 20.0,
        };
        let inv = matrix.inverse();
        // Composing m * inv should land back on identity
        let a = matrix.a * inv.a + matrix.c * inv.b;
        let d = matrix.b * inv.c + matrix.d * inv.d;
        let e = matrix.a * inv.e + matrix.c * inv.f + matrix.e;
        let f = matrix.b * inv.e + matrix.d * inv.f + matrix.f;
        assert!((a - 1.0).abs() < 0.001);
        assert!((d - 1.0).abs() < 0.001);
        assert!(e.abs() < 0.001);
        assert!(f.abs() < 0.001);
    }

    #[test]
    fn singular_matrix_inverts_to_identity() {
        let matrix = TransformMatrix {
            a: 0.0,
            b: 0.0,
            c: 0.0,
            d: 0.0,
            e: 5.0,
            f: 5.0,
        };
        assert!(matrix.inverse().is_identity());
    }
}
