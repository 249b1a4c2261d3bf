//! Occurrence highlighting on the source document
//!
//! Walks each page's content stream tracking the text matrix, recovers the
//! approximate rectangle of every show-text run, and outlines each located
//! occurrence of a matched identifier with a red square annotation.
//!
//! Position recovery is an estimate: run origins come from the text matrix
//! and widths from an average glyph advance. An identifier that matched on
//! the concatenated whole-document text but is split across show-text runs
//! (or a page boundary) produces no rectangle here; the caller still
//! reports it in the text and voice alerts, it is just unmarked in the
//! delivered document.

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use crate::error::PdfError;

/// Stroke color of the highlight rectangles (red).
const STROKE_RGB: [f32; 3] = [1.0, 0.0, 0.0];
/// Border width of the highlight rectangles, in points.
const BORDER_WIDTH: i64 = 2;
/// Average glyph advance as a fraction of the font size, used to estimate
/// run widths without consulting font metrics.
const AVG_GLYPH_ADVANCE: f64 = 0.5;

/// A marked copy of the source document.
#[derive(Debug, Clone)]
pub struct AnnotatedDocument {
    pub bytes: Vec<u8>,
    /// Number of highlight rectangles added across all pages.
    pub total_marks: usize,
    /// Matched identifiers for which no page-level occurrence rectangle
    /// could be located. Still reported by the caller, just unmarked.
    pub unmarked: Vec<String>,
}

/// A contiguous show-text run with its recovered position.
#[derive(Debug, Clone)]
struct TextRun {
    text: String,
    x: f64,
    y: f64,
    font_size: f64,
    char_width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rect {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

/// Outline every located occurrence of each identifier on every page.
pub fn annotate_occurrences(
    pdf_bytes: &[u8],
    case_ids: &[String],
) -> Result<AnnotatedDocument, PdfError> {
    let mut doc = Document::load_mem(pdf_bytes).map_err(|e| PdfError::Parse(e.to_string()))?;

    let needles: Vec<String> = case_ids.iter().map(|id| id.to_lowercase()).collect();
    let mut marked: Vec<bool> = vec![false; needles.len()];

    // Phase 1: locate occurrence rectangles per page.
    let mut page_rects: Vec<(ObjectId, Vec<Rect>)> = Vec::new();
    for (page_num, page_id) in doc.get_pages() {
        let runs = collect_text_runs(&doc, page_id);
        let mut rects = Vec::new();
        for (idx, needle) in needles.iter().enumerate() {
            for run in &runs {
                let hits = occurrence_rects(run, needle);
                if !hits.is_empty() {
                    marked[idx] = true;
                }
                rects.extend(hits);
            }
        }
        if !rects.is_empty() {
            debug!(page = page_num, marks = rects.len(), "located occurrences");
            page_rects.push((page_id, rects));
        }
    }

    // Phase 2: attach one square annotation per located rectangle.
    let mut total_marks = 0;
    for (page_id, rects) in page_rects {
        total_marks += rects.len();
        let annot_ids: Vec<ObjectId> = rects
            .iter()
            .map(|rect| doc.add_object(square_annotation(rect)))
            .collect();
        attach_annotations(&mut doc, page_id, annot_ids)?;
    }

    let unmarked: Vec<String> = case_ids
        .iter()
        .zip(&marked)
        .filter(|(_, was_marked)| !**was_marked)
        .map(|(id, _)| id.clone())
        .collect();
    for id in &unmarked {
        warn!(case_id = %id, "matched in text but no page-level occurrence located");
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| PdfError::Save(e.to_string()))?;

    Ok(AnnotatedDocument {
        bytes,
        total_marks,
        unmarked,
    })
}

/// Walk the page's content stream and recover positioned show-text runs.
///
/// Tracks the text and line matrices through Tm/Td/TD/T*/TL and the active
/// font size through Tf. Pages whose content cannot be decoded yield no
/// runs, which means no marks on that page rather than a failed run.
fn collect_text_runs(doc: &Document, page_id: ObjectId) -> Vec<TextRun> {
    let content = match doc.get_page_content(page_id) {
        Ok(content) => content,
        Err(_) => return Vec::new(),
    };
    let operations = match Content::decode(&content) {
        Ok(decoded) => decoded.operations,
        Err(_) => return Vec::new(),
    };

    const IDENTITY: [f64; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
    let mut runs = Vec::new();
    let mut font_size = 12.0;
    let mut leading = 0.0;
    let mut tm = IDENTITY;
    let mut lm = IDENTITY;

    for op in operations {
        match op.operator.as_str() {
            "BT" => {
                tm = IDENTITY;
                lm = IDENTITY;
            }
            "Tf" => {
                if let Some(size) = op.operands.get(1).and_then(number) {
                    font_size = size;
                }
            }
            "TL" => {
                if let Some(l) = op.operands.first().and_then(number) {
                    leading = l;
                }
            }
            "Tm" => {
                if op.operands.len() >= 6 {
                    let mut next = [0.0; 6];
                    let mut valid = true;
                    for (i, slot) in next.iter_mut().enumerate() {
                        match number(&op.operands[i]) {
                            Some(v) => *slot = v,
                            None => valid = false,
                        }
                    }
                    if valid {
                        tm = next;
                        lm = next;
                    }
                }
            }
            "Td" | "TD" => {
                let tx = op.operands.first().and_then(number).unwrap_or(0.0);
                let ty = op.operands.get(1).and_then(number).unwrap_or(0.0);
                if op.operator == "TD" {
                    leading = -ty;
                }
                lm = translate(&lm, tx, ty);
                tm = lm;
            }
            "T*" => {
                lm = translate(&lm, 0.0, -leading);
                tm = lm;
            }
            "Tj" | "TJ" => {
                for operand in &op.operands {
                    if let Some(text) = decode_text_operand(operand) {
                        record_run(&mut runs, &mut tm, &text, font_size);
                    }
                }
            }
            "'" => {
                lm = translate(&lm, 0.0, -leading);
                tm = lm;
                if let Some(text) = op.operands.first().and_then(decode_text_operand) {
                    record_run(&mut runs, &mut tm, &text, font_size);
                }
            }
            "\"" => {
                lm = translate(&lm, 0.0, -leading);
                tm = lm;
                if let Some(text) = op.operands.get(2).and_then(decode_text_operand) {
                    record_run(&mut runs, &mut tm, &text, font_size);
                }
            }
            _ => {}
        }
    }

    runs
}

/// Record a positioned run and advance the text matrix by its estimated
/// width so successive runs on the same line stay roughly placed.
fn record_run(runs: &mut Vec<TextRun>, tm: &mut [f64; 6], text: &str, font_size: f64) {
    if text.is_empty() {
        return;
    }
    let scale_x = if tm[0].abs() > f64::EPSILON { tm[0].abs() } else { 1.0 };
    let scale_y = if tm[3].abs() > f64::EPSILON { tm[3].abs() } else { 1.0 };
    let char_width = font_size * scale_x * AVG_GLYPH_ADVANCE;
    runs.push(TextRun {
        text: text.to_string(),
        x: tm[4],
        y: tm[5],
        font_size: font_size * scale_y,
        char_width,
    });
    tm[4] += text.chars().count() as f64 * char_width;
}

/// Premultiply a translation onto a text-space matrix.
fn translate(m: &[f64; 6], tx: f64, ty: f64) -> [f64; 6] {
    [
        m[0],
        m[1],
        m[2],
        m[3],
        tx * m[0] + ty * m[2] + m[4],
        tx * m[1] + ty * m[3] + m[5],
    ]
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}

/// Decode a show-text operand: UTF-8 first, then UTF-16BE with BOM, then
/// Latin-1. TJ arrays interleave kerning adjustments with strings; large
/// negative adjustments usually stand in for a space.
fn decode_text_operand(operand: &Object) -> Option<String> {
    match operand {
        Object::String(bytes, _) => {
            if let Ok(s) = String::from_utf8(bytes.clone()) {
                return Some(s);
            }
            if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
                let chars: Vec<u16> = bytes[2..]
                    .chunks(2)
                    .filter(|chunk| chunk.len() == 2)
                    .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
                    .collect();
                if let Ok(s) = String::from_utf16(&chars) {
                    return Some(s);
                }
            }
            Some(bytes.iter().map(|&b| b as char).collect())
        }
        Object::Array(arr) => {
            let mut text = String::new();
            for item in arr {
                match item {
                    Object::String(_, _) => {
                        if let Some(s) = decode_text_operand(item) {
                            text.push_str(&s);
                        }
                    }
                    Object::Integer(n) if *n < -100 => text.push(' '),
                    _ => {}
                }
            }
            Some(text)
        }
        _ => None,
    }
}

/// Case-insensitive occurrence rectangles of `needle_lower` within a run.
fn occurrence_rects(run: &TextRun, needle_lower: &str) -> Vec<Rect> {
    if needle_lower.is_empty() {
        return Vec::new();
    }
    // One lowercased char per source char, so char offsets into the
    // haystack stay aligned with the per-char advance. A full
    // `str::to_lowercase` can expand a char (e.g. 'İ' to "i\u{307}")
    // and shift every offset after it.
    let haystack: String = run
        .text
        .chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect();
    let needle_chars = needle_lower.chars().count();

    let mut rects = Vec::new();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle_lower) {
        let byte_start = from + pos;
        let char_start = haystack[..byte_start].chars().count();

        let x0 = run.x + char_start as f64 * run.char_width;
        let x1 = x0 + needle_chars as f64 * run.char_width;
        // Extend below the baseline to cover descenders.
        let y0 = run.y - run.font_size * 0.2;
        let y1 = run.y + run.font_size;
        rects.push(Rect { x0, y0, x1, y1 });

        from = byte_start + needle_lower.len();
    }
    rects
}

/// Build a Square annotation dictionary for one occurrence rectangle.
fn square_annotation(rect: &Rect) -> Dictionary {
    let border_style = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Border".to_vec())),
        ("W", Object::Integer(BORDER_WIDTH)),
        ("S", Object::Name(b"S".to_vec())),
    ]);
    Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Annot".to_vec())),
        ("Subtype", Object::Name(b"Square".to_vec())),
        (
            "Rect",
            Object::Array(vec![
                Object::Real(rect.x0 as f32),
                Object::Real(rect.y0 as f32),
                Object::Real(rect.x1 as f32),
                Object::Real(rect.y1 as f32),
            ]),
        ),
        (
            "C",
            Object::Array(STROKE_RGB.iter().map(|&c| Object::Real(c)).collect()),
        ),
        ("BS", Object::Dictionary(border_style)),
        // Print flag so the marks survive printing.
        ("F", Object::Integer(4)),
    ])
}

/// Append annotation references to the page's Annots entry, following an
/// indirect reference if the document uses one, and creating the array
/// when the page has no annotations yet.
fn attach_annotations(
    doc: &mut Document,
    page_id: ObjectId,
    annot_ids: Vec<ObjectId>,
) -> Result<(), PdfError> {
    let refs: Vec<Object> = annot_ids.into_iter().map(Object::Reference).collect();

    let existing = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|dict| dict.get(b"Annots").ok().cloned());

    match existing {
        Some(Object::Array(mut arr)) => {
            arr.extend(refs);
            set_page_annots(doc, page_id, arr)
        }
        Some(Object::Reference(array_id)) => {
            if let Ok(Object::Array(arr)) = doc.get_object_mut(array_id) {
                arr.extend(refs);
                Ok(())
            } else {
                set_page_annots(doc, page_id, refs)
            }
        }
        _ => set_page_annots(doc, page_id, refs),
    }
}

fn set_page_annots(doc: &mut Document, page_id: ObjectId, arr: Vec<Object>) -> Result<(), PdfError> {
    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfError::Save(format!("page {page_id:?}: {e}")))?;
    page.set("Annots", Object::Array(arr));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{Stream, StringFormat};
    use pretty_assertions::assert_eq;

    // Build a PDF with one text line per entry, one page per outer slice.
    fn create_list_pdf(pages: &[&[&str]]) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut page_ids = Vec::new();
        for lines in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
                ),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
            ];
            for (i, line) in lines.iter().enumerate() {
                if i > 0 {
                    operations.push(Operation::new(
                        "Td",
                        vec![Object::Integer(0), Object::Integer(-14)],
                    ));
                }
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(
                        line.as_bytes().to_vec(),
                        StringFormat::Literal,
                    )],
                ));
            }
            operations.push(Operation::new("ET", vec![]));

            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let page = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                (
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(612),
                        Object::Integer(792),
                    ]),
                ),
                ("Contents", Object::Reference(content_id)),
            ]);
            page_ids.push(doc.add_object(page));
        }

        let pages_dict = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(pages.len() as i64)),
            (
                "Kids",
                Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
            ),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]);
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn annots_per_page(bytes: &[u8]) -> Vec<usize> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|&page_id| {
                let dict = doc.get_dictionary(page_id).unwrap();
                match dict.get(b"Annots") {
                    Ok(Object::Array(arr)) => arr.len(),
                    _ => 0,
                }
            })
            .collect()
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn marks_every_occurrence_on_a_page() {
        let pdf = create_list_pdf(&[&["Case No: 141/24/MR", "Recall 141/24/MR at noon"]]);
        let annotated = annotate_occurrences(&pdf, &ids(&["141/24/MR"])).unwrap();
        assert_eq!(annotated.total_marks, 2);
        assert_eq!(annots_per_page(&annotated.bytes), vec![2]);
        assert!(annotated.unmarked.is_empty());
    }

    #[test]
    fn marks_land_on_the_right_page() {
        let pdf = create_list_pdf(&[&["nothing here"], &["Case No: 141/24/mr"]]);
        let annotated = annotate_occurrences(&pdf, &ids(&["141/24/MR"])).unwrap();
        assert_eq!(annots_per_page(&annotated.bytes), vec![0, 1]);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let pdf = create_list_pdf(&[&["case no: 141/24/mr"]]);
        let annotated = annotate_occurrences(&pdf, &ids(&["141/24/MR"])).unwrap();
        assert_eq!(annotated.total_marks, 1);
    }

    #[test]
    fn unlocatable_identifier_is_reported_not_fatal() {
        let pdf = create_list_pdf(&[&["an unrelated listing"]]);
        let annotated = annotate_occurrences(&pdf, &ids(&["288/06/IP"])).unwrap();
        assert_eq!(annotated.total_marks, 0);
        assert_eq!(annotated.unmarked, ids(&["288/06/IP"]));
        // Output is still a loadable document.
        assert_eq!(annots_per_page(&annotated.bytes), vec![0]);
    }

    #[test]
    fn multiple_identifiers_each_get_marks() {
        let pdf = create_list_pdf(&[&["11/02/AA then 99/01/ZZ"]]);
        let annotated = annotate_occurrences(&pdf, &ids(&["11/02/AA", "99/01/ZZ"])).unwrap();
        assert_eq!(annotated.total_marks, 2);
    }

    #[test]
    fn occurrence_rects_are_well_formed() {
        let run = TextRun {
            text: "Case No: 141/24/MR".to_string(),
            x: 72.0,
            y: 700.0,
            font_size: 12.0,
            char_width: 6.0,
        };
        let rects = occurrence_rects(&run, "141/24/mr");
        assert_eq!(rects.len(), 1);
        let rect = rects[0];
        assert!(rect.x1 > rect.x0);
        assert!(rect.y1 > rect.y0);
        // Occurrence starts 9 characters into the run.
        assert_eq!(rect.x0, 72.0 + 9.0 * 6.0);
    }

    #[test]
    fn expanding_lowercase_chars_do_not_shift_offsets() {
        // 'İ' lowercases to two chars under str::to_lowercase; the rect
        // for an occurrence after it must still use the source offset.
        let run = TextRun {
            text: "İstanbul 5/20/X".to_string(),
            x: 10.0,
            y: 0.0,
            font_size: 10.0,
            char_width: 6.0,
        };
        let rects = occurrence_rects(&run, "5/20/x");
        assert_eq!(rects.len(), 1);
        // Occurrence starts 9 source characters into the run.
        assert_eq!(rects[0].x0, 10.0 + 9.0 * 6.0);
    }

    #[test]
    fn repeated_occurrences_in_one_run_each_get_a_rect() {
        let run = TextRun {
            text: "5/20/X and 5/20/X".to_string(),
            x: 0.0,
            y: 0.0,
            font_size: 10.0,
            char_width: 5.0,
        };
        assert_eq!(occurrence_rects(&run, "5/20/x").len(), 2);
    }

    #[test]
    fn annotation_dictionary_has_fixed_style() {
        let dict = square_annotation(&Rect {
            x0: 1.0,
            y0: 2.0,
            x1: 3.0,
            y1: 4.0,
        });
        assert_eq!(
            dict.get(b"Subtype").unwrap(),
            &Object::Name(b"Square".to_vec())
        );
        let bs = dict.get(b"BS").unwrap().as_dict().unwrap();
        assert_eq!(bs.get(b"W").unwrap(), &Object::Integer(2));
        let color = dict.get(b"C").unwrap().as_array().unwrap();
        assert_eq!(color[0], Object::Real(1.0));
    }
}
