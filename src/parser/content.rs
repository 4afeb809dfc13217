//! Content stream interpretation.
//!
//! One pass over a page's operators collects everything the engines need:
//! positioned text spans, axis-aligned ruling segments from stroked or filled
//! paths, and the placement of every image XObject. All coordinates are in
//! PDF user space (bottom-left origin); the engines convert to page space.

use std::collections::BTreeMap;

use lopdf::content::Content;
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};

use crate::error::BackendError;
use crate::model::BBox;

use super::backend::{decode_text_simple, get_number, stream_bytes, LopdfBackend, PageId};
use super::layout::TextSpan;

/// Form XObjects nested deeper than this are not entered.
const MAX_FORM_DEPTH: usize = 8;

/// Two coordinates closer than this are treated as equal when deciding
/// whether a segment is horizontal or vertical.
const AXIS_TOLERANCE: f32 = 0.5;

/// Everything painted on one page.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    /// Text spans, one per text-showing operator
    pub spans: Vec<TextSpan>,
    /// Horizontal and vertical line segments
    pub rulings: Vec<Ruling>,
    /// Painted image XObjects
    pub images: Vec<ImagePlacement>,
}

/// Ruling direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// An axis-aligned line segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ruling {
    pub orientation: Orientation,
    /// y for horizontal rulings, x for vertical ones
    pub position: f32,
    /// Lower end along the ruling's axis
    pub start: f32,
    /// Upper end along the ruling's axis
    pub end: f32,
}

impl Ruling {
    /// Build a ruling from two points if the segment is axis-aligned.
    pub fn from_points(p0: (f32, f32), p1: (f32, f32)) -> Option<Self> {
        let (dx, dy) = ((p1.0 - p0.0).abs(), (p1.1 - p0.1).abs());
        if dy <= AXIS_TOLERANCE && dx > AXIS_TOLERANCE {
            Some(Self {
                orientation: Orientation::Horizontal,
                position: (p0.1 + p1.1) / 2.0,
                start: p0.0.min(p1.0),
                end: p0.0.max(p1.0),
            })
        } else if dx <= AXIS_TOLERANCE && dy > AXIS_TOLERANCE {
            Some(Self {
                orientation: Orientation::Vertical,
                position: (p0.0 + p1.0) / 2.0,
                start: p0.1.min(p1.1),
                end: p0.1.max(p1.1),
            })
        } else {
            None
        }
    }

    pub fn length(&self) -> f32 {
        self.end - self.start
    }
}

/// An image XObject painted with `Do`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlacement {
    /// Resource name (e.g. `Im0`)
    pub name: String,
    /// Object id of the image stream, when it is an indirect object
    pub object_id: Option<ObjectId>,
    /// Image of the unit square under the CTM
    pub rect: BBox,
}

/// Affine transform `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Read six numeric operands (or array items).
    pub fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let n: Vec<f32> = operands[..6].iter().filter_map(get_number).collect();
        (n.len() == 6).then(|| Self::new(n[0], n[1], n[2], n[3], n[4], n[5]))
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    /// Length of the transformed x unit vector.
    pub fn horizontal_scale(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    /// Length of the transformed y unit vector.
    pub fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    /// Bounding box of the transformed unit square.
    pub fn unit_square_bounds(&self) -> BBox {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(1.0, 0.0),
            self.apply(0.0, 1.0),
            self.apply(1.0, 1.0),
        ];
        corners.iter().skip(1).fold(
            BBox::new(corners[0].0, corners[0].1, corners[0].0, corners[0].1),
            |acc, &(x, y)| acc.union(&BBox::new(x, y, x, y)),
        )
    }
}

/// Interpret the content stream of a page.
pub fn interpret_page(backend: &LopdfBackend, page: PageId) -> Result<PageContent, BackendError> {
    let data = backend.page_content(page)?;
    let resources = Resources {
        fonts: backend.page_fonts(page)?,
        xobjects: backend
            .page_resources(page)
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| backend.resolve_dict(x)),
    };

    let mut interpreter = Interpreter {
        backend,
        out: PageContent::default(),
    };
    interpreter.run(&data, &resources, Matrix::IDENTITY, 0)?;
    Ok(interpreter.out)
}

/// Fonts and XObjects visible to one content stream.
struct Resources<'a> {
    fonts: BTreeMap<Vec<u8>, &'a Dictionary>,
    xobjects: Option<&'a Dictionary>,
}

impl<'a> Resources<'a> {
    fn from_dict(backend: &'a LopdfBackend, dict: &'a Dictionary) -> Self {
        let fonts = dict
            .get(b"Font")
            .ok()
            .and_then(|f| backend.resolve_dict(f))
            .map(|f| {
                f.iter()
                    .filter_map(|(name, obj)| {
                        backend.resolve_dict(obj).map(|d| (name.clone(), d))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let xobjects = dict
            .get(b"XObject")
            .ok()
            .and_then(|x| backend.resolve_dict(x));
        Self { fonts, xobjects }
    }
}

/// Graphics and text state saved by `q` and restored by `Q`.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font_key: Vec<u8>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    leading: f32,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            font_key: Vec::new(),
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            leading: 0.0,
        }
    }
}

struct Interpreter<'a> {
    backend: &'a LopdfBackend,
    out: PageContent,
}

impl<'a> Interpreter<'a> {
    fn run(
        &mut self,
        data: &[u8],
        resources: &Resources<'a>,
        base: Matrix,
        depth: usize,
    ) -> Result<(), BackendError> {
        if data.is_empty() {
            return Ok(());
        }
        let content = Content::decode(data)?;
        let doc = self.backend.raw_doc();

        let mut state = GraphicsState::new(base);
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut text_matrix = Matrix::IDENTITY;
        let mut line_matrix = Matrix::IDENTITY;
        let mut in_text_block = false;
        let mut path = PathBuilder::default();

        for op in &content.operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        state.ctm = m.then(&state.ctm);
                    }
                }

                // Text state
                "BT" => {
                    in_text_block = true;
                    text_matrix = Matrix::IDENTITY;
                    line_matrix = Matrix::IDENTITY;
                }
                "ET" => in_text_block = false,
                "Tf" => {
                    if operands.len() >= 2 {
                        if let Object::Name(name) = &operands[0] {
                            state.font_key = name.clone();
                        }
                        state.font_size = get_number(&operands[1]).unwrap_or(12.0);
                    }
                }
                "Tc" => state.char_spacing = first_number(operands).unwrap_or(0.0),
                "Tw" => state.word_spacing = first_number(operands).unwrap_or(0.0),
                "TL" => state.leading = first_number(operands).unwrap_or(0.0),
                "Td" | "TD" => {
                    if operands.len() >= 2 {
                        let tx = get_number(&operands[0]).unwrap_or(0.0);
                        let ty = get_number(&operands[1]).unwrap_or(0.0);
                        if op.operator == "TD" {
                            state.leading = -ty;
                        }
                        line_matrix = Matrix::translation(tx, ty).then(&line_matrix);
                        text_matrix = line_matrix;
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        line_matrix = m;
                        text_matrix = m;
                    }
                }
                "T*" => {
                    line_matrix = Matrix::translation(0.0, -state.leading).then(&line_matrix);
                    text_matrix = line_matrix;
                }

                // Text showing
                "Tj" | "TJ" | "'" | "\"" => {
                    if op.operator == "'" || op.operator == "\"" {
                        if op.operator == "\"" && operands.len() >= 3 {
                            state.word_spacing = get_number(&operands[0]).unwrap_or(0.0);
                            state.char_spacing = get_number(&operands[1]).unwrap_or(0.0);
                        }
                        line_matrix = Matrix::translation(0.0, -state.leading).then(&line_matrix);
                        text_matrix = line_matrix;
                    }
                    if !in_text_block {
                        continue;
                    }
                    let font = resources.fonts.get(&state.font_key).copied();
                    let shown = match op.operator.as_str() {
                        "TJ" => match operands.first() {
                            Some(Object::Array(items)) => items.as_slice(),
                            _ => &[],
                        },
                        "\"" => operands.get(2).map(std::slice::from_ref).unwrap_or(&[]),
                        _ => operands.first().map(std::slice::from_ref).unwrap_or(&[]),
                    };
                    self.show_text(doc, font, &state, &mut text_matrix, shown);
                }

                // Path construction
                "m" => {
                    if let Some((x, y)) = point(operands, 0) {
                        path.move_to(state.ctm.apply(x, y));
                    }
                }
                "l" => {
                    if let Some((x, y)) = point(operands, 0) {
                        path.line_to(state.ctm.apply(x, y));
                    }
                }
                "c" | "v" | "y" => {
                    // Curves never produce rulings; continue from the end point.
                    let end = if op.operator == "c" { 4 } else { 2 };
                    if let Some((x, y)) = point(operands, end) {
                        path.move_to(state.ctm.apply(x, y));
                    }
                }
                "re" => {
                    let nums: Vec<f32> = operands.iter().filter_map(get_number).collect();
                    if nums.len() >= 4 {
                        let (x, y, w, h) = (nums[0], nums[1], nums[2], nums[3]);
                        path.move_to(state.ctm.apply(x, y));
                        path.line_to(state.ctm.apply(x + w, y));
                        path.line_to(state.ctm.apply(x + w, y + h));
                        path.line_to(state.ctm.apply(x, y + h));
                        path.close();
                    }
                }
                "h" => path.close(),

                // Path painting
                "S" => self.out.rulings.extend(path.finish(false)),
                "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                    self.out.rulings.extend(path.finish(true))
                }
                "n" => path.clear(),

                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.paint_xobject(name, resources, &state, depth)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Decode the strings of a text-showing operator into one span and
    /// advance the text matrix past it.
    fn show_text(
        &mut self,
        doc: &LopdfDocument,
        font: Option<&Dictionary>,
        state: &GraphicsState,
        text_matrix: &mut Matrix,
        items: &[Object],
    ) {
        let encoding = font.and_then(|f| f.get_font_encoding(doc).ok());
        let metrics = font.map(|f| FontMetrics::from_font(self.backend, f)).unwrap_or_default();
        let start = text_matrix.then(&state.ctm);

        let mut text = String::new();
        let mut advance = 0.0f32;
        for item in items {
            match item {
                Object::String(bytes, _) => {
                    let decoded = match encoding {
                        Some(ref enc) => LopdfDocument::decode_text(enc, bytes).unwrap_or_default(),
                        None => decode_text_simple(bytes),
                    };
                    advance += metrics.string_width(bytes, &decoded, state);
                    text.push_str(&decoded);
                }
                other => {
                    if let Some(n) = get_number(other) {
                        // Kerning in thousandths of text space; large
                        // negative values separate words.
                        advance -= n / 1000.0 * state.font_size;
                        if -n > 200.0 && !text.is_empty() && !text.ends_with(' ') {
                            if let Some(c) = text.chars().last() {
                                if !is_spaceless_script_char(c) {
                                    text.push(' ');
                                }
                            }
                        }
                    }
                }
            }
        }

        *text_matrix = Matrix::translation(advance, 0.0).then(text_matrix);

        if text.trim().is_empty() {
            return;
        }
        let (x, y) = start.apply(0.0, 0.0);
        let font_size = state.font_size * start.vertical_scale();
        let width = advance * start.horizontal_scale();
        let font_name = font
            .and_then(|f| f.get(b"BaseFont").ok())
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_string())
            .unwrap_or_else(|| String::from_utf8_lossy(&state.font_key).to_string());

        let mut span = TextSpan::new(text, x, y, font_size, font_name);
        span.width = width.max(0.0);
        self.out.spans.push(span);
    }

    fn paint_xobject(
        &mut self,
        name: &[u8],
        resources: &Resources<'a>,
        state: &GraphicsState,
        depth: usize,
    ) -> Result<(), BackendError> {
        let Some(obj) = resources.xobjects.and_then(|x| x.get(name).ok()) else {
            log::debug!("XObject {} not found", String::from_utf8_lossy(name));
            return Ok(());
        };
        let Some((stream, object_id)) = self.backend.resolve_stream(obj) else {
            return Ok(());
        };

        match stream.dict.get(b"Subtype").and_then(|s| s.as_name()) {
            Ok(b"Image") => {
                self.out.images.push(ImagePlacement {
                    name: String::from_utf8_lossy(name).to_string(),
                    object_id,
                    rect: state.ctm.unit_square_bounds(),
                });
            }
            Ok(b"Form") if depth < MAX_FORM_DEPTH => {
                let form_matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|m| m.as_array().ok())
                    .and_then(|arr| Matrix::from_operands(arr))
                    .unwrap_or_default();
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| self.backend.resolve_dict(r))
                    .map(|r| Resources::from_dict(self.backend, r));
                let data = stream_bytes(stream);
                let base = form_matrix.then(&state.ctm);
                match form_resources {
                    Some(own) => self.run(&data, &own, base, depth + 1)?,
                    None => self.run(&data, resources, base, depth + 1)?,
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Glyph widths of a simple font.
#[derive(Debug, Clone, Default)]
struct FontMetrics {
    first_char: i64,
    widths: Vec<f32>,
    two_byte: bool,
}

impl FontMetrics {
    fn from_font(backend: &LopdfBackend, font: &Dictionary) -> Self {
        let two_byte = font
            .get(b"Subtype")
            .and_then(|s| s.as_name())
            .map(|s| s == b"Type0")
            .unwrap_or(false);
        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|o| backend.resolve(o).as_i64().ok())
            .unwrap_or(0);
        let widths = font
            .get(b"Widths")
            .ok()
            .and_then(|o| backend.resolve(o).as_array().ok())
            .map(|arr| {
                arr.iter()
                    .map(|w| get_number(backend.resolve(w)).unwrap_or(0.0))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            first_char,
            widths,
            two_byte,
        }
    }

    /// Advance of a shown string in unscaled text space.
    fn string_width(&self, bytes: &[u8], decoded: &str, state: &GraphicsState) -> f32 {
        let size = state.font_size;
        if self.two_byte || self.widths.is_empty() {
            // Half an em per character is close enough for layout.
            let chars = decoded.chars().count() as f32;
            let spaces = decoded.chars().filter(|c| *c == ' ').count() as f32;
            return chars * (0.5 * size + state.char_spacing) + spaces * state.word_spacing;
        }
        bytes
            .iter()
            .map(|&b| {
                let glyph = usize::try_from(b as i64 - self.first_char)
                    .ok()
                    .and_then(|i| self.widths.get(i))
                    .copied()
                    .unwrap_or(500.0);
                let word = if b == b' ' { state.word_spacing } else { 0.0 };
                glyph / 1000.0 * size + state.char_spacing + word
            })
            .sum()
    }
}

/// Current path as device-space subpaths.
#[derive(Debug, Default)]
struct PathBuilder {
    subpaths: Vec<Vec<(f32, f32)>>,
}

impl PathBuilder {
    fn move_to(&mut self, p: (f32, f32)) {
        self.subpaths.push(vec![p]);
    }

    fn line_to(&mut self, p: (f32, f32)) {
        match self.subpaths.last_mut() {
            Some(sub) => sub.push(p),
            None => self.subpaths.push(vec![p]),
        }
    }

    fn close(&mut self) {
        if let Some(sub) = self.subpaths.last_mut() {
            if let (Some(&first), Some(&last)) = (sub.first(), sub.last()) {
                if sub.len() > 2 && first != last {
                    sub.push(first);
                }
            }
        }
    }

    fn clear(&mut self) {
        self.subpaths.clear();
    }

    /// Emit the axis-aligned edges of the path and reset it. Filling closes
    /// every open subpath.
    fn finish(&mut self, close_all: bool) -> Vec<Ruling> {
        let mut rulings = Vec::new();
        for mut sub in self.subpaths.drain(..) {
            if close_all && sub.len() > 2 {
                if let (Some(&first), Some(&last)) = (sub.first(), sub.last()) {
                    if first != last {
                        sub.push(first);
                    }
                }
            }
            rulings.extend(sub.windows(2).filter_map(|w| Ruling::from_points(w[0], w[1])));
        }
        rulings
    }
}

fn first_number(operands: &[Object]) -> Option<f32> {
    operands.first().and_then(get_number)
}

fn point(operands: &[Object], index: usize) -> Option<(f32, f32)> {
    let x = get_number(operands.get(index)?)?;
    let y = get_number(operands.get(index + 1)?)?;
    Some((x, y))
}

/// Check if character is from a script that doesn't use word spaces.
/// Chinese and Japanese don't use spaces between words, but Korean does.
pub(crate) fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs and Extension A
    (0x4E00..=0x9FFF).contains(&code)
    || (0x3400..=0x4DBF).contains(&code)
    // Extensions B-F
    || (0x20000..=0x2EBEF).contains(&code)
    // Hiragana, Katakana
    || (0x3040..=0x30FF).contains(&code)
    // CJK Symbols and Punctuation
    || (0x3000..=0x303F).contains(&code)
}
