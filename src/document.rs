//! Document lifecycle and shared drawing state.
//!
//! A `Document` walks a small state machine: created, opened, page active,
//! closed. Content operators only ever land in the active page's buffer;
//! the object graph itself is produced once, at close. All geometry the
//! caller sees is in the configured unit with the origin at the top-left
//! corner; conversion to PDF points happens when operators are emitted.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};

use crate::error::{PdfError, Result};
use crate::font::{FontDef, FontMetricsCache, FontRegistry};
use crate::raster::{self, RasterImage};
use crate::types::{Color, LayoutMode, Orientation, PageSize, Unit, ZoomMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocState {
    Created,
    Opened,
    PageActive,
    Closed,
}

/// Per-document callbacks around page boundaries. `header` runs after each
/// page is opened, `footer` just before it is closed; `accept_page_break`
/// can veto an automatic break (to balance columns, for instance).
pub trait PageDecorator {
    fn header(&mut self, _doc: &mut Document) -> Result<()> {
        Ok(())
    }
    fn footer(&mut self, _doc: &mut Document) -> Result<()> {
        Ok(())
    }
    fn accept_page_break(&mut self, doc: &mut Document) -> Result<bool> {
        Ok(doc.auto_page_break)
    }
}

pub(crate) struct Page {
    pub(crate) buffer: Vec<u8>,
    /// Landscape pages store the swapped size.
    pub(crate) size_pt: (f64, f64),
    pub(crate) link_zones: Vec<LinkZone>,
}

/// A clickable rectangle, kept in points with a top-origin y.
pub(crate) struct LinkZone {
    pub(crate) rect_pt: (f64, f64, f64, f64),
    pub(crate) target: LinkTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LinkTarget {
    Uri(String),
    Internal(LinkId),
}

/// Handle to an internal destination created with [`Document::add_link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkId(pub(crate) usize);

/// Destination of an internal link: page number (1-based) and y offset in
/// user units.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinkDest {
    pub(crate) page: usize,
    pub(crate) y: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub author: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub creation_date: Option<DateTime<Local>>,
}

pub struct Document {
    pub(crate) state: DocState,
    pub(crate) pages: Vec<Page>,

    // Geometry. `k` converts user units to points.
    pub(crate) k: f64,
    pub(crate) def_orientation: Orientation,
    pub(crate) def_size_pt: (f64, f64),
    pub(crate) cur_orientation: Orientation,
    pub(crate) cur_size: Option<PageSize>,
    pub(crate) w_pt: f64,
    pub(crate) h_pt: f64,
    pub(crate) w: f64,
    pub(crate) h: f64,

    pub(crate) l_margin: f64,
    pub(crate) t_margin: f64,
    pub(crate) r_margin: f64,
    pub(crate) b_margin: f64,
    /// Interior cell padding.
    pub(crate) c_margin: f64,

    pub(crate) x: f64,
    pub(crate) y: f64,
    /// Height of the last printed cell.
    pub(crate) lasth: f64,
    pub(crate) line_width: f64,

    pub(crate) fonts: FontRegistry,
    pub(crate) current_font: Option<usize>,
    pub(crate) font_style: String,
    pub(crate) underline: bool,
    pub(crate) font_size_pt: f64,
    pub(crate) font_size: f64,

    pub(crate) draw_color: String,
    pub(crate) fill_color: String,
    pub(crate) text_color: String,
    /// Fill and text color differ, so text needs its own color scope.
    pub(crate) color_flag: bool,
    /// Current word spacing (justification), user units.
    pub(crate) ws: f64,

    pub(crate) images: Vec<RasterImage>,
    pub(crate) image_index: HashMap<String, usize>,

    pub(crate) link_dests: Vec<Option<LinkDest>>,

    pub(crate) auto_page_break: bool,
    pub(crate) page_break_trigger: f64,
    pub(crate) in_header: bool,
    pub(crate) in_footer: bool,
    pub(crate) decorator: Option<Box<dyn PageDecorator>>,

    pub(crate) alias_nb_pages: Option<String>,
    pub(crate) metadata: Metadata,
    pub(crate) zoom: ZoomMode,
    pub(crate) layout: LayoutMode,
    pub(crate) compress: bool,
    pub(crate) min_pdf_version: &'static str,

    pub(crate) metrics_cache: Option<Box<dyn FontMetricsCache>>,

    /// The serialized file, filled in by `close`.
    pub(crate) output: Vec<u8>,
}

impl Default for Document {
    fn default() -> Self {
        Document::new(Orientation::Portrait, Unit::Millimeter, PageSize::A4)
    }
}

impl Document {
    pub fn new(orientation: Orientation, unit: Unit, size: PageSize) -> Self {
        let k = unit.scale();
        let def_size_pt = size.size_pt();
        let (w_pt, h_pt) = match orientation {
            Orientation::Portrait => def_size_pt,
            Orientation::Landscape => (def_size_pt.1, def_size_pt.0),
        };
        let margin = 28.35 / k;
        let mut doc = Document {
            state: DocState::Created,
            pages: Vec::new(),
            k,
            def_orientation: orientation,
            def_size_pt,
            cur_orientation: orientation,
            cur_size: None,
            w_pt,
            h_pt,
            w: w_pt / k,
            h: h_pt / k,
            l_margin: 0.0,
            t_margin: 0.0,
            r_margin: 0.0,
            b_margin: 0.0,
            c_margin: margin / 10.0,
            x: 0.0,
            y: 0.0,
            lasth: 0.0,
            line_width: 0.567 / k,
            fonts: FontRegistry::new(),
            current_font: None,
            font_style: String::new(),
            underline: false,
            font_size_pt: 12.0,
            font_size: 12.0 / k,
            draw_color: "0 G".to_string(),
            fill_color: "0 g".to_string(),
            text_color: "0 g".to_string(),
            color_flag: false,
            ws: 0.0,
            images: Vec::new(),
            image_index: HashMap::new(),
            link_dests: Vec::new(),
            auto_page_break: true,
            page_break_trigger: 0.0,
            in_header: false,
            in_footer: false,
            decorator: None,
            alias_nb_pages: None,
            metadata: Metadata::default(),
            zoom: ZoomMode::Default,
            layout: LayoutMode::Default,
            compress: true,
            min_pdf_version: "1.3",
            metrics_cache: None,
            output: Vec::new(),
        };
        doc.set_margins(margin, margin, None);
        doc.set_auto_page_break(true, 2.0 * margin);
        doc
    }

    // ------------------------------------------------------ configuration

    pub fn set_margins(&mut self, left: f64, top: f64, right: Option<f64>) {
        self.l_margin = left;
        self.t_margin = top;
        self.r_margin = right.unwrap_or(left);
    }

    pub fn set_left_margin(&mut self, margin: f64) {
        self.l_margin = margin;
        if self.state == DocState::PageActive && self.x < margin {
            self.x = margin;
        }
    }

    pub fn set_top_margin(&mut self, margin: f64) {
        self.t_margin = margin;
    }

    pub fn set_right_margin(&mut self, margin: f64) {
        self.r_margin = margin;
    }

    pub fn set_auto_page_break(&mut self, auto: bool, margin: f64) {
        self.auto_page_break = auto;
        self.b_margin = margin;
        self.page_break_trigger = self.h - margin;
    }

    pub fn set_display_mode(&mut self, zoom: ZoomMode, layout: LayoutMode) {
        self.zoom = zoom;
        self.layout = layout;
    }

    pub fn set_compression(&mut self, compress: bool) {
        self.compress = compress;
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.metadata.title = Some(title.into());
    }

    pub fn set_author(&mut self, author: impl Into<String>) {
        self.metadata.author = Some(author.into());
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.metadata.subject = Some(subject.into());
    }

    pub fn set_keywords(&mut self, keywords: impl Into<String>) {
        self.metadata.keywords = Some(keywords.into());
    }

    pub fn set_creator(&mut self, creator: impl Into<String>) {
        self.metadata.creator = Some(creator.into());
    }

    /// Enable `{nb}`-style substitution of the total page count.
    pub fn alias_nb_pages(&mut self, alias: impl Into<String>) {
        self.alias_nb_pages = Some(alias.into());
    }

    pub fn set_decorator(&mut self, decorator: Box<dyn PageDecorator>) {
        self.decorator = Some(decorator);
    }

    pub fn set_metrics_cache(&mut self, cache: Box<dyn FontMetricsCache>) {
        self.metrics_cache = Some(cache);
    }

    // ------------------------------------------------------------- fonts

    /// Register a Unicode TrueType font for embedding with subsetting.
    pub fn add_unicode_font(&mut self, family: &str, style: &str, path: &Path) -> Result<()> {
        self.fonts
            .add_unicode_font(family, style, path, self.metrics_cache.as_deref())
    }

    /// Register a single-byte (WinAnsi) TrueType font.
    pub fn add_truetype_font(&mut self, family: &str, style: &str, path: &Path) -> Result<()> {
        self.fonts.add_truetype_font(family, style, path)
    }

    /// Register a font from a caller-supplied metric definition.
    pub fn add_font_def(&mut self, family: &str, style: &str, def: FontDef) -> Result<()> {
        self.fonts.add_font_def(family, style, def)
    }

    /// Select the current font. An empty family keeps the current one, a
    /// zero size keeps the current size. Style may include `U` for
    /// underline.
    pub fn set_font(&mut self, family: &str, style: &str, size_pt: f64) -> Result<()> {
        let family = if family.is_empty() {
            self.current_family()
        } else {
            family.to_ascii_lowercase()
        };
        let mut style = style.to_ascii_uppercase();
        self.underline = style.contains('U');
        if self.underline {
            style.retain(|c| c != 'U');
        }
        let size_pt = if size_pt == 0.0 {
            self.font_size_pt
        } else {
            size_pt
        };
        let idx = self.fonts.resolve(&family, &style)?;
        if self.current_font == Some(idx) && self.font_size_pt == size_pt {
            return Ok(());
        }
        self.current_font = Some(idx);
        self.font_style = style;
        self.font_size_pt = size_pt;
        self.font_size = size_pt / self.k;
        if self.state == DocState::PageActive {
            let op = format!("BT /F{} {:.2} Tf ET\n", idx + 1, self.font_size_pt);
            self.out(op.as_bytes());
        }
        Ok(())
    }

    pub fn set_font_size(&mut self, size_pt: f64) {
        if self.font_size_pt == size_pt {
            return;
        }
        self.font_size_pt = size_pt;
        self.font_size = size_pt / self.k;
        if self.state == DocState::PageActive {
            if let Some(idx) = self.current_font {
                let op = format!("BT /F{} {:.2} Tf ET\n", idx + 1, self.font_size_pt);
                self.out(op.as_bytes());
            }
        }
    }

    fn current_family(&self) -> String {
        let Some(idx) = self.current_font else {
            return String::new();
        };
        let key = &self.fonts.font(idx).key;
        key.trim_end_matches(|c: char| c.is_ascii_uppercase())
            .to_string()
    }

    /// Width of `text` in user units at the current font and size.
    pub fn get_string_width(&self, text: &str) -> f64 {
        let Some(idx) = self.current_font else {
            return 0.0;
        };
        self.fonts.font(idx).text_width(text) as f64 * self.font_size / 1000.0
    }

    // ------------------------------------------------------------ colors

    pub fn set_draw_color(&mut self, color: Color) {
        self.draw_color = color.stroke_op();
        if self.state == DocState::PageActive {
            let op = format!("{}\n", self.draw_color);
            self.out(op.as_bytes());
        }
    }

    pub fn set_fill_color(&mut self, color: Color) {
        self.fill_color = color.fill_op();
        self.color_flag = self.fill_color != self.text_color;
        if self.state == DocState::PageActive {
            let op = format!("{}\n", self.fill_color);
            self.out(op.as_bytes());
        }
    }

    pub fn set_text_color(&mut self, color: Color) {
        self.text_color = color.fill_op();
        self.color_flag = self.fill_color != self.text_color;
    }

    pub fn set_line_width(&mut self, width: f64) {
        self.line_width = width;
        if self.state == DocState::PageActive {
            let op = format!("{:.2} w\n", width * self.k);
            self.out(op.as_bytes());
        }
    }

    // ------------------------------------------------------------- links

    /// Create an internal link destination; point it somewhere with
    /// [`set_link`](Document::set_link).
    pub fn add_link(&mut self) -> LinkId {
        self.link_dests.push(None);
        LinkId(self.link_dests.len() - 1)
    }

    /// Set a link destination. `page` 0 means the current page, `y` -1.0
    /// the current ordinate.
    pub fn set_link(&mut self, link: LinkId, y: f64, page: usize) {
        let y = if y == -1.0 { self.y } else { y };
        let page = if page == 0 { self.pages.len().max(1) } else { page };
        self.link_dests[link.0] = Some(LinkDest { page, y });
    }

    /// Attach a clickable zone on the current page. Coordinates in user
    /// units.
    pub fn link(&mut self, x: f64, y: f64, w: f64, h: f64, target: impl Into<LinkRef>) {
        if self.pages.is_empty() {
            return;
        }
        let k = self.k;
        let h_pt = self.h_pt;
        let zone = LinkZone {
            rect_pt: (x * k, h_pt - y * k, w * k, h * k),
            target: match target.into() {
                LinkRef::Uri(u) => LinkTarget::Uri(u),
                LinkRef::Internal(id) => LinkTarget::Internal(id),
            },
        };
        if let Some(page) = self.pages.last_mut() {
            page.link_zones.push(zone);
        }
    }

    // ------------------------------------------------------------ cursor

    pub fn get_x(&self) -> f64 {
        self.x
    }

    /// Negative values measure from the right edge.
    pub fn set_x(&mut self, x: f64) {
        self.x = if x >= 0.0 { x } else { self.w + x };
    }

    pub fn get_y(&self) -> f64 {
        self.y
    }

    /// Negative values measure from the bottom edge. Resets x to the left
    /// margin unless `keep_x`.
    pub fn set_y(&mut self, y: f64, keep_x: bool) {
        if !keep_x {
            self.x = self.l_margin;
        }
        self.y = if y >= 0.0 { y } else { self.h + y };
    }

    pub fn set_xy(&mut self, x: f64, y: f64) {
        self.set_x(x);
        self.set_y(y, true);
    }

    /// Current page number, 1-based. 0 before the first page.
    pub fn page_no(&self) -> usize {
        self.pages.len()
    }

    pub fn page_width(&self) -> f64 {
        self.w
    }

    pub fn page_height(&self) -> f64 {
        self.h
    }

    // --------------------------------------------------------- lifecycle

    pub fn open(&mut self) {
        if self.state == DocState::Created {
            self.state = DocState::Opened;
        }
    }

    /// Start a new page. `None` arguments keep the document defaults.
    pub fn add_page(
        &mut self,
        orientation: Option<Orientation>,
        size: Option<PageSize>,
    ) -> Result<()> {
        if self.state == DocState::Closed {
            return Err(PdfError::Configuration(
                "the document is closed".to_string(),
            ));
        }
        self.open();

        // Page-local state survives the break.
        let font_idx = self.current_font;
        let font_size_pt = self.font_size_pt;
        let lw = self.line_width;
        let dc = self.draw_color.clone();
        let fc = self.fill_color.clone();
        let tc = self.text_color.clone();
        let cf = self.color_flag;

        if !self.pages.is_empty() {
            self.run_footer()?;
            self.end_page();
        }
        self.begin_page(orientation, size);

        // Rounded joins would distort hairline rectangles.
        self.out(b"2 J\n");
        self.line_width = lw;
        let op = format!("{:.2} w\n", lw * self.k);
        self.out(op.as_bytes());
        if let Some(idx) = font_idx {
            self.current_font = Some(idx);
            self.font_size_pt = font_size_pt;
            self.font_size = font_size_pt / self.k;
            let op = format!("BT /F{} {:.2} Tf ET\n", idx + 1, font_size_pt);
            self.out(op.as_bytes());
        }
        if dc != "0 G" {
            self.draw_color = dc.clone();
            let op = format!("{dc}\n");
            self.out(op.as_bytes());
        }
        if fc != "0 g" {
            self.fill_color = fc.clone();
            let op = format!("{fc}\n");
            self.out(op.as_bytes());
        }
        self.text_color = tc;
        self.color_flag = cf;

        self.run_header()?;

        // Restore anything the header changed.
        if self.line_width != lw {
            self.line_width = lw;
            let op = format!("{:.2} w\n", lw * self.k);
            self.out(op.as_bytes());
        }
        if self.current_font != font_idx || self.font_size_pt != font_size_pt {
            if let Some(idx) = font_idx {
                self.current_font = Some(idx);
                self.font_size_pt = font_size_pt;
                self.font_size = font_size_pt / self.k;
                let op = format!("BT /F{} {:.2} Tf ET\n", idx + 1, font_size_pt);
                self.out(op.as_bytes());
            }
        }
        if self.draw_color != dc {
            self.draw_color = dc.clone();
            let op = format!("{dc}\n");
            self.out(op.as_bytes());
        }
        if self.fill_color != fc {
            self.fill_color = fc.clone();
            let op = format!("{fc}\n");
            self.out(op.as_bytes());
        }
        Ok(())
    }

    fn begin_page(&mut self, orientation: Option<Orientation>, size: Option<PageSize>) {
        let orientation = orientation.unwrap_or(self.def_orientation);
        let size_pt = size.map(|s| s.size_pt()).unwrap_or(self.def_size_pt);
        self.cur_orientation = orientation;
        self.cur_size = size;
        let (w_pt, h_pt) = match orientation {
            Orientation::Portrait => size_pt,
            Orientation::Landscape => (size_pt.1, size_pt.0),
        };
        self.w_pt = w_pt;
        self.h_pt = h_pt;
        self.w = w_pt / self.k;
        self.h = h_pt / self.k;
        self.page_break_trigger = self.h - self.b_margin;
        self.x = self.l_margin;
        self.y = self.t_margin;
        self.lasth = 0.0;
        self.pages.push(Page {
            buffer: Vec::new(),
            size_pt: (w_pt, h_pt),
            link_zones: Vec::new(),
        });
        self.state = DocState::PageActive;
    }

    fn end_page(&mut self) {
        self.state = DocState::Opened;
    }

    pub(crate) fn run_header(&mut self) -> Result<()> {
        let Some(mut decorator) = self.decorator.take() else {
            return Ok(());
        };
        self.in_header = true;
        let result = decorator.header(self);
        self.in_header = false;
        self.decorator = Some(decorator);
        result
    }

    pub(crate) fn run_footer(&mut self) -> Result<()> {
        let Some(mut decorator) = self.decorator.take() else {
            return Ok(());
        };
        self.in_footer = true;
        let result = decorator.footer(self);
        self.in_footer = false;
        self.decorator = Some(decorator);
        result
    }

    pub(crate) fn accept_page_break(&mut self) -> Result<bool> {
        let Some(mut decorator) = self.decorator.take() else {
            return Ok(self.auto_page_break);
        };
        let result = decorator.accept_page_break(self);
        self.decorator = Some(decorator);
        result
    }

    /// Finish the document. Safe to call more than once; an empty document
    /// gets one blank page.
    pub fn close(&mut self) -> Result<()> {
        if self.state == DocState::Closed {
            return Ok(());
        }
        if self.pages.is_empty() {
            self.add_page(None, None)?;
        }
        self.run_footer()?;
        self.end_page();
        self.output = crate::pdf::serialize(self)?;
        self.state = DocState::Closed;
        Ok(())
    }

    /// Close if needed and return the file bytes.
    pub fn output(&mut self) -> Result<Vec<u8>> {
        self.close()?;
        Ok(self.output.clone())
    }

    /// Close if needed and write the file to `path`.
    pub fn output_to_file(&mut self, path: &Path) -> Result<()> {
        self.close()?;
        fs::write(path, &self.output).map_err(PdfError::OutputWrite)
    }

    // ------------------------------------------------------------ images

    /// Decode `path` once and return its slot; repeated placements share
    /// the object.
    pub(crate) fn image_slot(&mut self, path: &Path, declared_type: Option<&str>) -> Result<usize> {
        let key = path.display().to_string();
        if let Some(&idx) = self.image_index.get(&key) {
            return Ok(idx);
        }
        let image = match declared_type {
            Some(t) => {
                let t = t.to_ascii_lowercase();
                let t = if t == "jpeg" { "jpg".to_string() } else { t };
                let bytes = fs::read(path).map_err(|e| PdfError::ImageRead {
                    file: key.clone(),
                    reason: e.to_string(),
                })?;
                raster::decode_bytes(&bytes, &t, &key)?
            }
            None => raster::decode_file(path)?,
        };
        if image.needs_pdf_14() {
            self.require_version("1.4");
        }
        let idx = self.images.len();
        self.images.push(image);
        self.image_index.insert(key, idx);
        Ok(idx)
    }

    pub(crate) fn require_version(&mut self, version: &'static str) {
        if version > self.min_pdf_version {
            self.min_pdf_version = version;
        }
    }

    // ------------------------------------------------------------ output

    /// Append raw content-stream bytes to the active page.
    pub(crate) fn out(&mut self, bytes: &[u8]) {
        if self.state == DocState::PageActive {
            if let Some(page) = self.pages.last_mut() {
                page.buffer.extend_from_slice(bytes);
            }
        }
    }

    pub(crate) fn require_page(&self) -> Result<()> {
        if self.state != DocState::PageActive {
            return Err(PdfError::Configuration(
                "no page has been added yet".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn require_font(&self) -> Result<usize> {
        self.current_font.ok_or_else(|| {
            PdfError::Configuration("no font has been set".to_string())
        })
    }
}

/// What a link zone points at.
#[derive(Debug, Clone)]
pub enum LinkRef {
    Uri(String),
    Internal(LinkId),
}

impl From<&str> for LinkRef {
    fn from(uri: &str) -> Self {
        LinkRef::Uri(uri.to_string())
    }
}

impl From<String> for LinkRef {
    fn from(uri: String) -> Self {
        LinkRef::Uri(uri)
    }
}

impl From<LinkId> for LinkRef {
    fn from(id: LinkId) -> Self {
        LinkRef::Internal(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_unit_scale() {
        let doc = Document::default();
        assert!((doc.k - 72.0 / 25.4).abs() < 1e-9);
        assert!((doc.w - 210.0).abs() < 0.05);
        assert!((doc.h - 297.0).abs() < 0.05);
        assert!((doc.l_margin - 10.0).abs() < 0.01);
        assert!((doc.b_margin - 20.0).abs() < 0.01);
    }

    #[test]
    fn negative_coordinates_measure_from_far_edge() {
        let mut doc = Document::default();
        doc.add_page(None, None).unwrap();
        doc.set_xy(-30.0, -40.0);
        assert!((doc.get_x() - (doc.w - 30.0)).abs() < 1e-9);
        assert!((doc.get_y() - (doc.h - 40.0)).abs() < 1e-9);
    }

    #[test]
    fn set_y_resets_x_to_left_margin() {
        let mut doc = Document::default();
        doc.add_page(None, None).unwrap();
        doc.set_x(100.0);
        doc.set_y(50.0, false);
        assert!((doc.get_x() - doc.l_margin).abs() < 1e-9);
    }

    #[test]
    fn landscape_page_swaps_dimensions() {
        let mut doc = Document::default();
        doc.add_page(Some(Orientation::Landscape), None).unwrap();
        assert!(doc.w > doc.h);
        doc.add_page(None, None).unwrap();
        assert!(doc.h > doc.w);
        assert_eq!(doc.page_no(), 2);
    }

    #[test]
    fn ops_require_page_and_font() {
        let doc = Document::default();
        assert!(doc.require_page().is_err());
        assert!(doc.require_font().is_err());
    }

    #[test]
    fn close_is_idempotent_and_pads_empty_docs() {
        let mut doc = Document::default();
        doc.close().unwrap();
        assert_eq!(doc.page_no(), 1);
        let first = doc.output().unwrap();
        doc.close().unwrap();
        assert_eq!(doc.output().unwrap(), first);
    }

    #[test]
    fn add_page_after_close_fails() {
        let mut doc = Document::default();
        doc.close().unwrap();
        assert!(matches!(
            doc.add_page(None, None),
            Err(PdfError::Configuration(_))
        ));
    }

    struct NumberedFooter;
    impl PageDecorator for NumberedFooter {
        fn footer(&mut self, doc: &mut Document) -> Result<()> {
            doc.set_y(-15.0, false);
            doc.set_font("helvetica", "I", 8.0)?;
            let label = format!("Page {}", doc.page_no());
            doc.cell(0.0, 10.0, &label, Default::default())
        }
    }

    #[test]
    fn footer_runs_inside_footer_guard() {
        let mut doc = Document::default();
        doc.set_decorator(Box::new(NumberedFooter));
        doc.add_page(None, None).unwrap();
        doc.add_page(None, None).unwrap();
        doc.close().unwrap();
        let first = &doc.pages[0].buffer;
        let text = String::from_utf8_lossy(first);
        assert!(text.contains("Page 1"));
    }

    #[test]
    fn in_place_color_ops_reach_the_page() {
        let mut doc = Document::default();
        doc.add_page(None, None).unwrap();
        doc.set_draw_color(Color::Rgb(255, 0, 0));
        doc.set_fill_color(Color::Gray(200));
        let text = String::from_utf8_lossy(&doc.pages[0].buffer);
        assert!(text.contains("1.000 0.000 0.000 RG"));
        assert!(text.contains("0.784 g"));
    }
}
