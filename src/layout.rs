//! Text flow and drawing primitives.
//!
//! Everything here appends operators to the active page through
//! `Document::out`. Cells are the unit of text placement: a rectangle with
//! optional border and fill, text baseline at `y + h/2 + 0.3 em`, and a
//! cursor move afterwards. `multi_cell` and `write` are greedy word-wrap
//! loops over cells; they break at the last space when one fits, and
//! mid-word when none does.
//!
//! Justification differs by font kind. Single-byte text sets the word
//! spacing parameter (`Tw`); CID-keyed text leaves `Tw` at zero (viewers
//! ignore it for multi-byte encodings) and instead emits a `TJ` array with
//! an explicit adjustment before every space.

use std::path::Path;

use crate::document::{Document, LinkRef};
use crate::error::Result;
use crate::font::encode_winansi;
use crate::types::{Align, Border, LineBreak, RectStyle};

/// Cell behavior knobs. The default is a borderless,
/// transparent, left-aligned cell that moves the cursor to its right.
#[derive(Debug, Clone, Default)]
pub struct CellOptions {
    pub border: Border,
    pub line_break: LineBreak,
    pub align: Align,
    pub fill: bool,
    pub link: Option<LinkRef>,
}

/// Placement options for [`Document::image`]. `w`/`h` of 0 derive the
/// missing extent from the image aspect ratio; negative values are read as
/// a dpi. With neither given the image renders at 96 dpi.
#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub w: f64,
    pub h: f64,
    /// Explicit format ("png", "jpg", "jpeg", "gif") overriding the file
    /// extension.
    pub kind: Option<String>,
    pub link: Option<LinkRef>,
}

pub(crate) fn escape_into(out: &mut Vec<u8>, bytes: &[u8]) {
    for &b in bytes {
        match b {
            b'\\' | b'(' | b')' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(b),
        }
    }
}

pub(crate) fn utf16be(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
}

impl Document {
    /// Print one cell. A width of 0 extends to the right margin.
    pub fn cell(&mut self, w: f64, h: f64, text: &str, opts: CellOptions) -> Result<()> {
        self.require_page()?;
        let k = self.k;

        if self.y + h > self.page_break_trigger
            && !self.in_header
            && !self.in_footer
            && self.accept_page_break()?
        {
            // The break must not disturb x or the justification state.
            let x = self.x;
            let ws = self.ws;
            if ws > 0.0 {
                self.ws = 0.0;
                self.out(b"0 Tw\n");
            }
            self.add_page(Some(self.cur_orientation), self.cur_size)?;
            self.x = x;
            if ws > 0.0 {
                self.ws = ws;
                let op = format!("{:.3} Tw\n", ws * k);
                self.out(op.as_bytes());
            }
        }

        let w = if w == 0.0 {
            self.w - self.r_margin - self.x
        } else {
            w
        };

        let mut s: Vec<u8> = Vec::new();
        let border = opts.border;
        if opts.fill || border.is_frame() {
            let op = if opts.fill {
                if border.is_frame() {
                    "B"
                } else {
                    "f"
                }
            } else {
                "S"
            };
            s.extend(
                format!(
                    "{:.2} {:.2} {:.2} {:.2} re {} ",
                    self.x * k,
                    (self.h - self.y) * k,
                    w * k,
                    -h * k,
                    op
                )
                .bytes(),
            );
        }
        if border.any() && !border.is_frame() {
            let (x, y) = (self.x, self.y);
            let mut edge = |x1: f64, y1: f64, x2: f64, y2: f64| {
                s.extend(
                    format!(
                        "{:.2} {:.2} m {:.2} {:.2} l S ",
                        x1 * k,
                        (self.h - y1) * k,
                        x2 * k,
                        (self.h - y2) * k
                    )
                    .bytes(),
                );
            };
            if border.left {
                edge(x, y, x, y + h);
            }
            if border.top {
                edge(x, y, x + w, y);
            }
            if border.right {
                edge(x + w, y, x + w, y + h);
            }
            if border.bottom {
                edge(x, y + h, x + w, y + h);
            }
        }

        if !text.is_empty() {
            let font_idx = self.require_font()?;
            let dx = match opts.align {
                Align::Right => w - self.c_margin - self.get_string_width(text),
                Align::Center => (w - self.get_string_width(text)) / 2.0,
                _ => self.c_margin,
            };
            if self.color_flag {
                s.extend(format!("q {} ", self.text_color).bytes());
            }
            let unicode = self.fonts.font(font_idx).is_unicode();
            if unicode {
                self.fonts.record_text(font_idx, text);
            }
            let tx = (self.x + dx) * k;
            let ty = (self.h - (self.y + 0.5 * h + 0.3 * self.font_size)) * k;
            if unicode && self.ws > 0.0 {
                // Spacing must be painted explicitly for CID text.
                s.extend(format!("BT 0 Tw {tx:.2} {ty:.2} Td [").bytes());
                let words: Vec<&str> = text.split(' ').collect();
                let adj = (-(self.ws * k) * 1000.0 / self.font_size_pt) as i64;
                for (i, word) in words.iter().enumerate() {
                    s.push(b'(');
                    escape_into(&mut s, &utf16be(word));
                    s.extend_from_slice(b") ");
                    if i + 1 < words.len() {
                        s.extend(format!("{adj}(").bytes());
                        escape_into(&mut s, &utf16be(" "));
                        s.extend_from_slice(b") ");
                    }
                }
                s.extend_from_slice(b"] TJ ET");
            } else {
                s.extend(format!("BT {tx:.2} {ty:.2} Td (").bytes());
                if unicode {
                    escape_into(&mut s, &utf16be(text));
                } else {
                    escape_into(&mut s, &encode_winansi(text));
                }
                s.extend_from_slice(b") Tj ET");
            }
            if self.underline {
                s.push(b' ');
                let op =
                    self.underline_op(self.x + dx, self.y + 0.5 * h + 0.3 * self.font_size, text);
                s.extend(op.bytes());
            }
            if self.color_flag {
                s.extend_from_slice(b" Q");
            }
            if let Some(link) = opts.link {
                self.link(
                    self.x + dx,
                    self.y + 0.5 * h - 0.5 * self.font_size,
                    self.get_string_width(text),
                    self.font_size,
                    link,
                );
            }
        }

        if !s.is_empty() {
            s.push(b'\n');
            self.out(&s);
        }
        self.lasth = h;
        match opts.line_break {
            LineBreak::Right => self.x += w,
            LineBreak::NewLine => {
                self.y += h;
                self.x = self.l_margin;
            }
            LineBreak::Below => self.y += h,
        }
        Ok(())
    }

    fn underline_op(&self, x: f64, y: f64, text: &str) -> String {
        let font = self.fonts.font(self.current_font.unwrap_or_default());
        let up = font.underline_position as f64;
        let ut = font.underline_thickness as f64;
        let spaces = text.matches(' ').count() as f64;
        let w = self.get_string_width(text) + self.ws * spaces;
        format!(
            "{:.2} {:.2} {:.2} {:.2} re f",
            x * self.k,
            (self.h - (y - up / 1000.0 * self.font_size)) * self.k,
            w * self.k,
            -ut / 1000.0 * self.font_size_pt
        )
    }

    /// Print wrapping text in a column of width `w`, one cell per line.
    /// Ends at the left margin below the last line.
    pub fn multi_cell(
        &mut self,
        w: f64,
        h: f64,
        text: &str,
        border: Border,
        align: Align,
        fill: bool,
    ) -> Result<()> {
        self.require_page()?;
        let font_idx = self.require_font()?;
        let w = if w == 0.0 {
            self.w - self.r_margin - self.x
        } else {
            w
        };
        let wmax = (w - 2.0 * self.c_margin) * 1000.0 / self.font_size;

        let chars: Vec<char> = text.chars().filter(|&c| c != '\r').collect();
        let mut nb = chars.len();
        if nb > 0 && chars[nb - 1] == '\n' {
            nb -= 1;
        }

        let b2 = Border {
            left: border.left,
            right: border.right,
            top: false,
            bottom: false,
        };
        let mut b = Border {
            top: border.top,
            ..b2
        };

        let mut sep: Option<usize> = None;
        let mut i = 0usize;
        let mut j = 0usize;
        let mut l = 0.0f64;
        let mut ls = 0.0f64;
        let mut ns = 0usize;
        let mut nl = 1usize;

        let line = |doc: &mut Document, from: usize, to: usize, b: Border| -> Result<()> {
            let chunk: String = chars[from..to].iter().collect();
            doc.cell(
                w,
                h,
                &chunk,
                CellOptions {
                    border: b,
                    line_break: LineBreak::Below,
                    align,
                    fill,
                    link: None,
                },
            )
        };

        while i < nb {
            let c = chars[i];
            if c == '\n' {
                if self.ws > 0.0 {
                    self.ws = 0.0;
                    self.out(b"0 Tw\n");
                }
                line(self, j, i, b)?;
                i += 1;
                sep = None;
                j = i;
                l = 0.0;
                ns = 0;
                nl += 1;
                if border.any() && nl == 2 {
                    b = b2;
                }
                continue;
            }
            if c == ' ' {
                sep = Some(i);
                ls = l;
                ns += 1;
            }
            l += self.fonts.font(font_idx).char_width(c) as f64;
            if l > wmax {
                match sep {
                    None => {
                        if i == j {
                            i += 1;
                        }
                        if self.ws > 0.0 {
                            self.ws = 0.0;
                            self.out(b"0 Tw\n");
                        }
                        line(self, j, i, b)?;
                    }
                    Some(sep_at) => {
                        if align == Align::Justify {
                            self.ws = if ns > 1 {
                                (wmax - ls) / 1000.0 * self.font_size / (ns - 1) as f64
                            } else {
                                0.0
                            };
                            let op = format!("{:.3} Tw\n", self.ws * self.k);
                            self.out(op.as_bytes());
                        }
                        line(self, j, sep_at, b)?;
                        i = sep_at + 1;
                    }
                }
                sep = None;
                j = i;
                l = 0.0;
                ns = 0;
                nl += 1;
                if border.any() && nl == 2 {
                    b = b2;
                }
            } else {
                i += 1;
            }
        }

        if self.ws > 0.0 {
            self.ws = 0.0;
            self.out(b"0 Tw\n");
        }
        if border.bottom {
            b.bottom = true;
        }
        line(self, j, i, b)?;
        self.x = self.l_margin;
        Ok(())
    }

    /// Print flowing text from the current position, wrapping at the right
    /// margin. After the first wrap the flow restarts at the left margin.
    pub fn write(&mut self, h: f64, text: &str, link: Option<LinkRef>) -> Result<()> {
        self.require_page()?;
        let font_idx = self.require_font()?;
        let mut w = self.w - self.r_margin - self.x;
        let mut wmax = (w - 2.0 * self.c_margin) * 1000.0 / self.font_size;

        let chars: Vec<char> = text.chars().filter(|&c| c != '\r').collect();
        let nb = chars.len();

        let mut sep: Option<usize> = None;
        let mut i = 0usize;
        let mut j = 0usize;
        let mut l = 0.0f64;
        let mut nl = 1usize;

        while i < nb {
            let c = chars[i];
            if c == '\n' {
                let chunk: String = chars[j..i].iter().collect();
                self.cell(
                    w,
                    h,
                    &chunk,
                    CellOptions {
                        line_break: LineBreak::Below,
                        link: link.clone(),
                        ..Default::default()
                    },
                )?;
                i += 1;
                sep = None;
                j = i;
                l = 0.0;
                if nl == 1 {
                    self.x = self.l_margin;
                    w = self.w - self.r_margin - self.x;
                    wmax = (w - 2.0 * self.c_margin) * 1000.0 / self.font_size;
                }
                nl += 1;
                continue;
            }
            if c == ' ' {
                sep = Some(i);
            }
            l += self.fonts.font(font_idx).char_width(c) as f64;
            if l > wmax {
                match sep {
                    None => {
                        if self.x > self.l_margin {
                            // Not at the margin yet: drop to a full line
                            // first and re-measure there.
                            self.x = self.l_margin;
                            self.y += h;
                            w = self.w - self.r_margin - self.x;
                            wmax = (w - 2.0 * self.c_margin) * 1000.0 / self.font_size;
                            i += 1;
                            nl += 1;
                            continue;
                        }
                        if i == j {
                            i += 1;
                        }
                        let chunk: String = chars[j..i].iter().collect();
                        self.cell(
                            w,
                            h,
                            &chunk,
                            CellOptions {
                                line_break: LineBreak::Below,
                                link: link.clone(),
                                ..Default::default()
                            },
                        )?;
                    }
                    Some(sep_at) => {
                        let chunk: String = chars[j..sep_at].iter().collect();
                        self.cell(
                            w,
                            h,
                            &chunk,
                            CellOptions {
                                line_break: LineBreak::Below,
                                link: link.clone(),
                                ..Default::default()
                            },
                        )?;
                        i = sep_at + 1;
                    }
                }
                sep = None;
                j = i;
                l = 0.0;
                if nl == 1 {
                    self.x = self.l_margin;
                    w = self.w - self.r_margin - self.x;
                    wmax = (w - 2.0 * self.c_margin) * 1000.0 / self.font_size;
                }
                nl += 1;
            } else {
                i += 1;
            }
        }

        if i != j {
            let chunk: String = chars[j..].iter().collect();
            self.cell(
                l / 1000.0 * self.font_size,
                h,
                &chunk,
                CellOptions {
                    link,
                    ..Default::default()
                },
            )?;
        }
        Ok(())
    }

    /// Paint text at an exact position without touching the cursor.
    pub fn text(&mut self, x: f64, y: f64, text: &str) -> Result<()> {
        self.require_page()?;
        let font_idx = self.require_font()?;
        let unicode = self.fonts.font(font_idx).is_unicode();
        if unicode {
            self.fonts.record_text(font_idx, text);
        }
        let mut s: Vec<u8> = Vec::new();
        if self.color_flag {
            s.extend(format!("q {} ", self.text_color).bytes());
        }
        s.extend(format!("BT {:.2} {:.2} Td (", x * self.k, (self.h - y) * self.k).bytes());
        if unicode {
            escape_into(&mut s, &utf16be(text));
        } else {
            escape_into(&mut s, &encode_winansi(text));
        }
        s.extend_from_slice(b") Tj ET");
        if self.underline && !text.is_empty() {
            s.push(b' ');
            s.extend(self.underline_op(x, y, text).bytes());
        }
        if self.color_flag {
            s.extend_from_slice(b" Q");
        }
        s.push(b'\n');
        self.out(&s);
        Ok(())
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<()> {
        self.require_page()?;
        let k = self.k;
        let op = format!(
            "{:.2} {:.2} m {:.2} {:.2} l S\n",
            x1 * k,
            (self.h - y1) * k,
            x2 * k,
            (self.h - y2) * k
        );
        self.out(op.as_bytes());
        Ok(())
    }

    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, style: RectStyle) -> Result<()> {
        self.require_page()?;
        let k = self.k;
        let op = format!(
            "{:.2} {:.2} {:.2} {:.2} re {}\n",
            x * k,
            (self.h - y) * k,
            w * k,
            -h * k,
            style.operator()
        );
        self.out(op.as_bytes());
        Ok(())
    }

    /// Place an image. Without a `y` the image flows at the cursor and
    /// advances it, breaking the page when it does not fit.
    pub fn image(&mut self, path: &Path, opts: ImageOptions) -> Result<()> {
        self.require_page()?;
        let slot = self.image_slot(path, opts.kind.as_deref())?;
        let (px_w, px_h) = {
            let img = &self.images[slot];
            (img.width as f64, img.height as f64)
        };

        let (mut w, mut h) = (opts.w, opts.h);
        if w == 0.0 && h == 0.0 {
            // Put the image at 96 dpi.
            w = -96.0;
            h = -96.0;
        }
        if w < 0.0 {
            w = -px_w * 72.0 / w / self.k;
        }
        if h < 0.0 {
            h = -px_h * 72.0 / h / self.k;
        }
        if w == 0.0 {
            w = h * px_w / px_h;
        }
        if h == 0.0 {
            h = w * px_h / px_w;
        }

        let y = match opts.y {
            Some(y) => y,
            None => {
                if self.y + h > self.page_break_trigger
                    && !self.in_header
                    && !self.in_footer
                    && self.accept_page_break()?
                {
                    let x = self.x;
                    self.add_page(Some(self.cur_orientation), self.cur_size)?;
                    self.x = x;
                }
                let y = self.y;
                self.y += h;
                y
            }
        };
        let x = opts.x.unwrap_or(self.x);

        let k = self.k;
        let op = format!(
            "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /I{} Do Q\n",
            w * k,
            h * k,
            x * k,
            (self.h - (y + h)) * k,
            slot + 1
        );
        self.out(op.as_bytes());
        if let Some(link) = opts.link {
            self.link(x, y, w, h, link);
        }
        Ok(())
    }

    /// Move to the next line. `None` reuses the last cell height.
    pub fn line_feed(&mut self, h: Option<f64>) {
        self.x = self.l_margin;
        self.y += h.unwrap_or(self.lasth);
    }
}
