//! Value types for the configuration surface and the drawing API.
//!
//! String forms are accepted wherever the original configuration was
//! string-driven, but every parse is validated up front and rejected with
//! [`PdfError::Configuration`] before any document state changes.

use crate::error::{PdfError, Result};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl FromStr for Orientation {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "p" | "portrait" => Ok(Orientation::Portrait),
            "l" | "landscape" => Ok(Orientation::Landscape),
            other => Err(PdfError::Configuration(format!(
                "incorrect orientation: {other}"
            ))),
        }
    }
}

/// Measurement unit for user coordinates. Every unit is a fixed number of
/// PostScript points per user unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Point,
    Millimeter,
    Centimeter,
    Inch,
}

impl Unit {
    /// Points per user unit.
    pub fn scale(self) -> f64 {
        match self {
            Unit::Point => 1.0,
            Unit::Millimeter => 72.0 / 25.4,
            Unit::Centimeter => 72.0 / 2.54,
            Unit::Inch => 72.0,
        }
    }
}

impl FromStr for Unit {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pt" => Ok(Unit::Point),
            "mm" => Ok(Unit::Millimeter),
            "cm" => Ok(Unit::Centimeter),
            "in" => Ok(Unit::Inch),
            other => Err(PdfError::Configuration(format!("incorrect unit: {other}"))),
        }
    }
}

/// A page format, either one of the named standard sizes or explicit
/// dimensions in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageSize {
    A3,
    A4,
    A5,
    Letter,
    Legal,
    Custom { width_pt: f64, height_pt: f64 },
}

impl PageSize {
    /// Portrait-normalized `(width, height)` in points: width never exceeds
    /// height, matching how custom sizes are stored.
    pub fn size_pt(self) -> (f64, f64) {
        match self {
            PageSize::A3 => (841.89, 1190.55),
            PageSize::A4 => (595.28, 841.89),
            PageSize::A5 => (420.94, 595.28),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::Custom {
                width_pt,
                height_pt,
            } => {
                if width_pt > height_pt {
                    (height_pt, width_pt)
                } else {
                    (width_pt, height_pt)
                }
            }
        }
    }
}

impl FromStr for PageSize {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "a3" => Ok(PageSize::A3),
            "a4" => Ok(PageSize::A4),
            "a5" => Ok(PageSize::A5),
            "letter" => Ok(PageSize::Letter),
            "legal" => Ok(PageSize::Legal),
            other => Err(PdfError::Configuration(format!(
                "unknown page size: {other}"
            ))),
        }
    }
}

/// Viewer zoom applied through the catalog's `/OpenAction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomMode {
    FullPage,
    FullWidth,
    Real,
    Default,
    /// Zoom percentage, e.g. `150.0`.
    Percent(f64),
}

impl FromStr for ZoomMode {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fullpage" => Ok(ZoomMode::FullPage),
            "fullwidth" => Ok(ZoomMode::FullWidth),
            "real" => Ok(ZoomMode::Real),
            "default" => Ok(ZoomMode::Default),
            other => Err(PdfError::Configuration(format!(
                "incorrect zoom display mode: {other}"
            ))),
        }
    }
}

/// Viewer page layout applied through the catalog's `/PageLayout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    Single,
    Continuous,
    TwoColumn,
    Default,
}

impl FromStr for LayoutMode {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(LayoutMode::Single),
            "continuous" => Ok(LayoutMode::Continuous),
            "two" => Ok(LayoutMode::TwoColumn),
            "default" => Ok(LayoutMode::Default),
            other => Err(PdfError::Configuration(format!(
                "incorrect layout display mode: {other}"
            ))),
        }
    }
}

/// Horizontal alignment of text inside a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
    /// Stretch inter-word spacing to fill the line. Only meaningful for
    /// `multi_cell`; falls back to left alignment inside a single `cell`.
    Justify,
}

/// Cursor movement after a cell is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineBreak {
    /// Stay on the line; the cursor advances by the cell width.
    #[default]
    Right,
    /// Drop below the cell and return to the left margin.
    NewLine,
    /// Drop below the cell, keeping the current horizontal position.
    Below,
}

/// Which cell edges to stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Border {
    pub left: bool,
    pub top: bool,
    pub right: bool,
    pub bottom: bool,
}

impl Border {
    pub const NONE: Border = Border {
        left: false,
        top: false,
        right: false,
        bottom: false,
    };
    pub const FRAME: Border = Border {
        left: true,
        top: true,
        right: true,
        bottom: true,
    };

    pub fn any(self) -> bool {
        self.left || self.top || self.right || self.bottom
    }

    /// A full frame is stroked as one rectangle; partial borders as
    /// individual edge lines.
    pub(crate) fn is_frame(self) -> bool {
        self == Border::FRAME
    }
}

/// A stroking/filling color. Grayscale and RGB map onto the `G`/`RG`
/// (stroke) and `g`/`rg` (fill) operator families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Gray(u8),
    Rgb(u8, u8, u8),
}

impl Color {
    pub const BLACK: Color = Color::Gray(0);

    pub(crate) fn stroke_op(self) -> String {
        match self.collapse() {
            Color::Gray(v) => format!("{:.3} G", f64::from(v) / 255.0),
            Color::Rgb(r, g, b) => format!(
                "{:.3} {:.3} {:.3} RG",
                f64::from(r) / 255.0,
                f64::from(g) / 255.0,
                f64::from(b) / 255.0
            ),
        }
    }

    pub(crate) fn fill_op(self) -> String {
        match self.collapse() {
            Color::Gray(v) => format!("{:.3} g", f64::from(v) / 255.0),
            Color::Rgb(r, g, b) => format!(
                "{:.3} {:.3} {:.3} rg",
                f64::from(r) / 255.0,
                f64::from(g) / 255.0,
                f64::from(b) / 255.0
            ),
        }
    }

    // Pure black RGB collapses to the single-component form.
    fn collapse(self) -> Color {
        match self {
            Color::Rgb(0, 0, 0) => Color::Gray(0),
            other => other,
        }
    }
}

/// Painting style for `rect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RectStyle {
    #[default]
    Stroke,
    Fill,
    FillStroke,
}

impl RectStyle {
    pub(crate) fn operator(self) -> &'static str {
        match self {
            RectStyle::Stroke => "S",
            RectStyle::Fill => "f",
            RectStyle::FillStroke => "B",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_scales() {
        assert_eq!(Unit::Point.scale(), 1.0);
        assert!((Unit::Millimeter.scale() - 2.834_645_669).abs() < 1e-6);
        assert_eq!(Unit::Inch.scale(), 72.0);
    }

    #[test]
    fn named_page_sizes_parse() {
        assert_eq!("A4".parse::<PageSize>().unwrap(), PageSize::A4);
        assert_eq!("letter".parse::<PageSize>().unwrap(), PageSize::Letter);
        assert!(matches!(
            "tabloid".parse::<PageSize>(),
            Err(PdfError::Configuration(_))
        ));
    }

    #[test]
    fn custom_size_normalizes_to_portrait() {
        let size = PageSize::Custom {
            width_pt: 800.0,
            height_pt: 400.0,
        };
        assert_eq!(size.size_pt(), (400.0, 800.0));
    }

    #[test]
    fn black_rgb_collapses_to_gray_operator() {
        assert_eq!(Color::Rgb(0, 0, 0).stroke_op(), "0.000 G");
        assert_eq!(Color::Rgb(255, 0, 0).fill_op(), "1.000 0.000 0.000 rg");
    }

    #[test]
    fn orientation_accepts_long_and_short_forms() {
        assert_eq!(
            "Landscape".parse::<Orientation>().unwrap(),
            Orientation::Landscape
        );
        assert_eq!("p".parse::<Orientation>().unwrap(), Orientation::Portrait);
        assert!("diagonal".parse::<Orientation>().is_err());
    }
}
