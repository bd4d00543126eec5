mod core_fonts;
mod document;
mod error;
mod font;
mod inspect;
mod layout;
mod pdf;
mod raster;
mod subset;
mod types;

pub use document::{Document, LinkId, LinkRef, Metadata, PageDecorator};
pub use error::{PdfError, Result};
pub use font::{ByteFontSubtype, FontDef, FontMetricsCache, FsMetricsCache, TtfMetrics};
pub use inspect::{
    DocumentReport, InspectError, InspectErrorCode, inspect_bytes, inspect_path,
};
pub use layout::{CellOptions, ImageOptions};
pub use types::{
    Align, Border, Color, LayoutMode, LineBreak, Orientation, PageSize, RectStyle, Unit, ZoomMode,
};
