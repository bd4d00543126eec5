//! Error taxonomy for document construction.
//!
//! Every variant is fatal for the document being built: the caller should
//! drop the builder and start over. There are no internal retries and a
//! buffer obtained after a failed serialization must not be used.

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PdfError>;

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    /// A configuration value (unit, page size, orientation, zoom or layout
    /// mode) was rejected at the call that set it.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// `set_font` named a family/style combination that is neither a core
    /// font nor a previously added font.
    #[error("undefined font: {family} {style}")]
    UndefinedFont { family: String, style: String },

    #[error("font file not found: {0}")]
    FontFileNotFound(String),

    #[error("font file corrupt: {0}")]
    FontFileCorrupt(String),

    #[error("unsupported image type: {0}")]
    UnsupportedImageType(String),

    #[error("not a PNG file: {0}")]
    NotAPng(String),

    /// PNG bit depths above 8 are not representable in the descriptor.
    #[error("unsupported bit depth in {0}")]
    UnsupportedBitDepth(String),

    #[error("interlaced PNG not supported: {0}")]
    InterlacingUnsupported(String),

    /// Indexed-color PNG with no PLTE chunk before IEND.
    #[error("missing palette in {0}")]
    MissingPalette(String),

    #[error("image read failure in {file}: {reason}")]
    ImageRead { file: String, reason: String },

    #[error("unable to write output: {0}")]
    OutputWrite(#[source] std::io::Error),

    /// Object/offset bookkeeping mismatch. Unreachable by construction;
    /// reaching it indicates a serializer bug, not caller misuse.
    #[error("internal consistency error: {0}")]
    Internal(String),
}
