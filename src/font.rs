//! Font registration and measurement.
//!
//! Fonts are looked up by a key of lowercase family plus uppercase style
//! letters ("helveticaB"). The fourteen builtin fonts resolve on first use
//! without registration; everything else enters through one of the
//! `add_*` calls. Unicode TrueType fonts keep the parsed face metrics and
//! a growing set of painted codepoints so the serializer can subset the
//! font program once at close.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use ttf_parser::Face;

use crate::core_fonts;
use crate::error::{PdfError, Result};

/// Windows-1252 codepoints for bytes 0x80..0x9F. The other bytes map to
/// the identical Unicode scalar.
const CP1252_HIGH: [u16; 32] = [
    0x20AC, 0x0081, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, //
    0x02C6, 0x2030, 0x0160, 0x2039, 0x0152, 0x008D, 0x017D, 0x008F, //
    0x0090, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, //
    0x02DC, 0x2122, 0x0161, 0x203A, 0x0153, 0x009D, 0x017E, 0x0178, //
];

pub(crate) fn byte_to_unicode(b: u8) -> u32 {
    if (0x80..0xA0).contains(&b) {
        CP1252_HIGH[(b - 0x80) as usize] as u32
    } else {
        b as u32
    }
}

/// Map a char to its WinAnsi byte, or None when the encoding has no slot
/// for it.
pub(crate) fn char_to_winansi(c: char) -> Option<u8> {
    let cp = c as u32;
    if cp < 0x80 || (0xA0..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    CP1252_HIGH
        .iter()
        .position(|&u| u as u32 == cp)
        .map(|i| (i + 0x80) as u8)
}

/// Encode text for a single-byte font. Unmappable chars become '?'.
pub(crate) fn encode_winansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| char_to_winansi(c).unwrap_or(b'?'))
        .collect()
}

/// Descriptor-level metrics extracted from a TrueType face, everything in
/// 1/1000 em.
#[derive(Debug, Clone, PartialEq)]
pub struct TtfMetrics {
    pub postscript_name: String,
    pub ascent: i32,
    pub descent: i32,
    pub cap_height: i32,
    pub flags: u32,
    pub bbox: [i32; 4],
    pub italic_angle: f64,
    pub stem_v: i32,
    pub missing_width: u16,
    pub underline_position: i32,
    pub underline_thickness: i32,
    /// Advance per mapped codepoint.
    pub char_widths: BTreeMap<u32, u16>,
    /// Glyph id per mapped codepoint, in the original font.
    pub char_glyphs: BTreeMap<u32, u16>,
}

impl TtfMetrics {
    pub(crate) fn from_face(face: &Face, fallback_name: &str) -> Self {
        let scale = 1000.0 / face.units_per_em() as f64;
        let s = |v: i32| (v as f64 * scale).round() as i32;

        let postscript_name = face
            .names()
            .into_iter()
            .find(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
            .and_then(|n| n.to_string())
            .unwrap_or_else(|| fallback_name.to_string());

        let ascent = s(face.ascender() as i32);
        let descent = s(face.descender() as i32);
        let cap_height = face.capital_height().map(|c| s(c as i32)).unwrap_or(ascent);

        let italic_angle = face.italic_angle().unwrap_or(0.0) as f64;
        let mut flags = 4u32;
        if italic_angle != 0.0 {
            flags |= 64;
        }
        if face.is_monospaced() {
            flags |= 1;
        }

        let gb = face.global_bounding_box();
        let bbox = [
            s(gb.x_min as i32),
            s(gb.y_min as i32),
            s(gb.x_max as i32),
            s(gb.y_max as i32),
        ];

        let weight = face.weight().to_number() as f64;
        let stem_v = 50 + ((weight / 65.0) * (weight / 65.0)) as i32;

        let missing_width = face
            .glyph_hor_advance(ttf_parser::GlyphId(0))
            .map(|a| (a as f64 * scale).round() as u16)
            .unwrap_or(500);

        let (underline_position, underline_thickness) = face
            .underline_metrics()
            .map(|m| (s(m.position as i32), s(m.thickness as i32)))
            .unwrap_or((-100, 50));

        let mut char_widths = BTreeMap::new();
        let mut char_glyphs = BTreeMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|cp| {
                    if char_glyphs.contains_key(&cp) {
                        return;
                    }
                    let Some(gid) = subtable.glyph_index(cp) else {
                        return;
                    };
                    let Some(adv) = face.glyph_hor_advance(gid) else {
                        return;
                    };
                    char_glyphs.insert(cp, gid.0);
                    char_widths.insert(cp, (adv as f64 * scale).round() as u16);
                });
            }
        }

        TtfMetrics {
            postscript_name,
            ascent,
            descent,
            cap_height,
            flags,
            bbox,
            italic_angle,
            stem_v,
            missing_width,
            underline_position,
            underline_thickness,
            char_widths,
            char_glyphs,
        }
    }
}

/// Pluggable cache for parsed face metrics, keyed by the font key plus the
/// font file length. A length mismatch invalidates the entry.
pub trait FontMetricsCache {
    fn get(&self, key: &str, file_len: u64) -> Option<TtfMetrics>;
    fn put(&self, key: &str, file_len: u64, metrics: &TtfMetrics);
}

/// Filesystem cache, one binary blob per font key. Reads and writes are
/// best-effort: a corrupt or unwritable cache only costs a re-parse.
pub struct FsMetricsCache {
    dir: PathBuf,
}

const CACHE_MAGIC: &[u8; 4] = b"pmc1";

impl FsMetricsCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FsMetricsCache { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.metrics"))
    }
}

impl FontMetricsCache for FsMetricsCache {
    fn get(&self, key: &str, file_len: u64) -> Option<TtfMetrics> {
        let bytes = fs::read(self.path_for(key)).ok()?;
        let metrics = decode_cached_metrics(&bytes, file_len)?;
        Some(metrics)
    }

    fn put(&self, key: &str, file_len: u64, metrics: &TtfMetrics) {
        let path = self.path_for(key);
        if let Err(e) = fs::create_dir_all(&self.dir)
            .and_then(|_| fs::write(&path, encode_cached_metrics(file_len, metrics)))
        {
            log::warn!("metrics cache write to {} failed: {e}", path.display());
        }
    }
}

fn encode_cached_metrics(file_len: u64, m: &TtfMetrics) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(CACHE_MAGIC);
    out.extend_from_slice(&file_len.to_le_bytes());
    let name = m.postscript_name.as_bytes();
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(name);
    for v in [m.ascent, m.descent, m.cap_height, m.stem_v] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.extend_from_slice(&m.flags.to_le_bytes());
    for v in m.bbox {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.extend_from_slice(&m.italic_angle.to_le_bytes());
    out.extend_from_slice(&m.missing_width.to_le_bytes());
    for v in [m.underline_position, m.underline_thickness] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.extend_from_slice(&(m.char_widths.len() as u32).to_le_bytes());
    for (&cp, &w) in &m.char_widths {
        let gid = m.char_glyphs.get(&cp).copied().unwrap_or(0);
        out.extend_from_slice(&cp.to_le_bytes());
        out.extend_from_slice(&w.to_le_bytes());
        out.extend_from_slice(&gid.to_le_bytes());
    }
    out
}

fn decode_cached_metrics(bytes: &[u8], expect_len: u64) -> Option<TtfMetrics> {
    struct Reader<'a> {
        bytes: &'a [u8],
        pos: usize,
    }
    impl<'a> Reader<'a> {
        fn take(&mut self, n: usize) -> Option<&'a [u8]> {
            let slice = self.bytes.get(self.pos..self.pos + n)?;
            self.pos += n;
            Some(slice)
        }
        fn u16(&mut self) -> Option<u16> {
            Some(u16::from_le_bytes(self.take(2)?.try_into().ok()?))
        }
        fn u32(&mut self) -> Option<u32> {
            Some(u32::from_le_bytes(self.take(4)?.try_into().ok()?))
        }
        fn i32(&mut self) -> Option<i32> {
            Some(i32::from_le_bytes(self.take(4)?.try_into().ok()?))
        }
        fn u64(&mut self) -> Option<u64> {
            Some(u64::from_le_bytes(self.take(8)?.try_into().ok()?))
        }
        fn f64(&mut self) -> Option<f64> {
            Some(f64::from_le_bytes(self.take(8)?.try_into().ok()?))
        }
    }

    let mut r = Reader { bytes, pos: 0 };
    if r.take(4)? != CACHE_MAGIC {
        return None;
    }
    if r.u64()? != expect_len {
        return None;
    }
    let name_len = r.u16()? as usize;
    let postscript_name = String::from_utf8(r.take(name_len)?.to_vec()).ok()?;
    let ascent = r.i32()?;
    let descent = r.i32()?;
    let cap_height = r.i32()?;
    let stem_v = r.i32()?;
    let flags = r.u32()?;
    let bbox = [r.i32()?, r.i32()?, r.i32()?, r.i32()?];
    let italic_angle = r.f64()?;
    let missing_width = r.u16()?;
    let underline_position = r.i32()?;
    let underline_thickness = r.i32()?;
    let count = r.u32()? as usize;
    let mut char_widths = BTreeMap::new();
    let mut char_glyphs = BTreeMap::new();
    for _ in 0..count {
        let cp = r.u32()?;
        let w = r.u16()?;
        let gid = r.u16()?;
        char_widths.insert(cp, w);
        char_glyphs.insert(cp, gid);
    }
    Some(TtfMetrics {
        postscript_name,
        ascent,
        descent,
        cap_height,
        flags,
        bbox,
        italic_angle,
        stem_v,
        missing_width,
        underline_position,
        underline_thickness,
        char_widths,
        char_glyphs,
    })
}

/// Embedded font program subtype for single-byte fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteFontSubtype {
    Type1,
    TrueType,
}

impl ByteFontSubtype {
    pub(crate) fn pdf_name(self) -> &'static str {
        match self {
            ByteFontSubtype::Type1 => "Type1",
            ByteFontSubtype::TrueType => "TrueType",
        }
    }
}

/// A pre-processed font program ready for a FontFile stream.
#[derive(Debug, Clone)]
pub(crate) struct EmbeddedProgram {
    pub(crate) data: Vec<u8>,
    /// /Length1 (and 2/3 for Type1 binary segments).
    pub(crate) length1: usize,
    pub(crate) length2: Option<usize>,
    pub(crate) length3: Option<usize>,
}

/// Caller-supplied definition for a non-Unicode embedded font, the moral
/// equivalent of a compiled AFM description.
#[derive(Debug, Clone)]
pub struct FontDef {
    pub name: String,
    pub subtype: ByteFontSubtype,
    pub underline_position: i32,
    pub underline_thickness: i32,
    pub widths: [u16; 256],
    /// FontDescriptor entries as (key, value) pairs, without FontFile.
    pub descriptor: Vec<(String, String)>,
    /// /Differences body for a non-WinAnsi encoding.
    pub encoding_diff: Option<String>,
    /// Path to the font program; None for unembedded fonts.
    pub font_file: Option<PathBuf>,
}

pub(crate) enum FontKind {
    Core {
        name: &'static str,
        widths: &'static [u16; 256],
    },
    Byte {
        name: String,
        subtype: ByteFontSubtype,
        widths: Box<[u16; 256]>,
        descriptor: Vec<(String, String)>,
        encoding_diff: Option<String>,
        program: Option<EmbeddedProgram>,
    },
    Unicode {
        metrics: TtfMetrics,
        ttf_data: Vec<u8>,
        /// Codepoints painted so far.
        used: BTreeSet<u32>,
    },
}

pub(crate) struct Font {
    pub(crate) key: String,
    pub(crate) underline_position: i32,
    pub(crate) underline_thickness: i32,
    pub(crate) kind: FontKind,
}

impl Font {
    pub(crate) fn is_unicode(&self) -> bool {
        matches!(self.kind, FontKind::Unicode { .. })
    }

    /// Advance of one char in 1/1000 units of the font size.
    pub(crate) fn char_width(&self, c: char) -> u32 {
        match &self.kind {
            FontKind::Core { widths, .. } => {
                widths[char_to_winansi(c).unwrap_or(b'?') as usize] as u32
            }
            FontKind::Byte { widths, .. } => {
                widths[char_to_winansi(c).unwrap_or(b'?') as usize] as u32
            }
            FontKind::Unicode { metrics, .. } => metrics
                .char_widths
                .get(&(c as u32))
                .copied()
                .map(u32::from)
                .unwrap_or_else(|| {
                    if metrics.missing_width > 0 {
                        metrics.missing_width as u32
                    } else {
                        500
                    }
                }),
        }
    }

    /// Sum of advances in 1/1000 units of the font size.
    pub(crate) fn text_width(&self, text: &str) -> u64 {
        text.chars().map(|c| self.char_width(c) as u64).sum()
    }
}

pub(crate) struct FontRegistry {
    fonts: Vec<Font>,
    index: HashMap<String, usize>,
}

fn normalize_family(family: &str) -> String {
    let family = family.to_ascii_lowercase();
    if family == "arial" {
        "helvetica".to_string()
    } else {
        family
    }
}

fn normalize_style(style: &str) -> String {
    let style = style.to_ascii_uppercase();
    if style == "IB" {
        "BI".to_string()
    } else {
        style
    }
}

impl FontRegistry {
    pub(crate) fn new() -> Self {
        FontRegistry {
            fonts: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub(crate) fn fonts(&self) -> &[Font] {
        &self.fonts
    }

    pub(crate) fn font(&self, idx: usize) -> &Font {
        &self.fonts[idx]
    }

    pub(crate) fn len(&self) -> usize {
        self.fonts.len()
    }

    /// Look up a font for `set_font`, registering builtin families on
    /// first use.
    pub(crate) fn resolve(&mut self, family: &str, style: &str) -> Result<usize> {
        let family = normalize_family(family);
        let mut style = normalize_style(style);
        if family == "symbol" || family == "zapfdingbats" {
            style.clear();
        }
        let key = format!("{family}{style}");
        if let Some(&idx) = self.index.get(&key) {
            return Ok(idx);
        }
        let Some((name, widths)) = core_fonts::lookup(&family, &style) else {
            return Err(PdfError::UndefinedFont {
                family,
                style,
            });
        };
        Ok(self.insert(Font {
            key,
            underline_position: -100,
            underline_thickness: 50,
            kind: FontKind::Core { name, widths },
        }))
    }

    fn insert(&mut self, font: Font) -> usize {
        let idx = self.fonts.len();
        self.index.insert(font.key.clone(), idx);
        self.fonts.push(font);
        idx
    }

    fn prepare_key(&self, family: &str, style: &str) -> Option<String> {
        let family = normalize_family(family);
        let style = normalize_style(style);
        let key = format!("{family}{style}");
        if self.index.contains_key(&key) {
            None
        } else {
            Some(key)
        }
    }

    /// Register a Unicode TrueType font for CID-keyed embedding.
    pub(crate) fn add_unicode_font(
        &mut self,
        family: &str,
        style: &str,
        path: &Path,
        cache: Option<&dyn FontMetricsCache>,
    ) -> Result<()> {
        let Some(key) = self.prepare_key(family, style) else {
            return Ok(());
        };
        let ttf_data = fs::read(path)
            .map_err(|_| PdfError::FontFileNotFound(path.display().to_string()))?;
        let file_len = ttf_data.len() as u64;

        let metrics = match cache.and_then(|c| c.get(&key, file_len)) {
            Some(m) => m,
            None => {
                let face = Face::parse(&ttf_data, 0).map_err(|e| {
                    PdfError::FontFileCorrupt(format!("{}: {e}", path.display()))
                })?;
                let m = TtfMetrics::from_face(&face, &key);
                if let Some(c) = cache {
                    c.put(&key, file_len, &m);
                }
                m
            }
        };

        self.insert(Font {
            key,
            underline_position: metrics.underline_position,
            underline_thickness: metrics.underline_thickness,
            kind: FontKind::Unicode {
                metrics,
                ttf_data,
                used: BTreeSet::new(),
            },
        });
        Ok(())
    }

    /// Register a single-byte WinAnsi TrueType font. The whole program is
    /// embedded; widths come from the face.
    pub(crate) fn add_truetype_font(
        &mut self,
        family: &str,
        style: &str,
        path: &Path,
    ) -> Result<()> {
        let Some(key) = self.prepare_key(family, style) else {
            return Ok(());
        };
        let ttf_data = fs::read(path)
            .map_err(|_| PdfError::FontFileNotFound(path.display().to_string()))?;
        let face = Face::parse(&ttf_data, 0)
            .map_err(|e| PdfError::FontFileCorrupt(format!("{}: {e}", path.display())))?;
        let metrics = TtfMetrics::from_face(&face, &key);

        let mut widths = Box::new([metrics.missing_width; 256]);
        for b in 0u16..=255 {
            if let Some(&w) = metrics.char_widths.get(&byte_to_unicode(b as u8)) {
                widths[b as usize] = w;
            }
        }

        let length1 = ttf_data.len();
        let program = EmbeddedProgram {
            data: crate::raster::deflate(&ttf_data)?,
            length1,
            length2: None,
            length3: None,
        };
        let descriptor = descriptor_pairs(&metrics);

        self.insert(Font {
            key,
            underline_position: metrics.underline_position,
            underline_thickness: metrics.underline_thickness,
            kind: FontKind::Byte {
                name: metrics.postscript_name,
                subtype: ByteFontSubtype::TrueType,
                widths,
                descriptor,
                encoding_diff: None,
                program: Some(program),
            },
        });
        Ok(())
    }

    /// Register a font from a caller-supplied definition (Type1 programs,
    /// or metric-only fonts without embedding).
    pub(crate) fn add_font_def(&mut self, family: &str, style: &str, def: FontDef) -> Result<()> {
        let Some(key) = self.prepare_key(family, style) else {
            return Ok(());
        };
        let program = match &def.font_file {
            Some(path) => Some(load_program(path, def.subtype)?),
            None => None,
        };
        self.insert(Font {
            key,
            underline_position: def.underline_position,
            underline_thickness: def.underline_thickness,
            kind: FontKind::Byte {
                name: def.name,
                subtype: def.subtype,
                widths: Box::new(def.widths),
                descriptor: def.descriptor,
                encoding_diff: def.encoding_diff,
                program,
            },
        });
        Ok(())
    }

    /// Note codepoints painted with a Unicode font.
    pub(crate) fn record_text(&mut self, idx: usize, text: &str) {
        if let FontKind::Unicode { used, .. } = &mut self.fonts[idx].kind {
            used.extend(text.chars().map(|c| c as u32));
        }
    }
}

pub(crate) fn descriptor_pairs(m: &TtfMetrics) -> Vec<(String, String)> {
    vec![
        ("Ascent".into(), m.ascent.to_string()),
        ("Descent".into(), m.descent.to_string()),
        ("CapHeight".into(), m.cap_height.to_string()),
        ("Flags".into(), m.flags.to_string()),
        (
            "FontBBox".into(),
            format!("[{} {} {} {}]", m.bbox[0], m.bbox[1], m.bbox[2], m.bbox[3]),
        ),
        ("ItalicAngle".into(), format!("{}", m.italic_angle)),
        ("StemV".into(), m.stem_v.to_string()),
        ("MissingWidth".into(), m.missing_width.to_string()),
    ]
}

/// Read a font program for embedding. PFB containers are unwrapped into
/// their clear, binary and trailing segments so the stream can declare
/// /Length1-3.
fn load_program(path: &Path, subtype: ByteFontSubtype) -> Result<EmbeddedProgram> {
    let data =
        fs::read(path).map_err(|_| PdfError::FontFileNotFound(path.display().to_string()))?;
    let (raw, length1, length2, length3) = match subtype {
        ByteFontSubtype::TrueType => {
            let len = data.len();
            (data, len, None, None)
        }
        ByteFontSubtype::Type1 => {
            if data.first() == Some(&0x80) {
                let mut segments = Vec::new();
                let mut lens = Vec::new();
                let mut pos = 0;
                while pos + 6 <= data.len() && data[pos] == 0x80 && data[pos + 1] != 3 {
                    let len = u32::from_le_bytes([
                        data[pos + 2],
                        data[pos + 3],
                        data[pos + 4],
                        data[pos + 5],
                    ]) as usize;
                    let start = pos + 6;
                    if start + len > data.len() {
                        return Err(PdfError::FontFileCorrupt(format!(
                            "{}: truncated PFB segment",
                            path.display()
                        )));
                    }
                    segments.extend_from_slice(&data[start..start + len]);
                    lens.push(len);
                    pos = start + len;
                }
                if lens.len() < 2 {
                    return Err(PdfError::FontFileCorrupt(format!(
                        "{}: PFB without binary segment",
                        path.display()
                    )));
                }
                let l3 = lens.get(2).copied().unwrap_or(0);
                (segments, lens[0], Some(lens[1]), Some(l3))
            } else {
                // Raw PFA or pre-stripped program: take the binary portion
                // boundary at the eexec marker when present.
                let l1 = find_subsequence(&data, b"eexec")
                    .map(|p| p + 6)
                    .unwrap_or(data.len());
                let len = data.len();
                (data, l1, Some(len - l1), Some(0))
            }
        }
    };
    Ok(EmbeddedProgram {
        data: crate::raster::deflate(&raw)?,
        length1,
        length2,
        length3,
    })
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winansi_mapping_round_trips() {
        assert_eq!(char_to_winansi('A'), Some(0x41));
        assert_eq!(char_to_winansi('é'), Some(0xE9));
        assert_eq!(char_to_winansi('€'), Some(0x80));
        assert_eq!(char_to_winansi('\u{2014}'), Some(0x97));
        assert_eq!(char_to_winansi('中'), None);
        for b in 0u16..=255 {
            let cp = byte_to_unicode(b as u8);
            if let Some(c) = char::from_u32(cp) {
                assert_eq!(char_to_winansi(c), Some(b as u8), "byte {b:#x}");
            }
        }
    }

    #[test]
    fn encode_substitutes_question_mark() {
        assert_eq!(encode_winansi("a中b"), vec![b'a', b'?', b'b']);
    }

    #[test]
    fn core_font_resolution_and_aliases() {
        let mut reg = FontRegistry::new();
        let a = reg.resolve("Helvetica", "b").unwrap();
        let b = reg.resolve("arial", "B").unwrap();
        assert_eq!(a, b);
        assert_eq!(reg.font(a).key, "helveticaB");

        let s = reg.resolve("Symbol", "BI").unwrap();
        assert_eq!(reg.font(s).key, "symbol");

        let err = reg.resolve("garamond", "").unwrap_err();
        assert!(matches!(err, PdfError::UndefinedFont { .. }));
    }

    #[test]
    fn style_normalization_orders_bold_first() {
        let mut reg = FontRegistry::new();
        let a = reg.resolve("times", "IB").unwrap();
        let b = reg.resolve("times", "BI").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn core_width_measurement() {
        let mut reg = FontRegistry::new();
        let idx = reg.resolve("helvetica", "").unwrap();
        // 'A' = 667, 'W' = 944 in the builtin table.
        assert_eq!(reg.font(idx).text_width("AW"), 667 + 944);
        assert_eq!(reg.font(idx).char_width('中'), 556); // '?' fallback
    }

    #[test]
    fn metrics_cache_blob_round_trips() {
        let metrics = TtfMetrics {
            postscript_name: "Demo-Regular".to_string(),
            ascent: 800,
            descent: -200,
            cap_height: 700,
            flags: 32,
            bbox: [-50, -210, 1000, 900],
            italic_angle: -12.5,
            stem_v: 87,
            missing_width: 512,
            underline_position: -120,
            underline_thickness: 60,
            char_widths: BTreeMap::from([(65, 600), (0x4E2D, 1000)]),
            char_glyphs: BTreeMap::from([(65, 3), (0x4E2D, 77)]),
        };
        let blob = encode_cached_metrics(4242, &metrics);
        assert_eq!(decode_cached_metrics(&blob, 4242), Some(metrics.clone()));
        // Size mismatch invalidates.
        assert_eq!(decode_cached_metrics(&blob, 4243), None);
        // Truncation is tolerated.
        assert_eq!(decode_cached_metrics(&blob[..10], 4242), None);
    }

    #[test]
    fn fs_cache_survives_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = FsMetricsCache::new(tmp.path().join("deep").join("er"));
        assert!(cache.get("k", 1).is_none());
        let m = TtfMetrics {
            postscript_name: "X".to_string(),
            ascent: 1,
            descent: -1,
            cap_height: 1,
            flags: 4,
            bbox: [0; 4],
            italic_angle: 0.0,
            stem_v: 50,
            missing_width: 500,
            underline_position: -100,
            underline_thickness: 50,
            char_widths: BTreeMap::new(),
            char_glyphs: BTreeMap::new(),
        };
        cache.put("k", 1, &m);
        assert_eq!(cache.get("k", 1), Some(m));
    }
}
