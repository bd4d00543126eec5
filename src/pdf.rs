//! Object-graph serialization.
//!
//! The file is produced in one pass over an append-only buffer, recording
//! the byte offset of every object for the xref table. Object ids are
//! deterministic: 1 is the pages root and 2 the shared resource
//! dictionary, both written late but reserved up front so every page can
//! reference them; page n owns ids 3+2(n-1) and 4+2(n-1) for itself and
//! its content stream; fonts, images, Info and Catalog follow. Internal
//! link destinations rely on that arithmetic to point at page objects.

use std::collections::BTreeMap;

use chrono::Local;
use log::debug;

use crate::document::{Document, LinkTarget};
use crate::error::Result;
use crate::font::{Font, FontKind};
use crate::layout::{escape_into, utf16be};
use crate::raster::{self, ColorSpace, RasterImage};
use crate::subset;
use crate::types::{LayoutMode, ZoomMode};

struct Writer {
    buf: Vec<u8>,
    /// Byte offset of each object, indexed by object id.
    offsets: Vec<usize>,
    n: usize,
}

impl Writer {
    fn new() -> Self {
        // Ids 1 and 2 are reserved and back-patched.
        Writer {
            buf: Vec::new(),
            offsets: vec![0; 3],
            n: 2,
        }
    }

    fn put(&mut self, line: &str) {
        self.buf.extend_from_slice(line.as_bytes());
        self.buf.push(b'\n');
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.buf.push(b'\n');
    }

    fn new_obj(&mut self) -> usize {
        self.n += 1;
        self.offsets.push(self.buf.len());
        let line = format!("{} 0 obj", self.n);
        self.put(&line);
        self.n
    }

    fn open_reserved(&mut self, id: usize) {
        self.offsets[id] = self.buf.len();
        let line = format!("{id} 0 obj");
        self.put(&line);
    }

    fn put_stream(&mut self, data: &[u8]) {
        self.put("stream");
        self.put_bytes(data);
        self.put("endstream");
    }
}

/// A PDF literal string: UTF-16BE with BOM when it leaves ASCII, with the
/// delimiter escapes applied either way.
fn text_string(s: &str) -> Vec<u8> {
    let mut out = vec![b'('];
    if s.is_ascii() {
        escape_into(&mut out, s.as_bytes());
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        bytes.extend(utf16be(s));
        escape_into(&mut out, &bytes);
    }
    out.push(b')');
    out
}

fn replace_bytes(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}

/// Six-letter subset tag, distinct per font slot.
fn subset_tag(index: usize) -> String {
    let mut tag = [b'A'; 6];
    let mut i = index;
    for slot in tag.iter_mut().rev() {
        *slot = b'A' + (i % 26) as u8;
        i /= 26;
    }
    String::from_utf8_lossy(&tag).into_owned()
}

pub(crate) fn serialize(doc: &mut Document) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    w.put(&format!("%PDF-{}", doc.min_pdf_version));

    let page_count = doc.pages.len();
    debug!("serializing {page_count} pages");
    let alias = doc.alias_nb_pages.clone();
    let nb = page_count.to_string();

    // Page and content objects, two per page.
    for n in 0..page_count {
        let mut content = doc.pages[n].buffer.clone();
        if let Some(alias) = &alias {
            content = replace_bytes(&content, &utf16be(alias), &utf16be(&nb));
            content = replace_bytes(&content, alias.as_bytes(), nb.as_bytes());
        }

        let page_id = w.new_obj();
        debug_assert_eq!(page_id, 3 + 2 * n);
        w.put("<</Type /Page");
        w.put("/Parent 1 0 R");
        let (w_pt, h_pt) = doc.pages[n].size_pt;
        let (dw_pt, dh_pt) = match doc.def_orientation {
            crate::types::Orientation::Portrait => doc.def_size_pt,
            crate::types::Orientation::Landscape => (doc.def_size_pt.1, doc.def_size_pt.0),
        };
        if (w_pt - dw_pt).abs() > 0.01 || (h_pt - dh_pt).abs() > 0.01 {
            w.put(&format!("/MediaBox [0 0 {w_pt:.2} {h_pt:.2}]"));
        }
        w.put("/Resources 2 0 R");
        if !doc.pages[n].link_zones.is_empty() {
            let mut annots = Vec::from(&b"/Annots ["[..]);
            for zone in &doc.pages[n].link_zones {
                let (x, y, zw, zh) = zone.rect_pt;
                annots.extend(
                    format!(
                        "<</Type /Annot /Subtype /Link /Rect [{:.2} {:.2} {:.2} {:.2}] /Border [0 0 0] ",
                        x,
                        y,
                        x + zw,
                        y - zh
                    )
                    .bytes(),
                );
                match &zone.target {
                    LinkTarget::Uri(uri) => {
                        annots.extend_from_slice(b"/A <</S /URI /URI ");
                        annots.extend(text_string(uri));
                        annots.extend_from_slice(b">>>>");
                    }
                    LinkTarget::Internal(id) => {
                        let Some(dest) = doc.link_dests.get(id.0).copied().flatten() else {
                            annots.extend_from_slice(b">>");
                            continue;
                        };
                        let target_h = dest
                            .page
                            .checked_sub(1)
                            .and_then(|i| doc.pages.get(i))
                            .map(|p| p.size_pt.1)
                            .unwrap_or(h_pt);
                        annots.extend(
                            format!(
                                "/Dest [{} 0 R /XYZ 0 {:.2} null]>>",
                                1 + 2 * dest.page,
                                target_h - dest.y * doc.k
                            )
                            .bytes(),
                        );
                    }
                }
            }
            annots.push(b']');
            w.put_bytes(&annots);
        }
        if doc.min_pdf_version > "1.3" {
            w.put("/Group <</Type /Group /S /Transparency /CS /DeviceRGB>>");
        }
        w.put(&format!("/Contents {} 0 R>>", w.n + 1));
        w.put("endobj");

        let data = if doc.compress {
            raster::deflate(&content)?
        } else {
            content
        };
        let content_id = w.new_obj();
        debug_assert_eq!(content_id, 4 + 2 * n);
        let filter = if doc.compress {
            "/Filter /FlateDecode "
        } else {
            ""
        };
        w.put(&format!("<<{}/Length {}>>", filter, data.len()));
        w.put_stream(&data);
        w.put("endobj");
    }

    // Pages root, reserved id 1.
    w.open_reserved(1);
    w.put("<</Type /Pages");
    let mut kids = String::from("/Kids [");
    for n in 0..page_count {
        kids.push_str(&format!("{} 0 R ", 3 + 2 * n));
    }
    w.put(&format!("{kids}]"));
    w.put(&format!("/Count {page_count}"));
    let (dw_pt, dh_pt) = match doc.def_orientation {
        crate::types::Orientation::Portrait => doc.def_size_pt,
        crate::types::Orientation::Landscape => (doc.def_size_pt.1, doc.def_size_pt.0),
    };
    w.put(&format!("/MediaBox [0 0 {dw_pt:.2} {dh_pt:.2}]"));
    w.put(">>");
    w.put("endobj");

    let font_ids = put_fonts(&mut w, doc)?;
    let image_ids = put_images(&mut w, doc)?;
    debug!(
        "embedded {} fonts and {} images",
        font_ids.len(),
        image_ids.len()
    );

    // Resource dictionary, reserved id 2.
    w.open_reserved(2);
    w.put("<<");
    w.put("/ProcSet [/PDF /Text /ImageB /ImageC /ImageI]");
    w.put("/Font <<");
    for (i, id) in font_ids.iter().enumerate() {
        w.put(&format!("/F{} {} 0 R", i + 1, id));
    }
    w.put(">>");
    w.put("/XObject <<");
    for (i, id) in image_ids.iter().enumerate() {
        w.put(&format!("/I{} {} 0 R", i + 1, id));
    }
    w.put(">>");
    w.put(">>");
    w.put("endobj");

    put_info(&mut w, doc);
    put_catalog(&mut w, doc);

    // Cross-reference table and trailer.
    let xref_offset = w.buf.len();
    debug!("xref at byte {xref_offset}, {} objects", w.n);
    w.put("xref");
    w.put(&format!("0 {}", w.n + 1));
    w.put("0000000000 65535 f ");
    for id in 1..=w.n {
        w.put(&format!("{:010} 00000 n ", w.offsets[id]));
    }
    w.put("trailer");
    w.put("<<");
    w.put(&format!("/Size {}", w.n + 1));
    w.put(&format!("/Root {} 0 R", w.n));
    w.put(&format!("/Info {} 0 R", w.n - 1));
    w.put(">>");
    w.put("startxref");
    w.put(&format!("{xref_offset}"));
    w.put("%%EOF");
    Ok(w.buf)
}

/// Emit all font objects; returns the id of each font's top object, in
/// registry order.
fn put_fonts(w: &mut Writer, doc: &Document) -> Result<Vec<usize>> {
    // Encoding differences first, deduplicated.
    let mut diff_ids: Vec<Option<usize>> = vec![None; doc.fonts.len()];
    let mut seen_diffs: Vec<(String, usize)> = Vec::new();
    for (i, font) in doc.fonts.fonts().iter().enumerate() {
        let FontKind::Byte {
            encoding_diff: Some(diff),
            ..
        } = &font.kind
        else {
            continue;
        };
        if let Some((_, id)) = seen_diffs.iter().find(|(d, _)| d == diff) {
            diff_ids[i] = Some(*id);
            continue;
        }
        let id = w.new_obj();
        w.put(&format!(
            "<</Type /Encoding /BaseEncoding /WinAnsiEncoding /Differences [{diff}]>>"
        ));
        w.put("endobj");
        seen_diffs.push((diff.clone(), id));
        diff_ids[i] = Some(id);
    }

    // Font programs for single-byte fonts.
    let mut program_ids: Vec<Option<usize>> = vec![None; doc.fonts.len()];
    for (i, font) in doc.fonts.fonts().iter().enumerate() {
        let FontKind::Byte {
            program: Some(program),
            ..
        } = &font.kind
        else {
            continue;
        };
        let id = w.new_obj();
        let mut dict = format!(
            "<</Length {} /Filter /FlateDecode /Length1 {}",
            program.data.len(),
            program.length1
        );
        if let Some(l2) = program.length2 {
            dict.push_str(&format!(
                " /Length2 {} /Length3 {}",
                l2,
                program.length3.unwrap_or(0)
            ));
        }
        dict.push_str(">>");
        w.put(&dict);
        w.put_stream(&program.data);
        w.put("endobj");
        program_ids[i] = Some(id);
    }

    let mut font_ids = Vec::with_capacity(doc.fonts.len());
    for (i, font) in doc.fonts.fonts().iter().enumerate() {
        match &font.kind {
            FontKind::Core { name, .. } => {
                let id = w.new_obj();
                font_ids.push(id);
                w.put("<</Type /Font");
                w.put(&format!("/BaseFont /{name}"));
                w.put("/Subtype /Type1");
                if *name != "Symbol" && *name != "ZapfDingbats" {
                    w.put("/Encoding /WinAnsiEncoding");
                }
                w.put(">>");
                w.put("endobj");
            }
            FontKind::Byte {
                name,
                subtype,
                widths,
                descriptor,
                ..
            } => {
                let id = w.new_obj();
                font_ids.push(id);
                w.put("<</Type /Font");
                w.put(&format!("/BaseFont /{name}"));
                w.put(&format!("/Subtype /{}", subtype.pdf_name()));
                w.put("/FirstChar 32 /LastChar 255");
                w.put(&format!("/Widths {} 0 R", id + 1));
                w.put(&format!("/FontDescriptor {} 0 R", id + 2));
                match diff_ids[i] {
                    Some(diff_id) => w.put(&format!("/Encoding {diff_id} 0 R")),
                    None => w.put("/Encoding /WinAnsiEncoding"),
                }
                w.put(">>");
                w.put("endobj");

                w.new_obj();
                let list: Vec<String> =
                    widths[32..=255].iter().map(|v| v.to_string()).collect();
                w.put(&format!("[{}]", list.join(" ")));
                w.put("endobj");

                w.new_obj();
                let mut dict = format!("<</Type /FontDescriptor /FontName /{name}");
                for (key, value) in descriptor {
                    dict.push_str(&format!(" /{key} {value}"));
                }
                if let Some(file_id) = program_ids[i] {
                    let suffix = match subtype {
                        crate::font::ByteFontSubtype::Type1 => "",
                        crate::font::ByteFontSubtype::TrueType => "2",
                    };
                    dict.push_str(&format!(" /FontFile{suffix} {file_id} 0 R"));
                }
                dict.push_str(">>");
                w.put(&dict);
                w.put("endobj");
            }
            FontKind::Unicode { .. } => {
                font_ids.push(put_unicode_font(w, font, i)?);
            }
        }
    }
    Ok(font_ids)
}

/// The seven-object chain of a CID-keyed subset font. Returns the Type0
/// object id.
fn put_unicode_font(w: &mut Writer, font: &Font, slot: usize) -> Result<usize> {
    let FontKind::Unicode {
        metrics,
        ttf_data,
        used,
    } = &font.kind
    else {
        unreachable!();
    };

    let wanted: BTreeMap<u32, u16> = used
        .iter()
        .filter_map(|&cp| metrics.char_glyphs.get(&cp).map(|&g| (cp, g)))
        .collect();
    let subset = subset::subset(ttf_data, &wanted)?;
    let max_cid = used.iter().max().copied().unwrap_or(0).min(0xFFFF);
    let widths =
        subset::encode_cid_widths(&metrics.char_widths, max_cid, used, metrics.missing_width);

    let base_name = format!(
        "{}+{}",
        subset_tag(slot),
        metrics.postscript_name.replace(' ', "")
    );

    // Type0 root.
    let type0_id = w.new_obj();
    w.put("<</Type /Font /Subtype /Type0");
    w.put(&format!("/BaseFont /{base_name}"));
    w.put("/Encoding /Identity-H");
    w.put(&format!("/DescendantFonts [{} 0 R]", type0_id + 1));
    w.put(&format!("/ToUnicode {} 0 R", type0_id + 2));
    w.put(">>");
    w.put("endobj");

    // CIDFontType2 descendant.
    w.new_obj();
    w.put("<</Type /Font /Subtype /CIDFontType2");
    w.put(&format!("/BaseFont /{base_name}"));
    w.put(&format!("/CIDSystemInfo {} 0 R", type0_id + 3));
    w.put(&format!("/FontDescriptor {} 0 R", type0_id + 4));
    w.put(&format!("/DW {}", metrics.missing_width));
    w.put(&widths);
    w.put(&format!("/CIDToGIDMap {} 0 R", type0_id + 5));
    w.put(">>");
    w.put("endobj");

    // Identity ToUnicode CMap: the CID is the codepoint.
    w.new_obj();
    let to_unicode = b"/CIDInit /ProcSet findresource begin\n\
12 dict begin\n\
begincmap\n\
/CIDSystemInfo\n\
<</Registry (Adobe)\n\
/Ordering (UCS)\n\
/Supplement 0\n\
>> def\n\
/CMapName /Adobe-Identity-UCS def\n\
/CMapType 2 def\n\
1 begincodespacerange\n\
<0000> <FFFF>\n\
endcodespacerange\n\
1 beginbfrange\n\
<0000> <FFFF> <0000>\n\
endbfrange\n\
endcmap\n\
CMapName currentdict /CMap defineresource pop\n\
end\n\
end";
    w.put(&format!("<</Length {}>>", to_unicode.len()));
    w.put_stream(to_unicode);
    w.put("endobj");

    // CIDSystemInfo.
    w.new_obj();
    w.put("<</Registry (Adobe)");
    w.put("/Ordering (UCS)");
    w.put("/Supplement 0");
    w.put(">>");
    w.put("endobj");

    // FontDescriptor. A subset font is symbolic and not non-symbolic.
    w.new_obj();
    let mut dict = format!("<</Type /FontDescriptor /FontName /{base_name}");
    for (key, value) in crate::font::descriptor_pairs(metrics) {
        if key == "Flags" {
            let flags = (metrics.flags | 4) & !32;
            dict.push_str(&format!(" /Flags {flags}"));
        } else {
            dict.push_str(&format!(" /{key} {value}"));
        }
    }
    dict.push_str(&format!(" /FontFile2 {} 0 R", type0_id + 6));
    dict.push_str(">>");
    w.put(&dict);
    w.put("endobj");

    // CIDToGIDMap: 64K two-byte entries.
    let mut cid_to_gid = vec![0u8; 256 * 256 * 2];
    for (&code, &gid) in &subset.glyph_map {
        if code <= 0xFFFF {
            let at = code as usize * 2;
            cid_to_gid[at] = (gid >> 8) as u8;
            cid_to_gid[at + 1] = (gid & 0xFF) as u8;
        }
    }
    let cid_to_gid = raster::deflate(&cid_to_gid)?;
    w.new_obj();
    w.put(&format!("<</Length {}", cid_to_gid.len()));
    w.put("/Filter /FlateDecode");
    w.put(">>");
    w.put_stream(&cid_to_gid);
    w.put("endobj");

    // The subset font program.
    let length1 = subset.data.len();
    let stream = raster::deflate(&subset.data)?;
    w.new_obj();
    w.put(&format!("<</Length {}", stream.len()));
    w.put("/Filter /FlateDecode");
    w.put(&format!("/Length1 {length1}"));
    w.put(">>");
    w.put_stream(&stream);
    w.put("endobj");

    Ok(type0_id)
}

fn put_images(w: &mut Writer, doc: &Document) -> Result<Vec<usize>> {
    let mut ids = Vec::with_capacity(doc.images.len());
    for image in &doc.images {
        ids.push(put_image(w, image, doc.compress)?);
    }
    Ok(ids)
}

fn put_image(w: &mut Writer, image: &RasterImage, compress: bool) -> Result<usize> {
    let id = w.new_obj();
    w.put("<</Type /XObject");
    w.put("/Subtype /Image");
    w.put(&format!("/Width {}", image.width));
    w.put(&format!("/Height {}", image.height));
    match image.color_space {
        ColorSpace::Indexed => {
            w.put(&format!(
                "/ColorSpace [/Indexed /DeviceRGB {} {} 0 R]",
                (image.palette.len() / 3).saturating_sub(1),
                id + 1
            ));
        }
        cs => {
            let name = match cs {
                ColorSpace::DeviceGray => "DeviceGray",
                ColorSpace::DeviceRgb => "DeviceRGB",
                ColorSpace::DeviceCmyk => "DeviceCMYK",
                ColorSpace::Indexed => unreachable!(),
            };
            w.put(&format!("/ColorSpace /{name}"));
            if cs == ColorSpace::DeviceCmyk {
                // Adobe-style JPEG stores inverted CMYK.
                w.put("/Decode [1 0 1 0 1 0 1 0]");
            }
        }
    }
    w.put(&format!("/BitsPerComponent {}", image.bits_per_component));
    w.put(&format!("/Filter /{}", image.filter));
    if let Some(dp) = &image.decode_parms {
        w.put(&format!("/DecodeParms <<{dp}>>"));
    }
    if !image.transparency.is_empty() {
        let mut mask = String::from("/Mask [");
        for &t in &image.transparency {
            mask.push_str(&format!("{t} {t} "));
        }
        mask.push(']');
        w.put(&mask);
    }
    if image.soft_mask.is_some() {
        w.put(&format!("/SMask {} 0 R", id + 1));
    }
    w.put(&format!("/Length {}>>", image.data.len()));
    w.put_stream(&image.data);
    w.put("endobj");

    if let Some(soft_mask) = &image.soft_mask {
        let mask_image = RasterImage {
            width: image.width,
            height: image.height,
            color_space: ColorSpace::DeviceGray,
            bits_per_component: 8,
            filter: "FlateDecode",
            decode_parms: Some(format!(
                "/Predictor 15 /Colors 1 /BitsPerComponent 8 /Columns {}",
                image.width
            )),
            palette: Vec::new(),
            transparency: Vec::new(),
            soft_mask: None,
            data: soft_mask.clone(),
        };
        put_image(w, &mask_image, compress)?;
    }

    if image.color_space == ColorSpace::Indexed {
        let (filter, pal) = if compress {
            ("/Filter /FlateDecode ", raster::deflate(&image.palette)?)
        } else {
            ("", image.palette.clone())
        };
        w.new_obj();
        w.put(&format!("<<{}/Length {}>>", filter, pal.len()));
        w.put_stream(&pal);
        w.put("endobj");
    }
    Ok(id)
}

fn put_info(w: &mut Writer, doc: &Document) {
    w.new_obj();
    w.put("<<");
    fn put_entry(w: &mut Writer, key: &str, value: &str) {
        let mut line = format!("/{key} ").into_bytes();
        line.extend(text_string(value));
        w.put_bytes(&line);
    }
    put_entry(w, "Producer", &format!("platen {}", env!("CARGO_PKG_VERSION")));
    let m = &doc.metadata;
    if let Some(title) = &m.title {
        put_entry(w, "Title", title);
    }
    if let Some(subject) = &m.subject {
        put_entry(w, "Subject", subject);
    }
    if let Some(author) = &m.author {
        put_entry(w, "Author", author);
    }
    if let Some(keywords) = &m.keywords {
        put_entry(w, "Keywords", keywords);
    }
    if let Some(creator) = &m.creator {
        put_entry(w, "Creator", creator);
    }
    let date = m.creation_date.unwrap_or_else(Local::now);
    put_entry(w, "CreationDate", &format!("D:{}", date.format("%Y%m%d%H%M%S")));
    w.put(">>");
    w.put("endobj");
}

fn put_catalog(w: &mut Writer, doc: &Document) {
    w.new_obj();
    w.put("<<");
    w.put("/Type /Catalog");
    w.put("/Pages 1 0 R");
    match doc.zoom {
        ZoomMode::FullPage => w.put("/OpenAction [3 0 R /Fit]"),
        ZoomMode::FullWidth => w.put("/OpenAction [3 0 R /FitH null]"),
        ZoomMode::Real => w.put("/OpenAction [3 0 R /XYZ null null 1]"),
        ZoomMode::Percent(z) => {
            w.put(&format!("/OpenAction [3 0 R /XYZ null null {:.2}]", z / 100.0))
        }
        ZoomMode::Default => {}
    }
    match doc.layout {
        LayoutMode::Single => w.put("/PageLayout /SinglePage"),
        LayoutMode::Continuous => w.put("/PageLayout /OneColumn"),
        LayoutMode::TwoColumn => w.put("/PageLayout /TwoColumnLeft"),
        LayoutMode::Default => {}
    }
    w.put(">>");
    w.put("endobj");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::layout::CellOptions;

    /// Two empty glyphs, 'A' mapped to glyph 1. Just enough to parse.
    fn tiny_ttf() -> Vec<u8> {
        fn u16b(out: &mut Vec<u8>, v: u16) {
            out.extend_from_slice(&v.to_be_bytes());
        }
        fn u32b(out: &mut Vec<u8>, v: u32) {
            out.extend_from_slice(&v.to_be_bytes());
        }

        let mut head = Vec::new();
        u32b(&mut head, 0x0001_0000);
        u32b(&mut head, 0x0001_0000);
        u32b(&mut head, 0);
        u32b(&mut head, 0x5F0F_3CF5);
        u16b(&mut head, 0);
        u16b(&mut head, 1000); // unitsPerEm
        head.extend_from_slice(&[0u8; 16]); // created, modified
        for v in [0i16, -200, 600, 800] {
            head.extend_from_slice(&v.to_be_bytes()); // bbox
        }
        u16b(&mut head, 0); // macStyle
        u16b(&mut head, 8); // lowestRecPPEM
        for v in [0i16, 0, 0] {
            // direction hint, indexToLocFormat, glyphDataFormat
            head.extend_from_slice(&v.to_be_bytes());
        }

        let mut hhea = Vec::new();
        u32b(&mut hhea, 0x0001_0000);
        for v in [800i16, -200, 0, 600, 0, 0, 600, 1, 0, 0, 0, 0, 0, 0, 0] {
            hhea.extend_from_slice(&v.to_be_bytes());
        }
        u16b(&mut hhea, 2); // numberOfHMetrics

        let mut maxp = Vec::new();
        u32b(&mut maxp, 0x0001_0000);
        u16b(&mut maxp, 2); // numGlyphs
        maxp.extend_from_slice(&[0u8; 26]);

        let mut hmtx = Vec::new();
        for (adv, lsb) in [(500u16, 0u16), (600, 0)] {
            u16b(&mut hmtx, adv);
            u16b(&mut hmtx, lsb);
        }

        // Format 4 subtable, one live segment 0x41..0x41 plus terminator.
        let mut sub = Vec::new();
        for v in [4u16, 32, 0, 4, 4, 1, 0] {
            u16b(&mut sub, v);
        }
        u16b(&mut sub, 0x41);
        u16b(&mut sub, 0xFFFF);
        u16b(&mut sub, 0);
        u16b(&mut sub, 0x41);
        u16b(&mut sub, 0xFFFF);
        sub.extend_from_slice(&(1i16 - 0x41).to_be_bytes());
        sub.extend_from_slice(&1i16.to_be_bytes());
        u16b(&mut sub, 0);
        u16b(&mut sub, 0);
        let mut cmap = Vec::new();
        for v in [0u16, 1, 3, 1] {
            u16b(&mut cmap, v);
        }
        u32b(&mut cmap, 12);
        cmap.extend_from_slice(&sub);

        let tables: Vec<([u8; 4], Vec<u8>)> = vec![
            (*b"cmap", cmap),
            (*b"glyf", Vec::new()),
            (*b"head", head),
            (*b"hhea", hhea),
            (*b"hmtx", hmtx),
            (*b"loca", vec![0u8; 6]),
            (*b"maxp", maxp),
        ];
        let base = 12 + 16 * tables.len();
        let mut records = Vec::new();
        let mut body = Vec::new();
        for (tag, data) in &tables {
            records.extend_from_slice(tag);
            u32b(&mut records, 0);
            u32b(&mut records, (base + body.len()) as u32);
            u32b(&mut records, data.len() as u32);
            body.extend_from_slice(data);
            while body.len() % 4 != 0 {
                body.push(0);
            }
        }
        let mut out = Vec::new();
        u32b(&mut out, 0x0001_0000);
        u16b(&mut out, tables.len() as u16);
        for v in [0u16, 0, 0] {
            u16b(&mut out, v);
        }
        out.extend_from_slice(&records);
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn registered_but_undrawn_unicode_font_still_serializes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.ttf");
        std::fs::write(&path, tiny_ttf()).unwrap();

        let mut doc = Document::default();
        doc.set_compression(false);
        doc.add_unicode_font("tiny", "", &path).unwrap();
        doc.add_page(None, None).unwrap();
        doc.set_font("helvetica", "", 12.0).unwrap();
        doc.cell(0.0, 10.0, "plain", CellOptions::default()).unwrap();

        let bytes = doc.output().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Subtype /CIDFontType2"));
        assert!(text.contains("/W [ ]"));
    }

    #[test]
    fn truncated_palette_serializes_without_underflow() {
        let image = RasterImage {
            width: 1,
            height: 1,
            color_space: ColorSpace::Indexed,
            bits_per_component: 8,
            filter: "FlateDecode",
            decode_parms: None,
            palette: vec![0u8; 2],
            transparency: Vec::new(),
            soft_mask: None,
            data: raster::deflate(&[0u8]).unwrap(),
        };
        let mut w = Writer::new();
        put_image(&mut w, &image, false).unwrap();
        let text = String::from_utf8_lossy(&w.buf);
        assert!(text.contains("/ColorSpace [/Indexed /DeviceRGB 0 "));
    }

    #[test]
    fn link_set_before_first_page_lands_on_page_one() {
        let mut doc = Document::default();
        doc.set_compression(false);
        let target = doc.add_link();
        doc.set_link(target, 0.0, 0);
        doc.add_page(None, None).unwrap();
        doc.link(10.0, 10.0, 50.0, 10.0, target);
        doc.add_page(None, None).unwrap();

        let bytes = doc.output().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Dest [3 0 R /XYZ 0 "));
    }

    #[test]
    fn subset_tags_are_distinct() {
        assert_eq!(subset_tag(0), "AAAAAA");
        assert_eq!(subset_tag(1), "AAAAAB");
        assert_eq!(subset_tag(27), "AAAABB");
    }

    #[test]
    fn text_string_switches_to_utf16() {
        assert_eq!(text_string("plain"), b"(plain)".to_vec());
        let s = text_string("é");
        assert_eq!(&s[..3], &[b'(', 0xFE, 0xFF]);
    }

    #[test]
    fn replace_bytes_all_occurrences() {
        assert_eq!(replace_bytes(b"a{nb}b{nb}", b"{nb}", b"7"), b"a7b7".to_vec());
        assert_eq!(replace_bytes(b"none", b"{nb}", b"7"), b"none".to_vec());
    }

    fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
        (0..haystack.len())
            .filter(|&i| haystack[i..].starts_with(needle))
            .collect()
    }

    #[test]
    fn xref_offsets_are_byte_exact() {
        let mut doc = Document::default();
        doc.set_compression(false);
        doc.add_page(None, None).unwrap();
        doc.set_font("helvetica", "", 12.0).unwrap();
        doc.cell(0.0, 10.0, "offset check", CellOptions::default())
            .unwrap();
        doc.add_page(None, None).unwrap();
        doc.cell(0.0, 10.0, "second page", CellOptions::default())
            .unwrap();
        let bytes = doc.output().unwrap();

        // Every "N 0 obj" header must sit exactly at the offset the xref
        // table declares for object N.
        let xref_at = find_all(&bytes, b"\nxref\n").pop().unwrap() + 1;
        let table = std::str::from_utf8(&bytes[xref_at..]).unwrap();
        let mut lines = table.lines();
        assert_eq!(lines.next(), Some("xref"));
        let count: usize = lines
            .next()
            .unwrap()
            .split_whitespace()
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(lines.next(), Some("0000000000 65535 f "));
        for id in 1..count {
            let entry = lines.next().unwrap();
            let offset: usize = entry.split_whitespace().next().unwrap().parse().unwrap();
            let header = format!("{id} 0 obj\n");
            assert!(
                bytes[offset..].starts_with(header.as_bytes()),
                "object {id} not at {offset}"
            );
        }

        // startxref points at the table.
        let sx = find_all(&bytes, b"startxref\n").pop().unwrap();
        let declared: usize = std::str::from_utf8(&bytes[sx + 10..])
            .unwrap()
            .lines()
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(declared, xref_at);
    }

    #[test]
    fn object_numbering_follows_page_arithmetic() {
        let mut doc = Document::default();
        doc.set_compression(false);
        for _ in 0..3 {
            doc.add_page(None, None).unwrap();
        }
        let bytes = doc.output().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        for n in 0..3usize {
            assert!(text.contains(&format!("\n{} 0 obj\n<</Type /Page\n", 3 + 2 * n)));
            assert!(text.contains(&format!("/Contents {} 0 R>>", 4 + 2 * n)));
        }
        assert!(text.contains("/Kids [3 0 R 5 0 R 7 0 R ]"));
    }

    #[test]
    fn parses_with_lopdf_and_counts_pages() {
        let mut doc = Document::default();
        doc.add_page(None, None).unwrap();
        doc.set_font("times", "B", 14.0).unwrap();
        doc.cell(0.0, 10.0, "round trip", CellOptions::default())
            .unwrap();
        doc.add_page(None, None).unwrap();
        let bytes = doc.output().unwrap();

        let parsed = lopdf::Document::load_mem(&bytes).expect("reparse");
        assert_eq!(parsed.get_pages().len(), 2);
        assert_eq!(parsed.version, "1.3");
    }

    #[test]
    fn alias_replacement_in_content() {
        let mut doc = Document::default();
        doc.set_compression(false);
        doc.alias_nb_pages("{nb}");
        doc.add_page(None, None).unwrap();
        doc.set_font("helvetica", "", 12.0).unwrap();
        doc.cell(0.0, 10.0, "Page 1 of {nb}", CellOptions::default())
            .unwrap();
        doc.add_page(None, None).unwrap();
        let bytes = doc.output().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("Page 1 of 2"));
        assert!(!text.contains("{nb}"));
    }

    #[test]
    fn catalog_carries_display_modes() {
        let mut doc = Document::default();
        doc.set_display_mode(
            crate::types::ZoomMode::FullPage,
            crate::types::LayoutMode::Continuous,
        );
        let bytes = doc.output().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/OpenAction [3 0 R /Fit]"));
        assert!(text.contains("/PageLayout /OneColumn"));
    }

    #[test]
    fn info_dictionary_fields() {
        let mut doc = Document::default();
        doc.set_title("A Title");
        doc.set_author("An Author");
        let bytes = doc.output().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Title (A Title)"));
        assert!(text.contains("/Author (An Author)"));
        assert!(text.contains("/Producer (platen "));
        assert!(text.contains("/CreationDate (D:"));
    }

    #[test]
    fn trailer_points_at_last_two_objects() {
        let mut doc = Document::default();
        let bytes = doc.output().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        let size: usize = text
            .lines()
            .find(|l| l.starts_with("/Size "))
            .unwrap()
            .split_whitespace()
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        let n = size - 1;
        assert!(text.contains(&format!("/Root {n} 0 R")));
        assert!(text.contains(&format!("/Info {} 0 R", n - 1)));
    }
}
