//! TrueType subsetting and CID width-array encoding for embedded Unicode
//! fonts.
//!
//! The subsetter rebuilds a standalone font containing only the glyphs a
//! document actually painted, renumbered contiguously from 0. Composite
//! glyphs pull their component glyphs in and get their references
//! rewritten. The caller supplies the codepoint-to-glyph mapping it
//! resolved while measuring text, so no cmap inversion is needed here; a
//! fresh format 4 cmap is emitted for the renumbered ids.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{PdfError, Result};

/// A rebuilt font program plus the codepoint mapping into it.
pub(crate) struct SubsetFont {
    pub(crate) data: Vec<u8>,
    /// Unicode codepoint to glyph id in the rebuilt font.
    pub(crate) glyph_map: BTreeMap<u32, u16>,
}

/// Rebuild `ttf` around the glyphs in `used` (codepoint to original glyph
/// id). Glyph 0 is always retained.
pub(crate) fn subset(ttf: &[u8], used: &BTreeMap<u32, u16>) -> Result<SubsetFont> {
    let glyf = require_table(ttf, b"glyf")?;
    let loca = require_table(ttf, b"loca")?;
    let head = require_table(ttf, b"head")?;
    let hhea = require_table(ttf, b"hhea")?;
    let hmtx = require_table(ttf, b"hmtx")?;
    let maxp = require_table(ttf, b"maxp")?;
    if head.len() < 54 || hhea.len() < 36 || maxp.len() < 6 {
        return Err(PdfError::FontFileCorrupt("short head/hhea/maxp".into()));
    }

    let num_glyphs = read_u16(maxp, 4);
    let loca_format = read_i16(head, 50);
    let loca_offsets = parse_loca(loca, loca_format, num_glyphs);

    let mut needed: BTreeSet<u16> = BTreeSet::new();
    needed.insert(0);
    needed.extend(used.values().copied());
    for gid in needed.clone() {
        collect_component_glyphs(glyf, &loca_offsets, gid, &mut needed);
    }

    let mut remap: HashMap<u16, u16> = HashMap::new();
    for (new_gid, &old_gid) in needed.iter().enumerate() {
        remap.insert(old_gid, new_gid as u16);
    }
    let new_count = needed.len() as u16;

    let (new_glyf, new_offsets) = rebuild_glyf(glyf, &loca_offsets, &needed, &remap);
    let new_loca_format: i16 = if new_glyf.len() > 0x1FFFE { 1 } else { 0 };

    let glyph_map: BTreeMap<u32, u16> = used
        .iter()
        .filter_map(|(&code, old)| remap.get(old).map(|&new| (code, new)))
        .collect();
    let cmap_entries: Vec<(u16, u16)> = glyph_map
        .iter()
        .filter(|(&code, _)| code <= 0xFFFF)
        .map(|(&code, &gid)| (code as u16, gid))
        .collect();

    let num_h_metrics = read_u16(hhea, 34) as usize;

    let mut head_out = head.to_vec();
    write_u32(&mut head_out, 8, 0);
    write_i16(&mut head_out, 50, new_loca_format);

    // Every glyph gets a full metric record, so numberOfHMetrics becomes
    // the glyph count.
    let mut hhea_out = hhea.to_vec();
    write_u16(&mut hhea_out, 34, new_count);

    let mut tables: Vec<([u8; 4], Vec<u8>)> = vec![
        (*b"cmap", build_cmap_format4(&cmap_entries)),
        (*b"glyf", new_glyf),
        (*b"head", head_out),
        (*b"hhea", hhea_out),
        (*b"hmtx", rebuild_hmtx(hmtx, &needed, num_h_metrics)),
        (*b"loca", build_loca(&new_offsets, new_loca_format)),
        (*b"maxp", build_maxp(new_count)),
        (*b"post", build_post_format3()),
    ];
    for tag in [b"cvt ", b"fpgm", b"prep", b"name", b"OS/2"] {
        if let Some(data) = find_table(ttf, tag) {
            tables.push((*tag, data.to_vec()));
        }
    }
    tables.sort_by_key(|(tag, _)| u32::from_be_bytes(*tag));

    Ok(SubsetFont {
        data: assemble(tables),
        glyph_map,
    })
}

fn require_table<'a>(ttf: &'a [u8], tag: &[u8; 4]) -> Result<&'a [u8]> {
    find_table(ttf, tag).ok_or_else(|| {
        PdfError::FontFileCorrupt(format!(
            "missing {} table",
            String::from_utf8_lossy(tag).trim_end()
        ))
    })
}

fn find_table<'a>(data: &'a [u8], tag: &[u8; 4]) -> Option<&'a [u8]> {
    if data.len() < 12 {
        return None;
    }
    let num_tables = read_u16(data, 4) as usize;
    for i in 0..num_tables {
        let rec = 12 + i * 16;
        if rec + 16 > data.len() {
            break;
        }
        if &data[rec..rec + 4] == tag {
            let offset = read_u32(data, rec + 8) as usize;
            let length = read_u32(data, rec + 12) as usize;
            if offset + length <= data.len() {
                return Some(&data[offset..offset + length]);
            }
        }
    }
    None
}

fn parse_loca(data: &[u8], format: i16, num_glyphs: u16) -> Vec<u32> {
    let count = num_glyphs as usize + 1;
    let mut offsets = Vec::with_capacity(count);
    for i in 0..count {
        let value = if format == 0 {
            let pos = i * 2;
            if pos + 2 > data.len() {
                offsets.last().copied().unwrap_or(0)
            } else {
                read_u16(data, pos) as u32 * 2
            }
        } else {
            let pos = i * 4;
            if pos + 4 > data.len() {
                offsets.last().copied().unwrap_or(0)
            } else {
                read_u32(data, pos)
            }
        };
        offsets.push(value);
    }
    offsets
}

fn collect_component_glyphs(
    glyf: &[u8],
    loca_offsets: &[u32],
    gid: u16,
    needed: &mut BTreeSet<u16>,
) {
    let idx = gid as usize;
    if idx + 1 >= loca_offsets.len() {
        return;
    }
    let start = loca_offsets[idx] as usize;
    let end = loca_offsets[idx + 1] as usize;
    if start >= end || start + 10 > glyf.len() {
        return;
    }
    if read_i16(glyf, start) >= 0 {
        return;
    }

    let mut pos = start + 10;
    loop {
        if pos + 4 > glyf.len() {
            break;
        }
        let flags = read_u16(glyf, pos);
        let component = read_u16(glyf, pos + 2);
        pos += 4;
        if needed.insert(component) {
            collect_component_glyphs(glyf, loca_offsets, component, needed);
        }
        pos += component_args_len(flags);
        if flags & 0x0020 == 0 {
            break;
        }
    }
}

/// Bytes of argument and transform data following a component record's
/// flags and glyph id.
fn component_args_len(flags: u16) -> usize {
    let args = if flags & 0x0001 != 0 { 4 } else { 2 };
    let transform = if flags & 0x0008 != 0 {
        2
    } else if flags & 0x0040 != 0 {
        4
    } else if flags & 0x0080 != 0 {
        8
    } else {
        0
    };
    args + transform
}

fn rebuild_glyf(
    glyf: &[u8],
    loca_offsets: &[u32],
    needed: &BTreeSet<u16>,
    remap: &HashMap<u16, u16>,
) -> (Vec<u8>, Vec<u32>) {
    let mut out: Vec<u8> = Vec::new();
    let mut offsets: Vec<u32> = Vec::new();

    for &old_gid in needed {
        offsets.push(out.len() as u32);
        let idx = old_gid as usize;
        if idx + 1 >= loca_offsets.len() {
            continue;
        }
        let start = loca_offsets[idx] as usize;
        let end = (loca_offsets[idx + 1] as usize).min(glyf.len());
        if start >= end {
            continue;
        }

        let mut glyph = glyf[start..end].to_vec();
        if glyph.len() >= 2 && read_i16(&glyph, 0) < 0 {
            rewrite_component_gids(&mut glyph, remap);
        }
        out.extend_from_slice(&glyph);
        while out.len() % 4 != 0 {
            out.push(0);
        }
    }
    offsets.push(out.len() as u32);
    (out, offsets)
}

fn rewrite_component_gids(glyph: &mut [u8], remap: &HashMap<u16, u16>) {
    let mut pos = 10;
    loop {
        if pos + 4 > glyph.len() {
            break;
        }
        let flags = read_u16(glyph, pos);
        let old_gid = read_u16(glyph, pos + 2);
        if let Some(&new_gid) = remap.get(&old_gid) {
            write_u16(glyph, pos + 2, new_gid);
        }
        pos += 4 + component_args_len(flags);
        if flags & 0x0020 == 0 {
            break;
        }
    }
}

fn build_loca(offsets: &[u32], format: i16) -> Vec<u8> {
    let mut data = Vec::new();
    for &offset in offsets {
        if format == 0 {
            data.extend_from_slice(&((offset / 2) as u16).to_be_bytes());
        } else {
            data.extend_from_slice(&offset.to_be_bytes());
        }
    }
    data
}

fn rebuild_hmtx(hmtx: &[u8], needed: &BTreeSet<u16>, num_h_metrics: usize) -> Vec<u8> {
    let mut data = Vec::new();
    for &old_gid in needed {
        let idx = old_gid as usize;
        if idx < num_h_metrics {
            let offset = idx * 4;
            if offset + 4 <= hmtx.len() {
                data.extend_from_slice(&hmtx[offset..offset + 4]);
            } else {
                data.extend_from_slice(&[0; 4]);
            }
        } else {
            // Tail glyphs share the last advance and carry their own lsb.
            let aw_offset = num_h_metrics.saturating_sub(1) * 4;
            let lsb_offset = num_h_metrics * 4 + (idx - num_h_metrics) * 2;
            if aw_offset + 2 <= hmtx.len() {
                data.extend_from_slice(&hmtx[aw_offset..aw_offset + 2]);
            } else {
                data.extend_from_slice(&[0; 2]);
            }
            if lsb_offset + 2 <= hmtx.len() {
                data.extend_from_slice(&hmtx[lsb_offset..lsb_offset + 2]);
            } else {
                data.extend_from_slice(&[0; 2]);
            }
        }
    }
    data
}

fn build_cmap_format4(entries: &[(u16, u16)]) -> Vec<u8> {
    let mut sorted = entries.to_vec();
    sorted.sort_by_key(|&(code, _)| code);

    // Contiguous codepoint runs become segments.
    let mut segments: Vec<(u16, u16, Vec<u16>)> = Vec::new();
    for &(code, gid) in &sorted {
        if let Some(last) = segments.last_mut() {
            if code == last.1 + 1 {
                last.1 = code;
                last.2.push(gid);
                continue;
            }
        }
        segments.push((code, code, vec![gid]));
    }
    segments.push((0xFFFF, 0xFFFF, vec![0]));

    let seg_count = segments.len() as u16;
    let seg_count_x2 = seg_count * 2;
    let entry_selector = 15 - seg_count.leading_zeros().min(15) as u16;
    let search_range = (1u16 << entry_selector) * 2;
    let range_shift = seg_count_x2.saturating_sub(search_range);

    let mut end_codes = Vec::new();
    let mut start_codes = Vec::new();
    let mut id_deltas: Vec<i16> = Vec::new();
    let mut id_range_offsets: Vec<u16> = Vec::new();
    let mut glyph_ids: Vec<u16> = Vec::new();

    for (i, (start, end, gids)) in segments.iter().enumerate() {
        start_codes.push(*start);
        end_codes.push(*end);
        if *start == 0xFFFF {
            id_deltas.push(1);
            id_range_offsets.push(0);
        } else if gids.len() == 1 {
            id_deltas.push((gids[0] as i32 - *start as i32) as i16);
            id_range_offsets.push(0);
        } else {
            id_deltas.push(0);
            let remaining = (segments.len() - i) as u16;
            id_range_offsets.push((remaining + glyph_ids.len() as u16) * 2);
            glyph_ids.extend_from_slice(gids);
        }
    }

    let subtable_len = 14 + seg_count as usize * 8 + glyph_ids.len() * 2;
    let mut sub: Vec<u8> = Vec::new();
    sub.extend_from_slice(&4u16.to_be_bytes());
    sub.extend_from_slice(&(subtable_len as u16).to_be_bytes());
    sub.extend_from_slice(&0u16.to_be_bytes());
    sub.extend_from_slice(&seg_count_x2.to_be_bytes());
    sub.extend_from_slice(&search_range.to_be_bytes());
    sub.extend_from_slice(&entry_selector.to_be_bytes());
    sub.extend_from_slice(&range_shift.to_be_bytes());
    for &c in &end_codes {
        sub.extend_from_slice(&c.to_be_bytes());
    }
    sub.extend_from_slice(&0u16.to_be_bytes());
    for &c in &start_codes {
        sub.extend_from_slice(&c.to_be_bytes());
    }
    for &d in &id_deltas {
        sub.extend_from_slice(&d.to_be_bytes());
    }
    for &r in &id_range_offsets {
        sub.extend_from_slice(&r.to_be_bytes());
    }
    for &g in &glyph_ids {
        sub.extend_from_slice(&g.to_be_bytes());
    }

    let mut cmap: Vec<u8> = Vec::new();
    cmap.extend_from_slice(&0u16.to_be_bytes());
    cmap.extend_from_slice(&1u16.to_be_bytes());
    // Windows platform, Unicode BMP encoding.
    cmap.extend_from_slice(&3u16.to_be_bytes());
    cmap.extend_from_slice(&1u16.to_be_bytes());
    cmap.extend_from_slice(&12u32.to_be_bytes());
    cmap.extend_from_slice(&sub);
    cmap
}

fn build_maxp(num_glyphs: u16) -> Vec<u8> {
    let mut data = vec![0u8; 32];
    write_u32(&mut data, 0, 0x00010000);
    write_u16(&mut data, 4, num_glyphs);
    write_u16(&mut data, 6, 256); // maxPoints
    write_u16(&mut data, 8, 64); // maxContours
    write_u16(&mut data, 10, 256); // maxCompositePoints
    write_u16(&mut data, 12, 64); // maxCompositeContours
    write_u16(&mut data, 14, 1); // maxZones
    write_u16(&mut data, 18, 64); // maxStorage
    write_u16(&mut data, 20, 64); // maxFunctionDefs
    write_u16(&mut data, 22, 64); // maxInstructionDefs
    write_u16(&mut data, 24, 64); // maxStackElements
    write_u16(&mut data, 28, 64); // maxComponentElements
    write_u16(&mut data, 30, 2); // maxComponentDepth
    data
}

fn build_post_format3() -> Vec<u8> {
    let mut data = vec![0u8; 32];
    write_u32(&mut data, 0, 0x00030000);
    data
}

fn assemble(mut tables: Vec<([u8; 4], Vec<u8>)>) -> Vec<u8> {
    let num_tables = tables.len() as u16;
    let entry_selector = 15 - num_tables.leading_zeros().min(15) as u16;
    let search_range = (1u16 << entry_selector) * 16;
    let range_shift = (num_tables * 16).saturating_sub(search_range);

    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(&0x00010000u32.to_be_bytes());
    out.extend_from_slice(&num_tables.to_be_bytes());
    out.extend_from_slice(&search_range.to_be_bytes());
    out.extend_from_slice(&entry_selector.to_be_bytes());
    out.extend_from_slice(&range_shift.to_be_bytes());

    for (_, data) in tables.iter_mut() {
        while data.len() % 4 != 0 {
            data.push(0);
        }
    }

    let mut offset = 12 + num_tables as usize * 16;
    for (tag, data) in &tables {
        out.extend_from_slice(tag);
        out.extend_from_slice(&table_checksum(data).to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        offset += data.len();
    }
    for (_, data) in &tables {
        out.extend_from_slice(data);
    }

    patch_head_checksum(&mut out);
    out
}

fn table_checksum(data: &[u8]) -> u32 {
    let mut sum: u32 = 0;
    let mut i = 0;
    while i + 4 <= data.len() {
        sum = sum.wrapping_add(read_u32(data, i));
        i += 4;
    }
    if i < data.len() {
        let mut last = [0u8; 4];
        last[..data.len() - i].copy_from_slice(&data[i..]);
        sum = sum.wrapping_add(u32::from_be_bytes(last));
    }
    sum
}

fn patch_head_checksum(out: &mut [u8]) {
    let num_tables = read_u16(out, 4) as usize;
    for i in 0..num_tables {
        let rec = 12 + i * 16;
        if &out[rec..rec + 4] != b"head" {
            continue;
        }
        let offset = read_u32(out, rec + 8) as usize;
        let length = read_u32(out, rec + 12) as usize;
        let adjustment = 0xB1B0AFBAu32.wrapping_sub(table_checksum(out));
        if offset + 12 <= out.len() {
            write_u32(out, offset + 8, adjustment);
        }
        if offset + length <= out.len() {
            let sum = table_checksum(&out[offset..offset + length]);
            write_u32(out, rec + 4, sum);
        }
        break;
    }
}

// ------------------------------------------------------- /W encoding ----

/// Encode per-codepoint advances as a CIDFont /W array.
///
/// Consecutive equal widths collapse to `start end w` ranges; mixed runs
/// become `start [ w0 w1 .. ]` lists, with adjacent ranges merged when the
/// list form is cheaper. Codepoints above 255 are only emitted when they
/// are in `subset`, matching what the embedded font program will contain.
/// A missing entry means the font has no glyph there; entries equal to
/// `default_width` are left to the /DW fallback and skipped.
pub(crate) fn encode_cid_widths(
    widths: &BTreeMap<u32, u16>,
    max_cid: u32,
    subset: &BTreeSet<u32>,
    default_width: u16,
) -> String {
    if max_cid == 0 {
        return "/W [ ]".to_string();
    }
    struct Run {
        widths: Vec<u16>,
        interval: bool,
    }
    impl Run {
        fn len(&self) -> usize {
            self.widths.len() + self.interval as usize
        }
    }

    let mut runs: BTreeMap<u32, Run> = BTreeMap::new();
    let mut run_id: u32 = 0;
    let mut prev_cid: i64 = -2;
    let mut prev_width: i64 = -1;
    let mut interval = false;

    for (&cid, &width) in widths.range(1..=max_cid) {
        if cid > 255 && !subset.contains(&cid) {
            continue;
        }
        // Leave the previous-cid trackers alone so the run breaks here.
        if width == default_width {
            continue;
        }
        let w = width as i64;
        if cid as i64 == prev_cid + 1 {
            if w == prev_width {
                let run = runs.get_mut(&run_id).unwrap();
                if width == run.widths[0] {
                    run.widths.push(width);
                } else {
                    // The previous width opened what is really a uniform
                    // pair; move it into its own run.
                    run.widths.pop();
                    run_id = prev_cid as u32;
                    runs.insert(
                        run_id,
                        Run {
                            widths: vec![prev_width as u16, width],
                            interval: false,
                        },
                    );
                }
                interval = true;
                runs.get_mut(&run_id).unwrap().interval = true;
            } else {
                if interval {
                    run_id = cid;
                    runs.insert(
                        run_id,
                        Run {
                            widths: vec![width],
                            interval: false,
                        },
                    );
                } else {
                    runs.get_mut(&run_id).unwrap().widths.push(width);
                }
                interval = false;
            }
        } else {
            run_id = cid;
            runs.insert(
                run_id,
                Run {
                    widths: vec![width],
                    interval: false,
                },
            );
            interval = false;
        }
        prev_cid = cid as i64;
        prev_width = w;
    }

    // Merge a run into its predecessor when they are contiguous and the
    // merged list form stays compact.
    let keys: Vec<u32> = runs.keys().copied().collect();
    let mut prev_key: i64 = -1;
    let mut next_key: i64 = -1;
    let mut prev_interval = false;
    for k in keys {
        let count = runs[&k].len();
        let has_interval = runs[&k].interval;
        if k as i64 == next_key && !prev_interval && (!has_interval || count < 4) {
            let mut absorbed = runs.remove(&k).unwrap();
            let target = runs.get_mut(&(prev_key as u32)).unwrap();
            target.widths.append(&mut absorbed.widths);
        } else {
            if let Some(run) = runs.get_mut(&k) {
                run.interval = false;
            }
            prev_key = k as i64;
        }
        next_key = k as i64 + count as i64;
        if has_interval {
            prev_interval = count > 3;
            next_key -= 1;
        } else {
            prev_interval = false;
        }
    }

    let mut w = String::new();
    for (start, run) in &runs {
        let uniform = run.widths.iter().all(|&x| x == run.widths[0]);
        if uniform && run.widths.len() > 1 {
            w.push_str(&format!(
                " {} {} {}",
                start,
                start + run.widths.len() as u32 - 1,
                run.widths[0]
            ));
        } else if uniform {
            w.push_str(&format!(" {} {} {}", start, start, run.widths[0]));
        } else {
            let list: Vec<String> = run.widths.iter().map(|x| x.to_string()).collect();
            w.push_str(&format!(" {} [ {} ]", start, list.join(" ")));
        }
    }
    format!("/W [{w} ]")
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

fn read_i16(data: &[u8], offset: usize) -> i16 {
    i16::from_be_bytes([data[offset], data[offset + 1]])
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn write_u16(data: &mut [u8], offset: usize, val: u16) {
    data[offset..offset + 2].copy_from_slice(&val.to_be_bytes());
}

fn write_i16(data: &mut [u8], offset: usize, val: i16) {
    data[offset..offset + 2].copy_from_slice(&val.to_be_bytes());
}

fn write_u32(data: &mut [u8], offset: usize, val: u32) {
    data[offset..offset + 4].copy_from_slice(&val.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loca_round_trip_short_and_long() {
        let offsets = vec![0u32, 100, 200, 300];
        let short = build_loca(&offsets, 0);
        assert_eq!(short.len(), 8);
        assert_eq!(read_u16(&short, 2), 50);
        let long = build_loca(&offsets, 1);
        assert_eq!(long.len(), 16);
        assert_eq!(read_u32(&long, 12), 300);
        assert_eq!(parse_loca(&long, 1, 3), offsets);
    }

    #[test]
    fn checksum_whole_words_and_tail() {
        assert_eq!(table_checksum(b"ABCD"), 0x41424344);
        // Tail bytes are zero-padded to a word.
        assert_eq!(table_checksum(b"ABCDE"), 0x41424344u32.wrapping_add(0x45000000));
    }

    #[test]
    fn maxp_and_post_headers() {
        let maxp = build_maxp(42);
        assert_eq!(read_u32(&maxp, 0), 0x00010000);
        assert_eq!(read_u16(&maxp, 4), 42);
        let post = build_post_format3();
        assert_eq!(post.len(), 32);
        assert_eq!(read_u32(&post, 0), 0x00030000);
    }

    #[test]
    fn cmap_format4_layout() {
        let cmap = build_cmap_format4(&[(65, 1), (66, 2), (200, 3)]);
        assert_eq!(read_u16(&cmap, 0), 0);
        assert_eq!(read_u16(&cmap, 2), 1);
        assert_eq!(read_u16(&cmap, 4), 3);
        assert_eq!(read_u16(&cmap, 6), 1);
        let sub = read_u32(&cmap, 8) as usize;
        assert_eq!(read_u16(&cmap, sub), 4);
        // Segments: [65..66], [200], sentinel.
        assert_eq!(read_u16(&cmap, sub + 6), 6);
    }

    #[test]
    fn composite_records_are_walked_and_rewritten() {
        // glyph 0: empty; glyph 1: composite of glyphs 5 and 9;
        // glyphs 5, 9: simple stubs.
        let mut glyf = Vec::new();
        let g1_start = glyf.len() as u32;
        glyf.extend_from_slice(&(-1i16).to_be_bytes()); // numberOfContours
        glyf.extend_from_slice(&[0u8; 8]); // bbox
        glyf.extend_from_slice(&0x0023u16.to_be_bytes()); // words args + more
        glyf.extend_from_slice(&5u16.to_be_bytes());
        glyf.extend_from_slice(&[0u8; 4]); // args
        glyf.extend_from_slice(&0x0003u16.to_be_bytes()); // words args, last
        glyf.extend_from_slice(&9u16.to_be_bytes());
        glyf.extend_from_slice(&[0u8; 4]);
        let g1_end = glyf.len() as u32;
        let simple = {
            let mut v = Vec::new();
            v.extend_from_slice(&1i16.to_be_bytes());
            v.extend_from_slice(&[0u8; 8]);
            v
        };
        let g5_start = glyf.len() as u32;
        glyf.extend_from_slice(&simple);
        let g5_end = glyf.len() as u32;
        let g9_start = glyf.len() as u32;
        glyf.extend_from_slice(&simple);
        let g9_end = glyf.len() as u32;

        // Ten glyph slots, only 1, 5 and 9 non-empty.
        let mut loca = vec![0u32; 11];
        loca[1] = g1_start;
        loca[2] = g1_end;
        for slot in &mut loca[3..6] {
            *slot = g5_start;
        }
        loca[6] = g5_end;
        for slot in &mut loca[7..10] {
            *slot = g9_start;
        }
        loca[10] = g9_end;
        // Keep ranges consistent for the empty glyphs.
        loca[3] = g1_end;
        loca[4] = g1_end;
        loca[5] = g5_start;
        loca[7] = g5_end;
        loca[8] = g5_end;
        loca[9] = g9_start;

        let mut needed = BTreeSet::from([0u16, 1]);
        collect_component_glyphs(&glyf, &loca, 1, &mut needed);
        assert_eq!(needed, BTreeSet::from([0, 1, 5, 9]));

        let remap: HashMap<u16, u16> = needed
            .iter()
            .enumerate()
            .map(|(new, &old)| (old, new as u16))
            .collect();
        let (new_glyf, new_offsets) = rebuild_glyf(&glyf, &loca, &needed, &remap);
        assert_eq!(new_offsets.len(), 5);
        // Glyph 1 lands first (glyph 0 is empty) with components 5 and 9
        // rewritten to their new ids 2 and 3.
        let g1 = new_offsets[1] as usize;
        assert_eq!(read_u16(&new_glyf, g1 + 12), remap[&5]);
        assert_eq!(read_u16(&new_glyf, g1 + 20), remap[&9]);
    }

    #[test]
    fn hmtx_tail_glyphs_reuse_last_advance() {
        // Two full metrics then two lsb-only entries.
        let mut hmtx = Vec::new();
        hmtx.extend_from_slice(&500u16.to_be_bytes());
        hmtx.extend_from_slice(&10u16.to_be_bytes());
        hmtx.extend_from_slice(&600u16.to_be_bytes());
        hmtx.extend_from_slice(&20u16.to_be_bytes());
        hmtx.extend_from_slice(&30u16.to_be_bytes());
        hmtx.extend_from_slice(&40u16.to_be_bytes());

        let needed = BTreeSet::from([0u16, 3]);
        let out = rebuild_hmtx(&hmtx, &needed, 2);
        assert_eq!(read_u16(&out, 0), 500);
        assert_eq!(read_u16(&out, 2), 10);
        // Glyph 3 gets the last advance (600) and its own lsb (40).
        assert_eq!(read_u16(&out, 4), 600);
        assert_eq!(read_u16(&out, 6), 40);
    }

    fn widths_of(pairs: &[(u32, u16)]) -> BTreeMap<u32, u16> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn unused_font_encodes_empty_width_array() {
        let widths = widths_of(&[(65, 500), (66, 600)]);
        let w = encode_cid_widths(&widths, 0, &BTreeSet::new(), 500);
        assert_eq!(w, "/W [ ]");
    }

    #[test]
    fn default_width_entries_fall_through_to_dw() {
        let widths = widths_of(&[(65, 500), (66, 1000), (67, 1000), (68, 500), (69, 700)]);
        let w = encode_cid_widths(&widths, 0xFFFF, &BTreeSet::new(), 1000);
        // 66 and 67 ride on /DW; the skip splits 65 from the 68/69 run.
        assert_eq!(w, "/W [ 65 65 500 68 [ 500 700 ] ]");
    }

    #[test]
    fn uniform_run_collapses_to_range() {
        let widths = widths_of(&[(65, 500), (66, 500), (67, 500), (68, 500), (69, 500), (70, 500)]);
        let w = encode_cid_widths(&widths, 0xFFFF, &BTreeSet::new(), 0);
        assert_eq!(w, "/W [ 65 70 500 ]");
    }

    #[test]
    fn mixed_run_uses_list_form() {
        let widths = widths_of(&[(10, 500), (11, 600), (12, 600)]);
        let w = encode_cid_widths(&widths, 0xFFFF, &BTreeSet::new(), 0);
        assert_eq!(w, "/W [ 10 [ 500 600 600 ] ]");
    }

    #[test]
    fn isolated_codepoint() {
        let widths = widths_of(&[(120, 777)]);
        let w = encode_cid_widths(&widths, 0xFFFF, &BTreeSet::new(), 0);
        assert_eq!(w, "/W [ 120 120 777 ]");
    }

    #[test]
    fn high_codepoints_need_subset_membership() {
        let widths = widths_of(&[(65, 500), (0x4E00, 1000), (0x4E01, 1000)]);
        let none = encode_cid_widths(&widths, 0xFFFF, &BTreeSet::new(), 0);
        assert_eq!(none, "/W [ 65 65 500 ]");
        let subset = BTreeSet::from([0x4E00u32, 0x4E01]);
        let some = encode_cid_widths(&widths, 0xFFFF, &subset, 0);
        assert_eq!(some, "/W [ 65 65 500 19968 19969 1000 ]");
    }

    #[test]
    fn decoded_widths_match_input() {
        // Parse the /W string back and compare against the source map.
        let widths = widths_of(&[
            (32, 250),
            (33, 300),
            (34, 300),
            (35, 300),
            (36, 410),
            (40, 330),
            (41, 330),
            (65, 700),
            (66, 680),
            (67, 700),
            (68, 680),
        ]);
        let encoded = encode_cid_widths(&widths, 0xFFFF, &BTreeSet::new(), 0);
        let inner = encoded
            .strip_prefix("/W [")
            .unwrap()
            .strip_suffix("]")
            .unwrap();

        let mut decoded: BTreeMap<u32, u16> = BTreeMap::new();
        let tokens: Vec<&str> = inner.split_whitespace().collect();
        let mut i = 0;
        while i < tokens.len() {
            let start: u32 = tokens[i].parse().unwrap();
            if tokens[i + 1] == "[" {
                let mut cid = start;
                i += 2;
                while tokens[i] != "]" {
                    decoded.insert(cid, tokens[i].parse().unwrap());
                    cid += 1;
                    i += 1;
                }
                i += 1;
            } else {
                let end: u32 = tokens[i + 1].parse().unwrap();
                let w: u16 = tokens[i + 2].parse().unwrap();
                for cid in start..=end {
                    decoded.insert(cid, w);
                }
                i += 3;
            }
        }
        assert_eq!(decoded, widths);
    }
}
