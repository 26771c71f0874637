//! Minimal TrueType subsetting.
//!
//! Copies exactly the glyph outlines the active density ramp needs into a
//! fresh sfnt: rebuilt `cmap` (format 4), `glyf`/`loca` (long offsets) and
//! `hmtx`, patched `head`/`hhea`/`maxp`, and fresh `name`/`post` tables that
//! preserve the source family and style names. Composite glyphs pull their
//! component glyphs into the subset and are remapped in place.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;

use super::{FontFace, SubsetError};

const TAG_CMAP: [u8; 4] = *b"cmap";
const TAG_GLYF: [u8; 4] = *b"glyf";
const TAG_HEAD: [u8; 4] = *b"head";
const TAG_HHEA: [u8; 4] = *b"hhea";
const TAG_HMTX: [u8; 4] = *b"hmtx";
const TAG_LOCA: [u8; 4] = *b"loca";
const TAG_MAXP: [u8; 4] = *b"maxp";
const TAG_NAME: [u8; 4] = *b"name";
const TAG_POST: [u8; 4] = *b"post";

// Composite glyph component flags.
const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

fn read_u16(data: &[u8], offset: usize) -> Result<u16, SubsetError> {
    let bytes: [u8; 2] = data
        .get(offset..offset + 2)
        .and_then(|s| s.try_into().ok())
        .ok_or(SubsetError::Malformed("unexpected end of font data"))?;
    Ok(u16::from_be_bytes(bytes))
}

fn read_i16(data: &[u8], offset: usize) -> Result<i16, SubsetError> {
    Ok(read_u16(data, offset)? as i16)
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, SubsetError> {
    let bytes: [u8; 4] = data
        .get(offset..offset + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or(SubsetError::Malformed("unexpected end of font data"))?;
    Ok(u32::from_be_bytes(bytes))
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_i16(out: &mut Vec<u8>, value: i16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Locates a table in the sfnt directory, returning its byte slice.
pub(crate) fn table<'a>(data: &'a [u8], tag: &[u8; 4]) -> Result<Option<&'a [u8]>, SubsetError> {
    let num_tables = read_u16(data, 4)? as usize;
    for index in 0..num_tables {
        let record = 12 + index * 16;
        let entry_tag = data
            .get(record..record + 4)
            .ok_or(SubsetError::Malformed("truncated table directory"))?;
        if entry_tag == tag {
            let offset = read_u32(data, record + 8)? as usize;
            let length = read_u32(data, record + 12)? as usize;
            let slice = data
                .get(offset..offset + length)
                .ok_or(SubsetError::Malformed("table extends past end of font"))?;
            return Ok(Some(slice));
        }
    }
    Ok(None)
}

fn required_table<'a>(data: &'a [u8], tag: &[u8; 4], name: &'static str) -> Result<&'a [u8], SubsetError> {
    table(data, tag)?.ok_or(SubsetError::MissingTable(name))
}

/// Family and style names from the `name` table, preferring the Windows
/// Unicode records and falling back to Macintosh Roman.
pub(crate) fn font_names(data: &[u8]) -> Result<(String, String), SubsetError> {
    let name = match table(data, &TAG_NAME)? {
        Some(name) => name,
        None => return Ok(("Subset".to_string(), "Regular".to_string())),
    };

    let family = name_record(name, 1)?.unwrap_or_else(|| "Subset".to_string());
    let style = name_record(name, 2)?.unwrap_or_else(|| "Regular".to_string());
    Ok((family, style))
}

fn name_record(name: &[u8], name_id: u16) -> Result<Option<String>, SubsetError> {
    let count = read_u16(name, 2)? as usize;
    let string_offset = read_u16(name, 4)? as usize;
    let mut fallback = None;

    for index in 0..count {
        let record = 6 + index * 12;
        let platform = read_u16(name, record)?;
        let encoding = read_u16(name, record + 2)?;
        let id = read_u16(name, record + 6)?;
        if id != name_id {
            continue;
        }

        let length = read_u16(name, record + 8)? as usize;
        let offset = string_offset + read_u16(name, record + 10)? as usize;
        let Some(bytes) = name.get(offset..offset + length) else {
            continue;
        };

        if platform == 3 && encoding == 1 {
            let units: Vec<u16> =
                bytes.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
            return Ok(Some(String::from_utf16_lossy(&units)));
        }
        if platform == 1 && fallback.is_none() {
            fallback = Some(bytes.iter().map(|&b| b as char).collect());
        }
    }

    Ok(fallback)
}

pub(crate) fn units_per_em(data: &[u8]) -> Result<u16, SubsetError> {
    let head = required_table(data, &TAG_HEAD, "head")?;
    read_u16(head, 18)
}

pub(crate) fn ascent_descent(data: &[u8]) -> Result<(i16, i16), SubsetError> {
    let hhea = required_table(data, &TAG_HHEA, "hhea")?;
    Ok((read_i16(hhea, 4)?, read_i16(hhea, 6)?))
}

/// Parsed view of the source tables the subsetter reads from.
struct SourceFont<'a> {
    head: &'a [u8],
    hhea: &'a [u8],
    maxp: &'a [u8],
    loca: &'a [u8],
    glyf: &'a [u8],
    hmtx: &'a [u8],
    num_glyphs: u16,
    long_loca: bool,
    num_h_metrics: u16,
}

impl<'a> SourceFont<'a> {
    fn parse(data: &'a [u8]) -> Result<Self, SubsetError> {
        if data.len() < 12 {
            return Err(SubsetError::Malformed("font shorter than sfnt header"));
        }

        let head = required_table(data, &TAG_HEAD, "head")?;
        let hhea = required_table(data, &TAG_HHEA, "hhea")?;
        let maxp = required_table(data, &TAG_MAXP, "maxp")?;
        let loca = required_table(data, &TAG_LOCA, "loca")?;
        let glyf = required_table(data, &TAG_GLYF, "glyf")?;
        let hmtx = required_table(data, &TAG_HMTX, "hmtx")?;

        if head.len() < 54 {
            return Err(SubsetError::Malformed("head table too short"));
        }

        let num_glyphs = read_u16(maxp, 4)?;
        let long_loca = read_i16(head, 50)? != 0;
        let num_h_metrics = read_u16(hhea, 34)?;
        if num_h_metrics == 0 {
            return Err(SubsetError::Malformed("hhea reports zero horizontal metrics"));
        }

        Ok(Self { head, hhea, maxp, loca, glyf, hmtx, num_glyphs, long_loca, num_h_metrics })
    }

    /// Raw outline bytes for a glyph; empty for glyphs with no outline.
    fn glyph_data(&self, gid: u16) -> Result<&'a [u8], SubsetError> {
        if gid >= self.num_glyphs {
            return Err(SubsetError::Malformed("glyph id out of range"));
        }

        let gid = gid as usize;
        let (start, end) = if self.long_loca {
            (read_u32(self.loca, gid * 4)? as usize, read_u32(self.loca, gid * 4 + 4)? as usize)
        } else {
            (read_u16(self.loca, gid * 2)? as usize * 2, read_u16(self.loca, gid * 2 + 2)? as usize * 2)
        };

        if end < start {
            return Err(SubsetError::Malformed("loca offsets out of order"));
        }
        self.glyf.get(start..end).ok_or(SubsetError::Malformed("loca points past glyf table"))
    }

    fn metrics(&self, gid: u16) -> Result<(u16, i16), SubsetError> {
        if gid < self.num_h_metrics {
            let offset = gid as usize * 4;
            Ok((read_u16(self.hmtx, offset)?, read_i16(self.hmtx, offset + 2)?))
        } else {
            // Trailing glyphs reuse the final advance width.
            let last = (self.num_h_metrics as usize - 1) * 4;
            let advance = read_u16(self.hmtx, last)?;
            let offset = self.num_h_metrics as usize * 4 + (gid - self.num_h_metrics) as usize * 2;
            Ok((advance, read_i16(self.hmtx, offset)?))
        }
    }
}

/// Byte offsets (within the glyph record) and glyph ids of a composite
/// glyph's components. Empty for simple and blank glyphs.
fn component_refs(glyph: &[u8]) -> Result<Vec<(usize, u16)>, SubsetError> {
    if glyph.is_empty() || read_i16(glyph, 0)? >= 0 {
        return Ok(Vec::new());
    }

    let mut refs = Vec::new();
    let mut offset = 10;
    loop {
        let flags = read_u16(glyph, offset)?;
        let gid = read_u16(glyph, offset + 2)?;
        refs.push((offset + 2, gid));
        offset += 4;

        offset += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        if flags & WE_HAVE_A_SCALE != 0 {
            offset += 2;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            offset += 4;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            offset += 8;
        }

        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }
    Ok(refs)
}

/// Builds the subset font binary for the given character set. The caller is
/// expected to pass a deduplicated set; any ordering is accepted.
pub(crate) fn build_subset(face: &FontFace, chars: &str) -> Result<Vec<u8>, SubsetError> {
    let data = face.data();
    let source = SourceFont::parse(data)?;
    if source.num_glyphs == 0 {
        return Err(SubsetError::MissingNotdef);
    }

    // Character -> source glyph id. A character the font does not cover
    // maps to notdef rather than failing the whole export.
    let mut char_gids: BTreeMap<char, u16> = BTreeMap::new();
    for c in chars.chars() {
        let gid = face.glyph_index(c);
        if gid == 0 {
            warn!("font has no glyph for {c:?}; substituting notdef");
        }
        if gid >= source.num_glyphs {
            return Err(SubsetError::Malformed("cmap points past glyph count"));
        }
        char_gids.insert(c, gid);
    }

    // Glyph closure: notdef, every requested glyph, and all composite
    // components, in source order.
    let mut keep: BTreeSet<u16> = char_gids.values().copied().collect();
    keep.insert(0);
    let mut queue: Vec<u16> = keep.iter().copied().collect();
    while let Some(gid) = queue.pop() {
        for (_, component) in component_refs(source.glyph_data(gid)?)? {
            if component >= source.num_glyphs {
                return Err(SubsetError::Malformed("composite component out of range"));
            }
            if keep.insert(component) {
                queue.push(component);
            }
        }
    }

    let order: Vec<u16> = keep.into_iter().collect();
    let remap: BTreeMap<u16, u16> = order.iter().enumerate().map(|(new, &old)| (old, new as u16)).collect();
    let new_glyph_count = order.len() as u16;

    // glyf + loca (long format) + hmtx for the kept glyphs.
    let mut glyf = Vec::new();
    let mut loca = Vec::with_capacity((order.len() + 1) * 4);
    let mut hmtx = Vec::with_capacity(order.len() * 4);
    push_u32(&mut loca, 0);

    for &old_gid in &order {
        let mut glyph = source.glyph_data(old_gid)?.to_vec();
        for (offset, component) in component_refs(&glyph)? {
            let new_component = remap[&component];
            glyph[offset..offset + 2].copy_from_slice(&new_component.to_be_bytes());
        }
        glyf.extend_from_slice(&glyph);
        while glyf.len() % 4 != 0 {
            glyf.push(0);
        }
        push_u32(&mut loca, glyf.len() as u32);

        let (advance, lsb) = source.metrics(old_gid)?;
        push_u16(&mut hmtx, advance);
        push_i16(&mut hmtx, lsb);
    }

    // head: zero the checksum adjustment (recomputed at assembly) and force
    // long loca offsets.
    let mut head = source.head[..54].to_vec();
    head[8..12].fill(0);
    head[50..52].copy_from_slice(&1i16.to_be_bytes());

    let mut hhea = source.hhea.to_vec();
    if hhea.len() < 36 {
        return Err(SubsetError::Malformed("hhea table too short"));
    }
    hhea[34..36].copy_from_slice(&new_glyph_count.to_be_bytes());

    let mut maxp = source.maxp.to_vec();
    if maxp.len() < 6 {
        return Err(SubsetError::Malformed("maxp table too short"));
    }
    maxp[4..6].copy_from_slice(&new_glyph_count.to_be_bytes());

    let mappings: Vec<(u32, u16)> = char_gids
        .iter()
        .filter_map(|(&c, &old_gid)| {
            let code = c as u32;
            if code > 0xFFFF {
                warn!("skipping {c:?}: outside the basic multilingual plane");
                return None;
            }
            Some((code, remap[&old_gid]))
        })
        .collect();

    let tables = vec![
        (TAG_CMAP, build_cmap(&mappings)),
        (TAG_GLYF, glyf),
        (TAG_HEAD, head),
        (TAG_HHEA, hhea),
        (TAG_HMTX, hmtx),
        (TAG_LOCA, loca),
        (TAG_MAXP, maxp),
        (TAG_NAME, build_name(face.family(), face.style())),
        (TAG_POST, build_post()),
    ];

    Ok(assemble_font(tables))
}

/// Format 4 cmap with one segment per mapped character plus the mandatory
/// 0xFFFF terminator. Mappings must be sorted by codepoint.
pub(crate) fn build_cmap(mappings: &[(u32, u16)]) -> Vec<u8> {
    let seg_count = (mappings.len() + 1) as u16;
    let seg_count_x2 = seg_count * 2;
    let search_range = 2 * (1u16 << (15 - seg_count.leading_zeros() as u16));
    let entry_selector = 15 - seg_count.leading_zeros() as u16;
    let range_shift = seg_count_x2 - search_range;

    let mut subtable = Vec::new();
    push_u16(&mut subtable, 4); // format
    push_u16(&mut subtable, 16 + 8 * seg_count); // length
    push_u16(&mut subtable, 0); // language
    push_u16(&mut subtable, seg_count_x2);
    push_u16(&mut subtable, search_range);
    push_u16(&mut subtable, entry_selector);
    push_u16(&mut subtable, range_shift);

    for &(code, _) in mappings {
        push_u16(&mut subtable, code as u16); // endCode
    }
    push_u16(&mut subtable, 0xFFFF);
    push_u16(&mut subtable, 0); // reservedPad
    for &(code, _) in mappings {
        push_u16(&mut subtable, code as u16); // startCode
    }
    push_u16(&mut subtable, 0xFFFF);
    for &(code, gid) in mappings {
        push_u16(&mut subtable, (gid as i32 - code as i32) as u16); // idDelta
    }
    push_u16(&mut subtable, 1);
    for _ in 0..seg_count {
        push_u16(&mut subtable, 0); // idRangeOffset
    }

    let mut cmap = Vec::new();
    push_u16(&mut cmap, 0); // version
    push_u16(&mut cmap, 1); // one encoding record
    push_u16(&mut cmap, 3); // Windows
    push_u16(&mut cmap, 1); // Unicode BMP
    push_u32(&mut cmap, 12); // subtable offset
    cmap.extend_from_slice(&subtable);
    cmap
}

/// Minimal `name` table carrying family, style and full name as Windows
/// Unicode records.
pub(crate) fn build_name(family: &str, style: &str) -> Vec<u8> {
    let full = format!("{family} {style}");
    let entries: [(u16, &str); 3] = [(1, family), (2, style), (4, &full)];

    let mut strings = Vec::new();
    let mut records = Vec::new();
    for (name_id, value) in entries {
        let offset = strings.len() as u16;
        for unit in value.encode_utf16() {
            push_u16(&mut strings, unit);
        }
        let length = strings.len() as u16 - offset;
        push_u16(&mut records, 3); // platform
        push_u16(&mut records, 1); // encoding
        push_u16(&mut records, 0x0409); // language
        push_u16(&mut records, name_id);
        push_u16(&mut records, length);
        push_u16(&mut records, offset);
    }

    let mut name = Vec::new();
    push_u16(&mut name, 0); // format
    push_u16(&mut name, entries.len() as u16);
    push_u16(&mut name, 6 + records.len() as u16); // stringOffset
    name.extend_from_slice(&records);
    name.extend_from_slice(&strings);
    name
}

/// Version 3.0 `post` table: no glyph names.
fn build_post() -> Vec<u8> {
    let mut post = vec![0u8; 32];
    post[0..4].copy_from_slice(&0x0003_0000u32.to_be_bytes());
    post
}

fn checksum(data: &[u8]) -> u32 {
    let mut sum = 0u32;
    for chunk in data.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum = sum.wrapping_add(u32::from_be_bytes(word));
    }
    sum
}

/// Lays the tables out as an sfnt binary: offset table, directory sorted by
/// tag, 4-byte-aligned table data, and a patched head checksum adjustment.
pub(crate) fn assemble_font(mut tables: Vec<([u8; 4], Vec<u8>)>) -> Vec<u8> {
    tables.sort_by_key(|(tag, _)| *tag);

    let num_tables = tables.len() as u16;
    let entry_selector = 15 - num_tables.leading_zeros() as u16;
    let search_range = 16 * (1u16 << entry_selector);
    let range_shift = num_tables * 16 - search_range;

    let mut font = Vec::new();
    push_u32(&mut font, 0x0001_0000); // TrueType sfnt version
    push_u16(&mut font, num_tables);
    push_u16(&mut font, search_range);
    push_u16(&mut font, entry_selector);
    push_u16(&mut font, range_shift);

    let directory_len = 12 + tables.len() * 16;
    let mut offset = directory_len;
    let mut head_offset = None;

    for (tag, table) in &tables {
        if tag == &TAG_HEAD {
            head_offset = Some(offset);
        }
        font.extend_from_slice(tag);
        push_u32(&mut font, checksum(table));
        push_u32(&mut font, offset as u32);
        push_u32(&mut font, table.len() as u32);
        offset += (table.len() + 3) & !3;
    }

    for (_, table) in &tables {
        font.extend_from_slice(table);
        while font.len() % 4 != 0 {
            font.push(0);
        }
    }

    if let Some(head_offset) = head_offset {
        let adjustment = 0xB1B0_AFBAu32.wrapping_sub(checksum(&font));
        font[head_offset + 8..head_offset + 12].copy_from_slice(&adjustment.to_be_bytes());
    }

    font
}
