//! ISO BMFF serialization primitives.
//!
//! Each box follows the standard layout: 4-byte size (big-endian u32),
//! 4-byte type (ASCII), then box-specific content.

/// Write a complete box: size (u32 BE) + type (4 ASCII bytes) + content.
pub(crate) fn write_box(box_type: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let size = (8 + content.len()) as u32;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(box_type);
    out.extend_from_slice(content);
    out
}

/// Write a container box (size + type + children concatenated).
pub(crate) fn write_container_box(box_type: &[u8; 4], children: &[&[u8]]) -> Vec<u8> {
    let children_len: usize = children.iter().map(|c| c.len()).sum();
    let size = (8 + children_len) as u32;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(box_type);
    for child in children {
        out.extend_from_slice(child);
    }
    out
}

/// Full box header: version byte followed by 24 flag bits.
pub(crate) fn fullbox_header(version: u8, flags: u32) -> [u8; 4] {
    let val = ((version as u32) << 24) | (flags & 0x00FF_FFFF);
    val.to_be_bytes()
}

/// Write a file/segment type box.
pub(crate) fn write_type_box(box_type: &[u8; 4], major: &[u8; 4], compatible: &[&[u8; 4]]) -> Vec<u8> {
    let mut content = Vec::with_capacity(8 + compatible.len() * 4);
    content.extend_from_slice(major);
    content.extend_from_slice(&0u32.to_be_bytes());
    for brand in compatible {
        content.extend_from_slice(*brand);
    }
    write_box(box_type, &content)
}

/// Identity transformation matrix used by mvhd and tkhd.
pub(crate) const UNITY_MATRIX: [u32; 9] = [
    0x0001_0000,
    0,
    0,
    0,
    0x0001_0000,
    0,
    0,
    0,
    0x4000_0000,
];
