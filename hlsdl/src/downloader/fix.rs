/// First byte of every MPEG transport stream packet.
pub const SYNC_BYTE: u8 = 0x47;

/// Drops anything before the first sync byte, so each segment starts on a packet boundary.
/// Data without any sync byte is returned as is.
pub fn align_sync_byte(data: &[u8]) -> &[u8] {
    match data.iter().position(|&x| x == SYNC_BYTE) {
        Some(pos) => &data[pos..],
        None => data,
    }
}
