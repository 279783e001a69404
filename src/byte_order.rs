//! Helpers for explicit network byte-order conversions.
//!
//! The frame header carries its payload length and sequence number as
//! big-endian `u32` values. These helpers keep the Clippy expectation scoped
//! to the conversion points so codec code stays explicit about endianness.

/// Serialise a `u32` in network byte order (big-endian).
///
/// # Examples
///
/// ```
/// use chunkstream::byte_order::write_network_u32;
///
/// assert_eq!(write_network_u32(0x1234_5678), [0x12, 0x34, 0x56, 0x78]);
/// ```
#[must_use]
pub fn write_network_u32(value: u32) -> [u8; 4] {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Frame headers are big-endian on the wire."
    )]
    value.to_be_bytes()
}

/// Parse a network-order `u32` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use chunkstream::byte_order::read_network_u32;
///
/// assert_eq!(read_network_u32([0x00, 0x00, 0x04, 0x00]), 1024);
/// ```
#[must_use]
pub fn read_network_u32(bytes: [u8; 4]) -> u32 {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Frame headers are big-endian on the wire."
    )]
    u32::from_be_bytes(bytes)
}

/// Read a big-endian `u32` starting at `offset`, if four bytes are available.
#[must_use]
pub(crate) fn read_network_u32_at(src: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let bytes = src.get(offset..end)?;
    <[u8; 4]>::try_from(bytes).ok().map(read_network_u32)
}
