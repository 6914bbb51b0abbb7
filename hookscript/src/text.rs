//! Narrow and wide text.
//!
//! Narrow strings are byte-oriented and treated as UTF-8 (lossily decoded);
//! wide strings are sequences of native-endian UTF-16 code units.  Messages
//! always carry the canonical Rust `String` form of either.

/// Text encoding family of a native string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Narrow,
    Wide,
}

impl Encoding {
    /// Size in bytes of one code unit.
    pub fn unit_size(self) -> usize {
        match self {
            Encoding::Narrow => 1,
            Encoding::Wide => 2,
        }
    }
}

/// Decode narrow bytes, replacing invalid sequences with U+FFFD.
pub fn decode_narrow(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Reassemble native-endian UTF-16 code units from raw bytes.  A trailing
/// odd byte is ignored.
pub fn wide_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
        .collect()
}

/// Decode UTF-16 code units, replacing unpaired surrogates with U+FFFD.
pub fn decode_wide(units: &[u16]) -> String {
    char::decode_utf16(units.iter().copied())
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

pub fn encode_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// Native byte image of a wide string, NUL terminated.
pub fn wide_storage(units: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity((units.len() + 1) * 2);
    for u in units.iter().copied().chain(std::iter::once(0)) {
        out.extend_from_slice(&u.to_ne_bytes());
    }
    out
}

/// Native byte image of a narrow string, NUL terminated.
pub fn narrow_storage(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.extend_from_slice(bytes);
    out.push(0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_round_trip_utf8() {
        assert_eq!(decode_narrow("ÆØÅæøå".as_bytes()), "ÆØÅæøå");
    }

    #[test]
    fn narrow_invalid_is_replaced() {
        assert_eq!(decode_narrow(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
    }

    #[test]
    fn wide_units_from_bytes() {
        let bytes = wide_storage(&encode_wide("Hi"));
        assert_eq!(bytes.len(), 6);
        assert_eq!(wide_units(&bytes), vec![u16::from(b'H'), u16::from(b'i'), 0]);
    }

    #[test]
    fn wide_decodes_surrogate_pairs() {
        let units = encode_wide("a😀b");
        assert_eq!(units.len(), 4);
        assert_eq!(decode_wide(&units), "a😀b");
    }

    #[test]
    fn wide_unpaired_surrogate() {
        assert_eq!(decode_wide(&[0xD800, u16::from(b'x')]), "\u{FFFD}x");
    }

    #[test]
    fn narrow_storage_terminates() {
        assert_eq!(narrow_storage(b"ok"), b"ok\0");
    }

    #[test]
    fn unit_sizes() {
        assert_eq!(Encoding::Narrow.unit_size(), 1);
        assert_eq!(Encoding::Wide.unit_size(), 2);
    }
}
