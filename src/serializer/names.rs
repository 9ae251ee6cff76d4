/// Number of bytes a name occupies in a name table: its UTF-16 code units plus a null terminator,
/// rounded up to a multiple of four.
pub fn padded_len(name: &str) -> usize {
    let len = (name.encode_utf16().count() + 1) * 2;
    (len + 3) & !3
}

/// Encodes `(id, name)` pairs as a name table. The rule name table and the word table share this
/// format.
pub(crate) fn encode<'n, I>(entries: I) -> Vec<u8>
where
    I: IntoIterator<Item = (u32, &'n str)>,
{
    let mut out = Vec::new();
    for (id, name) in entries {
        let padded = padded_len(name);
        out.extend_from_slice(&((padded + 8) as u32).to_le_bytes());
        out.extend_from_slice(&id.to_le_bytes());

        let start = out.len();
        for unit in name.encode_utf16() {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        // Terminator and padding.
        out.resize(start + padded, 0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_padded_to_four_bytes() {
        assert_eq!(padded_len(""), 4);
        assert_eq!(padded_len("a"), 4);
        assert_eq!(padded_len("ab"), 8);
        assert_eq!(padded_len("abc"), 8);
        assert_eq!(padded_len("abcd"), 12);
    }

    #[test]
    fn entry_layout() {
        let bytes = encode([(3, "Hi")]);
        assert_eq!(
            bytes,
            [
                16, 0, 0, 0, // entry length
                3, 0, 0, 0, // id
                b'H', 0, b'i', 0, 0, 0, 0, 0, // name, terminator, padding
            ]
        );
    }

    #[test]
    fn non_ascii_names_use_utf16() {
        let bytes = encode([(1, "é")]);
        assert_eq!(&bytes[8..12], &[0xe9, 0, 0, 0]);
    }
}
