//! Windows codepage to `encoding_rs` encoding mapping.
//!
//! 8-bit strings in BIFF5 records (LABEL bodies, BOUNDSHEET names) are
//! encoded in the workbook's codepage, announced by the CODEPAGE record.
//! Unknown codepages fall back to cp1252 (Western European), the most
//! common encoding in legacy files.

use encoding_rs::Encoding;

/// Map a Windows codepage ID to an `encoding_rs` encoding.
///
/// Covers the codepages most commonly seen in legacy .xls files.
fn codepage_to_encoding(codepage: u16) -> &'static Encoding {
    match codepage {
        874 => encoding_rs::WINDOWS_874,
        932 => encoding_rs::SHIFT_JIS,
        936 => encoding_rs::GBK,
        949 => encoding_rs::EUC_KR,
        950 => encoding_rs::BIG5,
        1250 => encoding_rs::WINDOWS_1250,
        1251 => encoding_rs::WINDOWS_1251,
        1253 => encoding_rs::WINDOWS_1253,
        1254 => encoding_rs::WINDOWS_1254,
        1255 => encoding_rs::WINDOWS_1255,
        1256 => encoding_rs::WINDOWS_1256,
        1257 => encoding_rs::WINDOWS_1257,
        1258 => encoding_rs::WINDOWS_1258,
        10000 => encoding_rs::MACINTOSH,
        28592 => encoding_rs::ISO_8859_2,
        28595 => encoding_rs::ISO_8859_5,
        28597 => encoding_rs::ISO_8859_7,
        28598 => encoding_rs::ISO_8859_8,
        65001 => encoding_rs::UTF_8,
        _ => encoding_rs::WINDOWS_1252, // cp1252 / ISO-8859-1 / default
    }
}

/// Decode an 8-bit string using the given workbook codepage.
pub(crate) fn decode_bytes(bytes: &[u8], codepage: u16) -> String {
    let (text, _encoding_used, _had_errors) = codepage_to_encoding(codepage).decode(bytes);
    text.into_owned()
}

/// Encode text as cp1252, replacing unmappable characters with `?`.
///
/// Used by the writer, which emits 8-bit strings only.
pub(crate) fn encode_cp1252_lossy(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut utf8 = [0u8; 4];
    for ch in text.chars() {
        if ch.is_ascii() {
            out.push(ch as u8);
            continue;
        }
        let (bytes, _, unmappable) = encoding_rs::WINDOWS_1252.encode(ch.encode_utf8(&mut utf8));
        if unmappable {
            out.push(b'?');
        } else {
            out.extend_from_slice(&bytes);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_cp1252() {
        assert_eq!(decode_bytes(&[b'a', 0xE9], 1252), "aé");
        // Unknown codepage falls back to cp1252
        assert_eq!(decode_bytes(&[0xE9], 0), "é");
    }

    #[test]
    fn test_decode_cp1251() {
        // 0xC0 is А (Cyrillic capital A) in cp1251
        assert_eq!(decode_bytes(&[0xC0], 1251), "А");
    }

    #[test]
    fn test_encode_cp1252_lossy() {
        assert_eq!(encode_cp1252_lossy("abc"), b"abc");
        assert_eq!(encode_cp1252_lossy("café"), vec![b'c', b'a', b'f', 0xE9]);
        // Characters outside cp1252 become '?'
        assert_eq!(encode_cp1252_lossy("日"), b"?");
        assert_eq!(encode_cp1252_lossy("a日b"), b"a?b");
    }
}
