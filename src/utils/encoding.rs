//! Windows code page conversions.
use encoding::label::encoding_from_windows_code_page;
use encoding::{DecoderTrap, EncoderTrap, Encoding, EncodingRef};

/// Windows code page identifier.
pub type Codepage = u32;

pub const CP_WINDOWS1252: Codepage = 1252;
pub const CP_UTF16LE: Codepage = 1200;

fn lookup(codepage: Codepage) -> EncodingRef {
    match encoding_from_windows_code_page(codepage as usize) {
        Some(enc) => enc,
        None => {
            log::debug!("Unknown code page {}, using Windows-1252", codepage);
            encoding::all::WINDOWS_1252 as EncodingRef
        }
    }
}

/// Decodes bytes stored in `codepage`. Undecodable sequences are replaced.
pub fn decode_codepage(codepage: Codepage, data: &[u8]) -> String {
    match lookup(codepage).decode(data, DecoderTrap::Replace) {
        Ok(s) => s,
        Err(s) => s.into_owned(),
    }
}

/// Encodes a string into `codepage`. Unencodable characters are replaced.
pub fn encode_codepage(codepage: Codepage, data: &str) -> Vec<u8> {
    match lookup(codepage).encode(data, EncoderTrap::Replace) {
        Ok(v) => v,
        Err(_) => {
            crate::COUNTER.inc_warning();
            log::warn!("Some characters could not be encoded in code page {}", codepage);
            data.bytes().map(|b| if b.is_ascii() { b } else { b'?' }).collect()
        }
    }
}

/// Default ANSI code page for a Windows LANGID.
pub fn codepage_for_language(language_id: u32) -> Codepage {
    let primary = language_id & 0x3ff;
    let sub = (language_id >> 10) & 0x3f;
    match primary {
        // Chinese: Taiwan, Hong Kong and Macao use traditional characters
        0x04 => match sub {
            0x01 | 0x03 | 0x05 => 950,
            _ => 936,
        },
        0x11 => 932,
        0x12 => 949,
        0x1e => 874,
        0x2a => 1258,
        0x05 | 0x0e | 0x15 | 0x18 | 0x1b | 0x1c | 0x24 => 1250,
        // Croatian, Serbian, Bosnian share a primary id
        0x1a => match sub {
            0x03 | 0x07 => 1251,
            _ => 1250,
        },
        0x02 | 0x19 | 0x22 | 0x23 | 0x2f | 0x3f | 0x40 | 0x44 | 0x50 => 1251,
        0x08 => 1253,
        0x1f => 1254,
        0x2c | 0x43 => match sub {
            0x02 => 1251,
            _ => 1254,
        },
        0x0d => 1255,
        0x01 | 0x20 | 0x29 => 1256,
        0x25 | 0x26 | 0x27 => 1257,
        _ => CP_WINDOWS1252,
    }
}

#[test]
fn test_decode_codepages() {
    assert_eq!(decode_codepage(CP_WINDOWS1252, b"caf\xe9"), "café");
    assert_eq!(
        decode_codepage(CP_UTF16LE, &[0x2d, 0x4e, 0x87, 0x65]),
        "中文"
    );
    assert_eq!(decode_codepage(1251, &[0xcf, 0xf0, 0xe8]), "При");
}

#[test]
fn test_encode_utf16() {
    assert_eq!(encode_codepage(CP_UTF16LE, "ab"), vec![b'a', 0, b'b', 0]);
    assert_eq!(encode_codepage(CP_WINDOWS1252, "é"), vec![0xe9]);
}

#[test]
fn test_codepage_for_language() {
    assert_eq!(codepage_for_language(0x0409), 1252);
    assert_eq!(codepage_for_language(0x0419), 1251);
    assert_eq!(codepage_for_language(0x0411), 932);
    assert_eq!(codepage_for_language(0x0804), 936);
    assert_eq!(codepage_for_language(0x0404), 950);
    assert_eq!(codepage_for_language(0x0c1a), 1251);
    assert_eq!(codepage_for_language(0x041a), 1250);
}
