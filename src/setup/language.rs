use super::entry::LoadEntry;
use super::reader::{LoadContext, Text, read_binary};
use crate::error::Result;
use crate::ext::io::*;
use crate::inno_version;
use crate::utils::encoding::*;
use std::io::Read;

#[derive(Clone, Debug, Default)]
pub struct LanguageEntry {
    /// Internal identifier, e.g. `english`.
    pub name: String,
    pub language_name: Text,
    pub dialog_font: Text,
    pub title_font: Text,
    pub welcome_font: Text,
    pub copyright_font: Text,
    pub data: Vec<u8>,
    pub license_text: Text,
    pub info_before: Text,
    pub info_after: Text,
    pub language_id: u32,
    pub codepage: Codepage,
    pub dialog_font_size: u32,
    pub dialog_font_standard_height: u32,
    pub title_font_size: u32,
    pub welcome_font_size: u32,
    pub copyright_font_size: u32,
    pub right_to_left: bool,
}

impl LoadEntry for LanguageEntry {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &mut LoadContext) -> Result<Self> {
        let mut e = LanguageEntry::default();
        if ctx.since(inno_version!(4, 0, 0)) {
            e.name = decode_codepage(CP_WINDOWS1252, &read_binary(reader)?);
        } else {
            e.name = "default".to_string();
        }
        let raw = read_binary(reader)?;
        e.language_name = Text::new(raw, ctx.since(inno_version!(4, 2, 2)));
        e.dialog_font = ctx.read_text(reader)?;
        e.title_font = ctx.read_text(reader)?;
        e.welcome_font = ctx.read_text(reader)?;
        e.copyright_font = ctx.read_text(reader)?;
        if ctx.since(inno_version!(4, 0, 0)) {
            e.data = read_binary(reader)?;
        }
        if ctx.since(inno_version!(4, 0, 1)) {
            e.license_text = ctx.read_ansi_text(reader)?;
            e.info_before = ctx.read_ansi_text(reader)?;
            e.info_after = ctx.read_ansi_text(reader)?;
        }
        e.language_id = reader.read_u32()?;
        if ctx.before(inno_version!(4, 2, 2)) {
            e.codepage = codepage_for_language(e.language_id);
        } else if !ctx.version.is_unicode() {
            e.codepage = reader.read_u32()?;
            if e.codepage == 0 {
                e.codepage = CP_WINDOWS1252;
            }
        } else {
            if ctx.before(inno_version!(5, 3, 0)) {
                reader.read_u32()?;
            }
            e.codepage = CP_UTF16LE;
        }
        e.dialog_font_size = reader.read_u32()?;
        if ctx.before(inno_version!(4, 1, 0)) {
            e.dialog_font_standard_height = reader.read_u32()?;
        }
        e.title_font_size = reader.read_u32()?;
        e.welcome_font_size = reader.read_u32()?;
        e.copyright_font_size = reader.read_u32()?;
        if ctx.since(inno_version!(5, 2, 3)) {
            e.right_to_left = reader.read_u8()? != 0;
        }
        Ok(e)
    }
}

impl LanguageEntry {
    /// Re-decodes narrow strings: font names use the archive code page,
    /// license and info texts the language's own code page.
    pub fn decode(&mut self, codepage: Codepage) {
        self.dialog_font.decode(codepage);
        self.title_font.decode(codepage);
        self.welcome_font.decode(codepage);
        self.copyright_font.decode(codepage);
        self.language_name.decode(self.codepage);
        self.license_text.decode(self.codepage);
        self.info_before.decode(self.codepage);
        self.info_after.decode(self.codepage);
    }
}

/// Chooses the code page for narrow strings: a forced code page wins, then
/// Windows-1252 if any language uses it, then the first language's.
pub fn select_codepage(languages: &[LanguageEntry], forced: Option<Codepage>) -> Codepage {
    if let Some(cp) = forced {
        return cp;
    }
    if languages.iter().any(|l| l.codepage == CP_WINDOWS1252) {
        return CP_WINDOWS1252;
    }
    languages.first().map_or(CP_WINDOWS1252, |l| l.codepage)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::setup::entry::tests::{ctx, push_str};

    pub(crate) fn language_5_1_0(name: &str, codepage: u32, license: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        push_str(&mut out, name);
        let wide: Vec<u8> = "Deutsch".encode_utf16().flat_map(|c| c.to_le_bytes()).collect();
        out.extend_from_slice(&(wide.len() as u32).to_le_bytes());
        out.extend_from_slice(&wide);
        for s in ["Tahoma", "Arial", "Verdana", "Arial", ""] {
            push_str(&mut out, s);
        }
        out.extend_from_slice(&(license.len() as u32).to_le_bytes());
        out.extend_from_slice(license);
        push_str(&mut out, "");
        push_str(&mut out, "");
        out.extend_from_slice(&0x0407u32.to_le_bytes());
        out.extend_from_slice(&codepage.to_le_bytes());
        for _ in 0..4 {
            out.extend_from_slice(&8u32.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_load_and_decode() {
        let data = language_5_1_0("german", 1251, &[0xe4]);
        let mut c = ctx(inno_version!(5, 1, 0));
        let mut r = &data[..];
        let mut lang = LanguageEntry::load(&mut r, &mut c).unwrap();
        assert!(r.is_empty());
        assert_eq!(lang.name, "german");
        assert_eq!(lang.codepage, 1251);
        assert_eq!(lang.license_text.as_str(), "ä");
        lang.decode(1252);
        assert_eq!(lang.license_text.as_str(), "д");
        assert_eq!(lang.language_name.as_str(), "Deutsch");
    }

    #[test]
    fn test_select_codepage() {
        let mut a = LanguageEntry::default();
        a.codepage = 1251;
        let mut b = LanguageEntry::default();
        b.codepage = 1252;
        assert_eq!(select_codepage(&[], None), 1252);
        assert_eq!(select_codepage(&[a.clone()], None), 1251);
        assert_eq!(select_codepage(&[a.clone(), b], None), 1252);
        assert_eq!(select_codepage(&[a], Some(932)), 932);
    }
}
