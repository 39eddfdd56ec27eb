//! Custom messages and access control lists.
use super::entry::LoadEntry;
use super::reader::{LoadContext, read_binary};
use crate::error::Result;
use crate::ext::io::*;
use crate::utils::encoding::decode_codepage;
use std::io::Read;

#[derive(Clone, Debug, Default)]
pub struct MessageEntry {
    pub name: String,
    pub value: String,
    /// Language index, or negative if the message applies to all languages.
    pub language: i32,
}

impl LoadEntry for MessageEntry {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &mut LoadContext) -> Result<Self> {
        let name = ctx.read_string(reader)?;
        let raw = read_binary(reader)?;
        let language = reader.read_i32()?;
        if language >= 0 && language as usize >= ctx.language_codepages.len() {
            ctx.warn(format!("message {} references unknown language {}", name, language));
        }
        let value = decode_codepage(ctx.language_codepage(language), &raw);
        Ok(MessageEntry {
            name,
            value,
            language,
        })
    }
}

/// A serialized security descriptor.
#[derive(Clone, Debug, Default)]
pub struct PermissionEntry {
    pub permissions: Vec<u8>,
}

impl LoadEntry for PermissionEntry {
    fn load<R: Read + ?Sized>(reader: &mut R, _ctx: &mut LoadContext) -> Result<Self> {
        Ok(PermissionEntry {
            permissions: read_binary(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inno_version;
    use crate::setup::entry::tests::{ctx, push_str};

    #[test]
    fn test_message_uses_language_codepage() {
        let mut data = Vec::new();
        push_str(&mut data, "Hello");
        data.extend_from_slice(&[1, 0, 0, 0, 0xe4]);
        data.extend_from_slice(&1i32.to_le_bytes());
        let mut c = ctx(inno_version!(5, 1, 0));
        c.language_codepages = vec![1252, 1251];
        let m = MessageEntry::load(&mut &data[..], &mut c).unwrap();
        assert_eq!(m.value, "д");
        assert!(c.warnings.is_empty());

        c.language_codepages.truncate(1);
        MessageEntry::load(&mut &data[..], &mut c).unwrap();
        assert_eq!(c.warnings.len(), 1);
    }
}
