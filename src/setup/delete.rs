use super::entry::{Conditions, LoadEntry};
use super::reader::LoadContext;
use crate::error::Result;
use crate::ext::io::*;
use crate::inno_version;
use std::io::Read;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeleteTarget {
    #[default]
    Files,
    FilesAndSubdirs,
    DirIfEmpty,
}

const DELETE_TARGETS: &[DeleteTarget] = &[
    DeleteTarget::Files,
    DeleteTarget::FilesAndSubdirs,
    DeleteTarget::DirIfEmpty,
];

/// `[InstallDelete]` and `[UninstallDelete]` records.
#[derive(Clone, Debug, Default)]
pub struct DeleteEntry {
    pub name: String,
    pub conditions: Conditions,
    pub target: DeleteTarget,
}

impl LoadEntry for DeleteEntry {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &mut LoadContext) -> Result<Self> {
        if ctx.before(inno_version!(1, 3, 0)) {
            reader.read_u32()?;
        }
        let name = ctx.read_string(reader)?;
        let mut conditions = Conditions::load(reader, ctx)?;
        conditions.load_winver(reader, ctx)?;
        let target = ctx.read_enum(reader, DELETE_TARGETS, "delete type")?;
        Ok(DeleteEntry {
            name,
            conditions,
            target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::entry::tests::{ctx, push_str};

    #[test]
    fn test_delete_entry() {
        let mut data = Vec::new();
        for s in ["{app}\\cache", "", "", "", "", "", ""] {
            push_str(&mut data, s);
        }
        data.extend_from_slice(&[0u8; 20]);
        data.push(1);
        let mut r = &data[..];
        let d = DeleteEntry::load(&mut r, &mut ctx(inno_version!(5, 5, 0))).unwrap();
        assert!(r.is_empty());
        assert_eq!(d.target, DeleteTarget::FilesAndSubdirs);
    }
}
