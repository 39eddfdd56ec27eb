use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Finds a file in `dir` whose name equals `name` ignoring ASCII case.
pub fn find_case_insensitive(dir: &Path, name: &str) -> io::Result<Vec<PathBuf>> {
    let mut result = Vec::new();
    if !dir.is_dir() {
        return Ok(result);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if file_name.to_string_lossy().eq_ignore_ascii_case(name) {
            result.push(entry.path());
        }
    }
    result.sort();
    Ok(result)
}

/// Expands the command line inputs: files are kept, directories are
/// searched for `.exe` files.
pub fn collect_inputs(inputs: &[String], recursive: bool) -> io::Result<Vec<PathBuf>> {
    let mut result = Vec::new();
    for input in inputs {
        let path = PathBuf::from(input);
        if path.is_dir() {
            find_installers(&path, recursive, &mut result)?;
        } else {
            result.push(path);
        }
    }
    Ok(result)
}

fn find_installers(dir: &Path, recursive: bool, result: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        if path.is_file() {
            if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
            {
                result.push(path);
            }
        } else if recursive && path.is_dir() {
            find_installers(&path, recursive, result)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("SETUP-1.BIN"), b"x").unwrap();
        fs::write(dir.path().join("other.bin"), b"x").unwrap();
        let found = find_case_insensitive(dir.path(), "setup-1.bin").unwrap();
        assert_eq!(found, vec![dir.path().join("SETUP-1.BIN")]);
        assert!(find_case_insensitive(dir.path(), "setup-2.bin")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_collect_inputs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.exe"), b"x").unwrap();
        fs::write(dir.path().join("b.txt"), b"x").unwrap();
        fs::write(dir.path().join("sub").join("c.EXE"), b"x").unwrap();
        let input = vec![dir.path().to_string_lossy().into_owned()];
        assert_eq!(collect_inputs(&input, false).unwrap().len(), 1);
        assert_eq!(collect_inputs(&input, true).unwrap().len(), 2);
    }
}
