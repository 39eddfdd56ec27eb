//! Maps installer destination paths to relative output paths.
use crate::types::FilenameConfig;

/// Turns `{app}\Sub\..\File.txt` style destinations into `app/File.txt`.
pub struct FilenameMap<'a> {
    config: &'a FilenameConfig,
}

impl<'a> FilenameMap<'a> {
    pub fn new(config: &'a FilenameConfig) -> Self {
        FilenameMap { config }
    }

    /// Returns the output path for `name`, or an empty string if nothing of
    /// the path remains after normalisation.
    pub fn map(&self, name: &str) -> String {
        let expanded = if self.config.expand {
            self.expand_variables(name)
        } else {
            name.to_string()
        };
        let path = normalize(&expanded);
        if self.config.lowercase {
            path.to_lowercase()
        } else {
            path
        }
    }

    /// Replaces `{name}` and `{name:args}` constants. `{{` is a literal `{`.
    fn expand_variables(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len());
        let mut rest = name;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            rest = &rest[start + 1..];
            if let Some(stripped) = rest.strip_prefix('{') {
                out.push('{');
                rest = stripped;
                continue;
            }
            let Some(end) = find_closing(rest) else {
                // Unterminated: keep the rest as written.
                out.push('{');
                break;
            };
            let constant = &rest[..end];
            rest = &rest[end + 1..];
            out.push_str(&self.expand_constant(constant));
        }
        out.push_str(rest);
        out
    }

    fn expand_constant(&self, constant: &str) -> String {
        let key = constant
            .split([':', '|'])
            .next()
            .unwrap_or_default()
            .to_lowercase();
        if let Some(value) = self.config.variables.get(&key) {
            return value.clone();
        }
        // Environment variables and registry lookups have no useful value
        // outside of an installation.
        match key.chars().next() {
            Some('%') => key[1..].to_string(),
            Some('#') => String::new(),
            _ => key,
        }
    }
}

/// Position of the `}` matching an already consumed `{`.
fn find_closing(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Converts separators to `/` and resolves `.` and `..` segments. `..` never
/// leaves the output root.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(['\\', '/']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    parts.join("/")
}

/// Parent of a normalised path, `None` for top level entries.
pub fn parent(path: &str) -> Option<&str> {
    path.rfind('/').map(|i| &path[..i])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(lowercase: bool) -> FilenameConfig {
        FilenameConfig {
            lowercase,
            ..Default::default()
        }
    }

    #[test]
    fn test_expand_and_normalize() {
        let c = config(false);
        let map = FilenameMap::new(&c);
        assert_eq!(map.map("{app}\\Docs\\Readme.txt"), "app/Docs/Readme.txt");
        assert_eq!(map.map("{app}\\a\\..\\b\\.\\c.txt"), "app/b/c.txt");
        assert_eq!(map.map("..\\..\\x"), "x");
        assert_eq!(map.map("{code:GetDir|def}\\x"), "code/x");
        assert_eq!(map.map("{{literal}.txt"), "{literal}.txt");
        assert_eq!(map.map("{%PATH}\\y"), "path/y");
        assert_eq!(map.map(""), "");
    }

    #[test]
    fn test_lowercase_and_variables() {
        let mut c = config(true);
        c.variables.insert("app".into(), "Program".into());
        let map = FilenameMap::new(&c);
        assert_eq!(map.map("{APP}\\Sub\\File.TXT"), "program/sub/file.txt");
    }

    #[test]
    fn test_unexpanded() {
        let c = FilenameConfig {
            expand: false,
            ..Default::default()
        };
        assert_eq!(FilenameMap::new(&c).map("{app}\\x.txt"), "{app}/x.txt");
    }

    #[test]
    fn test_parent() {
        assert_eq!(parent("a/b/c"), Some("a/b"));
        assert_eq!(parent("a"), None);
    }
}
