use crate::inventory::{InventoryError, Result};
use std::fmt;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// One `[name]` block. Host lists hold bare entries; `:vars` blocks hold
/// key/value entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub entries: Vec<(String, Option<String>)>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn push_bare(&mut self, key: impl Into<String>) {
        self.entries.push((key.into(), None));
    }

    pub fn push_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), Some(value.into())));
    }

    pub fn is_vars(&self) -> bool {
        self.name.ends_with(":vars")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }
}

/// Ansible INI inventory with sections kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryDocument {
    sections: Vec<Section>,
}

impl InventoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_section(&mut self, section: Section) {
        self.sections.push(section);
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Host entries of a group, in order.
    pub fn hosts(&self, group: &str) -> Vec<&str> {
        self.section(group)
            .map(|s| s.entries.iter().map(|(k, _)| k.as_str()).collect())
            .unwrap_or_default()
    }

    /// Variables of a group's `:vars` block, in order.
    pub fn vars(&self, group: &str) -> Vec<(&str, &str)> {
        self.section(&format!("{group}:vars"))
            .map(|s| {
                s.entries
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_deref().unwrap_or("")))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut document = Self::new();
        let mut current: Option<Section> = None;

        for (index, raw) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| InventoryError::InvalidIni {
                        line: line_no,
                        reason: format!("malformed section header '{line}'"),
                    })?;
                if document.section(name).is_some()
                    || current.as_ref().is_some_and(|s| s.name == name)
                {
                    return Err(InventoryError::InvalidIni {
                        line: line_no,
                        reason: format!("duplicate section '{name}'"),
                    });
                }
                if let Some(done) = current.replace(Section::new(name)) {
                    document.push_section(done);
                }
                continue;
            }

            let section = current.as_mut().ok_or_else(|| InventoryError::InvalidIni {
                line: line_no,
                reason: "entry outside of any section".to_string(),
            })?;
            match line.split_once('=') {
                Some((key, value)) => section.push_value(key.trim(), value.trim()),
                None => section.push_bare(line),
            }
        }

        if let Some(done) = current {
            document.push_section(done);
        }
        Ok(document)
    }

    /// Write the rendered document next to `path` and rename it into place,
    /// so readers see either the previous file or the complete new one.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let write_failed = |source: std::io::Error| InventoryError::WriteFailed {
            path: path.display().to_string(),
            source,
        };

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(write_failed)?;

        let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(write_failed)?;
        temp.write_all(self.render().as_bytes())
            .map_err(write_failed)?;
        temp.as_file().sync_all().map_err(write_failed)?;
        temp.persist(path).map_err(|e| write_failed(e.error))?;

        debug!(
            "Wrote inventory with {} section(s) to {}",
            self.sections.len(),
            path.display()
        );
        Ok(())
    }
}

impl fmt::Display for InventoryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "[{}]", section.name)?;
            for (key, value) in &section.entries {
                match value {
                    Some(value) => writeln!(f, "{key} = {value}")?,
                    None => writeln!(f, "{key}")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InventoryDocument {
        let mut doc = InventoryDocument::new();
        let mut all = Section::new("all");
        all.push_bare("10.0.0.1");
        doc.push_section(all);
        let mut vars = Section::new("all:vars");
        vars.push_value("ansible_user", "ansible");
        vars.push_value("ansible_ssh_common_args", "'-o StrictHostKeyChecking=no'");
        doc.push_section(vars);
        doc
    }

    #[test]
    fn test_render_layout() {
        assert_eq!(
            sample().render(),
            "[all]\n10.0.0.1\n\n[all:vars]\nansible_user = ansible\nansible_ssh_common_args = '-o StrictHostKeyChecking=no'\n\n"
        );
    }

    #[test]
    fn test_parse_rendered_output() {
        let doc = sample();
        assert_eq!(InventoryDocument::parse(&doc.render()).unwrap(), doc);
    }

    #[test]
    fn test_parse_accepts_compact_assignments_and_comments() {
        let doc = InventoryDocument::parse("; generated\n[web]\nweb-01\n[web:vars]\nansible_port=2222\n").unwrap();
        assert_eq!(doc.hosts("web"), vec!["web-01"]);
        assert_eq!(doc.vars("web"), vec![("ansible_port", "2222")]);
    }

    #[test]
    fn test_parse_rejects_orphan_entries_and_duplicates() {
        assert!(matches!(
            InventoryDocument::parse("web-01\n[web]\n"),
            Err(InventoryError::InvalidIni { line: 1, .. })
        ));
        assert!(matches!(
            InventoryDocument::parse("[web]\na\n[web]\nb\n"),
            Err(InventoryError::InvalidIni { line: 3, .. })
        ));
        assert!(InventoryDocument::parse("[broken\n").is_err());
    }

    #[test]
    fn test_write_atomic_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.ini");
        std::fs::write(&path, "stale").unwrap();

        sample().write_atomic(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, sample().render());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
