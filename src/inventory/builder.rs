use crate::inventory::{load_hosts_file, InventoryDocument, InventoryError, Result, Section};
use crate::types::{ConnectionProfile, Host, HostClass, KeyPair};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn, Span};

/// Hosts per class. Iteration follows `HostClass` order, which is the order
/// groups are rendered in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedHosts {
    groups: BTreeMap<HostClass, Vec<Host>>,
}

impl GroupedHosts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: HostClass, hosts: Vec<Host>) {
        self.groups.insert(class, hosts);
    }

    pub fn with(mut self, class: HostClass, hosts: Vec<Host>) -> Self {
        self.insert(class, hosts);
        self
    }

    pub fn get(&self, class: HostClass) -> &[Host] {
        self.groups.get(&class).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HostClass, &[Host])> {
        self.groups.iter().map(|(class, hosts)| (*class, hosts.as_slice()))
    }

    pub fn host_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Load each class from its host-list file. Every file is checked before
    /// any is read.
    pub fn from_files(sources: &[(HostClass, PathBuf)]) -> Result<Self> {
        if let Some((_, missing)) = sources.iter().find(|(_, path)| !path.is_file()) {
            return Err(InventoryError::MissingHostsFile {
                path: missing.display().to_string(),
            });
        }

        let mut grouped = Self::new();
        for (class, path) in sources {
            grouped.insert(*class, load_hosts_file(path)?);
        }
        Ok(grouped)
    }
}

/// Connection profiles per class.
#[derive(Debug, Clone, Default)]
pub struct ProfileSet {
    profiles: BTreeMap<HostClass, ConnectionProfile>,
}

impl ProfileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class: HostClass, profile: ConnectionProfile) {
        self.profiles.insert(class, profile);
    }

    pub fn get(&self, class: HostClass) -> Option<&ConnectionProfile> {
        self.profiles.get(&class)
    }

    /// ssh profiles for UNIX and SSH, winrm for WINDOWS.
    pub fn standard(user: &str, password: &str, port: u16, key_pair: Option<&KeyPair>) -> Self {
        let mut set = Self::new();
        for class in [HostClass::Unix, HostClass::Ssh] {
            set.register(
                class,
                ConnectionProfile::ssh(user, password, port, key_pair.cloned()),
            );
        }
        set.register(
            HostClass::Windows,
            ConnectionProfile::winrm(user, password, port),
        );
        set
    }

    /// A single ssh profile applied to the flat `all` group.
    pub fn flat(user: &str, password: &str, port: u16, key_pair: Option<&KeyPair>) -> Self {
        let mut set = Self::new();
        set.register(
            HostClass::All,
            ConnectionProfile::ssh(user, password, port, key_pair.cloned()),
        );
        set
    }
}

/// Builds the grouped inventory document.
///
/// Layout: `[all]`, one host list per non-empty class, `[all:vars]`, then
/// one `:vars` block per non-empty class with a registered profile. `all`
/// and `all:vars` are always present so other tooling can extend them.
pub struct InventoryBuilder {
    span: Span,
}

impl Default for InventoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryBuilder {
    pub fn new() -> Self {
        Self {
            span: info_span!("inventory"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn build(&self, grouped: &GroupedHosts, profiles: &ProfileSet) -> InventoryDocument {
        let _guard = self.span.enter();
        let mut document = InventoryDocument::new();

        let mut all = Section::new(HostClass::All.group_name());
        for host in grouped.get(HostClass::All) {
            all.push_bare(host.address());
        }
        document.push_section(all);

        let populated: Vec<(HostClass, &[Host])> = grouped
            .iter()
            .filter(|(class, hosts)| *class != HostClass::All && !hosts.is_empty())
            .collect();

        for (class, hosts) in &populated {
            let mut section = Section::new(class.group_name());
            for host in hosts.iter() {
                section.push_bare(host.address());
            }
            document.push_section(section);
        }

        let mut all_vars = Section::new(HostClass::All.vars_section());
        if let Some(profile) = profiles.get(HostClass::All) {
            push_profile(&mut all_vars, profile);
        }
        document.push_section(all_vars);

        for (class, _) in &populated {
            match profiles.get(*class) {
                Some(profile) => {
                    let mut section = Section::new(class.vars_section());
                    push_profile(&mut section, profile);
                    document.push_section(section);
                }
                None => warn!("No connection profile registered for group {}", class),
            }
        }

        for (class, _) in grouped.iter().filter(|(_, hosts)| hosts.is_empty()) {
            debug!("Group {} has no hosts, omitting it", class);
        }

        document
    }

    /// Build from host-list files and write the result atomically to
    /// `inventory_path`.
    pub fn generate(
        &self,
        sources: &[(HostClass, PathBuf)],
        profiles: &ProfileSet,
        inventory_path: &Path,
    ) -> Result<InventoryDocument> {
        let grouped = GroupedHosts::from_files(sources)?;
        let document = self.build(&grouped, profiles);
        document.write_atomic(inventory_path)?;

        self.span.in_scope(|| {
            info!(
                "Created inventory file: {} ({} host(s))",
                inventory_path.display(),
                grouped.host_count()
            )
        });
        Ok(document)
    }
}

fn push_profile(section: &mut Section, profile: &ConnectionProfile) {
    for (key, value) in profile.variables() {
        section.push_value(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(names: &[&str]) -> Vec<Host> {
        names.iter().map(|n| Host::new(*n)).collect()
    }

    #[test]
    fn test_section_order() {
        let grouped = GroupedHosts::new()
            .with(HostClass::Ssh, hosts(&["s1"]))
            .with(HostClass::Unix, hosts(&["u1"]))
            .with(HostClass::Windows, hosts(&["w1"]));
        let profiles = ProfileSet::standard("ansible", "pw", 22, None);

        let doc = InventoryBuilder::new().build(&grouped, &profiles);
        assert_eq!(
            doc.section_names(),
            vec![
                "all",
                "UNIX",
                "WINDOWS",
                "SSH",
                "all:vars",
                "UNIX:vars",
                "WINDOWS:vars",
                "SSH:vars"
            ]
        );
    }

    #[test]
    fn test_empty_groups_are_omitted_but_anchors_remain() {
        let grouped = GroupedHosts::new()
            .with(HostClass::Unix, Vec::new())
            .with(HostClass::Windows, hosts(&["w1"]));
        let profiles = ProfileSet::standard("ansible", "pw", 22, None);

        let doc = InventoryBuilder::new().build(&grouped, &profiles);
        assert_eq!(
            doc.section_names(),
            vec!["all", "WINDOWS", "all:vars", "WINDOWS:vars"]
        );
        assert!(doc.section("all").unwrap().entries.is_empty());
        assert!(doc.section("all:vars").unwrap().entries.is_empty());
    }

    #[test]
    fn test_flat_profile_fills_all_vars() {
        let keys = KeyPair::from_private_key("/keys/ansible_key");
        let grouped = GroupedHosts::new().with(HostClass::All, hosts(&["a", "b"]));
        let profiles = ProfileSet::flat("ansible", "ansible", 2222, Some(&keys));

        let doc = InventoryBuilder::new().build(&grouped, &profiles);
        assert_eq!(doc.section_names(), vec!["all", "all:vars"]);
        assert_eq!(doc.hosts("all"), vec!["a", "b"]);
        assert_eq!(
            doc.section("all:vars").unwrap().get("ansible_ssh_public_key_file"),
            Some("/keys/ansible_key.pub")
        );
        assert_eq!(doc.section("all:vars").unwrap().get("ansible_port"), Some("2222"));
    }

    #[test]
    fn test_group_without_profile_has_no_vars() {
        let grouped = GroupedHosts::new().with(HostClass::Unix, hosts(&["u1"]));
        let doc = InventoryBuilder::new().build(&grouped, &ProfileSet::new());
        assert_eq!(doc.section_names(), vec!["all", "UNIX", "all:vars"]);
    }

    #[test]
    fn test_from_files_fails_before_reading_when_any_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let unix = dir.path().join("unix.txt");
        std::fs::write(&unix, "u1\n").unwrap();

        let err = GroupedHosts::from_files(&[
            (HostClass::Unix, unix),
            (HostClass::Windows, dir.path().join("win.txt")),
        ])
        .unwrap_err();
        match err {
            InventoryError::MissingHostsFile { path } => assert!(path.ends_with("win.txt")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
