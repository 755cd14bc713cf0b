use crate::credentials::PublicKey;

pub const SSH_DIR: &str = ".ssh";
pub const AUTHORIZED_KEYS: &str = ".ssh/authorized_keys";
pub const SSH_DIR_MODE: i32 = 0o700;

/// Whether an `authorized_keys` body already trusts `key`.
///
/// Lines may carry an options prefix (`from="...",no-pty ssh-ed25519 ...`),
/// so the key is located by its type token rather than by position.
pub fn contains_key(authorized_keys: &str, key: &PublicKey) -> bool {
    authorized_keys
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_entry)
        .any(|entry| entry.same_key(key))
}

fn parse_entry(line: &str) -> Option<PublicKey> {
    if let Some(key) = PublicKey::parse(line) {
        return Some(key);
    }
    let tokens: Vec<&str> = line.split_whitespace().collect();
    (1..tokens.len()).find_map(|start| PublicKey::parse(&tokens[start..].join(" ")))
}

pub fn read_command() -> String {
    format!("cat {AUTHORIZED_KEYS} 2>/dev/null || true")
}

/// Shell command appending `key` on its own line, adding the newline a
/// hand-edited file may be missing.
pub fn append_command(existing: &str, key: &PublicKey) -> String {
    let pattern = if existing.is_empty() || existing.ends_with('\n') {
        "%s\\n"
    } else {
        "\\n%s\\n"
    };
    format!(
        "printf '{pattern}' {} >> {AUTHORIZED_KEYS}",
        shell_words::quote(&key.to_string())
    )
}

pub fn permissions_command() -> String {
    format!("chmod 700 {SSH_DIR} && chmod 600 {AUTHORIZED_KEYS}")
}
