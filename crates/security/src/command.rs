//! Screening of shell commands before they reach a subprocess.

/// Fragments that are refused outright, regardless of the permission mode.
pub const BLOCKED_FRAGMENTS: &[&str] = &[
    "rm -rf /",
    "rm -rf /*",
    "dd if=/dev/zero",
    "mkfs",
    ":(){ :|:& };:",
    "> /dev/sda",
    "chmod -R 777 /",
];

/// A command matched the blocklist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("command blocked for safety: contains '{fragment}'")]
pub struct CommandBlocked {
    pub fragment: &'static str,
}

/// Reject commands containing a known destructive fragment. Matching
/// ignores case and runs of whitespace.
pub fn check_command(command: &str) -> Result<(), CommandBlocked> {
    let raw = command.to_lowercase();
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    for &fragment in BLOCKED_FRAGMENTS {
        let needle = fragment.to_lowercase();
        if normalized.contains(&needle) || raw.contains(&needle) {
            return Err(CommandBlocked { fragment });
        }
    }
    Ok(())
}
