//! Fixed menu of diagnostic commands relayed to the monitored host.

/// One menu item: the chat token, the literal shell command and its menu text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    pub token: &'static str,
    pub command: &'static str,
    pub description: &'static str,
}

const fn entry(
    token: &'static str,
    command: &'static str,
    description: &'static str,
) -> CatalogEntry {
    CatalogEntry {
        token,
        command,
        description,
    }
}

pub const CATALOG: [CatalogEntry; 12] = [
    entry("/get_release", "cat /etc/os-release", "OS release"),
    entry(
        "/get_uname",
        "uname -a",
        "CPU architecture, hostname and kernel version",
    ),
    entry("/get_uptime", "uptime", "Uptime"),
    entry("/get_df", "df -h", "Filesystem usage"),
    entry("/get_free", "free -m", "Memory usage"),
    entry("/get_mpstat", "mpstat 1 5", "CPU performance"),
    entry("/get_w", "w", "Logged-in users"),
    entry("/get_auths", "last | head -n 10", "Last 10 logins"),
    entry(
        "/get_critical",
        r#"dmesg | grep -E "CRITICAL|FATAL" | head -n 5"#,
        "Last 5 critical kernel events",
    ),
    entry("/get_ps", "ps aux", "Running processes"),
    entry("/get_ss", "ss -tunap", "Sockets and used ports"),
    entry(
        "/get_apt_list",
        "apt list --installed",
        "Installed packages",
    ),
];

/// Resolve a chat token to its catalog entry.
///
/// Matching is exact after trimming and lowercasing; a Telegram `@botname`
/// suffix on the token is ignored.
pub fn lookup(token: &str) -> Option<&'static CatalogEntry> {
    let normalized = token.trim().to_lowercase();
    let normalized = normalized.split('@').next().unwrap_or("");
    CATALOG.iter().find(|e| e.token == normalized)
}

/// The menu shown by `/monitor`, one `token - description` line per entry.
pub fn menu() -> String {
    let mut out = String::from("Choose a command to run on the remote server:\n");
    for e in &CATALOG {
        out.push('\n');
        out.push_str(e.token);
        out.push_str(" - ");
        out.push_str(e.description);
    }
    out
}
