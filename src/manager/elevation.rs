//! Privilege elevation for sessions that log in as an unprivileged user.
//!
//! Slave hosts are reached through a non-root login, so every command on such a
//! session is wrapped with `sudo` before it is sent.

/// Wraps a command for execution with sudo privileges.
///
/// Without a password `sudo -n` is used so a password prompt fails fast instead
/// of hanging the channel. With a password it is piped through `printf` into
/// `sudo -S`.
///
/// ```
/// use ssh_manager::manager::elevation::wrap_sudo_command;
///
/// assert_eq!(wrap_sudo_command("uptime", None), "sudo -n sh -c 'uptime'");
/// assert_eq!(
///     wrap_sudo_command("uptime", Some("pw")),
///     "printf '%s\\n' 'pw' | sudo -p \"\" -S sh -c 'uptime'"
/// );
/// ```
pub fn wrap_sudo_command(command: &str, password: Option<&str>) -> String {
    let escaped_command = escape_for_shell(command);

    match password.filter(|p| !p.is_empty()) {
        None => format!("sudo -n sh -c '{}'", escaped_command),
        Some(pwd) => format!(
            "printf '%s\\n' '{}' | sudo -p \"\" -S sh -c '{}'",
            escape_for_shell(pwd),
            escaped_command
        ),
    }
}

/// Escapes a string for use inside single quotes in a POSIX shell.
pub fn escape_for_shell(s: &str) -> String {
    s.replace('\'', "'\"'\"'")
}

/// Quotes a path as a single shell word.
pub(crate) fn quote_path(path: &str) -> String {
    format!("'{}'", escape_for_shell(path))
}
