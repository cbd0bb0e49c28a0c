//! Scripted player executables for supervision tests

use std::path::{Path, PathBuf};

/// Write an executable script that appends its argument list to `log`
/// (one line per invocation) and exits with `exit_code`
pub fn logging_stub(dir: &Path, log: &Path, exit_code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("stub-player");
    let body = format!(
        "#!/bin/sh\necho \"$@\" >> '{}'\nexit {}\n",
        log.display(),
        exit_code
    );
    std::fs::write(&path, body).expect("write stub player");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod stub player");
    path
}

/// Invocation lines recorded by a [`logging_stub`], oldest first
pub fn read_invocations(log: &Path) -> Vec<String> {
    std::fs::read_to_string(log)
        .map(|content| content.lines().map(String::from).collect())
        .unwrap_or_default()
}
