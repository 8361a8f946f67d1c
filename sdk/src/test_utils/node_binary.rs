//! Stand-in node binaries. They only understand how they are started: the
//! working directory is the node directory and that is where the process
//! context goes.

use std::{
    fs,
    io,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

/// Publishes a process context with ports derived from its PID, then sleeps
/// until terminated.
const FAKE_NODE: &str = r#"#!/bin/sh
port=$(( 20000 + ($$ % 20000) * 2 ))
context='{"pid":%d,"uri":"http://127.0.0.1:%d","stakingAddress":"127.0.0.1:%d"}'
printf "$context" "$$" "$port" "$((port + 1))" > process.json.tmp
mv process.json.tmp process.json
exec sleep 3600
"#;

const FAILING_NODE: &str = "#!/bin/sh\necho 'failed to load config' >&2\nexit 1\n";

/// Never publishes a process context. Leaves its PID in `node.pid`.
const SILENT_NODE: &str = "#!/bin/sh\necho $$ > node.pid\nexec sleep 3600\n";

/// File where the node from [`write_silent_node_binary`] records its PID.
pub const SILENT_NODE_PID_FILE: &str = "node.pid";

fn write_script(dir: &Path, name: &str, content: &str) -> io::Result<PathBuf> {
    let path = dir.join(name);

    fs::write(&path, content)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;

    Ok(path)
}

/// Write a fake node binary into `dir` and return its path.
pub fn write_fake_node_binary(dir: &Path) -> io::Result<PathBuf> {
    write_script(dir, "fake-node", FAKE_NODE)
}

/// Write a node binary that exits with an error right away.
pub fn write_failing_node_binary(dir: &Path) -> io::Result<PathBuf> {
    write_script(dir, "failing-node", FAILING_NODE)
}

/// Write a node binary that keeps running without ever publishing a process
/// context.
pub fn write_silent_node_binary(dir: &Path) -> io::Result<PathBuf> {
    write_script(dir, "silent-node", SILENT_NODE)
}
