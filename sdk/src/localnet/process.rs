//! OS process control for node processes.
//!
//! A node publishes a small process context file once it is up. The presence
//! of that file together with the liveness of the PID inside it is the only
//! signal that a node is running.

use {
    super::error::{LocalnetError, LocalnetResult},
    log::debug,
    nix::{
        errno::Errno,
        sys::signal::{kill, Signal},
        unistd::Pid,
    },
    serde::{Deserialize, Serialize},
    std::{
        fs::OpenOptions,
        io,
        os::unix::process::CommandExt,
        path::Path,
        process::Stdio,
        time::Duration,
    },
    tokio::{process::Child, time::Instant},
};

pub const PROCESS_CONTEXT_FILE: &str = "process.json";

/// Written by the node itself on successful start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessContext {
    pub pid: u32,
    pub uri: String,
    pub staking_address: String,
}

fn nix_pid(pid: u32) -> Option<Pid> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Some(Pid::from_raw(raw)),
        _ => None,
    }
}

/// Whether `pid` names a live process. Signal 0 probes without delivering.
pub fn is_process_alive(pid: u32) -> bool {
    let Some(pid) = nix_pid(pid) else {
        return false;
    };

    match kill(pid, None) {
        Ok(()) => !is_zombie(pid),
        // Exists but belongs to someone else.
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: Pid) -> bool {
    // The state is the first field after the parenthesized command name.
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            stat.rsplit_once(')')
                .map(|(_, rest)| rest.trim_start().starts_with('Z'))
        })
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: Pid) -> bool {
    false
}

/// Read the process context of the node living in `node_dir`.
///
/// A missing file means the node is not running. A file whose PID is dead is
/// stale: it is removed and the node is reported as not running. An
/// unparsable file, usually one the node is still writing, also reads as not
/// running but is left alone.
pub async fn read_process_context(
    node_dir: &Path,
) -> LocalnetResult<Option<ProcessContext>> {
    let path = node_dir.join(PROCESS_CONTEXT_FILE);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LocalnetError::io("read", &path)(e)),
    };

    let context: ProcessContext = match serde_json::from_slice(&bytes) {
        Ok(context) => context,
        Err(e) => {
            debug!("Ignoring unreadable process context '{}': {e}", path.display());

            return Ok(None);
        }
    };

    if is_process_alive(context.pid) {
        return Ok(Some(context));
    }

    debug!(
        "Removing stale process context of pid {} at '{}'",
        context.pid,
        path.display()
    );

    remove_process_context(node_dir).await?;

    Ok(None)
}

pub async fn remove_process_context(node_dir: &Path) -> LocalnetResult<()> {
    let path = node_dir.join(PROCESS_CONTEXT_FILE);

    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LocalnetError::io("remove", &path)(e)),
    }
}

/// Spawn `binary --config-file=<flags_file>` in its own process group, with
/// `node_dir` as working directory and output appended to `log_file`.
pub fn spawn_node(
    binary: &Path,
    node_dir: &Path,
    flags_file: &Path,
    log_file: &Path,
) -> io::Result<Child> {
    let log = OpenOptions::new().create(true).append(true).open(log_file)?;

    let mut command = std::process::Command::new(binary);

    command
        .arg(format!("--config-file={}", flags_file.display()))
        .current_dir(node_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log.try_clone()?))
        .stderr(Stdio::from(log))
        // Keep the node alive when the parent's terminal goes away.
        .process_group(0);

    tokio::process::Command::from(command).spawn()
}

/// Ask `pid` to exit gracefully. Already dead processes are fine.
pub fn terminate(pid: u32) -> io::Result<()> {
    let Some(pid) = nix_pid(pid) else {
        return Ok(());
    };

    match kill(pid, Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(io::Error::from(e)),
    }
}

/// Poll until every pid in `pids` is gone or `deadline` passes. Returns the
/// pids still alive.
pub async fn wait_for_exit(pids: &[u32], deadline: Instant, interval: Duration) -> Vec<u32> {
    loop {
        let alive = pids
            .iter()
            .copied()
            .filter(|pid| is_process_alive(*pid))
            .collect::<Vec<_>>();

        if alive.is_empty() || Instant::now() >= deadline {
            return alive;
        }

        tokio::time::sleep_until(std::cmp::min(Instant::now() + interval, deadline)).await;
    }
}

#[cfg(test)]
mod tests {
    use {super::*, tempfile::tempdir};

    #[test]
    fn test_own_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
        assert!(!is_process_alive(0));
        assert!(!is_process_alive(u32::MAX));
    }

    #[tokio::test]
    async fn test_missing_context_is_not_running() {
        let dir = tempdir().unwrap();

        assert_eq!(read_process_context(dir.path()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_half_written_context_is_not_running() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(PROCESS_CONTEXT_FILE), b"{").unwrap();

        assert_eq!(read_process_context(dir.path()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_live_context_is_returned() {
        let dir = tempdir().unwrap();
        let context = ProcessContext {
            pid: std::process::id(),
            uri: "http://127.0.0.1:9650".into(),
            staking_address: "127.0.0.1:9651".into(),
        };
        std::fs::write(
            dir.path().join(PROCESS_CONTEXT_FILE),
            serde_json::to_vec(&context).unwrap(),
        )
        .unwrap();

        assert_eq!(
            read_process_context(dir.path()).await.unwrap(),
            Some(context)
        );
    }

    #[tokio::test]
    async fn test_dead_context_is_removed() {
        let dir = tempdir().unwrap();
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        std::fs::write(
            dir.path().join(PROCESS_CONTEXT_FILE),
            format!(r#"{{"pid":{pid},"uri":"","stakingAddress":""}}"#),
        )
        .unwrap();

        assert_eq!(read_process_context(dir.path()).await.unwrap(), None);
        assert!(!dir.path().join(PROCESS_CONTEXT_FILE).exists());
    }

    #[tokio::test]
    async fn test_terminate_and_wait() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        terminate(pid).unwrap();
        let _ = child.wait().await;

        let alive = wait_for_exit(
            &[pid],
            Instant::now() + Duration::from_secs(5),
            Duration::from_millis(20),
        )
        .await;

        assert!(alive.is_empty());
    }
}
