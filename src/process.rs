//! Owns a single child OS process (C2): start, graceful terminate with
//! escalation, recursive process-tree kill, liveness probe, exit code,
//! memory%.
//!
//! The child is launched into its own process group/session so a signal to
//! the group also reaches any helper processes it spawns. On Windows, the
//! child is assigned to a Job Object once at `start()` and held for the
//! process's whole lifetime, so the entire tree can be torn down with a
//! single `TerminateJobObject` call; if assignment fails, `kill()` falls
//! back to a Toolhelp-snapshot breadth-first walk of the process tree.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};

use crate::clock;
use crate::error::ProcessError;
use crate::system_metrics::SystemMetrics;

#[cfg(windows)]
mod windows_job {
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::JobObjects::{
        AssignProcessToJobObject, CreateJobObjectW, TerminateJobObject,
    };
    use windows::Win32::System::Threading::OpenProcess;
    use windows::Win32::System::Threading::{PROCESS_ALL_ACCESS, PROCESS_TERMINATE};

    /// Owns a Job Object the child is assigned to, so the whole process
    /// tree can be torn down with a single `TerminateJobObject` call.
    pub struct JobHandle(HANDLE);

    // SAFETY: HANDLE is just a kernel object reference; Job Objects are
    // designed to be manipulated from any thread.
    unsafe impl Send for JobHandle {}

    impl JobHandle {
        pub fn assign(pid: u32) -> windows::core::Result<JobHandle> {
            unsafe {
                let job = CreateJobObjectW(None, None)?;
                let proc_handle: HANDLE = OpenProcess(PROCESS_ALL_ACCESS, false, pid)?;
                let result = AssignProcessToJobObject(job, proc_handle);
                let _ = CloseHandle(proc_handle);
                result?;
                Ok(JobHandle(job))
            }
        }

        /// Terminate every process currently in the job (the tree).
        pub fn terminate_tree(&self) -> windows::core::Result<()> {
            unsafe { TerminateJobObject(self.0, 1) }
        }
    }

    impl Drop for JobHandle {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }

    /// Fallback used when a process could not be assigned to a Job Object
    /// (e.g. it is already a member of another job). Walks the full process
    /// table via a Toolhelp snapshot, collects every descendant of `root_pid`
    /// by breadth-first traversal of the parent-pid links, and terminates
    /// each one. A process that has already exited is treated as terminated.
    pub fn terminate_process_tree(root_pid: u32) -> windows::core::Result<()> {
        use windows::Win32::Foundation::ERROR_INVALID_PARAMETER;
        use windows::Win32::System::Diagnostics::ToolHelp::{
            CreateToolhelp32Snapshot, Process32First, Process32Next, PROCESSENTRY32,
            TH32CS_SNAPPROCESS,
        };
        use windows::Win32::System::Threading::TerminateProcess;

        unsafe {
            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)?;

            let mut entries: Vec<(u32, u32)> = Vec::new();
            let mut entry = PROCESSENTRY32 {
                dwSize: std::mem::size_of::<PROCESSENTRY32>() as u32,
                ..Default::default()
            };
            if Process32First(snapshot, &mut entry).is_ok() {
                loop {
                    entries.push((entry.th32ProcessID, entry.th32ParentProcessID));
                    entry = PROCESSENTRY32 {
                        dwSize: std::mem::size_of::<PROCESSENTRY32>() as u32,
                        ..Default::default()
                    };
                    if Process32Next(snapshot, &mut entry).is_err() {
                        break;
                    }
                }
            }
            let _ = CloseHandle(snapshot);

            let mut to_kill: Vec<u32> = vec![root_pid];
            let mut i = 0;
            while i < to_kill.len() {
                let parent = to_kill[i];
                for &(child_pid, parent_pid) in &entries {
                    if parent_pid == parent && !to_kill.contains(&child_pid) {
                        to_kill.push(child_pid);
                    }
                }
                i += 1;
            }

            for &target_pid in to_kill.iter().rev() {
                match OpenProcess(PROCESS_TERMINATE, false, target_pid) {
                    Ok(h) => {
                        let result = TerminateProcess(h, 1);
                        let _ = CloseHandle(h);
                        result?;
                    }
                    Err(e) if e.code() == ERROR_INVALID_PARAMETER.to_hresult() => {
                        // Already gone.
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }
}

struct RunningChild {
    child: Child,
    pid: u32,
    exit_code: Option<i32>,
    #[cfg(windows)]
    job: Option<windows_job::JobHandle>,
}

/// Owns a single supervised child process.
pub struct ManagedProcess {
    command: Vec<String>,
    cwd: Option<PathBuf>,
    metrics: Arc<SystemMetrics>,
    child: Mutex<Option<RunningChild>>,
}

impl ManagedProcess {
    pub fn new(command: Vec<String>, cwd: Option<PathBuf>, metrics: Arc<SystemMetrics>) -> Self {
        ManagedProcess {
            command,
            cwd,
            metrics,
            child: Mutex::new(None),
        }
    }

    /// Launch the configured command in its own process group/session.
    /// Fails with [`ProcessError::AlreadyRunning`] if a prior handle is
    /// still alive.
    pub fn start(&self) -> Result<(), ProcessError> {
        let mut guard = self.child.lock().expect("process lock poisoned");
        if let Some(running) = guard.as_mut() {
            if is_alive(&mut running.child) {
                return Err(ProcessError::AlreadyRunning);
            }
        }

        let mut cmd = build_command(&self.command, self.cwd.as_deref());
        let mut child = cmd.spawn().map_err(ProcessError::Spawn)?;
        let pid = child.id();

        // A Job Object assignment can fail if the process is already a member
        // of another job (e.g. the supervisor itself runs inside one). When
        // that happens `kill()` falls back to a Toolhelp-snapshot tree walk
        // keyed on `pid` instead of relying on a handle.
        #[cfg(windows)]
        let job = match windows_job::JobHandle::assign(pid) {
            Ok(job) => Some(job),
            Err(e) => {
                warn!(pid, error = %e, "failed to assign child to Job Object; falling back to process-tree walk on kill");
                None
            }
        };

        info!(pid, "child process started");
        *guard = Some(RunningChild {
            child,
            pid,
            exit_code: None,
            #[cfg(windows)]
            job,
        });
        Ok(())
    }

    /// Send a polite termination signal to the process group, wait up to
    /// `timeout`, then escalate to [`Self::kill`]. Idempotent; a no-op if
    /// the process is not running.
    pub fn terminate(&self, timeout: Duration) {
        if !self.is_running() {
            return;
        }

        let pid = {
            let guard = self.child.lock().expect("process lock poisoned");
            guard.as_ref().map(|r| r.pid)
        };
        let Some(pid) = pid else { return };

        info!(pid, "sending polite termination signal");
        send_polite_signal(pid);

        if clock::until(|| !self.is_running(), timeout, Duration::from_millis(200)) {
            return;
        }

        warn!(pid, "process did not exit after polite signal; escalating to kill");
        self.kill();
    }

    /// Recursively, forcibly terminate the whole process tree. Must not
    /// error on "already gone".
    pub fn kill(&self) {
        let mut guard = self.child.lock().expect("process lock poisoned");
        let Some(running) = guard.as_mut() else {
            return;
        };
        if !is_alive(&mut running.child) {
            return;
        }

        #[cfg(unix)]
        {
            // SAFETY: killpg with a valid pgid and signal is always safe;
            // ESRCH ("already gone") is treated as success.
            unsafe {
                libc::killpg(running.pid as libc::pid_t, libc::SIGKILL);
            }
        }
        #[cfg(windows)]
        {
            let result = match &running.job {
                Some(job) => job.terminate_tree(),
                None => windows_job::terminate_process_tree(running.pid),
            };
            if let Err(e) = result {
                warn!(pid = running.pid, error = %e, "failed to terminate process tree");
            }
        }

        let _ = running.child.wait();
    }

    /// True iff the handle exists and the OS reports the child has not yet
    /// exited.
    pub fn is_running(&self) -> bool {
        let mut guard = self.child.lock().expect("process lock poisoned");
        match guard.as_mut() {
            Some(running) => is_alive(&mut running.child),
            None => false,
        }
    }

    /// Last observed exit code, or `None` if the process has never
    /// finished (including: never started).
    pub fn exit_code(&self) -> Option<i32> {
        let mut guard = self.child.lock().expect("process lock poisoned");
        let running = guard.as_mut()?;
        if running.exit_code.is_none() {
            if let Ok(Some(status)) = running.child.try_wait() {
                running.exit_code = status.code();
            }
        }
        running.exit_code
    }

    /// Current RSS as a percentage of total host memory; `0.0` if no
    /// process is running.
    pub fn memory_percent(&self) -> f64 {
        let pid = {
            let mut guard = self.child.lock().expect("process lock poisoned");
            match guard.as_mut() {
                Some(running) if is_alive(&mut running.child) => Some(running.pid),
                _ => None,
            }
        };
        match pid {
            Some(pid) => self.metrics.process_memory_percent(pid),
            None => 0.0,
        }
    }
}

fn is_alive(child: &mut Child) -> bool {
    matches!(child.try_wait(), Ok(None))
}

fn build_command(command: &[String], cwd: Option<&Path>) -> Command {
    let mut cmd = Command::new(&command[0]);
    cmd.args(&command[1..]);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // New process group whose pgid equals the child's pid, so a
        // group-targeted signal also reaches any helper children it spawns.
        cmd.process_group(0);
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }

    cmd
}

#[cfg(unix)]
fn send_polite_signal(pid: u32) {
    // SAFETY: killpg with a valid pgid and signal number is always safe;
    // ESRCH ("already gone") is not an error condition for our purposes.
    unsafe {
        libc::killpg(pid as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(windows)]
fn send_polite_signal(pid: u32) {
    use windows::Win32::System::Console::{GenerateConsoleCtrlEvent, CTRL_BREAK_EVENT};
    // The process group id equals the root process id because we spawned
    // with CREATE_NEW_PROCESS_GROUP.
    unsafe {
        let _ = GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid);
    }
}

#[cfg(not(any(unix, windows)))]
fn send_polite_signal(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleepy_process() -> ManagedProcess {
        let command = if cfg!(windows) {
            vec!["cmd".to_string(), "/C".to_string(), "timeout /T 30".to_string()]
        } else {
            vec!["sleep".to_string(), "30".to_string()]
        };
        ManagedProcess::new(command, None, Arc::new(SystemMetrics::new()))
    }

    #[test]
    fn start_then_is_running_then_kill() {
        let process = sleepy_process();
        process.start().expect("start");
        assert!(process.is_running());
        process.kill();
        assert!(clock::until(
            || !process.is_running(),
            Duration::from_secs(5),
            Duration::from_millis(50)
        ));
    }

    #[test]
    fn start_twice_is_already_running() {
        let process = sleepy_process();
        process.start().expect("start");
        let err = process.start().unwrap_err();
        assert!(matches!(err, ProcessError::AlreadyRunning));
        process.kill();
    }

    #[test]
    fn terminate_on_stopped_process_is_noop() {
        let process = sleepy_process();
        process.terminate(Duration::from_millis(50));
        assert!(!process.is_running());
    }

    #[test]
    fn memory_percent_without_process_is_zero() {
        let process = sleepy_process();
        assert_eq!(process.memory_percent(), 0.0);
    }
}
