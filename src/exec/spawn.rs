//! Session process spawning from a decoded launch profile
//!
//! The launched process receives exactly the profile's executable, args,
//! environment, and stdin data. The password never reaches any of them.

use crate::config::types::{LaunchError, Result};
use crate::kernel::fork::ChildActivity;
#[cfg(target_os = "linux")]
use crate::kernel::rlimits::LimitPlan;
use crate::profile::launch::{SessionLaunchProfile, StdStreamBehavior};
use std::io::Write;
#[cfg(target_os = "linux")]
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Mutex;
use std::thread;

fn to_launch_error(prefix: &str, err: impl std::fmt::Display) -> LaunchError {
    LaunchError::Process(format!("{prefix}: {err}"))
}

fn stdio_for(behavior: StdStreamBehavior) -> Stdio {
    match behavior {
        StdStreamBehavior::Inherit => Stdio::inherit(),
        StdStreamBehavior::Capture => Stdio::piped(),
        StdStreamBehavior::Null => Stdio::null(),
    }
}

/// Whether `text` carries `password` as a standalone token or as the value
/// of a `key=value` token.
///
/// Tokens are split on whitespace and quotes so a short password does not
/// match inside unrelated words (`-` in `--flag`). A password that itself
/// contains whitespace cannot be tokenized and falls back to a substring match.
fn reveals_password(text: &str, password: &str) -> bool {
    if password.chars().any(char::is_whitespace) {
        return text.contains(password);
    }
    text.split(|c: char| c.is_whitespace() || c == '\'' || c == '"')
        .any(|token| {
            token == password
                || token
                    .split_once('=')
                    .is_some_and(|(_, value)| value == password)
        })
}

/// Reject a profile whose plaintext password appears in argv, environment,
/// or the data fed to stdin
fn ensure_password_not_exposed(profile: &SessionLaunchProfile) -> Result<()> {
    let password = profile.password.as_str();
    if password.is_empty() {
        return Ok(());
    }
    let config = &profile.config;
    let in_args = config.args.iter().any(|arg| reveals_password(arg, password));
    let in_env = config.environment.iter().any(|(key, value)| {
        reveals_password(key, password) || reveals_password(value, password)
    });
    let in_stdin = reveals_password(&config.std_input, password);
    if in_args || in_env || in_stdin {
        return Err(LaunchError::PlaintextPassword);
    }
    Ok(())
}

/// Build the command for a session. Limits are applied in the child
/// between fork and exec.
pub fn build_command(profile: &SessionLaunchProfile, strict_limits: bool) -> Result<Command> {
    if profile.executable_path.is_empty() {
        return Err(LaunchError::Config("Profile has no executable path".to_string()));
    }
    ensure_password_not_exposed(profile)?;

    let mut command = Command::new(&profile.executable_path);
    command
        .args(&profile.config.args)
        .env_clear()
        .envs(&profile.config.environment)
        .stdout(stdio_for(profile.config.std_stream_behavior))
        .stderr(stdio_for(profile.config.std_stream_behavior));

    if profile.config.std_input.is_empty() {
        command.stdin(Stdio::null());
    } else {
        command.stdin(Stdio::piped());
    }

    #[cfg(target_os = "linux")]
    {
        let plan = LimitPlan::from_limits(&profile.config.limits)?;
        if !plan.is_empty() {
            unsafe {
                command.pre_exec(move || plan.apply_in_child(strict_limits));
            }
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = strict_limits;
        log::warn!("Resource limits are not applied on this platform");
    }

    Ok(command)
}

/// A running session process
pub struct SessionChild {
    child: Child,
    stdin_writer: Option<thread::JoinHandle<std::io::Result<()>>>,
}

impl SessionChild {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Wait for exit, collecting stdout/stderr when they were captured
    pub fn wait_with_output(mut self) -> Result<std::process::Output> {
        let writer = self.stdin_writer.take();
        let output = self
            .child
            .wait_with_output()
            .map_err(|e| to_launch_error("failed to wait for session", e))?;
        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                // The session may exit without draining stdin.
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => log::warn!("Writing session stdin failed: {}", e),
                Err(_) => log::warn!("Session stdin writer panicked"),
            }
        }
        Ok(output)
    }

    pub fn into_child(self) -> Child {
        self.child
    }
}

/// Spawn a session process and start feeding its stdin data
pub fn spawn_session(profile: &SessionLaunchProfile, strict_limits: bool) -> Result<SessionChild> {
    let mut command = build_command(profile, strict_limits)?;
    let mut child = command
        .spawn()
        .map_err(|e| to_launch_error(&format!("failed to spawn {}", profile.executable_path), e))?;

    let stdin_writer = child.stdin.take().map(|mut stdin| {
        let data = profile.config.std_input.clone().into_bytes();
        thread::spawn(move || {
            stdin.write_all(&data)?;
            stdin.flush()
        })
    });

    log::info!(
        "Spawned session {} for {} (pid {})",
        profile.executable_path,
        profile.context.username,
        child.id()
    );

    Ok(SessionChild {
        child,
        stdin_writer,
    })
}

/// Tracks spawned sessions so the host can tell whether any are still running
#[derive(Default)]
pub struct ChildRegistry {
    children: Mutex<Vec<Child>>,
}

impl ChildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, child: Child) -> u32 {
        let pid = child.id();
        self.lock().push(child);
        pid
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Child>> {
        self.children
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reap exited children and return how many are still running
    pub fn active_count(&self) -> usize {
        let mut children = self.lock();
        children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                log::debug!("Session {} exited: {}", child.id(), status);
                false
            }
            Ok(None) => true,
            // Reaped by someone else: nothing left to collect.
            Err(e) if e.raw_os_error() == Some(libc::ECHILD) => {
                log::warn!("Session {} was reaped outside the registry", child.id());
                false
            }
            // Possibly still unreaped; keep it so `wait_all` collects it.
            Err(e) => {
                log::warn!("Failed to poll session {}: {}", child.id(), e);
                true
            }
        });
        children.len()
    }

    /// Block until every registered child has exited
    pub fn wait_all(&self) -> Result<Vec<ExitStatus>> {
        let children: Vec<Child> = std::mem::take(&mut *self.lock());
        children
            .into_iter()
            .map(|mut child| child.wait().map_err(LaunchError::from))
            .collect()
    }
}

impl ChildActivity for ChildRegistry {
    fn has_active_children(&self) -> bool {
        self.active_count() > 0
    }
}
