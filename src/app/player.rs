use std::io;
use std::process::{Child, Command as ProcessCommand, Stdio};

use log::{debug, info, warn};
use thiserror::Error;

#[cfg(unix)]
use std::os::unix::process::CommandExt;

use crate::config::PlayerConfig;

#[derive(Debug, Error)]
pub(crate) enum PlayerError {
    #[error("no audio source loaded")]
    NoSource,
    #[error("no player command configured")]
    NotConfigured,
    #[error("failed to launch {command}: {source}")]
    Spawn { command: String, source: io::Error },
    #[error("failed to signal player process: {0}")]
    Signal(io::Error),
    #[cfg(not(unix))]
    #[error("pausing is not supported on this platform")]
    Unsupported,
}

/// The audio device the search core commands. It never reads state back beyond the
/// source it is currently set to.
pub(crate) trait PlaybackDevice {
    fn load(&mut self, source: &str) -> Result<(), PlayerError>;
    fn seek(&mut self, seconds: f64) -> Result<(), PlayerError>;
    fn play(&mut self) -> Result<(), PlayerError>;
    fn pause(&mut self) -> Result<(), PlayerError>;
    fn stop(&mut self);
    fn current_source(&self) -> Option<&str>;
}

/// Runs a command-line media player in the background, one process per cue.
///
/// Seeking restarts the process at the new offset. Pause and resume stop and continue
/// the process.
pub(crate) struct ExternalPlayer {
    command: String,
    args: Vec<String>,
    source: Option<String>,
    start_seconds: f64,
    child: Option<Child>,
}

impl ExternalPlayer {
    pub(crate) fn from_config(config: &PlayerConfig) -> Self {
        Self {
            command: config.command.trim().to_string(),
            args: config.args.clone(),
            source: None,
            start_seconds: 0.0,
            child: None,
        }
    }

    fn is_running(&mut self) -> bool {
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(None)) => true,
            Some(Ok(Some(status))) => {
                debug!("player exited with {status}");
                self.child = None;
                false
            }
            Some(Err(err)) => {
                warn!("failed to poll player process: {err}");
                self.child = None;
                false
            }
            None => false,
        }
    }

    fn spawn(&mut self) -> Result<(), PlayerError> {
        let source = self.source.clone().ok_or(PlayerError::NoSource)?;
        if self.command.is_empty() {
            return Err(PlayerError::NotConfigured);
        }
        let args = render_args(&self.args, &source, self.start_seconds);

        let mut cmd = ProcessCommand::new(&self.command);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|source| PlayerError::Spawn {
            command: self.command.clone(),
            source,
        })?;
        info!(
            "started {} (pid {}) at {:.2}s",
            self.command,
            child.id(),
            self.start_seconds
        );
        self.child = Some(child);
        Ok(())
    }

    fn kill_child(&mut self) {
        if let Some(mut child) = self.child.take() {
            #[cfg(unix)]
            let _ = signal_child(&child, libc::SIGCONT);
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl PlaybackDevice for ExternalPlayer {
    fn load(&mut self, source: &str) -> Result<(), PlayerError> {
        if self.source.as_deref() != Some(source) {
            self.kill_child();
            self.source = Some(source.to_string());
        }
        self.start_seconds = 0.0;
        Ok(())
    }

    fn seek(&mut self, seconds: f64) -> Result<(), PlayerError> {
        self.start_seconds = seconds.max(0.0);
        if self.is_running() {
            self.kill_child();
            self.spawn()?;
        }
        Ok(())
    }

    fn play(&mut self) -> Result<(), PlayerError> {
        if self.is_running() {
            return resume_child(self.child.as_ref());
        }
        self.spawn()
    }

    fn pause(&mut self) -> Result<(), PlayerError> {
        if !self.is_running() {
            return Ok(());
        }
        pause_child(self.child.as_ref())
    }

    fn stop(&mut self) {
        self.kill_child();
        self.source = None;
        self.start_seconds = 0.0;
    }

    fn current_source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

impl Drop for ExternalPlayer {
    fn drop(&mut self) {
        self.kill_child();
    }
}

/// Fills `{source}` and `{start}` placeholders. The source is appended when no
/// argument mentions it.
pub(crate) fn render_args(templates: &[String], source: &str, start_seconds: f64) -> Vec<String> {
    let start = format!("{start_seconds:.2}");
    let mut mentions_source = false;
    let mut args: Vec<String> = templates
        .iter()
        .map(|template| {
            mentions_source |= template.contains("{source}");
            template
                .replace("{source}", source)
                .replace("{start}", &start)
        })
        .collect();
    if !mentions_source {
        args.push(source.to_string());
    }
    args
}

#[cfg(unix)]
fn signal_child(child: &Child, signal: libc::c_int) -> Result<(), PlayerError> {
    let pid = child.id() as libc::pid_t;
    if unsafe { libc::kill(pid, signal) } != 0 {
        return Err(PlayerError::Signal(io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(unix)]
fn pause_child(child: Option<&Child>) -> Result<(), PlayerError> {
    match child {
        Some(child) => signal_child(child, libc::SIGSTOP),
        None => Ok(()),
    }
}

#[cfg(unix)]
fn resume_child(child: Option<&Child>) -> Result<(), PlayerError> {
    match child {
        Some(child) => signal_child(child, libc::SIGCONT),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn pause_child(_child: Option<&Child>) -> Result<(), PlayerError> {
    Err(PlayerError::Unsupported)
}

#[cfg(not(unix))]
fn resume_child(_child: Option<&Child>) -> Result<(), PlayerError> {
    Ok(())
}
