// Copyright © 2022 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Launching a real SUT and exposing its serial console as a
//! [`ConsoleStream`].
//!
//! The boot collaborator is the `run.py` launcher script; we only hand it the
//! machine selection and the ordered module list, it assembles the bootable
//! image and QEMU/baremetal invocation from that.

use std::process;
use std::thread;
use std::time::{Duration, Instant};

use rexpect::process::wait::WaitStatus;
use rexpect::session::{spawn_command, PtySession};

use crate::channel::ConsoleStream;
use crate::errors::ChannelError;
use crate::machine::Machine;
use crate::modules::ModuleSet;

/// Poll interval while waiting for console output on the PTY.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Renders the launcher invocation for booting `modules` on `machine`.
///
/// The module list is passed in boot order; this is the whole external boot
/// contract.
pub fn boot_command(machine: &Machine, modules: &ModuleSet) -> process::Command {
    let mut cmd = process::Command::new("python3");
    cmd.arg("run.py");

    match machine {
        Machine::Qemu => {
            cmd.arg("--qemu-cores");
            cmd.arg(machine.core_count().to_string());
        }
        Machine::Baremetal(name) => {
            cmd.arg(format!("--machine={}", name));
        }
        Machine::Simulated { .. } => unreachable!("simulated machines do not boot"),
    }

    for entry in modules.menu_entries() {
        cmd.arg("--module");
        cmd.arg(entry);
    }

    cmd
}

/// Boots the SUT and returns its console.
///
/// `timeout_ms` caps the rexpect-internal reads; the harness applies its own
/// per-expect deadlines on top.
pub fn spawn_sut(
    machine: &Machine,
    modules: &ModuleSet,
    timeout_ms: Option<u64>,
) -> Result<PtyConsole, ChannelError> {
    let cmd = boot_command(machine, modules);
    eprintln!("Invoke SUT: {:?}", cmd);
    let session =
        spawn_command(cmd, timeout_ms).map_err(|e| ChannelError::LaunchFailed(e.to_string()))?;
    Ok(PtyConsole::new(session))
}

/// A booted SUT's serial console on a PTY.
pub struct PtyConsole {
    session: PtySession,
}

impl PtyConsole {
    pub fn new(session: PtySession) -> PtyConsole {
        PtyConsole { session }
    }

    /// Access to the underlying process, e.g. for teardown.
    pub fn session_mut(&mut self) -> &mut PtySession {
        &mut self.session
    }

    fn process_gone(&self) -> bool {
        !matches!(self.session.process.status(), Some(WaitStatus::StillAlive))
    }
}

impl ConsoleStream for PtyConsole {
    fn send_line(&mut self, line: &str) -> Result<(), ChannelError> {
        self.session
            .send_line(line)
            .map(|_| ())
            .map_err(|e| ChannelError::WriteFailed(e.to_string()))
    }

    fn recv_chunk(&mut self, wait: Duration) -> Result<Option<String>, ChannelError> {
        let deadline = Instant::now() + wait;
        loop {
            let mut chunk = String::new();
            while let Some(c) = self.session.try_read() {
                chunk.push(c);
            }
            if !chunk.is_empty() {
                return Ok(Some(chunk));
            }
            if self.process_gone() {
                return Err(ChannelError::Closed);
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}
