// Copyright © 2023 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The interactive test-case model: typed core indices, the `corectrl` wire
//! protocol, the console markers the SUT emits, and the trait every concrete
//! scenario implements.
//!
//! A test case has two strictly sequential phases: `configure` resolves the
//! role-to-core bindings from the machine topology and produces the boot
//! module set, then `interact` scripts the dialogue on a live channel. The
//! module set is never touched again once it is handed out.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use log::info;

use crate::channel::{ConsoleChannel, Pattern};
use crate::errors::HarnessError;
use crate::machine::Machine;
use crate::modules::ModuleSet;
use crate::TestOutcome;

/// A physical core index, rendered into protocol strings only by
/// [`CoreCtrl`] and the marker constructors below.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CoreIndex(pub usize);

impl Display for CoreIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `corectrl` command family. `Display` is the wire format; the console
/// protocol is literal text, newline-terminated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoreCtrl {
    /// Stop a core.
    Stop(CoreIndex),
    /// Reboot a core with a fresh CPU driver.
    Update(CoreIndex),
    /// Move a KCB from its core onto a target core.
    Park { kcb: CoreIndex, target: CoreIndex },
    /// Move a parked KCB back to its home core.
    Unpark(CoreIndex),
    /// List all KCBs.
    ListKcb,
    /// List all CPUs.
    ListCpu,
}

impl Display for CoreCtrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CoreCtrl::Stop(core) => write!(f, "corectrl stop {}", core),
            CoreCtrl::Update(core) => write!(f, "corectrl update {}", core),
            CoreCtrl::Park { kcb, target } => write!(f, "corectrl park {} {}", kcb, target),
            CoreCtrl::Unpark(kcb) => write!(f, "corectrl unpark {}", kcb),
            CoreCtrl::ListKcb => write!(f, "corectrl lskcb"),
            CoreCtrl::ListCpu => write!(f, "corectrl lscpu"),
        }
    }
}

impl CoreCtrl {
    /// Send this command over the console.
    pub fn send(&self, con: &mut ConsoleChannel) -> Result<(), HarnessError> {
        con.send_line(&self.to_string())?;
        Ok(())
    }
}

/// Banner printed by a CPU driver when a core (re)boots.
pub const START_CPU_DRIVER: &str = "Barrelfish CPU driver starting";
/// Printed by the shell once it is ready to accept commands.
pub const SHELL_READY: &str = "fish v0.2 -- pleased to meet you!";
/// The shell prompt.
pub const SHELL_PROMPT: &str = ">";
/// First line of the `lskcb` listing.
pub const KCB_LISTING: &str = "KCB 1:";
/// First line of the `lscpu` listing.
pub const CPU_LISTING: &str = "CPU 0:";

/// Per-core evidence that the periodic workload is running.
pub fn running_on(core: CoreIndex) -> Pattern {
    Pattern::literal(format!("On core {}", core))
}

/// Marker confirming a core went down.
pub fn core_stopped(core: CoreIndex) -> Pattern {
    Pattern::literal(format!("Core {} stopped.", core))
}

/// Per-phase deadlines of an interaction script.
#[derive(Clone, Copy, Debug)]
pub struct Timeouts {
    /// Boot synchronization: waiting for the shell to come up.
    pub boot: Duration,
    /// Any single expect step in steady state.
    pub step: Duration,
    /// The negative-confirmation window after a destructive command.
    pub recheck: Duration,
}

impl Default for Timeouts {
    fn default() -> Timeouts {
        Timeouts {
            boot: Duration::from_secs(60),
            step: Duration::from_secs(15),
            recheck: Duration::from_secs(10),
        }
    }
}

/// One interactive acceptance test against the SUT console.
pub trait InteractiveTest {
    /// Name the test is registered under.
    fn name(&self) -> &'static str;

    /// Resolve role-to-core bindings from the machine topology and build the
    /// boot module set. Called once per run, before boot.
    fn configure(&mut self, machine: &Machine) -> ModuleSet;

    /// Run the scripted dialogue against a live console. Any error aborts
    /// the script; there is no local recovery.
    fn interact(&mut self, con: &mut ConsoleChannel) -> Result<(), HarnessError>;
}

/// Boot synchronization: block until the SUT's shell is ready.
pub fn wait_for_shell(con: &mut ConsoleChannel, timeouts: &Timeouts) -> Result<(), HarnessError> {
    con.expect_marker(&Pattern::literal(SHELL_READY), timeouts.boot)?;
    Ok(())
}

/// Prompt resynchronization between commands.
pub fn wait_for_prompt(con: &mut ConsoleChannel, timeouts: &Timeouts) -> Result<(), HarnessError> {
    con.expect_marker(&Pattern::literal(SHELL_PROMPT), timeouts.step)?;
    Ok(())
}

/// Drives one configured test case over `con` and folds the result into the
/// terminal outcome reported to the runner.
pub fn run_test_case(test: &mut dyn InteractiveTest, con: &mut ConsoleChannel) -> TestOutcome {
    info!("running test case `{}`", test.name());
    let outcome = TestOutcome::from_result(test.interact(con));
    info!("test case `{}`: {}", test.name(), outcome);
    outcome
}
