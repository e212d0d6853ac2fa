// Copyright © 2023 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The concrete `corectrl` acceptance tests.
//!
//! Every scenario here is a specialization of the same abstract protocol:
//! boot synchronization, steady-state confirmation, one control command,
//! effect confirmation, and (for destructive commands) a negative
//! confirmation that the old state does not come back. Only the role-to-core
//! bindings and the verb differ between scenarios.

use log::debug;

use crate::channel::{ConsoleChannel, ExpectOutcome, Pattern};
use crate::errors::HarnessError;
use crate::machine::Machine;
use crate::modules::{base_modules, build_chain, ModuleSet};
use crate::testcase::{
    core_stopped, running_on, wait_for_prompt, wait_for_shell, CoreCtrl, CoreIndex,
    InteractiveTest, Timeouts, CPU_LISTING, KCB_LISTING, START_CPU_DRIVER,
};

/// The periodic workload pinned to a core; its "On core N" reports are the
/// steady-state evidence the scripts key on.
const WORKLOAD: &str = "periodicprint";

/// Family-wide victim-core binding: prefer core 2 when the machine is big
/// enough, else fall back to core 1.
fn victim_core(machine: &Machine) -> CoreIndex {
    if machine.core_count() > 2 {
        CoreIndex(2)
    } else {
        CoreIndex(1)
    }
}

fn workload_args(core: CoreIndex) -> Vec<String> {
    vec![format!("core={}", core)]
}

/// Stop a core and prove its workload died with it.
pub struct StopCore {
    core: CoreIndex,
    timeouts: Timeouts,
}

impl StopCore {
    pub fn with_timeouts(timeouts: Timeouts) -> StopCore {
        StopCore {
            core: CoreIndex(1),
            timeouts,
        }
    }

    pub fn boxed() -> Box<dyn InteractiveTest> {
        Box::new(StopCore::with_timeouts(Timeouts::default()))
    }
}

impl InteractiveTest for StopCore {
    fn name(&self) -> &'static str {
        "stop_core"
    }

    fn configure(&mut self, machine: &Machine) -> ModuleSet {
        let mut set = build_chain(&[base_modules], machine);
        self.core = victim_core(machine);
        set.add_module(WORKLOAD, workload_args(self.core));
        set
    }

    fn interact(&mut self, con: &mut ConsoleChannel) -> Result<(), HarnessError> {
        let t = self.timeouts;
        wait_for_shell(con, &t)?;

        // Wait for the workload to report in.
        con.expect_marker(&running_on(self.core), t.step)?;

        debug!("Stopping core {}.", self.core);
        let stop = CoreCtrl::Stop(self.core);
        stop.send(con)?;

        debug!("Wait until core is down.");
        con.expect_marker(&core_stopped(self.core), t.step)?;
        // Cannot wait for the prompt here: the cleanup routine blocks on an
        // answer from the monitor on the stopped core.

        // Make sure the workload is no longer running.
        let alive = running_on(self.core);
        match con.expect(&[alive.clone(), Pattern::NoMatchByDeadline], t.recheck)? {
            ExpectOutcome::Matched { .. } => Err(HarnessError::UnexpectedRecurrence {
                pattern: alive.to_string(),
                command: stop.to_string(),
                core: self.core,
            }),
            ExpectOutcome::DeadlineExceeded { .. } => Ok(()),
        }
    }
}

/// Reboot a core with a fresh CPU driver and prove the workload survives.
pub struct UpdateKernel {
    core: CoreIndex,
    timeouts: Timeouts,
}

impl UpdateKernel {
    pub fn with_timeouts(timeouts: Timeouts) -> UpdateKernel {
        UpdateKernel {
            core: CoreIndex(1),
            timeouts,
        }
    }

    pub fn boxed() -> Box<dyn InteractiveTest> {
        Box::new(UpdateKernel::with_timeouts(Timeouts::default()))
    }
}

impl InteractiveTest for UpdateKernel {
    fn name(&self) -> &'static str {
        "update_kernel"
    }

    fn configure(&mut self, machine: &Machine) -> ModuleSet {
        let mut set = build_chain(&[base_modules], machine);
        self.core = victim_core(machine);
        set.add_module(WORKLOAD, workload_args(self.core));
        set
    }

    fn interact(&mut self, con: &mut ConsoleChannel) -> Result<(), HarnessError> {
        let t = self.timeouts;
        wait_for_shell(con, &t)?;
        con.expect_marker(&running_on(self.core), t.step)?;

        debug!("Rebooting core {}.", self.core);
        CoreCtrl::Update(self.core).send(con)?;
        con.expect_marker(&Pattern::literal(START_CPU_DRIVER), t.step)?;
        wait_for_prompt(con, &t)?;

        // Make sure the workload is still running.
        con.expect_marker(&running_on(self.core), t.step)?;
        Ok(())
    }
}

/// Park an OSNode's KCB on another core and watch the workload resume there.
pub struct ParkOsNode {
    core: CoreIndex,
    target: CoreIndex,
    timeouts: Timeouts,
}

impl ParkOsNode {
    pub fn with_timeouts(timeouts: Timeouts) -> ParkOsNode {
        ParkOsNode {
            core: CoreIndex(1),
            target: CoreIndex(0),
            timeouts,
        }
    }

    pub fn boxed() -> Box<dyn InteractiveTest> {
        Box::new(ParkOsNode::with_timeouts(Timeouts::default()))
    }
}

impl InteractiveTest for ParkOsNode {
    fn name(&self) -> &'static str {
        "park_osnode"
    }

    fn configure(&mut self, machine: &Machine) -> ModuleSet {
        let mut set = build_chain(&[base_modules], machine);
        self.core = victim_core(machine);
        self.target = if machine.core_count() > 3 {
            CoreIndex(3)
        } else {
            CoreIndex(0)
        };
        set.add_module(WORKLOAD, workload_args(self.core));
        set
    }

    fn interact(&mut self, con: &mut ConsoleChannel) -> Result<(), HarnessError> {
        let t = self.timeouts;
        wait_for_shell(con, &t)?;
        con.expect_marker(&running_on(self.core), t.step)?;

        debug!("Park OSNode from {} on {}.", self.core, self.target);
        CoreCtrl::Park {
            kcb: self.core,
            target: self.target,
        }
        .send(con)?;
        wait_for_prompt(con, &t)?;

        con.expect_marker(&running_on(self.target), t.step)?;
        Ok(())
    }
}

/// List all KCBs and CPUs.
pub struct ListKcbCores {
    timeouts: Timeouts,
}

impl ListKcbCores {
    pub fn with_timeouts(timeouts: Timeouts) -> ListKcbCores {
        ListKcbCores { timeouts }
    }

    pub fn boxed() -> Box<dyn InteractiveTest> {
        Box::new(ListKcbCores::with_timeouts(Timeouts::default()))
    }
}

impl InteractiveTest for ListKcbCores {
    fn name(&self) -> &'static str {
        "list_kcb_cores"
    }

    fn configure(&mut self, machine: &Machine) -> ModuleSet {
        build_chain(&[base_modules], machine)
    }

    fn interact(&mut self, con: &mut ConsoleChannel) -> Result<(), HarnessError> {
        let t = self.timeouts;
        wait_for_shell(con, &t)?;

        CoreCtrl::ListKcb.send(con)?;
        con.expect_marker(&Pattern::literal(KCB_LISTING), t.step)?;
        wait_for_prompt(con, &t)?;

        CoreCtrl::ListCpu.send(con)?;
        con.expect_marker(&Pattern::literal(CPU_LISTING), t.step)?;
        wait_for_prompt(con, &t)?;
        Ok(())
    }
}

/// Park a KCB, then unpark it and reboot it on its home core.
pub struct ParkBoot {
    core: CoreIndex,
    parking: CoreIndex,
    timeouts: Timeouts,
}

impl ParkBoot {
    pub fn with_timeouts(timeouts: Timeouts) -> ParkBoot {
        ParkBoot {
            core: CoreIndex(1),
            parking: CoreIndex(0),
            timeouts,
        }
    }

    pub fn boxed() -> Box<dyn InteractiveTest> {
        Box::new(ParkBoot::with_timeouts(Timeouts::default()))
    }

    /// The workload report has to be seen twice in direct succession at each
    /// station; a single report is treated as inconclusive.
    fn settled(
        &self,
        con: &mut ConsoleChannel,
        core: CoreIndex,
    ) -> Result<(), HarnessError> {
        con.expect_marker(&running_on(core), self.timeouts.step)?;
        con.expect_marker(&running_on(core), self.timeouts.step)?;
        Ok(())
    }
}

impl InteractiveTest for ParkBoot {
    fn name(&self) -> &'static str {
        "park_boot"
    }

    fn configure(&mut self, machine: &Machine) -> ModuleSet {
        let mut set = build_chain(&[base_modules], machine);
        self.core = CoreIndex(1);
        self.parking = if machine.core_count() <= 2 {
            CoreIndex(0)
        } else {
            CoreIndex(2)
        };
        set.add_module(WORKLOAD, workload_args(self.core));
        set
    }

    fn interact(&mut self, con: &mut ConsoleChannel) -> Result<(), HarnessError> {
        let t = self.timeouts;
        wait_for_shell(con, &t)?;
        self.settled(con, self.core)?;

        debug!("Park KCB {} on core {}.", self.core, self.parking);
        CoreCtrl::Park {
            kcb: self.core,
            target: self.parking,
        }
        .send(con)?;
        wait_for_prompt(con, &t)?;
        self.settled(con, self.parking)?;

        debug!("Unpark KCB {} from core {}.", self.core, self.parking);
        CoreCtrl::Unpark(self.core).send(con)?;
        wait_for_prompt(con, &t)?;

        // Home core reboots with the KCB.
        self.settled(con, self.core)?;
        Ok(())
    }
}
