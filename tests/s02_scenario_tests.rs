// Copyright © 2023 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A set of integration tests that run the full `corectrl` scenario
//! dialogues against a scripted console stream and verify the terminal
//! outcome the runner would see.
//!
//! The naming scheme of the tests ensures a somewhat useful order of test
//! execution taking into account the dependency chain:
//! * `s02_*`: End-to-end scenario dialogues

use std::time::Duration;

use corectrl_harness::channel::ConsoleChannel;
use corectrl_harness::errors::{ChannelError, HarnessError};
use corectrl_harness::machine::Machine;
use corectrl_harness::scenarios::{ListKcbCores, ParkBoot, ParkOsNode, StopCore, UpdateKernel};
use corectrl_harness::sim::{SentLog, SimConsole};
use corectrl_harness::testcase::{run_test_case, InteractiveTest, Timeouts};
use corectrl_harness::TestOutcome;

const SHELL_BANNER: &str = "fish v0.2 -- pleased to meet you!\n> ";

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn fast_timeouts() -> Timeouts {
    Timeouts {
        boot: ms(500),
        step: ms(400),
        recheck: ms(120),
    }
}

fn run_scenario(
    test: &mut dyn InteractiveTest,
    machine: &Machine,
    sim: SimConsole,
) -> (TestOutcome, SentLog) {
    let _ = env_logger::builder().is_test(true).try_init();
    let modules = test.configure(machine);
    // Every scenario in the family boots the baseline plus its workload.
    assert!(!modules.is_empty());

    let log = sim.sent_log();
    let mut con = ConsoleChannel::from_stream(sim);
    let outcome = run_test_case(test, &mut con);
    (outcome, log)
}

/// Stop a core: the stopped marker appears, and the workload's report stays
/// silent for the whole recheck window.
#[test]
fn s02_stop_core() {
    let machine = Machine::Simulated { cores: 2 };
    let mut test = StopCore::with_timeouts(fast_timeouts());
    let sim = SimConsole::new()
        .emit(ms(2), SHELL_BANNER)
        .emit(ms(2), "On core 1\n")
        .on_line("corectrl stop 1", ms(5), "Core 1 stopped.\n");

    let (outcome, log) = run_scenario(&mut test, &machine, sim);
    assert!(outcome.passed(), "{}", outcome);
    assert_eq!(log.lines(), vec!["corectrl stop 1".to_string()]);
}

/// Stop a core, but the workload reports in again within the recheck window:
/// the destructive command silently failed and the test fails.
#[test]
fn s02_stop_core_recurrence() {
    let machine = Machine::Simulated { cores: 2 };
    let mut test = StopCore::with_timeouts(fast_timeouts());
    let sim = SimConsole::new()
        .emit(ms(2), SHELL_BANNER)
        .emit(ms(2), "On core 1\n")
        .on_line("corectrl stop 1", ms(5), "Core 1 stopped.\n")
        .on_line("corectrl stop 1", ms(10), "On core 1\n");

    let (outcome, _) = run_scenario(&mut test, &machine, sim);
    match outcome {
        TestOutcome::Failed(HarnessError::UnexpectedRecurrence { pattern, core, .. }) => {
            assert_eq!(pattern, "On core 1");
            assert_eq!(core.to_string(), "1");
        }
        other => panic!("unexpected outcome: {}", other),
    }
}

/// The SUT dies while we wait for the stop to take effect: that is a channel
/// error, not a failed expectation.
#[test]
fn s02_stop_core_sut_died() {
    let machine = Machine::Simulated { cores: 2 };
    let mut test = StopCore::with_timeouts(fast_timeouts());
    let sim = SimConsole::new()
        .emit(ms(2), SHELL_BANNER)
        .emit(ms(2), "On core 1\n")
        .on_line("corectrl stop 1", ms(5), "Core 1 stopped.\n")
        .close(ms(10));

    let (outcome, _) = run_scenario(&mut test, &machine, sim);
    assert!(matches!(
        outcome,
        TestOutcome::Errored(HarnessError::Channel(ChannelError::Closed))
    ));
}

/// Update the kernel on a core: fresh CPU driver banner, prompt, and the
/// workload is still alive afterwards.
#[test]
fn s02_update_kernel() {
    let machine = Machine::Simulated { cores: 3 };
    let mut test = UpdateKernel::with_timeouts(fast_timeouts());
    let sim = SimConsole::new()
        .emit(ms(2), SHELL_BANNER)
        .emit(ms(2), "On core 2\n")
        .on_line("corectrl update 2", ms(5), "Barrelfish CPU driver starting\n")
        .on_line("corectrl update 2", ms(2), "> ")
        .on_line("corectrl update 2", ms(2), "On core 2\n");

    let (outcome, log) = run_scenario(&mut test, &machine, sim);
    assert!(outcome.passed(), "{}", outcome);
    assert_eq!(log.lines(), vec!["corectrl update 2".to_string()]);
}

/// Park an OSNode: the workload resumes on the target core.
#[test]
fn s02_park_osnode() {
    let machine = Machine::Simulated { cores: 4 };
    let mut test = ParkOsNode::with_timeouts(fast_timeouts());
    let sim = SimConsole::new()
        .emit(ms(2), SHELL_BANNER)
        .emit(ms(2), "On core 2\n")
        .on_line("corectrl park 2 3", ms(5), "> ")
        .on_line("corectrl park 2 3", ms(2), "On core 3\n");

    let (outcome, log) = run_scenario(&mut test, &machine, sim);
    assert!(outcome.passed(), "{}", outcome);
    assert_eq!(log.lines(), vec!["corectrl park 2 3".to_string()]);
}

/// List KCBs and CPUs.
#[test]
fn s02_list_kcb_cores() {
    let machine = Machine::Simulated { cores: 2 };
    let mut test = ListKcbCores::with_timeouts(fast_timeouts());
    let sim = SimConsole::new()
        .emit(ms(2), SHELL_BANNER)
        .on_line("corectrl lskcb", ms(5), "KCB 1: RUNNING\n> ")
        .on_line("corectrl lscpu", ms(5), "CPU 0: APIC_ID 0 BOOT_READY\n> ");

    let (outcome, log) = run_scenario(&mut test, &machine, sim);
    assert!(outcome.passed(), "{}", outcome);
    assert_eq!(
        log.lines(),
        vec!["corectrl lskcb".to_string(), "corectrl lscpu".to_string()]
    );
}

/// Park a KCB and move it back. The workload report is required twice in
/// direct succession at every station.
#[test]
fn s02_park_boot() {
    let machine = Machine::Simulated { cores: 4 };
    let mut test = ParkBoot::with_timeouts(fast_timeouts());
    let sim = SimConsole::new()
        .emit(ms(2), SHELL_BANNER)
        .emit(ms(2), "On core 1\nOn core 1\n")
        .on_line("corectrl park 1 2", ms(5), "> ")
        .on_line("corectrl park 1 2", ms(2), "On core 2\nOn core 2\n")
        .on_line("corectrl unpark 1", ms(5), "> ")
        .on_line("corectrl unpark 1", ms(2), "On core 1\nOn core 1\n");

    let (outcome, log) = run_scenario(&mut test, &machine, sim);
    assert!(outcome.passed(), "{}", outcome);
    assert_eq!(
        log.lines(),
        vec![
            "corectrl park 1 2".to_string(),
            "corectrl unpark 1".to_string()
        ]
    );
}

/// A single workload report is not enough for park_boot; the second expect
/// must be satisfied as well.
#[test]
fn s02_park_boot_single_report_is_inconclusive() {
    let machine = Machine::Simulated { cores: 4 };
    let mut test = ParkBoot::with_timeouts(fast_timeouts());
    let sim = SimConsole::new()
        .emit(ms(2), SHELL_BANNER)
        .emit(ms(2), "On core 1\n");

    let (outcome, _) = run_scenario(&mut test, &machine, sim);
    match outcome {
        TestOutcome::Failed(HarnessError::UnmetExpectation { pattern, .. }) => {
            assert_eq!(pattern, "On core 1");
        }
        other => panic!("unexpected outcome: {}", other),
    }
}

/// The park target never reports in: the test fails naming the missing
/// marker.
#[test]
fn s02_park_boot_missing_marker() {
    let machine = Machine::Simulated { cores: 4 };
    let mut test = ParkBoot::with_timeouts(fast_timeouts());
    let sim = SimConsole::new()
        .emit(ms(2), SHELL_BANNER)
        .emit(ms(2), "On core 1\nOn core 1\n")
        .on_line("corectrl park 1 2", ms(5), "> ");

    let (outcome, _) = run_scenario(&mut test, &machine, sim);
    match outcome {
        TestOutcome::Failed(HarnessError::UnmetExpectation { pattern, .. }) => {
            assert_eq!(pattern, "On core 2");
        }
        other => panic!("unexpected outcome: {}", other),
    }
}
