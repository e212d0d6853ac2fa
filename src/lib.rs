// Copyright © 2023 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Acceptance-test harness for the `corectrl` console of a multicore OS.
//!
//! A test case declares the boot modules it needs (built by a chain of
//! contributors over the machine topology) and scripts a multi-step dialogue
//! against the SUT's serial console: send a command, wait for one of several
//! patterns with a hard deadline, branch on which one showed up. The harness
//! reports exactly one terminal outcome per test to the external runner.

use std::fmt::{self, Display, Formatter};

use crate::errors::HarnessError;

pub mod channel;
pub mod errors;
pub mod machine;
pub mod modules;
pub mod registry;
pub mod scenarios;
pub mod sim;
pub mod spawn;
pub mod testcase;

/// Terminal result of one test-case execution, consumed by the runner.
#[derive(Debug)]
pub enum TestOutcome {
    /// All steps completed.
    Passed,
    /// An assertion on the dialogue was violated: a marker did not show up
    /// in time, or a should-not-recur marker came back.
    Failed(HarnessError),
    /// The harness could not carry the dialogue through, e.g. the transport
    /// died or the registry was misused.
    Errored(HarnessError),
}

impl TestOutcome {
    pub fn from_result(r: Result<(), HarnessError>) -> TestOutcome {
        match r {
            Ok(()) => TestOutcome::Passed,
            Err(
                e @ (HarnessError::UnmetExpectation { .. }
                | HarnessError::UnexpectedRecurrence { .. }),
            ) => TestOutcome::Failed(e),
            Err(e) => TestOutcome::Errored(e),
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, TestOutcome::Passed)
    }
}

impl Display for TestOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TestOutcome::Passed => write!(f, "pass"),
            TestOutcome::Failed(e) => write!(f, "fail: {}", e),
            TestOutcome::Errored(e) => write!(f, "error: {}", e),
        }
    }
}
