// Copyright © 2023 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error taxonomy of the harness.
//!
//! Channel-level failures (`ChannelError`) describe the transport; script
//! level failures (`HarnessError`) describe why a test case ended. The split
//! matters for triage: a deadline that elapsed ("SUT hung") must be
//! distinguishable from a transport that disappeared ("SUT died").

use std::time::Duration;

use thiserror::Error;

use crate::testcase::CoreIndex;

/// Failures of the raw console transport.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The transport disconnected while we were waiting for output.
    #[error("console transport closed while waiting for output")]
    Closed,
    /// Writing a command line to the console failed.
    #[error("console write failed: {0}")]
    WriteFailed(String),
    /// The SUT could not be launched in the first place.
    #[error("failed to launch SUT: {0}")]
    LaunchFailed(String),
}

/// Terminal errors of an interaction script or the registry.
///
/// All of these abort the current test case; a desynchronized console cannot
/// be resumed mid-protocol.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The transport failed underneath the script.
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// An Expect-single step ran out of time with no match.
    #[error("expected `{pattern}` within {timeout:?}, gave up after {elapsed:?}")]
    UnmetExpectation {
        pattern: String,
        timeout: Duration,
        elapsed: Duration,
    },
    /// A should-not-recur pattern showed up again after a destructive
    /// command, i.e. the command silently failed.
    #[error("`{pattern}` reappeared after `{command}`; core {core} did not go down")]
    UnexpectedRecurrence {
        pattern: String,
        command: String,
        core: CoreIndex,
    },
    /// A different factory was registered under an already-taken name.
    #[error("test `{0}` is already registered with a different factory")]
    DuplicateName(String),
    /// Lookup of a name nobody registered.
    #[error("no test registered under `{0}`")]
    UnknownTest(String),
}
