// Copyright © 2023 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A scripted in-memory console stream.
//!
//! `SimConsole` stands in for a booted SUT: output chunks are emitted on a
//! schedule, reply rules emit further chunks when a given command line
//! arrives, and an optional close event tears the transport down mid-run.
//! Delays are relative to the delivery of the previous chunk.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::channel::ConsoleStream;
use crate::errors::ChannelError;

#[derive(Clone, Debug)]
enum SimStep {
    Emit { after: Duration, text: String },
    Close { after: Duration },
}

impl SimStep {
    fn after_mut(&mut self) -> &mut Duration {
        match self {
            SimStep::Emit { after, .. } | SimStep::Close { after } => after,
        }
    }
}

/// Shared view of the command lines a [`SimConsole`] has received; stays
/// usable after the console has been moved into a channel.
#[derive(Clone)]
pub struct SentLog(Arc<Mutex<Vec<String>>>);

impl SentLog {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().expect("sent log poisoned").clone()
    }
}

pub struct SimConsole {
    feed: VecDeque<SimStep>,
    replies: Vec<(String, VecDeque<SimStep>)>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: bool,
}

impl SimConsole {
    pub fn new() -> SimConsole {
        SimConsole {
            feed: VecDeque::new(),
            replies: Vec::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: false,
        }
    }

    /// Queue `text` to appear `after` the previous chunk.
    pub fn emit(mut self, after: Duration, text: &str) -> SimConsole {
        self.feed.push_back(SimStep::Emit {
            after,
            text: text.to_string(),
        });
        self
    }

    /// Close the transport `after` the previous chunk.
    pub fn close(mut self, after: Duration) -> SimConsole {
        self.feed.push_back(SimStep::Close { after });
        self
    }

    /// When `line` arrives on the input, queue `text` for output. Repeated
    /// calls for the same line accumulate chunks in order; the whole rule
    /// fires once, on the first arrival of the line.
    pub fn on_line(mut self, line: &str, after: Duration, text: &str) -> SimConsole {
        let step = SimStep::Emit {
            after,
            text: text.to_string(),
        };
        match self.replies.iter_mut().find(|(l, _)| l == line) {
            Some((_, steps)) => steps.push_back(step),
            None => {
                let mut steps = VecDeque::new();
                steps.push_back(step);
                self.replies.push((line.to_string(), steps));
            }
        }
        self
    }

    /// Handle for inspecting received command lines after the run.
    pub fn sent_log(&self) -> SentLog {
        SentLog(Arc::clone(&self.sent))
    }
}

impl Default for SimConsole {
    fn default() -> Self {
        SimConsole::new()
    }
}

impl ConsoleStream for SimConsole {
    fn send_line(&mut self, line: &str) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::WriteFailed(String::from(
                "transport is closed",
            )));
        }
        self.sent
            .lock()
            .expect("sent log poisoned")
            .push(line.to_string());

        if let Some(pos) = self.replies.iter().position(|(l, _)| l == line) {
            let (_, mut steps) = self.replies.remove(pos);
            self.feed.append(&mut steps);
        }
        Ok(())
    }

    fn recv_chunk(&mut self, wait: Duration) -> Result<Option<String>, ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        let due = match self.feed.front() {
            Some(step) => match step {
                SimStep::Emit { after, .. } => *after,
                SimStep::Close { after } => *after,
            },
            None => {
                thread::sleep(wait);
                return Ok(None);
            }
        };

        if due > wait {
            // Not due within this wait window; burn the window.
            if let Some(front) = self.feed.front_mut() {
                *front.after_mut() = due - wait;
            }
            thread::sleep(wait);
            return Ok(None);
        }

        thread::sleep(due);
        let step = self.feed.pop_front().expect("front checked above");
        match step {
            SimStep::Emit { text, .. } => Ok(Some(text)),
            SimStep::Close { .. } => {
                self.closed = true;
                Err(ChannelError::Closed)
            }
        }
    }
}
