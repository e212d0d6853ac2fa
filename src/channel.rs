// Copyright © 2023 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The console channel: a bidirectional text-stream handle that interaction
//! scripts are written against.
//!
//! `expect` is the single suspension point of a script. It blocks until one
//! of the offered patterns shows up in newly-arrived output or the deadline
//! elapses; the deadline is a first-class outcome, not an exception. Every
//! call commits a forward-only cursor over the stream, so consumed output is
//! never re-scanned by later calls.

use std::fmt::{self, Display, Formatter};
use std::time::{Duration, Instant};

use log::trace;

use crate::errors::{ChannelError, HarnessError};

/// Something to wait for in console output.
#[derive(Clone, Debug)]
pub enum Pattern {
    /// Byte-for-byte substring.
    Literal(String),
    /// Regular expression.
    Regex(regex::Regex),
    /// Sentinel: "no pattern matched before the timeout elapsed" is the
    /// outcome this branch is waiting for.
    NoMatchByDeadline,
}

impl Pattern {
    pub fn literal<S: Into<String>>(s: S) -> Pattern {
        Pattern::Literal(s.into())
    }

    pub fn regex(re: &str) -> Result<Pattern, regex::Error> {
        Ok(Pattern::Regex(regex::Regex::new(re)?))
    }

    /// Position of the earliest occurrence in `haystack` as a (start, end)
    /// byte range. The sentinel never matches text.
    fn find(&self, haystack: &str) -> Option<(usize, usize)> {
        match self {
            Pattern::Literal(s) => haystack.find(s.as_str()).map(|pos| (pos, pos + s.len())),
            Pattern::Regex(re) => re.find(haystack).map(|m| (m.start(), m.end())),
            Pattern::NoMatchByDeadline => None,
        }
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(s) => write!(f, "{}", s),
            Pattern::Regex(re) => write!(f, "{}", re.as_str()),
            Pattern::NoMatchByDeadline => write!(f, "<no match by deadline>"),
        }
    }
}

/// What a single `expect` call resolved to.
#[derive(Clone, Debug)]
pub enum ExpectOutcome {
    /// The pattern at `index` in the offered list matched; `text` is the
    /// console output consumed up to and including the match.
    Matched { index: usize, text: String },
    /// The deadline elapsed with no match.
    DeadlineExceeded { elapsed: Duration },
}

impl ExpectOutcome {
    pub fn is_deadline(&self) -> bool {
        matches!(self, ExpectOutcome::DeadlineExceeded { .. })
    }
}

/// The transport beneath a console channel (serial link, simulator pipe, or
/// a PTY to a launcher process).
pub trait ConsoleStream {
    /// Write `line` plus a line terminator to the SUT's console input.
    fn send_line(&mut self, line: &str) -> Result<(), ChannelError>;

    /// Block up to `wait` for newly arrived output. `Ok(None)` means nothing
    /// arrived in time; `Err(Closed)` means the transport went away.
    fn recv_chunk(&mut self, wait: Duration) -> Result<Option<String>, ChannelError>;
}

/// A console channel with a forward-only cursor over the SUT's output.
///
/// Exclusively owned by the single active test case for the duration of its
/// run; sends and expects are strictly FIFO relative to each other.
pub struct ConsoleChannel {
    stream: Box<dyn ConsoleStream>,
    /// Received but not yet consumed output.
    buffer: String,
}

impl ConsoleChannel {
    pub fn new(stream: Box<dyn ConsoleStream>) -> ConsoleChannel {
        ConsoleChannel {
            stream,
            buffer: String::new(),
        }
    }

    pub fn from_stream<S: ConsoleStream + 'static>(stream: S) -> ConsoleChannel {
        ConsoleChannel::new(Box::new(stream))
    }

    /// Send one command line to the SUT.
    pub fn send_line(&mut self, line: &str) -> Result<(), ChannelError> {
        trace!("console <- {}", line);
        self.stream.send_line(line)
    }

    /// Wait until the earliest-occurring pattern among `patterns` appears in
    /// the unconsumed output, or `timeout` elapses.
    ///
    /// Ties within the same buffered chunk are broken by pattern list order,
    /// not arrival order. On a match, output up to and including the matched
    /// text is consumed. Output that arrives after the deadline is never
    /// reported as a match by this call (a later call will see it).
    pub fn expect(
        &mut self,
        patterns: &[Pattern],
        timeout: Duration,
    ) -> Result<ExpectOutcome, ChannelError> {
        let start = Instant::now();
        let deadline = start + timeout;

        loop {
            if let Some((index, end)) = self.earliest_match(patterns) {
                let text: String = self.buffer.drain(..end).collect();
                trace!("console -> matched `{}`", patterns[index]);
                return Ok(ExpectOutcome::Matched { index, text });
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(ExpectOutcome::DeadlineExceeded {
                    elapsed: now - start,
                });
            }

            if let Some(chunk) = self.stream.recv_chunk(deadline - now)? {
                self.buffer.push_str(&chunk);
            }
        }
    }

    /// Expect-single step: wait for exactly one pattern. A deadline here is
    /// an `UnmetExpectation`, which fails the test case. Returns the
    /// consumed output on a match.
    pub fn expect_marker(
        &mut self,
        pattern: &Pattern,
        timeout: Duration,
    ) -> Result<String, HarnessError> {
        match self.expect(std::slice::from_ref(pattern), timeout)? {
            ExpectOutcome::Matched { text, .. } => Ok(text),
            ExpectOutcome::DeadlineExceeded { elapsed } => Err(HarnessError::UnmetExpectation {
                pattern: pattern.to_string(),
                timeout,
                elapsed,
            }),
        }
    }

    fn earliest_match(&self, patterns: &[Pattern]) -> Option<(usize, usize)> {
        // (start, index, end) of the best candidate so far; on equal start
        // the earlier list entry wins.
        let mut best: Option<(usize, usize, usize)> = None;
        for (index, pattern) in patterns.iter().enumerate() {
            if let Some((start, end)) = pattern.find(&self.buffer) {
                match best {
                    Some((best_start, _, _)) if best_start <= start => {}
                    _ => best = Some((start, index, end)),
                }
            }
        }
        best.map(|(_, index, end)| (index, end))
    }
}
