// Copyright © 2023 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Boot module sets and the builder chain that produces them.
//!
//! A module set is the ordered list of (name, argument-list) entries handed
//! to the boot collaborator; insertion order is boot order. Sets are built by
//! a linear chain of contributors that each see the machine facts and the
//! already-built set and may only append; nothing is ever removed or
//! reordered by a later level.

use std::fmt::{self, Display, Formatter};

use crate::machine::Machine;

/// One boot module. Identity is structural (name plus args).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Module {
    name: String,
    args: Vec<String>,
}

impl Module {
    pub fn new<S: Into<String>>(name: S, args: Vec<String>) -> Module {
        Module {
            name: name.into(),
            args,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Ordered, append-only collection of boot modules.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ModuleSet {
    modules: Vec<Module>,
}

impl ModuleSet {
    pub fn new() -> ModuleSet {
        Default::default()
    }

    pub fn add_module<S: Into<String>>(&mut self, name: S, args: Vec<String>) {
        self.modules.push(Module::new(name, args));
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Renders the set as menu entries for the boot collaborator, one line
    /// per module, in boot order.
    pub fn menu_entries(&self) -> Vec<String> {
        self.modules
            .iter()
            .map(|m| format!("module {}", m))
            .collect()
    }
}

/// One level of a module-set chain: reads machine facts, appends modules.
pub type ConfigBuilder = fn(&Machine, &mut ModuleSet);

/// Runs `chain` in order over an initially empty set. Deterministic: two
/// calls for the same chain and machine yield structurally equal sets.
pub fn build_chain(chain: &[ConfigBuilder], machine: &Machine) -> ModuleSet {
    let mut set = ModuleSet::new();
    for builder in chain {
        builder(machine, &mut set);
    }
    set
}

/// The baseline every interactive test in this family boots with: CPU
/// driver, init, memory server, monitor, and the shell that accepts
/// `corectrl` commands.
pub fn base_modules(_machine: &Machine, set: &mut ModuleSet) {
    set.add_module("cpu", vec![String::from("loglevel=2")]);
    set.add_module("init", Vec::new());
    set.add_module("mem_serv", Vec::new());
    set.add_module("monitor", Vec::new());
    set.add_module("fish", Vec::new());
}
