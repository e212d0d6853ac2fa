// Copyright © 2022 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Facts about the target machine. The harness only ever queries these; it
//! never mutates them.

use std::path::Path;

use hwloc2::{ObjectType, Topology};

/// Environment variable that points to machine config (for baremetal booting)
const BAREMETAL_MACHINE: &str = "BAREMETAL_MACHINE";

/// Different machine types we can run on.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Machine {
    /// A bare-metal machine identified by a string.
    /// The name is described in the corresponding TOML file.
    ///
    /// (e.g., Machine::Baremetal("b1542".into()) should have a corresponding
    /// b1542.toml file).
    Baremetal(String),
    /// Run on a virtual machine with QEMU (machine parameters determined by
    /// the current host).
    Qemu,
    /// A scripted console stream with a fixed topology; used when a test
    /// dialogue runs against a simulated SUT instead of a booted one.
    Simulated { cores: usize },
}

impl Machine {
    pub fn determine() -> Self {
        match std::env::var(BAREMETAL_MACHINE) {
            Ok(name) => {
                if name.is_empty() {
                    panic!("{} environment variable empty.", BAREMETAL_MACHINE);
                }
                if !Path::new(&format!("{}.toml", name)).exists() {
                    panic!(
                        "'{}.toml' file not found. Check {} environment variable.",
                        name, BAREMETAL_MACHINE
                    );
                }
                Machine::Baremetal(name)
            }
            _ => Machine::Qemu,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Machine::Qemu => "qemu",
            Machine::Baremetal(s) => s.as_str(),
            Machine::Simulated { .. } => "sim",
        }
    }

    /// Number of physical cores the SUT will see.
    pub fn core_count(&self) -> usize {
        match self {
            Machine::Qemu => {
                let topo = Topology::new().expect("Can't retrieve System topology?");
                topo.objects_with_type(&ObjectType::Core)
                    .map_or(1, |cpus| cpus.len())
            }
            Machine::Baremetal(_) => match self.name() {
                "l0318" => 96,
                "b1542" => 28,
                _ => unreachable!("unknown machine"),
            },
            Machine::Simulated { cores } => *cores,
        }
    }
}
