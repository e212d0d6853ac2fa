// Copyright © 2023 VMware, Inc. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The process-wide test registry: test name to test-case factory.
//!
//! The registry is built explicitly at process start by [`Registry::builtin`]
//! (no registration side effects on import), read by the external runner, and
//! never mutated during test execution.

use std::collections::BTreeMap;

use lazy_static::lazy_static;

use crate::errors::HarnessError;
use crate::scenarios::{ListKcbCores, ParkBoot, ParkOsNode, StopCore, UpdateKernel};
use crate::testcase::InteractiveTest;

/// Produces a fresh test case per run.
pub type TestFactory = fn() -> Box<dyn InteractiveTest>;

#[derive(Default)]
pub struct Registry {
    tests: BTreeMap<String, TestFactory>,
}

impl Registry {
    pub fn new() -> Registry {
        Default::default()
    }

    /// Records `factory` under its declared name.
    ///
    /// Re-registering the identical factory under the same name is a no-op,
    /// so a registration routine may run more than once. Registering a
    /// different factory under a taken name is an error.
    pub fn register(&mut self, factory: TestFactory) -> Result<(), HarnessError> {
        let name = factory().name();
        match self.tests.get(name) {
            Some(existing) if *existing == factory => Ok(()),
            Some(_) => Err(HarnessError::DuplicateName(name.to_string())),
            None => {
                self.tests.insert(name.to_string(), factory);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Result<TestFactory, HarnessError> {
        self.tests
            .get(name)
            .copied()
            .ok_or_else(|| HarnessError::UnknownTest(name.to_string()))
    }

    /// Looks up `name` and produces a fresh test case.
    pub fn instantiate(&self, name: &str) -> Result<Box<dyn InteractiveTest>, HarnessError> {
        Ok(self.lookup(name)?())
    }

    /// Registered names in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tests.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// All builtin `corectrl` scenarios.
    pub fn builtin() -> Registry {
        let mut registry = Registry::new();
        let factories: [TestFactory; 5] = [
            StopCore::boxed,
            UpdateKernel::boxed,
            ParkOsNode::boxed,
            ListKcbCores::boxed,
            ParkBoot::boxed,
        ];
        for factory in factories {
            registry
                .register(factory)
                .expect("builtin scenario names are unique");
        }
        registry
    }
}

lazy_static! {
    /// Process-wide registry instance, populated once at startup and
    /// read-only thereafter.
    pub static ref BUILTIN: Registry = Registry::builtin();
}
