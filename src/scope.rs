//! Scope and phase identifiers for lifecycle hooks.

use std::fmt;

use serde::Serialize;

/// One of the four nested execution scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Scope {
    Assembly,
    Class,
    Test,
    Case,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    Setup,
    Teardown,
}

/// A (scope, phase) pair naming one of the eight hook slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct HookPoint {
    pub scope: Scope,
    pub phase: Phase,
}

impl HookPoint {
    pub const ASSEMBLY_SETUP: Self = Self::new(Scope::Assembly, Phase::Setup);
    pub const ASSEMBLY_TEARDOWN: Self = Self::new(Scope::Assembly, Phase::Teardown);
    pub const CLASS_SETUP: Self = Self::new(Scope::Class, Phase::Setup);
    pub const CLASS_TEARDOWN: Self = Self::new(Scope::Class, Phase::Teardown);
    pub const TEST_SETUP: Self = Self::new(Scope::Test, Phase::Setup);
    pub const TEST_TEARDOWN: Self = Self::new(Scope::Test, Phase::Teardown);
    pub const CASE_SETUP: Self = Self::new(Scope::Case, Phase::Setup);
    pub const CASE_TEARDOWN: Self = Self::new(Scope::Case, Phase::Teardown);

    pub const fn new(scope: Scope, phase: Phase) -> Self {
        Self { scope, phase }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Assembly => "Assembly",
            Scope::Class => "Class",
            Scope::Test => "Test",
            Scope::Case => "Case",
        })
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Setup => "Setup",
            Phase::Teardown => "Teardown",
        })
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.scope, self.phase)
    }
}
