//! # Register Classes
//!
//! A register class is a closed file of `N` registers, indexed by `0..N`.
//! The SSA-destruction engine is parameterized by a single class per
//! invocation; registers carry a flag set that placement passes consult.

/// Upper bound on the size of a single register class.
///
/// Scratch arrays in the placement passes are sized for this bound with an
/// inline small-vector capacity, so it must stay modest.
pub const MAX_REGS: usize = 64;

/// Flag set describing how a register may be used.
///
/// Flags are a bit set so target descriptions can combine them. Only the
/// bits named here are understood by the placement passes; any other bit is
/// an unsupported constraint modifier and is rejected with a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegisterKind(u32);

impl RegisterKind {
    /// An ordinary allocatable register
    pub const NORMAL: Self = Self(0);
    /// Wildcard register: matches anything, skipped by placement
    pub const JOKER: Self = Self(1 << 0);
    /// Virtual register: not a real machine register, ignored by placement
    pub const VIRTUAL: Self = Self(1 << 1);

    const KNOWN_BITS: u32 = Self::JOKER.0 | Self::VIRTUAL.0;

    /// Reconstructs a flag set from raw bits of a target description
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Combines two flag sets
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn is_joker(self) -> bool {
        self.0 & Self::JOKER.0 != 0
    }

    pub const fn is_virtual(self) -> bool {
        self.0 & Self::VIRTUAL.0 != 0
    }

    /// True if placement must skip this register entirely
    pub const fn is_ignored(self) -> bool {
        self.is_joker() || self.is_virtual()
    }

    /// Bits set that no pass understands, or 0 if the kind is supported
    pub const fn unsupported_bits(self) -> u32 {
        self.0 & !Self::KNOWN_BITS
    }
}

/// A single register of a class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterDescr {
    /// Human-readable name, used only for diagnostics
    pub name: String,
    pub kind: RegisterKind,
}

impl RegisterDescr {
    pub fn new(name: impl Into<String>, kind: RegisterKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A closed set of registers of one class (e.g. general purpose, float)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterClass {
    name: String,
    registers: Vec<RegisterDescr>,
}

impl RegisterClass {
    /// Creates a register class from its register descriptions
    ///
    /// Panics if the class exceeds [`MAX_REGS`]; the placement passes size
    /// their scratch arrays for that bound.
    pub fn new(name: impl Into<String>, registers: Vec<RegisterDescr>) -> Self {
        assert!(
            registers.len() <= MAX_REGS,
            "register class exceeds MAX_REGS ({MAX_REGS})"
        );
        Self {
            name: name.into(),
            registers,
        }
    }

    /// Convenience constructor: `n` ordinary registers named `r0..rN`
    pub fn with_normal_regs(name: impl Into<String>, n: usize) -> Self {
        let registers = (0..n)
            .map(|i| RegisterDescr::new(format!("r{i}"), RegisterKind::NORMAL))
            .collect();
        Self::new(name, registers)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of registers in this class
    pub fn n_regs(&self) -> usize {
        self.registers.len()
    }

    /// Name of the register at `index`, for diagnostics
    pub fn reg_name(&self, index: usize) -> &str {
        &self.registers[index].name
    }

    pub fn kind(&self, index: usize) -> RegisterKind {
        self.registers[index].kind
    }

    pub fn registers(&self) -> &[RegisterDescr] {
        &self.registers
    }
}
