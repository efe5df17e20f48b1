//! The FP variant's pool of heterogeneous multi-cycle functional units.
//!
//! The integer-only variant is modeled as a degenerate pool: exactly one
//! `Integer` unit of latency 1 (see `Pipeline::new_integer`), so the ID/EX
//! dispatch and EX completion logic in `stages.rs` is shared by both
//! variants rather than duplicated.

use crate::instruction::Instruction;
use crate::latch::Latch;

/// The class of operation a functional unit can execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitKind {
    Integer,
    Adder,
    Multiplier,
    Divider,
}

/// One functional unit: its class, fixed latency, remaining busy cycles,
/// the instruction currently resident (if any), and its own private ID/EX
/// latch (so several units can each hold one in-flight instruction).
pub struct FunctionalUnit {
    pub kind: UnitKind,
    pub latency: u32,
    pub busy: u32,
    pub instruction: Option<Instruction>,
    pub latch: Latch,
}

impl FunctionalUnit {
    pub fn new(kind: UnitKind, latency: u32) -> Self {
        Self { kind, latency, busy: 0, instruction: None, latch: Latch::undefined() }
    }

    pub fn is_free(&self) -> bool {
        self.instruction.is_none()
    }

    pub fn is_idle(&self) -> bool {
        self.instruction.is_none() && self.busy == 0
    }

    pub fn dispatch(&mut self, inst: Instruction, latch: Latch) {
        self.instruction = Some(inst);
        self.busy = self.latency;
        self.latch = latch;
        self.latch.is_available = true;
    }

    pub fn retire(&mut self) {
        self.instruction = None;
        self.busy = 0;
        self.latch = Latch::undefined();
    }
}

/// The simulator's configured set of functional units, grouped implicitly
/// by `kind` (there is no separate per-kind collection; dispatch and the
/// WAW check both scan the flat pool and filter by `kind`).
#[derive(Default)]
pub struct UnitPool {
    units: Vec<FunctionalUnit>,
}

impl UnitPool {
    pub fn new() -> Self {
        Self { units: Vec::new() }
    }

    /// Adds `instances` units of `kind` with the given `latency` to the
    /// pool. Must be called before `load_program`/`run` (spec §6).
    pub fn init_exec_unit(&mut self, kind: UnitKind, latency: u32, instances: u32) {
        for _ in 0..instances {
            self.units.push(FunctionalUnit::new(kind, latency));
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionalUnit> {
        self.units.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FunctionalUnit> {
        self.units.iter_mut()
    }

    /// The first free unit able to execute `kind`, if any (spec §4.3 unit
    /// selection).
    pub fn free_unit_for(&self, kind: UnitKind) -> Option<usize> {
        self.units.iter().position(|u| u.kind == kind && u.is_free())
    }

    /// Whether any unit of `kind` is configured at all, busy or not. Used to
    /// tell "every unit of this kind is currently busy" (a stall) apart from
    /// "no unit of this kind was ever configured" (a fatal configuration
    /// error, spec §7/§10.1).
    pub fn has_kind(&self, kind: UnitKind) -> bool {
        self.units.iter().any(|u| u.kind == kind)
    }

    pub fn get(&self, index: usize) -> &FunctionalUnit {
        &self.units[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut FunctionalUnit {
        &mut self.units[index]
    }

    /// Indices of units whose result is ready to leave EX this cycle
    /// (`busy == 0` and still holding an instruction), ascending — the
    /// lowest index is the completion winner (spec §4.4).
    pub fn ready_indices(&self) -> Vec<usize> {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.busy == 0 && u.instruction.is_some())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn all_idle(&self) -> bool {
        self.units.iter().all(FunctionalUnit::is_idle)
    }

    pub fn reset(&mut self) {
        for unit in &mut self.units {
            unit.retire();
        }
    }

    /// Outstanding units with `dest` as their destination register and
    /// whose remaining busy time is `>= new_latency` — the WAW hazard
    /// condition from spec §4.3 (compares the *new* unit's latency, not the
    /// occupant's own, per the Open Questions in SPEC_FULL.md §9).
    pub fn has_waw_conflict(&self, dest: u32, new_latency: u32) -> bool {
        self.units.iter().any(|u| {
            u.instruction.map(|inst| inst.dest) == Some(dest) && u.busy >= new_latency
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_only_pool_has_one_unit() {
        let mut pool = UnitPool::new();
        pool.init_exec_unit(UnitKind::Integer, 1, 1);
        assert_eq!(pool.len(), 1);
        assert!(pool.all_idle());
    }

    #[test]
    fn ready_indices_lowest_first() {
        let mut pool = UnitPool::new();
        pool.init_exec_unit(UnitKind::Adder, 4, 3);
        let mut inst = Instruction::nop();
        inst.dest = 1;
        pool.get_mut(2).dispatch(inst, Latch::undefined());
        pool.get_mut(2).busy = 0;
        pool.get_mut(0).dispatch(inst, Latch::undefined());
        pool.get_mut(0).busy = 0;
        assert_eq!(pool.ready_indices(), vec![0, 2]);
    }

    #[test]
    fn has_kind_distinguishes_unconfigured_from_busy() {
        let mut pool = UnitPool::new();
        pool.init_exec_unit(UnitKind::Integer, 1, 1);
        assert!(pool.has_kind(UnitKind::Integer));
        assert!(!pool.has_kind(UnitKind::Multiplier));
    }

    #[test]
    fn waw_conflict_detection() {
        let mut pool = UnitPool::new();
        pool.init_exec_unit(UnitKind::Divider, 20, 1);
        let mut inst = Instruction::nop();
        inst.dest = 1;
        pool.get_mut(0).dispatch(inst, Latch::undefined());
        pool.get_mut(0).busy = 18;
        assert!(pool.has_waw_conflict(1, 4));
        assert!(!pool.has_waw_conflict(2, 4));
    }
}
