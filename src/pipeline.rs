//! The simulator driver.
//!
//! Owns every piece of mutable state the stage handlers touch and advances
//! the clock, grounded on `sim_pipe::run`/`reset`/`get_sp_register` in the
//! original source. The key design decision, preserved verbatim, is
//! **reverse-order stage invocation**: each cycle runs WB, MEM, EX, ID, IF,
//! so a downstream stage consumes what its upstream neighbor produced last
//! cycle before that neighbor overwrites it this cycle. This models
//! synchronous latches without a second buffer per stage.

use std::path::Path;

use crate::error::SimulatorResult;
use crate::functional_unit::{UnitKind, UnitPool};
use crate::instruction::Instruction;
use crate::latch::{Latch, LatchBank, SpRegister, Stage, STAGES};
use crate::memory::DataMemory;
use crate::parser;
use crate::register::{RegisterFile, UNDEFINED};
use crate::stages;

/// Diagnostic and summary flags, orthogonal to the pipeline's own timing
/// state. The CLI's `--verbose`/`--history` flags map straight onto this.
#[derive(Clone, Copy, Debug, Default)]
pub struct Policy {
    pub verbose: bool,
    pub history: bool,
}

/// A five-stage pipelined simulator. One core engine parameterized by its
/// functional-unit pool: the integer-only configuration is just this engine
/// with a single `INTEGER` unit of latency 1 and an empty FP register file.
pub struct Pipeline {
    pub(crate) instr_memory: Vec<Instruction>,
    pub(crate) instr_base_address: u32,
    pub(crate) data_memory: DataMemory,
    pub(crate) data_memory_latency: u32,
    pub(crate) int_regs: RegisterFile,
    pub(crate) fp_regs: RegisterFile,
    pub(crate) latches: LatchBank,
    pub(crate) units: UnitPool,
    pub(crate) is_memory_ongoing: bool,
    pub(crate) is_branch_ongoing: bool,
    pub(crate) is_branch_calculated: bool,
    pub(crate) control_delay: u32,
    pub(crate) mem_delay: u32,
    pub(crate) instructions_executed: u64,
    pub(crate) stalls: u64,
    pub(crate) clock_cycles: u64,
    pub(crate) last_dispatched_unit: Option<usize>,
    pub policy: Policy,
}

impl Pipeline {
    /// A bare engine with no functional units configured. The FP variant
    /// must call [`Pipeline::init_exec_unit`] for every opcode class its
    /// program uses before [`Pipeline::load_program`]/[`Pipeline::run`].
    pub fn new(data_memory_size: usize, data_memory_latency: u32, policy: Policy) -> Self {
        let mut pipeline = Self {
            instr_memory: Vec::new(),
            instr_base_address: 0,
            data_memory: DataMemory::new(data_memory_size),
            data_memory_latency,
            int_regs: RegisterFile::new(true),
            fp_regs: RegisterFile::new(false),
            latches: LatchBank::new(),
            units: UnitPool::new(),
            is_memory_ongoing: false,
            is_branch_ongoing: false,
            is_branch_calculated: false,
            control_delay: 0,
            mem_delay: 0,
            instructions_executed: 0,
            stalls: 0,
            clock_cycles: 0,
            last_dispatched_unit: None,
            policy,
        };
        pipeline.reset();
        pipeline
    }

    /// The integer-only configuration: one `INTEGER` unit of latency 1,
    /// matching the non-FP historical simulator exactly (spec §9).
    pub fn new_integer(data_memory_size: usize, data_memory_latency: u32, policy: Policy) -> Self {
        let mut pipeline = Self::new(data_memory_size, data_memory_latency, policy);
        pipeline.init_exec_unit(UnitKind::Integer, 1, 1);
        pipeline
    }

    /// Adds `instances` functional units of `kind` and `latency` to the
    /// pool. Must be called before [`Pipeline::load_program`]/[`Pipeline::run`].
    pub fn init_exec_unit(&mut self, kind: UnitKind, latency: u32, instances: u32) {
        self.units.init_exec_unit(kind, latency, instances);
    }

    /// Parses `path` into instruction memory at `base`, resolving branch
    /// labels, and seeds `IF.PC`.
    ///
    /// Fatal rather than a stall (spec §7/§10.1): if the program uses an
    /// opcode class with no functional unit configured for it, `id_stage`
    /// would otherwise stall on it forever since a unit for that class can
    /// never become free.
    pub fn load_program(&mut self, path: &Path, base: u32) -> SimulatorResult<()> {
        let instructions = parser::parse_program(path)?;
        for instruction in &instructions {
            let kind = instruction.opcode.unit_kind();
            if !self.units.has_kind(kind) {
                return Err(crate::error::ConfigError::NoFunctionalUnit { opcode: instruction.opcode }.into());
            }
        }

        self.instr_memory = instructions;
        self.instr_base_address = base;
        self.latches[Stage::If].pc = base;
        self.latches[Stage::If].is_available = true;
        Ok(())
    }

    /// Resets all latches, register files, counters, and functional units to
    /// their initial state.
    pub fn reset(&mut self) {
        self.int_regs.reset();
        self.fp_regs.reset();
        for latch in self.latches.iter_mut() {
            *latch = Latch::undefined();
        }
        self.latches[Stage::If].is_available = true;
        self.units.reset();
        self.is_memory_ongoing = false;
        self.is_branch_ongoing = false;
        self.is_branch_calculated = false;
        self.control_delay = 0;
        self.mem_delay = 0;
        self.instructions_executed = 0;
        self.stalls = 0;
        self.clock_cycles = 0;
        self.last_dispatched_unit = None;
    }

    /// Advances the clock. `cycles == 0` runs to completion (until `WB.IR`
    /// is `EOP`); otherwise runs exactly `cycles` cycles.
    pub fn run(&mut self, cycles: u64) {
        let mut elapsed = 0u64;
        loop {
            let run_to_completion = cycles == 0;
            if run_to_completion {
                if self.latches[Stage::Wb].ir.opcode == crate::instruction::Opcode::Eop {
                    break;
                }
            } else if elapsed >= cycles {
                break;
            }

            self.clock_cycles += 1;
            stages::wb_stage(self);
            stages::mem_stage(self);
            stages::ex_stage(self);
            stages::id_stage(self);
            stages::if_stage(self);
            elapsed += 1;
        }

        if self.policy.history {
            eprintln!(
                "cycles={} instructions={} stalls={} ipc={:.4}",
                self.clock_cycles,
                self.instructions_executed,
                self.stalls,
                self.ipc(),
            );
        }
    }

    pub fn write_memory(&mut self, address: u32, value: u32) {
        self.data_memory.write_word(address, value);
    }

    pub fn get_int_register(&self, index: u32) -> u32 {
        self.int_regs.read(index)
    }

    pub fn get_fp_register(&self, index: u32) -> u32 {
        self.fp_regs.read(index)
    }

    /// Alias kept for parity with the historical `get_gp_register` name.
    pub fn get_gp_register(&self, index: u32) -> u32 {
        self.get_int_register(index)
    }

    pub fn set_int_register(&mut self, index: u32, value: u32) {
        self.int_regs.write(index, value);
    }

    pub fn set_fp_register(&mut self, index: u32, value: u32) {
        self.fp_regs.write(index, value);
    }

    /// Reads one field of one stage's latch. For `Stage::Ex`, since several
    /// functional units may be mid-flight at once, this reports the latch
    /// of the most recently *dispatched* unit rather than a single shared
    /// register — an unavoidable simplification once EX stops being one
    /// combinational stage (see SPEC_FULL.md §9).
    pub fn get_sp_register(&self, reg: SpRegister, stage: Stage) -> u32 {
        if stage == Stage::Ex {
            return match self.last_dispatched_unit {
                Some(idx) => self.units.get(idx).latch.field(reg),
                None => UNDEFINED,
            };
        }
        self.latches[stage].field(reg)
    }

    pub fn instructions_executed(&self) -> u64 {
        self.instructions_executed
    }

    pub fn stalls(&self) -> u64 {
        self.stalls
    }

    pub fn clock_cycles(&self) -> u64 {
        self.clock_cycles
    }

    pub fn ipc(&self) -> f64 {
        if self.clock_cycles == 0 {
            0.0
        } else {
            self.instructions_executed as f64 / self.clock_cycles as f64
        }
    }

    pub fn print_registers(&self) {
        println!("Special purpose registers:");
        for &stage in &STAGES {
            println!("Stage: {stage:?}");
            for &reg in &[
                SpRegister::Pc,
                SpRegister::Npc,
                SpRegister::A,
                SpRegister::B,
                SpRegister::Imm,
                SpRegister::AluOutput,
                SpRegister::Lmd,
            ] {
                let value = self.get_sp_register(reg, stage);
                if value != UNDEFINED {
                    println!("  {reg:?} = {value} / {value:#010x}");
                }
            }
        }
        println!("General purpose registers:");
        for i in 0..crate::register::REGISTER_FILE_SIZE as u32 {
            let value = self.get_int_register(i);
            if value != UNDEFINED {
                println!("  R{i} = {value} / {value:#010x}");
            }
        }
    }

    pub fn print_memory(&self, start: u32, end: u32) {
        self.data_memory.print_range(start, end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn program(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "mipssim-pipeline-test-{:?}-{}.asm",
            std::thread::current().id(),
            contents.len()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn integer_pipeline() -> Pipeline {
        Pipeline::new_integer(256, 0, Policy::default())
    }

    /// S1 — simple arithmetic.
    #[test]
    fn simple_arithmetic_scenario() {
        let path = program("ADDI R1 R0 5\nADDI R2 R0 7\nADD R3 R1 R2\nEOP\n");
        let mut sim = integer_pipeline();
        sim.load_program(&path, 0).unwrap();
        sim.run(0);

        assert_eq!(sim.get_int_register(1), 5);
        assert_eq!(sim.get_int_register(2), 7);
        assert_eq!(sim.get_int_register(3), 12);
        assert_eq!(sim.instructions_executed(), 3);
        assert_eq!(sim.clock_cycles(), sim.instructions_executed() + sim.stalls() + 4);
    }

    /// S2 — load-use hazard.
    #[test]
    fn load_use_hazard_scenario() {
        let path = program("LW R1 0(R0)\nADD R2 R1 R1\nEOP\n");
        let mut sim = Pipeline::new_integer(256, 2, Policy::default());
        sim.write_memory(0, 10);
        sim.load_program(&path, 0).unwrap();
        sim.run(0);

        assert_eq!(sim.get_int_register(1), 10);
        assert_eq!(sim.get_int_register(2), 20);
    }

    /// S3 — taken branch.
    #[test]
    fn taken_branch_scenario() {
        let path = program("ADDI R1 R0 1\nBNEZ R1 L\nADDI R2 R0 99\nL: ADDI R3 R0 42\nEOP\n");
        let mut sim = integer_pipeline();
        sim.load_program(&path, 0).unwrap();
        sim.run(0);

        assert_eq!(sim.get_int_register(1), 1);
        assert_eq!(sim.get_int_register(3), 42);
        assert_eq!(sim.get_int_register(2), UNDEFINED);
    }

    /// S4 — not-taken branch.
    #[test]
    fn not_taken_branch_scenario() {
        let path = program("ADDI R1 R0 0\nBNEZ R1 L\nADDI R2 R0 5\nL: ADDI R3 R0 7\nEOP\n");
        let mut sim = integer_pipeline();
        sim.load_program(&path, 0).unwrap();
        sim.run(0);

        assert_eq!(sim.get_int_register(1), 0);
        assert_eq!(sim.get_int_register(2), 5);
        assert_eq!(sim.get_int_register(3), 7);
    }

    /// S5 — FP multi-latency functional units.
    #[test]
    fn fp_multi_latency_scenario() {
        let path = program("LWS F1 0(R0)\nLWS F2 4(R0)\nMULTS F3 F1 F2\nADDS F4 F3 F1\nEOP\n");
        let mut sim = Pipeline::new(256, 0, Policy::default());
        sim.init_exec_unit(UnitKind::Integer, 1, 1);
        sim.init_exec_unit(UnitKind::Multiplier, 10, 1);
        sim.init_exec_unit(UnitKind::Adder, 4, 1);
        sim.write_memory(0, 2.0f32.to_bits());
        sim.write_memory(4, 4.0f32.to_bits());
        sim.load_program(&path, 0).unwrap();
        sim.run(0);

        let f3 = f32::from_bits(sim.get_fp_register(3));
        let f4 = f32::from_bits(sim.get_fp_register(4));
        assert_eq!(f3, 8.0);
        assert_eq!(f4, 10.0);
    }

    /// S6 — WAW stall between a slow divide and a fast add to the same
    /// destination register.
    #[test]
    fn waw_stall_scenario() {
        let path = program("DIVS F1 F2 F3\nADDS F1 F4 F5\nEOP\n");
        let mut sim = Pipeline::new(256, 0, Policy::default());
        sim.init_exec_unit(UnitKind::Integer, 1, 1);
        sim.init_exec_unit(UnitKind::Divider, 20, 1);
        sim.init_exec_unit(UnitKind::Adder, 4, 1);
        sim.set_fp_register(2, 8.0f32.to_bits());
        sim.set_fp_register(3, 2.0f32.to_bits());
        sim.set_fp_register(4, 1.0f32.to_bits());
        sim.set_fp_register(5, 1.0f32.to_bits());
        sim.load_program(&path, 0).unwrap();
        sim.run(0);

        assert_eq!(f32::from_bits(sim.get_fp_register(1)), 2.0);
        assert!(sim.stalls() > 0);
    }

    #[test]
    fn missing_functional_unit_is_a_fatal_config_error() {
        let path = program("MULTS F3 F1 F2\nEOP\n");
        let mut sim = Pipeline::new(256, 0, Policy::default());
        sim.init_exec_unit(UnitKind::Integer, 1, 1);

        let err = sim.load_program(&path, 0).unwrap_err();
        assert!(matches!(
            err,
            crate::error::SimulatorError::ConfigError(crate::error::ConfigError::NoFunctionalUnit { .. })
        ));
    }

    #[test]
    fn reset_clears_counters_and_latches() {
        let path = program("ADDI R1 R0 5\nEOP\n");
        let mut sim = integer_pipeline();
        sim.load_program(&path, 0).unwrap();
        sim.run(0);
        assert!(sim.instructions_executed() > 0);

        sim.reset();
        assert_eq!(sim.instructions_executed(), 0);
        assert_eq!(sim.clock_cycles(), 0);
        assert_eq!(sim.get_int_register(1), UNDEFINED);
    }
}
