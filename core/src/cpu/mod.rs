use std::fmt;

use crate::bus::{Access, BusAccess};
use crate::debugger::Debugger;

pub mod arm;
pub mod bank;
pub mod condition;
pub mod dispatch;
pub mod exception;
pub mod psr;
pub mod shifter;
pub mod snapshot;
pub mod thumb;

pub use bank::Bank;
pub use condition::condition_passed;
pub use dispatch::{DispatchTables, Handler};
pub use exception::Exception;
pub use psr::{Cpsr, CpuMode, CpuState};
pub use snapshot::CpuSnapshot;

use bank::BankedRegs;
use dispatch::{arm_hash, thumb_hash};

/// Loaded into both prefetch slots on reset. The NV condition never
/// executes, so stepping before a refill is harmless.
pub const PIPELINE_SENTINEL: u32 = 0xF000_0000;

/// Two prefetched instructions: slot 0 executes next, slot 1 follows it.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pipeline {
    pub words: [u32; 2],
    pub access: [Access; 2],
}

impl Default for Pipeline {
    fn default() -> Self {
        Self { words: [PIPELINE_SENTINEL; 2], access: [Access::NonSequential; 2] }
    }
}

pub struct Cpu {
    // Live view of r0..r15 for the active mode; shadows live in `banked`.
    regs: [u32; 16],
    cpsr: Cpsr,
    banked: BankedRegs,
    spsr_bank: Bank,
    pipe: Pipeline,
    tables: &'static DispatchTables,
    debugger: Option<Box<dyn Debugger>>,
}

impl fmt::Debug for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpu")
            .field("regs", &self.regs)
            .field("cpsr", &self.cpsr)
            .field("spsr_bank", &self.spsr_bank)
            .field("pipe", &self.pipe)
            .field("debugger", &self.debugger.is_some())
            .finish_non_exhaustive()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self::with_tables(DispatchTables::builtin())
    }

    pub fn with_tables(tables: &'static DispatchTables) -> Self {
        let mut cpu = Self {
            regs: [0; 16],
            cpsr: Cpsr::default(),
            banked: BankedRegs::default(),
            spsr_bank: Bank::None,
            pipe: Pipeline::default(),
            tables,
            debugger: None,
        };
        cpu.reset();
        cpu
    }

    /// Zeroes every register, shadow and status word, enters System mode and
    /// seeds the pipeline with the sentinel. A refill must follow before the
    /// first real step.
    pub fn reset(&mut self) {
        self.regs = [0; 16];
        self.banked = BankedRegs::default();
        self.cpsr.set_raw(0);
        self.spsr_bank = Bank::None;
        self.switch_mode(CpuMode::System);
        self.pipe = Pipeline::default();
        log::debug!("cpu reset");
    }

    pub fn cpsr(&self) -> Cpsr { self.cpsr }
    pub fn cpsr_mut(&mut self) -> &mut Cpsr { &mut self.cpsr }

    pub fn read_reg(&self, index: usize) -> u32 {
        debug_assert!(index < 16, "register index {index} out of range");
        self.regs[index]
    }
    pub fn write_reg(&mut self, index: usize, value: u32) {
        debug_assert!(index < 16, "register index {index} out of range");
        self.regs[index] = value;
    }

    pub fn regs(&self) -> &[u32; 16] { &self.regs }

    pub fn mode(&self) -> CpuMode { self.cpsr.mode() }
    pub fn state(&self) -> CpuState { self.cpsr.state() }

    pub fn pc(&self) -> u32 { self.regs[15] }
    pub fn set_pc(&mut self, value: u32) { self.regs[15] = value; }

    /// Address of the instruction in pipeline slot 0.
    pub fn current_instruction_address(&self) -> u32 {
        self.regs[15].wrapping_sub(self.state().lookahead())
    }

    pub fn pipeline(&self) -> &Pipeline { &self.pipe }

    pub fn tables(&self) -> &'static DispatchTables { self.tables }

    pub fn attach_debugger(&mut self, debugger: Box<dyn Debugger>) {
        self.debugger = Some(debugger);
    }

    pub fn detach_debugger(&mut self) -> Option<Box<dyn Debugger>> {
        self.debugger.take()
    }

    // ----- Pipeline primitives -----

    /// Fills both slots from [pc, pc+4] and moves pc two words ahead.
    pub fn refill_arm<B: BusAccess + ?Sized>(&mut self, bus: &mut B) {
        let pc = self.regs[15];
        self.pipe.words[0] = bus.read32(pc, Access::NonSequential);
        self.pipe.words[1] = bus.read32(pc.wrapping_add(4), Access::Sequential);
        self.pipe.access = [Access::NonSequential, Access::Sequential];
        self.regs[15] = pc.wrapping_add(8);
    }

    /// Fills both slots from [pc, pc+2] and moves pc two halfwords ahead.
    pub fn refill_thumb<B: BusAccess + ?Sized>(&mut self, bus: &mut B) {
        let pc = self.regs[15];
        self.pipe.words[0] = u32::from(bus.read16(pc, Access::NonSequential));
        self.pipe.words[1] = u32::from(bus.read16(pc.wrapping_add(2), Access::Sequential));
        self.pipe.access = [Access::NonSequential, Access::Sequential];
        self.regs[15] = pc.wrapping_add(4);
    }

    /// Refills for whichever instruction width the thumb bit selects.
    pub fn refill<B: BusAccess + ?Sized>(&mut self, bus: &mut B) {
        match self.state() {
            CpuState::Arm => self.refill_arm(bus),
            CpuState::Thumb => self.refill_thumb(bus),
        }
    }

    /// Jumps to `address` in the current state and refills.
    pub fn branch_to<B: BusAccess + ?Sized>(&mut self, bus: &mut B, address: u32) {
        let mask = match self.state() {
            CpuState::Arm => !3,
            CpuState::Thumb => !1,
        };
        self.regs[15] = address & mask;
        self.refill(bus);
    }

    pub fn set_entry_point<B: BusAccess + ?Sized>(&mut self, bus: &mut B, address: u32) {
        self.branch_to(bus, address);
    }

    /// Moves pc past the executing instruction; used by handlers that do not branch.
    pub fn advance_pc(&mut self) {
        self.regs[15] = self.regs[15].wrapping_add(self.state().width());
    }

    fn shift_pipeline(&mut self, fetched: u32) {
        self.pipe.words[0] = self.pipe.words[1];
        self.pipe.access[0] = self.pipe.access[1];
        self.pipe.words[1] = fetched;
        self.pipe.access[1] = Access::Sequential;
    }

    /// Consults the attached debugger. Returns true when the step must be
    /// skipped (a matching breakpoint reached an odd hit count).
    fn breakpoint_hit(&mut self) -> bool {
        let ip = self.current_instruction_address();
        let Some(debugger) = self.debugger.as_mut() else {
            return false;
        };
        let mut index = 0;
        while let Some(bp) = debugger.code_breakpoints().get_mut(index) {
            index += 1;
            if bp.address != ip {
                continue;
            }
            // Only the parity matters.
            bp.hit_count = bp.hit_count.wrapping_add(1);
            let hit = *bp;
            debugger.on_hit(&hit);
            if hit.hit_count % 2 == 1 {
                return true;
            }
        }
        false
    }

    // ----- Fetch / decode / execute -----

    pub fn step<B: BusAccess>(&mut self, bus: &mut B) {
        if self.debugger.is_some() && self.breakpoint_hit() {
            return;
        }

        let instr = self.pipe.words[0];
        match self.state() {
            CpuState::Thumb => {
                self.regs[15] &= !1;
                let fetched = u32::from(bus.read16(self.regs[15], Access::Sequential));
                self.shift_pipeline(fetched);

                let handler = self.tables.thumb[thumb_hash(instr)];
                #[cfg(feature = "trace_cpu")]
                log::trace!("{:#010x}: {:04x}     {}", self.regs[15].wrapping_sub(4), instr, handler.name);
                (handler.execute)(self, bus, instr);
            }
            CpuState::Arm => {
                self.regs[15] &= !3;
                let fetched = bus.read32(self.regs[15], Access::Sequential);
                self.shift_pipeline(fetched);

                if condition_passed(instr >> 28, self.cpsr) {
                    let handler = self.tables.arm[arm_hash(instr)];
                    #[cfg(feature = "trace_cpu")]
                    log::trace!("{:#010x}: {:08x} {}", self.regs[15].wrapping_sub(8), instr, handler.name);
                    (handler.execute)(self, bus, instr);
                } else {
                    #[cfg(feature = "trace_cpu")]
                    log::trace!(
                        "{:#010x}: {:08x} skipped ({})",
                        self.regs[15].wrapping_sub(8),
                        instr,
                        condition::CONDITION_NAMES[(instr >> 28) as usize]
                    );
                    self.regs[15] = self.regs[15].wrapping_add(4);
                }
            }
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
