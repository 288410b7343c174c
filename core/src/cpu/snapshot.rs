use super::bank::{BankedRegs, SLOTS};
use super::psr::Cpsr;
use super::{Bank, Cpu, Pipeline};

/// Plain copy of the architectural state. Dispatch tables and any attached
/// debugger are not part of it.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CpuSnapshot {
    pub regs: [u32; 16],
    pub cpsr: u32,
    pub spsr: [u32; Bank::COUNT],
    pub banked: [[u32; SLOTS]; Bank::COUNT],
    pub spsr_bank: Bank,
    pub pipe: Pipeline,
}

impl Cpu {
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            regs: self.regs,
            cpsr: self.cpsr.raw(),
            spsr: self.banked.spsr,
            banked: self.banked.regs,
            spsr_bank: self.spsr_bank,
            pipe: self.pipe,
        }
    }

    /// Overwrites the state wholesale. No banking happens; the snapshot
    /// already holds the live registers of its own mode.
    pub fn restore(&mut self, snapshot: &CpuSnapshot) {
        self.regs = snapshot.regs;
        self.cpsr = Cpsr::from_raw(snapshot.cpsr);
        self.banked = BankedRegs { regs: snapshot.banked, spsr: snapshot.spsr };
        self.spsr_bank = snapshot.spsr_bank;
        self.pipe = snapshot.pipe;
    }
}
