//! Banked register shadows and the mode switch that swaps them.
//!
//! Every bank has seven shadow slots laid out as r13, r14, r8..r12. Only the
//! FIQ bank and the shared User/System bank use the r8..r12 slots; the other
//! privileged banks shadow r13/r14 alone.

use super::Cpu;
use super::psr::CpuMode;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Bank {
    None,
    Fiq,
    Irq,
    Supervisor,
    Abort,
    Undefined,
}

impl Bank {
    pub const COUNT: usize = 6;
    pub const ALL: [Bank; Bank::COUNT] = [
        Bank::None,
        Bank::Fiq,
        Bank::Irq,
        Bank::Supervisor,
        Bank::Abort,
        Bank::Undefined,
    ];

    pub fn index(self) -> usize {
        match self {
            Bank::None => 0,
            Bank::Fiq => 1,
            Bank::Irq => 2,
            Bank::Supervisor => 3,
            Bank::Abort => 4,
            Bank::Undefined => 5,
        }
    }
}

pub const SLOT_R13: usize = 0;
pub const SLOT_R14: usize = 1;
/// First of the five r8..r12 slots.
pub const SLOT_R8: usize = 2;
pub const SLOTS: usize = 7;

#[derive(Default, Clone, Eq, PartialEq, Debug)]
pub(crate) struct BankedRegs {
    pub regs: [[u32; SLOTS]; Bank::COUNT],
    pub spsr: [u32; Bank::COUNT],
}

impl Cpu {
    /// Enters `new_mode`, swapping banked registers when the bank changes.
    /// Re-entering the current mode does nothing.
    pub fn switch_mode(&mut self, new_mode: CpuMode) {
        if self.cpsr.mode_bits() == new_mode.to_bits() {
            return;
        }

        let old_bank = self.cpsr.mode().bank();
        let new_bank = new_mode.bank();

        log::debug!("mode {:?} -> {:?}", CpuMode::try_from_bits(self.cpsr.mode_bits()), new_mode);
        self.cpsr.set_mode(new_mode);

        if old_bank == new_bank {
            return;
        }

        if old_bank == Bank::Fiq || new_bank == Bank::Fiq {
            let old_gpr = if old_bank == Bank::Fiq { Bank::Fiq } else { Bank::None };
            let new_gpr = if new_bank == Bank::Fiq { Bank::Fiq } else { Bank::None };
            self.banked.regs[old_gpr.index()][SLOT_R8..].copy_from_slice(&self.regs[8..=12]);
            self.regs[8..=12].copy_from_slice(&self.banked.regs[new_gpr.index()][SLOT_R8..]);
        }

        let old = &mut self.banked.regs[old_bank.index()];
        old[SLOT_R13] = self.regs[13];
        old[SLOT_R14] = self.regs[14];

        let new = &self.banked.regs[new_bank.index()];
        self.regs[13] = new[SLOT_R13];
        self.regs[14] = new[SLOT_R14];

        self.spsr_bank = new_bank;
    }

    /// Bank the active mode saves its status into.
    pub fn spsr_bank(&self) -> Bank { self.spsr_bank }

    /// SPSR of the active mode, or `None` in User/System.
    pub fn spsr(&self) -> Option<u32> {
        match self.spsr_bank {
            Bank::None => None,
            bank => Some(self.banked.spsr[bank.index()]),
        }
    }

    pub fn set_spsr(&mut self, value: u32) {
        debug_assert!(self.spsr_bank != Bank::None, "no SPSR in {:?} mode", self.mode());
        self.banked.spsr[self.spsr_bank.index()] = value;
    }

    pub fn spsr_for(&self, bank: Bank) -> u32 { self.banked.spsr[bank.index()] }
    pub(crate) fn set_spsr_for(&mut self, bank: Bank, value: u32) {
        self.banked.spsr[bank.index()] = value;
    }

    /// Shadow copy held in `bank`. Stale for the active bank: the live
    /// value is in the register file.
    pub fn banked_reg(&self, bank: Bank, slot: usize) -> u32 {
        debug_assert!(slot < SLOTS);
        self.banked.regs[bank.index()][slot]
    }
    pub(crate) fn set_banked_reg(&mut self, bank: Bank, slot: usize, value: u32) {
        debug_assert!(slot < SLOTS);
        self.banked.regs[bank.index()][slot] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_live(cpu: &mut Cpu, seed: u32) {
        for r in 0..15 {
            cpu.write_reg(r, seed.wrapping_mul(0x0101_0101).wrapping_add(r as u32));
        }
    }

    #[test]
    fn banked_sp_lr_switching() {
        let mut cpu = Cpu::new();
        cpu.write_reg(13, 0xAAAABBBB);
        cpu.write_reg(14, 0xCCCCDDDD);

        cpu.switch_mode(CpuMode::Irq);
        cpu.write_reg(13, 0x11112222);
        cpu.write_reg(14, 0x33334444);

        cpu.switch_mode(CpuMode::Supervisor);
        cpu.write_reg(13, 0x55556666);
        cpu.write_reg(14, 0x77778888);

        cpu.switch_mode(CpuMode::System);
        assert_eq!(cpu.read_reg(13), 0xAAAABBBB);
        assert_eq!(cpu.read_reg(14), 0xCCCCDDDD);

        cpu.switch_mode(CpuMode::Irq);
        assert_eq!(cpu.read_reg(13), 0x11112222);
        assert_eq!(cpu.read_reg(14), 0x33334444);

        cpu.switch_mode(CpuMode::Supervisor);
        assert_eq!(cpu.read_reg(13), 0x55556666);
        assert_eq!(cpu.read_reg(14), 0x77778888);
    }

    #[test]
    fn fiq_r8_r12_banked() {
        let mut cpu = Cpu::new();
        for i in 8..=12 { cpu.write_reg(i, 0x1000_0000 + i as u32); }

        cpu.switch_mode(CpuMode::Fiq);
        for i in 8..=12 { cpu.write_reg(i, 0x2000_0000 + i as u32); }

        cpu.switch_mode(CpuMode::System);
        for i in 8..=12 { assert_eq!(cpu.read_reg(i), 0x1000_0000 + i as u32); }

        cpu.switch_mode(CpuMode::Fiq);
        for i in 8..=12 { assert_eq!(cpu.read_reg(i), 0x2000_0000 + i as u32); }
    }

    #[test]
    fn non_fiq_switch_leaves_r8_r12_alone() {
        let mut cpu = Cpu::new();
        for i in 8..=12 { cpu.write_reg(i, i as u32); }
        cpu.switch_mode(CpuMode::Abort);
        for i in 8..=12 { cpu.write_reg(i, 0x100 + i as u32); }
        cpu.switch_mode(CpuMode::Undefined);
        for i in 8..=12 { assert_eq!(cpu.read_reg(i), 0x100 + i as u32); }
    }

    #[test]
    fn switching_to_current_mode_is_a_no_op() {
        for mode in CpuMode::ALL {
            let mut cpu = Cpu::new();
            fill_live(&mut cpu, 3);
            cpu.switch_mode(mode);
            let once = cpu.snapshot();
            cpu.switch_mode(mode);
            assert_eq!(cpu.snapshot(), once, "{mode:?}");
        }
    }

    #[test]
    fn user_system_switch_only_rewrites_mode_field() {
        let mut cpu = Cpu::new();
        fill_live(&mut cpu, 5);
        let before = *cpu.regs();
        cpu.switch_mode(CpuMode::User);
        assert_eq!(cpu.mode(), CpuMode::User);
        assert_eq!(cpu.regs(), &before);
        assert_eq!(cpu.spsr_bank(), Bank::None);
    }

    #[test]
    fn a_b_a_round_trip_restores_registers() {
        for a in CpuMode::ALL {
            for b in CpuMode::ALL {
                let mut cpu = Cpu::new();
                cpu.switch_mode(a);
                fill_live(&mut cpu, 7);
                let before = *cpu.regs();

                cpu.switch_mode(b);
                if a.bank() != b.bank() {
                    fill_live(&mut cpu, 11);
                }
                cpu.switch_mode(a);

                assert_eq!(cpu.read_reg(13), before[13], "{a:?}->{b:?} r13");
                assert_eq!(cpu.read_reg(14), before[14], "{a:?}->{b:?} r14");
                if a.bank() == Bank::Fiq || b.bank() == Bank::Fiq {
                    assert_eq!(&cpu.regs()[8..=12], &before[8..=12], "{a:?}->{b:?} r8-r12");
                }
                assert_eq!(cpu.mode(), a);
                assert_eq!(cpu.spsr_bank(), a.bank());
            }
        }
    }

    #[test]
    fn spsr_reference_follows_the_new_mode() {
        let mut cpu = Cpu::new();
        cpu.switch_mode(CpuMode::Irq);
        cpu.set_spsr(0xDEAD_BEEF);
        assert_eq!(cpu.spsr(), Some(0xDEAD_BEEF));
        cpu.switch_mode(CpuMode::Supervisor);
        assert_eq!(cpu.spsr(), Some(0));
        cpu.switch_mode(CpuMode::System);
        assert_eq!(cpu.spsr(), None);
        cpu.switch_mode(CpuMode::Irq);
        assert_eq!(cpu.spsr(), Some(0xDEAD_BEEF));
        assert_eq!(cpu.spsr_for(Bank::Irq), 0xDEAD_BEEF);
    }

    #[test]
    fn leaving_a_mode_saves_its_shadow() {
        let mut cpu = Cpu::new();
        cpu.switch_mode(CpuMode::Fiq);
        cpu.write_reg(13, 0x300);
        cpu.write_reg(10, 0xA);
        cpu.switch_mode(CpuMode::User);
        assert_eq!(cpu.banked_reg(Bank::Fiq, SLOT_R13), 0x300);
        assert_eq!(cpu.banked_reg(Bank::Fiq, SLOT_R8 + 2), 0xA);
    }
}
