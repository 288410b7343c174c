use crate::bus::BusAccess;

use super::Cpu;
use super::bank::SLOT_R14;
use super::psr::{CpuMode, CpuState};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Exception {
    Undefined,
    SoftwareInterrupt,
    Irq,
}

impl Exception {
    pub fn vector(self) -> u32 {
        match self {
            Exception::Undefined => 0x04,
            Exception::SoftwareInterrupt => 0x08,
            Exception::Irq => 0x18,
        }
    }

    pub fn mode(self) -> CpuMode {
        match self {
            Exception::Undefined => CpuMode::Undefined,
            Exception::SoftwareInterrupt => CpuMode::Supervisor,
            Exception::Irq => CpuMode::Irq,
        }
    }
}

impl Cpu {
    /// Takes the IRQ exception unless the I bit masks it.
    pub fn signal_irq<B: BusAccess + ?Sized>(&mut self, bus: &mut B) {
        if self.cpsr.i() {
            return;
        }
        // Thumb r15 already sits one halfword pair past the next instruction.
        let return_address = match self.state() {
            CpuState::Thumb => self.regs[15],
            CpuState::Arm => self.regs[15].wrapping_sub(4),
        };
        self.take(Exception::Irq, return_address, bus);
    }

    /// Takes an exception raised by the executing instruction. r15 must
    /// still hold the value it had when the handler was entered.
    pub fn enter_exception<B: BusAccess + ?Sized>(&mut self, kind: Exception, bus: &mut B) {
        let return_address = self.regs[15].wrapping_sub(self.state().width());
        self.take(kind, return_address, bus);
    }

    fn take<B: BusAccess + ?Sized>(&mut self, kind: Exception, return_address: u32, bus: &mut B) {
        let mode = kind.mode();
        let bank = mode.bank();
        log::debug!(
            "{:?} exception from {:#010x}, lr={:#010x}",
            kind,
            self.current_instruction_address(),
            return_address
        );

        let reentered = self.cpsr.mode_bits() == mode.to_bits();
        self.set_banked_reg(bank, SLOT_R14, return_address);
        self.set_spsr_for(bank, self.cpsr.raw());
        self.switch_mode(mode);
        if reentered {
            self.regs[14] = return_address;
        }
        self.cpsr.set_t(false);
        self.cpsr.set_i(true);

        self.regs[15] = kind.vector();
        self.refill_arm(bus);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use crate::bus::Access;
    use crate::cpu::Bank;
    use crate::cpu::bank::SLOT_R13;
    use crate::cpu::tests::MockBus;

    fn bus_with_vectors() -> MockBus {
        let mut bus = MockBus::new(0x3000);
        bus.put32(0x18, 0xE1A0_0000);
        bus.put32(0x1C, 0xE1A0_0001);
        bus
    }

    #[test]
    fn masked_irq_leaves_state_untouched() {
        let mut bus = bus_with_vectors();
        let mut cpu = Cpu::new();
        cpu.set_pc(0x1000);
        cpu.write_reg(13, 0x55);
        cpu.cpsr_mut().set_i(true);
        let before = cpu.snapshot();
        cpu.signal_irq(&mut bus);
        assert_eq!(cpu.snapshot(), before);
        assert!(bus.log.is_empty());
    }

    #[test]
    fn arm_irq_entry() {
        let mut bus = bus_with_vectors();
        let mut cpu = Cpu::new();
        cpu.set_pc(0x1000);
        cpu.cpsr_mut().set_z(true);
        let old_cpsr = cpu.cpsr().raw();

        cpu.signal_irq(&mut bus);

        assert_eq!(cpu.mode(), CpuMode::Irq);
        assert_eq!(cpu.read_reg(14), 0xFFC);
        assert_eq!(cpu.spsr(), Some(old_cpsr));
        assert!(cpu.cpsr().i());
        assert!(cpu.cpsr().z());
        assert_eq!(cpu.state(), CpuState::Arm);
        assert_eq!(cpu.pc(), 0x18 + 8);
        assert_eq!(cpu.pipeline().words, [0xE1A0_0000, 0xE1A0_0001]);
        assert_eq!(bus.log, vec![(0x18, Access::NonSequential), (0x1C, Access::Sequential)]);
    }

    #[test]
    fn thumb_irq_entry_keeps_raw_pc_and_clears_thumb() {
        let mut bus = bus_with_vectors();
        let mut cpu = Cpu::new();
        cpu.cpsr_mut().set_state(CpuState::Thumb);
        cpu.set_pc(0x2004);
        let old_cpsr = cpu.cpsr().raw();

        cpu.signal_irq(&mut bus);

        assert_eq!(cpu.read_reg(14), 0x2004);
        assert_eq!(cpu.spsr(), Some(old_cpsr));
        assert!(old_cpsr & (1 << 5) != 0);
        assert_eq!(cpu.state(), CpuState::Arm);
        assert!(cpu.cpsr().i());
        assert_eq!(cpu.pc(), 0x20);
        assert_eq!(cpu.pipeline().words, [0xE1A0_0000, 0xE1A0_0001]);
    }

    #[test]
    fn irq_entry_banks_the_interrupted_sp_lr() {
        let mut bus = bus_with_vectors();
        let mut cpu = Cpu::new();
        cpu.write_reg(13, 0x0300_7F00);
        cpu.write_reg(14, 0x0800_0123);
        cpu.switch_mode(CpuMode::Irq);
        cpu.write_reg(13, 0x0300_7FA0);
        cpu.switch_mode(CpuMode::System);

        cpu.set_pc(0x400);
        cpu.signal_irq(&mut bus);
        assert_eq!(cpu.read_reg(13), 0x0300_7FA0);
        assert_eq!(cpu.banked_reg(Bank::None, SLOT_R13), 0x0300_7F00);
        assert_eq!(cpu.banked_reg(Bank::None, SLOT_R14), 0x0800_0123);
    }

    #[test]
    fn second_irq_is_masked_after_entry() {
        let mut bus = bus_with_vectors();
        let mut cpu = Cpu::new();
        cpu.set_pc(0x1000);
        cpu.signal_irq(&mut bus);
        let after_first = cpu.snapshot();
        cpu.signal_irq(&mut bus);
        assert_eq!(cpu.snapshot(), after_first);
    }

    #[test]
    fn exception_taken_from_its_own_mode_updates_live_lr() {
        let mut bus = MockBus::new(0x100);
        let mut cpu = Cpu::new();
        cpu.switch_mode(CpuMode::Supervisor);
        cpu.set_pc(0x88);
        cpu.enter_exception(Exception::SoftwareInterrupt, &mut bus);
        assert_eq!(cpu.read_reg(14), 0x84);
        assert_eq!(cpu.spsr(), Some(CpuMode::Supervisor.to_bits()));
    }

    #[test]
    fn software_interrupt_return_address_is_next_instruction() {
        let mut bus = MockBus::new(0x100);
        let mut cpu = Cpu::new();
        // Handler view of an ARM instruction at 0x40.
        cpu.set_pc(0x48);
        cpu.enter_exception(Exception::SoftwareInterrupt, &mut bus);
        assert_eq!(cpu.mode(), CpuMode::Supervisor);
        assert_eq!(cpu.read_reg(14), 0x44);
        assert_eq!(cpu.pc(), 0x10);

        let mut cpu = Cpu::new();
        cpu.cpsr_mut().set_state(CpuState::Thumb);
        cpu.set_pc(0x44);
        cpu.enter_exception(Exception::Undefined, &mut bus);
        assert_eq!(cpu.mode(), CpuMode::Undefined);
        assert_eq!(cpu.read_reg(14), 0x42);
        assert_eq!(cpu.state(), CpuState::Arm);
        assert_eq!(cpu.pc(), 0x0C);
    }

    proptest! {
        #[test]
        fn masked_irq_is_a_no_op_in_every_mode(
            regs in proptest::array::uniform16(any::<u32>()),
            mode_index in 0usize..CpuMode::ALL.len(),
            thumb in any::<bool>(),
        ) {
            let mut bus = MockBus::new(0x40);
            let mut cpu = Cpu::new();
            cpu.switch_mode(CpuMode::ALL[mode_index]);
            for (index, value) in regs.iter().enumerate() {
                cpu.write_reg(index, *value);
            }
            cpu.cpsr_mut().set_t(thumb);
            cpu.cpsr_mut().set_i(true);
            let before = cpu.snapshot();
            cpu.signal_irq(&mut bus);
            prop_assert_eq!(cpu.snapshot(), before);
            prop_assert!(bus.log.is_empty());
        }
    }
}
