//! ARM (32-bit) reference handlers and the table decoder that places them.
//!
//! While a handler runs, r15 holds the executing instruction's address + 8.

use crate::bus::{Access, BusAccess};

use super::dispatch::Handler;
use super::exception::Exception;
use super::psr::{Cpsr, CpuMode, CpuState};
use super::shifter::{ShiftType, shift_immediate, shift_register};
use super::Cpu;

pub const UNDEFINED: Handler = Handler::new("undefined", undefined);
pub const DATA_PROCESSING: Handler = Handler::new("data_processing", data_processing);
pub const MRS: Handler = Handler::new("mrs", psr_read);
pub const MSR: Handler = Handler::new("msr", psr_write);
pub const MULTIPLY: Handler = Handler::new("mul", multiply);
pub const SINGLE_TRANSFER: Handler = Handler::new("ldr_str", single_data_transfer);
pub const BRANCH: Handler = Handler::new("b", branch);
pub const BRANCH_EXCHANGE: Handler = Handler::new("bx", branch_exchange);
pub const SOFTWARE_INTERRUPT: Handler = Handler::new("swi", software_interrupt);

/// Picks the handler for a representative instruction (only bits 27-20 and
/// 7-4 are meaningful). `None` leaves the slot undefined.
pub fn decode(instr: u32) -> Option<Handler> {
    let op = (instr >> 20) & 0xFF;
    let low = (instr >> 4) & 0xF;
    // Bits 24-23 = 10 with S clear: the PSR transfer / BX space.
    let psr_space = op & 0x19 == 0x10;

    match op >> 5 {
        0b000 => {
            if low == 0b1001 {
                return (op & 0xFC == 0).then_some(MULTIPLY);
            }
            if low & 0b1001 == 0b1001 {
                return None;
            }
            if op == 0x12 && low == 0b0001 {
                return Some(BRANCH_EXCHANGE);
            }
            if psr_space {
                return match (op & 0x02 != 0, low) {
                    (false, 0) => Some(MRS),
                    (true, 0) => Some(MSR),
                    _ => None,
                };
            }
            Some(DATA_PROCESSING)
        }
        0b001 if psr_space => (op & 0x02 != 0).then_some(MSR),
        0b001 => Some(DATA_PROCESSING),
        0b010 => Some(SINGLE_TRANSFER),
        0b011 => (low & 1 == 0).then_some(SINGLE_TRANSFER),
        0b101 => Some(BRANCH),
        0b111 if op & 0x10 != 0 => Some(SOFTWARE_INTERRUPT),
        _ => None,
    }
}

/// `a + b + carry` with carry-out and signed overflow.
pub(crate) fn add_with_carry(a: u32, b: u32, carry: bool) -> (u32, bool, bool) {
    let sum = u64::from(a) + u64::from(b) + u64::from(carry);
    let result = sum as u32;
    let overflow = (!(a ^ b) & (a ^ result)) >> 31 != 0;
    (result, sum > 0xFFFF_FFFF, overflow)
}

/// `a - b - !carry`; the returned carry is NOT borrow.
pub(crate) fn sub_with_carry(a: u32, b: u32, carry: bool) -> (u32, bool, bool) {
    add_with_carry(a, !b, carry)
}

fn undefined(cpu: &mut Cpu, bus: &mut dyn BusAccess, instr: u32) {
    log::warn!(
        "undefined instruction {:#010x} at {:#010x}",
        instr,
        cpu.current_instruction_address()
    );
    cpu.enter_exception(Exception::Undefined, bus);
}

fn software_interrupt(cpu: &mut Cpu, bus: &mut dyn BusAccess, _instr: u32) {
    cpu.enter_exception(Exception::SoftwareInterrupt, bus);
}

/// Operand 2 and the shifter carry. A register-specified shift reads r15 one
/// word further ahead.
fn operand2(cpu: &Cpu, instr: u32) -> (u32, bool) {
    let carry = cpu.cpsr.c();
    if instr & (1 << 25) != 0 {
        let imm = instr & 0xFF;
        let rot = ((instr >> 8) & 0xF) * 2;
        if rot == 0 {
            (imm, carry)
        } else {
            let value = imm.rotate_right(rot);
            (value, value >> 31 != 0)
        }
    } else {
        let rm = (instr & 0xF) as usize;
        let kind = ShiftType::from_bits(instr >> 5);
        if instr & (1 << 4) != 0 {
            let rs = ((instr >> 8) & 0xF) as usize;
            let value = if rm == 15 { cpu.regs[15].wrapping_add(4) } else { cpu.regs[rm] };
            shift_register(kind, value, cpu.regs[rs] & 0xFF, carry)
        } else {
            shift_immediate(kind, cpu.regs[rm], (instr >> 7) & 0x1F, carry)
        }
    }
}

/// Restores CPSR from the active SPSR, switching banks first.
fn restore_cpsr(cpu: &mut Cpu) {
    if let Some(spsr) = cpu.spsr() {
        debug_assert!(CpuMode::try_from_bits(spsr).is_some(), "spsr {spsr:#010x} holds no valid mode");
        cpu.switch_mode(CpuMode::from_bits(spsr));
        cpu.cpsr.set_raw(spsr);
    }
}

fn data_processing(cpu: &mut Cpu, bus: &mut dyn BusAccess, instr: u32) {
    let op = (instr >> 21) & 0xF;
    let s = (instr >> 20) & 1 != 0;
    let rn = ((instr >> 16) & 0xF) as usize;
    let rd = ((instr >> 12) & 0xF) as usize;
    let register_shift = instr & (1 << 25) == 0 && instr & (1 << 4) != 0;

    let (op2, shifter_carry) = operand2(cpu, instr);
    let a = if rn == 15 && register_shift { cpu.regs[15].wrapping_add(4) } else { cpu.regs[rn] };
    let c = cpu.cpsr.c();

    // (result, arithmetic carry/overflow, writes rd)
    let (result, arith, write) = match op {
        0x0 => (a & op2, None, true),                                  // AND
        0x1 => (a ^ op2, None, true),                                  // EOR
        0x2 => split(sub_with_carry(a, op2, true), true),              // SUB
        0x3 => split(sub_with_carry(op2, a, true), true),              // RSB
        0x4 => split(add_with_carry(a, op2, false), true),             // ADD
        0x5 => split(add_with_carry(a, op2, c), true),                 // ADC
        0x6 => split(sub_with_carry(a, op2, c), true),                 // SBC
        0x7 => split(sub_with_carry(op2, a, c), true),                 // RSC
        0x8 => (a & op2, None, false),                                 // TST
        0x9 => (a ^ op2, None, false),                                 // TEQ
        0xA => split(sub_with_carry(a, op2, true), false),             // CMP
        0xB => split(add_with_carry(a, op2, false), false),            // CMN
        0xC => (a | op2, None, true),                                  // ORR
        0xD => (op2, None, true),                                      // MOV
        0xE => (a & !op2, None, true),                                 // BIC
        _ => (!op2, None, true),                                       // MVN
    };

    if write && rd == 15 {
        if s {
            restore_cpsr(cpu);
        }
        cpu.branch_to(bus, result);
        return;
    }

    if s || !write {
        cpu.cpsr.set_nz(result);
        match arith {
            Some((carry, overflow)) => {
                cpu.cpsr.set_c(carry);
                cpu.cpsr.set_v(overflow);
            }
            None => cpu.cpsr.set_c(shifter_carry),
        }
    }
    if write {
        cpu.regs[rd] = result;
    }
    cpu.advance_pc();
}

fn split((result, carry, overflow): (u32, bool, bool), write: bool) -> (u32, Option<(bool, bool)>, bool) {
    (result, Some((carry, overflow)), write)
}

fn psr_read(cpu: &mut Cpu, _bus: &mut dyn BusAccess, instr: u32) {
    let rd = ((instr >> 12) & 0xF) as usize;
    let use_spsr = (instr >> 22) & 1 != 0;
    cpu.regs[rd] = match cpu.spsr() {
        Some(spsr) if use_spsr => spsr,
        _ => cpu.cpsr.raw(),
    };
    cpu.advance_pc();
}

fn psr_write(cpu: &mut Cpu, _bus: &mut dyn BusAccess, instr: u32) {
    let use_spsr = (instr >> 22) & 1 != 0;
    let operand = if instr & (1 << 25) != 0 {
        let rot = ((instr >> 8) & 0xF) * 2;
        (instr & 0xFF).rotate_right(rot)
    } else {
        cpu.regs[(instr & 0xF) as usize]
    };

    let privileged = cpu.mode().is_privileged();
    let mut mask = 0;
    if (instr >> 19) & 1 != 0 {
        mask |= Cpsr::FLAGS_MASK;
    }
    if (instr >> 16) & 1 != 0 && privileged {
        mask |= Cpsr::CONTROL_MASK;
    }

    if use_spsr {
        if let Some(spsr) = cpu.spsr() {
            cpu.set_spsr((spsr & !mask) | (operand & mask));
        }
    } else {
        let old = cpu.cpsr.raw();
        // The thumb bit only changes through BX and exception return.
        let mask = mask & !(1 << 5);
        let new = (old & !mask) | (operand & mask);
        debug_assert!(CpuMode::try_from_bits(new).is_some(), "msr writes invalid mode bits {:#04x}", new & 0x1F);
        if new & 0x1F != old & 0x1F {
            cpu.switch_mode(CpuMode::from_bits(new));
        }
        cpu.cpsr.set_raw(new);
    }
    cpu.advance_pc();
}

fn multiply(cpu: &mut Cpu, _bus: &mut dyn BusAccess, instr: u32) {
    let accumulate = (instr >> 21) & 1 != 0;
    let s = (instr >> 20) & 1 != 0;
    let rd = ((instr >> 16) & 0xF) as usize;
    let rn = ((instr >> 12) & 0xF) as usize;
    let rs = ((instr >> 8) & 0xF) as usize;
    let rm = (instr & 0xF) as usize;

    let mut result = cpu.regs[rm].wrapping_mul(cpu.regs[rs]);
    if accumulate {
        result = result.wrapping_add(cpu.regs[rn]);
    }
    cpu.regs[rd] = result;
    if s {
        // C is left as-is; V is unaffected.
        cpu.cpsr.set_nz(result);
    }
    cpu.advance_pc();
}

fn single_data_transfer(cpu: &mut Cpu, bus: &mut dyn BusAccess, instr: u32) {
    let register_offset = (instr >> 25) & 1 != 0;
    let pre = (instr >> 24) & 1 != 0;
    let up = (instr >> 23) & 1 != 0;
    let byte = (instr >> 22) & 1 != 0;
    let write_back = (instr >> 21) & 1 != 0;
    let load = (instr >> 20) & 1 != 0;
    let rn = ((instr >> 16) & 0xF) as usize;
    let rd = ((instr >> 12) & 0xF) as usize;

    let offset = if register_offset {
        let rm = (instr & 0xF) as usize;
        let kind = ShiftType::from_bits(instr >> 5);
        shift_immediate(kind, cpu.regs[rm], (instr >> 7) & 0x1F, cpu.cpsr.c()).0
    } else {
        instr & 0xFFF
    };

    let base = cpu.regs[rn];
    let offset_base = if up { base.wrapping_add(offset) } else { base.wrapping_sub(offset) };
    let address = if pre { offset_base } else { base };

    if load {
        let value = if byte {
            u32::from(bus.read8(address, Access::NonSequential))
        } else {
            bus.read32(address & !3, Access::NonSequential).rotate_right((address & 3) * 8)
        };
        if !pre || write_back {
            cpu.regs[rn] = offset_base;
        }
        if rd == 15 {
            cpu.regs[15] = value & !3;
            cpu.refill_arm(bus);
            return;
        }
        cpu.regs[rd] = value;
    } else {
        // Stored r15 is the instruction address + 12.
        let value = if rd == 15 { cpu.regs[15].wrapping_add(4) } else { cpu.regs[rd] };
        if byte {
            bus.write8(address, value as u8, Access::NonSequential);
        } else {
            bus.write32(address & !3, value, Access::NonSequential);
        }
        if !pre || write_back {
            cpu.regs[rn] = offset_base;
        }
    }
    cpu.advance_pc();
}

fn branch(cpu: &mut Cpu, bus: &mut dyn BusAccess, instr: u32) {
    let offset = (((instr & 0x00FF_FFFF) << 8) as i32 >> 6) as u32;
    let pc = cpu.regs[15];
    if (instr >> 24) & 1 != 0 {
        cpu.regs[14] = pc.wrapping_sub(4);
    }
    cpu.regs[15] = pc.wrapping_add(offset);
    cpu.refill_arm(bus);
}

fn branch_exchange(cpu: &mut Cpu, bus: &mut dyn BusAccess, instr: u32) {
    if instr & 0x0FFF_FFF0 != 0x012F_FF10 {
        undefined(cpu, bus, instr);
        return;
    }
    let target = cpu.regs[(instr & 0xF) as usize];
    let state = if target & 1 != 0 { CpuState::Thumb } else { CpuState::Arm };
    cpu.cpsr.set_state(state);
    cpu.branch_to(bus, target);
}
