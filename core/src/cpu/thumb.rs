//! Thumb (16-bit) reference handlers. r15 reads as the instruction address + 4.

use crate::bus::BusAccess;

use super::arm::{add_with_carry, sub_with_carry};
use super::condition::condition_passed;
use super::dispatch::Handler;
use super::exception::Exception;
use super::psr::CpuState;
use super::shifter::{ShiftType, shift_immediate};
use super::Cpu;

pub const MOVE_SHIFTED: Handler = Handler::new("thumb_shift_imm", move_shifted_register);
pub const ADD_SUBTRACT: Handler = Handler::new("thumb_add_sub", add_subtract);
pub const IMMEDIATE: Handler = Handler::new("thumb_imm8", move_compare_add_subtract_immediate);
pub const HI_REGISTER: Handler = Handler::new("thumb_hi_reg_bx", hi_register_operations);
pub const CONDITIONAL_BRANCH: Handler = Handler::new("thumb_b_cond", conditional_branch);
pub const SOFTWARE_INTERRUPT: Handler = Handler::new("thumb_swi", software_interrupt);
pub const BRANCH: Handler = Handler::new("thumb_b", unconditional_branch);
pub const LONG_BRANCH: Handler = Handler::new("thumb_bl", long_branch_with_link);

/// Handler for a representative halfword (bits 5-0 clear).
pub fn decode(instr: u32) -> Option<Handler> {
    match (instr >> 13) & 0x7 {
        0b000 if (instr >> 11) & 0x3 == 0x3 => Some(ADD_SUBTRACT),
        0b000 => Some(MOVE_SHIFTED),
        0b001 => Some(IMMEDIATE),
        0b010 if (instr >> 10) & 0x3F == 0b01_0001 => Some(HI_REGISTER),
        0b110 if (instr >> 12) & 1 != 0 => match (instr >> 8) & 0xF {
            0xF => Some(SOFTWARE_INTERRUPT),
            0xE => None,
            _ => Some(CONDITIONAL_BRANCH),
        },
        0b111 => match (instr >> 11) & 0x3 {
            0b00 => Some(BRANCH),
            0b10 | 0b11 => Some(LONG_BRANCH),
            _ => None,
        },
        _ => None,
    }
}

fn set_arith_flags(cpu: &mut Cpu, (result, carry, overflow): (u32, bool, bool)) -> u32 {
    cpu.cpsr.set_nz(result);
    cpu.cpsr.set_c(carry);
    cpu.cpsr.set_v(overflow);
    result
}

fn move_shifted_register(cpu: &mut Cpu, _bus: &mut dyn BusAccess, instr: u32) {
    let kind = ShiftType::from_bits(instr >> 11);
    let amount = (instr >> 6) & 0x1F;
    let rs = ((instr >> 3) & 0x7) as usize;
    let rd = (instr & 0x7) as usize;

    let (result, carry) = shift_immediate(kind, cpu.regs[rs], amount, cpu.cpsr.c());
    cpu.regs[rd] = result;
    cpu.cpsr.set_nz(result);
    cpu.cpsr.set_c(carry);
    cpu.advance_pc();
}

fn add_subtract(cpu: &mut Cpu, _bus: &mut dyn BusAccess, instr: u32) {
    let immediate = (instr >> 10) & 1 != 0;
    let subtract = (instr >> 9) & 1 != 0;
    let field = (instr >> 6) & 0x7;
    let rs = ((instr >> 3) & 0x7) as usize;
    let rd = (instr & 0x7) as usize;

    let a = cpu.regs[rs];
    let b = if immediate { field } else { cpu.regs[field as usize] };
    let outcome = if subtract { sub_with_carry(a, b, true) } else { add_with_carry(a, b, false) };
    cpu.regs[rd] = set_arith_flags(cpu, outcome);
    cpu.advance_pc();
}

fn move_compare_add_subtract_immediate(cpu: &mut Cpu, _bus: &mut dyn BusAccess, instr: u32) {
    let op = (instr >> 11) & 0x3;
    let rd = ((instr >> 8) & 0x7) as usize;
    let imm = instr & 0xFF;
    let value = cpu.regs[rd];

    match op {
        0 => {
            cpu.regs[rd] = imm;
            cpu.cpsr.set_nz(imm);
        }
        1 => {
            set_arith_flags(cpu, sub_with_carry(value, imm, true));
        }
        2 => cpu.regs[rd] = set_arith_flags(cpu, add_with_carry(value, imm, false)),
        _ => cpu.regs[rd] = set_arith_flags(cpu, sub_with_carry(value, imm, true)),
    }
    cpu.advance_pc();
}

fn hi_register_operations(cpu: &mut Cpu, bus: &mut dyn BusAccess, instr: u32) {
    let op = (instr >> 8) & 0x3;
    let rs = (((instr >> 3) & 0x7) | ((instr >> 3) & 0x8)) as usize;
    let rd = ((instr & 0x7) | ((instr >> 4) & 0x8)) as usize;
    let source = cpu.regs[rs];

    match op {
        0 | 2 => {
            let result = if op == 0 { cpu.regs[rd].wrapping_add(source) } else { source };
            if rd == 15 {
                cpu.branch_to(bus, result);
                return;
            }
            cpu.regs[rd] = result;
        }
        1 => {
            set_arith_flags(cpu, sub_with_carry(cpu.regs[rd], source, true));
        }
        _ => {
            let state = if source & 1 != 0 { CpuState::Thumb } else { CpuState::Arm };
            cpu.cpsr.set_state(state);
            cpu.branch_to(bus, source);
            return;
        }
    }
    cpu.advance_pc();
}

fn conditional_branch(cpu: &mut Cpu, bus: &mut dyn BusAccess, instr: u32) {
    if !condition_passed(instr >> 8, cpu.cpsr) {
        cpu.advance_pc();
        return;
    }
    let offset = ((instr as u8 as i8 as i32) << 1) as u32;
    let target = cpu.regs[15].wrapping_add(offset);
    cpu.branch_to(bus, target);
}

fn software_interrupt(cpu: &mut Cpu, bus: &mut dyn BusAccess, _instr: u32) {
    cpu.enter_exception(Exception::SoftwareInterrupt, bus);
}

fn sign_extend_11(value: u32) -> u32 {
    (((value & 0x7FF) << 21) as i32 >> 21) as u32
}

fn unconditional_branch(cpu: &mut Cpu, bus: &mut dyn BusAccess, instr: u32) {
    let target = cpu.regs[15].wrapping_add(sign_extend_11(instr) << 1);
    cpu.branch_to(bus, target);
}

fn long_branch_with_link(cpu: &mut Cpu, bus: &mut dyn BusAccess, instr: u32) {
    let low_half = (instr >> 11) & 1 != 0;
    let pc = cpu.regs[15];
    if !low_half {
        cpu.regs[14] = pc.wrapping_add(sign_extend_11(instr) << 12);
        cpu.advance_pc();
        return;
    }
    let target = cpu.regs[14].wrapping_add((instr & 0x7FF) << 1);
    cpu.regs[14] = pc.wrapping_sub(2) | 1;
    cpu.branch_to(bus, target);
}
