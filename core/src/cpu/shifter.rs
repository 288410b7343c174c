// Barrel shifter shared by the ARM and Thumb handlers.

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ShiftType { Lsl, Lsr, Asr, Ror }

impl ShiftType {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => ShiftType::Lsl,
            1 => ShiftType::Lsr,
            2 => ShiftType::Asr,
            _ => ShiftType::Ror,
        }
    }
}

/// Shift by a 5-bit instruction immediate. An amount of zero encodes
/// LSR #32, ASR #32 and RRX for the three right shifts.
pub fn shift_immediate(kind: ShiftType, value: u32, amount: u32, carry_in: bool) -> (u32, bool) {
    let amount = amount & 0x1F;
    match (kind, amount) {
        (ShiftType::Lsl, 0) => (value, carry_in),
        (ShiftType::Lsr | ShiftType::Asr, 0) => shift_register(kind, value, 32, carry_in),
        (ShiftType::Ror, 0) => (((carry_in as u32) << 31) | (value >> 1), value & 1 != 0),
        _ => shift_register(kind, value, amount, carry_in),
    }
}

/// Shift by the bottom byte of a register. Zero leaves value and carry alone.
pub fn shift_register(kind: ShiftType, value: u32, amount: u32, carry_in: bool) -> (u32, bool) {
    let n = amount & 0xFF;
    if n == 0 {
        return (value, carry_in);
    }
    match kind {
        ShiftType::Lsl => match n {
            1..=31 => (value << n, (value >> (32 - n)) & 1 != 0),
            32 => (0, value & 1 != 0),
            _ => (0, false),
        },
        ShiftType::Lsr => match n {
            1..=31 => (value >> n, (value >> (n - 1)) & 1 != 0),
            32 => (0, value >> 31 != 0),
            _ => (0, false),
        },
        ShiftType::Asr => match n {
            1..=31 => (((value as i32) >> n) as u32, (value >> (n - 1)) & 1 != 0),
            _ => (((value as i32) >> 31) as u32, value >> 31 != 0),
        },
        ShiftType::Ror => {
            let result = value.rotate_right(n & 31);
            (result, result >> 31 != 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ShiftType::*;

    #[test]
    fn lsl_immediate_edges() {
        assert_eq!(shift_immediate(Lsl, 0x1234_5678, 0, true), (0x1234_5678, true));
        assert_eq!(shift_immediate(Lsl, 0x8000_0001, 1, false), (0x0000_0002, true));
        assert_eq!(shift_immediate(Lsl, 0x0000_0001, 31, false), (0x8000_0000, false));
    }

    #[test]
    fn zero_immediate_right_shifts_mean_thirty_two() {
        assert_eq!(shift_immediate(Lsr, 0x8000_0000, 0, false), (0, true));
        assert_eq!(shift_immediate(Asr, 0x8000_0000, 0, false), (0xFFFF_FFFF, true));
        assert_eq!(shift_immediate(Asr, 0x7FFF_FFFF, 0, true), (0, false));
    }

    #[test]
    fn ror_immediate_and_rrx() {
        assert_eq!(shift_immediate(Ror, 0x0000_0001, 0, true), (0x8000_0000, true));
        assert_eq!(shift_immediate(Ror, 0x0000_0002, 0, false), (0x0000_0001, false));
        assert_eq!(shift_immediate(Ror, 0x1234_5678, 28, false), (0x2345_6781, false));
        assert_eq!(shift_immediate(Ror, 0x0000_0001, 1, false), (0x8000_0000, true));
    }

    #[test]
    fn asr_keeps_sign() {
        assert_eq!(shift_immediate(Asr, 0xF000_0001, 4, false), (0xFF00_0000, false));
        assert_eq!(shift_immediate(Asr, 0xF000_0008, 4, false), (0xFF00_0000, true));
    }

    #[test]
    fn register_amount_behaviors() {
        assert_eq!(shift_register(Lsl, 0x1, 0, true), (0x1, true));
        assert_eq!(shift_register(Lsl, 0x1, 32, false), (0, true));
        assert_eq!(shift_register(Lsl, 0x2, 40, true), (0, false));
        assert_eq!(shift_register(Lsr, 0x8000_0000, 32, false), (0, true));
        assert_eq!(shift_register(Lsr, 0x8000_0000, 40, true), (0, false));
        assert_eq!(shift_register(Asr, 0x8000_0000, 32, false), (0xFFFF_FFFF, true));
        assert_eq!(shift_register(Asr, 0x7FFF_FFFF, 40, true), (0, false));
        assert_eq!(shift_register(Ror, 0x8000_0001, 32, false), (0x8000_0001, true));
        assert_eq!(shift_register(Ror, 0x0000_00F0, 0x104, false), (0x0000_000F, false));
    }

    #[test]
    fn only_bottom_byte_of_register_counts() {
        assert_eq!(shift_register(Lsl, 0x1, 0x100, true), (0x1, true));
        assert_eq!(shift_register(Lsl, 0x1, 0x101, false), (0x2, false));
    }
}
