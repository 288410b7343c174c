use std::fmt;

use super::bank::Bank;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CpuState { Arm, Thumb }

impl CpuState {
    /// Width in bytes of one instruction.
    pub fn width(self) -> u32 {
        match self {
            CpuState::Arm => 4,
            CpuState::Thumb => 2,
        }
    }

    /// Distance between r15 and the executing instruction.
    pub fn lookahead(self) -> u32 { self.width() * 2 }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CpuMode {
    User,
    Fiq,
    Irq,
    Supervisor,
    Abort,
    Undefined,
    System,
}

impl CpuMode {
    pub const ALL: [CpuMode; 7] = [
        CpuMode::User,
        CpuMode::Fiq,
        CpuMode::Irq,
        CpuMode::Supervisor,
        CpuMode::Abort,
        CpuMode::Undefined,
        CpuMode::System,
    ];

    /// Decodes a 5-bit mode field. Unassigned patterns decode as User, which
    /// shares the unbanked register file.
    pub fn from_bits(bits: u32) -> Self {
        Self::try_from_bits(bits).unwrap_or(CpuMode::User)
    }

    pub fn try_from_bits(bits: u32) -> Option<Self> {
        match bits & 0x1F {
            0b10000 => Some(CpuMode::User),
            0b10001 => Some(CpuMode::Fiq),
            0b10010 => Some(CpuMode::Irq),
            0b10011 => Some(CpuMode::Supervisor),
            0b10111 => Some(CpuMode::Abort),
            0b11011 => Some(CpuMode::Undefined),
            0b11111 => Some(CpuMode::System),
            _ => None,
        }
    }

    pub fn to_bits(self) -> u32 {
        match self {
            CpuMode::User => 0b10000,
            CpuMode::Fiq => 0b10001,
            CpuMode::Irq => 0b10010,
            CpuMode::Supervisor => 0b10011,
            CpuMode::Abort => 0b10111,
            CpuMode::Undefined => 0b11011,
            CpuMode::System => 0b11111,
        }
    }

    pub fn bank(self) -> Bank {
        match self {
            CpuMode::User | CpuMode::System => Bank::None,
            CpuMode::Fiq => Bank::Fiq,
            CpuMode::Irq => Bank::Irq,
            CpuMode::Supervisor => Bank::Supervisor,
            CpuMode::Abort => Bank::Abort,
            CpuMode::Undefined => Bank::Undefined,
        }
    }

    pub fn is_privileged(self) -> bool { self != CpuMode::User }
}

#[derive(Copy, Clone, Eq, PartialEq, Default)]
pub struct Cpsr(u32);

impl fmt::Debug for Cpsr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpsr")
            .field("N", &self.n())
            .field("Z", &self.z())
            .field("C", &self.c())
            .field("V", &self.v())
            .field("I", &self.i())
            .field("F", &self.f())
            .field("T", &self.t())
            .field("mode", &CpuMode::try_from_bits(self.0))
            .finish()
    }
}

impl Cpsr {
    pub const FLAGS_MASK: u32 = 0xF000_0000;
    pub const CONTROL_MASK: u32 = 0x0000_00FF;

    pub fn from_raw(value: u32) -> Self { Self(value) }

    pub fn raw(&self) -> u32 { self.0 }
    pub fn set_raw(&mut self, value: u32) { self.0 = value; }

    pub fn n(&self) -> bool { self.0 & (1 << 31) != 0 }
    pub fn z(&self) -> bool { self.0 & (1 << 30) != 0 }
    pub fn c(&self) -> bool { self.0 & (1 << 29) != 0 }
    pub fn v(&self) -> bool { self.0 & (1 << 28) != 0 }
    pub fn i(&self) -> bool { self.0 & (1 << 7) != 0 }
    pub fn f(&self) -> bool { self.0 & (1 << 6) != 0 }
    pub fn t(&self) -> bool { self.0 & (1 << 5) != 0 }

    pub fn set_n(&mut self, v: bool) { self.set_bit(31, v); }
    pub fn set_z(&mut self, v: bool) { self.set_bit(30, v); }
    pub fn set_c(&mut self, v: bool) { self.set_bit(29, v); }
    pub fn set_v(&mut self, v: bool) { self.set_bit(28, v); }
    pub fn set_i(&mut self, v: bool) { self.set_bit(7, v); }
    pub fn set_f(&mut self, v: bool) { self.set_bit(6, v); }
    pub fn set_t(&mut self, v: bool) { self.set_bit(5, v); }

    pub fn set_nz(&mut self, result: u32) {
        self.set_n(result >> 31 != 0);
        self.set_z(result == 0);
    }

    /// The four condition flags as NZCV in the low nibble.
    pub fn flags(&self) -> u32 { self.0 >> 28 }

    fn set_bit(&mut self, bit: u32, set: bool) { if set { self.0 |= 1 << bit } else { self.0 &= !(1 << bit) } }

    pub fn mode_bits(&self) -> u32 { self.0 & 0x1F }
    pub fn mode(&self) -> CpuMode { CpuMode::from_bits(self.0) }
    pub(crate) fn set_mode(&mut self, mode: CpuMode) {
        self.0 = (self.0 & !0x1F) | mode.to_bits();
    }

    pub fn state(&self) -> CpuState { if self.t() { CpuState::Thumb } else { CpuState::Arm } }
    pub fn set_state(&mut self, state: CpuState) { self.set_t(matches!(state, CpuState::Thumb)); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpsr_mode_bits_roundtrip() {
        let mut cpsr = Cpsr::default();
        for mode in CpuMode::ALL {
            cpsr.set_mode(mode);
            assert_eq!(cpsr.mode(), mode);
            assert_eq!(cpsr.mode_bits(), mode.to_bits());
        }
    }

    #[test]
    fn cpsr_state_bits_roundtrip() {
        let mut cpsr = Cpsr::default();
        assert_eq!(cpsr.state(), CpuState::Arm);
        cpsr.set_state(CpuState::Thumb);
        assert_eq!(cpsr.state(), CpuState::Thumb);
        assert_eq!(cpsr.raw(), 1 << 5);
        cpsr.set_state(CpuState::Arm);
        assert_eq!(cpsr.state(), CpuState::Arm);
    }

    #[test]
    fn unassigned_mode_bits_share_the_user_bank() {
        assert_eq!(CpuMode::try_from_bits(0), None);
        assert_eq!(CpuMode::from_bits(0).bank(), Bank::None);
        assert_eq!(CpuMode::System.bank(), Bank::None);
    }

    #[test]
    fn set_nz_tracks_sign_and_zero() {
        let mut cpsr = Cpsr::default();
        cpsr.set_nz(0);
        assert!(cpsr.z() && !cpsr.n());
        cpsr.set_nz(0x8000_0000);
        assert!(!cpsr.z() && cpsr.n());
        assert_eq!(cpsr.flags(), 0b1000);
    }
}
