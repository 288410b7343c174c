use crate::mem::Mem;

/// Timing class of a bus access relative to the one before it.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Access {
    #[default]
    NonSequential,
    Sequential,
}

pub trait BusAccess {
    fn read32(&mut self, addr: u32, access: Access) -> u32;
    fn read16(&mut self, addr: u32, access: Access) -> u16;
    fn read8(&mut self, addr: u32, access: Access) -> u8;
    fn write32(&mut self, addr: u32, value: u32, access: Access);
    fn write16(&mut self, addr: u32, value: u16, access: Access);
    fn write8(&mut self, addr: u32, value: u8, access: Access);
}

/// Extra cycles added on top of the base cycle for each access kind.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct WaitStates {
    pub sequential: u32,
    pub non_sequential: u32,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct BusConfig {
    pub ram_size: usize,
    pub wait_states: WaitStates,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { ram_size: 1024 * 1024, wait_states: WaitStates::default() }
    }
}

/// Flat little-endian RAM mapped from address 0, with per-access cycle accounting.
pub struct Bus {
    pub mem: Mem,
    wait_states: WaitStates,
    cycles: u64,
}

impl Bus {
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> Self {
        Self {
            mem: Mem::new(config.ram_size),
            wait_states: config.wait_states,
            cycles: 0,
        }
    }

    pub fn cycles(&self) -> u64 { self.cycles }
    pub fn reset_cycles(&mut self) { self.cycles = 0; }

    fn tick(&mut self, access: Access) {
        let wait = match access {
            Access::Sequential => self.wait_states.sequential,
            Access::NonSequential => self.wait_states.non_sequential,
        };
        self.cycles += 1 + u64::from(wait);
    }

    fn byte(&self, addr: u32) -> u8 {
        self.mem.ram.get(addr as usize).copied().unwrap_or(0)
    }

    fn set_byte(&mut self, addr: u32, value: u8) {
        if let Some(slot) = self.mem.ram.get_mut(addr as usize) {
            *slot = value;
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusAccess for Bus {
    fn read32(&mut self, addr: u32, access: Access) -> u32 {
        self.tick(access);
        let a = addr & !3;
        let value = u32::from_le_bytes([
            self.byte(a),
            self.byte(a.wrapping_add(1)),
            self.byte(a.wrapping_add(2)),
            self.byte(a.wrapping_add(3)),
        ]);
        #[cfg(feature = "trace_bus")]
        log::trace!("read32 {:#010x} -> {:#010x} ({:?})", a, value, access);
        value
    }
    fn read16(&mut self, addr: u32, access: Access) -> u16 {
        self.tick(access);
        let a = addr & !1;
        let value = u16::from_le_bytes([self.byte(a), self.byte(a.wrapping_add(1))]);
        #[cfg(feature = "trace_bus")]
        log::trace!("read16 {:#010x} -> {:#06x} ({:?})", a, value, access);
        value
    }
    fn read8(&mut self, addr: u32, access: Access) -> u8 {
        self.tick(access);
        self.byte(addr)
    }
    fn write32(&mut self, addr: u32, value: u32, access: Access) {
        self.tick(access);
        let a = addr & !3;
        #[cfg(feature = "trace_bus")]
        log::trace!("write32 {:#010x} <- {:#010x} ({:?})", a, value, access);
        for (i, b) in value.to_le_bytes().into_iter().enumerate() {
            self.set_byte(a.wrapping_add(i as u32), b);
        }
    }
    fn write16(&mut self, addr: u32, value: u16, access: Access) {
        self.tick(access);
        let a = addr & !1;
        #[cfg(feature = "trace_bus")]
        log::trace!("write16 {:#010x} <- {:#06x} ({:?})", a, value, access);
        let [lo, hi] = value.to_le_bytes();
        self.set_byte(a, lo);
        self.set_byte(a.wrapping_add(1), hi);
    }
    fn write8(&mut self, addr: u32, value: u8, access: Access) {
        self.tick(access);
        self.set_byte(addr, value);
    }
}
