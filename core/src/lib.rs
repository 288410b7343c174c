#![forbid(unsafe_code)]

use std::path::Path;

use crate::bus::{Bus, BusConfig};
use crate::cpu::{Cpu, CpuState};

pub mod bus;
pub mod cpu;
pub mod debugger;
pub mod log_buffer;
pub mod mem;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("image of {len} bytes at {address:#010x} does not fit in {ram_size} bytes of RAM")]
    ImageTooLarge { address: u32, len: usize, ram_size: usize },
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),
}

/// A cpu wired to a flat RAM bus.
pub struct Emulator {
    cpu: Cpu,
    bus: Bus,
}

impl Emulator {
    pub fn new(config: BusConfig) -> Self {
        Self { cpu: Cpu::new(), bus: Bus::with_config(config) }
    }

    pub fn load_image(&mut self, data: &[u8], address: u32) -> Result<(), LoadError> {
        if !self.bus.mem.load(address as usize, data) {
            return Err(LoadError::ImageTooLarge {
                address,
                len: data.len(),
                ram_size: self.bus.mem.size(),
            });
        }
        log::debug!("loaded {} bytes at {:#010x}", data.len(), address);
        Ok(())
    }

    pub fn load_image_file(&mut self, path: &Path, address: u32) -> Result<(), LoadError> {
        let data = std::fs::read(path)?;
        self.load_image(&data, address)
    }

    /// Resets the cpu and starts fetching at `entry` in the requested state.
    pub fn boot(&mut self, entry: u32, thumb: bool) {
        self.cpu.reset();
        let state = if thumb { CpuState::Thumb } else { CpuState::Arm };
        self.cpu.cpsr_mut().set_state(state);
        self.cpu.set_entry_point(&mut self.bus, entry);
    }

    pub fn step_cpu(&mut self) {
        self.cpu.step(&mut self.bus);
    }

    pub fn run(&mut self, steps: u64) {
        for _ in 0..steps {
            self.step_cpu();
        }
    }

    pub fn signal_irq(&mut self) {
        self.cpu.signal_irq(&mut self.bus);
    }

    pub fn cpu(&self) -> &Cpu { &self.cpu }
    pub fn cpu_mut(&mut self) -> &mut Cpu { &mut self.cpu }
    pub fn bus(&self) -> &Bus { &self.bus }
    pub fn bus_mut(&mut self) -> &mut Bus { &mut self.bus }
    pub fn cycles(&self) -> u64 { self.bus.cycles() }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}
