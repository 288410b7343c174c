//! Code breakpoints polled by [`Cpu::step`](crate::cpu::Cpu::step).
//!
//! A breakpoint alternates: the odd-numbered hit stops the step before any
//! state changes, the even-numbered hit lets the instruction run. A host that
//! wants to resume simply steps again.

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Breakpoint {
    pub address: u32,
    pub hit_count: u32,
}

impl Breakpoint {
    pub fn new(address: u32) -> Self {
        Self { address, hit_count: 0 }
    }
}

pub trait Debugger {
    /// Breakpoints in match order. The cpu bumps `hit_count` in place.
    fn code_breakpoints(&mut self) -> &mut [Breakpoint];

    /// Called once per matching breakpoint, after its counter is bumped.
    fn on_hit(&mut self, breakpoint: &Breakpoint);
}

#[derive(Default, Debug)]
pub struct BreakpointSet {
    breakpoints: Vec<Breakpoint>,
}

impl BreakpointSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_addresses(addresses: impl IntoIterator<Item = u32>) -> Self {
        let mut set = Self::new();
        for address in addresses {
            set.insert(address);
        }
        set
    }

    /// Adds a breakpoint unless one already exists at `address`.
    pub fn insert(&mut self, address: u32) -> bool {
        if self.contains(address) {
            return false;
        }
        self.breakpoints.push(Breakpoint::new(address));
        true
    }

    pub fn remove(&mut self, address: u32) -> bool {
        let before = self.breakpoints.len();
        self.breakpoints.retain(|bp| bp.address != address);
        self.breakpoints.len() != before
    }

    pub fn contains(&self, address: u32) -> bool {
        self.breakpoints.iter().any(|bp| bp.address == address)
    }

    pub fn breakpoints(&self) -> &[Breakpoint] { &self.breakpoints }
}

impl Debugger for BreakpointSet {
    fn code_breakpoints(&mut self) -> &mut [Breakpoint] {
        &mut self.breakpoints
    }

    fn on_hit(&mut self, breakpoint: &Breakpoint) {
        if breakpoint.hit_count % 2 == 1 {
            log::info!("breakpoint at {:#010x} (hit {})", breakpoint.address, breakpoint.hit_count);
        } else {
            log::debug!("resuming past breakpoint at {:#010x}", breakpoint.address);
        }
    }
}
