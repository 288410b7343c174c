//! Handler tables indexed by compact instruction hashes.
//!
//! ARM instructions hash bits 27-20 and 7-4 into a 12-bit index; Thumb
//! instructions use bits 15-6 as a 10-bit index. Each table slot holds a
//! [`Handler`] that receives the full instruction word.

use std::fmt;
use std::sync::OnceLock;

use crate::bus::BusAccess;

use super::Cpu;

pub const ARM_TABLE_SIZE: usize = 4096;
pub const THUMB_TABLE_SIZE: usize = 1024;

pub type Execute = fn(&mut Cpu, &mut dyn BusAccess, u32);

/// One dispatch table entry. Handlers that do not branch must finish with
/// [`Cpu::advance_pc`]; handlers that branch must refill the pipeline.
#[derive(Copy, Clone)]
pub struct Handler {
    pub name: &'static str,
    pub execute: Execute,
}

impl Handler {
    pub const fn new(name: &'static str, execute: Execute) -> Self {
        Self { name, execute }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.name).finish()
    }
}

#[inline]
pub fn arm_hash(instr: u32) -> usize {
    (((instr >> 16) & 0xFF0) | ((instr >> 4) & 0x00F)) as usize
}

#[inline]
pub fn thumb_hash(instr: u32) -> usize {
    ((instr >> 6) & 0x3FF) as usize
}

/// Smallest instruction word that hashes to `index`, for classifying slots.
pub fn arm_representative(index: usize) -> u32 {
    let index = index as u32 & 0xFFF;
    ((index & 0xFF0) << 16) | ((index & 0xF) << 4)
}

pub fn thumb_representative(index: usize) -> u32 {
    (index as u32 & 0x3FF) << 6
}

pub struct DispatchTables {
    pub arm: Box<[Handler]>,
    pub thumb: Box<[Handler]>,
}

impl fmt::Debug for DispatchTables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTables")
            .field("arm", &self.arm.len())
            .field("thumb", &self.thumb.len())
            .finish()
    }
}

static BUILTIN: OnceLock<DispatchTables> = OnceLock::new();

impl DispatchTables {
    /// Tables with every slot set to `fallback`.
    pub fn new(fallback: Handler) -> Self {
        Self {
            arm: vec![fallback; ARM_TABLE_SIZE].into_boxed_slice(),
            thumb: vec![fallback; THUMB_TABLE_SIZE].into_boxed_slice(),
        }
    }

    /// Tables holding the crate's handler set, built on first use.
    pub fn builtin() -> &'static DispatchTables {
        BUILTIN.get_or_init(|| {
            let mut tables = DispatchTables::new(super::arm::UNDEFINED);
            tables.populate_arm(super::arm::decode);
            tables.populate_thumb(super::thumb::decode);
            log::debug!("built dispatch tables");
            tables
        })
    }

    /// Fills every ARM slot for which `decode` recognises the representative
    /// instruction; other slots keep their current handler.
    pub fn populate_arm(&mut self, decode: impl Fn(u32) -> Option<Handler>) {
        for (index, slot) in self.arm.iter_mut().enumerate() {
            if let Some(handler) = decode(arm_representative(index)) {
                *slot = handler;
            }
        }
    }

    pub fn populate_thumb(&mut self, decode: impl Fn(u32) -> Option<Handler>) {
        for (index, slot) in self.thumb.iter_mut().enumerate() {
            if let Some(handler) = decode(thumb_representative(index)) {
                *slot = handler;
            }
        }
    }

    pub fn set_arm(&mut self, index: usize, handler: Handler) {
        self.arm[index & (ARM_TABLE_SIZE - 1)] = handler;
    }

    pub fn set_thumb(&mut self, index: usize, handler: Handler) {
        self.thumb[index & (THUMB_TABLE_SIZE - 1)] = handler;
    }

    pub fn arm_handler(&self, instr: u32) -> Handler { self.arm[arm_hash(instr)] }
    pub fn thumb_handler(&self, instr: u32) -> Handler { self.thumb[thumb_hash(instr)] }
}
