use super::psr::Cpsr;

/// Mnemonic of each 4-bit condition code, for trace output.
pub const CONDITION_NAMES: [&str; 16] = [
    "eq", "ne", "cs", "cc", "mi", "pl", "vs", "vc",
    "hi", "ls", "ge", "lt", "gt", "le", "al", "nv",
];

/// Evaluates a condition field against the current flags. Only the low four
/// bits of `cond` are used, so every input maps to a result.
pub fn condition_passed(cond: u32, cpsr: Cpsr) -> bool {
    let n = cpsr.n();
    let z = cpsr.z();
    let c = cpsr.c();
    let v = cpsr.v();
    match cond & 0xF {
        0x0 => z,                         // EQ
        0x1 => !z,                        // NE
        0x2 => c,                         // CS/HS
        0x3 => !c,                        // CC/LO
        0x4 => n,                         // MI
        0x5 => !n,                        // PL
        0x6 => v,                         // VS
        0x7 => !v,                        // VC
        0x8 => c && !z,                   // HI
        0x9 => !c || z,                   // LS
        0xA => n == v,                    // GE
        0xB => n != v,                    // LT
        0xC => !(z || (n != v)),          // GT
        0xD => z || (n != v),             // LE
        0xE => true,                      // AL
        _ => false,                       // NV
    }
}
