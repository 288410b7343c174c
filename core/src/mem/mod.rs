pub struct Mem {
    pub ram: Vec<u8>,
}

impl Mem {
    pub fn new(size: usize) -> Self {
        Self { ram: vec![0u8; size] }
    }

    pub fn size(&self) -> usize { self.ram.len() }

    /// Copies `data` to `offset`; returns false when it would not fit.
    pub fn load(&mut self, offset: usize, data: &[u8]) -> bool {
        let Some(end) = offset.checked_add(data.len()) else {
            return false;
        };
        match self.ram.get_mut(offset..end) {
            Some(dst) => {
                dst.copy_from_slice(data);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_copies_into_place() {
        let mut mem = Mem::new(8);
        assert!(mem.load(2, &[1, 2, 3]));
        assert_eq!(mem.ram, [0, 0, 1, 2, 3, 0, 0, 0]);
    }

    #[test]
    fn load_rejects_overflowing_ranges() {
        let mut mem = Mem::new(8);
        assert!(!mem.load(6, &[1, 2, 3]));
        assert!(!mem.load(usize::MAX, &[1]));
        assert!(mem.ram.iter().all(|&b| b == 0));
        assert!(mem.load(8, &[]));
    }
}
