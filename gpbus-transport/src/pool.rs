//! Fixed-capacity transaction arena for transport implementations

use gpbus_core::{Transaction, TransactionHandle};

pub const MAX_CAPACITY: usize = u8::MAX as usize + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PoolExhausted;

/// Arena of transaction records addressed by `TransactionHandle`
///
/// A slot is reset to an empty read transaction on every acquisition. Releasing a handle that
/// is not in use is a caller bug and panics.
pub struct TransactionPool<const N: usize> {
    slots: [Transaction; N],
    in_use: [bool; N],
    free: heapless::Vec<u8, N>,
}

impl<const N: usize> TransactionPool<N> {
    const _ASSERT: () = core::assert!(N > 0 && N <= MAX_CAPACITY);

    pub fn new() -> Self {
        let () = Self::_ASSERT;

        // Lowest index is handed out first. N <= 256, so every index fits in u8
        let free = (0..N).rev().map(|i| i as u8).collect();

        Self {
            slots: [const { Transaction::new() }; N],
            in_use: [false; N],
            free,
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn acquire(&mut self) -> Result<TransactionHandle, PoolExhausted> {
        let idx = self.free.pop().ok_or(PoolExhausted)?;
        let handle = TransactionHandle::from_index(idx);
        self.in_use[handle.index()] = true;
        self.slots[handle.index()] = Transaction::new();
        Ok(handle)
    }

    pub fn release(&mut self, handle: TransactionHandle) {
        assert!(self.is_in_use(handle), "release of idle transaction slot");
        self.in_use[handle.index()] = false;
        unwrap!(self.free.push(handle.index() as u8));
    }

    pub fn is_in_use(&self, handle: TransactionHandle) -> bool {
        self.in_use.get(handle.index()).copied().unwrap_or(false)
    }

    pub fn get(&self, handle: TransactionHandle) -> Option<&Transaction> {
        if self.is_in_use(handle) {
            Some(&self.slots[handle.index()])
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, handle: TransactionHandle) -> Option<&mut Transaction> {
        if self.is_in_use(handle) {
            Some(&mut self.slots[handle.index()])
        } else {
            None
        }
    }
}

impl<const N: usize> Default for TransactionPool<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpbus_core::Command;

    #[test]
    fn test_acquire_release() {
        let mut pool = TransactionPool::<2>::new();
        assert_eq!(pool.available(), 2);

        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        assert_ne!(first, second);
        assert_eq!(first.index(), 0);
        assert_eq!(pool.acquire(), Err(PoolExhausted));

        pool.release(first);
        assert_eq!(pool.available(), 1);
        assert!(pool.get(first).is_none());
        assert_eq!(pool.acquire(), Ok(first));
    }

    #[test]
    fn test_slot_reset_on_acquire() {
        let mut pool = TransactionPool::<1>::new();

        let handle = pool.acquire().unwrap();
        *pool.get_mut(handle).unwrap() = Transaction::write(0x20, &[7, 8, 9]).unwrap();
        assert_eq!(pool.get(handle).unwrap().command, Command::Write);
        pool.release(handle);

        let handle = pool.acquire().unwrap();
        assert_eq!(pool.get(handle), Some(&Transaction::new()));
    }

    #[test]
    #[should_panic(expected = "idle transaction slot")]
    fn test_double_release() {
        let mut pool = TransactionPool::<1>::new();
        let handle = pool.acquire().unwrap();
        pool.release(handle);
        pool.release(handle);
    }

    #[test]
    fn test_foreign_handle() {
        let mut pool = TransactionPool::<1>::new();
        let foreign = TransactionHandle::from_index(5);
        assert!(!pool.is_in_use(foreign));
        assert!(pool.get_mut(foreign).is_none());
    }
}
