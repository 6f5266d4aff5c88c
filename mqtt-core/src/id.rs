#[cfg(feature = "bitpack")]
use core::ops::{BitAnd, BitOrAssign, BitXorAssign, Shr};

use std::sync::{Mutex, MutexGuard, OnceLock};

use tokio::sync::Notify;

/// Process-wide packet-id allocator shared by every client in the process.
///
/// When the "bitpack" feature is enabled, each bit of `id_table` flags whether the id is
/// currently in use. This trades compute for memory against the plain bool-array layout.
///
/// Id `0` is reserved and never issued.
#[derive(Debug)]
pub struct IdGenerator {
    last: u16,
    #[cfg(feature = "bitpack")]
    id_table: [u8; u16::MAX as usize / 8 + 1],
    #[cfg(not(feature = "bitpack"))]
    id_table: [bool; u16::MAX as usize + 1],
}

static GENERATOR: OnceLock<Mutex<IdGenerator>> = OnceLock::new();
static FREED: OnceLock<Notify> = OnceLock::new();

fn generator() -> &'static Mutex<IdGenerator> {
    GENERATOR.get_or_init(|| Mutex::new(IdGenerator::new()))
}

fn freed() -> &'static Notify {
    FREED.get_or_init(Notify::new)
}

fn lock() -> MutexGuard<'static, IdGenerator> {
    generator().lock().expect("packet id allocator poisoned")
}

/// Returns the next available id, registering it as taken.
///
/// Blocks (asynchronously) until an id becomes free if the space is exhausted.
pub async fn next() -> u16 {
    loop {
        {
            let mut gen = lock();
            if let Some(id) = gen.next_persistant_id() {
                return id;
            }
        }
        freed().notified().await;
    }
}

/// Marks `id` as taken. Panics if the id was already marked used.
pub fn mark_used(id: u16) {
    let mut gen = lock();
    assert!(!gen.is_set(id), "packet id {id} already in use");
    gen.set_id(id);
}

/// Marks `id` as free again, waking any task parked in [`next`].
pub fn mark_free(id: u16) {
    assert!(id != 0, "id 0 is reserved and can never be freed");
    let mut gen = lock();
    assert!(gen.is_set(id), "packet id {id} was not in use");
    gen.unset(id);
    drop(gen);
    freed().notify_waiters();
}

impl IdGenerator {
    fn new() -> Self {
        #[cfg(feature = "bitpack")]
        {
            return Self {
                last: 0,
                id_table: [0; u16::MAX as usize / 8 + 1],
            };
        }
        #[cfg(not(feature = "bitpack"))]
        {
            return Self {
                last: 0,
                id_table: [false; u16::MAX as usize + 1],
            };
        }
    }

    /// Returns the next available Id, registering it as taken.
    fn next_persistant_id(&mut self) -> Option<u16> {
        self.next_id().and_then(|idx| {
            self.set_id(idx);
            return Some(idx);
        })
    }

    fn next_id(&mut self) -> Option<u16> {
        let mut curr_idx = checked_incr(self.last);
        loop {
            // zero is an invalid id.
            if curr_idx == 0 {
                curr_idx = checked_incr(curr_idx);
                continue;
            }

            if curr_idx == self.last {
                return None;
            }

            if !self.is_set(curr_idx) {
                self.last = curr_idx;
                return Some(curr_idx);
            }
            curr_idx = checked_incr(curr_idx);
        }
    }
}

#[cfg(feature = "bitpack")]
impl IdGenerator {
    /// internal use for iterating through the Ids.
    fn is_set(&self, idx: u16) -> bool {
        let chunk: u16 = idx / 8;
        let target_bit = 0b1000_0000.shr(idx % 8) as u8;
        self.id_table[chunk as usize].bitand(target_bit) == target_bit
    }

    /// registers an Id as available.
    fn unset(&mut self, idx: u16) {
        let chunk: u16 = idx / 8;
        let target_bit: u8 = 0b1000_0000.shr(idx % 8) as u8;
        self.id_table[chunk as usize].bitxor_assign(target_bit);
    }

    /// registers an Id as taken.
    fn set_id(&mut self, idx: u16) {
        let chunk: u16 = idx / 8;
        let target_bit = 0b1000_0000.shr(idx % 8) as u8;
        self.id_table[chunk as usize].bitor_assign(target_bit);
    }
}

fn checked_incr(int: u16) -> u16 {
    match int.checked_add(1) {
        Some(idx) => idx,
        None => 0,
    }
}

#[cfg(not(feature = "bitpack"))]
impl IdGenerator {
    /// internal use for iterating through the Ids.
    fn is_set(&self, idx: u16) -> bool {
        return self.id_table[idx as usize] == true;
    }

    /// registers an Id as available.
    fn unset(&mut self, idx: u16) {
        self.id_table[idx as usize] = false;
    }

    /// registers an Id as taken.
    fn set_id(&mut self, idx: u16) {
        self.id_table[idx as usize] = true;
    }
}

#[cfg(test)]
mod id_gen {
    use super::IdGenerator;

    #[test]
    fn basic() {
        let mut gen = IdGenerator::new();
        let id = gen.next_persistant_id();
        assert_eq!(id, Some(1));
        let id = gen.next_persistant_id();
        assert_eq!(id, Some(2));
    }

    #[test]
    fn skips_zero_on_wraparound() {
        let mut gen = IdGenerator::new();
        gen.last = u16::MAX;
        let id = gen.next_persistant_id();
        assert_eq!(id, Some(1));
    }

    #[test]
    fn filled_then_unset() {
        let mut gen = IdGenerator::new();
        for _ in 1..=u16::MAX {
            gen.next_persistant_id();
        }

        assert_eq!(None, gen.next_id());

        gen.unset(2);
        assert_eq!(gen.next_persistant_id(), Some(2));
    }
}
