// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Single-bit spin fences between the game and render threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

const SPINS_BEFORE_YIELD: u32 = 64;

/// A one-shot flag: one thread [`signal`](Fence::signal)s, another consumes it.
///
/// Signalling releases every write made before it; a successful wait acquires
/// them. Waiting never parks the thread: it spins briefly then yields to the OS.
#[derive(Debug, Default)]
pub struct Fence {
    signaled: AtomicBool,
}

impl Fence {
    /// Creates an unsignalled fence.
    pub const fn new() -> Self {
        Self {
            signaled: AtomicBool::new(false),
        }
    }

    /// Raises the fence.
    #[inline]
    pub fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
    }

    /// Consumes a pending signal without waiting.
    #[inline]
    pub fn try_wait(&self) -> bool {
        self.signaled.swap(false, Ordering::Acquire)
    }

    /// Spins until the fence is raised, then lowers it.
    pub fn wait(&self) {
        let mut spins = 0u32;
        while !self.try_wait() {
            relax(&mut spins);
        }
    }

    /// Like [`wait`](Self::wait), but gives up once `keep_waiting` returns `false`.
    ///
    /// Returns `true` if the signal was consumed.
    pub fn wait_while(&self, mut keep_waiting: impl FnMut() -> bool) -> bool {
        let mut spins = 0u32;
        loop {
            if self.try_wait() {
                return true;
            }
            if !keep_waiting() {
                return false;
            }
            relax(&mut spins);
        }
    }
}

#[inline]
fn relax(spins: &mut u32) {
    if *spins < SPINS_BEFORE_YIELD {
        *spins += 1;
        std::hint::spin_loop();
    } else {
        thread::yield_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    #[test]
    fn signal_is_consumed_once() {
        let fence = Fence::new();
        assert!(!fence.try_wait());
        fence.signal();
        assert!(fence.try_wait());
        assert!(!fence.try_wait());
    }

    #[test]
    fn wait_while_gives_up() {
        let fence = Fence::new();
        let mut polls = 0;
        assert!(!fence.wait_while(|| {
            polls += 1;
            polls < 10
        }));
    }

    #[test]
    fn ping_pong_publishes_writes() {
        let ping = Arc::new(Fence::new());
        let pong = Arc::new(Fence::new());
        let value = Arc::new(AtomicU64::new(0));

        let (p, q, v) = (Arc::clone(&ping), Arc::clone(&pong), Arc::clone(&value));
        let other = thread::spawn(move || {
            for _ in 0..1000 {
                p.wait();
                v.store(v.load(Ordering::Relaxed) + 1, Ordering::Relaxed);
                q.signal();
            }
        });

        for i in 0..1000 {
            assert_eq!(value.load(Ordering::Relaxed), i);
            ping.signal();
            pong.wait();
        }
        other.join().unwrap();
        assert_eq!(value.load(Ordering::Relaxed), 1000);
    }
}
