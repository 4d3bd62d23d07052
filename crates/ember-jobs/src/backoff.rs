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

use std::thread;
use std::time::Duration;

const SPIN_LIMIT: u32 = 6;
const YIELD_LIMIT: u32 = 16;
const SLEEP: Duration = Duration::from_micros(50);

/// Escalating idle strategy: busy-spin, then yield, then short sleeps.
pub(crate) struct Backoff {
    step: u32,
}

impl Backoff {
    pub(crate) fn new() -> Self {
        Self { step: 0 }
    }

    pub(crate) fn reset(&mut self) {
        self.step = 0;
    }

    /// Waits for another thread to make progress. Never sleeps.
    pub(crate) fn snooze(&mut self) {
        if self.step <= SPIN_LIMIT {
            for _ in 0..1u32 << self.step {
                std::hint::spin_loop();
            }
            self.step += 1;
        } else {
            thread::yield_now();
        }
    }

    /// Idles a worker with no work, sleeping once yielding stops paying off.
    pub(crate) fn idle(&mut self) {
        if self.step <= SPIN_LIMIT {
            self.snooze();
        } else if self.step <= YIELD_LIMIT {
            thread::yield_now();
            self.step += 1;
        } else {
            thread::sleep(SLEEP);
        }
    }
}
