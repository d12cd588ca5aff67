//! Atomics waitlist (§4.5): `memory.atomic.wait`/`notify` for shared memories.
//!
//! Each shared [`crate::memory::MemInst`] owns one [`WaiterListTable`], keyed by the 32-bit
//! address (`ident`) the wait/notify pair operates on. Waiting and notifying both take the
//! table's single mutex for their whole critical section (§5: "one global atomics mutex per
//! shared memory"); the actual blocking happens on a per-[`Waiter`] condition variable so
//! unrelated `ident`s never block each other once past the initial lookup.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Outcome of [`WaiterListTable::wait`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WaitResult {
    /// Woken by a matching `notify` (or, per the open question in DESIGN.md, a spurious
    /// preemptive-thread wakeup we cannot distinguish from one -- see §9).
    Ok,
    Timeout,
    /// The list for this `ident` already holds `u32::MAX` waiters.
    Overflow,
}

struct Waiter {
    woken: Mutex<bool>,
    cv: Condvar,
}

impl Waiter {
    fn new() -> Arc<Self> {
        Arc::new(Waiter {
            woken: Mutex::new(false),
            cv: Condvar::new(),
        })
    }
}

/// FIFO queue of waiters blocked on one `ident`.
#[derive(Default)]
struct WaiterList {
    waiters: VecDeque<Arc<Waiter>>,
}

/// The waitlist for one shared memory: a table of per-address FIFO queues guarded by a single
/// mutex, exactly as §4.5/§5 specify.
#[derive(Default)]
pub struct WaiterListTable {
    lists: Mutex<HashMap<u32, WaiterList>>,
}

impl WaiterListTable {
    pub fn new() -> Self {
        WaiterListTable::default()
    }

    /// Blocks the calling thread until a matching `notify` wakes this waiter or `deadline`
    /// elapses. `deadline = None` means wait forever (Wasm's `timeout == -1`).
    pub fn wait(&self, ident: u32, deadline: Option<Instant>) -> WaitResult {
        let waiter = {
            let mut lists = self.lists.lock().unwrap_or_else(|e| e.into_inner());
            let list = lists.entry(ident).or_default();
            if list.waiters.len() >= u32::MAX as usize {
                return WaitResult::Overflow;
            }
            let waiter = Waiter::new();
            list.waiters.push_back(Arc::clone(&waiter));
            waiter
        };

        let mut woken = waiter.woken.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if *woken {
                return WaitResult::Ok;
            }
            match deadline {
                None => {
                    woken = waiter.cv.wait(woken).unwrap_or_else(|e| e.into_inner());
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    let (guard, timeout_result) = waiter
                        .cv
                        .wait_timeout(woken, deadline - now)
                        .unwrap_or_else(|e| e.into_inner());
                    woken = guard;
                    if *woken {
                        return WaitResult::Ok;
                    }
                    if timeout_result.timed_out() {
                        break;
                    }
                }
            }
        }

        // Timed out without being woken: remove ourselves, the notifier-dequeues-not-the-waiter
        // rule (§4.5) means we must still hold the table lock while doing this removal, so a
        // concurrent `notify` can't dequeue us after we've decided to time out but before we
        // detach.
        drop(woken);
        let mut lists = self.lists.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(list) = lists.get_mut(&ident) {
            list.waiters.retain(|w| !Arc::ptr_eq(w, &waiter));
            if list.waiters.is_empty() {
                lists.remove(&ident);
            }
        }
        // A notify could have raced us between the condvar wakeup and taking the table lock;
        // give it the benefit of the doubt.
        if *waiter.woken.lock().unwrap_or_else(|e| e.into_inner()) {
            return WaitResult::Ok;
        }
        WaitResult::Timeout
    }

    /// Wakes up to `count` waiters (FIFO) blocked on `ident`, returning how many were woken.
    pub fn notify(&self, ident: u32, count: u32) -> u32 {
        let mut lists = self.lists.lock().unwrap_or_else(|e| e.into_inner());
        let Some(list) = lists.get_mut(&ident) else {
            return 0;
        };
        let mut woken = 0u32;
        while woken < count {
            let Some(waiter) = list.waiters.pop_front() else {
                break;
            };
            *waiter.woken.lock().unwrap_or_else(|e| e.into_inner()) = true;
            waiter.cv.notify_one();
            woken += 1;
        }
        if list.waiters.is_empty() {
            lists.remove(&ident);
        }
        woken
    }
}

/// Converts a Wasm relative timeout in nanoseconds (`-1` meaning "forever") into an absolute
/// deadline the waitlist can compare against with [`Instant::now`].
pub fn deadline_from_relative_ns(timeout_ns: i64) -> Option<Instant> {
    if timeout_ns < 0 {
        None
    } else {
        Some(Instant::now() + Duration::from_nanos(timeout_ns as u64))
    }
}
