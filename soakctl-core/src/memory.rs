//! Heap accounting and periodic memory samples.
//!
//! Rust has no tracing collector to force, so live heap figures come from a
//! counting wrapper around the system allocator. Each worker drops its
//! result set when its task ends, which means that by the time a round has
//! been joined the counters only reflect memory that is still reachable.

use std::alloc::{GlobalAlloc, Layout, System};
use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

use sysinfo::{get_current_pid, Pid, ProcessRefreshKind, ProcessesToUpdate, System as SysInfo};
use tracing::debug;

use crate::error::Result;

/// Rounds between two memory samples. Round 0 is always sampled.
pub const SAMPLE_EVERY: u64 = 100_000;

/// Whether `round` falls on the sampling cadence.
pub fn is_sample_round(round: u64) -> bool {
    round % SAMPLE_EVERY == 0
}

/// Live heap figures at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapSnapshot {
    pub bytes: usize,
    pub objects: usize,
}

/// Source of live heap figures.
pub trait HeapStats: Send + Sync {
    fn snapshot(&self) -> HeapSnapshot;
}

/// Global allocator that tracks live bytes and live allocations.
///
/// Install it in the binary:
///
/// ```ignore
/// #[global_allocator]
/// static ALLOC: CountingAllocator = CountingAllocator::new();
/// ```
#[derive(Debug)]
pub struct CountingAllocator {
    bytes: AtomicUsize,
    objects: AtomicUsize,
}

impl CountingAllocator {
    pub const fn new() -> Self {
        Self {
            bytes: AtomicUsize::new(0),
            objects: AtomicUsize::new(0),
        }
    }
}

impl Default for CountingAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapStats for CountingAllocator {
    fn snapshot(&self) -> HeapSnapshot {
        HeapSnapshot {
            bytes: self.bytes.load(Ordering::Relaxed),
            objects: self.objects.load(Ordering::Relaxed),
        }
    }
}

// SAFETY: every call is forwarded unchanged to `System`; the counters are
// bookkeeping only and never influence the returned pointers.
unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            self.bytes.fetch_add(layout.size(), Ordering::Relaxed);
            self.objects.fetch_add(1, Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            self.bytes.fetch_add(layout.size(), Ordering::Relaxed);
            self.objects.fetch_add(1, Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        self.bytes.fetch_sub(layout.size(), Ordering::Relaxed);
        self.objects.fetch_sub(1, Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            // grow before shrinking so a concurrent reader never sees a wrapped value
            self.bytes.fetch_add(new_size, Ordering::Relaxed);
            self.bytes.fetch_sub(layout.size(), Ordering::Relaxed);
        }
        new_ptr
    }
}

/// One emitted sample. Printed once, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    pub round: u64,
    pub heap: HeapSnapshot,
    pub rss_bytes: u64,
}

impl fmt::Display for MemorySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "i={}\tHeapAlloc={}\tHeapObjects={}\tRss={}",
            self.round, self.heap.bytes, self.heap.objects, self.rss_bytes
        )
    }
}

/// Receives the round index after every completed round.
pub trait Sampler {
    /// Returns true when a sample was emitted for this round.
    fn observe(&mut self, round: u64) -> Result<bool>;
}

/// Prints heap and RSS figures on the [`SAMPLE_EVERY`] cadence.
pub struct MemorySampler<W: Write> {
    heap: &'static dyn HeapStats,
    system: SysInfo,
    pid: Option<Pid>,
    out: W,
}

impl MemorySampler<std::io::Stdout> {
    pub fn stdout(heap: &'static dyn HeapStats) -> Self {
        Self::new(heap, std::io::stdout())
    }
}

impl<W: Write> MemorySampler<W> {
    pub fn new(heap: &'static dyn HeapStats, out: W) -> Self {
        Self {
            heap,
            system: SysInfo::new(),
            pid: get_current_pid().ok(),
            out,
        }
    }

    /// Take a sample now, regardless of cadence.
    pub fn take(&mut self, round: u64) -> MemorySample {
        MemorySample {
            round,
            heap: self.heap.snapshot(),
            rss_bytes: self.resident_bytes(),
        }
    }

    fn resident_bytes(&mut self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.system.process(pid).map_or(0, |p| p.memory())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Sampler for MemorySampler<W> {
    fn observe(&mut self, round: u64) -> Result<bool> {
        if !is_sample_round(round) {
            return Ok(false);
        }
        let sample = self.take(round);
        writeln!(self.out, "{}", sample)?;
        self.out.flush()?;
        debug!(
            round,
            heap_bytes = sample.heap.bytes,
            heap_objects = sample.heap.objects,
            rss_bytes = sample.rss_bytes,
            "memory sample"
        );
        Ok(true)
    }
}
