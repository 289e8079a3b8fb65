//! Toy M:N scheduler on top of gvfiber
//!
//! N worker threads, one work-stealing queue each. Every fiber yields K
//! times; a yielded fiber goes back on the queue of whichever worker ran
//! it, so fibers migrate as idle workers steal them. Local queues that
//! fill up spill into a global injector.
//!
//! Usage: steal [FIBERS] [YIELDS]
//!
//! Workers, queue capacity, stack size and steal attempts come from
//! `FiberConfig` (GVF_* environment variables).

use crossbeam_queue::SegQueue;
use gvfiber::{
    kdebug, kinfo, kwarn, Context, FiberConfig, FiberResult, Owner, Stack, Stealer,
    WorkStealingQueue,
};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

const YIELDED: usize = 0;
const FINISHED: usize = 1;

/// A fiber and the stack it runs on
struct Fiber {
    id: usize,
    /// Suspended context; `None` only while the fiber is running
    context: Option<Context>,
    _stack: Stack,
}

type FiberBox = Box<Fiber>;

/// Counters shared by all workers
struct Shared {
    injector: SegQueue<FiberBox>,
    stealers: Vec<Stealer<FiberBox>>,
    total: usize,
    finished: AtomicUsize,
    preserve_fpu: bool,
    steal_attempts: usize,
}

#[derive(Debug, Default)]
struct WorkerStats {
    resumed: u64,
    local: u64,
    stolen: u64,
    injected: u64,
    spilled: u64,
}

static YIELDS_PER_FIBER: AtomicUsize = AtomicUsize::new(10);
static TOTAL_YIELDS: AtomicU64 = AtomicU64::new(0);
static PRESERVE_FPU: AtomicBool = AtomicBool::new(true);

fn preserve_fpu() -> bool {
    PRESERVE_FPU.load(Ordering::Relaxed)
}

extern "C" fn fiber_body(from: Context, data: usize) {
    let yields = YIELDS_PER_FIBER.load(Ordering::Relaxed);
    let mut acc = data as u64;
    let mut back = from;

    for _ in 0..yields {
        // A little work between yields.
        for i in 0..64u64 {
            acc = acc.wrapping_mul(6364136223846793005).wrapping_add(i);
        }
        std::hint::black_box(acc);
        TOTAL_YIELDS.fetch_add(1, Ordering::Relaxed);
        back = unsafe { back.switch(YIELDED, preserve_fpu()) }.context;
    }

    // The worker frees our stack on FINISHED; nothing resumes us again.
    loop {
        back = unsafe { back.switch(FINISHED, preserve_fpu()) }.context;
    }
}

/// Put a runnable fiber on the local queue, or the injector if full
fn schedule(owner: &Owner<FiberBox>, shared: &Shared, stats: &mut WorkerStats, fiber: FiberBox) {
    if let Err(fiber) = owner.push(fiber) {
        stats.spilled += 1;
        shared.injector.push(fiber);
    }
}

/// Next fiber to run: local LIFO, then the injector, then other workers
fn find_work(
    index: usize,
    owner: &Owner<FiberBox>,
    shared: &Shared,
    stats: &mut WorkerStats,
    rng: &mut u64,
) -> Option<FiberBox> {
    if let Some(fiber) = owner.pop() {
        stats.local += 1;
        return Some(fiber);
    }
    if let Some(fiber) = shared.injector.pop() {
        stats.injected += 1;
        return Some(fiber);
    }

    let n = shared.stealers.len();
    for _ in 0..shared.steal_attempts {
        // xorshift64
        *rng ^= *rng << 13;
        *rng ^= *rng >> 7;
        *rng ^= *rng << 17;
        let victim = (*rng as usize) % n;
        if victim == index {
            continue;
        }
        if let Some(fiber) = shared.stealers[victim].steal() {
            stats.stolen += 1;
            return Some(fiber);
        }
    }
    None
}

fn worker(index: usize, owner: Owner<FiberBox>, shared: &Shared) -> WorkerStats {
    let mut stats = WorkerStats::default();
    let mut rng = 0x9E37_79B9_7F4A_7C15u64 ^ (index as u64 + 1);

    while shared.finished.load(Ordering::Acquire) < shared.total {
        let Some(mut fiber) = find_work(index, &owner, shared, &mut stats, &mut rng) else {
            thread::yield_now();
            continue;
        };

        let Some(context) = fiber.context.take() else {
            kwarn!("worker {}: fiber {} queued without a context", index, fiber.id);
            continue;
        };

        let t = unsafe { context.switch(fiber.id, shared.preserve_fpu) };
        stats.resumed += 1;

        match t.data {
            YIELDED => {
                fiber.context = Some(t.context);
                schedule(&owner, shared, &mut stats, fiber);
            }
            FINISHED => {
                kdebug!("worker {}: fiber {} finished", index, fiber.id);
                shared.finished.fetch_add(1, Ordering::AcqRel);
            }
            other => {
                kwarn!("worker {}: fiber {} sent unknown status {}", index, fiber.id, other);
                shared.finished.fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    stats
}

fn spawn_fibers(count: usize, stack_size: usize) -> FiberResult<Vec<FiberBox>> {
    (0..count)
        .map(|id| {
            let stack = Stack::new(stack_size)?;
            let context = unsafe { stack.context(fiber_body) };
            Ok(Box::new(Fiber {
                id,
                context: Some(context),
                _stack: stack,
            }))
        })
        .collect()
}

/// Run the demo and return how many fibers finished
fn run(fibers: usize, yields: usize, config: &FiberConfig) -> FiberResult<usize> {
    YIELDS_PER_FIBER.store(yields, Ordering::Relaxed);
    PRESERVE_FPU.store(config.preserve_fpu, Ordering::Relaxed);

    let mut owners = Vec::with_capacity(config.num_workers);
    let mut stealers = Vec::with_capacity(config.num_workers);
    for _ in 0..config.num_workers {
        let (owner, stealer) = WorkStealingQueue::with_capacity(config.local_queue_capacity)?;
        owners.push(owner);
        stealers.push(stealer);
    }

    let shared = Shared {
        injector: SegQueue::new(),
        stealers,
        total: fibers,
        finished: AtomicUsize::new(0),
        preserve_fpu: config.preserve_fpu,
        steal_attempts: config.steal_attempts,
    };

    // Everything starts on worker 0 (overflow in the injector) so the
    // others have to steal to get going.
    let start = Instant::now();
    for fiber in spawn_fibers(fibers, config.stack_size)? {
        if let Err(fiber) = owners[0].push(fiber) {
            shared.injector.push(fiber);
        }
    }
    let spawn_time = start.elapsed();
    kinfo!(
        "{} fibers created, {} on worker 0, {} in injector",
        fibers,
        owners[0].size(),
        shared.injector.len()
    );

    let run_start = Instant::now();
    let stats: Vec<WorkerStats> = thread::scope(|s| {
        let handles: Vec<_> = owners
            .into_iter()
            .enumerate()
            .map(|(i, owner)| {
                let shared = &shared;
                thread::Builder::new()
                    .name(format!("gvf-worker-{}", i))
                    .spawn_scoped(s, move || worker(i, owner, shared))
                    .expect("failed to spawn worker thread")
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker panicked"))
            .collect()
    });
    let run_time = run_start.elapsed();

    let finished = shared.finished.load(Ordering::Relaxed);
    println!("=== Results ===");
    println!("Fibers:          {}", fibers);
    println!("Finished:        {}", finished);
    println!("Yields:          {}", TOTAL_YIELDS.load(Ordering::Relaxed));
    println!("Spawn time:      {:?}", spawn_time);
    println!("Run time:        {:?}", run_time);
    let switches: u64 = stats.iter().map(|s| s.resumed).sum::<u64>() * 2;
    println!(
        "Switch rate:     {:.0} switches/sec",
        switches as f64 / run_time.as_secs_f64()
    );
    println!();
    for (i, s) in stats.iter().enumerate() {
        println!(
            "  worker {:>2}: resumed={:<8} local={:<8} stolen={:<8} injected={:<8} spilled={}",
            i, s.resumed, s.local, s.stolen, s.injected, s.spilled
        );
    }

    Ok(finished)
}

fn main() {
    gvfiber::init_logging();

    let mut args = std::env::args().skip(1);
    let fibers: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(1_000);
    let yields: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(10);

    let config = FiberConfig::from_env();
    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        std::process::exit(2);
    }
    if config.debug_logging {
        gvfiber::set_log_level(gvfiber::LogLevel::Debug);
        config.print();
    }

    println!("=== gvfiber work-stealing demo ===\n");
    println!(
        "{} fibers x {} yields on {} workers\n",
        fibers, yields, config.num_workers
    );

    if let Err(e) = run(fibers, yields, &config) {
        eprintln!("steal: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fibers_follow_preserve_fpu_setting() {
        // One test so the process-wide flags are never shared between runs.
        for preserve in [false, true] {
            let config = FiberConfig::new()
                .num_workers(2)
                .local_queue_capacity(8)
                .stack_size(64 * 1024)
                .preserve_fpu(preserve);

            let finished = run(16, 3, &config).unwrap();
            assert_eq!(finished, 16);
            assert_eq!(preserve_fpu(), preserve);
        }
    }
}
