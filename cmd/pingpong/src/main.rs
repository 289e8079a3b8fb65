//! Ping-pong between two fibers
//!
//! Measures raw switch latency: ping and pong bounce a counter until it
//! reaches the requested number of rounds, then ping hands control back
//! to main.
//!
//! Usage: pingpong [ROUNDS]

use gvfiber::{kinfo, Context, FiberConfig, Stack};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

static PRESERVE_FPU: AtomicBool = AtomicBool::new(true);

struct Match {
    pong: *mut u8,
    rounds: usize,
}

fn preserve_fpu() -> bool {
    PRESERVE_FPU.load(Ordering::Relaxed)
}

extern "C" fn ping(main: Context, data: usize) {
    let game = unsafe { &*(data as *const Match) };
    let mut pong = unsafe { Context::from_raw(game.pong) };
    let mut count = 0;

    while count < game.rounds {
        let t = unsafe { pong.switch(count, preserve_fpu()) };
        pong = t.context;
        count = t.data;
    }

    // Match over; main never resumes us, but a resume must not fall off
    // the end of the entry function.
    let mut back = main;
    loop {
        back = unsafe { back.switch(count, preserve_fpu()) }.context;
    }
}

extern "C" fn pong(from: Context, data: usize) {
    let mut ping = from;
    let mut count = data;
    loop {
        let t = unsafe { ping.switch(count + 1, preserve_fpu()) };
        ping = t.context;
        count = t.data;
    }
}

fn main() {
    gvfiber::init_logging();

    let rounds: usize = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(1_000_000);

    let config = FiberConfig::from_env();
    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        std::process::exit(2);
    }
    if config.debug_logging {
        config.print();
    }

    println!("=== gvfiber ping-pong ===\n");

    let (ping_stack, pong_stack) = match (Stack::new(config.stack_size), Stack::new(config.stack_size)) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("stack allocation failed: {}", e);
            std::process::exit(1);
        }
    };
    kinfo!("stacks: ping={:?} pong={:?}", ping_stack, pong_stack);

    let game = Match {
        pong: unsafe { pong_stack.context(pong) }.into_raw(),
        rounds,
    };
    PRESERVE_FPU.store(config.preserve_fpu, Ordering::Relaxed);

    let start = Instant::now();
    let t = unsafe {
        ping_stack
            .context(ping)
            .switch(&game as *const Match as usize, config.preserve_fpu)
    };
    let elapsed = start.elapsed();

    // Every round is one switch each way.
    let switches = 2 * t.data;
    println!("  Rounds:        {}", t.data);
    println!("  Preserve FPU:  {}", config.preserve_fpu);
    println!("  Total time:    {:?}", elapsed);
    println!(
        "  Per switch:    {:.1} ns",
        elapsed.as_nanos() as f64 / switches.max(1) as f64
    );
    println!(
        "  Rate:          {:.0} switches/sec",
        switches as f64 / elapsed.as_secs_f64()
    );
}
