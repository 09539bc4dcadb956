//! Producer/consumer demos over the weft runtime.
//!
//! `cooperative` is mutex-only: the consumer polls the counter, reports a
//! miss when it is empty, and yields. `preemptive` gates both sides on
//! condition variables and never yields; the quantum does the slicing.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use weft::RuntimeConfig;
use weft::sync::{CondVar, Mutex};

#[derive(Parser)]
#[command(name = "weft-demos", version, about = "Green-thread scheduling demos")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mutex-only polling pair; both sides yield after every operation.
    Cooperative {
        /// Items to push through the queue.
        #[arg(long, default_value_t = 20)]
        rounds: usize,
    },
    /// Condvar-gated pair that never yields; the quantum interleaves them.
    Preemptive {
        /// Items to push through the queue.
        #[arg(long, default_value_t = 20)]
        rounds: usize,
        /// Quantum in milliseconds.
        #[arg(long, default_value_t = 10)]
        quantum_ms: u64,
    },
}

/// A virtual queue: only its depth is tracked, as the point of the demo is
/// scheduling, not payloads.
struct Counter {
    mutex: Mutex,
    depth: Cell<usize>,
}

fn cooperative(rounds: usize) -> Result<(), weft::RuntimeError> {
    weft::init(RuntimeConfig {
        max_threads: 8,
        ..RuntimeConfig::default()
    })?;
    let counter = Rc::new(Counter {
        mutex: Mutex::new(),
        depth: Cell::new(0),
    });

    let producer = {
        let counter = Rc::clone(&counter);
        weft::create(move || {
            for _ in 0..rounds {
                counter.mutex.lock();
                counter.depth.set(counter.depth.get() + 1);
                println!("produced: queue depth is now {}", counter.depth.get());
                counter.mutex.unlock();
                weft::yield_now();
            }
            0
        })?
    };
    let consumer = {
        let counter = Rc::clone(&counter);
        weft::create(move || {
            let mut consumed = 0;
            while consumed < rounds {
                counter.mutex.lock();
                if counter.depth.get() > 0 {
                    counter.depth.set(counter.depth.get() - 1);
                    consumed += 1;
                    println!("consumed: queue depth is now {}", counter.depth.get());
                } else {
                    println!("did not consume: queue is empty");
                }
                counter.mutex.unlock();
                weft::yield_now();
            }
            consumed
        })?
    };

    weft::join(producer)?;
    weft::join(consumer)?;
    println!("done: final queue depth {}", counter.depth.get());
    weft::shutdown()
}

/// Bounded queue for the preemptive scenario: producers park when full,
/// consumers park when empty.
struct Line {
    mutex: Mutex,
    not_empty: CondVar,
    not_full: CondVar,
    depth: Cell<usize>,
    capacity: usize,
}

impl Line {
    fn new(capacity: usize) -> Rc<Self> {
        Rc::new(Self {
            mutex: Mutex::new(),
            not_empty: CondVar::new(),
            not_full: CondVar::new(),
            depth: Cell::new(0),
            capacity,
        })
    }

    fn produce(&self) {
        self.mutex.lock();
        while self.depth.get() == self.capacity {
            println!("producer: queue full at depth {}; waiting", self.depth.get());
            self.not_full.wait(&self.mutex);
        }
        self.depth.set(self.depth.get() + 1);
        println!("produced: queue depth is now {}", self.depth.get());
        self.mutex.unlock();
        self.not_empty.signal();
    }

    fn consume(&self) {
        self.mutex.lock();
        while self.depth.get() == 0 {
            println!("consumer: nothing to consume; waiting");
            self.not_empty.wait(&self.mutex);
        }
        self.depth.set(self.depth.get() - 1);
        println!("consumed: queue depth is now {}", self.depth.get());
        self.mutex.unlock();
        self.not_full.signal();
    }
}

fn preemptive(rounds: usize, quantum_ms: u64) -> Result<(), weft::RuntimeError> {
    weft::init(RuntimeConfig {
        max_threads: 8,
        preemption: true,
        quantum: Duration::from_millis(quantum_ms),
        ..RuntimeConfig::default()
    })?;
    let line = Line::new(5);

    let producer = {
        let line = Rc::clone(&line);
        weft::create(move || {
            for _ in 0..rounds {
                line.produce();
            }
            0
        })?
    };
    let consumer = {
        let line = Rc::clone(&line);
        weft::create(move || {
            for _ in 0..rounds {
                line.consume();
            }
            0
        })?
    };

    weft::join(producer)?;
    weft::join(consumer)?;
    println!("done: final queue depth {}", line.depth.get());
    weft::shutdown()
}

fn main() -> Result<(), weft::RuntimeError> {
    match Cli::parse().command {
        Command::Cooperative { rounds } => cooperative(rounds),
        Command::Preemptive { rounds, quantum_ms } => preemptive(rounds, quantum_ms),
    }
}
