//! Mutual exclusion on a shared bus: never more than one holder.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

use embassy_futures::block_on;
use embassy_futures::join::join_array;
use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex, RawMutex};
use interrupter::{BusArbiter, BusId};
use proptest::prelude::*;

/// Lock `rounds` times, yielding between transactions, and check inside
/// every closure that this caller is the only holder.
async fn worker<M: RawMutex>(arbiter: &BusArbiter<M, u32>, rounds: usize) {
    for _ in 0..rounds {
        arbiter
            .with_lock("worker", |count| {
                assert_eq!(arbiter.stats().holders, 1);
                assert!(arbiter.try_with_lock("contender", |_| ()).is_none());
                *count += 1;
            })
            .await;
        yield_now().await;
    }
}

proptest! {
    #[test]
    fn interleaved_tasks_hold_one_at_a_time(rounds in prop::array::uniform4(0usize..24)) {
        let arbiter: BusArbiter<NoopRawMutex, u32> = BusArbiter::new(BusId::I2c1, 0, 1000);
        block_on(join_array(rounds.map(|n| worker(&arbiter, n))));

        let total: usize = rounds.iter().sum();
        let stats = arbiter.stats();
        prop_assert_eq!(stats.holders, 0);
        prop_assert!(stats.max_holders <= 1);
        prop_assert_eq!(stats.transactions as usize, total);
        prop_assert_eq!(arbiter.into_inner() as usize, total);
    }
}

#[test]
fn threads_contending_never_overlap() {
    const THREADS: usize = 4;
    const ROUNDS: usize = 250;

    let arbiter: BusArbiter<CriticalSectionRawMutex, u32> =
        BusArbiter::new(BusId::I2c2, 0, 1000);
    std::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..ROUNDS {
                    block_on(arbiter.with_lock("thread", |count| {
                        assert_eq!(arbiter.stats().holders, 1);
                        // widen the window for an overlapping holder
                        let before = *count;
                        for _ in 0..64 {
                            std::hint::spin_loop();
                        }
                        *count = before + 1;
                    }));
                }
            });
        }
    });

    let stats = arbiter.stats();
    assert_eq!(stats.max_holders, 1);
    assert_eq!(stats.holders, 0);
    assert_eq!(arbiter.into_inner() as usize, THREADS * ROUNDS);
}

#[test]
fn lock_released_after_unwinding_closure() {
    let arbiter: BusArbiter<CriticalSectionRawMutex, u32> =
        BusArbiter::new(BusId::I2c1, 0, 1000);
    let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        block_on(arbiter.with_lock("doomed", |_| {
            std::panic::panic_any("transport fault");
        }));
    }));
    assert!(panicked.is_err());
    assert_eq!(arbiter.stats().holders, 0);
    // the next caller gets the bus
    assert_eq!(block_on(arbiter.with_lock("after", |count| *count)), 0);
}
