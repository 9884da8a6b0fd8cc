// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn fake_clock_advances_both_instant_and_epoch() {
    let clock = FakeClock::new();
    let start = clock.now();
    let start_epoch = clock.epoch_ms();

    clock.advance(Duration::from_secs(30));

    assert_eq!(clock.now(), start + Duration::from_secs(30));
    assert_eq!(clock.epoch_ms(), start_epoch + 30_000);
}

#[test]
fn system_clock_epoch_is_plausible() {
    let clock = SystemClock;
    // Any time after this crate was written.
    assert!(clock.epoch_ms() > 1_700_000_000_000);
}
