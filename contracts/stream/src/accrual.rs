//! Linear vesting math.
//!
//! Everything here is a pure function of its arguments. The caller reads the
//! ledger clock once and passes `now` in, so the same code paths run against
//! the real ledger and against timestamps set by tests.

/// Per-second release rate for a `deposit` spread over `[start_time, stop_time)`.
///
/// Floor division. Returns `None` when the window is empty or the deposit is
/// smaller than the duration, since the rate would round down to zero.
pub fn rate_per_second(deposit: i128, start_time: u64, stop_time: u64) -> Option<i128> {
    let duration = stop_time.checked_sub(start_time)? as i128;
    if duration == 0 || deposit < duration {
        return None;
    }
    Some(deposit / duration)
}

/// Amount vested since the last settlement and not yet released.
///
/// - `now <= last_settlement`: nothing has vested.
/// - `now >= stop_time`: the whole remainder has vested.
/// - otherwise `rate × elapsed`, capped at `balance_left`.
///
/// The multiplication saturates so extreme rates clamp to the remainder
/// instead of overflowing.
pub fn vested_amount(
    balance_left: i128,
    rate: i128,
    last_settlement: u64,
    stop_time: u64,
    now: u64,
) -> i128 {
    if now <= last_settlement {
        return 0;
    }
    if now >= stop_time {
        return balance_left;
    }

    let elapsed = (now - last_settlement) as i128;
    rate.checked_mul(elapsed)
        .unwrap_or(i128::MAX)
        .min(balance_left)
}
