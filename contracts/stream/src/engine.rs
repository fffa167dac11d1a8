use soroban_sdk::{log, symbol_short, Address, Env, Vec};

use crate::{accrual, fees, storage, wallet, ContractError, Stream, StreamEvent, StreamStatus};

/// Current ledger time. The only place the engine reads the clock.
pub(crate) fn ledger_now(env: &Env) -> u64 {
    env.ledger().timestamp()
}

/// Normalised window of a stream about to be created.
#[derive(Clone, Copy)]
struct Schedule {
    start_time: u64,
    stop_time: u64,
    rate: i128,
}

/// Mutable part of a freshly created stream record.
#[derive(Clone, Copy)]
struct Terms {
    balance_left: i128,
    rate: i128,
    start_time: u64,
    stop_time: u64,
    status: StreamStatus,
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn validate_beneficiary(
    env: &Env,
    owner: &Address,
    beneficiary: &Address,
) -> Result<(), ContractError> {
    if beneficiary == owner || *beneficiary == env.current_contract_address() {
        return Err(ContractError::InvalidBeneficiary);
    }
    Ok(())
}

fn validate_schedule(
    now: u64,
    deposit: i128,
    start_time: u64,
    stop_time: u64,
) -> Result<Schedule, ContractError> {
    let start_time = if start_time == 0 { now } else { start_time };
    if stop_time <= start_time || stop_time <= now {
        return Err(ContractError::InvalidScheduleWindow);
    }
    let rate = accrual::rate_per_second(deposit, start_time, stop_time)
        .ok_or(ContractError::DepositBelowDuration)?;

    Ok(Schedule {
        start_time,
        stop_time,
        rate,
    })
}

/// Beneficiary, amount and token checks shared by every creation path.
fn validate_creation(
    env: &Env,
    owner: &Address,
    beneficiaries: &Vec<Address>,
    deposit: i128,
    token: &Address,
) -> Result<(), ContractError> {
    for beneficiary in beneficiaries.iter() {
        validate_beneficiary(env, owner, &beneficiary)?;
    }
    if deposit <= 0 {
        return Err(ContractError::ZeroAmount);
    }
    storage::require_supported_token(env, token)
}

fn require_owner(caller: &Address, stream: &Stream) -> Result<(), ContractError> {
    if *caller != stream.owner {
        return Err(ContractError::UnauthorizedOwner);
    }
    Ok(())
}

fn require_beneficiary(caller: &Address, stream: &Stream) -> Result<(), ContractError> {
    if *caller != stream.beneficiary {
        return Err(ContractError::UnauthorizedBeneficiary);
    }
    Ok(())
}

fn require_status(stream: &Stream, status: StreamStatus) -> Result<(), ContractError> {
    if stream.status != status {
        return Err(ContractError::InvalidStatus);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// Debits the owner for `count` creations of `deposit` each and books the fee.
fn charge_owner(
    env: &Env,
    owner: &Address,
    token: &Address,
    deposit: i128,
    count: u32,
) -> Result<(), ContractError> {
    let gross = fees::gross_amount(env, deposit, token)?;
    let total = gross
        .checked_mul(count as i128)
        .ok_or(ContractError::ArithmeticOverflow)?;
    let fee = (gross - deposit)
        .checked_mul(count as i128)
        .ok_or(ContractError::ArithmeticOverflow)?;

    wallet::debit(env, owner, token, total)?;
    fees::accrue(env, token, fee)
}

fn persist_new_stream(
    env: &Env,
    owner: &Address,
    beneficiary: &Address,
    token: &Address,
    deposit: i128,
    terms: Terms,
) -> u64 {
    let stream_id = storage::get_stream_count(env) + 1;
    storage::set_stream_count(env, stream_id);

    let stream = Stream {
        stream_id,
        owner: owner.clone(),
        beneficiary: beneficiary.clone(),
        token: token.clone(),
        deposit,
        balance_left: terms.balance_left,
        rate: terms.rate,
        start_time: terms.start_time,
        stop_time: terms.stop_time,
        last_settlement: terms.start_time,
        status: terms.status,
        paused_at: None,
    };

    storage::save_stream(env, &stream);
    storage::push_owner_stream(env, owner, stream_id);
    storage::push_beneficiary_stream(env, beneficiary, stream_id);

    env.events().publish(
        (symbol_short!("created"), stream_id),
        StreamEvent::Created(stream_id),
    );

    stream_id
}

fn vested(stream: &Stream, now: u64) -> i128 {
    accrual::vested_amount(
        stream.balance_left,
        stream.rate,
        stream.last_settlement,
        stream.stop_time,
        now,
    )
}

/// Releases everything vested up to `now` into the beneficiary's wallet.
/// `last_settlement` only ever moves forward. The caller saves the stream.
fn settle(env: &Env, stream: &mut Stream, now: u64) -> Result<i128, ContractError> {
    let available = vested(stream, now);
    stream.last_settlement = stream.last_settlement.max(now);

    if available > 0 {
        stream.balance_left -= available;
        wallet::credit(env, &stream.beneficiary, &stream.token, available)?;

        env.events().publish(
            (symbol_short!("withdrew"), stream.stream_id),
            StreamEvent::Withdrew(stream.stream_id, available),
        );
    }
    Ok(available)
}

/// Moves a drained stream to `Completed`. Returns whether it did.
fn complete_if_drained(env: &Env, stream: &mut Stream) -> bool {
    if stream.balance_left != 0 {
        return false;
    }
    stream.status = StreamStatus::Completed;
    stream.paused_at = None;

    env.events().publish(
        (symbol_short!("completed"), stream.stream_id),
        StreamEvent::Completed(stream.stream_id),
    );
    true
}

/// Appends the paused interval to the schedule; rate and remaining
/// proportion are preserved.
fn resume_unpaid(env: &Env, stream: &mut Stream, now: u64) {
    let paused_for = now.saturating_sub(stream.paused_at.unwrap_or(now));
    stream.stop_time = stream.stop_time.saturating_add(paused_for);
    stream.last_settlement = stream.last_settlement.saturating_add(paused_for);
    stream.status = StreamStatus::Active;
    stream.paused_at = None;

    env.events().publish(
        (symbol_short!("resumed"), stream.stream_id),
        StreamEvent::Resumed(stream.stream_id),
    );
}

/// Keeps the original stop time; the paused interval is not paid out.
fn resume_paid(env: &Env, stream: &mut Stream, now: u64) -> Result<(), ContractError> {
    stream.status = StreamStatus::Active;
    stream.paused_at = None;

    env.events().publish(
        (symbol_short!("resumed"), stream.stream_id),
        StreamEvent::Resumed(stream.stream_id),
    );

    if now >= stream.stop_time {
        // The deadline passed while paused: release the remainder right away.
        settle(env, stream, now)?;
        complete_if_drained(env, stream);
    } else {
        stream.last_settlement = stream.last_settlement.max(now);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Creates one linear stream per beneficiary. All items are validated
/// before anything is written.
pub(crate) fn create_streams(
    env: &Env,
    owner: &Address,
    beneficiaries: &Vec<Address>,
    deposit: i128,
    start_time: u64,
    stop_time: u64,
    token: &Address,
) -> Result<Vec<u64>, ContractError> {
    let now = ledger_now(env);

    validate_creation(env, owner, beneficiaries, deposit, token)?;
    let schedule = validate_schedule(now, deposit, start_time, stop_time)?;

    let mut created_ids = Vec::new(env);
    if beneficiaries.is_empty() {
        return Ok(created_ids);
    }

    charge_owner(env, owner, token, deposit, beneficiaries.len())?;

    let terms = Terms {
        balance_left: deposit,
        rate: schedule.rate,
        start_time: schedule.start_time,
        stop_time: schedule.stop_time,
        status: StreamStatus::Active,
    };
    for beneficiary in beneficiaries.iter() {
        let stream_id = persist_new_stream(env, owner, &beneficiary, token, deposit, terms);
        created_ids.push_back(stream_id);
    }

    Ok(created_ids)
}

/// Zero-length streams settled at creation: each beneficiary's wallet is
/// credited `amount` and the record is stored as `Completed`.
pub(crate) fn create_instant_payments(
    env: &Env,
    owner: &Address,
    beneficiaries: &Vec<Address>,
    amount: i128,
    token: &Address,
) -> Result<Vec<u64>, ContractError> {
    let now = ledger_now(env);

    validate_creation(env, owner, beneficiaries, amount, token)?;

    let mut created_ids = Vec::new(env);
    if beneficiaries.is_empty() {
        return Ok(created_ids);
    }

    charge_owner(env, owner, token, amount, beneficiaries.len())?;

    let terms = Terms {
        balance_left: 0,
        rate: 0,
        start_time: now,
        stop_time: now,
        status: StreamStatus::Completed,
    };
    for beneficiary in beneficiaries.iter() {
        wallet::credit(env, &beneficiary, token, amount)?;
        let stream_id = persist_new_stream(env, owner, &beneficiary, token, amount, terms);
        env.events().publish(
            (symbol_short!("completed"), stream_id),
            StreamEvent::Completed(stream_id),
        );
        created_ids.push_back(stream_id);
    }

    Ok(created_ids)
}

pub(crate) fn withdraw(env: &Env, caller: &Address, stream_id: u64) -> Result<i128, ContractError> {
    let mut stream = storage::load_stream(env, stream_id)?;
    require_beneficiary(caller, &stream)?;
    require_status(&stream, StreamStatus::Active)?;

    let now = ledger_now(env);
    if vested(&stream, now) == 0 {
        return Err(ContractError::NoBalanceAvailable);
    }

    let amount = settle(env, &mut stream, now)?;
    complete_if_drained(env, &mut stream);
    storage::save_stream(env, &stream);

    Ok(amount)
}

pub(crate) fn withdraw_all(env: &Env, caller: &Address) -> Result<i128, ContractError> {
    let now = ledger_now(env);
    let mut total: i128 = 0;

    for stream_id in storage::beneficiary_streams(env, caller).iter() {
        let mut stream = storage::load_stream(env, stream_id)?;
        if stream.status != StreamStatus::Active {
            continue;
        }
        if vested(&stream, now) == 0 {
            log!(env, "withdraw_all: nothing vested yet", stream_id);
            continue;
        }

        let amount = settle(env, &mut stream, now)?;
        complete_if_drained(env, &mut stream);
        storage::save_stream(env, &stream);

        total = total
            .checked_add(amount)
            .ok_or(ContractError::ArithmeticOverflow)?;
    }

    Ok(total)
}

pub(crate) fn pause(env: &Env, caller: &Address, stream_id: u64) -> Result<(), ContractError> {
    let mut stream = storage::load_stream(env, stream_id)?;
    require_owner(caller, &stream)?;
    require_status(&stream, StreamStatus::Active)?;

    let now = ledger_now(env);
    settle(env, &mut stream, now)?;

    if !complete_if_drained(env, &mut stream) {
        stream.status = StreamStatus::Paused;
        stream.paused_at = Some(now);

        env.events().publish(
            (symbol_short!("paused"), stream_id),
            StreamEvent::Paused(stream_id),
        );
    }

    storage::save_stream(env, &stream);
    Ok(())
}

pub(crate) fn resume(
    env: &Env,
    caller: &Address,
    stream_id: u64,
    paid: bool,
) -> Result<(), ContractError> {
    let mut stream = storage::load_stream(env, stream_id)?;
    require_owner(caller, &stream)?;
    require_status(&stream, StreamStatus::Paused)?;

    let now = ledger_now(env);
    if paid {
        resume_paid(env, &mut stream, now)?;
    } else {
        resume_unpaid(env, &mut stream, now);
    }

    storage::save_stream(env, &stream);
    Ok(())
}

/// Pays the vested part to the beneficiary and refunds the rest to the
/// owner's wallet. A paused stream is first reconciled as an unpaid resume.
pub(crate) fn cancel(env: &Env, caller: &Address, stream_id: u64) -> Result<(), ContractError> {
    let mut stream = storage::load_stream(env, stream_id)?;
    require_owner(caller, &stream)?;

    let now = ledger_now(env);
    match stream.status {
        StreamStatus::Active => {}
        StreamStatus::Paused => resume_unpaid(env, &mut stream, now),
        StreamStatus::Canceled | StreamStatus::Completed => {
            return Err(ContractError::InvalidStatus);
        }
    }

    settle(env, &mut stream, now)?;

    let refund = stream.balance_left;
    stream.balance_left = 0;
    if refund > 0 {
        wallet::credit(env, &stream.owner, &stream.token, refund)?;
    }
    stream.status = StreamStatus::Canceled;
    stream.paused_at = None;
    storage::save_stream(env, &stream);

    env.events().publish(
        (symbol_short!("canceled"), stream_id),
        StreamEvent::Canceled(stream_id),
    );
    Ok(())
}

/// What `withdraw` would release right now; zero unless the stream is active.
pub(crate) fn vested_amount_of(env: &Env, stream_id: u64) -> Result<i128, ContractError> {
    let stream = storage::load_stream(env, stream_id)?;
    if stream.status != StreamStatus::Active {
        return Ok(0);
    }
    Ok(vested(&stream, ledger_now(env)))
}

pub(crate) fn owner_streams(env: &Env, owner: &Address) -> Vec<u64> {
    storage::owner_streams(env, owner)
}

pub(crate) fn beneficiary_streams(env: &Env, beneficiary: &Address) -> Vec<u64> {
    storage::beneficiary_streams(env, beneficiary)
}
