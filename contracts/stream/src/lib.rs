#![no_std]

mod accrual;
mod engine;
mod fees;
mod storage;
mod wallet;

use soroban_sdk::{
    contract, contractimpl, contracttype, panic_with_error, vec, Address, Env, Vec,
};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// Global configuration, fixed at `init`.
#[contracttype]
#[derive(Clone, Debug)]
pub struct Config {
    pub protocol_manager: Address,
    /// Token contracts the engine custodies. Two or three entries.
    pub tokens: Vec<Address>,
}

/// Fee settings. The rate is in parts per thousand of the net amount.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FeeConfig {
    pub fee_rate: u32,
    pub fee_manager: Address,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamStatus {
    Active = 0,
    Paused = 1,
    Canceled = 2,
    Completed = 3,
}

#[soroban_sdk::contracterror]
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum ContractError {
    StreamNotFound = 1,
    InvalidStatus = 2,
    InvalidBeneficiary = 3,
    ZeroAmount = 4,
    InsufficientBalance = 5,
    UnsupportedToken = 6,
    InvalidScheduleWindow = 7,
    DepositBelowDuration = 8,
    UnauthorizedOwner = 9,
    UnauthorizedBeneficiary = 10,
    UnauthorizedManager = 11,
    NoBalanceAvailable = 12,
    InvalidManagerAddress = 13,
    InvalidFeeRate = 14,
    ZeroProtocolBalance = 15,
    ArithmeticOverflow = 16,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StreamEvent {
    Created(u64),
    Withdrew(u64, i128),
    Completed(u64),
    Paused(u64),
    Resumed(u64),
    Canceled(u64),
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Stream {
    pub stream_id: u64,
    pub owner: Address,
    pub beneficiary: Address,
    pub token: Address,
    pub deposit: i128,
    pub balance_left: i128,
    pub rate: i128,
    pub start_time: u64,
    pub stop_time: u64,
    pub last_settlement: u64,
    pub status: StreamStatus,
    pub paused_at: Option<u64>,
}

/// Namespace for all contract storage keys.
#[contracttype]
pub enum DataKey {
    Config,                     // Instance: protocol manager and token set.
    FeeConfig,                  // Instance: fee rate and fee manager.
    NextStreamId,               // Instance: number of streams created so far.
    Stream(u64),                // Persistent: stream record by id.
    OwnerStreams(Address),      // Persistent: ordered ids created by an owner.
    BeneficiaryStreams(Address), // Persistent: ordered ids paying a beneficiary.
    Wallet(Address, Address),   // Persistent: internal balance by (account, token).
    ProtocolBalance(Address),   // Persistent: collected fees by token.
    FeeExempt(Address),         // Persistent: per-token fee exemption flag.
}

// ---------------------------------------------------------------------------
// Contract Implementation
// ---------------------------------------------------------------------------

#[contract]
pub struct FundflowStream;

#[contractimpl]
impl FundflowStream {
    /// Initialise the engine with its managers, fee rate and token set.
    ///
    /// Must be called exactly once before any other operation.
    ///
    /// # Parameters
    /// - `protocol_manager`: rotates the fee manager and sets fee exemptions
    /// - `fee_manager`: sets the fee rate and withdraws collected fees
    /// - `fee_rate`: fee in parts per thousand, `1..=100`
    /// - `tokens`: two or three distinct token contract addresses
    ///
    /// # Panics
    /// - If called more than once
    /// - If `tokens` does not hold two or three distinct addresses
    /// - With `ContractError::InvalidFeeRate` if `fee_rate` is out of range
    pub fn init(
        env: Env,
        protocol_manager: Address,
        fee_manager: Address,
        fee_rate: u32,
        tokens: Vec<Address>,
    ) {
        if storage::is_initialised(&env) {
            panic!("already initialised");
        }
        if tokens.len() < 2 || tokens.len() > 3 {
            panic!("token set must hold two or three tokens");
        }
        for (index, token) in tokens.iter().enumerate() {
            if tokens.iter().skip(index + 1).any(|other| other == token) {
                panic!("token set must not repeat a token");
            }
        }
        if !fees::is_valid_fee_rate(fee_rate) {
            panic_with_error!(&env, ContractError::InvalidFeeRate);
        }

        storage::set_config(
            &env,
            &Config {
                protocol_manager,
                tokens,
            },
        );
        storage::set_fee_config(
            &env,
            &FeeConfig {
                fee_rate,
                fee_manager,
            },
        );
        storage::set_stream_count(&env, 0);

        storage::bump_instance(&env);
    }

    // -----------------------------------------------------------------------
    // Wallet
    // -----------------------------------------------------------------------

    /// Move `amount` of `token` from `account` into custody and credit its
    /// internal wallet.
    ///
    /// # Errors
    /// - `ZeroAmount` if `amount <= 0`
    /// - `UnsupportedToken` if `token` is not in the configured set
    ///
    /// # Events
    /// - `(wallet, deposit)` with `(account, token, amount)`
    pub fn deposit_on_wallet(
        env: Env,
        account: Address,
        amount: i128,
        token: Address,
    ) -> Result<(), ContractError> {
        account.require_auth();
        wallet::deposit(&env, &account, amount, &token)
    }

    /// Release `amount` of `token` from `account`'s internal wallet back to
    /// the account.
    ///
    /// The wallet is debited before the token transfer.
    ///
    /// # Errors
    /// - `ZeroAmount`, `UnsupportedToken`
    /// - `InsufficientBalance` if the wallet holds less than `amount`
    pub fn withdraw_from_wallet(
        env: Env,
        account: Address,
        amount: i128,
        token: Address,
    ) -> Result<(), ContractError> {
        account.require_auth();
        wallet::withdraw(&env, &account, amount, &token)
    }

    pub fn get_wallet_balance(env: Env, account: Address, token: Address) -> i128 {
        wallet::balance(&env, &account, &token)
    }

    // -----------------------------------------------------------------------
    // Stream creation
    // -----------------------------------------------------------------------

    /// Create a linear stream paying `deposit` of `token` to `beneficiary`
    /// between `start_time` and `stop_time`.
    ///
    /// The owner's wallet is debited `gross_amount(deposit, token)`; the
    /// difference over `deposit` is booked as protocol fees.
    ///
    /// # Parameters
    /// - `owner`: funds the stream from its wallet (must authorize)
    /// - `beneficiary`: receives the released value
    /// - `deposit`: principal, fixed for the life of the stream
    /// - `start_time`: release start; `0` means the current ledger time
    /// - `stop_time`: release end, after both the start and the current time
    /// - `token`: one of the configured tokens
    ///
    /// # Returns
    /// - `u64`: the new stream id (ids start at 1)
    ///
    /// # Errors
    /// - `InvalidBeneficiary` if `beneficiary` is the owner or this contract
    /// - `ZeroAmount` if `deposit <= 0`
    /// - `UnsupportedToken`
    /// - `InvalidScheduleWindow` if `stop_time` is not after start and now
    /// - `DepositBelowDuration` if `deposit < stop_time - start_time`
    /// - `InsufficientBalance` if the owner's wallet cannot cover the gross amount
    ///
    /// # Events
    /// - `created(stream_id)`
    ///
    /// # Examples
    /// - 10 000 units over 1 000 s: `rate = 10` per second
    /// - 1 999 units over 1 000 s: `rate = 1`, the 999 units of dust release at `stop_time`
    pub fn new_stream(
        env: Env,
        owner: Address,
        beneficiary: Address,
        deposit: i128,
        start_time: u64,
        stop_time: u64,
        token: Address,
    ) -> Result<u64, ContractError> {
        owner.require_auth();

        let beneficiaries = vec![&env, beneficiary];
        let created_ids =
            engine::create_streams(&env, &owner, &beneficiaries, deposit, start_time, stop_time, &token)?;
        Ok(created_ids.get_unchecked(0))
    }

    /// Create one stream per entry of `beneficiaries`, all with the same
    /// deposit, schedule and token.
    ///
    /// All-or-nothing: every beneficiary and the owner's balance for the
    /// whole batch are checked before any stream is written. An empty list
    /// creates nothing.
    pub fn multiple_new_stream(
        env: Env,
        owner: Address,
        beneficiaries: Vec<Address>,
        deposit: i128,
        start_time: u64,
        stop_time: u64,
        token: Address,
    ) -> Result<Vec<u64>, ContractError> {
        owner.require_auth();
        engine::create_streams(&env, &owner, &beneficiaries, deposit, start_time, stop_time, &token)
    }

    /// Pay `amount` to `beneficiary`'s wallet immediately.
    ///
    /// Recorded as a zero-length stream that is already `Completed`.
    /// Validation and fee handling match `new_stream`, minus the schedule.
    pub fn instant_payments(
        env: Env,
        owner: Address,
        beneficiary: Address,
        amount: i128,
        token: Address,
    ) -> Result<u64, ContractError> {
        owner.require_auth();

        let beneficiaries = vec![&env, beneficiary];
        let created_ids =
            engine::create_instant_payments(&env, &owner, &beneficiaries, amount, &token)?;
        Ok(created_ids.get_unchecked(0))
    }

    /// Batched `instant_payments`; all-or-nothing.
    pub fn multiple_instant_payments(
        env: Env,
        owner: Address,
        beneficiaries: Vec<Address>,
        amount: i128,
        token: Address,
    ) -> Result<Vec<u64>, ContractError> {
        owner.require_auth();
        engine::create_instant_payments(&env, &owner, &beneficiaries, amount, &token)
    }

    // -----------------------------------------------------------------------
    // Stream lifecycle
    // -----------------------------------------------------------------------

    /// Pause an active stream.
    ///
    /// Everything vested so far is settled to the beneficiary's wallet first.
    /// If that drains the stream it becomes `Completed` instead of `Paused`.
    ///
    /// # Authorization
    /// - `caller` must be the stream owner
    ///
    /// # Errors
    /// - `StreamNotFound`, `UnauthorizedOwner`
    /// - `InvalidStatus` unless the stream is `Active`
    ///
    /// # Events
    /// - `withdrew(stream_id)` when something was settled
    /// - `paused(stream_id)` or `completed(stream_id)`
    pub fn pause(env: Env, caller: Address, stream_id: u64) -> Result<(), ContractError> {
        caller.require_auth();
        engine::pause(&env, &caller, stream_id)
    }

    /// Resume a paused stream.
    ///
    /// # Parameters
    /// - `paid = true`: the stop time is kept and the paused interval is not
    ///   paid out. If the stop time already passed, the remainder is settled
    ///   and the stream completes within this call.
    /// - `paid = false`: the stop time moves forward by the paused duration,
    ///   keeping the rate.
    ///
    /// # Errors
    /// - `StreamNotFound`, `UnauthorizedOwner`
    /// - `InvalidStatus` unless the stream is `Paused`
    ///
    /// # Events
    /// - `resumed(stream_id)` in both modes
    pub fn resume_stream(
        env: Env,
        caller: Address,
        stream_id: u64,
        paid: bool,
    ) -> Result<(), ContractError> {
        caller.require_auth();
        engine::resume(&env, &caller, stream_id, paid)
    }

    /// Cancel an active or paused stream.
    ///
    /// A paused stream is first resumed unpaid. The vested part goes to the
    /// beneficiary's wallet, the unvested principal back to the owner's wallet.
    ///
    /// # Errors
    /// - `StreamNotFound`, `UnauthorizedOwner`
    /// - `InvalidStatus` if the stream is `Completed` or `Canceled`
    ///
    /// # Events
    /// - `resumed(stream_id)` if it was paused
    /// - `withdrew(stream_id)` if something had vested
    /// - `canceled(stream_id)`
    pub fn cancel_stream(env: Env, caller: Address, stream_id: u64) -> Result<(), ContractError> {
        caller.require_auth();
        engine::cancel(&env, &caller, stream_id)
    }

    /// Settle the vested amount of a stream into the beneficiary's wallet.
    ///
    /// # Returns
    /// - `i128`: the amount credited
    ///
    /// # Errors
    /// - `StreamNotFound`, `UnauthorizedBeneficiary`
    /// - `InvalidStatus` unless the stream is `Active`
    /// - `NoBalanceAvailable` if nothing vested since the last settlement
    ///
    /// # Events
    /// - `withdrew(stream_id)`, plus `completed(stream_id)` when drained
    pub fn withdraw(env: Env, caller: Address, stream_id: u64) -> Result<i128, ContractError> {
        caller.require_auth();
        engine::withdraw(&env, &caller, stream_id)
    }

    /// Withdraw from every active stream paying `caller`. Streams with
    /// nothing vested are skipped. Returns the total credited.
    pub fn withdraw_all(env: Env, caller: Address) -> Result<i128, ContractError> {
        caller.require_auth();
        engine::withdraw_all(&env, &caller)
    }

    // -----------------------------------------------------------------------
    // Stream queries
    // -----------------------------------------------------------------------

    pub fn get_stream_by_id(env: Env, stream_id: u64) -> Result<Stream, ContractError> {
        storage::load_stream(&env, stream_id)
    }

    /// Number of streams created so far; also the id of the latest one.
    pub fn get_streams_number(env: Env) -> u64 {
        storage::get_stream_count(&env)
    }

    pub fn get_stream_by_beneficiary(env: Env, beneficiary: Address) -> Vec<u64> {
        engine::beneficiary_streams(&env, &beneficiary)
    }

    pub fn get_stream_by_owner(env: Env, owner: Address) -> Vec<u64> {
        engine::owner_streams(&env, &owner)
    }

    pub fn get_beneficiary_stream_count(env: Env, beneficiary: Address) -> u32 {
        engine::beneficiary_streams(&env, &beneficiary).len()
    }

    pub fn get_owner_stream_count(env: Env, owner: Address) -> u32 {
        engine::owner_streams(&env, &owner).len()
    }

    /// Amount `withdraw` would credit at the current ledger time.
    /// Zero for streams that are not `Active`.
    pub fn vested_amount_of(env: Env, stream_id: u64) -> Result<i128, ContractError> {
        engine::vested_amount_of(&env, stream_id)
    }

    // -----------------------------------------------------------------------
    // Fees
    // -----------------------------------------------------------------------

    /// Gross amount a payer needs so `net` reaches the recipient, at the
    /// current fee rate. Ignores per-token exemptions; see `gross_amount`.
    pub fn amount_needed(env: Env, net: i128) -> Result<i128, ContractError> {
        fees::amount_needed(&env, net)
    }

    /// Gross amount charged for a `net` transfer of `token`. Equal to `net`
    /// for fee-exempt tokens.
    pub fn gross_amount(env: Env, net: i128, token: Address) -> Result<i128, ContractError> {
        fees::gross_amount(&env, net, &token)
    }

    pub fn get_transaction_fee(env: Env) -> u32 {
        storage::get_fee_config(&env).fee_rate
    }

    /// Set the fee rate, in parts per thousand.
    ///
    /// # Errors
    /// - `UnauthorizedManager` unless `caller` is the fee or protocol manager
    /// - `InvalidFeeRate` unless `1 <= fee_rate <= 100`
    pub fn set_new_transaction_fee(
        env: Env,
        caller: Address,
        fee_rate: u32,
    ) -> Result<(), ContractError> {
        caller.require_auth();
        fees::set_fee_rate(&env, &caller, fee_rate)
    }

    pub fn get_protocol_manager(env: Env) -> Address {
        storage::get_config(&env).protocol_manager
    }

    pub fn get_fee_manager(env: Env) -> Address {
        storage::get_fee_config(&env).fee_manager
    }

    /// Replace the fee manager.
    ///
    /// # Errors
    /// - `UnauthorizedManager` unless `caller` is the protocol manager
    /// - `InvalidManagerAddress` if `new_manager` is the current fee manager
    ///   or this contract
    pub fn set_new_fee_manager(
        env: Env,
        caller: Address,
        new_manager: Address,
    ) -> Result<(), ContractError> {
        caller.require_auth();
        fees::set_fee_manager(&env, &caller, &new_manager)
    }

    /// Repoint the engine's fee-manager reference. Fee handling lives in this
    /// contract, so this rotates the same role as `set_new_fee_manager`.
    pub fn set_new_fee_manager_address(
        env: Env,
        caller: Address,
        new_manager: Address,
    ) -> Result<(), ContractError> {
        caller.require_auth();
        fees::set_fee_manager(&env, &caller, &new_manager)
    }

    /// Mark `token` as exempt from (or subject to) the protocol fee.
    /// Protocol manager only.
    pub fn set_fee_exemption(
        env: Env,
        caller: Address,
        token: Address,
        exempt: bool,
    ) -> Result<(), ContractError> {
        caller.require_auth();
        fees::set_fee_exemption(&env, &caller, &token, exempt)
    }

    pub fn is_fee_exempt(env: Env, token: Address) -> bool {
        storage::is_fee_exempt(&env, &token)
    }

    pub fn protocol_balance_of(env: Env, token: Address) -> i128 {
        storage::protocol_balance(&env, &token)
    }

    /// Transfer all collected fees in `token` to the fee manager.
    ///
    /// # Returns
    /// - `i128`: the amount transferred
    ///
    /// # Errors
    /// - `UnauthorizedManager` unless `caller` is the fee or protocol manager
    /// - `UnsupportedToken`
    /// - `ZeroProtocolBalance` if nothing has been collected
    pub fn withdraw_fees(env: Env, caller: Address, token: Address) -> Result<i128, ContractError> {
        caller.require_auth();
        fees::withdraw_fees(&env, &caller, &token)
    }

    // -----------------------------------------------------------------------
    // Configuration queries
    // -----------------------------------------------------------------------

    pub fn get_config(env: Env) -> Config {
        storage::get_config(&env)
    }

    pub fn get_supported_tokens(env: Env) -> Vec<Address> {
        storage::get_config(&env).tokens
    }

    pub fn is_supported_token(env: Env, token: Address) -> bool {
        storage::is_supported_token(&env, &token)
    }
}
