use soroban_sdk::{symbol_short, token, Address, Env};

use crate::{storage, ContractError, FeeConfig};

/// Fee rates are expressed in parts per thousand of the net amount.
pub const FEE_PRECISION: i128 = 1_000;
pub const MAX_FEE_RATE: u32 = 100;

pub fn is_valid_fee_rate(fee_rate: u32) -> bool {
    fee_rate > 0 && fee_rate <= MAX_FEE_RATE
}

/// Amount a payer supplies so that `net` reaches the recipient once a
/// `fee_rate`‰ fee is taken. The fee rounds up, so any non-zero net on a
/// charged token pays at least one unit.
pub fn gross_up(net: i128, fee_rate: u32) -> Option<i128> {
    let scaled = net.checked_mul(fee_rate as i128)?;
    let fee = scaled.checked_add(FEE_PRECISION - 1)? / FEE_PRECISION;
    net.checked_add(fee)
}

pub(crate) fn gross_amount(env: &Env, net: i128, token: &Address) -> Result<i128, ContractError> {
    if net <= 0 {
        return Err(ContractError::ZeroAmount);
    }
    storage::require_supported_token(env, token)?;
    if storage::is_fee_exempt(env, token) {
        return Ok(net);
    }
    gross_up(net, storage::get_fee_config(env).fee_rate).ok_or(ContractError::ArithmeticOverflow)
}

pub(crate) fn amount_needed(env: &Env, net: i128) -> Result<i128, ContractError> {
    if net <= 0 {
        return Err(ContractError::ZeroAmount);
    }
    gross_up(net, storage::get_fee_config(env).fee_rate).ok_or(ContractError::ArithmeticOverflow)
}

/// Adds collected fees to the protocol balance of `token`.
pub(crate) fn accrue(env: &Env, token: &Address, amount: i128) -> Result<(), ContractError> {
    if amount == 0 {
        return Ok(());
    }
    let balance = storage::protocol_balance(env, token)
        .checked_add(amount)
        .ok_or(ContractError::ArithmeticOverflow)?;
    storage::set_protocol_balance(env, token, balance);
    Ok(())
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Fee-manager capability: held by the fee manager and by the protocol manager.
pub(crate) fn require_fee_manager(env: &Env, caller: &Address) -> Result<(), ContractError> {
    if *caller == storage::get_fee_config(env).fee_manager
        || *caller == storage::get_config(env).protocol_manager
    {
        Ok(())
    } else {
        Err(ContractError::UnauthorizedManager)
    }
}

pub(crate) fn require_protocol_manager(env: &Env, caller: &Address) -> Result<(), ContractError> {
    if *caller == storage::get_config(env).protocol_manager {
        Ok(())
    } else {
        Err(ContractError::UnauthorizedManager)
    }
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

pub(crate) fn set_fee_rate(env: &Env, caller: &Address, fee_rate: u32) -> Result<(), ContractError> {
    require_fee_manager(env, caller)?;
    if !is_valid_fee_rate(fee_rate) {
        return Err(ContractError::InvalidFeeRate);
    }

    let mut fee_config = storage::get_fee_config(env);
    let old_rate = fee_config.fee_rate;
    fee_config.fee_rate = fee_rate;
    storage::set_fee_config(env, &fee_config);

    env.events()
        .publish((symbol_short!("fees"), symbol_short!("rate")), (old_rate, fee_rate));
    Ok(())
}

pub(crate) fn set_fee_manager(
    env: &Env,
    caller: &Address,
    new_manager: &Address,
) -> Result<(), ContractError> {
    require_protocol_manager(env, caller)?;

    let mut fee_config: FeeConfig = storage::get_fee_config(env);
    if *new_manager == fee_config.fee_manager || *new_manager == env.current_contract_address() {
        return Err(ContractError::InvalidManagerAddress);
    }

    let old_manager = fee_config.fee_manager.clone();
    fee_config.fee_manager = new_manager.clone();
    storage::set_fee_config(env, &fee_config);

    env.events().publish(
        (symbol_short!("fees"), symbol_short!("manager")),
        (old_manager, new_manager.clone()),
    );
    Ok(())
}

pub(crate) fn set_fee_exemption(
    env: &Env,
    caller: &Address,
    token: &Address,
    exempt: bool,
) -> Result<(), ContractError> {
    require_protocol_manager(env, caller)?;
    storage::require_supported_token(env, token)?;

    storage::set_fee_exempt(env, token, exempt);

    env.events()
        .publish((symbol_short!("fees"), symbol_short!("exempt")), (token.clone(), exempt));
    Ok(())
}

/// Sends the whole protocol balance of `token` to the fee manager.
pub(crate) fn withdraw_fees(
    env: &Env,
    caller: &Address,
    token: &Address,
) -> Result<i128, ContractError> {
    require_fee_manager(env, caller)?;
    storage::require_supported_token(env, token)?;

    let amount = storage::protocol_balance(env, token);
    if amount <= 0 {
        return Err(ContractError::ZeroProtocolBalance);
    }

    // CEI: zero the balance before the token leaves custody.
    storage::set_protocol_balance(env, token, 0);

    let fee_manager = storage::get_fee_config(env).fee_manager;
    token::Client::new(env, token).transfer(&env.current_contract_address(), &fee_manager, &amount);

    env.events()
        .publish((symbol_short!("fees"), symbol_short!("withdrawn")), (token.clone(), amount));
    Ok(amount)
}
