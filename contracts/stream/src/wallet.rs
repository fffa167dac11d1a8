use soroban_sdk::{symbol_short, token, Address, Env};

use crate::{storage, ContractError};

pub(crate) fn balance(env: &Env, account: &Address, token: &Address) -> i128 {
    storage::wallet_balance(env, account, token)
}

/// Internal credit. No tokens move; value is reassigned inside custody.
pub(crate) fn credit(
    env: &Env,
    account: &Address,
    token: &Address,
    amount: i128,
) -> Result<(), ContractError> {
    let updated = balance(env, account, token)
        .checked_add(amount)
        .ok_or(ContractError::ArithmeticOverflow)?;
    storage::set_wallet_balance(env, account, token, updated);
    Ok(())
}

/// Internal debit. Fails without touching storage when the wallet is short.
pub(crate) fn debit(
    env: &Env,
    account: &Address,
    token: &Address,
    amount: i128,
) -> Result<(), ContractError> {
    let current = balance(env, account, token);
    if current < amount {
        return Err(ContractError::InsufficientBalance);
    }
    storage::set_wallet_balance(env, account, token, current - amount);
    Ok(())
}

/// Pulls `amount` of `token` from `account` into custody and credits its wallet.
pub(crate) fn deposit(
    env: &Env,
    account: &Address,
    amount: i128,
    token: &Address,
) -> Result<(), ContractError> {
    if amount <= 0 {
        return Err(ContractError::ZeroAmount);
    }
    storage::require_supported_token(env, token)?;

    credit(env, account, token, amount)?;

    // If the transfer fails (balance/auth), the whole invocation rolls back
    // together with the credit above.
    token::Client::new(env, token).transfer(account, &env.current_contract_address(), &amount);

    env.events().publish(
        (symbol_short!("wallet"), symbol_short!("deposit")),
        (account.clone(), token.clone(), amount),
    );
    Ok(())
}

/// Releases `amount` of `token` from custody back to `account`.
pub(crate) fn withdraw(
    env: &Env,
    account: &Address,
    amount: i128,
    token: &Address,
) -> Result<(), ContractError> {
    if amount <= 0 {
        return Err(ContractError::ZeroAmount);
    }
    storage::require_supported_token(env, token)?;

    // CEI: debit before the external transfer so a re-entrant call sees the
    // reduced balance.
    debit(env, account, token, amount)?;

    token::Client::new(env, token).transfer(&env.current_contract_address(), account, &amount);

    env.events().publish(
        (symbol_short!("wallet"), symbol_short!("withdraw")),
        (account.clone(), token.clone(), amount),
    );
    Ok(())
}
