use soroban_sdk::{Address, Env, Vec};

use crate::{Config, ContractError, DataKey, FeeConfig, Stream};

// Persistent entries are bumped on every write so live streams and wallets
// never expire between interactions.
const TTL_THRESHOLD: u32 = 17280;
const TTL_EXTEND_TO: u32 = 120960;

// ---------------------------------------------------------------------------
// Instance storage (configuration and counters)
// ---------------------------------------------------------------------------

pub(crate) fn is_initialised(env: &Env) -> bool {
    env.storage().instance().has(&DataKey::Config)
}

pub(crate) fn bump_instance(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(TTL_THRESHOLD, TTL_EXTEND_TO);
}

pub(crate) fn get_config(env: &Env) -> Config {
    env.storage()
        .instance()
        .get(&DataKey::Config)
        .expect("contract not initialised: missing config")
}

pub(crate) fn set_config(env: &Env, config: &Config) {
    env.storage().instance().set(&DataKey::Config, config);
}

pub(crate) fn get_fee_config(env: &Env) -> FeeConfig {
    env.storage()
        .instance()
        .get(&DataKey::FeeConfig)
        .expect("contract not initialised: missing fee config")
}

pub(crate) fn set_fee_config(env: &Env, fee_config: &FeeConfig) {
    env.storage().instance().set(&DataKey::FeeConfig, fee_config);
    bump_instance(env);
}

pub(crate) fn get_stream_count(env: &Env) -> u64 {
    env.storage()
        .instance()
        .get(&DataKey::NextStreamId)
        .unwrap_or(0u64)
}

pub(crate) fn set_stream_count(env: &Env, count: u64) {
    env.storage().instance().set(&DataKey::NextStreamId, &count);
}

pub(crate) fn is_supported_token(env: &Env, token: &Address) -> bool {
    get_config(env).tokens.contains(token)
}

pub(crate) fn require_supported_token(env: &Env, token: &Address) -> Result<(), ContractError> {
    if is_supported_token(env, token) {
        Ok(())
    } else {
        Err(ContractError::UnsupportedToken)
    }
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

pub(crate) fn load_stream(env: &Env, stream_id: u64) -> Result<Stream, ContractError> {
    env.storage()
        .persistent()
        .get(&DataKey::Stream(stream_id))
        .ok_or(ContractError::StreamNotFound)
}

pub(crate) fn save_stream(env: &Env, stream: &Stream) {
    let key = DataKey::Stream(stream.stream_id);
    env.storage().persistent().set(&key, stream);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
}

fn load_id_list(env: &Env, key: &DataKey) -> Vec<u64> {
    env.storage()
        .persistent()
        .get(key)
        .unwrap_or_else(|| Vec::new(env))
}

fn append_id(env: &Env, key: DataKey, stream_id: u64) {
    let mut ids = load_id_list(env, &key);
    ids.push_back(stream_id);
    env.storage().persistent().set(&key, &ids);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
}

pub(crate) fn owner_streams(env: &Env, owner: &Address) -> Vec<u64> {
    load_id_list(env, &DataKey::OwnerStreams(owner.clone()))
}

pub(crate) fn beneficiary_streams(env: &Env, beneficiary: &Address) -> Vec<u64> {
    load_id_list(env, &DataKey::BeneficiaryStreams(beneficiary.clone()))
}

pub(crate) fn push_owner_stream(env: &Env, owner: &Address, stream_id: u64) {
    append_id(env, DataKey::OwnerStreams(owner.clone()), stream_id);
}

pub(crate) fn push_beneficiary_stream(env: &Env, beneficiary: &Address, stream_id: u64) {
    append_id(env, DataKey::BeneficiaryStreams(beneficiary.clone()), stream_id);
}

// ---------------------------------------------------------------------------
// Balances
// ---------------------------------------------------------------------------

pub(crate) fn wallet_balance(env: &Env, account: &Address, token: &Address) -> i128 {
    env.storage()
        .persistent()
        .get(&DataKey::Wallet(account.clone(), token.clone()))
        .unwrap_or(0)
}

pub(crate) fn set_wallet_balance(env: &Env, account: &Address, token: &Address, amount: i128) {
    let key = DataKey::Wallet(account.clone(), token.clone());
    env.storage().persistent().set(&key, &amount);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
}

pub(crate) fn protocol_balance(env: &Env, token: &Address) -> i128 {
    env.storage()
        .persistent()
        .get(&DataKey::ProtocolBalance(token.clone()))
        .unwrap_or(0)
}

pub(crate) fn set_protocol_balance(env: &Env, token: &Address, amount: i128) {
    let key = DataKey::ProtocolBalance(token.clone());
    env.storage().persistent().set(&key, &amount);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
}

pub(crate) fn is_fee_exempt(env: &Env, token: &Address) -> bool {
    env.storage()
        .persistent()
        .get(&DataKey::FeeExempt(token.clone()))
        .unwrap_or(false)
}

pub(crate) fn set_fee_exempt(env: &Env, token: &Address, exempt: bool) {
    let key = DataKey::FeeExempt(token.clone());
    env.storage().persistent().set(&key, &exempt);
    env.storage()
        .persistent()
        .extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
}
