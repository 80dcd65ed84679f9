// Protocol constants shared by the harness and the in-process ledger

// Fee rates are expressed in basis points of this denominator
pub const MAX_BPS: u64 = 10_000;

// Upper bound a strategy accepts for any single fee rate
pub const MAX_FEE_BPS: u64 = MAX_BPS;

// pricePerFullShare is scaled by 10^18
pub const SHARE_PRICE_DECIMALS: u8 = 18;

// Fraction of idle want the vault forwards to the strategy on earn()
pub const VAULT_MIN_BPS: u64 = 9_500;

// Event emitted by the strategy (and by nested reward contracts) on harvest
pub const HARVEST_EVENT: &str = "Harvest";

// Event emitted by the strategy on tend
pub const TEND_EVENT: &str = "Tend";

// Revert reasons surfaced by the vault/strategy/controller contracts
pub const REVERT_ONLY_AUTHORIZED_ACTORS: &str = "onlyAuthorizedActors";
pub const REVERT_ONLY_GOVERNANCE: &str = "onlyGovernance";
pub const REVERT_ONLY_CONTROLLER: &str = "onlyController";
pub const REVERT_PROTECTED_TOKEN: &str = "_onlyNotProtectedTokens";
pub const REVERT_PAUSED: &str = "Pausable: paused";
pub const REVERT_TRANSFER_EXCEEDS_BALANCE: &str = "ERC20: transfer amount exceeds balance";
pub const REVERT_TRANSFER_EXCEEDS_ALLOWANCE: &str = "ERC20: transfer amount exceeds allowance";
pub const REVERT_BURN_EXCEEDS_BALANCE: &str = "ERC20: burn amount exceeds balance";
pub const REVERT_FEE_TOO_HIGH: &str = "base.excessive-fee";
pub const REVERT_NOT_TENDABLE: &str = "not tendable";
pub const REVERT_STRATEGY_NOT_APPROVED: &str = "!approved";
pub const REVERT_NO_STRATEGY: &str = "!strategy";
pub const REVERT_DIVISION_BY_ZERO: &str = "SafeMath: division by zero";
pub const REVERT_ADDITION_OVERFLOW: &str = "SafeMath: addition overflow";
