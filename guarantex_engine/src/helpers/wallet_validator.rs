//! Pure wallet-address validation. No side effects; called before a wallet is persisted.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::db_types::WalletType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletValidationError {
    #[error("The address cannot be empty")]
    Empty,
    #[error("Card numbers contain digits only")]
    CardNotNumeric,
    #[error("Card numbers are exactly 16 digits")]
    CardWrongLength,
    #[error("Not a valid Bitcoin address")]
    BadBtcAddress,
    #[error("Not a valid USDT address (ERC-20 or TRC-20)")]
    BadUsdtAddress,
    #[error("Not a valid TON address")]
    BadTonAddress,
}

fn base58_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[13][a-km-zA-HJ-NP-Z1-9]{25,34}$").unwrap())
}

fn bech32_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^bc1[a-z0-9]{39,59}$").unwrap())
}

fn erc20_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").unwrap())
}

fn trc20_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^T[A-Za-z1-9]{33}$").unwrap())
}

fn ton_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{48}$").unwrap())
}

/// Validates (and normalises) a wallet address for the given wallet type.
///
/// Returns the canonical form to persist: trimmed, and with card numbers stripped of spaces and
/// dashes.
pub fn validate_wallet(wallet_type: WalletType, address: &str) -> Result<String, WalletValidationError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(WalletValidationError::Empty);
    }
    match wallet_type {
        WalletType::Card => {
            let digits: String = address.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(WalletValidationError::CardNotNumeric);
            }
            if digits.len() != 16 {
                return Err(WalletValidationError::CardWrongLength);
            }
            Ok(digits)
        },
        WalletType::Btc => {
            if base58_re().is_match(address) || bech32_re().is_match(address) {
                Ok(address.to_string())
            } else {
                Err(WalletValidationError::BadBtcAddress)
            }
        },
        WalletType::Usdt => {
            if erc20_re().is_match(address) || trc20_re().is_match(address) {
                Ok(address.to_string())
            } else {
                Err(WalletValidationError::BadUsdtAddress)
            }
        },
        WalletType::Ton => {
            if ton_re().is_match(address) {
                Ok(address.to_string())
            } else {
                Err(WalletValidationError::BadTonAddress)
            }
        },
    }
}
