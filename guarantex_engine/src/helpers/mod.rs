mod codes;
mod format;
mod wallet_validator;

pub use codes::generate_deal_code;
pub use format::format_amount;
pub use wallet_validator::{validate_wallet, WalletValidationError};
