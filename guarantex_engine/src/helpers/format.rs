use gtx_common::Money;

use crate::db_types::Currency;

/// Renders an amount with its currency marker for user-facing text. Star amounts are whole
/// units; the other currencies show two decimal places.
pub fn format_amount(amount: Money, currency: Currency) -> String {
    match currency {
        Currency::Rub => format!("{amount} ₽"),
        Currency::Crypto => format!("{amount} crypto"),
        Currency::Stars => format!("{} ⭐", amount.major()),
    }
}
