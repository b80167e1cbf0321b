//! Currency minor-unit handling
//!
//! Amounts are `rust_decimal::Decimal` end to end. A currency's minor-unit
//! scale bounds the precision an incoming amount may carry and fixes the
//! scale used when amounts are rendered back to the provider.

use rust_decimal::Decimal;

/// Minor-unit scale for ISO 4217 codes plus the crypto codes the casino lists
pub fn minor_units(currency: &str) -> Option<u32> {
    let scale = match currency.to_ascii_uppercase().as_str() {
        "BIF" | "CLP" | "DJF" | "GNF" | "ISK" | "JPY" | "KMF" | "KRW" | "PYG" | "RWF" | "UGX"
        | "VND" | "VUV" | "XAF" | "XOF" | "XPF" => 0,
        "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => 3,
        "BTC" | "ETH" | "LTC" => 8,
        "USDT" | "USDC" => 6,
        "USD" | "EUR" | "GBP" | "CAD" | "AUD" | "NZD" | "CHF" | "SEK" | "NOK" | "DKK" | "PLN"
        | "CZK" | "HUF" | "RON" | "BGN" | "TRY" | "ZAR" | "BRL" | "MXN" | "ARS" | "COP" | "PEN"
        | "INR" | "CNY" | "HKD" | "SGD" | "MYR" | "THB" | "PHP" | "IDR" | "ILS" | "AED" | "SAR"
        | "NGN" | "KES" | "GHS" | "ETB" | "EGP" | "MAD" | "UAH" | "RUB" | "KZT" | "GEL" => 2,
        _ => return None,
    };
    Some(scale)
}

/// Scale for a currency, falling back to two decimals for unknown codes
pub fn scale_for(currency: &str) -> u32 {
    minor_units(currency).unwrap_or(2)
}

/// True when `amount` carries no more significant decimals than `scale`
pub fn fits_scale(amount: Decimal, scale: u32) -> bool {
    amount.normalize().scale() <= scale
}

/// Render `amount` at exactly `scale` decimals (`70` → `70.00`)
pub fn at_scale(amount: Decimal, scale: u32) -> Decimal {
    let mut rendered = amount;
    rendered.rescale(scale);
    rendered
}
