//! Configuration access port trait.

use rust_decimal::Decimal;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;

    /// Exact decimal value; unparseable or missing values fall back to `default`.
    fn get_decimal(&self, section: &str, key: &str, default: Decimal) -> Decimal {
        self.get_string(section, key)
            .and_then(|s| s.trim().parse::<Decimal>().ok())
            .unwrap_or(default)
    }
}
