//! Fungible balances.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::TypesError;

/// A single denomination amount
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "amount_repr")]
    pub amount: u128,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Amounts are decimal strings in JSON (so JavaScript clients keep precision)
/// and plain integers in BCS.
mod amount_repr {
    use super::*;

    pub fn serialize<S: Serializer>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&amount.to_string())
        } else {
            serializer.serialize_u128(*amount)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse::<u128>().map_err(de::Error::custom)
        } else {
            u128::deserialize(deserializer)
        }
    }
}

/// A set of coins, at most one entry per denomination
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coins(Vec<Coin>);

impl Coins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list, merging duplicate denominations
    pub fn from_coins(coins: impl IntoIterator<Item = Coin>) -> Self {
        let mut out = Self::new();
        for coin in coins {
            out.add(&coin);
        }
        out
    }

    /// True when empty or every amount is zero
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|c| c.amount == 0)
    }

    pub fn amount_of(&self, denom: &str) -> u128 {
        self.0
            .iter()
            .find(|c| c.denom == denom)
            .map(|c| c.amount)
            .unwrap_or(0)
    }

    pub fn add(&mut self, coin: &Coin) {
        if coin.amount == 0 {
            return;
        }
        match self.0.iter_mut().find(|c| c.denom == coin.denom) {
            Some(existing) => existing.amount = existing.amount.saturating_add(coin.amount),
            None => {
                self.0.push(coin.clone());
                self.0.sort_by(|a, b| a.denom.cmp(&b.denom));
            }
        }
    }

    /// Subtract `other`; None if any denomination would go negative
    pub fn checked_sub(&self, other: &Coins) -> Option<Coins> {
        let mut out = self.clone();
        for coin in &other.0 {
            let entry = out.0.iter_mut().find(|c| c.denom == coin.denom);
            match entry {
                Some(existing) => existing.amount = existing.amount.checked_sub(coin.amount)?,
                None if coin.amount == 0 => {}
                None => return None,
            }
        }
        out.0.retain(|c| c.amount > 0);
        Some(out)
    }

    /// Denominations must be non-empty
    pub fn validate(&self) -> Result<(), TypesError> {
        if let Some(bad) = self.0.iter().find(|c| c.denom.trim().is_empty()) {
            return Err(TypesError::InvalidCoins(format!(
                "empty denomination for amount {}",
                bad.amount
            )));
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Coin] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Coin> {
        self.0
    }
}

impl From<Vec<Coin>> for Coins {
    fn from(coins: Vec<Coin>) -> Self {
        Self::from_coins(coins)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_detection() {
        assert!(Coins::new().is_zero());
        assert!(Coins::from_coins(vec![Coin::new(0, "uveil")]).is_zero());
        assert!(!Coins::from_coins(vec![Coin::new(1, "uveil")]).is_zero());
    }

    #[test]
    fn test_add_merges_denoms() {
        let mut coins = Coins::from_coins(vec![Coin::new(5, "b"), Coin::new(3, "a")]);
        coins.add(&Coin::new(2, "b"));
        assert_eq!(coins.amount_of("a"), 3);
        assert_eq!(coins.amount_of("b"), 7);
        assert_eq!(coins.to_string(), "3a,7b");
    }

    #[test]
    fn test_checked_sub() {
        let coins = Coins::from_coins(vec![Coin::new(10, "uveil")]);
        let rest = coins
            .checked_sub(&Coins::from_coins(vec![Coin::new(4, "uveil")]))
            .unwrap();
        assert_eq!(rest.amount_of("uveil"), 6);

        assert!(coins
            .checked_sub(&Coins::from_coins(vec![Coin::new(11, "uveil")]))
            .is_none());
        assert!(coins
            .checked_sub(&Coins::from_coins(vec![Coin::new(1, "other")]))
            .is_none());
        assert!(coins
            .checked_sub(&Coins::from_coins(vec![Coin::new(10, "uveil")]))
            .unwrap()
            .is_zero());
    }

    #[test]
    fn test_amount_is_string_in_json() {
        let coin = Coin::new(1_000, "uveil");
        let json = serde_json::to_string(&coin).unwrap();
        assert_eq!(json, r#"{"denom":"uveil","amount":"1000"}"#);
    }
}
