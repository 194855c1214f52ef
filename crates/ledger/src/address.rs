use crate::error::CallError;

/// 20-byte account or contract address, rendered as `0x`-prefixed lowercase hex.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Self = Self([0u8; 20]);

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn parse(raw: &str) -> Result<Self, CallError> {
        let digits = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .unwrap_or(raw);
        if digits.len() != 40 {
            return Err(CallError::InvalidAddress(raw.to_string()));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| CallError::InvalidAddress(raw.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl std::str::FromStr for Address {
    type Err = CallError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = CallError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Address> for String {
    fn from(a: Address) -> String {
        a.to_string()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "0x1234567890abcdef1234567890abcdef12345678";

    #[test]
    fn parse_and_display() {
        let addr = Address::parse(RAW).unwrap();
        assert_eq!(addr.to_string(), RAW);
        assert_eq!(addr.as_bytes()[0], 0x12);
    }

    #[test]
    fn prefix_is_optional_and_case_insensitive() {
        let upper = Address::parse("0X1234567890ABCDEF1234567890ABCDEF12345678").unwrap();
        let bare = Address::parse(&RAW[2..]).unwrap();
        assert_eq!(upper, bare);
    }

    #[test]
    fn invalid_addresses() {
        assert!(Address::parse("").is_err());
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("0xzz34567890abcdef1234567890abcdef12345678").is_err());
        assert!(Address::parse(&format!("{RAW}00")).is_err());
    }

    #[test]
    fn serde_round_trip() {
        let addr: Address = RAW.parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{RAW}\""));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, back);
    }

    #[test]
    fn serde_rejects_invalid() {
        let result: Result<Address, _> = serde_json::from_str("\"not-an-address\"");
        assert!(result.is_err());
    }
}
