/// Wei per whole token (ETH or RPL).
pub const WEI_PER_ETH: f64 = 1e18;

pub const SECONDS_PER_DAY: f64 = 60.0 * 60.0 * 24.0;

/// Convert a wei amount to whole tokens. Precision loss past 2^53 wei is
/// accepted; results are for display and estimation only.
#[allow(clippy::cast_precision_loss)]
pub fn wei_to_eth(wei: u128) -> f64 {
    wei as f64 / WEI_PER_ETH
}

/// Serialize wei amounts as decimal strings.
pub(crate) mod wei_string {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(wei: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&wei.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_and_fractional_amounts() {
        assert!((wei_to_eth(1_000_000_000_000_000_000) - 1.0).abs() < f64::EPSILON);
        assert!((wei_to_eth(16_500_000_000_000_000_000) - 16.5).abs() < 1e-12);
        assert!(wei_to_eth(0).abs() < f64::EPSILON);
    }
}
