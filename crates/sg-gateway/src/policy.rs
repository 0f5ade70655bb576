//! Transfer validation policy
//!
//! Asset/network support, minimum amounts, and address-family checks. The
//! address patterns do double duty: they validate the recipient address
//! before anything is queued, and they cross-validate the deposit address
//! the upstream hands back before anything is persisted.

use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

use sg_common::TransferRequest;

use crate::error::ValidationError;

static SOL_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$").unwrap());
static ETH_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap());
static BTC_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(bc1[02-9ac-hj-np-z]{11,71}|[13][1-9A-HJ-NP-Za-km-z]{25,34})$").unwrap()
});

/// One supported (currency, network) pair and its minimum amount.
#[derive(Debug, Clone)]
pub struct AssetRule {
    pub currency: String,
    pub network: String,
    pub min_amount: Decimal,
}

impl AssetRule {
    /// Parse a rule from configuration strings.
    pub fn new(currency: &str, network: &str, min_amount: &str) -> Result<Self, String> {
        let min_amount = Decimal::from_str(min_amount)
            .map_err(|e| format!("invalid min_amount for {currency}/{network}: {e}"))?;
        Ok(Self {
            currency: currency.to_ascii_lowercase(),
            network: network.to_ascii_lowercase(),
            min_amount,
        })
    }
}

/// The validation collaborator invoked before a transfer is queued.
pub struct TransferPolicy {
    assets: Vec<AssetRule>,
}

impl TransferPolicy {
    pub fn new(assets: Vec<AssetRule>) -> Self {
        Self { assets }
    }

    /// Validate a transfer request. Fails fast with a typed error; no
    /// upstream call is made for invalid requests.
    pub fn validate(&self, request: &TransferRequest) -> Result<(), ValidationError> {
        let rule = self
            .assets
            .iter()
            .find(|a| a.currency == request.currency && a.network == request.network)
            .ok_or_else(|| ValidationError::UnsupportedAsset {
                currency: request.currency.clone(),
                network: request.network.clone(),
            })?;

        let amount = Decimal::from_str(request.amount.trim())
            .map_err(|_| ValidationError::InvalidAmount)?;
        if amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidAmount);
        }
        if amount < rule.min_amount {
            return Err(ValidationError::AmountBelowMinimum {
                minimum: rule.min_amount.to_string(),
            });
        }

        if !self.address_matches_network(&request.network, &request.recipient_address) {
            return Err(ValidationError::InvalidAddress {
                network: request.network.clone(),
            });
        }

        Ok(())
    }

    /// Whether an address belongs to the network's expected address family.
    pub fn address_matches_network(&self, network: &str, address: &str) -> bool {
        match network {
            "sol" => SOL_ADDRESS.is_match(address),
            "eth" => ETH_ADDRESS.is_match(address),
            "btc" => BTC_ADDRESS.is_match(address),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sg_common::TransferKind;

    const SOL_RECIPIENT: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

    fn policy() -> TransferPolicy {
        TransferPolicy::new(vec![
            AssetRule::new("sol", "sol", "0.1").unwrap(),
            AssetRule::new("eth", "eth", "0.005").unwrap(),
        ])
    }

    fn request(amount: &str) -> TransferRequest {
        TransferRequest {
            kind: TransferKind::Transfer,
            recipient_address: SOL_RECIPIENT.to_string(),
            amount: amount.to_string(),
            currency: "sol".to_string(),
            network: "sol".to_string(),
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(policy().validate(&request("1.5")).is_ok());
    }

    #[test]
    fn unsupported_pair_is_rejected() {
        let mut req = request("1.5");
        req.currency = "doge".to_string();
        req.network = "doge".to_string();
        assert!(matches!(
            policy().validate(&req),
            Err(ValidationError::UnsupportedAsset { .. })
        ));
    }

    #[test]
    fn below_minimum_is_rejected() {
        assert!(matches!(
            policy().validate(&request("0.05")),
            Err(ValidationError::AmountBelowMinimum { .. })
        ));
    }

    #[test]
    fn garbage_amount_is_rejected() {
        assert!(matches!(
            policy().validate(&request("1.5e")),
            Err(ValidationError::InvalidAmount)
        ));
        assert!(matches!(
            policy().validate(&request("-1")),
            Err(ValidationError::InvalidAmount)
        ));
    }

    #[test]
    fn wrong_address_family_is_rejected() {
        let mut req = request("1.5");
        req.recipient_address = "0x52908400098527886E0F7030069857D2E4169EE7".to_string();
        assert!(matches!(
            policy().validate(&req),
            Err(ValidationError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn address_families_are_distinguished() {
        let p = policy();
        assert!(p.address_matches_network("sol", SOL_RECIPIENT));
        assert!(p.address_matches_network("eth", "0x52908400098527886E0F7030069857D2E4169EE7"));
        assert!(p.address_matches_network("btc", "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"));
        assert!(!p.address_matches_network("sol", "not-an-address"));
        // Unknown networks never match, even with a plausible address
        assert!(!p.address_matches_network("xyz", SOL_RECIPIENT));
    }
}
