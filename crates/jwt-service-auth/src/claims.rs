//! Claim payloads for the token types the service issues
//!
//! Each request type has its own variant of [`ClaimPayload`]. A variant knows
//! its subject (`sub`) and renders the subject-specific claims; the
//! [`Signer`](crate::Signer) adds the standard claims around them.

use crate::offers::OfferRecord;
use serde::Serialize;
use serde_json::Value;

/// Claim name to value mapping carried in a token payload
pub type Claims = serde_json::Map<String, Value>;

/// Claim names the signer fills in by default
pub const STANDARD_CLAIMS: [&str; 4] = ["iss", "iat", "exp", "sub"];

/// Offer reference embedded in earn, spend and peer-to-peer tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfferClaim {
    /// Offer id
    pub id: String,
    /// Amount moved
    pub amount: u64,
}

impl From<&OfferRecord> for OfferClaim {
    fn from(offer: &OfferRecord) -> Self {
        Self {
            id: offer.id.clone(),
            amount: offer.amount,
        }
    }
}

/// Sender or recipient of a transfer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Party {
    /// Application user id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Device the user acts from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Title shown in the transaction history
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Description shown in the transaction history
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Account registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterClaims {
    /// Application user id
    pub user_id: String,
    /// Device being registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Caller-chosen issued-at, overrides the signer default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Caller-chosen expiry, overrides the signer default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Payment from the application to a user for completing an earn offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EarnClaims {
    /// Offer being completed
    pub offer: OfferClaim,
    /// User being paid
    pub recipient: Party,
    /// Device the user acts from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl EarnClaims {
    /// Build earn claims paying `user_id` for `offer`
    pub fn from_offer(offer: &OfferRecord, user_id: String, device_id: Option<String>) -> Self {
        Self {
            offer: offer.into(),
            recipient: Party {
                user_id: Some(user_id),
                device_id: device_id.clone(),
                title: Some(offer.title.clone()),
                description: Some(offer.description.clone()),
            },
            device_id,
        }
    }
}

/// Payment from a user to the application for a spend offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpendClaims {
    /// Offer being redeemed
    pub offer: OfferClaim,
    /// User paying
    pub sender: Party,
}

impl SpendClaims {
    /// Build spend claims charging the (optional) user for `offer`
    pub fn from_offer(
        offer: &OfferRecord,
        user_id: Option<String>,
        device_id: Option<String>,
    ) -> Self {
        Self {
            offer: offer.into(),
            sender: Party {
                user_id,
                device_id,
                title: Some(offer.title.clone()),
                description: Some(offer.description.clone()),
            },
        }
    }
}

/// Peer-to-peer transfer between two users
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayToUserClaims {
    /// Ad hoc offer describing the transfer
    pub offer: OfferClaim,
    /// Paying user
    pub sender: Party,
    /// Receiving user
    pub recipient: Party,
}

/// Claim payload for one token request
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimPayload {
    /// `sub = "register"`
    Register(RegisterClaims),
    /// `sub = "earn"`
    Earn(EarnClaims),
    /// `sub = "spend"`
    Spend(SpendClaims),
    /// `sub = "pay_to_user"`
    PayToUser(PayToUserClaims),
    /// Caller-chosen subject and claims
    Arbitrary {
        /// Subject claim
        subject: String,
        /// Claims, taken as-is
        claims: Claims,
    },
}

impl ClaimPayload {
    /// Subject claim (`sub`) of the token
    pub fn subject(&self) -> &str {
        match self {
            Self::Register(_) => "register",
            Self::Earn(_) => "earn",
            Self::Spend(_) => "spend",
            Self::PayToUser(_) => "pay_to_user",
            Self::Arbitrary { subject, .. } => subject,
        }
    }

    /// Subject-specific claims, without the standard claims
    pub fn to_claims(&self) -> Claims {
        match self {
            Self::Register(claims) => to_claims(claims),
            Self::Earn(claims) => to_claims(claims),
            Self::Spend(claims) => to_claims(claims),
            Self::PayToUser(claims) => to_claims(claims),
            Self::Arbitrary { claims, .. } => claims.clone(),
        }
    }
}

impl From<RegisterClaims> for ClaimPayload {
    fn from(claims: RegisterClaims) -> Self {
        Self::Register(claims)
    }
}

impl From<EarnClaims> for ClaimPayload {
    fn from(claims: EarnClaims) -> Self {
        Self::Earn(claims)
    }
}

impl From<SpendClaims> for ClaimPayload {
    fn from(claims: SpendClaims) -> Self {
        Self::Spend(claims)
    }
}

impl From<PayToUserClaims> for ClaimPayload {
    fn from(claims: PayToUserClaims) -> Self {
        Self::PayToUser(claims)
    }
}

// The payload structs only hold strings, integers and options, which always
// serialize to a JSON object.
fn to_claims<T: Serialize>(value: &T) -> Claims {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Claims::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offers::OfferKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn offer(kind: OfferKind) -> OfferRecord {
        OfferRecord {
            id: "offer-1".into(),
            kind,
            amount: 30,
            title: "Daily quiz".into(),
            description: "Three questions".into(),
        }
    }

    #[test]
    fn test_register_claims() {
        let payload = ClaimPayload::from(RegisterClaims {
            user_id: "u1".into(),
            device_id: None,
            iat: Some(100),
            exp: None,
        });

        assert_eq!(payload.subject(), "register");
        assert_eq!(
            Value::Object(payload.to_claims()),
            json!({ "user_id": "u1", "iat": 100 })
        );
    }

    #[test]
    fn test_earn_claims_from_offer() {
        let payload = ClaimPayload::from(EarnClaims::from_offer(
            &offer(OfferKind::Earn),
            "u1".into(),
            Some("d1".into()),
        ));

        assert_eq!(payload.subject(), "earn");
        assert_eq!(
            Value::Object(payload.to_claims()),
            json!({
                "offer": { "id": "offer-1", "amount": 30 },
                "recipient": {
                    "user_id": "u1",
                    "device_id": "d1",
                    "title": "Daily quiz",
                    "description": "Three questions"
                },
                "device_id": "d1"
            })
        );
    }

    #[test]
    fn test_spend_claims_without_user() {
        let payload =
            ClaimPayload::from(SpendClaims::from_offer(&offer(OfferKind::Spend), None, None));

        assert_eq!(payload.subject(), "spend");
        assert_eq!(
            Value::Object(payload.to_claims()),
            json!({
                "offer": { "id": "offer-1", "amount": 30 },
                "sender": { "title": "Daily quiz", "description": "Three questions" }
            })
        );
    }

    #[test]
    fn test_pay_to_user_subject() {
        let payload = ClaimPayload::from(PayToUserClaims {
            offer: OfferClaim {
                id: "p2p".into(),
                amount: 3,
            },
            sender: Party {
                user_id: Some("alice".into()),
                ..Party::default()
            },
            recipient: Party {
                user_id: Some("bob".into()),
                ..Party::default()
            },
        });

        assert_eq!(payload.subject(), "pay_to_user");
        assert_eq!(payload.to_claims()["recipient"]["user_id"], "bob");
    }

    #[test]
    fn test_arbitrary_claims_pass_through() {
        let mut claims = Claims::new();
        claims.insert("anything".into(), json!([1, 2, 3]));

        let payload = ClaimPayload::Arbitrary {
            subject: "custom".into(),
            claims: claims.clone(),
        };

        assert_eq!(payload.subject(), "custom");
        assert_eq!(payload.to_claims(), claims);
    }
}
