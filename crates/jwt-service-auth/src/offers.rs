//! Offer catalog lookup
//!
//! Earn and spend tokens embed an offer's id and amount. The catalog is an
//! opaque read-only lookup; [`StaticOfferCatalog`] serves the list loaded from
//! configuration.

use serde::{Deserialize, Serialize};

/// Direction of an offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferKind {
    /// The user is paid for completing the offer
    Earn,
    /// The user pays to redeem the offer
    Spend,
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRecord {
    /// Offer id
    pub id: String,
    /// Earn or spend
    #[serde(rename = "type")]
    pub kind: OfferKind,
    /// Amount of points moved by the offer
    pub amount: u64,
    /// Display title
    pub title: String,
    /// Display description
    pub description: String,
}

/// Read-only offer lookup
pub trait OfferCatalog: Send + Sync {
    /// Find an offer by id
    fn get_offer(&self, id: &str) -> Option<OfferRecord>;

    /// All offers, in catalog order
    fn offers(&self) -> Vec<OfferRecord>;
}

/// Offer catalog backed by a fixed list
#[derive(Debug, Clone, Default)]
pub struct StaticOfferCatalog {
    offers: Vec<OfferRecord>,
}

impl StaticOfferCatalog {
    /// Create a catalog from a list of offers
    pub fn new(offers: Vec<OfferRecord>) -> Self {
        Self { offers }
    }
}

impl OfferCatalog for StaticOfferCatalog {
    fn get_offer(&self, id: &str) -> Option<OfferRecord> {
        self.offers.iter().find(|offer| offer.id == id).cloned()
    }

    fn offers(&self) -> Vec<OfferRecord> {
        self.offers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> StaticOfferCatalog {
        StaticOfferCatalog::new(vec![
            OfferRecord {
                id: "earn-1".into(),
                kind: OfferKind::Earn,
                amount: 10,
                title: "Survey".into(),
                description: "Answer five questions".into(),
            },
            OfferRecord {
                id: "spend-1".into(),
                kind: OfferKind::Spend,
                amount: 25,
                title: "Sticker pack".into(),
                description: "Unlock premium stickers".into(),
            },
        ])
    }

    #[test]
    fn test_lookup_by_id() {
        let catalog = catalog();
        assert_eq!(catalog.get_offer("spend-1").unwrap().amount, 25);
        assert_eq!(catalog.get_offer("earn-1").unwrap().kind, OfferKind::Earn);
        assert!(catalog.get_offer("missing").is_none());
        assert_eq!(catalog.offers().len(), 2);
    }

    #[test]
    fn test_offer_wire_format() {
        let offer: OfferRecord = serde_json::from_value(json!({
            "id": "o1",
            "type": "spend",
            "amount": 5,
            "title": "t",
            "description": "d"
        }))
        .unwrap();

        assert_eq!(offer.kind, OfferKind::Spend);
        assert_eq!(serde_json::to_value(&offer).unwrap()["type"], "spend");
    }
}
