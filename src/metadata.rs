//! NFT metadata records and their publication to the content store.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::params::{random_color, ModifierKind};
use crate::store::{Cid, ContentStore, StoreError};

pub const TICKET_DESCRIPTION: &str = "A NFT Ticket to participate in a reverse auction.";
pub const MODIFIER_DESCRIPTION: &str =
    "A NFT Modifier to use in reverse auction for change your number.";
pub const DEFAULT_ASSET_BASE_URL: &str = "https://reverseauctionstorage.s3.us-east-2.amazonaws.com";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Number(u64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: AttributeValue,
}

/// ERC-721 style metadata document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub name: String,
    pub description: String,
    pub image: String,
    pub background_color: String,
    pub attributes: Vec<Attribute>,
}

/// Builds metadata records with image URLs rooted at `asset_base_url`.
#[derive(Debug, Clone)]
pub struct MetadataBuilder {
    asset_base_url: String,
}

impl Default for MetadataBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ASSET_BASE_URL)
    }
}

impl MetadataBuilder {
    pub fn new(asset_base_url: impl Into<String>) -> Self {
        Self {
            asset_base_url: asset_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn ticket<R: Rng + ?Sized>(&self, ticket_id: u64, rng: &mut R) -> MetadataRecord {
        MetadataRecord {
            name: format!("TICKET#{}", ticket_id),
            description: TICKET_DESCRIPTION.to_string(),
            image: format!(
                "{}/tickets/m0vPvJJYzoyBHaFUddAO--1--ky4v8.jpg",
                self.asset_base_url
            ),
            background_color: random_color(rng),
            attributes: vec![Attribute {
                trait_type: "TYPE".to_string(),
                value: AttributeValue::Text("NORMAL".to_string()),
            }],
        }
    }

    pub fn modifier<R: Rng + ?Sized>(
        &self,
        modifier_id: u64,
        kind: ModifierKind,
        value: u8,
        rng: &mut R,
    ) -> MetadataRecord {
        MetadataRecord {
            name: format!("MODIFIER#{}", modifier_id),
            description: MODIFIER_DESCRIPTION.to_string(),
            image: format!(
                "{}/modifiers/{}_{:02}.png",
                self.asset_base_url,
                kind.index(),
                value
            ),
            background_color: random_color(rng),
            attributes: vec![
                Attribute {
                    trait_type: "TYPE".to_string(),
                    value: AttributeValue::Text(kind.to_string()),
                },
                Attribute {
                    trait_type: "VALUE".to_string(),
                    value: AttributeValue::Number(u64::from(value)),
                },
            ],
        }
    }
}

/// Serializes records and stores them, yielding their content identifier.
#[derive(Clone)]
pub struct MetadataPublisher {
    store: Arc<dyn ContentStore>,
}

impl MetadataPublisher {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub async fn publish(&self, record: &MetadataRecord) -> Result<Cid, StoreError> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| StoreError::Encoding(e.to_string()))?;
        let cid = self.store.publish(bytes).await?;
        tracing::info!(name = %record.name, cid = %cid, "Metadata published");
        Ok(cid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::{json, Value};

    #[test]
    fn ticket_record_shape() {
        let mut rng = StdRng::seed_from_u64(11);
        let record = MetadataBuilder::default().ticket(12, &mut rng);
        assert_eq!(record.name, "TICKET#12");
        assert_eq!(record.description, TICKET_DESCRIPTION);
        assert!(record.image.ends_with("/tickets/m0vPvJJYzoyBHaFUddAO--1--ky4v8.jpg"));
        assert_eq!(record.background_color.len(), 6);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["attributes"], json!([{"trait_type": "TYPE", "value": "NORMAL"}]));
    }

    #[test]
    fn modifier_record_shape() {
        let mut rng = StdRng::seed_from_u64(11);
        let record = MetadataBuilder::new("https://assets.example/")
            .modifier(3, ModifierKind::Subtraction, 7, &mut rng);
        assert_eq!(record.name, "MODIFIER#3");
        assert_eq!(record.image, "https://assets.example/modifiers/2_07.png");

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value["attributes"],
            json!([
                {"trait_type": "TYPE", "value": "SUBTRACTION"},
                {"trait_type": "VALUE", "value": 7}
            ])
        );
    }

    #[tokio::test]
    async fn publish_stores_json() {
        let store = Arc::new(MemoryStore::new());
        let publisher = MetadataPublisher::new(store.clone());
        let mut rng = StdRng::seed_from_u64(5);
        let record = MetadataBuilder::default().ticket(1, &mut rng);

        let cid = publisher.publish(&record).await.unwrap();
        let stored: Value = serde_json::from_slice(&store.get(&cid).unwrap()).unwrap();
        assert_eq!(stored["name"], "TICKET#1");
        assert_eq!(
            stored.as_object().unwrap().len(),
            5,
            "exactly name, description, image, background_color, attributes"
        );
    }
}
