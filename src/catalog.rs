//! AI service catalog
//!
//! The paid services an agent can request, and the content each one returns
//! once its payment has been verified.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A paid service the agent can request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub endpoint: String,
    /// Decimal USDC price, e.g. "0.25"
    pub price: String,
    pub icon: String,
    pub category: String,
}

struct CatalogEntry {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    endpoint: &'static str,
    price: &'static str,
    icon: &'static str,
    category: &'static str,
}

const AI_SERVICES: &[CatalogEntry] = &[
    CatalogEntry {
        id: "gpt4-api",
        name: "GPT-4 API Call",
        description: "Single completion from a frontier language model",
        endpoint: "/api/services/gpt4",
        price: "0.10",
        icon: "🤖",
        category: "inference",
    },
    CatalogEntry {
        id: "image-gen",
        name: "Image Generation",
        description: "Generate a 1024x1024 image from a text prompt",
        endpoint: "/api/services/image",
        price: "0.25",
        icon: "🎨",
        category: "generation",
    },
    CatalogEntry {
        id: "data-analysis",
        name: "Data Analysis",
        description: "Statistical insights over an uploaded dataset",
        endpoint: "/api/services/analysis",
        price: "0.50",
        icon: "📊",
        category: "analytics",
    },
    CatalogEntry {
        id: "code-review",
        name: "Code Review",
        description: "Automated review with quality score and suggestions",
        endpoint: "/api/services/review",
        price: "0.15",
        icon: "💻",
        category: "engineering",
    },
];

impl From<&CatalogEntry> for ServiceDescriptor {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            name: entry.name.to_string(),
            description: entry.description.to_string(),
            endpoint: entry.endpoint.to_string(),
            price: entry.price.to_string(),
            icon: entry.icon.to_string(),
            category: entry.category.to_string(),
        }
    }
}

/// All services, in display order
pub fn ai_services() -> Vec<ServiceDescriptor> {
    AI_SERVICES.iter().map(ServiceDescriptor::from).collect()
}

pub fn find_service(id: &str) -> Option<ServiceDescriptor> {
    AI_SERVICES
        .iter()
        .find(|entry| entry.id == id)
        .map(ServiceDescriptor::from)
}

/// Content delivered by a service after its payment is verified
pub fn unlocked_content(service_id: &str, tx_hash: &str, reference: &str, simulated: bool) -> Value {
    let mut content = match service_id {
        "gpt4-api" => json!({
            "model": "gpt-4",
            "response": "The future of autonomous commerce lies in trustless, programmable payments \
                         between agents that can price, negotiate and settle without a human in the loop.",
            "tokens_used": 42,
        }),
        "image-gen" => json!({
            "model": "dall-e-3",
            "prompt": "A robot paying for coffee with a glowing USDC coin, digital art",
            "image_url": format!("https://images.example.com/generated/{}.png", reference),
        }),
        "data-analysis" => json!({
            "insights": [
                "Transaction volume grew 38% week over week",
                "Median payment size is 0.25 USDC",
                "92% of requests settle within one block",
            ],
            "rows_analyzed": 10_000,
        }),
        "code-review" => json!({
            "code_quality_score": 87,
            "issues_found": 3,
            "suggestions": [
                "Propagate errors instead of unwrapping in the request handler",
                "Extract the retry policy into configuration",
                "Add a test for the insufficient-balance branch",
            ],
        }),
        _ => json!({ "message": "Service completed successfully" }),
    };

    if let Value::Object(map) = &mut content {
        map.insert("service_id".to_string(), json!(service_id));
        map.insert("tx_hash".to_string(), json!(tx_hash));
        map.insert("reference".to_string(), json!(reference));
        map.insert("simulated".to_string(), json!(simulated));
        map.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
    }

    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::TokenAmount;

    #[test]
    fn test_catalog_prices_parse() {
        let services = ai_services();
        assert_eq!(services.len(), 4);
        for service in &services {
            assert!(TokenAmount::parse(&service.price).is_ok(), "{}", service.id);
        }
    }

    #[test]
    fn test_find_service() {
        let service = find_service("data-analysis").unwrap();
        assert_eq!(service.name, "Data Analysis");
        assert_eq!(service.price, "0.50");
        assert!(find_service("unknown").is_none());
    }

    #[test]
    fn test_unlocked_content_shapes() {
        let review = unlocked_content("code-review", "0xabc", "code-review-1", true);
        assert_eq!(review["code_quality_score"], 87);
        assert_eq!(review["suggestions"].as_array().unwrap().len(), 3);
        assert_eq!(review["tx_hash"], "0xabc");
        assert_eq!(review["simulated"], true);

        let image = unlocked_content("image-gen", "0xabc", "image-gen-7", false);
        assert!(image["image_url"].as_str().unwrap().contains("image-gen-7"));

        let fallback = unlocked_content("mystery", "0xabc", "ref", false);
        assert_eq!(fallback["message"], "Service completed successfully");
    }
}
