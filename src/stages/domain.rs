//! Request/response shapes for the product enrichment workload, snake_case on the wire to match
//! the system this demo is modelled on.

use serde::{Deserialize, Serialize};

/// One product as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// The product's unique identifier.
    pub product_id: String,
    /// The product's display name.
    pub name: String,
}

/// A product enriched with availability and pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedProduct {
    /// The product's unique identifier.
    pub product_id: String,
    /// The product's display name.
    pub name: String,
    /// The product's availability, as reported by the quote stage.
    pub availability: String,
    /// The unit price, as reported by the quote stage.
    pub price: f64,
    /// The total cost after applying [`calculate_enrichment`]'s volume discount.
    pub total_cost: f64,
}

/// Request body for `POST /products`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestProducts {
    /// The products to enrich.
    pub products: Vec<Product>,
}

/// Response body for `POST /products`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseProducts {
    /// The enriched products.
    pub products: Vec<EnrichedProduct>,
}

/// Availability and pricing for one product, gathered by the `Broadcast` stage before the
/// enrichment calculation runs. Carries `product_id` so the top-level `Iterator`'s `Joiner` can
/// correlate results by key instead of by position.
#[derive(Debug, Clone)]
pub struct MergedQuote {
    /// The product's unique identifier.
    pub product_id: String,
    /// The product's availability.
    pub availability: String,
    /// The unit price.
    pub price: f64,
}

/// Replicates the source workload's enrichment math: ten units at `price` each, with a 10%
/// volume discount once `price` exceeds 20.
pub fn calculate_enrichment(quote: &MergedQuote, product: &Product) -> EnrichedProduct {
    const QUANTITY: f64 = 10.0;
    const DISCOUNT_THRESHOLD: f64 = 20.0;
    const DISCOUNT_RATE: f64 = 0.10;

    let cost_total = quote.price * QUANTITY;
    let discount = if quote.price > DISCOUNT_THRESHOLD {
        cost_total * DISCOUNT_RATE
    } else {
        0.0
    };

    EnrichedProduct {
        product_id: product.product_id.clone(),
        name: product.name.clone(),
        availability: quote.availability.clone(),
        price: quote.price,
        total_cost: cost_total - discount,
    }
}
