//! Stage functions for the product enrichment workload: a `Source`/`Sink` pair, the
//! `Splitter`/`Tagger`/`Joiner` that drive the top-level `Iterator`, and the
//! `Resolver`/`Merger` pair that drive the per-product `Broadcast`.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use indexmap::IndexMap;

use crate::error::PipelineError;
use crate::pipe::{Joiner, Merger, Resolver, Splitter, Tagger};
use crate::stages::domain::{calculate_enrichment, MergedQuote, Product, RequestProducts, ResponseProducts};
use crate::value::Value;

const AVAILABILITY_LATENCY: Duration = Duration::from_millis(200);
const PRICING_LATENCY: Duration = Duration::from_millis(300);

/// Validates the run's input is a [`RequestProducts`] and passes it through unchanged.
pub fn source() -> Resolver {
    Arc::new(|_ctx, input| {
        async move {
            input.downcast_ref::<RequestProducts>()?;
            Ok(input)
        }
        .boxed()
    })
}

/// Splits a [`RequestProducts`] into one sub-token per [`Product`].
pub fn product_splitter() -> Splitter {
    Arc::new(|_ctx, input| {
        async move {
            let request = input.downcast_ref::<RequestProducts>()?;
            Ok(request.products.iter().cloned().map(Value::new).collect())
        }
        .boxed()
    })
}

/// Labels a product sub-token's branch with its `product_id`.
pub fn product_tagger() -> Tagger {
    Arc::new(|_ctx, input| {
        async move {
            let product = input.downcast_ref::<Product>()?;
            Ok(product.product_id.clone())
        }
        .boxed()
    })
}

/// Simulated availability lookup.
pub fn check_availability() -> Resolver {
    Arc::new(|_ctx, _input| {
        async move {
            tokio::time::sleep(AVAILABILITY_LATENCY).await;
            Ok(Value::Str("In Stock".to_owned()))
        }
        .boxed()
    })
}

/// Simulated pricing lookup.
pub fn get_pricing() -> Resolver {
    Arc::new(|_ctx, _input| {
        async move {
            tokio::time::sleep(PRICING_LATENCY).await;
            Ok(Value::Float(25.99))
        }
        .boxed()
    })
}

/// Combines the availability and pricing branches into a [`MergedQuote`], tagged with the
/// product id taken from the enclosing `Iterator`'s sub-token (see
/// [`crate::context::RunContext::iterator_parent`]).
pub fn merger() -> Merger {
    Arc::new(|ctx, parts| {
        async move {
            let mut availability = None;
            let mut price = None;
            for part in parts {
                match part {
                    Value::Str(value) => availability = Some(value),
                    Value::Float(value) => price = Some(value),
                    _ => {
                        return Err(PipelineError::TypeMismatch {
                            expected: "str or float",
                            found: "other",
                        })
                    }
                }
            }

            let (Some(availability), Some(price)) = (availability, price) else {
                return Err(PipelineError::Stage(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "broadcast merger expected one str and one float part",
                ))));
            };

            let (parent_token, _) = ctx.iterator_parent().ok_or_else(|| {
                PipelineError::Stage(Box::new(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "merger invoked outside an iterator sub-flow",
                )))
            })?;
            let product = parent_token.downcast_ref::<Product>()?;

            Ok(Value::new(MergedQuote {
                product_id: product.product_id.clone(),
                availability,
                price,
            }))
        }
        .boxed()
    })
}

/// Correlates each [`MergedQuote`] back to its [`Product`] by `product_id` rather than by
/// position, then computes the final enrichment for each.
pub fn joiner() -> Joiner {
    Arc::new(|_ctx, original, results| {
        async move {
            let request = original.downcast_ref::<RequestProducts>()?;

            let mut by_product_id: IndexMap<String, MergedQuote> = IndexMap::with_capacity(results.len());
            for result in results {
                let quote = result.downcast::<MergedQuote>()?;
                by_product_id.insert(quote.product_id.clone(), quote);
            }

            let mut enriched = Vec::with_capacity(request.products.len());
            for product in &request.products {
                let quote = by_product_id.get(&product.product_id).ok_or_else(|| {
                    PipelineError::Stage(Box::new(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("no enrichment result for product {}", product.product_id),
                    )))
                })?;
                enriched.push(calculate_enrichment(quote, product));
            }

            Ok(Value::new(ResponseProducts { products: enriched }))
        }
        .boxed()
    })
}

/// Passes the joined [`ResponseProducts`] through unchanged.
pub fn sink() -> Resolver {
    Arc::new(|_ctx, input| async move { Ok(input) }.boxed())
}

/// Runs the same stages as the `concurrent` pipeline, but sequentially and without any runtime
/// machinery — the baseline the demo compares the `Iterator`-driven path against.
pub async fn process_sequential(request: &RequestProducts) -> Result<ResponseProducts, PipelineError> {
    let mut enriched = Vec::with_capacity(request.products.len());
    for product in &request.products {
        tokio::time::sleep(AVAILABILITY_LATENCY).await;
        let availability = "In Stock".to_owned();
        tokio::time::sleep(PRICING_LATENCY).await;
        let price = 25.99;
        let quote = MergedQuote {
            product_id: product.product_id.clone(),
            availability,
            price,
        };
        enriched.push(calculate_enrichment(&quote, product));
    }
    Ok(ResponseProducts { products: enriched })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::Breaker;
    use crate::context::RunContext;
    use crate::runtime_options::RuntimeOptions;

    fn root_ctx() -> RunContext {
        let (breaker, _rx) = Breaker::new();
        RunContext::root(breaker, None, Arc::new(RuntimeOptions::new()))
    }

    #[tokio::test]
    async fn joiner_correlates_by_product_id_not_position() {
        let request = RequestProducts {
            products: vec![
                Product { product_id: "a".into(), name: "Widget".into() },
                Product { product_id: "b".into(), name: "Gadget".into() },
            ],
        };
        // Results arrive out of order relative to `request.products`.
        let results = vec![
            Value::new(MergedQuote { product_id: "b".into(), availability: "In Stock".into(), price: 5.0 }),
            Value::new(MergedQuote { product_id: "a".into(), availability: "Backordered".into(), price: 30.0 }),
        ];

        let join = joiner();
        let joined = join(root_ctx(), Value::new(request), results).await.unwrap();
        let response = joined.downcast::<ResponseProducts>().unwrap();

        assert_eq!(response.products[0].product_id, "a");
        assert_eq!(response.products[0].availability, "Backordered");
        assert_eq!(response.products[1].product_id, "b");
        assert_eq!(response.products[1].availability, "In Stock");
    }

    #[tokio::test]
    async fn merger_tags_quote_with_product_id_from_iterator_parent() {
        let product = Product { product_id: "p-1".into(), name: "Thing".into() };
        let ctx = root_ctx().with_iterator_parent(Value::new(product));
        let parts = vec![Value::Str("In Stock".into()), Value::Float(42.0)];

        let merge = merger();
        let quote = merge(ctx, parts).await.unwrap().downcast::<MergedQuote>().unwrap();

        assert_eq!(quote.product_id, "p-1");
        assert_eq!(quote.price, 42.0);
    }
}
