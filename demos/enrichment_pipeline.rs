//! Runs the demo product-enrichment pipeline with tracing enabled, printing both the enriched
//! products and the plantuml.com link for the resulting execution trace.

use std::sync::Arc;

use conduit::pipeline;
use conduit::runtime_options::RuntimeOptions;
use conduit::stages::domain::{Product, RequestProducts, ResponseProducts};
use conduit::stages::topology;
use conduit::value::Value;

#[tokio::main]
async fn main() {
    let demo_pipeline = topology::enrichment_pipeline(Some(4));
    println!("{}", demo_pipeline.diagram());

    let request = RequestProducts {
        products: vec![
            Product { product_id: "p-1".into(), name: "Widget".into() },
            Product { product_id: "p-2".into(), name: "Gadget".into() },
            Product { product_id: "p-3".into(), name: "Gizmo".into() },
        ],
    };

    let options = Arc::new(RuntimeOptions::new().with_default_max_p(4));
    let (result, link) = pipeline::run_with_tracer(options, &demo_pipeline, Value::new(request))
        .await
        .expect("enrichment demo pipeline never fails");
    let response = result
        .downcast::<ResponseProducts>()
        .expect("enrichment pipeline always produces ResponseProducts");

    for product in &response.products {
        println!(
            "{}: {} @ {:.2} (total {:.2})",
            product.product_id, product.availability, product.price, product.total_cost
        );
    }
    println!("trace: {link}");
}
