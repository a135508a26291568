//! Wires the enrichment stages into a runnable [`Pipeline`]: an `Iterator` over the submitted
//! products, each running a `Broadcast` of availability and pricing lookups.

use std::sync::Arc;

use crate::diagram::skin::{demo_blueprint_skin, demo_trace_skin};
use crate::pipe::broadcast::Broadcast;
use crate::pipe::iterator::Iterator;
use crate::pipeline::Pipeline;
use crate::stages::enrichment;

/// Builds the `concurrent` mode pipeline: one [`Iterator`] over the request's products, each
/// running availability and pricing lookups in parallel via [`Broadcast`], joined back together
/// by correlating on `product_id`.
///
/// `max_p` caps how many products are enriched concurrently; `None` runs the whole batch as one
/// chunk.
pub fn enrichment_pipeline(max_p: Option<usize>) -> Pipeline {
    let availability_and_pricing = Broadcast::named(
        "AvailabilityAndPricing",
        vec![
            vec![Arc::new(crate::pipe::simple::SimplePipe::named(
                "CheckAvailability",
                enrichment::check_availability(),
            )) as Arc<dyn crate::pipe::Pipe>],
            vec![Arc::new(crate::pipe::simple::SimplePipe::named(
                "GetPricing",
                enrichment::get_pricing(),
            )) as Arc<dyn crate::pipe::Pipe>],
        ],
        enrichment::merger(),
    );

    let mut per_product = Iterator::named(
        "EnrichProducts",
        enrichment::product_splitter(),
        vec![Arc::new(availability_and_pricing) as Arc<dyn crate::pipe::Pipe>],
        enrichment::joiner(),
    )
    .with_tagger(enrichment::product_tagger());

    if let Some(max_p) = max_p {
        per_product = per_product.with_max_p(max_p);
    }

    Pipeline {
        name: "ProductEnrichment".to_owned(),
        description: "Enriches submitted products with availability and pricing.".to_owned(),
        source: enrichment::source(),
        flow: vec![Arc::new(per_product) as Arc<dyn crate::pipe::Pipe>],
        sink: enrichment::sink(),
        blueprint_skin: demo_blueprint_skin(),
        trace_skin: demo_trace_skin(),
        source_note: None,
        sink_note: None,
    }
}
