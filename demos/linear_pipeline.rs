//! A minimal linear pipeline: two `SimplePipe`s chained from source to sink. Prints the static
//! blueprint diagram, then runs it once.

use std::sync::Arc;

use conduit::diagram::skin::{demo_blueprint_skin, demo_trace_skin};
use conduit::pipe::simple::SimplePipe;
use conduit::pipe::{Pipe, Resolver};
use conduit::pipeline::{self, Pipeline};
use conduit::runtime_options::RuntimeOptions;
use conduit::value::Value;
use futures::FutureExt;

fn double() -> Resolver {
    Arc::new(|_ctx, input| {
        async move {
            let n = input.as_int()?;
            Ok(Value::Int(n * 2))
        }
        .boxed()
    })
}

fn increment() -> Resolver {
    Arc::new(|_ctx, input| {
        async move {
            let n = input.as_int()?;
            Ok(Value::Int(n + 1))
        }
        .boxed()
    })
}

fn identity() -> Resolver {
    Arc::new(|_ctx, input| async move { Ok(input) }.boxed())
}

#[tokio::main]
async fn main() {
    let pipeline = Pipeline {
        name: "LinearDemo".to_owned(),
        description: "doubles then increments an integer".to_owned(),
        source: identity(),
        flow: vec![
            Arc::new(SimplePipe::named("Double", double())) as Arc<dyn Pipe>,
            Arc::new(SimplePipe::named("Increment", increment())) as Arc<dyn Pipe>,
        ],
        sink: identity(),
        blueprint_skin: demo_blueprint_skin(),
        trace_skin: demo_trace_skin(),
        source_note: None,
        sink_note: None,
    };

    println!("{}", pipeline.diagram());

    let options = Arc::new(RuntimeOptions::new());
    let result = pipeline::run(options, &pipeline, Value::Int(10), false)
        .await
        .expect("linear demo pipeline never fails");
    println!("result: {}", result.as_int().unwrap());
}
