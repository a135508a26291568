//! Renders a [`Pipeline`]'s static structure: the shape every run takes, regardless of any
//! particular execution. Counters on [`crate::pipe::if_pipe::IfPipe`] and
//! [`crate::pipe::partition::PartitionPipe`] are sampled at render time and shown as running
//! percentages alongside their branches.

use crate::pipe::{Flow, Pipe, PipeShape};
use crate::pipeline::Pipeline;

/// Renders `pipeline`'s blueprint as PlantUML activity-diagram source.
pub fn render(pipeline: &Pipeline) -> String {
    let mut out = String::new();
    out.push_str("@startuml\n");
    out.push_str(&pipeline.blueprint_skin.render());
    out.push_str(&format!("title {}\n", pipeline.name));
    if !pipeline.description.is_empty() {
        out.push_str(&format!("header {}\n", pipeline.description));
    }
    out.push_str("start\n");
    out.push_str(":Source;\n");
    render_flow(&pipeline.flow, &mut out, 0);
    out.push_str(":Sink;\n");
    out.push_str("stop\n@enduml\n");
    out
}

fn render_flow(flow: &Flow, out: &mut String, depth: usize) {
    for pipe in flow {
        render_pipe(pipe.as_ref(), out, depth);
    }
}

fn render_pipe(pipe: &dyn Pipe, out: &mut String, depth: usize) {
    let indent = "  ".repeat(depth);
    match pipe.shape() {
        PipeShape::Simple => {
            out.push_str(&format!("{indent}:{};\n", pipe.label()));
        }
        PipeShape::Broadcast { streams } => {
            out.push_str(&format!("{indent}:{};\n", pipe.label()));
            for (index, stream) in streams.iter().enumerate() {
                out.push_str(&format!(
                    "{indent}{}\n",
                    if index == 0 { "fork" } else { "fork again" }
                ));
                render_flow(stream, out, depth + 1);
            }
            out.push_str(&format!("{indent}end fork\n"));
        }
        PipeShape::Iterator { stream, max_p } => {
            let cap = max_p
                .map(|m| format!(" (max_p={m})"))
                .unwrap_or_default();
            out.push_str(&format!("{indent}split -- {}{cap};\n", pipe.label()));
            render_flow(stream, out, depth + 1);
            out.push_str(&format!("{indent}end split\n"));
        }
        PipeShape::If {
            true_flow,
            false_flow,
            counters,
        } => {
            let breakdown = counters.percentages();
            let label_for = |branch: &str| {
                breakdown
                    .iter()
                    .find(|(name, _, _)| name == branch)
                    .map(|(_, total, pct)| format!(" ({total}, {pct:.1}%)"))
                    .unwrap_or_default()
            };
            out.push_str(&format!(
                "{indent}if ({}) then (true{})\n",
                pipe.label(),
                label_for("true")
            ));
            render_flow(true_flow, out, depth + 1);
            out.push_str(&format!("{indent}else (false{})\n", label_for("false")));
            render_flow(false_flow, out, depth + 1);
            out.push_str(&format!("{indent}endif\n"));
        }
        PipeShape::Loop { stream } => {
            out.push_str(&format!("{indent}repeat :{};\n", pipe.label()));
            render_flow(stream, out, depth + 1);
            out.push_str(&format!("{indent}repeat while (more items?)\n"));
        }
        PipeShape::Partition { paths, counters } => {
            let breakdown = counters.percentages();
            out.push_str(&format!("{indent}switch ({})\n", pipe.label()));
            for (name, path_flow) in paths {
                let label = breakdown
                    .iter()
                    .find(|(n, _, _)| n == name)
                    .map(|(_, total, pct)| format!(" ({total}, {pct:.1}%)"))
                    .unwrap_or_default();
                out.push_str(&format!("{indent}case ({name}{label})\n"));
                render_flow(path_flow, out, depth + 1);
            }
            out.push_str(&format!("{indent}endswitch\n"));
        }
    }
}
