//! Renders a [`Tracer`]'s node tree: what actually ran, how long it took, and what it was
//! annotated with. Unlike the blueprint renderer, this one never touches the [`crate::pipe::Pipe`]
//! trait — a [`TracerNode`] already carries everything needed independent of the `Flow` that
//! produced it.

use crate::tracer::{Terminal, Tracer, TracerNode};

/// Renders `tracer`'s recorded execution as PlantUML activity-diagram source.
pub fn render(tracer: &Tracer) -> String {
    let mut out = String::new();
    out.push_str("@startuml\n");
    out.push_str(&tracer.skin().render());
    out.push_str(&format!("title {}\n", tracer.name()));
    out.push_str("start\n");
    for note in tracer.source_notes() {
        out.push_str(&format!("note right: {note}\n"));
    }
    for node in tracer.top_level_nodes() {
        render_node(&node, &mut out, 0);
    }
    for note in tracer.sink_notes() {
        out.push_str(&format!("note right: {note}\n"));
    }
    out.push_str("stop\n@enduml\n");
    out
}

fn render_node(node: &TracerNode, out: &mut String, depth: usize) {
    let indent = "  ".repeat(depth);
    let label = node.label();
    match node.terminal() {
        Some(Terminal::Done) | None => {
            let ms = node.duration().map(|d| d.as_millis()).unwrap_or(0);
            out.push_str(&format!("{indent}:{label} ({ms} ms);\n"));
        }
        Some(Terminal::Cancelled) => {
            out.push_str(&format!("{indent}#gray:{label} (cancelled);\n"));
        }
        Some(Terminal::Failed(message)) => {
            out.push_str(&format!("{indent}#red:{label} (failed: {message});\n"));
        }
    }
    for note in node.notes() {
        out.push_str(&format!("{indent}note right: {note}\n"));
    }
    for branch_name in node.branch_names() {
        out.push_str(&format!("{indent}partition {branch_name} {{\n"));
        for child in node.branch(&branch_name) {
            render_node(&child, out, depth + 1);
        }
        out.push_str(&format!("{indent}}}\n"));
    }
}
