//! Plain-text rendering of a snapshot's view tree.

use std::{collections::HashSet, fmt::Write};

use shared::{domain::InstanceId, snapshot::ApplicationSnapshot};

pub fn render_tree(snapshot: &ApplicationSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "template: {}", display_template(&snapshot.template));
    let mut visited = HashSet::new();
    for root in snapshot.roots() {
        render_instance(snapshot, root, 0, &mut visited, &mut out);
    }
    out
}

fn display_template(template: &str) -> &str {
    if template.is_empty() {
        "(none)"
    } else {
        template
    }
}

fn render_instance<'a>(
    snapshot: &'a ApplicationSnapshot,
    id: &'a InstanceId,
    depth: usize,
    visited: &mut HashSet<&'a InstanceId>,
    out: &mut String,
) {
    let indent = "  ".repeat(depth);
    let Some(view) = snapshot.instance(id.as_str()) else {
        let _ = writeln!(out, "{indent}- {id} (missing)");
        return;
    };
    if !visited.insert(id) {
        let _ = writeln!(out, "{indent}- {id} (cycle)");
        return;
    }

    let _ = write!(out, "{indent}- {} [{}]", view.name, view.instance_id);
    if !view.commands.is_empty() {
        let names: Vec<&str> = view.commands.keys().map(String::as_str).collect();
        let _ = write!(out, " commands: {}", names.join(", "));
    }
    if !view.model.is_null() {
        let _ = write!(out, " model: {}", view.model);
    }
    out.push('\n');

    for (region, children) in &view.regions {
        let _ = writeln!(out, "{indent}  @{region}");
        for child in children {
            render_instance(snapshot, child, depth + 2, visited, out);
        }
    }
    visited.remove(id);
}
