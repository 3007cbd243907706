//! Text renderings of a [`DependencyGraph`]: ASCII levels, Mermaid, and DOT.
//!
//! Each format has a `write_*` function over any [`Write`] and a `render_*`
//! convenience returning a `String`. Edges are drawn prerequisite ->
//! dependent, so arrows follow the order work happens in.

use super::{DependencyGraph, GraphNode};
use crate::domain::IssueStatus;
use std::io::{self, Write};

const CRITICAL_FILL: &str = "#ffcccc";
const CRITICAL_STROKE: &str = "#cc0000";
const BLOCKED_FILL: &str = "#fff3cd";
const BLOCKED_STROKE: &str = "#cc9a06";
const CLOSED_FILL: &str = "#d4edda";
const CLOSED_STROKE: &str = "#28a745";

/// Mermaid flowchart direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MermaidDirection {
    /// Top-down
    #[default]
    TopDown,
    /// Left-right
    LeftRight,
}

impl MermaidDirection {
    fn as_str(self) -> &'static str {
        match self {
            Self::TopDown => "TD",
            Self::LeftRight => "LR",
        }
    }
}

/// Mermaid rendering options.
#[derive(Debug, Clone, Copy, Default)]
pub struct MermaidOptions {
    /// Flowchart direction
    pub direction: MermaidDirection,
}

/// DOT rendering options.
#[derive(Debug, Clone)]
pub struct DotOptions {
    /// Graphviz `rankdir` (`LR`, `TB`, ...)
    pub rankdir: String,
    /// Graph title
    pub title: String,
}

impl Default for DotOptions {
    fn default() -> Self {
        Self {
            rankdir: "LR".to_string(),
            title: "Task Dependencies".to_string(),
        }
    }
}

fn render_with(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = f(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Render the ASCII level view.
#[must_use]
pub fn render_ascii(graph: &DependencyGraph) -> String {
    render_with(|w| write_ascii(w, graph))
}

/// Render a Mermaid flowchart.
#[must_use]
pub fn render_mermaid(graph: &DependencyGraph, options: MermaidOptions) -> String {
    render_with(|w| write_mermaid(w, graph, options))
}

/// Render a Graphviz DOT digraph.
#[must_use]
pub fn render_dot(graph: &DependencyGraph, options: &DotOptions) -> String {
    render_with(|w| write_dot(w, graph, options))
}

fn markers(node: &GraphNode) -> String {
    let mut out = String::new();
    if node.is_critical {
        out.push_str("[*]");
    }
    if node.is_blocked {
        out.push_str("[!]");
    }
    if node.status == IssueStatus::Closed {
        out.push_str("[+]");
    }
    if out.is_empty() {
        out.push_str("[ ]");
    }
    out
}

/// Write the ASCII level view.
///
/// ```text
/// DEPENDENCY GRAPH (3 tasks, 2 dependencies)
///
/// Level 0
///   [*] bd-1  Design schema (P1, open)
/// Level 1
///   [*][!] bd-2  Build API (P2, open)  <- bd-1
/// ```
pub fn write_ascii<W: Write>(w: &mut W, graph: &DependencyGraph) -> io::Result<()> {
    let stats = graph.stats();
    writeln!(
        w,
        "DEPENDENCY GRAPH ({} tasks, {} dependencies)",
        stats.total_nodes, stats.total_edges
    )?;

    if graph.is_empty() {
        writeln!(w)?;
        return writeln!(w, "No tasks to display.");
    }

    for (depth, nodes) in graph.levels().iter().enumerate() {
        if nodes.is_empty() {
            continue;
        }
        writeln!(w)?;
        writeln!(w, "Level {depth}")?;
        for node in nodes {
            write!(
                w,
                "  {} {}  {} (P{}, {})",
                markers(node),
                node.id,
                node.title,
                node.priority,
                node.status
            )?;
            if !node.dependencies.is_empty() {
                let deps: Vec<&str> = node.dependencies.iter().map(|d| d.as_str()).collect();
                write!(w, "  <- {}", deps.join(", "))?;
            }
            writeln!(w)?;
        }
    }

    if stats.has_cycles {
        let ids: Vec<&str> = stats.cycle_nodes.iter().map(|d| d.as_str()).collect();
        writeln!(w)?;
        writeln!(w, "Cycle detected: {}", ids.join(", "))?;
    }

    let path = graph.critical_path();
    if let Some(first) = path.first() {
        writeln!(w)?;
        writeln!(w, "CRITICAL PATH (effort {})", graph.critical_path_effort())?;
        write!(w, "  {first}")?;
        // Steps without a dependency between them are listed, not chained.
        for pair in path.windows(2) {
            let sep = if graph.has_edge(&pair[1], &pair[0]) { " -> " } else { ", " };
            write!(w, "{sep}{}", pair[1])?;
        }
        writeln!(w)?;
        if graph.edge_count() == 0 && path.len() > 1 {
            writeln!(w, "  (independent tasks, no dependencies)")?;
        }
    }

    writeln!(w)?;
    writeln!(w, "Legend: [*] critical  [!] blocked  [+] closed")
}

/// Mermaid node identifiers allow only alphanumerics and underscores.
fn mermaid_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Write a Mermaid flowchart.
///
/// Critical edges use the thick `==>` arrow; nodes get `critical`,
/// `blocked`, and `closed` classes.
pub fn write_mermaid<W: Write>(
    w: &mut W,
    graph: &DependencyGraph,
    options: MermaidOptions,
) -> io::Result<()> {
    writeln!(w, "graph {}", options.direction.as_str())?;

    if graph.is_empty() {
        return writeln!(w, "    empty[\"No tasks to display\"]");
    }

    for node in graph.nodes() {
        writeln!(
            w,
            "    {}[\"{}: {}\"]",
            mermaid_id(node.id.as_str()),
            escape_html(node.id.as_str()),
            escape_html(&node.title)
        )?;
    }

    for (dependent, prerequisite) in graph.edges() {
        let arrow = if graph.is_critical_edge(&dependent, &prerequisite) {
            "==>"
        } else {
            "-->"
        };
        writeln!(
            w,
            "    {} {arrow} {}",
            mermaid_id(prerequisite.as_str()),
            mermaid_id(dependent.as_str())
        )?;
    }

    writeln!(
        w,
        "    classDef critical fill:{CRITICAL_FILL},stroke:{CRITICAL_STROKE},stroke-width:3px"
    )?;
    writeln!(w, "    classDef blocked fill:{BLOCKED_FILL},stroke:{BLOCKED_STROKE}")?;
    writeln!(w, "    classDef closed fill:{CLOSED_FILL},stroke:{CLOSED_STROKE}")?;

    let classes: [(&str, fn(&GraphNode) -> bool); 3] = [
        ("critical", |n| n.is_critical),
        ("blocked", |n| n.is_blocked && !n.is_critical),
        ("closed", |n| n.status == IssueStatus::Closed),
    ];
    for (class, applies) in classes {
        let members: Vec<String> = graph
            .nodes()
            .iter()
            .filter(|n| applies(n))
            .map(|n| mermaid_id(n.id.as_str()))
            .collect();
        if !members.is_empty() {
            writeln!(w, "    class {} {class}", members.join(","))?;
        }
    }
    Ok(())
}

fn escape_dot(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn dot_node_style(node: &GraphNode) -> (&'static str, &'static str, &'static str) {
    if node.status == IssueStatus::Closed {
        ("box", "filled,dashed", CLOSED_FILL)
    } else if node.is_critical {
        ("box", "filled,bold", CRITICAL_FILL)
    } else if node.is_blocked {
        ("octagon", "filled", BLOCKED_FILL)
    } else {
        ("box", "filled", "#ffffff")
    }
}

/// Write a Graphviz DOT digraph.
///
/// Nodes at the same depth share a rank.
pub fn write_dot<W: Write>(
    w: &mut W,
    graph: &DependencyGraph,
    options: &DotOptions,
) -> io::Result<()> {
    writeln!(w, "digraph dependencies {{")?;
    writeln!(w, "    rankdir={};", options.rankdir)?;
    writeln!(w, "    label=\"{}\";", escape_dot(&options.title))?;
    writeln!(w, "    labelloc=t;")?;
    writeln!(w, "    node [fontname=\"Helvetica\"];")?;

    if graph.is_empty() {
        writeln!(w, "    empty [label=\"No tasks to display\", shape=plaintext];")?;
        return writeln!(w, "}}");
    }

    for node in graph.nodes() {
        let (shape, style, fill) = dot_node_style(node);
        writeln!(
            w,
            "    \"{}\" [label=\"{}\\n{}\", shape={shape}, style=\"{style}\", fillcolor=\"{fill}\"];",
            escape_dot(node.id.as_str()),
            escape_dot(node.id.as_str()),
            escape_dot(&node.title)
        )?;
    }

    for (dependent, prerequisite) in graph.edges() {
        let attrs = if graph.is_critical_edge(&dependent, &prerequisite) {
            format!(" [penwidth=3, color=\"{CRITICAL_STROKE}\"]")
        } else {
            String::new()
        };
        writeln!(
            w,
            "    \"{}\" -> \"{}\"{attrs};",
            escape_dot(prerequisite.as_str()),
            escape_dot(dependent.as_str())
        )?;
    }

    for nodes in graph.levels() {
        if nodes.len() < 2 {
            continue;
        }
        let members: Vec<String> = nodes
            .iter()
            .map(|n| format!("\"{}\";", escape_dot(n.id.as_str())))
            .collect();
        writeln!(w, "    {{ rank=same; {} }}", members.join(" "))?;
    }

    writeln!(w, "}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Issue;
    use crate::graph::GraphOptions;

    fn sample() -> DependencyGraph {
        let issues = [
            Issue::new("bd-1", "Design <schema>").with_priority(1),
            Issue::new("bd-2", "Build \"API\"").depends_on("bd-1"),
            Issue::new("bd-3", "Write docs").with_priority(4),
        ];
        DependencyGraph::build(&issues, GraphOptions::default())
    }

    #[test]
    fn ascii_lists_levels_and_critical_path() {
        let out = render_ascii(&sample());
        assert!(out.starts_with("DEPENDENCY GRAPH (3 tasks, 1 dependencies)"));
        assert!(out.contains("Level 0"));
        assert!(out.contains("Level 1"));
        assert!(out.contains("[*][!] bd-2"));
        assert!(out.contains("<- bd-1"));
        assert!(out.contains("bd-1 -> bd-2"));
    }

    #[test]
    fn ascii_reports_cycles() {
        let issues = [
            Issue::new("a", "A").depends_on("b"),
            Issue::new("b", "B").depends_on("a"),
        ];
        let out = render_ascii(&DependencyGraph::build(&issues, GraphOptions::default()));
        assert!(out.contains("Cycle detected: a, b"));
    }

    #[test]
    fn ascii_lists_independent_critical_path_without_arrows() {
        let issues = [
            Issue::new("a", "A"),
            Issue::new("b", "B"),
            Issue::new("c", "C"),
        ];
        let graph = DependencyGraph::build(&issues, GraphOptions::default());
        assert_eq!(graph.edge_count(), 0);
        let out = render_ascii(&graph);
        assert!(out.contains("  a, b, c\n"), "{out}");
        assert!(!out.contains(" -> "));
        assert!(out.contains("independent tasks"));
    }

    #[test]
    fn mermaid_escapes_and_highlights() {
        let out = render_mermaid(&sample(), MermaidOptions::default());
        assert!(out.starts_with("graph TD\n"));
        assert!(out.contains("bd_1[\"bd-1: Design &lt;schema&gt;\"]"));
        assert!(out.contains("bd_2[\"bd-2: Build &quot;API&quot;\"]"));
        assert!(out.contains("bd_1 ==> bd_2"));
        assert!(out.contains("class bd_1,bd_2 critical"));
    }

    #[test]
    fn mermaid_direction_is_configurable() {
        let out = render_mermaid(
            &sample(),
            MermaidOptions {
                direction: MermaidDirection::LeftRight,
            },
        );
        assert!(out.starts_with("graph LR\n"));
    }

    #[test]
    fn empty_graph_renders_placeholder() {
        let graph = DependencyGraph::build(&Vec::<Issue>::new(), GraphOptions::default());
        assert!(render_mermaid(&graph, MermaidOptions::default()).contains("No tasks to display"));
        assert!(render_dot(&graph, &DotOptions::default()).contains("No tasks to display"));
        assert!(render_ascii(&graph).contains("No tasks to display"));
    }

    #[test]
    fn dot_has_header_edges_and_ranks() {
        let out = render_dot(&sample(), &DotOptions::default());
        assert!(out.starts_with("digraph dependencies {\n"));
        assert!(out.contains("rankdir=LR;"));
        assert!(out.contains("label=\"Task Dependencies\";"));
        assert!(out.contains("\"bd-1\" -> \"bd-2\" [penwidth=3"));
        assert!(out.contains("Build \\\"API\\\""));
        assert!(out.contains("{ rank=same; \"bd-1\"; \"bd-3\"; }"));
        assert!(out.trim_end().ends_with('}'));
    }
}
