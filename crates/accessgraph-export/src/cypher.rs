//! Neo4j-compatible Cypher export.
//!
//! A fixed schema header, then one `MERGE` per node (sorted by id) and one
//! `MATCH`/`MATCH`/`MERGE` triple per edge (sorted by `(src, dst, kind)`).
//! Labels and relationship types are sanitized to `[A-Za-z0-9_]`; string
//! literals escape `"` and `\`. Output is byte-identical for graphs with
//! equal node/edge multisets.

use accessgraph::{Edge, Graph, Node};
use std::fmt::Write;

const HEADER: &str = "\
// AccessGraph export
CREATE CONSTRAINT accessgraph_node_id IF NOT EXISTS FOR (n:Node) REQUIRE n.id IS UNIQUE;
CREATE INDEX accessgraph_node_kind IF NOT EXISTS FOR (n:Node) ON (n.kind);
";

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
fn sanitize_identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Escape a string for a double-quoted Cypher literal.
fn escape_literal(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

fn node_properties(node: &Node) -> String {
    let mut parts = Vec::with_capacity(2 + node.props.len());
    parts.push(format!("id: \"{}\"", escape_literal(&node.id)));
    parts.push(format!("kind: \"{}\"", node.kind.as_str()));
    if !node.labels.is_empty() {
        let labels = node
            .labels
            .iter()
            .map(|l| format!("\"{}\"", escape_literal(l)))
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("labels: [{labels}]"));
    }
    for (key, value) in &node.props {
        parts.push(format!(
            "{}: \"{}\"",
            sanitize_identifier(key),
            escape_literal(value)
        ));
    }
    parts.join(", ")
}

fn edge_properties(edge: &Edge) -> String {
    if edge.props.is_empty() {
        return String::new();
    }
    let parts = edge
        .props
        .iter()
        .map(|(key, value)| {
            format!("{}: \"{}\"", sanitize_identifier(key), escape_literal(value))
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(" {{{parts}}}")
}

/// Render the whole graph as Cypher statements.
#[must_use]
pub fn export(graph: &Graph) -> String {
    let mut out = String::from(HEADER);

    out.push_str("\n// NODES\n");
    for node in graph.nodes() {
        let _ = writeln!(
            out,
            "MERGE (n:Node:K_{} {{{}}});",
            sanitize_identifier(node.kind.as_str()),
            node_properties(&node)
        );
    }

    out.push_str("\n// EDGES\n");
    let mut edges = graph.edges();
    edges.sort_by(|a, b| {
        (a.src.as_str(), a.dst.as_str(), a.kind.as_str())
            .cmp(&(b.src.as_str(), b.dst.as_str(), b.kind.as_str()))
    });
    for edge in edges {
        let _ = writeln!(
            out,
            "MATCH (a:Node {{id: \"{}\"}}) MATCH (b:Node {{id: \"{}\"}}) MERGE (a)-[:{}{}]->(b);",
            escape_literal(&edge.src),
            escape_literal(&edge.dst),
            sanitize_identifier(&edge.kind),
            edge_properties(&edge)
        );
    }

    out
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;
    use accessgraph::{edge_kinds, props, NodeKind};

    fn sample_graph() -> Graph {
        let mut g = Graph::new();
        g.add_node(
            Node::new("arn:aws:iam::111111111111:role/Dev", NodeKind::Principal).with_label("Dev"),
        );
        g.add_node(Node::new("arn:aws:iam::111111111111:policy/P", NodeKind::Policy));
        g.add_edge(
            Edge::new(
                "arn:aws:iam::111111111111:role/Dev",
                "arn:aws:iam::111111111111:policy/P",
                edge_kinds::ATTACHED_POLICY,
            )
            .with_prop(props::ACTION, "sts:AssumeRole"),
        )
        .unwrap();
        g
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("ASSUMES_ROLE"), "ASSUMES_ROLE");
        assert_eq!(sanitize_identifier("has-policy"), "has_policy");
        assert_eq!(sanitize_identifier("a b:c"), "a_b_c");
    }

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape_literal(r"back\slash"), r"back\\slash");
    }

    #[test]
    fn test_header_and_sections() {
        let cypher = export(&sample_graph());
        assert!(cypher.starts_with("// AccessGraph export\n"));
        assert!(cypher.contains("CREATE CONSTRAINT accessgraph_node_id"));
        assert!(cypher.contains("CREATE INDEX accessgraph_node_kind"));
        assert!(cypher.contains("\n// NODES\n"));
        assert!(cypher.contains("\n// EDGES\n"));
    }

    #[test]
    fn test_node_statements() {
        let cypher = export(&sample_graph());
        assert!(cypher.contains(
            "MERGE (n:Node:K_PRINCIPAL {id: \"arn:aws:iam::111111111111:role/Dev\", kind: \"PRINCIPAL\", labels: [\"Dev\"]});"
        ));
        assert!(cypher.contains("MERGE (n:Node:K_POLICY"));
    }

    #[test]
    fn test_edge_statement() {
        let cypher = export(&sample_graph());
        assert!(cypher.contains(
            "MATCH (a:Node {id: \"arn:aws:iam::111111111111:role/Dev\"}) \
             MATCH (b:Node {id: \"arn:aws:iam::111111111111:policy/P\"}) \
             MERGE (a)-[:ATTACHED_POLICY {action: \"sts:AssumeRole\"}]->(b);"
        ));
    }

    #[test]
    fn test_nodes_sorted_by_id() {
        let mut g = Graph::new();
        g.add_node(Node::new("zzz", NodeKind::Resource));
        g.add_node(Node::new("aaa", NodeKind::Resource));
        let cypher = export(&g);

        let a_pos = cypher.find("id: \"aaa\"").unwrap();
        let z_pos = cypher.find("id: \"zzz\"").unwrap();
        assert!(a_pos < z_pos);
    }

    #[test]
    fn test_edges_sorted() {
        let mut g = Graph::new();
        for id in ["a", "b", "c"] {
            g.add_node(Node::new(id, NodeKind::Resource));
        }
        g.add_edge(Edge::new("b", "c", "Z_KIND")).unwrap();
        g.add_edge(Edge::new("a", "c", "K")).unwrap();
        g.add_edge(Edge::new("a", "b", "K")).unwrap();

        let cypher = export(&g);
        let ab = cypher.find("MATCH (a:Node {id: \"a\"}) MATCH (b:Node {id: \"b\"})").unwrap();
        let ac = cypher.find("MATCH (a:Node {id: \"a\"}) MATCH (b:Node {id: \"c\"})").unwrap();
        let bc = cypher.find("MATCH (a:Node {id: \"b\"})").unwrap();
        assert!(ab < ac);
        assert!(ac < bc);
    }

    #[test]
    fn test_exotic_kind_sanitized() {
        let mut g = Graph::new();
        g.add_node(Node::new("a", NodeKind::Resource));
        g.add_node(Node::new("b", NodeKind::Resource));
        g.add_edge(Edge::new("a", "b", "weird-kind!")).unwrap();

        let cypher = export(&g);
        assert!(cypher.contains("MERGE (a)-[:weird_kind_]->(b);"));
    }

    #[test]
    fn test_quotes_in_values_escaped() {
        let mut g = Graph::new();
        g.add_node(Node::new("n", NodeKind::Resource).with_prop("note", "say \"hi\""));
        let cypher = export(&g);
        assert!(cypher.contains("note: \"say \\\"hi\\\"\""));
    }

    #[test]
    fn test_empty_graph_header_only() {
        let cypher = export(&Graph::new());
        assert!(cypher.contains("CREATE CONSTRAINT"));
        assert!(cypher.contains("// NODES"));
        assert!(cypher.contains("// EDGES"));
        assert!(!cypher.contains("MERGE"));
    }

    #[test]
    fn test_byte_identical_for_equal_graphs() {
        // Insertion order differs; multisets are equal.
        let mut g1 = Graph::new();
        g1.add_node(Node::new("a", NodeKind::Resource));
        g1.add_node(Node::new("b", NodeKind::Resource));
        g1.add_edge(Edge::new("a", "b", "K")).unwrap();

        let mut g2 = Graph::new();
        g2.add_node(Node::new("b", NodeKind::Resource));
        g2.add_node(Node::new("a", NodeKind::Resource));
        g2.add_edge(Edge::new("a", "b", "K")).unwrap();

        assert_eq!(export(&g1), export(&g2));
    }
}
