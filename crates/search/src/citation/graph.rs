//! Citation graph representation
//!
//! Provides an in-memory, index-addressed citation graph for scoring.
//! An edge `citing -> cited` means "citing references cited".

use risotto_common::models::{Document, DocumentId};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Edges and records discarded while building a graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStats {
    /// References pointing at a document outside the corpus
    pub dangling_references: usize,
    /// References from a document to itself
    pub self_loops: usize,
    /// Records whose id was already present (first one wins)
    pub duplicate_documents: usize,
    /// Records with a blank id, left out of the graph
    pub missing_ids: usize,
}

/// In-memory citation graph
#[derive(Debug, Default)]
pub struct CitationGraph {
    /// Node index -> paper ID
    nodes: Vec<DocumentId>,

    /// Paper ID -> node index
    index: HashMap<DocumentId, usize>,

    /// Adjacency list: node -> nodes it cites
    outgoing: Vec<Vec<usize>>,

    /// Reverse adjacency: node -> nodes citing it
    incoming: Vec<Vec<usize>>,

    /// Deduplicated (citing, cited) pairs
    edges: HashSet<(usize, usize)>,
}

impl CitationGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for a corpus.
    ///
    /// Every document with an id becomes a node, including documents with
    /// no edges. References to unknown ids and self-references are dropped.
    pub fn from_documents(documents: &[Document]) -> (Self, GraphStats) {
        let mut graph = Self::new();
        let mut stats = GraphStats::default();

        for doc in documents {
            if doc.id.as_str().trim().is_empty() {
                stats.missing_ids += 1;
                continue;
            }
            if graph.index.contains_key(&doc.id) {
                stats.duplicate_documents += 1;
                continue;
            }
            graph.add_node(doc.id.clone());
        }

        let mut seen = HashSet::with_capacity(documents.len());
        for doc in documents {
            if !graph.index.contains_key(&doc.id) || !seen.insert(&doc.id) {
                continue;
            }
            for reference in &doc.references {
                if reference == &doc.id {
                    stats.self_loops += 1;
                } else if !graph.index.contains_key(reference) {
                    stats.dangling_references += 1;
                } else {
                    graph.add_edge(&doc.id, reference);
                }
            }
        }

        if stats.missing_ids > 0 {
            warn!(missing_ids = stats.missing_ids, "Documents without an id left out of citation graph");
        }

        if stats.duplicate_documents > 0 {
            warn!(
                duplicates = stats.duplicate_documents,
                "Duplicate document ids ignored while building citation graph"
            );
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            dangling_references = stats.dangling_references,
            self_loops = stats.self_loops,
            "Citation graph built"
        );

        (graph, stats)
    }

    /// Add a node, returning its index
    pub fn add_node(&mut self, id: DocumentId) -> usize {
        if let Some(&i) = self.index.get(&id) {
            return i;
        }
        let i = self.nodes.len();
        self.index.insert(id.clone(), i);
        self.nodes.push(id);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        i
    }

    /// Add an edge between two known nodes.
    ///
    /// Returns false for self-loops, unknown endpoints and duplicates.
    pub fn add_edge(&mut self, citing: &DocumentId, cited: &DocumentId) -> bool {
        let (Some(&from), Some(&to)) = (self.index.get(citing), self.index.get(cited)) else {
            return false;
        };
        if from == to || !self.edges.insert((from, to)) {
            return false;
        }

        self.outgoing[from].push(to);
        self.incoming[to].push(from);
        true
    }

    /// Get papers cited by this paper
    pub fn get_references(&self, paper_id: &DocumentId) -> impl Iterator<Item = &DocumentId> {
        self.neighbours(paper_id, &self.outgoing)
    }

    /// Get papers citing this paper
    pub fn get_citations(&self, paper_id: &DocumentId) -> impl Iterator<Item = &DocumentId> {
        self.neighbours(paper_id, &self.incoming)
    }

    fn neighbours<'a>(
        &'a self,
        paper_id: &DocumentId,
        adjacency: &'a [Vec<usize>],
    ) -> impl Iterator<Item = &'a DocumentId> {
        self.index
            .get(paper_id)
            .map(|&i| adjacency[i].as_slice())
            .unwrap_or(&[])
            .iter()
            .map(|&j| &self.nodes[j])
    }

    /// All node ids, in index order
    pub fn nodes(&self) -> &[DocumentId] {
        &self.nodes
    }

    /// Get node count
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get edge count
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Get citation count (incoming edges)
    pub fn citation_count(&self, paper_id: &DocumentId) -> usize {
        self.index.get(paper_id).map(|&i| self.incoming[i].len()).unwrap_or(0)
    }

    /// Get reference count (outgoing edges)
    pub fn reference_count(&self, paper_id: &DocumentId) -> usize {
        self.index.get(paper_id).map(|&i| self.outgoing[i].len()).unwrap_or(0)
    }

    pub(crate) fn out_degree(&self, node: usize) -> usize {
        self.outgoing[node].len()
    }

    pub(crate) fn incoming_of(&self, node: usize) -> &[usize] {
        &self.incoming[node]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> DocumentId {
        DocumentId::new(s)
    }

    #[test]
    fn test_graph_construction() {
        // A cites B, B cites C
        let docs = vec![
            Document::new("a").citing(["b"]),
            Document::new("b").citing(["c"]),
            Document::new("c"),
        ];
        let (graph, stats) = CitationGraph::from_documents(&docs);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.get_references(&id("a")).collect::<Vec<_>>(), vec![&id("b")]);
        assert_eq!(graph.get_citations(&id("b")).collect::<Vec<_>>(), vec![&id("a")]);
        assert_eq!(stats, GraphStats::default());
    }

    #[test]
    fn test_citation_counts() {
        // Both A and C cite B
        let docs = vec![
            Document::new("a").citing(["b"]),
            Document::new("b"),
            Document::new("c").citing(["b"]),
        ];
        let (graph, _) = CitationGraph::from_documents(&docs);

        assert_eq!(graph.citation_count(&id("b")), 2);
        assert_eq!(graph.reference_count(&id("a")), 1);
        assert_eq!(graph.reference_count(&id("b")), 0);
    }

    #[test]
    fn test_drops_self_loops_and_unknown_references() {
        let docs = vec![
            Document::new("a").citing(["a", "b", "missing"]),
            Document::new("b"),
        ];
        let (graph, stats) = CitationGraph::from_documents(&docs);

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(stats.self_loops, 1);
        assert_eq!(stats.dangling_references, 1);
        assert_eq!(graph.citation_count(&id("missing")), 0);
    }

    #[test]
    fn test_duplicate_documents_keep_first() {
        let docs = vec![
            Document::new("a").citing(["b"]),
            Document::new("b"),
            Document::new("a").citing(["c"]),
            Document::new("c"),
        ];
        let (graph, stats) = CitationGraph::from_documents(&docs);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(stats.duplicate_documents, 1);
        assert_eq!(graph.reference_count(&id("a")), 1);
    }

    #[test]
    fn test_blank_ids_are_excluded() {
        let docs = vec![
            Document::new("").citing(["a"]),
            Document::new("a").citing(["", "  "]),
            Document::new("  "),
        ];
        let (graph, stats) = CitationGraph::from_documents(&docs);

        assert_eq!(graph.nodes(), &[id("a")]);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(stats.missing_ids, 2);
        assert_eq!(stats.dangling_references, 2);
        assert_eq!(graph.citation_count(&id("a")), 0);
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let mut graph = CitationGraph::new();
        graph.add_node(id("a"));
        graph.add_node(id("b"));

        assert!(graph.add_edge(&id("a"), &id("b")));
        assert!(!graph.add_edge(&id("a"), &id("b")));
        assert!(!graph.add_edge(&id("a"), &id("zzz")));
        assert_eq!(graph.edge_count(), 1);
    }
}
