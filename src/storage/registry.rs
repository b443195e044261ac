use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use rayon::prelude::*;

use super::layout::{SNode, SNodeKind};
use super::{Buffer, FieldDecl, FieldId};
use crate::types::ScalarKind;

/// The buffers owned by one placed field.
#[derive(Debug)]
pub struct Placement {
    pub(crate) field: FieldId,
    pub(crate) primary: Buffer,
    pub(crate) adjoint: Option<Buffer>,
}

impl Placement {
    pub fn field(&self) -> FieldId {
        self.field
    }

    pub fn primary(&self) -> &Buffer {
        &self.primary
    }

    pub fn adjoint(&self) -> Option<&Buffer> {
        self.adjoint.as_ref()
    }

    /// Element kind and cell count of the adjoint buffer, if there is one.
    pub fn adjoint_info(&self) -> Option<(ScalarKind, usize)> {
        self.adjoint.as_ref().map(|b| (b.kind(), b.len()))
    }
}

/// Counters reported by a gradient-clearing pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClearStats {
    /// Tree nodes visited, root included.
    pub nodes_visited: usize,
    /// Fields found at leaf placements.
    pub fields_visited: usize,
    /// Adjoint buffers overwritten.
    pub buffers_cleared: usize,
    /// Adjoint cells overwritten.
    pub elements_cleared: usize,
}

/// The finalized storage tree and every buffer placed in it.
///
/// Structure is frozen at construction. Only buffer contents change.
#[derive(Debug)]
pub struct StorageRegistry {
    tree: DiGraph<SNode, ()>,
    root: NodeIndex,
    fields: Vec<FieldDecl>,
    placements: Vec<Placement>,
}

impl StorageRegistry {
    pub(crate) fn new(
        tree: DiGraph<SNode, ()>,
        root: NodeIndex,
        fields: Vec<FieldDecl>,
        placements: Vec<Placement>,
    ) -> Self {
        Self {
            tree,
            root,
            fields,
            placements,
        }
    }

    /// A registry with a bare root and no fields.
    pub fn empty() -> Self {
        let mut tree = DiGraph::new();
        let root = tree.add_node(SNode {
            kind: SNodeKind::Root,
            shape: Vec::new(),
        });
        Self::new(tree, root, Vec::new(), Vec::new())
    }

    pub fn decl(&self, field: FieldId) -> Option<&FieldDecl> {
        self.fields.get(field.index())
    }

    pub fn lookup(&self, name: &str) -> Option<FieldId> {
        self.fields
            .iter()
            .position(|d| d.name == name)
            .map(|i| FieldId(i as u32))
    }

    pub fn placement(&self, field: FieldId) -> Option<&Placement> {
        self.placements.get(field.index())
    }

    pub fn primary(&self, field: FieldId) -> Option<&Buffer> {
        self.placement(field).map(Placement::primary)
    }

    pub fn adjoint(&self, field: FieldId) -> Option<&Buffer> {
        self.placement(field).and_then(Placement::adjoint)
    }

    pub fn node_count(&self) -> usize {
        self.tree.node_count()
    }

    /// Visit the tree depth-first from the root and collect the leaf placements.
    ///
    /// `Dfs` keeps its own stack, so nesting depth does not grow the call stack.
    fn walk(&self) -> (usize, Vec<&Placement>) {
        let mut dfs = Dfs::new(&self.tree, self.root);
        let mut visited = 0;
        let mut leaves = Vec::new();
        while let Some(nx) = dfs.next(&self.tree) {
            visited += 1;
            if let SNodeKind::Place(fields) = &self.tree[nx].kind {
                leaves.extend(fields.iter().filter_map(|f| self.placement(*f)));
            }
        }
        (visited, leaves)
    }

    /// Zero every adjoint buffer reachable from the root.
    ///
    /// Leaves are cleared in parallel on the current rayon pool. Fields
    /// without an adjoint are skipped. Running it twice changes nothing.
    pub fn clear_all_gradients(&self) -> ClearStats {
        let (nodes_visited, leaves) = self.walk();
        let fields_visited = leaves.len();

        let cleared: Vec<usize> = leaves
            .par_iter()
            .filter_map(|p| {
                let adjoint = p.adjoint()?;
                let n = adjoint.fill_zero();
                tracing::trace!(field = p.field.0, cells = n, "adjoint cleared");
                Some(n)
            })
            .collect();

        let stats = ClearStats {
            nodes_visited,
            fields_visited,
            buffers_cleared: cleared.len(),
            elements_cleared: cleared.iter().sum(),
        };
        tracing::debug!(
            nodes = stats.nodes_visited,
            buffers = stats.buffers_cleared,
            cells = stats.elements_cleared,
            "gradients cleared"
        );
        stats
    }
}
