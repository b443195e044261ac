use petgraph::graph::{DiGraph, NodeIndex};

use super::registry::{Placement, StorageRegistry};
use super::{Buffer, FieldDecl, FieldId};

/// One level of the storage tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SNodeKind {
    Root,
    /// Fully allocated block with the given per-axis extents.
    Dense(Vec<usize>),
    /// Pointer block. Allocated fully active.
    Pointer(Vec<usize>),
    /// Bitmasked block. Allocated fully active.
    Bitmasked(Vec<usize>),
    /// Leaf placement of one or more fields.
    Place(Vec<FieldId>),
}

impl SNodeKind {
    fn extents(&self) -> &[usize] {
        match self {
            SNodeKind::Dense(e) | SNodeKind::Pointer(e) | SNodeKind::Bitmasked(e) => e,
            SNodeKind::Root | SNodeKind::Place(_) => &[],
        }
    }
}

/// A tree node and the cumulative shape of the cells it indexes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SNode {
    pub kind: SNodeKind,
    pub shape: Vec<usize>,
}

/// Handle to a node of a layout under construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) NodeIndex);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("field '{0}' is placed more than once")]
    PlacedTwice(String),
    #[error("field '{0}' is declared but never placed")]
    NotPlaced(String),
    #[error("cannot attach children to a place node")]
    ChildOfPlace,
    #[error("unknown field id {0}")]
    UnknownField(u32),
}

/// Declares fields and the storage tree they are placed in.
pub struct LayoutBuilder {
    graph: DiGraph<SNode, ()>,
    root: NodeIndex,
    fields: Vec<FieldDecl>,
    placed: Vec<Option<NodeIndex>>,
    errors: Vec<LayoutError>,
}

impl Default for LayoutBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutBuilder {
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(SNode {
            kind: SNodeKind::Root,
            shape: Vec::new(),
        });
        Self {
            graph,
            root,
            fields: Vec::new(),
            placed: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(self.root)
    }

    pub fn declare(&mut self, decl: FieldDecl) -> FieldId {
        let id = FieldId(self.fields.len() as u32);
        self.fields.push(decl);
        self.placed.push(None);
        id
    }

    pub fn dense(&mut self, parent: NodeId, extents: &[usize]) -> NodeId {
        self.child(parent, SNodeKind::Dense(extents.to_vec()))
    }

    pub fn pointer(&mut self, parent: NodeId, extents: &[usize]) -> NodeId {
        self.child(parent, SNodeKind::Pointer(extents.to_vec()))
    }

    pub fn bitmasked(&mut self, parent: NodeId, extents: &[usize]) -> NodeId {
        self.child(parent, SNodeKind::Bitmasked(extents.to_vec()))
    }

    pub fn place(&mut self, parent: NodeId, fields: &[FieldId]) -> NodeId {
        let node = self.child(parent, SNodeKind::Place(fields.to_vec()));
        for field in fields {
            match self.placed.get(field.index()).copied() {
                Some(None) => self.placed[field.index()] = Some(node.0),
                Some(Some(_)) => {
                    let name = self.fields[field.index()].name.clone();
                    self.errors.push(LayoutError::PlacedTwice(name));
                }
                None => self.errors.push(LayoutError::UnknownField(field.0)),
            }
        }
        node
    }

    /// Give every declared field an adjoint buffer.
    pub fn lazy_grad(&mut self) {
        for decl in &mut self.fields {
            decl.needs_grad = true;
        }
    }

    fn child(&mut self, parent: NodeId, kind: SNodeKind) -> NodeId {
        let parent_node = &self.graph[parent.0];
        if matches!(parent_node.kind, SNodeKind::Place(_)) {
            self.errors.push(LayoutError::ChildOfPlace);
        }
        let mut shape = parent_node.shape.clone();
        shape.extend_from_slice(kind.extents());
        let idx = self.graph.add_node(SNode { kind, shape });
        self.graph.add_edge(parent.0, idx, ());
        NodeId(idx)
    }

    /// Allocate every buffer and hand the tree over to a registry.
    pub fn finalize(mut self) -> Result<StorageRegistry, LayoutError> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }

        let mut placements = Vec::with_capacity(self.fields.len());
        for (i, decl) in self.fields.iter().enumerate() {
            let node = self.placed[i].ok_or_else(|| LayoutError::NotPlaced(decl.name.clone()))?;
            let shape = &self.graph[node].shape;
            let primary = Buffer::zeroed(decl.kind, shape, &decl.element_shape);
            let adjoint = decl
                .needs_grad
                .then(|| Buffer::zeroed(decl.kind, shape, &decl.element_shape));
            placements.push(Placement {
                field: FieldId(i as u32),
                primary,
                adjoint,
            });
        }

        tracing::debug!(
            nodes = self.graph.node_count(),
            fields = self.fields.len(),
            "storage layout finalized"
        );

        Ok(StorageRegistry::new(
            self.graph,
            self.root,
            self.fields,
            placements,
        ))
    }
}
