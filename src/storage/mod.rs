//! Hierarchical storage: field declarations, the node tree, and buffers.
//!
//! A layout is declared once through [`LayoutBuilder`]:
//! ```text
//! root ─┬─ place(x)                    x: shape ()
//!       ├─ dense(128) ─ place(y)       y: shape (128)
//!       └─ dense(128) ─ dense(128) ─ place(z, w)
//! ```
//! The shape of a placed field is the concatenation of the extents of its
//! ancestors. Finalizing the builder allocates every primary buffer and,
//! for fields that need gradients, an adjoint buffer of identical shape.
//!
//! Buffer elements live in `AtomicU64` cells holding the kind's bit
//! pattern, so kernel bodies running on different workers can write
//! disjoint elements through a shared reference.

pub mod layout;
pub mod registry;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::runtime::KernelFault;
use crate::types::ScalarKind;

pub use layout::{LayoutBuilder, LayoutError, NodeId, SNode, SNodeKind};
pub use registry::{ClearStats, Placement, StorageRegistry};

/// Handle to a declared field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub(crate) u32);

impl FieldId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// A field declaration: name, element kind, per-element shape, gradient need.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub kind: ScalarKind,
    /// Shape of one element (`[]` for scalars, `[n]` for vectors, `[n, m]` for matrices).
    pub element_shape: Vec<usize>,
    pub needs_grad: bool,
}

impl FieldDecl {
    pub fn scalar(name: &str, kind: ScalarKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            element_shape: Vec::new(),
            needs_grad: false,
        }
    }

    pub fn vector(name: &str, kind: ScalarKind, n: usize) -> Self {
        Self::scalar(name, kind).with_element_shape(&[n])
    }

    pub fn matrix(name: &str, kind: ScalarKind, n: usize, m: usize) -> Self {
        Self::scalar(name, kind).with_element_shape(&[n, m])
    }

    pub fn with_element_shape(mut self, shape: &[usize]) -> Self {
        self.element_shape = shape.to_vec();
        self
    }

    pub fn with_grad(mut self) -> Self {
        self.needs_grad = true;
        self
    }
}

// ─── Buffers ───────────────────────────────────────────────────────

/// A dense, kind-tagged element buffer.
#[derive(Debug)]
pub struct Buffer {
    kind: ScalarKind,
    shape: Vec<usize>,
    element_shape: Vec<usize>,
    cells: Box<[AtomicU64]>,
}

impl Buffer {
    pub(crate) fn zeroed(kind: ScalarKind, shape: &[usize], element_shape: &[usize]) -> Self {
        let count = shape.iter().product::<usize>() * element_shape.iter().product::<usize>();
        let zero = kind.zero_bits();
        let cells = (0..count).map(|_| AtomicU64::new(zero)).collect();
        Self {
            kind,
            shape: shape.to_vec(),
            element_shape: element_shape.to_vec(),
            cells,
        }
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn element_shape(&self) -> &[usize] {
        &self.element_shape
    }

    /// Total number of scalar cells, counting every component of every element.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Row-major offset of `element` inside the element at `index`.
    fn offset(&self, index: &[i64], element: &[i64]) -> Result<usize, KernelFault> {
        if index.len() != self.shape.len() || element.len() != self.element_shape.len() {
            return Err(KernelFault::new(format!(
                "index rank {}+{} does not match buffer rank {}+{}",
                index.len(),
                element.len(),
                self.shape.len(),
                self.element_shape.len()
            )));
        }
        let mut offset = 0usize;
        let dims = self.shape.iter().chain(self.element_shape.iter());
        for (&i, &extent) in index.iter().chain(element.iter()).zip(dims) {
            if i < 0 || i as u64 >= extent as u64 {
                return Err(KernelFault::new(format!(
                    "index {:?}{:?} out of bounds for shape {:?}{:?}",
                    index, element, self.shape, self.element_shape
                )));
            }
            offset = offset * extent + i as usize;
        }
        Ok(offset)
    }

    fn load(&self, index: &[i64], element: &[i64]) -> Result<u64, KernelFault> {
        let offset = self.offset(index, element)?;
        Ok(self.cells[offset].load(Ordering::Relaxed))
    }

    fn store(&self, index: &[i64], element: &[i64], bits: u64) -> Result<(), KernelFault> {
        let offset = self.offset(index, element)?;
        self.cells[offset].store(bits, Ordering::Relaxed);
        Ok(())
    }

    pub fn get_i64(&self, index: &[i64]) -> Result<i64, KernelFault> {
        Ok(self.kind.decode_int(self.load(index, &[])?))
    }

    pub fn set_i64(&self, index: &[i64], value: i64) -> Result<(), KernelFault> {
        self.store(index, &[], self.kind.encode_int(value))
    }

    pub fn get_f64(&self, index: &[i64]) -> Result<f64, KernelFault> {
        Ok(self.kind.decode_float(self.load(index, &[])?))
    }

    pub fn set_f64(&self, index: &[i64], value: f64) -> Result<(), KernelFault> {
        self.store(index, &[], self.kind.encode_float(value))
    }

    /// Read one component of a vector/matrix element: `buffer[index][element]`.
    pub fn get_component_f64(&self, index: &[i64], element: &[i64]) -> Result<f64, KernelFault> {
        Ok(self.kind.decode_float(self.load(index, element)?))
    }

    pub fn set_component_f64(
        &self,
        index: &[i64],
        element: &[i64],
        value: f64,
    ) -> Result<(), KernelFault> {
        self.store(index, element, self.kind.encode_float(value))
    }

    pub fn get_component_i64(&self, index: &[i64], element: &[i64]) -> Result<i64, KernelFault> {
        Ok(self.kind.decode_int(self.load(index, element)?))
    }

    pub fn set_component_i64(
        &self,
        index: &[i64],
        element: &[i64],
        value: i64,
    ) -> Result<(), KernelFault> {
        self.store(index, element, self.kind.encode_int(value))
    }

    /// Overwrite every cell with the additive identity. Returns the cell count.
    pub(crate) fn fill_zero(&self) -> usize {
        let zero = self.kind.zero_bits();
        for cell in self.cells.iter() {
            cell.store(zero, Ordering::Relaxed);
        }
        self.cells.len()
    }

    /// Snapshot of every cell as `f64`, in row-major order.
    pub fn to_vec_f64(&self) -> Vec<f64> {
        self.cells
            .iter()
            .map(|c| self.kind.decode_float(c.load(Ordering::Relaxed)))
            .collect()
    }

    pub fn to_vec_i64(&self) -> Vec<i64> {
        self.cells
            .iter()
            .map(|c| self.kind.decode_int(c.load(Ordering::Relaxed)))
            .collect()
    }
}
