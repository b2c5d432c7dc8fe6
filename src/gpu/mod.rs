//! The graphics seam: the host-device trait, quad vertex packing, and the
//! bounded batch renderer that turns layout items into draw submissions.

mod batch;
mod device;
mod quad;
pub mod wgpu_backend;

pub use batch::{DrawFlags, TextBatch, MAX_BATCH_QUADS};
pub use device::{BufferId, Device, Filter, StateBlockId, StateBlockKind, TextureId};
pub use quad::{QuadWriter, QUAD_STRIDE, VERTEX_STRIDE};
