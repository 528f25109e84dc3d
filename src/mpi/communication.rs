use log::debug;
use mpi::collective::SystemOperation;
use mpi::topology::{Process, SimpleCommunicator};
use mpi::traits::{Communicator, CommunicatorCollectives, Root};

use crate::shape::sparse::SparseShape;
use crate::tensor::Tensor;
use crate::tiledrange::TiledRange;
use crate::types::ShapeScalar;

/// Distributes a byte payload from `root` to every rank. Receivers pass any
/// buffer; the payload length travels first so they can size it before the
/// payload itself arrives. On the root both broadcasts are no-ops on the
/// buffer.
fn broadcast_bytes(bytes: &mut Vec<u8>, root: &Process) {
    let mut len = bytes.len();
    root.broadcast_into(&mut len);
    bytes.resize(len, 0);
    root.broadcast_into(bytes);
}

/// Builds a shape from tile norms contributed by every rank.
///
/// Each rank passes its partial raw norm estimates (for instance from
/// locally owned integrals); the norms are summed element-wise across the
/// communicator with an all-reduce and the summed field is normalized once,
/// like the local constructor would. All ranks receive the same shape.
///
/// This call suspends until the all-reduce completes and must be entered by
/// every rank of `world`.
///
/// # Panics
/// Panics like [`SparseShape::new`] on empty norms, a range mismatch with
/// `trange`, or a negative summed norm.
pub fn collective_shape<T>(
    world: &SimpleCommunicator,
    tile_norms: Tensor<T>,
    trange: &TiledRange,
) -> SparseShape<T>
where
    T: ShapeScalar + mpi::traits::Equivalence,
{
    assert!(!tile_norms.is_empty(), "tile norms must not be empty");
    let mut summed = vec![T::zero(); tile_norms.data().len()];
    world.all_reduce_into(tile_norms.data(), &mut summed[..], SystemOperation::sum());
    debug!(
        "summed {} tile norms across {} ranks",
        summed.len(),
        world.size()
    );
    SparseShape::new(Tensor::from_data(tile_norms.range().clone(), summed), trange)
}

/// Broadcasts a shape from `root` to all processes in the communicator. For
/// the receivers, `shape` can just be a default-constructed shape; their
/// zero tile counts are recomputed against the local threshold on arrival.
pub fn broadcast_shape<T>(shape: &mut SparseShape<T>, root: &Process)
where
    T: ShapeScalar,
{
    let mut bytes = if root.is_self() {
        bincode::serialize(shape).unwrap()
    } else {
        Vec::new()
    };

    broadcast_bytes(&mut bytes, root);

    if !root.is_self() {
        *shape = bincode::deserialize(&bytes).unwrap();
    }

    debug!("received broadcasted shape ({} bytes)", bytes.len());
}
