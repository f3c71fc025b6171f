//! Resolution-dependent axis scaling
//!
//! Coordinate frames are declared at resolution 0. Each level of an
//! isotropic hierarchy halves every spatial axis. An anisotropic hierarchy
//! halves X and Y at every level but leaves Z untouched until the X/Y voxel
//! size has caught up with the Z voxel size (the break level); past that
//! level all three axes halve together.

use crate::types::{Axis, Extent, HierarchyMethod, VoxelSize};

/// Highest level that still yields a representable factor
const MAX_SHIFT: u32 = 62;

fn pow2(exp: u32) -> u64 {
    1u64 << exp.min(MAX_SHIFT)
}

/// Downsampling factor of `axis` at `resolution`.
///
/// Anisotropic Z factor is `2^(resolution - break_level)` above the break
/// level and 1 at or below it.
pub fn scale_factor(
    axis: Axis,
    resolution: u32,
    method: HierarchyMethod,
    break_level: u32,
) -> u64 {
    match (axis, method) {
        (Axis::T, _) => 1,
        (_, HierarchyMethod::Isotropic) => pow2(resolution),
        (Axis::X | Axis::Y, HierarchyMethod::Anisotropic) => pow2(resolution),
        (Axis::Z, HierarchyMethod::Anisotropic) => {
            if resolution > break_level {
                pow2(resolution - break_level)
            } else {
                1
            }
        }
    }
}

/// First level at which the downsampled X/Y voxel is at least as large as the Z voxel
pub fn derive_break_level(voxel_size: &VoxelSize) -> u32 {
    let xy = voxel_size.x.max(voxel_size.y);
    if xy.is_nan() || xy <= 0.0 || !voxel_size.z.is_finite() {
        return 0;
    }
    let mut level = 0;
    let mut scaled = xy;
    while scaled < voxel_size.z && level < MAX_SHIFT {
        scaled *= 2.0;
        level += 1;
    }
    level
}

/// Resolution-0 extent expressed at a coarser level: start rounds down, stop rounds up
pub fn scale_extent(extent: &Extent, factor: u64) -> Extent {
    let factor = factor.max(1);
    Extent::new(extent.start / factor, extent.stop.div_ceil(factor))
}
