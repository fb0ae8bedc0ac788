//! Dirty bits gating the six cached transform quantities of a node

use bitflags::bitflags;

bitflags! {
    /// Which cached transform values are stale.
    ///
    /// A set bit means the cached value must be recomputed on next read.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DirtyFlags: u8 {
        /// Local TRS matrix
        const LOCAL_MATRIX = 1;
        /// World model matrix
        const WORLD_MATRIX = 1 << 1;
        /// Inverse of the world model matrix
        const WORLD_INVERSE = 1 << 2;
        /// Decomposed world position
        const WORLD_POSITION = 1 << 3;
        /// Decomposed world rotation
        const WORLD_ROTATION = 1 << 4;
        /// Decomposed world scale
        const WORLD_SCALE = 1 << 5;

        /// Everything derived from the parent chain
        const WORLD = Self::WORLD_MATRIX.bits()
            | Self::WORLD_INVERSE.bits()
            | Self::WORLD_POSITION.bits()
            | Self::WORLD_ROTATION.bits()
            | Self::WORLD_SCALE.bits();

        /// Everything, after a local TRS change
        const LOCAL = Self::LOCAL_MATRIX.bits() | Self::WORLD.bits();
    }
}
