use bytemuck::{Pod, Zeroable};

/// Host-side mirror of the fragment stage's `HexfieldParams` block (std140).
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct HexfieldUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub _padding: f32,
}

unsafe impl Zeroable for HexfieldUniforms {}
unsafe impl Pod for HexfieldUniforms {}

impl HexfieldUniforms {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            resolution: [width.max(1) as f32, height.max(1) as f32],
            time: 0.0,
            _padding: 0.0,
        }
    }
}

/// Rounds a reflected block size up to the std140 alignment and never below
/// the host struct.
pub(crate) fn uniform_buffer_size(block_size: u32) -> u64 {
    let aligned = (u64::from(block_size) + 15) & !15;
    aligned.max(HexfieldUniforms::SIZE)
}
