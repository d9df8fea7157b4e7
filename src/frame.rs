//! Frame allocation on top of a device's free-frame list.

use log::{debug, warn};

use crate::error::MemResult;
use crate::memory::PhysicalMemory;

/// Grant `count` frames from `device`, in grant order.
///
/// Either every frame is granted or none is: on exhaustion all frames taken so far go back to
/// the free list before the error is returned.
pub fn alloc_frames(device: &mut PhysicalMemory, count: usize) -> MemResult<Vec<usize>> {
    let mut granted = Vec::with_capacity(count.min(device.free_frame_count()));
    for _ in 0..count {
        match device.get_free_frame() {
            Ok(frame) => {
                debug!("grant fpn={}", frame);
                granted.push(frame);
            }
            Err(e) => {
                warn!(
                    "out of frames after {} of {}, rolling back",
                    granted.len(),
                    count
                );
                release_frames(device, granted);
                return Err(e);
            }
        }
    }
    Ok(granted)
}

/// Return frames to `device`. The last frame released is the next one granted.
pub fn release_frames(device: &mut PhysicalMemory, frames: Vec<usize>) {
    for frame in frames.into_iter().rev() {
        device.put_free_frame(frame);
    }
}

/// Copy one frame's contents from `src` to `dst`, byte by byte through each device's access path.
pub fn copy_frame(
    src: &mut PhysicalMemory,
    src_frame: usize,
    dst: &mut PhysicalMemory,
    dst_frame: usize,
) -> MemResult<()> {
    let page_size = src.page_size();
    let src_base = src.frame_base(src_frame)?;
    let dst_base = dst.frame_base(dst_frame)?;
    for cell in 0..page_size {
        let byte = src.read(src_base + cell)?;
        dst.write(dst_base + cell, byte)?;
    }
    Ok(())
}
