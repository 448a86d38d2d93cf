use std::sync::mpsc;

use crate::error::BackendError;

/// Row pitch of a copy, padded to wgpu's alignment.
#[inline]
pub(super) fn padded_bytes_per_row(width: u32, bytes_per_texel: u32) -> u32 {
    let unpadded = width * bytes_per_texel;
    unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}

/// Copies a region of `texture` to the host, tightly packed row by row.
///
/// Blocks until the GPU has finished every submission before the copy.
pub(super) fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    origin: [u32; 2],
    size: [u32; 2],
    bytes_per_texel: u32,
) -> Result<Vec<u8>, BackendError> {
    let [width, height] = size;
    if width == 0 || height == 0 {
        return Ok(Vec::new());
    }
    let row = width * bytes_per_texel;
    let padded = padded_bytes_per_row(width, bytes_per_texel);

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("ember readback"),
        size: padded as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("ember readback"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: origin[0],
                y: origin[1],
                z: 0,
            },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        // receiver outlives the poll below
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| BackendError::Readback(e.to_string()))?;
    rx.recv()
        .map_err(|e| BackendError::Readback(e.to_string()))?
        .map_err(|e| BackendError::Readback(e.to_string()))?;

    let mut out = Vec::with_capacity(row as usize * height as usize);
    {
        let mapped = slice.get_mapped_range();
        for chunk in mapped.chunks_exact(padded as usize) {
            out.extend_from_slice(&chunk[..row as usize]);
        }
    }
    buffer.unmap();
    Ok(out)
}
