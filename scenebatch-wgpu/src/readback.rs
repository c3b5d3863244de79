//! Synchronous texture readback.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadbackError {
    #[error("failed to poll device: {0}")]
    Poll(String),
    #[error("map callback was dropped")]
    Cancelled,
    #[error("failed to map staging buffer: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
}

/// Bytes per row padded to `COPY_BYTES_PER_ROW_ALIGNMENT`.
pub fn padded_bytes_per_row(width: u32, bytes_per_pixel: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * bytes_per_pixel).div_ceil(align) * align
}

/// Copy mip 0 of `texture` into memory, rows top to bottom without padding.
pub fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
) -> Result<Vec<u8>, ReadbackError> {
    let padded_row = padded_bytes_per_row(width, bytes_per_pixel);
    let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Staging Buffer"),
        size: (padded_row * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Copy Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging_buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
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

    let slice = staging_buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| ReadbackError::Poll(e.to_string()))?;
    rx.recv().map_err(|_| ReadbackError::Cancelled)??;

    let mapped = slice.get_mapped_range();
    let row_bytes = (width * bytes_per_pixel) as usize;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in mapped.chunks_exact(padded_row as usize).take(height as usize) {
        pixels.extend_from_slice(&row[..row_bytes]);
    }
    drop(mapped);
    staging_buffer.unmap();

    Ok(pixels)
}
