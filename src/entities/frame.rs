//! Rendered frame buffers and render failures.
//!
//! **Why**: The prefetch worker discards what the renderer returns (the cache
//! side effect is the point), but the reference cache still needs a buffer
//! with a known memory footprint for capacity accounting.
//!
//! **Used by**: Renderer implementations, GlobalFrameCache (memory tracking)

use std::sync::Arc;

/// Frame render status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Placeholder, // Nothing rendered yet, solid fill
    Rendered,    // Composited pixel data
    Error,       // Render failed, buffer is a placeholder
}

/// Composited RGBA8 frame.
///
/// Pixel data lives behind an `Arc`, so clones handed to the cache are cheap.
#[derive(Debug, Clone)]
pub struct Frame {
    buffer: Arc<Vec<u8>>,
    width: usize,
    height: usize,
    status: FrameStatus,
}

impl Frame {
    /// Create a placeholder frame (dark green, like an unloaded slot)
    pub fn placeholder(width: usize, height: usize) -> Self {
        let mut buffer = vec![0u8; width * height * 4];
        for px in buffer.chunks_mut(4) {
            px.copy_from_slice(&[0, 100, 0, 255]);
        }
        Self {
            buffer: Arc::new(buffer),
            width,
            height,
            status: FrameStatus::Placeholder,
        }
    }

    /// Wrap composited RGBA8 pixels
    pub fn from_u8_buffer(buffer: Vec<u8>, width: usize, height: usize) -> Self {
        debug_assert_eq!(buffer.len(), width * height * 4);
        Self {
            buffer: Arc::new(buffer),
            width,
            height,
            status: FrameStatus::Rendered,
        }
    }

    /// Placeholder tagged as failed (missing media and the like)
    pub fn error(width: usize, height: usize) -> Self {
        Self {
            status: FrameStatus::Error,
            ..Self::placeholder(width, height)
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn status(&self) -> FrameStatus {
        self.status
    }

    pub fn pixels(&self) -> &[u8] {
        &self.buffer
    }

    /// Memory footprint in bytes
    pub fn mem(&self) -> usize {
        self.buffer.len()
    }
}

/// Render failures.
///
/// None of these are fatal to prefetching: the worker logs them and keeps
/// advancing its window.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// No element covers the requested frame
    EmptyScene(f32),
    /// Source media for an element could not be read
    MissingMedia(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::EmptyScene(frame) => write!(f, "Nothing to render at frame {}", frame),
            RenderError::MissingMedia(name) => write!(f, "Missing media for element: {}", name),
        }
    }
}

impl std::error::Error for RenderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_mem_counts_rgba_bytes() {
        let frame = Frame::placeholder(8, 4);
        assert_eq!(frame.mem(), 8 * 4 * 4);
        assert_eq!(frame.status(), FrameStatus::Placeholder);
        assert_eq!(&frame.pixels()[..4], &[0, 100, 0, 255]);
    }

    #[test]
    fn test_error_frame_keeps_dimensions() {
        let frame = Frame::error(3, 2);
        assert_eq!(frame.status(), FrameStatus::Error);
        assert_eq!((frame.width(), frame.height()), (3, 2));
    }
}
