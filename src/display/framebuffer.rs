// Frame Buffer - Holds the last presented frame for the window
//
// The scheduler presents core frames into the buffer; the window copies the
// buffer into its pixel surface when it redraws. Pixels are RGBA8.

use crate::core::VideoFrame;
use crate::scheduler::Surface;
use std::cell::RefCell;
use std::rc::Rc;

/// Frame buffer shared between the scheduler and the window
pub type SharedFrameBuffer = Rc<RefCell<FrameBuffer>>;

/// RGBA frame buffer
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
    dirty: bool,
}

impl FrameBuffer {
    /// Create a black frame buffer of the given size
    pub fn new(width: usize, height: usize) -> Self {
        let mut buffer = Self {
            width,
            height,
            pixels: vec![0; width * height * 4],
            dirty: true,
        };
        buffer.clear();
        buffer
    }

    /// Wrap the buffer for sharing with the scheduler
    pub fn into_shared(self) -> SharedFrameBuffer {
        Rc::new(RefCell::new(self))
    }

    /// Width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw RGBA bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.pixels
    }

    /// Copy a core frame into the buffer
    ///
    /// Frames whose pixel data does not match their declared size are
    /// dropped. A frame of a different size resizes the buffer.
    pub fn copy_frame(&mut self, frame: &VideoFrame<'_>) {
        if frame.pixels.len() != frame.expected_len() {
            tracing::warn!(
                width = frame.width,
                height = frame.height,
                len = frame.pixels.len(),
                "Dropping malformed video frame"
            );
            return;
        }

        if frame.width != self.width || frame.height != self.height {
            tracing::debug!(width = frame.width, height = frame.height, "Frame size changed");
            self.width = frame.width;
            self.height = frame.height;
            self.pixels.resize(frame.pixels.len(), 0);
        }

        self.pixels.copy_from_slice(frame.pixels);
        self.dirty = true;
    }

    /// Fill with opaque black
    pub fn clear(&mut self) {
        for pixel in self.pixels.chunks_exact_mut(4) {
            pixel.copy_from_slice(&[0x00, 0x00, 0x00, 0xFF]);
        }
        self.dirty = true;
    }

    /// Copy the buffer into an RGBA output surface
    ///
    /// Copies as many bytes as both buffers hold.
    pub fn to_rgba(&self, output: &mut [u8]) {
        let len = output.len().min(self.pixels.len());
        output[..len].copy_from_slice(&self.pixels[..len]);
    }

    /// Check and clear the changed-since-last-draw flag
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

impl Surface for FrameBuffer {
    fn present(&mut self, frame: VideoFrame<'_>) {
        self.copy_frame(&frame);
    }

    fn clear(&mut self) {
        FrameBuffer::clear(self);
    }
}

impl Surface for SharedFrameBuffer {
    fn present(&mut self, frame: VideoFrame<'_>) {
        self.borrow_mut().copy_frame(&frame);
    }

    fn clear(&mut self) {
        self.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framebuffer_creation() {
        let fb = FrameBuffer::new(4, 2);
        assert_eq!(fb.as_slice().len(), 4 * 2 * 4);
        assert_eq!(&fb.as_slice()[..4], &[0, 0, 0, 0xFF]);
    }

    #[test]
    fn test_present_copies_frame() {
        let mut fb = FrameBuffer::new(1, 1);
        fb.take_dirty();

        let pixels = [10, 20, 30, 255];
        fb.present(VideoFrame {
            width: 1,
            height: 1,
            pixels: &pixels,
        });

        assert_eq!(fb.as_slice(), &pixels);
        assert!(fb.take_dirty());
        assert!(!fb.take_dirty());
    }

    #[test]
    fn test_present_resizes() {
        let mut fb = FrameBuffer::new(1, 1);
        let pixels = [7u8; 2 * 3 * 4];
        fb.present(VideoFrame {
            width: 2,
            height: 3,
            pixels: &pixels,
        });

        assert_eq!((fb.width(), fb.height()), (2, 3));
        assert_eq!(fb.as_slice(), &pixels[..]);
    }

    #[test]
    fn test_malformed_frame_is_dropped() {
        let mut fb = FrameBuffer::new(2, 2);
        fb.take_dirty();
        fb.present(VideoFrame {
            width: 2,
            height: 2,
            pixels: &[1, 2, 3],
        });

        assert!(!fb.take_dirty());
        assert_eq!(fb.width(), 2);
    }

    #[test]
    fn test_shared_surface_clear() {
        let shared = FrameBuffer::new(1, 1).into_shared();
        let mut surface = Rc::clone(&shared);
        surface.present(VideoFrame {
            width: 1,
            height: 1,
            pixels: &[9, 9, 9, 9],
        });
        Surface::clear(&mut surface);

        assert_eq!(shared.borrow().as_slice(), &[0, 0, 0, 0xFF]);
    }

    #[test]
    fn test_to_rgba_copies_overlap() {
        let fb = FrameBuffer::new(1, 1);
        let mut out = [1u8; 8];
        fb.to_rgba(&mut out);
        assert_eq!(out, [0, 0, 0, 0xFF, 1, 1, 1, 1]);
    }
}
