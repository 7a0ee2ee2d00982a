use crate::EncoderConfig;
use alloc::{sync::Arc, vec, vec::Vec};

/// Row strides are rounded up to a multiple of this.
pub const STRIDE_ALIGNMENT: usize = 32;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PixelFormat {
    Yuv420Planar,
    Yuv444Planar,
}

impl PixelFormat {
    pub fn plane_count(&self) -> usize {
        3
    }

    /// Logical dimensions of the given plane for a `width` by `height`
    /// picture.
    pub fn plane_dimensions(&self, plane: usize, width: u32, height: u32) -> (usize, usize) {
        let (width, height) = (width as usize, height as usize);
        match self {
            Self::Yuv420Planar if plane > 0 => ((width + 1) / 2, (height + 1) / 2),
            _ => (width, height),
        }
    }
}

#[derive(Clone)]
struct PlaneStorage {
    data: Arc<Vec<u8>>,
    stride: usize,
    width: usize,
    height: usize,
}

/// One raw picture: planar samples plus a presentation timestamp.
///
/// Plane storage is reference counted, so cloning a frame is cheap and an
/// encoder may retain a clone as a reference picture. Mutable plane access
/// copies the storage first if it is shared, so refilling a buffer for the
/// next frame never alters a clone retained elsewhere.
#[derive(Clone)]
pub struct FrameBuffer {
    format: PixelFormat,
    width: u32,
    height: u32,
    pts: i64,
    planes: Vec<PlaneStorage>,
}

impl FrameBuffer {
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        let planes = (0..format.plane_count())
            .map(|plane| {
                let (width, height) = format.plane_dimensions(plane, width, height);
                let stride = (width + STRIDE_ALIGNMENT - 1) & !(STRIDE_ALIGNMENT - 1);
                PlaneStorage {
                    data: Arc::new(vec![0; stride * height]),
                    stride,
                    width,
                    height,
                }
            })
            .collect();
        Self {
            format,
            width,
            height,
            pts: 0,
            planes,
        }
    }

    /// A zeroed frame sized for the given configuration.
    pub fn from_config(config: &EncoderConfig) -> Self {
        Self::new(config.pixel_format, config.width, config.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pts(&self) -> i64 {
        self.pts
    }

    pub fn set_pts(&mut self, pts: i64) {
        self.pts = pts;
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    pub fn plane(&self, index: usize) -> Plane<'_> {
        let plane = &self.planes[index];
        Plane {
            data: &plane.data[..],
            stride: plane.stride,
            width: plane.width,
            height: plane.height,
        }
    }

    /// Mutable access to a plane, copying its storage first if shared.
    pub fn plane_mut(&mut self, index: usize) -> PlaneMut<'_> {
        let plane = &mut self.planes[index];
        PlaneMut {
            data: &mut Arc::make_mut(&mut plane.data)[..],
            stride: plane.stride,
            width: plane.width,
            height: plane.height,
        }
    }

    /// Ensures every plane has exclusive storage without touching the
    /// samples.
    pub fn make_writable(&mut self) {
        for plane in &mut self.planes {
            Arc::make_mut(&mut plane.data);
        }
    }

    pub fn is_writable(&self) -> bool {
        self.planes.iter().all(|plane| Arc::strong_count(&plane.data) == 1)
    }
}

pub struct Plane<'data> {
    data: &'data [u8],
    stride: usize,
    width: usize,
    height: usize,
}

impl<'data> Plane<'data> {
    /// The full stride-padded sample buffer.
    pub fn data(&self) -> &[u8] {
        self.data
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// The logical samples of row `y`, excluding stride padding.
    pub fn row(&self, y: usize) -> &[u8] {
        &self.data[y * self.stride..y * self.stride + self.width]
    }
}

pub struct PlaneMut<'data> {
    data: &'data mut [u8],
    stride: usize,
    width: usize,
    height: usize,
}

impl<'data> PlaneMut<'data> {
    pub fn data(&mut self) -> &mut [u8] {
        self.data
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        &mut self.data[y * self.stride..y * self.stride + self.width]
    }
}
