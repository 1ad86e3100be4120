use calib_assist_core::GrayImage;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum FrameStoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("image buffer does not match {width}x{height}")]
    BufferSize { width: usize, height: usize },
}

/// Writes grayscale frames as sequentially numbered PNG files.
#[derive(Clone, Debug)]
pub struct FrameStore {
    dir: PathBuf,
    prefix: String,
    next_index: usize,
}

impl FrameStore {
    /// Create the directory (and parents) if needed.
    pub fn create(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Result<Self, FrameStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            prefix: prefix.into(),
            next_index: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Index the next successful save will use.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}{:04}.png", self.prefix, index))
    }

    /// Save under the next index. The index only advances on success.
    pub fn save_next(&mut self, img: &GrayImage) -> Result<PathBuf, FrameStoreError> {
        let path = self.path_for(self.next_index);
        write_png(img, &path)?;
        self.next_index += 1;
        debug!("saved {}", path.display());
        Ok(path)
    }
}

/// Write a grayscale image as PNG.
pub fn write_png(img: &GrayImage, path: &Path) -> Result<(), FrameStoreError> {
    let buf = image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
        .ok_or(FrameStoreError::BufferSize {
            width: img.width,
            height: img.height,
        })?;
    buf.save(path)?;
    Ok(())
}

/// Read a PNG (or any format `image` understands) as 8-bit grayscale.
pub fn read_gray(path: &Path) -> Result<GrayImage, FrameStoreError> {
    let img = image::open(path)?.into_luma8();
    Ok(GrayImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.into_raw(),
    })
}
