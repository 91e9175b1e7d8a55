//! # `dskbench` main library
//!
//! This library manipulates raw disk images for vintage Apple II systems,
//! with an interactive shell layered on top.
//!
//! ## Architecture
//!
//! Operations are built around two layers:
//! * `img::Img` owns the raw bytes of one disk image and knows its format,
//!   sector order, and geometry.  It exposes track/sector and block views.
//! * `fs::DiskFS` imposes a file system on the image.  Drivers exist for
//!   DOS 3.3, ProDOS, and the Pascal file system (read only).
//!
//! When a `DiskFS` object is created it takes ownership of the `Img`.
//! Changes live in the owned buffer until the shell's save step writes them
//! back to the hosting file system, taking a backup first.
//!
//! ## Shell
//!
//! The `shell` module holds the mount manager (eight slots, one target),
//! the command registry and dispatcher, glob matching over catalogs, and
//! the extract/inject services.  `lang` holds the BASIC tokenizers used
//! when text sources are inserted onto a disk.

pub mod img;
pub mod fs;
pub mod lang;
pub mod shell;

use log::info;

pub type DYNERR = Box<dyn std::error::Error>;
pub type STDRESULT = Result<(),Box<dyn std::error::Error>>;

/// Given a bytestream return a DiskFS, or Err if the bytestream cannot be
/// classified.  Optional `maybe_ext` is the file extension hint, which
/// influences which sector order is probed first but never forces a format.
pub fn create_fs_from_bytes(dsk: &[u8],maybe_ext: Option<&str>) -> Result<Box<dyn fs::DiskFS>,DYNERR> {
    let (format,order) = img::detect(dsk,maybe_ext)?;
    info!("identified {} image in {}",format,order);
    let img = img::Img::new(format,order,dsk.to_vec());
    let disk: Box<dyn fs::DiskFS> = match format {
        img::DiskFormat::Dos13 | img::DiskFormat::Dos16 => Box::new(fs::dos33::Disk::from_img(img)?),
        img::DiskFormat::Pascal => Box::new(fs::pascal::Disk::from_img(img)?),
        img::DiskFormat::Nib => return Err(Box::new(img::Error::NibbleDecode)),
        _ => Box::new(fs::prodos::Disk::from_img(img)?)
    };
    Ok(disk)
}

/// Calls `create_fs_from_bytes` getting the bytes from a file.
/// The extension of the file name is used as the probe hint.
pub fn create_fs_from_file(img_path: &str) -> Result<Box<dyn fs::DiskFS>,DYNERR> {
    let dsk = std::fs::read(img_path)?;
    let maybe_ext = img_path.rsplit('.').next();
    create_fs_from_bytes(&dsk,maybe_ext)
}
