//! # File System Module
//!
//! This is a container for file system modules.  Drivers exist for DOS 3.3,
//! ProDOS, and the Pascal file system.  Each driver owns its `img::Img` and
//! retains its own view of the directory data; changes become permanent only
//! when the image buffer is saved to the hosting file system.
//!
//! File systems are represented by the `DiskFS` trait.  Operations that a
//! format cannot perform return `UnsupportedOnFormat` rather than panicking,
//! so the shell can treat every mounted volume uniformly.

pub mod dos33;
pub mod prodos;
pub mod pascal;

use crate::img;
use crate::{STDRESULT,DYNERR};

/// Enumerates file system errors.  The `Display` trait will print the long message.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("operation not supported on this format")]
    UnsupportedOnFormat,
    #[error("file not found")]
    NotFound,
    #[error("not a directory")]
    NotDir,
    #[error("name too long")]
    NameTooLong,
    #[error("no space left on volume")]
    NoSpace,
    #[error("directory not empty")]
    DirectoryNotEmpty,
    #[error("file is locked")]
    PermissionLocked,
    #[error("i/o error")]
    IOError,
    #[error("could not parse name or path")]
    ParseError,
    #[error("bad argument")]
    BadArgument
}

#[derive(thiserror::Error,Debug)]
pub enum DiskStructError {
    #[error("buffer ended before the structure was complete")]
    OutOfData
}

/// Flattens an on-disk structure to bytes and back.  Implementations are
/// hand written; field order in the struct mirrors the disk layout.
pub trait DiskStruct {
    fn new() -> Self where Self: Sized;
    fn from_bytes(dat: &[u8]) -> Result<Self,DiskStructError> where Self: Sized;
    fn update_from_bytes(&mut self,dat: &[u8]) -> Result<(),DiskStructError>;
    fn to_bytes(&self) -> Vec<u8>;
    fn len(&self) -> usize;
}

/// Unified catalog entry produced by the drivers and consumed by the
/// extract, inject, and copy services.  `ext` is the short type tag that
/// drives re-injection; `kind` is the human readable type.  `data` holds
/// the payload with any on-disk header (binary address/length words,
/// tokenized program length) already stripped.
#[derive(Clone)]
pub struct DiskFile {
    pub name: String,
    /// directory prefix on the volume, empty for flat file systems
    pub path: String,
    pub ext: String,
    pub kind: String,
    /// payload size in bytes
    pub size: usize,
    /// native allocation units used (sectors or blocks)
    pub blocks: usize,
    pub load_addr: u16,
    pub locked: bool,
    pub is_dir: bool,
    pub data: Vec<u8>,
    /// mount slot this record came from, filled in by the shell
    pub slot: usize
}

impl DiskFile {
    pub fn new(name: &str,path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            ext: String::new(),
            kind: String::new(),
            size: 0,
            blocks: 0,
            load_addr: 0,
            locked: false,
            is_dir: false,
            data: Vec::new(),
            slot: 0
        }
    }
    /// Name with the directory prefix prepended, if there is one.
    pub fn qualified_name(&self) -> String {
        match self.path.len() {
            0 => self.name.clone(),
            _ => [self.path.clone(),"/".to_string(),self.name.clone()].concat()
        }
    }
}

/// The common capability set of the file system drivers.  A driver that
/// cannot perform an operation returns `UnsupportedOnFormat`.
pub trait DiskFS {
    /// All files on the volume, subdirectories walked recursively.
    /// Entries carry metadata only; use `read_file` for the payload.
    fn catalog(&mut self) -> Result<Vec<DiskFile>,DYNERR>;
    /// Read one file; `path` is the directory prefix (empty for flat systems).
    fn read_file(&mut self,path: &str,name: &str) -> Result<DiskFile,DYNERR>;
    /// Write one file, replacing any existing unlocked file of the same name.
    /// `ext` selects the native file type; returns allocation units used.
    fn write_file(&mut self,path: &str,name: &str,ext: &str,dat: &[u8],load_addr: u16) -> Result<usize,DYNERR>;
    fn delete(&mut self,path: &str,name: &str) -> STDRESULT;
    fn set_locked(&mut self,path: &str,name: &str,locked: bool) -> STDRESULT;
    fn rename(&mut self,path: &str,old_name: &str,new_name: &str) -> STDRESULT;
    fn create_directory(&mut self,path: &str,name: &str) -> STDRESULT;
    /// Does this path name a directory on the volume?  The empty path is
    /// the root and exists on every format.
    fn dir_exists(&mut self,path: &str) -> bool;
    /// (used, free) in the native allocation unit.
    fn usage(&mut self) -> Result<(usize,usize),DYNERR>;
    /// The underlying image, e.g. for saving or inspection.
    fn get_img(&mut self) -> &mut img::Img;
}
