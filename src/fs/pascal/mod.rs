//! # UCSD Pascal file system module
//!
//! This module is *not* for the Pascal language, but rather the Pascal
//! file system.  Only read paths are supported; files live in contiguous
//! block runs enumerated by the volume directory at block 2.

pub mod types;

use num_traits::FromPrimitive;
use log::error;

use types::*;
use super::{DiskStruct,DiskFile,Error};
use crate::img;
use crate::{STDRESULT,DYNERR};

/// The primary interface for disk operations.
pub struct Disk {
    img: img::Img
}

impl Disk {
    /// Use the given image as storage.  The driver takes ownership.
    pub fn from_img(img: img::Img) -> Result<Self,DYNERR> {
        if img.format().block_count()==0 {
            return Err(Box::new(img::Error::UnsupportedView));
        }
        Ok(Self {
            img
        })
    }
    /// Load the volume header and all directory entries, in use or not.
    fn get_directory(&self) -> Result<(VolDirHeader,Vec<DirEntry>),DYNERR> {
        let mut buf = self.img.read_block(VOL_HEADER_BLOCK)?;
        let header = VolDirHeader::from_bytes(&buf)?;
        let beg = VOL_HEADER_BLOCK as u16;
        let end = u16::from_le_bytes(header.end_block);
        if end<=beg || end as usize>self.img.format().block_count() {
            error!("bad directory span {}..{}",beg,end);
            return Err(Box::new(Error::IOError));
        }
        // entries may span two blocks, so gather the chain contiguously
        for iblock in beg+1..end {
            buf.append(&mut self.img.read_block(iblock as usize)?);
        }
        let num_files = u16::from_le_bytes(header.num_files) as usize;
        let max_entries = buf.len()/ENTRY_SIZE - 1;
        let mut entries = Vec::new();
        let mut offset = ENTRY_SIZE;
        for _i in 0..usize::min(num_files,max_entries) {
            entries.push(DirEntry::from_bytes(&buf[offset..offset+ENTRY_SIZE])?);
            offset += ENTRY_SIZE;
        }
        Ok((header,entries))
    }
    fn entry_to_file(&self,entry: &DirEntry) -> DiskFile {
        let mut ans = DiskFile::new(&entry.name_string(),"");
        let beg = u16::from_le_bytes(entry.begin_block) as usize;
        let end = u16::from_le_bytes(entry.end_block) as usize;
        let typ = (u16::from_le_bytes(entry.file_type) & 0x0f) as u8;
        ans.kind = match TYPE_MAP_DISP.iter().find(|(code,_)| *code==typ) {
            Some((_,s)) => s.to_string(),
            None => format!("type {}",typ)
        };
        ans.ext = match FileType::from_u8(typ) {
            Some(FileType::Text) => "TXT".to_string(),
            _ => "BIN".to_string()
        };
        ans.blocks = end-beg;
        ans.size = match end-beg {
            0 => 0,
            span => (span-1)*BLOCK_SIZE + u16::from_le_bytes(entry.last_byte) as usize
        };
        ans
    }
    fn find_entry(&self,name: &str) -> Result<DirEntry,DYNERR> {
        let (_header,entries) = self.get_directory()?;
        let target = name.to_uppercase();
        for entry in entries {
            if entry.name_string().to_uppercase()==target {
                return Ok(entry);
            }
        }
        Err(Box::new(Error::NotFound))
    }
    pub fn volume_name(&self) -> Result<String,DYNERR> {
        let (header,_entries) = self.get_directory()?;
        let len = usize::min(header.name_len as usize,7);
        Ok(String::from_utf8_lossy(&header.name[0..len]).to_string())
    }
}

impl super::DiskFS for Disk {
    fn catalog(&mut self) -> Result<Vec<DiskFile>,DYNERR> {
        let (_header,entries) = self.get_directory()?;
        Ok(entries.iter().map(|e| self.entry_to_file(e)).collect())
    }
    fn read_file(&mut self,path: &str,name: &str) -> Result<DiskFile,DYNERR> {
        if path.len()>0 {
            return Err(Box::new(Error::NotDir));
        }
        let entry = self.find_entry(name)?;
        let mut ans = self.entry_to_file(&entry);
        let beg = u16::from_le_bytes(entry.begin_block) as usize;
        let end = u16::from_le_bytes(entry.end_block) as usize;
        let mut dat: Vec<u8> = Vec::new();
        for iblock in beg..end {
            dat.append(&mut self.img.read_block(iblock)?);
        }
        dat.truncate(ans.size);
        ans.data = dat;
        Ok(ans)
    }
    fn write_file(&mut self,_path: &str,_name: &str,_ext: &str,_dat: &[u8],_load_addr: u16) -> Result<usize,DYNERR> {
        Err(Box::new(Error::UnsupportedOnFormat))
    }
    fn delete(&mut self,_path: &str,_name: &str) -> STDRESULT {
        Err(Box::new(Error::UnsupportedOnFormat))
    }
    fn set_locked(&mut self,_path: &str,_name: &str,_locked: bool) -> STDRESULT {
        Err(Box::new(Error::UnsupportedOnFormat))
    }
    fn rename(&mut self,_path: &str,_old_name: &str,_new_name: &str) -> STDRESULT {
        Err(Box::new(Error::UnsupportedOnFormat))
    }
    fn create_directory(&mut self,_path: &str,_name: &str) -> STDRESULT {
        Err(Box::new(Error::UnsupportedOnFormat))
    }
    fn dir_exists(&mut self,path: &str) -> bool {
        path.len()==0
    }
    fn usage(&mut self) -> Result<(usize,usize),DYNERR> {
        let (header,entries) = self.get_directory()?;
        let total = self.img.format().block_count();
        let mut used = u16::from_le_bytes(header.end_block) as usize;
        for entry in &entries {
            let beg = u16::from_le_bytes(entry.begin_block) as usize;
            let end = u16::from_le_bytes(entry.end_block) as usize;
            if end>beg {
                used += end-beg;
            }
        }
        Ok((used,total-used))
    }
    fn get_img(&mut self) -> &mut img::Img {
        &mut self.img
    }
}
