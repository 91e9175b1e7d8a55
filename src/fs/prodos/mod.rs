//! ## ProDOS file system module
//!
//! This manipulates disk images containing one ProDOS volume.  The volume
//! directory key is block 2, the bitmap lives where the volume header
//! points (one bit per block, bit set meaning free, MSB first), and files
//! are stored as seedlings, saplings, or trees depending on length.
//!
//! Writes gather every block they will need before touching the bitmap,
//! so a failed allocation leaves the volume unchanged.

pub mod types;
mod directory;

use std::str::FromStr;
use num_traits::FromPrimitive;
use log::error;

use types::*;
use directory::*;
use super::{DiskStruct,DiskFile,Error};
use crate::img;
use crate::{STDRESULT,DYNERR};

/// Number of 512 byte data blocks an index block can reference.
const INDEX_SPAN: usize = 256;
/// Largest sapling file, one full index block of data.
const SAPLING_MAX: usize = INDEX_SPAN*BLOCK_SIZE;

/// put a u16 into an index block in the prescribed fashion, low byte
/// plane first, high byte plane 256 bytes later
fn pack_index_ptr(buf: &mut [u8],ptr: u16,idx: usize) {
    let bytes = u16::to_le_bytes(ptr);
    buf[idx] = bytes[0];
    buf[idx+256] = bytes[1];
}

fn unpack_index_ptr(buf: &[u8],idx: usize) -> u16 {
    u16::from_le_bytes([buf[idx],buf[idx+256]])
}

/// The primary interface for disk operations.
pub struct Disk {
    img: img::Img,
    total_blocks: usize
}

impl Disk {
    /// Use the given image as storage for a new DiskFS.
    /// The driver takes ownership of the image.
    pub fn from_img(img: img::Img) -> Result<Self,DYNERR> {
        let total_blocks = img.format().block_count();
        if total_blocks==0 {
            return Err(Box::new(img::Error::UnsupportedView));
        }
        Ok(Self {
            img,
            total_blocks
        })
    }
    fn get_vol_header(&self) -> Result<VolDirHeader,DYNERR> {
        let buf = self.img.read_block(VOL_KEY_BLOCK as usize)?;
        let key: KeyBlock<VolDirHeader> = KeyBlock::from_bytes(&buf)?;
        Ok(key.header)
    }
    fn bitmap_blocks(&self) -> Result<Vec<usize>,DYNERR> {
        let first = u16::from_le_bytes(self.get_vol_header()?.bitmap_ptr) as usize;
        let count = 1 + (self.total_blocks-1)/4096;
        Ok((first..first+count).collect())
    }
    fn is_block_free(&self,iblock: usize) -> Result<bool,DYNERR> {
        let bitmap = self.bitmap_blocks()?;
        let buf = self.img.read_block(bitmap[iblock/4096])?;
        let byte = (iblock%4096)/8;
        let bit = 7 - iblock%8;
        Ok(buf[byte] & (1 << bit) > 0)
    }
    fn set_block_free(&mut self,iblock: usize,free: bool) -> STDRESULT {
        let bitmap = self.bitmap_blocks()?;
        let mut buf = self.img.read_block(bitmap[iblock/4096])?;
        let byte = (iblock%4096)/8;
        let bit = 7 - iblock%8;
        if free {
            buf[byte] |= 1 << bit;
        } else {
            buf[byte] &= (1 << bit) ^ u8::MAX;
        }
        self.img.write_block(bitmap[iblock/4096],&buf)
    }
    fn num_free_blocks(&self) -> Result<usize,DYNERR> {
        let mut free = 0;
        for i in 0..self.total_blocks {
            if self.is_block_free(i)? {
                free += 1;
            }
        }
        Ok(free)
    }
    /// Gather `count` free blocks in linear scan order and mark them used.
    /// If the volume cannot supply them all, nothing is marked.
    fn allocate(&mut self,count: usize) -> Result<Vec<u16>,DYNERR> {
        let mut ans: Vec<u16> = Vec::new();
        for iblock in 0..self.total_blocks {
            if ans.len()==count {
                break;
            }
            if self.is_block_free(iblock)? {
                ans.push(iblock as u16);
            }
        }
        if ans.len()<count {
            return Err(Box::new(Error::NoSpace));
        }
        for iblock in &ans {
            self.set_block_free(*iblock as usize,false)?;
        }
        Ok(ans)
    }
    /// Return the correct trait object assuming this block is a directory block.
    fn get_directory(&self,iblock: usize) -> Result<Box<dyn Directory>,DYNERR> {
        let buf = self.img.read_block(iblock)?;
        let is_key = buf[0]==0 && buf[1]==0;
        match (iblock==VOL_KEY_BLOCK as usize,is_key) {
            (true,_) => Ok(Box::new(KeyBlock::<VolDirHeader>::from_bytes(&buf)?)),
            (false,true) => Ok(Box::new(KeyBlock::<SubDirHeader>::from_bytes(&buf)?)),
            (false,false) => Ok(Box::new(EntryBlock::from_bytes(&buf)?))
        }
    }
    fn read_entry(&self,loc: &EntryLocation) -> Result<Entry,DYNERR> {
        let dir = self.get_directory(loc.block as usize)?;
        Ok(dir.get_entry(loc))
    }
    fn write_entry(&mut self,loc: &EntryLocation,entry: &Entry) -> STDRESULT {
        let mut dir = self.get_directory(loc.block as usize)?;
        dir.set_entry(loc,*entry);
        self.img.write_block(loc.block as usize,&dir.to_bytes())
    }
    /// Find the key block of the chain containing this directory block.
    fn get_key_block(&self,ptr: u16) -> Result<u16,DYNERR> {
        let mut curr = ptr;
        for _try in 0..MAX_DIRECTORY_REPS {
            let dir = self.get_directory(curr as usize)?;
            if dir.prev()==0 {
                return Ok(curr);
            }
            curr = dir.prev();
        }
        error!("directory block count not plausible, aborting");
        Err(Box::new(Error::IOError))
    }
    /// Search one directory chain for a live entry with the given name.
    fn search_entries(&self,name: &str,key_block: u16) -> Result<Option<EntryLocation>,DYNERR> {
        let target = name.to_uppercase();
        let mut curr = key_block;
        for _try in 0..MAX_DIRECTORY_REPS {
            let dir = self.get_directory(curr as usize)?;
            for loc in dir.entry_locations(curr) {
                let entry = dir.get_entry(&loc);
                if entry.is_active() && entry.name().to_uppercase()==target {
                    return Ok(Some(loc));
                }
            }
            curr = dir.next();
            if curr==0 {
                return Ok(None);
            }
        }
        error!("directory block count not plausible, aborting");
        Err(Box::new(Error::IOError))
    }
    /// Walk the path from the volume key block, returning the key block of
    /// the named directory.  The empty path and "/" name the root.
    fn find_dir_key_block(&self,path: &str) -> Result<u16,DYNERR> {
        let mut curr = VOL_KEY_BLOCK;
        for node in path.split('/') {
            if node.len()==0 {
                continue;
            }
            match self.search_entries(node,curr)? {
                Some(loc) => {
                    let entry = self.read_entry(&loc)?;
                    if entry.storage_type()!=StorageType::SubDirEntry {
                        return Err(Box::new(Error::NotDir));
                    }
                    curr = entry.get_ptr();
                },
                None => return Err(Box::new(Error::NotFound))
            }
        }
        Ok(curr)
    }
    /// Locate the named file under the given directory prefix.
    fn find_file(&self,path: &str,name: &str) -> Result<EntryLocation,DYNERR> {
        let key_block = self.find_dir_key_block(path)?;
        match self.search_entries(name,key_block)? {
            Some(loc) => Ok(loc),
            None => Err(Box::new(Error::NotFound))
        }
    }
    /// Next inactive entry slot in a chain, expanding a subdirectory with a
    /// fresh entry block when it runs out.  The volume directory is fixed.
    fn get_available_entry(&mut self,key_block: u16) -> Result<EntryLocation,DYNERR> {
        let mut curr = key_block;
        for _try in 0..MAX_DIRECTORY_REPS {
            let dir = self.get_directory(curr as usize)?;
            for loc in dir.entry_locations(curr) {
                if !dir.get_entry(&loc).is_active() {
                    return Ok(loc);
                }
            }
            if dir.next()==0 {
                let key = self.get_directory(key_block as usize)?;
                let parent_loc = match key.parent_entry_loc() {
                    Some(loc) => loc,
                    None => return Err(Box::new(Error::NoSpace))
                };
                let avail = self.allocate(1)?[0];
                let mut tail = self.get_directory(curr as usize)?;
                tail.set_links(None,Some(avail));
                self.img.write_block(curr as usize,&tail.to_bytes())?;
                let mut fresh = EntryBlock::new();
                fresh.set_links(Some(curr),Some(0));
                self.img.write_block(avail as usize,&fresh.to_bytes())?;
                // grow the parent entry to cover the new block
                let mut parent = self.read_entry(&parent_loc)?;
                parent.set_eof(parent.eof()+BLOCK_SIZE);
                parent.set_blocks_used(parent.blocks_used()+1);
                self.write_entry(&parent_loc,&parent)?;
                return Ok(EntryLocation { block: avail, idx: 1 });
            }
            curr = dir.next();
        }
        error!("directory block count not plausible, aborting");
        Err(Box::new(Error::IOError))
    }
    /// Read the blocks of one file in entry order, honoring EOF.
    fn read_data(&self,entry: &Entry) -> Result<Vec<u8>,DYNERR> {
        let eof = entry.eof();
        let mut ans: Vec<u8> = Vec::new();
        let key = entry.get_ptr();
        match entry.storage_type() {
            StorageType::Seedling => {
                ans.append(&mut self.img.read_block(key as usize)?);
            },
            StorageType::Sapling => {
                let index = self.img.read_block(key as usize)?;
                self.read_index(&index,eof,&mut ans)?;
            },
            StorageType::Tree => {
                let master = self.img.read_block(key as usize)?;
                for idx in 0..128 {
                    if ans.len()>=eof {
                        break;
                    }
                    let ptr = unpack_index_ptr(&master,idx);
                    if ptr>0 {
                        let index = self.img.read_block(ptr as usize)?;
                        self.read_index(&index,eof,&mut ans)?;
                    } else {
                        ans.append(&mut vec![0;SAPLING_MAX]);
                    }
                }
            },
            _ => return Err(Box::new(Error::NotFound))
        }
        ans.truncate(eof);
        Ok(ans)
    }
    fn read_index(&self,index: &[u8],eof: usize,ans: &mut Vec<u8>) -> STDRESULT {
        for idx in 0..INDEX_SPAN {
            if ans.len()>=eof {
                break;
            }
            let ptr = unpack_index_ptr(index,idx);
            if ptr>0 {
                ans.append(&mut self.img.read_block(ptr as usize)?);
            } else {
                ans.append(&mut vec![0;BLOCK_SIZE]);
            }
        }
        Ok(())
    }
    /// Free every block reachable from the entry.
    fn deallocate_file_blocks(&mut self,entry: &Entry) -> STDRESULT {
        let key = entry.get_ptr();
        match entry.storage_type() {
            StorageType::Seedling => {
                self.set_block_free(key as usize,true)?;
            },
            StorageType::Sapling => {
                self.deallocate_index(key)?;
            },
            StorageType::Tree => {
                let master = self.img.read_block(key as usize)?;
                for idx in 0..128 {
                    let ptr = unpack_index_ptr(&master,idx);
                    if ptr>0 {
                        self.deallocate_index(ptr)?;
                    }
                }
                self.set_block_free(key as usize,true)?;
            },
            _ => return Err(Box::new(Error::NotFound))
        }
        Ok(())
    }
    fn deallocate_index(&mut self,index_ptr: u16) -> STDRESULT {
        let index = self.img.read_block(index_ptr as usize)?;
        for idx in 0..INDEX_SPAN {
            let ptr = unpack_index_ptr(&index,idx);
            if ptr>0 {
                self.set_block_free(ptr as usize,true)?;
            }
        }
        self.set_block_free(index_ptr as usize,true)
    }
    /// Fill in the unified catalog record from a directory entry.
    fn entry_to_file(&self,entry: &Entry,path: &str) -> DiskFile {
        let mut ans = DiskFile::new(&entry.name(),path);
        let typ = entry.ftype();
        ans.kind = match TYPE_MAP_DISP.iter().find(|(code,_)| *code==typ) {
            Some((_,s)) => s.to_string(),
            None => format!("${}",hex::encode_upper(vec![typ]))
        };
        ans.ext = match FileType::from_u8(typ) {
            Some(FileType::Text) => "TXT".to_string(),
            Some(FileType::ApplesoftCode) => "APP".to_string(),
            Some(FileType::IntegerCode) => "INT".to_string(),
            Some(FileType::System) => "SYS".to_string(),
            Some(FileType::Directory) => "DIR".to_string(),
            _ => "BIN".to_string()
        };
        ans.size = entry.eof();
        ans.blocks = entry.blocks_used() as usize;
        ans.load_addr = match FileType::from_u8(typ) {
            Some(FileType::Binary) | Some(FileType::System) | Some(FileType::ApplesoftCode) => entry.aux(),
            _ => 0
        };
        ans.locked = entry.is_locked();
        ans.is_dir = entry.storage_type()==StorageType::SubDirEntry;
        ans
    }
    fn catalog_node(&self,key_block: u16,path: &str,ans: &mut Vec<DiskFile>) -> STDRESULT {
        let mut curr = key_block;
        for _try in 0..MAX_DIRECTORY_REPS {
            let dir = self.get_directory(curr as usize)?;
            for loc in dir.entry_locations(curr) {
                let entry = dir.get_entry(&loc);
                if entry.is_active() {
                    ans.push(self.entry_to_file(&entry,path));
                    if entry.storage_type()==StorageType::SubDirEntry {
                        let sub = match path.len() {
                            0 => entry.name(),
                            _ => [path.to_string(),"/".to_string(),entry.name()].concat()
                        };
                        self.catalog_node(entry.get_ptr(),&sub,ans)?;
                    }
                }
            }
            curr = dir.next();
            if curr==0 {
                return Ok(());
            }
        }
        error!("directory block count not plausible, aborting");
        Err(Box::new(Error::IOError))
    }
    /// Format a disk with the ProDOS file system: volume key at block 2,
    /// three more directory blocks, bitmap at block 6, boot blocks zeroed.
    pub fn format(&mut self,vol_name: &str,time: Option<chrono::NaiveDateTime>) -> STDRESULT {
        if !is_name_valid(vol_name) {
            return Err(Box::new(Error::ParseError));
        }
        for iblock in 0..self.total_blocks {
            self.img.write_block(iblock,&[0;BLOCK_SIZE])?;
        }
        let mut key = KeyBlock::<VolDirHeader>::new();
        key.set_links(Some(0),Some(VOL_KEY_BLOCK+1));
        key.header.format(self.total_blocks as u16,vol_name,time);
        self.img.write_block(VOL_KEY_BLOCK as usize,&key.to_bytes())?;
        for b in 3..6u16 {
            let mut this = EntryBlock::new();
            let next = match b {
                5 => 0,
                _ => b+1
            };
            this.set_links(Some(b-1),Some(next));
            self.img.write_block(b as usize,&this.to_bytes())?;
        }
        // mark everything free, then the system blocks used
        for b in 0..self.total_blocks {
            self.set_block_free(b,true)?;
        }
        let bitmap_count = 1 + (self.total_blocks-1)/4096;
        for b in 0..6+bitmap_count {
            self.set_block_free(b,false)?;
        }
        Ok(())
    }
    pub fn total_blocks(&self) -> usize {
        self.total_blocks
    }
    /// Storage type a payload of this length will use.
    fn storage_type_for(len: usize) -> StorageType {
        match len {
            l if l<=BLOCK_SIZE => StorageType::Seedling,
            l if l<=SAPLING_MAX => StorageType::Sapling,
            _ => StorageType::Tree
        }
    }
}

impl super::DiskFS for Disk {
    fn catalog(&mut self) -> Result<Vec<DiskFile>,DYNERR> {
        let mut ans = Vec::new();
        self.catalog_node(VOL_KEY_BLOCK,"",&mut ans)?;
        Ok(ans)
    }
    fn read_file(&mut self,path: &str,name: &str) -> Result<DiskFile,DYNERR> {
        let loc = self.find_file(path,name)?;
        let entry = self.read_entry(&loc)?;
        let mut ans = self.entry_to_file(&entry,path);
        ans.data = self.read_data(&entry)?;
        Ok(ans)
    }
    fn write_file(&mut self,path: &str,name: &str,ext: &str,dat: &[u8],load_addr: u16) -> Result<usize,DYNERR> {
        if name.len()>15 {
            return Err(Box::new(Error::NameTooLong));
        }
        if !is_name_valid(name) {
            return Err(Box::new(Error::ParseError));
        }
        let typ = FileType::from_str(ext)?;
        let key_block = self.find_dir_key_block(path)?;
        // an existing unlocked file of the same name is replaced
        if let Some(loc) = self.search_entries(name,key_block)? {
            let entry = self.read_entry(&loc)?;
            if entry.is_locked() {
                return Err(Box::new(Error::PermissionLocked));
            }
            self.delete(path,name)?;
        }
        let loc = self.get_available_entry(key_block)?;
        // gather all the blocks this write needs before touching anything
        let data_blocks = usize::max(1,(dat.len()+BLOCK_SIZE-1)/BLOCK_SIZE);
        let stype = Self::storage_type_for(dat.len());
        let index_blocks = match stype {
            StorageType::Seedling => 0,
            StorageType::Sapling => 1,
            _ => 1 + (data_blocks+INDEX_SPAN-1)/INDEX_SPAN
        };
        let blocks = self.allocate(data_blocks+index_blocks)?;
        let (index,data) = blocks.split_at(index_blocks);
        // write the data blocks
        for (i,iblock) in data.iter().enumerate() {
            let beg = usize::min(i*BLOCK_SIZE,dat.len());
            let end = usize::min((i+1)*BLOCK_SIZE,dat.len());
            self.img.write_block(*iblock as usize,&img::quantize(&dat[beg..end],BLOCK_SIZE))?;
        }
        // write the index planes
        let key_ptr = match stype {
            StorageType::Seedling => data[0],
            StorageType::Sapling => {
                let mut buf = vec![0;BLOCK_SIZE];
                for (i,iblock) in data.iter().enumerate() {
                    pack_index_ptr(&mut buf,*iblock,i);
                }
                self.img.write_block(index[0] as usize,&buf)?;
                index[0]
            },
            _ => {
                let mut master = vec![0;BLOCK_SIZE];
                for (n,iblock) in index[1..].iter().enumerate() {
                    pack_index_ptr(&mut master,*iblock,n);
                    let mut buf = vec![0;BLOCK_SIZE];
                    for i in 0..INDEX_SPAN {
                        match data.get(n*INDEX_SPAN+i) {
                            Some(ptr) => pack_index_ptr(&mut buf,*ptr,i),
                            None => break
                        }
                    }
                    self.img.write_block(*iblock as usize,&buf)?;
                }
                self.img.write_block(index[0] as usize,&master)?;
                index[0]
            }
        };
        // link the entry and bump the parent file count
        let mut entry = Entry::create_file(name,stype,typ as u8,load_addr,key_ptr,key_block,None);
        entry.set_eof(dat.len());
        entry.set_blocks_used(blocks.len() as u16);
        self.write_entry(&loc,&entry)?;
        let mut key_dir = self.get_directory(key_block as usize)?;
        key_dir.delta_file_count(1);
        self.img.write_block(key_block as usize,&key_dir.to_bytes())?;
        Ok(blocks.len())
    }
    fn delete(&mut self,path: &str,name: &str) -> STDRESULT {
        let key_block = self.find_dir_key_block(path)?;
        let loc = match self.search_entries(name,key_block)? {
            Some(loc) => loc,
            None => return Err(Box::new(Error::NotFound))
        };
        let entry = self.read_entry(&loc)?;
        if !entry.get_access(Access::Destroy) {
            return Err(Box::new(Error::PermissionLocked));
        }
        if entry.storage_type()==StorageType::SubDirEntry {
            let sub_key = entry.get_ptr();
            let sub_dir = self.get_directory(sub_key as usize)?;
            if sub_dir.file_count()>0 {
                return Err(Box::new(Error::DirectoryNotEmpty));
            }
            // free the whole directory chain
            let mut curr = sub_key;
            for _try in 0..MAX_DIRECTORY_REPS {
                let dir = self.get_directory(curr as usize)?;
                self.set_block_free(curr as usize,true)?;
                curr = dir.next();
                if curr==0 {
                    break;
                }
            }
        } else {
            self.deallocate_file_blocks(&entry)?;
        }
        let mut dir = self.get_directory(loc.block as usize)?;
        dir.delete_entry(&loc);
        self.img.write_block(loc.block as usize,&dir.to_bytes())?;
        let key_ptr = self.get_key_block(loc.block)?;
        let mut key_dir = self.get_directory(key_ptr as usize)?;
        key_dir.delta_file_count(-1);
        self.img.write_block(key_ptr as usize,&key_dir.to_bytes())
    }
    fn set_locked(&mut self,path: &str,name: &str,locked: bool) -> STDRESULT {
        let loc = self.find_file(path,name)?;
        let mut entry = self.read_entry(&loc)?;
        entry.set_all_access(match locked {
            true => ACCESS_LOCKED,
            false => ACCESS_UNLOCKED
        });
        entry.touch(None);
        self.write_entry(&loc,&entry)
    }
    fn rename(&mut self,path: &str,old_name: &str,new_name: &str) -> STDRESULT {
        if new_name.len()>15 {
            return Err(Box::new(Error::NameTooLong));
        }
        if !is_name_valid(new_name) {
            return Err(Box::new(Error::ParseError));
        }
        let key_block = self.find_dir_key_block(path)?;
        if self.search_entries(new_name,key_block)?.is_some() {
            return Err(Box::new(Error::BadArgument));
        }
        let loc = match self.search_entries(old_name,key_block)? {
            Some(loc) => loc,
            None => return Err(Box::new(Error::NotFound))
        };
        let mut entry = self.read_entry(&loc)?;
        if !entry.get_access(Access::Rename) {
            return Err(Box::new(Error::PermissionLocked));
        }
        entry.rename(new_name);
        entry.touch(None);
        self.write_entry(&loc,&entry)?;
        // a renamed subdirectory also carries its name in the key header
        if entry.storage_type()==StorageType::SubDirEntry {
            let buf = self.img.read_block(entry.get_ptr() as usize)?;
            let mut sub: KeyBlock<SubDirHeader> = KeyBlock::from_bytes(&buf)?;
            sub.header.rename(new_name);
            self.img.write_block(entry.get_ptr() as usize,&sub.to_bytes())?;
        }
        Ok(())
    }
    fn create_directory(&mut self,path: &str,name: &str) -> STDRESULT {
        if name.len()>15 {
            return Err(Box::new(Error::NameTooLong));
        }
        if !is_name_valid(name) {
            return Err(Box::new(Error::ParseError));
        }
        let key_block = self.find_dir_key_block(path)?;
        if self.search_entries(name,key_block)?.is_some() {
            return Err(Box::new(Error::BadArgument));
        }
        let loc = self.get_available_entry(key_block)?;
        let new_block = self.allocate(1)?[0];
        // thread the entry into the parent
        let entry = Entry::create_subdir(name,new_block,key_block,None);
        self.write_entry(&loc,&entry)?;
        let mut key_dir = self.get_directory(key_block as usize)?;
        key_dir.delta_file_count(1);
        self.img.write_block(key_block as usize,&key_dir.to_bytes())?;
        // write the new directory's key block with the parent back-link
        let mut subdir = KeyBlock::<SubDirHeader>::new();
        subdir.header.create(name,loc.block,loc.idx as u8,None);
        self.img.write_block(new_block as usize,&subdir.to_bytes())
    }
    fn dir_exists(&mut self,path: &str) -> bool {
        self.find_dir_key_block(path).is_ok()
    }
    fn usage(&mut self) -> Result<(usize,usize),DYNERR> {
        let free = self.num_free_blocks()?;
        Ok((self.total_blocks-free,free))
    }
    fn get_img(&mut self) -> &mut img::Img {
        &mut self.img
    }
}

#[test]
fn storage_type_boundaries() {
    assert!(matches!(Disk::storage_type_for(0),StorageType::Seedling));
    assert!(matches!(Disk::storage_type_for(512),StorageType::Seedling));
    assert!(matches!(Disk::storage_type_for(513),StorageType::Sapling));
    assert!(matches!(Disk::storage_type_for(131072),StorageType::Sapling));
    assert!(matches!(Disk::storage_type_for(131073),StorageType::Tree));
}
