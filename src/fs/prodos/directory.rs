//! ### ProDOS directory structures
//!
//! Fixed length structs mirroring the on-disk layout of the volume key
//! block, subdirectory key blocks, and entry blocks.  External interactions
//! go through the `Directory` trait object and the `Entry` struct.

use chrono::{Datelike,Timelike};
use num_traits::FromPrimitive;
use regex::Regex;

use super::types::*;
use super::super::{DiskStruct,DiskStructError};

pub fn pack_time(time: Option<chrono::NaiveDateTime>) -> [u8;4] {
    let now = match time {
        Some(t) => t,
        _ => chrono::Local::now().naive_local()
    };
    let (_is_common_era,year) = now.year_ce();
    let packed_date = (now.day() + (now.month() << 5) + (year%100 << 9)) as u16;
    let packed_time = (now.minute() + (now.hour() << 8)) as u16;
    let bytes_date = u16::to_le_bytes(packed_date);
    let bytes_time = u16::to_le_bytes(packed_time);
    return [bytes_date[0],bytes_date[1],bytes_time[0],bytes_time[1]];
}

/// Test the string for validity as a ProDOS name.
pub fn is_name_valid(s: &str) -> bool {
    let fname_patt = Regex::new(r"^[A-Z][A-Z0-9.]{0,14}$").expect("unreachable");
    fname_patt.is_match(&s.to_uppercase())
}

/// Convert filename bytes to a string; `nibs` is the storage/length byte.
pub fn file_name_to_string(nibs: u8,fname: [u8;15]) -> String {
    let name_len = (nibs & 0x0f) as usize;
    String::from_utf8_lossy(&fname[0..name_len]).to_string()
}

/// Convert storage type and name to the packed (nibs,name) pair.
/// The caller must have validated the name.
pub fn string_to_file_name(stype: StorageType,s: &str) -> (u8,[u8;15]) {
    let new_nibs = ((stype as u8) << 4) + s.len() as u8;
    let mut ans: [u8;15] = [0;15];
    let mut i = 0;
    for byte in s.to_uppercase().bytes() {
        if i<15 {
            ans[i] = byte;
        }
        i += 1;
    }
    (new_nibs,ans)
}

pub trait HasName {
    fn name(&self) -> String;
    fn storage_type(&self) -> StorageType;
}

/// Common interface of the three kinds of directory block.
pub trait Directory: DiskStruct {
    fn prev(&self) -> u16;
    fn next(&self) -> u16;
    fn set_links(&mut self,prev: Option<u16>,next: Option<u16>);
    fn entry_locations(&self,iblock: u16) -> Vec<EntryLocation>;
    fn get_entry(&self,loc: &EntryLocation) -> Entry;
    fn set_entry(&mut self,loc: &EntryLocation,entry: Entry);
    fn delete_entry(&mut self,loc: &EntryLocation);
    fn file_count(&self) -> u16;
    fn delta_file_count(&mut self,delta: i32);
    fn parent_entry_loc(&self) -> Option<EntryLocation>;
}

/// KeyBlock has a generic header type, either VolDirHeader or SubDirHeader.
pub struct KeyBlock<T> {
    prev_block: [u8;2],
    next_block: [u8;2],
    pub header: T,
    entries: [Entry;12]
}

pub struct EntryBlock {
    prev_block: [u8;2],
    next_block: [u8;2],
    entries: [Entry;13]
}

#[derive(Clone,Copy)]
pub struct VolDirHeader {
    stor_len_nibs: u8,
    name: [u8;15],
    pub pad1: [u8;8],
    create_time: [u8;4],
    vers: u8,
    min_vers: u8,
    access: u8,
    entry_len: u8,
    entries_per_block: u8,
    file_count: [u8;2],
    pub bitmap_ptr: [u8;2],
    total_blocks: [u8;2]
}

#[derive(Clone,Copy)]
pub struct SubDirHeader {
    stor_len_nibs: u8,
    name: [u8;15],
    pad1: [u8;8],
    create_time: [u8;4],
    vers: u8,
    min_vers: u8,
    access: u8,
    entry_len: u8,
    entries_per_block: u8,
    file_count: [u8;2],
    parent_ptr: [u8;2],
    parent_entry_num: u8,
    parent_entry_len: u8
}

#[derive(Clone,Copy)]
pub struct Entry {
    stor_len_nibs: u8,
    name: [u8;15],
    file_type: u8,
    key_ptr: [u8;2],
    blocks_used: [u8;2],
    eof: [u8;3],
    create_time: [u8;4],
    vers: u8,
    min_vers: u8,
    access: u8,
    aux_type: [u8;2],
    last_mod: [u8;4],
    header_ptr: [u8;2]
}

impl VolDirHeader {
    pub fn format(&mut self,blocks: u16,vol_name: &str,create_time: Option<chrono::NaiveDateTime>) {
        let (nibs,fname) = string_to_file_name(StorageType::VolDirHeader,vol_name);
        self.stor_len_nibs = nibs;
        self.name = fname;
        self.pad1 = [0;8];
        self.create_time = pack_time(create_time);
        self.vers = 0;
        self.min_vers = 0;
        self.access = ACCESS_UNLOCKED;
        self.entry_len = ENTRY_SIZE as u8;
        self.entries_per_block = ENTRIES_PER_BLOCK as u8;
        self.file_count = [0,0];
        self.bitmap_ptr = [6,0];
        self.total_blocks = u16::to_le_bytes(blocks);
    }
}

impl SubDirHeader {
    pub fn create(&mut self,name: &str,parent_ptr: u16,parent_entry_num: u8,create_time: Option<chrono::NaiveDateTime>) {
        let (nibs,fname) = string_to_file_name(StorageType::SubDirHeader,name);
        self.stor_len_nibs = nibs;
        self.name = fname;
        self.pad1 = [0x75,0,0,0,0,0,0,0];
        self.create_time = pack_time(create_time);
        self.vers = 0;
        self.min_vers = 0;
        self.access = ACCESS_UNLOCKED;
        self.entry_len = ENTRY_SIZE as u8;
        self.entries_per_block = ENTRIES_PER_BLOCK as u8;
        self.file_count = [0,0];
        self.parent_ptr = u16::to_le_bytes(parent_ptr);
        self.parent_entry_num = parent_entry_num;
        self.parent_entry_len = ENTRY_SIZE as u8;
    }
    /// The caller must have validated the name.
    pub fn rename(&mut self,name: &str) {
        let (nibs,fname) = string_to_file_name(StorageType::SubDirHeader,name);
        self.stor_len_nibs = nibs;
        self.name = fname;
    }
}

impl Entry {
    pub fn is_active(&self) -> bool {
        self.stor_len_nibs>0
    }
    pub fn get_ptr(&self) -> u16 {
        u16::from_le_bytes(self.key_ptr)
    }
    pub fn eof(&self) -> usize {
        u32::from_le_bytes([self.eof[0],self.eof[1],self.eof[2],0]) as usize
    }
    pub fn set_eof(&mut self,bytes: usize) {
        let le = u32::to_le_bytes(bytes as u32);
        self.eof = [le[0],le[1],le[2]];
    }
    pub fn aux(&self) -> u16 {
        u16::from_le_bytes(self.aux_type)
    }
    pub fn ftype(&self) -> u8 {
        self.file_type
    }
    pub fn blocks_used(&self) -> u16 {
        u16::from_le_bytes(self.blocks_used)
    }
    pub fn set_blocks_used(&mut self,blocks: u16) {
        self.blocks_used = u16::to_le_bytes(blocks);
    }
    pub fn get_access(&self,what: Access) -> bool {
        self.access & what as u8 > 0
    }
    pub fn set_all_access(&mut self,what: u8) {
        self.access = what;
    }
    pub fn is_locked(&self) -> bool {
        self.access & Access::Write as u8 == 0
    }
    pub fn touch(&mut self,time: Option<chrono::NaiveDateTime>) {
        self.last_mod = pack_time(time);
    }
    /// The caller must have validated the name.
    pub fn rename(&mut self,name: &str) {
        let stor = self.storage_type();
        let (nibs,fname) = string_to_file_name(stor,name);
        self.stor_len_nibs = nibs;
        self.name = fname;
    }
    /// The caller must have validated the name.
    pub fn create_subdir(name: &str,key_ptr: u16,header_ptr: u16,create_time: Option<chrono::NaiveDateTime>) -> Entry {
        let mut ans = Self::new();
        let (nibs,fname) = string_to_file_name(StorageType::SubDirEntry,name);
        ans.stor_len_nibs = nibs;
        ans.name = fname;
        ans.file_type = FileType::Directory as u8;
        ans.key_ptr = u16::to_le_bytes(key_ptr);
        ans.blocks_used = [1,0];
        ans.set_eof(BLOCK_SIZE);
        ans.create_time = pack_time(create_time);
        ans.access = ACCESS_UNLOCKED;
        ans.aux_type = [0,0];
        ans.last_mod = pack_time(create_time);
        ans.header_ptr = u16::to_le_bytes(header_ptr);
        return ans;
    }
    /// The caller must have validated the name.
    pub fn create_file(name: &str,stype: StorageType,ftype: u8,aux: u16,key_ptr: u16,header_ptr: u16,create_time: Option<chrono::NaiveDateTime>) -> Entry {
        let mut ans = Self::new();
        let (nibs,fname) = string_to_file_name(stype,name);
        ans.stor_len_nibs = nibs;
        ans.name = fname;
        ans.file_type = ftype;
        ans.key_ptr = u16::to_le_bytes(key_ptr);
        ans.create_time = pack_time(create_time);
        ans.access = ACCESS_UNLOCKED;
        ans.aux_type = u16::to_le_bytes(aux);
        ans.last_mod = pack_time(create_time);
        ans.header_ptr = u16::to_le_bytes(header_ptr);
        return ans;
    }
}

impl DiskStruct for Entry {
    fn new() -> Self {
        Self {
            stor_len_nibs: 0,
            name: [0;15],
            file_type: 0,
            key_ptr: [0;2],
            blocks_used: [0;2],
            eof: [0;3],
            create_time: [0;4],
            vers: 0,
            min_vers: 0,
            access: 0,
            aux_type: [0;2],
            last_mod: [0;4],
            header_ptr: [0;2]
        }
    }
    fn from_bytes(dat: &[u8]) -> Result<Self,DiskStructError> {
        let mut ans = Self::new();
        ans.update_from_bytes(dat)?;
        Ok(ans)
    }
    fn update_from_bytes(&mut self,dat: &[u8]) -> Result<(),DiskStructError> {
        if dat.len()<ENTRY_SIZE {
            return Err(DiskStructError::OutOfData);
        }
        self.stor_len_nibs = dat[0x00];
        self.name.copy_from_slice(&dat[0x01..0x10]);
        self.file_type = dat[0x10];
        self.key_ptr.copy_from_slice(&dat[0x11..0x13]);
        self.blocks_used.copy_from_slice(&dat[0x13..0x15]);
        self.eof.copy_from_slice(&dat[0x15..0x18]);
        self.create_time.copy_from_slice(&dat[0x18..0x1c]);
        self.vers = dat[0x1c];
        self.min_vers = dat[0x1d];
        self.access = dat[0x1e];
        self.aux_type.copy_from_slice(&dat[0x1f..0x21]);
        self.last_mod.copy_from_slice(&dat[0x21..0x25]);
        self.header_ptr.copy_from_slice(&dat[0x25..0x27]);
        Ok(())
    }
    fn to_bytes(&self) -> Vec<u8> {
        let mut ans: Vec<u8> = Vec::new();
        ans.push(self.stor_len_nibs);
        ans.append(&mut self.name.to_vec());
        ans.push(self.file_type);
        ans.append(&mut self.key_ptr.to_vec());
        ans.append(&mut self.blocks_used.to_vec());
        ans.append(&mut self.eof.to_vec());
        ans.append(&mut self.create_time.to_vec());
        ans.push(self.vers);
        ans.push(self.min_vers);
        ans.push(self.access);
        ans.append(&mut self.aux_type.to_vec());
        ans.append(&mut self.last_mod.to_vec());
        ans.append(&mut self.header_ptr.to_vec());
        return ans;
    }
    fn len(&self) -> usize {
        return ENTRY_SIZE;
    }
}

impl HasName for Entry {
    fn name(&self) -> String {
        file_name_to_string(self.stor_len_nibs,self.name)
    }
    fn storage_type(&self) -> StorageType {
        match StorageType::from_u8((self.stor_len_nibs & 0xf0) >> 4) {
            Some(t) => t,
            _ => StorageType::Inactive
        }
    }
}

/// Shared front section of the two header layouts; offsets 0x00..0x23
/// relative to the header start.
macro_rules! header_front {
    (read $self:ident, $dat:ident) => {
        $self.stor_len_nibs = $dat[0x00];
        $self.name.copy_from_slice(&$dat[0x01..0x10]);
        $self.pad1.copy_from_slice(&$dat[0x10..0x18]);
        $self.create_time.copy_from_slice(&$dat[0x18..0x1c]);
        $self.vers = $dat[0x1c];
        $self.min_vers = $dat[0x1d];
        $self.access = $dat[0x1e];
        $self.entry_len = $dat[0x1f];
        $self.entries_per_block = $dat[0x20];
        $self.file_count.copy_from_slice(&$dat[0x21..0x23]);
    };
    (write $self:ident, $ans:ident) => {
        $ans.push($self.stor_len_nibs);
        $ans.append(&mut $self.name.to_vec());
        $ans.append(&mut $self.pad1.to_vec());
        $ans.append(&mut $self.create_time.to_vec());
        $ans.push($self.vers);
        $ans.push($self.min_vers);
        $ans.push($self.access);
        $ans.push($self.entry_len);
        $ans.push($self.entries_per_block);
        $ans.append(&mut $self.file_count.to_vec());
    };
}

macro_rules! header_has_name {
    ($header:ty) => {
        impl HasName for $header {
            fn name(&self) -> String {
                file_name_to_string(self.stor_len_nibs,self.name)
            }
            fn storage_type(&self) -> StorageType {
                match StorageType::from_u8((self.stor_len_nibs & 0xf0) >> 4) {
                    Some(t) => t,
                    _ => StorageType::Inactive
                }
            }
        }
    };
}

impl DiskStruct for VolDirHeader {
    fn new() -> Self {
        Self {
            stor_len_nibs: 0,
            name: [0;15],
            pad1: [0;8],
            create_time: [0;4],
            vers: 0,
            min_vers: 0,
            access: 0,
            entry_len: 0,
            entries_per_block: 0,
            file_count: [0;2],
            bitmap_ptr: [0;2],
            total_blocks: [0;2]
        }
    }
    fn from_bytes(dat: &[u8]) -> Result<Self,DiskStructError> {
        let mut ans = Self::new();
        ans.update_from_bytes(dat)?;
        Ok(ans)
    }
    fn update_from_bytes(&mut self,dat: &[u8]) -> Result<(),DiskStructError> {
        if dat.len()<ENTRY_SIZE {
            return Err(DiskStructError::OutOfData);
        }
        header_front!(read self,dat);
        self.bitmap_ptr.copy_from_slice(&dat[0x23..0x25]);
        self.total_blocks.copy_from_slice(&dat[0x25..0x27]);
        Ok(())
    }
    fn to_bytes(&self) -> Vec<u8> {
        let mut ans: Vec<u8> = Vec::new();
        header_front!(write self,ans);
        ans.append(&mut self.bitmap_ptr.to_vec());
        ans.append(&mut self.total_blocks.to_vec());
        return ans;
    }
    fn len(&self) -> usize {
        return ENTRY_SIZE;
    }
}

impl DiskStruct for SubDirHeader {
    fn new() -> Self {
        Self {
            stor_len_nibs: 0,
            name: [0;15],
            pad1: [0;8],
            create_time: [0;4],
            vers: 0,
            min_vers: 0,
            access: 0,
            entry_len: 0,
            entries_per_block: 0,
            file_count: [0;2],
            parent_ptr: [0;2],
            parent_entry_num: 0,
            parent_entry_len: 0
        }
    }
    fn from_bytes(dat: &[u8]) -> Result<Self,DiskStructError> {
        let mut ans = Self::new();
        ans.update_from_bytes(dat)?;
        Ok(ans)
    }
    fn update_from_bytes(&mut self,dat: &[u8]) -> Result<(),DiskStructError> {
        if dat.len()<ENTRY_SIZE {
            return Err(DiskStructError::OutOfData);
        }
        header_front!(read self,dat);
        self.parent_ptr.copy_from_slice(&dat[0x23..0x25]);
        self.parent_entry_num = dat[0x25];
        self.parent_entry_len = dat[0x26];
        Ok(())
    }
    fn to_bytes(&self) -> Vec<u8> {
        let mut ans: Vec<u8> = Vec::new();
        header_front!(write self,ans);
        ans.append(&mut self.parent_ptr.to_vec());
        ans.push(self.parent_entry_num);
        ans.push(self.parent_entry_len);
        return ans;
    }
    fn len(&self) -> usize {
        return ENTRY_SIZE;
    }
}

header_has_name!(VolDirHeader);
header_has_name!(SubDirHeader);

impl<T: DiskStruct> DiskStruct for KeyBlock<T> {
    fn new() -> Self {
        Self {
            prev_block: [0;2],
            next_block: [0;2],
            header: T::new(),
            entries: [Entry::new();12]
        }
    }
    fn from_bytes(dat: &[u8]) -> Result<Self,DiskStructError> {
        let mut ans = Self::new();
        ans.update_from_bytes(dat)?;
        Ok(ans)
    }
    fn update_from_bytes(&mut self,dat: &[u8]) -> Result<(),DiskStructError> {
        if dat.len()<BLOCK_SIZE-1 {
            return Err(DiskStructError::OutOfData);
        }
        self.prev_block = [dat[0],dat[1]];
        self.next_block = [dat[2],dat[3]];
        let mut offset = 4;
        self.header.update_from_bytes(&dat[offset..offset+ENTRY_SIZE])?;
        offset += ENTRY_SIZE;
        for i in 0..self.entries.len() {
            self.entries[i].update_from_bytes(&dat[offset..offset+ENTRY_SIZE])?;
            offset += ENTRY_SIZE;
        }
        Ok(())
    }
    fn to_bytes(&self) -> Vec<u8> {
        let mut ans: Vec<u8> = Vec::new();
        ans.append(&mut self.prev_block.to_vec());
        ans.append(&mut self.next_block.to_vec());
        ans.append(&mut self.header.to_bytes());
        for i in 0..self.entries.len() {
            ans.append(&mut self.entries[i].to_bytes());
        }
        ans.push(0);
        return ans;
    }
    fn len(&self) -> usize {
        return BLOCK_SIZE;
    }
}

impl DiskStruct for EntryBlock {
    fn new() -> Self {
        Self {
            prev_block: [0;2],
            next_block: [0;2],
            entries: [Entry::new();13]
        }
    }
    fn from_bytes(dat: &[u8]) -> Result<Self,DiskStructError> {
        let mut ans = Self::new();
        ans.update_from_bytes(dat)?;
        Ok(ans)
    }
    fn update_from_bytes(&mut self,dat: &[u8]) -> Result<(),DiskStructError> {
        if dat.len()<BLOCK_SIZE-1 {
            return Err(DiskStructError::OutOfData);
        }
        self.prev_block = [dat[0],dat[1]];
        self.next_block = [dat[2],dat[3]];
        let mut offset = 4;
        for i in 0..self.entries.len() {
            self.entries[i].update_from_bytes(&dat[offset..offset+ENTRY_SIZE])?;
            offset += ENTRY_SIZE;
        }
        Ok(())
    }
    fn to_bytes(&self) -> Vec<u8> {
        let mut ans: Vec<u8> = Vec::new();
        ans.append(&mut self.prev_block.to_vec());
        ans.append(&mut self.next_block.to_vec());
        for i in 0..self.entries.len() {
            ans.append(&mut self.entries[i].to_bytes());
        }
        ans.push(0);
        return ans;
    }
    fn len(&self) -> usize {
        return BLOCK_SIZE;
    }
}

macro_rules! directory_links {
    () => {
        fn prev(&self) -> u16 {
            u16::from_le_bytes(self.prev_block)
        }
        fn next(&self) -> u16 {
            u16::from_le_bytes(self.next_block)
        }
        fn set_links(&mut self,prev: Option<u16>,next: Option<u16>) {
            if let Some(ptr) = prev {
                self.prev_block = u16::to_le_bytes(ptr);
            }
            if let Some(ptr) = next {
                self.next_block = u16::to_le_bytes(ptr);
            }
        }
    };
}

impl<T: DiskStruct + HasName> Directory for KeyBlock<T> where KeyBlock<T>: KeyHeader {
    directory_links!();
    fn entry_locations(&self,iblock: u16) -> Vec<EntryLocation> {
        let mut ans = Vec::new();
        for i in 0..self.entries.len() {
            ans.push(EntryLocation { block: iblock, idx: i+2 });
        }
        return ans;
    }
    fn get_entry(&self,loc: &EntryLocation) -> Entry {
        self.entries[loc.idx-2]
    }
    fn set_entry(&mut self,loc: &EntryLocation,entry: Entry) {
        self.entries[loc.idx-2] = entry;
    }
    fn delete_entry(&mut self,loc: &EntryLocation) {
        self.entries[loc.idx-2] = Entry::new();
    }
    fn file_count(&self) -> u16 {
        KeyHeader::file_count(self)
    }
    fn delta_file_count(&mut self,delta: i32) {
        KeyHeader::delta_file_count(self,delta)
    }
    fn parent_entry_loc(&self) -> Option<EntryLocation> {
        KeyHeader::parent_entry_loc(self)
    }
}

impl Directory for EntryBlock {
    directory_links!();
    fn entry_locations(&self,iblock: u16) -> Vec<EntryLocation> {
        let mut ans = Vec::new();
        for i in 0..self.entries.len() {
            ans.push(EntryLocation { block: iblock, idx: i+1 });
        }
        return ans;
    }
    fn get_entry(&self,loc: &EntryLocation) -> Entry {
        self.entries[loc.idx-1]
    }
    fn set_entry(&mut self,loc: &EntryLocation,entry: Entry) {
        self.entries[loc.idx-1] = entry;
    }
    fn delete_entry(&mut self,loc: &EntryLocation) {
        self.entries[loc.idx-1] = Entry::new();
    }
    fn file_count(&self) -> u16 {
        0
    }
    fn delta_file_count(&mut self,_delta: i32) {}
    fn parent_entry_loc(&self) -> Option<EntryLocation> {
        None
    }
}

/// Differentiates the two key block headers for the `Directory` impl.
pub trait KeyHeader {
    fn file_count(&self) -> u16;
    fn delta_file_count(&mut self,delta: i32);
    fn parent_entry_loc(&self) -> Option<EntryLocation>;
}

impl KeyHeader for KeyBlock<VolDirHeader> {
    fn file_count(&self) -> u16 {
        u16::from_le_bytes(self.header.file_count)
    }
    fn delta_file_count(&mut self,delta: i32) {
        let val = u16::from_le_bytes(self.header.file_count) as i32 + delta;
        self.header.file_count = u16::to_le_bytes(val as u16);
    }
    fn parent_entry_loc(&self) -> Option<EntryLocation> {
        None
    }
}

impl KeyHeader for KeyBlock<SubDirHeader> {
    fn file_count(&self) -> u16 {
        u16::from_le_bytes(self.header.file_count)
    }
    fn delta_file_count(&mut self,delta: i32) {
        let val = u16::from_le_bytes(self.header.file_count) as i32 + delta;
        self.header.file_count = u16::to_le_bytes(val as u16);
    }
    fn parent_entry_loc(&self) -> Option<EntryLocation> {
        Some(EntryLocation {
            block: u16::from_le_bytes(self.header.parent_ptr),
            idx: self.header.parent_entry_num as usize
        })
    }
}
