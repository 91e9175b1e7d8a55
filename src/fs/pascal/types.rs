use num_derive::FromPrimitive;
use super::super::{DiskStruct,DiskStructError};

pub const BLOCK_SIZE: usize = 512;
pub const VOL_HEADER_BLOCK: usize = 2;
pub const ENTRY_SIZE: usize = 26;

/// Map file type codes to strings for display
pub const TYPE_MAP_DISP: [(u8,&str);9] = [
    (0x00, "NONE"),
    (0x01, "BAD"),
    (0x02, "CODE"),
    (0x03, "TEXT"),
    (0x04, "INFO"),
    (0x05, "DATA"),
    (0x06, "GRAF"),
    (0x07, "FOTO"),
    (0x08, "SECURE")
];

/// Enumerates the Pascal file types, available conversions are:
/// * FileType to u8: `as u8`
/// * u8 to FileType: `FileType::from_u8` (use FromPrimitive trait)
#[derive(FromPrimitive,PartialEq,Clone,Copy)]
pub enum FileType {
    Non = 0x00,
    Bad = 0x01,
    Code = 0x02,
    Text = 0x03,
    Info = 0x04,
    Data = 0x05,
    Graf = 0x06,
    Foto = 0x07,
    Secure = 0x08
}

/// First 22 bytes of the volume directory, padded to one entry slot.
pub struct VolDirHeader {
    pub begin_block: [u8;2],
    pub end_block: [u8;2],
    pub file_type: [u8;2],
    pub name_len: u8,
    pub name: [u8;7],
    pub total_blocks: [u8;2],
    pub num_files: [u8;2],
    pub last_access_date: [u8;2],
    pub last_set_date: [u8;2],
    pub pad: [u8;4]
}

impl DiskStruct for VolDirHeader {
    fn new() -> Self {
        Self {
            begin_block: [0;2],
            end_block: [0;2],
            file_type: [0;2],
            name_len: 0,
            name: [0;7],
            total_blocks: [0;2],
            num_files: [0;2],
            last_access_date: [0;2],
            last_set_date: [0;2],
            pad: [0;4]
        }
    }
    fn from_bytes(dat: &[u8]) -> Result<Self,DiskStructError> {
        let mut ans = Self::new();
        ans.update_from_bytes(dat)?;
        Ok(ans)
    }
    fn update_from_bytes(&mut self,dat: &[u8]) -> Result<(),DiskStructError> {
        if dat.len()<22 {
            return Err(DiskStructError::OutOfData);
        }
        self.begin_block.copy_from_slice(&dat[0..2]);
        self.end_block.copy_from_slice(&dat[2..4]);
        self.file_type.copy_from_slice(&dat[4..6]);
        self.name_len = dat[6];
        self.name.copy_from_slice(&dat[7..14]);
        self.total_blocks.copy_from_slice(&dat[14..16]);
        self.num_files.copy_from_slice(&dat[16..18]);
        self.last_access_date.copy_from_slice(&dat[18..20]);
        self.last_set_date.copy_from_slice(&dat[20..22]);
        Ok(())
    }
    fn to_bytes(&self) -> Vec<u8> {
        let mut ans: Vec<u8> = Vec::new();
        ans.append(&mut self.begin_block.to_vec());
        ans.append(&mut self.end_block.to_vec());
        ans.append(&mut self.file_type.to_vec());
        ans.push(self.name_len);
        ans.append(&mut self.name.to_vec());
        ans.append(&mut self.total_blocks.to_vec());
        ans.append(&mut self.num_files.to_vec());
        ans.append(&mut self.last_access_date.to_vec());
        ans.append(&mut self.last_set_date.to_vec());
        ans.append(&mut self.pad.to_vec());
        return ans;
    }
    fn len(&self) -> usize {
        return ENTRY_SIZE;
    }
}

/// One 26 byte directory entry.  Files occupy the contiguous block run
/// `begin_block..end_block`; `last_byte` is the count of bytes used in
/// the final block.
pub struct DirEntry {
    pub begin_block: [u8;2],
    pub end_block: [u8;2],
    pub file_type: [u8;2],
    pub name_len: u8,
    pub name: [u8;15],
    pub last_byte: [u8;2],
    pub mod_date: [u8;2]
}

impl DiskStruct for DirEntry {
    fn new() -> Self {
        Self {
            begin_block: [0;2],
            end_block: [0;2],
            file_type: [0;2],
            name_len: 0,
            name: [0;15],
            last_byte: [0;2],
            mod_date: [0;2]
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
        self.begin_block.copy_from_slice(&dat[0..2]);
        self.end_block.copy_from_slice(&dat[2..4]);
        self.file_type.copy_from_slice(&dat[4..6]);
        self.name_len = dat[6];
        self.name.copy_from_slice(&dat[7..22]);
        self.last_byte.copy_from_slice(&dat[22..24]);
        self.mod_date.copy_from_slice(&dat[24..26]);
        Ok(())
    }
    fn to_bytes(&self) -> Vec<u8> {
        let mut ans: Vec<u8> = Vec::new();
        ans.append(&mut self.begin_block.to_vec());
        ans.append(&mut self.end_block.to_vec());
        ans.append(&mut self.file_type.to_vec());
        ans.push(self.name_len);
        ans.append(&mut self.name.to_vec());
        ans.append(&mut self.last_byte.to_vec());
        ans.append(&mut self.mod_date.to_vec());
        return ans;
    }
    fn len(&self) -> usize {
        return ENTRY_SIZE;
    }
}

impl DirEntry {
    pub fn name_string(&self) -> String {
        let len = usize::min(self.name_len as usize,15);
        String::from_utf8_lossy(&self.name[0..len]).trim_end().to_string()
    }
}
