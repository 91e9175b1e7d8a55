use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::str::FromStr;
use super::super::{DiskStruct,DiskStructError};

pub const VTOC_TRACK: usize = 17;
pub const MAX_PAIRS: usize = 122;
pub const ENTRIES_PER_SECTOR: usize = 7;
pub const MAX_DIRECTORY_REPS: usize = 100;
pub const MAX_TSLIST_REPS: usize = 1000;

/// Enumerates the four basic file types, available conversions are:
/// * FileType to u8: `as u8`
/// * u8 to FileType: `FileType::from_u8` (use FromPrimitive trait)
/// * &str to FileType: `FileType::from_str`, str is the extract extension
#[derive(FromPrimitive,PartialEq,Clone,Copy)]
pub enum FileType {
    Text = 0x00,
    Integer = 0x01,
    Applesoft = 0x02,
    Binary = 0x04
}

impl FileType {
    /// Short tag used in extracted file names.
    pub fn ext(&self) -> &'static str {
        match self {
            Self::Text => "TXT",
            Self::Integer => "INT",
            Self::Applesoft => "APP",
            Self::Binary => "BIN"
        }
    }
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Integer => "Integer BASIC",
            Self::Applesoft => "AppleSoft BASIC",
            Self::Binary => "Binary"
        }
    }
}

/// The mapping is forgiving: anything unrecognized becomes a binary file.
impl FromStr for FileType {
    type Err = super::super::Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        match s.to_uppercase().as_str() {
            "TXT" | "T" | "ASC" => Ok(Self::Text),
            "INT" | "I" => Ok(Self::Integer),
            "APP" | "BAS" | "A" => Ok(Self::Applesoft),
            _ => Ok(Self::Binary)
        }
    }
}

/// Volume Table of Contents, the allocation sector at track 17 sector 0.
/// Field order mirrors the disk layout; the bitmap holds 4 bytes per track.
pub struct Vtoc {
    pub pad1: u8,
    pub track1: u8,
    pub sector1: u8,
    pub version: u8,
    pub pad2: [u8;2],
    pub vol: u8,
    pub pad3: [u8;32],
    pub max_pairs: u8,
    pub pad4: [u8;8],
    pub last_track: u8,
    pub last_direction: u8,
    pub pad5: [u8;2],
    pub tracks: u8,
    pub sectors: u8,
    pub bytes: [u8;2],
    pub bitmap: [u8;200]
}

impl DiskStruct for Vtoc {
    fn new() -> Self {
        Self {
            pad1: 0,
            track1: 0,
            sector1: 0,
            version: 0,
            pad2: [0;2],
            vol: 0,
            pad3: [0;32],
            max_pairs: 0,
            pad4: [0;8],
            last_track: 0,
            last_direction: 0,
            pad5: [0;2],
            tracks: 0,
            sectors: 0,
            bytes: [0;2],
            bitmap: [0;200]
        }
    }
    fn from_bytes(dat: &[u8]) -> Result<Self,DiskStructError> {
        let mut ans = Self::new();
        ans.update_from_bytes(dat)?;
        Ok(ans)
    }
    fn update_from_bytes(&mut self,dat: &[u8]) -> Result<(),DiskStructError> {
        if dat.len()<256 {
            return Err(DiskStructError::OutOfData);
        }
        self.pad1 = dat[0x00];
        self.track1 = dat[0x01];
        self.sector1 = dat[0x02];
        self.version = dat[0x03];
        self.pad2.copy_from_slice(&dat[0x04..0x06]);
        self.vol = dat[0x06];
        self.pad3.copy_from_slice(&dat[0x07..0x27]);
        self.max_pairs = dat[0x27];
        self.pad4.copy_from_slice(&dat[0x28..0x30]);
        self.last_track = dat[0x30];
        self.last_direction = dat[0x31];
        self.pad5.copy_from_slice(&dat[0x32..0x34]);
        self.tracks = dat[0x34];
        self.sectors = dat[0x35];
        self.bytes.copy_from_slice(&dat[0x36..0x38]);
        self.bitmap.copy_from_slice(&dat[0x38..0x100]);
        Ok(())
    }
    fn to_bytes(&self) -> Vec<u8> {
        let mut ans: Vec<u8> = Vec::new();
        ans.push(self.pad1);
        ans.push(self.track1);
        ans.push(self.sector1);
        ans.push(self.version);
        ans.append(&mut self.pad2.to_vec());
        ans.push(self.vol);
        ans.append(&mut self.pad3.to_vec());
        ans.push(self.max_pairs);
        ans.append(&mut self.pad4.to_vec());
        ans.push(self.last_track);
        ans.push(self.last_direction);
        ans.append(&mut self.pad5.to_vec());
        ans.push(self.tracks);
        ans.push(self.sectors);
        ans.append(&mut self.bytes.to_vec());
        ans.append(&mut self.bitmap.to_vec());
        return ans;
    }
    fn len(&self) -> usize {
        return 256;
    }
}

/// One of the seven 35 byte file descriptions in a catalog sector.
/// Track byte 0x00 means never used, 0xFF means deleted; a deleted entry
/// stashes its original track in the last byte of the name field.
#[derive(Clone,Copy)]
pub struct DirEntry {
    pub tsl_track: u8,
    pub tsl_sector: u8,
    pub file_type: u8,
    pub name: [u8;30],
    pub sectors: [u8;2]
}

impl DiskStruct for DirEntry {
    fn new() -> Self {
        Self {
            tsl_track: 0,
            tsl_sector: 0,
            file_type: 0,
            name: [0xa0;30],
            sectors: [0;2]
        }
    }
    fn from_bytes(dat: &[u8]) -> Result<Self,DiskStructError> {
        let mut ans = Self::new();
        ans.update_from_bytes(dat)?;
        Ok(ans)
    }
    fn update_from_bytes(&mut self,dat: &[u8]) -> Result<(),DiskStructError> {
        if dat.len()<35 {
            return Err(DiskStructError::OutOfData);
        }
        self.tsl_track = dat[0];
        self.tsl_sector = dat[1];
        self.file_type = dat[2];
        self.name.copy_from_slice(&dat[3..33]);
        self.sectors.copy_from_slice(&dat[33..35]);
        Ok(())
    }
    fn to_bytes(&self) -> Vec<u8> {
        let mut ans: Vec<u8> = Vec::new();
        ans.push(self.tsl_track);
        ans.push(self.tsl_sector);
        ans.push(self.file_type);
        ans.append(&mut self.name.to_vec());
        ans.append(&mut self.sectors.to_vec());
        return ans;
    }
    fn len(&self) -> usize {
        return 35;
    }
}

impl DirEntry {
    pub fn is_live(&self) -> bool {
        self.tsl_track>0 && self.tsl_track<255
    }
    pub fn is_free(&self) -> bool {
        self.tsl_track==0 || self.tsl_track==255
    }
    pub fn is_locked(&self) -> bool {
        self.file_type > 127
    }
    pub fn base_type(&self) -> Option<FileType> {
        FileType::from_u8(self.file_type & 0x7f)
    }
}

/// One sector of the catalog chain at track 17.
pub struct DirectorySector {
    pub pad1: u8,
    pub next_track: u8,
    pub next_sector: u8,
    pub pad2: [u8;8],
    pub entries: [DirEntry;7]
}

impl DiskStruct for DirectorySector {
    fn new() -> Self {
        Self {
            pad1: 0,
            next_track: 0,
            next_sector: 0,
            pad2: [0;8],
            entries: [DirEntry::new();7]
        }
    }
    fn from_bytes(dat: &[u8]) -> Result<Self,DiskStructError> {
        let mut ans = Self::new();
        ans.update_from_bytes(dat)?;
        Ok(ans)
    }
    fn update_from_bytes(&mut self,dat: &[u8]) -> Result<(),DiskStructError> {
        if dat.len()<256 {
            return Err(DiskStructError::OutOfData);
        }
        self.pad1 = dat[0];
        self.next_track = dat[1];
        self.next_sector = dat[2];
        self.pad2.copy_from_slice(&dat[3..11]);
        let mut offset = 11;
        for i in 0..ENTRIES_PER_SECTOR {
            self.entries[i].update_from_bytes(&dat[offset..offset+35])?;
            offset += 35;
        }
        Ok(())
    }
    fn to_bytes(&self) -> Vec<u8> {
        let mut ans: Vec<u8> = Vec::new();
        ans.push(self.pad1);
        ans.push(self.next_track);
        ans.push(self.next_sector);
        ans.append(&mut self.pad2.to_vec());
        for i in 0..ENTRIES_PER_SECTOR {
            ans.append(&mut self.entries[i].to_bytes());
        }
        return ans;
    }
    fn len(&self) -> usize {
        return 256;
    }
}

/// One sector of a track/sector list, holding up to 122 data sector pairs.
pub struct TrackSectorList {
    pub pad1: u8,
    pub next_track: u8,
    pub next_sector: u8,
    pub pad2: [u8;2],
    pub sector_base: [u8;2],
    pub pad3: [u8;5],
    pub pairs: [u8;244]
}

impl DiskStruct for TrackSectorList {
    fn new() -> Self {
        Self {
            pad1: 0,
            next_track: 0,
            next_sector: 0,
            pad2: [0;2],
            sector_base: [0;2],
            pad3: [0;5],
            pairs: [0;244]
        }
    }
    fn from_bytes(dat: &[u8]) -> Result<Self,DiskStructError> {
        let mut ans = Self::new();
        ans.update_from_bytes(dat)?;
        Ok(ans)
    }
    fn update_from_bytes(&mut self,dat: &[u8]) -> Result<(),DiskStructError> {
        if dat.len()<256 {
            return Err(DiskStructError::OutOfData);
        }
        self.pad1 = dat[0];
        self.next_track = dat[1];
        self.next_sector = dat[2];
        self.pad2.copy_from_slice(&dat[3..5]);
        self.sector_base.copy_from_slice(&dat[5..7]);
        self.pad3.copy_from_slice(&dat[7..12]);
        self.pairs.copy_from_slice(&dat[12..256]);
        Ok(())
    }
    fn to_bytes(&self) -> Vec<u8> {
        let mut ans: Vec<u8> = Vec::new();
        ans.push(self.pad1);
        ans.push(self.next_track);
        ans.push(self.next_sector);
        ans.append(&mut self.pad2.to_vec());
        ans.append(&mut self.sector_base.to_vec());
        ans.append(&mut self.pad3.to_vec());
        ans.append(&mut self.pairs.to_vec());
        return ans;
    }
    fn len(&self) -> usize {
        return 256;
    }
}

/// Header prepended to a binary file: load address and length words.
pub struct BinaryData {
    pub start: [u8;2],
    pub length: [u8;2],
    pub data: Vec<u8>
}

impl BinaryData {
    /// Take unstructured bytes representing the data only and pack it into the structure
    pub fn pack(bin: &[u8],addr: u16) -> Self {
        Self {
            start: u16::to_le_bytes(addr),
            length: u16::to_le_bytes(bin.len() as u16),
            data: bin.to_vec()
        }
    }
}

impl DiskStruct for BinaryData {
    fn new() -> Self {
        Self {
            start: [0;2],
            length: [0;2],
            data: Vec::new()
        }
    }
    fn from_bytes(dat: &[u8]) -> Result<Self,DiskStructError> {
        if dat.len()<4 {
            return Err(DiskStructError::OutOfData);
        }
        let end_byte = u16::from_le_bytes([dat[2],dat[3]]) as usize + 4;
        // equality is not required because there is sector padding
        if end_byte > dat.len() {
            return Err(DiskStructError::OutOfData);
        }
        Ok(Self {
            start: [dat[0],dat[1]],
            length: [dat[2],dat[3]],
            data: dat[4..end_byte].to_vec()
        })
    }
    fn update_from_bytes(&mut self,dat: &[u8]) -> Result<(),DiskStructError> {
        let temp = BinaryData::from_bytes(dat)?;
        self.start = temp.start;
        self.length = temp.length;
        self.data = temp.data;
        Ok(())
    }
    fn to_bytes(&self) -> Vec<u8> {
        let mut ans: Vec<u8> = Vec::new();
        ans.append(&mut self.start.to_vec());
        ans.append(&mut self.length.to_vec());
        ans.append(&mut self.data.clone());
        return ans;
    }
    fn len(&self) -> usize {
        return 4 + self.data.len();
    }
}

/// Header prepended to a BASIC program: a length word.  Works for either
/// Applesoft or Integer.
pub struct TokenizedProgram {
    pub length: [u8;2],
    pub program: Vec<u8>
}

impl TokenizedProgram {
    /// Take the token stream sans header and pack it into the structure
    pub fn pack(prog: &[u8]) -> Self {
        Self {
            length: u16::to_le_bytes(prog.len() as u16),
            program: prog.to_vec()
        }
    }
}

impl DiskStruct for TokenizedProgram {
    fn new() -> Self {
        Self {
            length: [0;2],
            program: Vec::new()
        }
    }
    fn from_bytes(dat: &[u8]) -> Result<Self,DiskStructError> {
        if dat.len()<2 {
            return Err(DiskStructError::OutOfData);
        }
        let end_byte = u16::from_le_bytes([dat[0],dat[1]]) as usize + 2;
        if end_byte > dat.len() {
            return Err(DiskStructError::OutOfData);
        }
        Ok(Self {
            length: [dat[0],dat[1]],
            program: dat[2..end_byte].to_vec()
        })
    }
    fn update_from_bytes(&mut self,dat: &[u8]) -> Result<(),DiskStructError> {
        let temp = TokenizedProgram::from_bytes(dat)?;
        self.length = temp.length;
        self.program = temp.program;
        Ok(())
    }
    fn to_bytes(&self) -> Vec<u8> {
        let mut ans: Vec<u8> = Vec::new();
        ans.append(&mut self.length.to_vec());
        ans.append(&mut self.program.clone());
        return ans;
    }
    fn len(&self) -> usize {
        return 2 + self.program.len();
    }
}

/// DOS file names are negative ASCII padded with negative spaces.
pub fn file_name_to_string(fname: [u8;30]) -> String {
    let positive: Vec<u8> = fname.iter().map(|b| b & 0x7f).collect();
    String::from_utf8_lossy(&positive).trim_end().to_string()
}

pub fn string_to_file_name(s: &str) -> [u8;30] {
    let mut ans: [u8;30] = [0xa0;30]; // fill with negative spaces
    let mut i = 0;
    for byte in s.to_uppercase().bytes() {
        if i>=30 {
            break;
        }
        if byte<128 {
            ans[i] = byte | 0x80;
        }
        i += 1;
    }
    return ans;
}
