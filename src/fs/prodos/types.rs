use num_derive::FromPrimitive;
use std::str::FromStr;

pub const BLOCK_SIZE: usize = 512;
pub const VOL_KEY_BLOCK: u16 = 2;
pub const ENTRY_SIZE: usize = 0x27;
pub const ENTRIES_PER_BLOCK: usize = 13;
pub const MAX_DIRECTORY_REPS: usize = 100;
/// read+write+rename+destroy+backup
pub const ACCESS_UNLOCKED: u8 = 0xe3;
/// read only
pub const ACCESS_LOCKED: u8 = 0x01;

/// Map file type codes to strings for display
pub const TYPE_MAP_DISP: [(u8,&str);12] = [
    (0x00, "???"),
    (0x01, "BAD"),
    (0x02, "PCD"),
    (0x03, "PTX"),
    (0x04, "TXT"),
    (0x05, "PDA"),
    (0x06, "BIN"),
    (0x0f, "DIR"),
    (0xfa, "INT"),
    (0xfc, "BAS"),
    (0xfe, "REL"),
    (0xff, "SYS")
];

/// Enumerates a subset of ProDOS file types, available conversions are:
/// * FileType to u8: `as u8`
/// * u8 to FileType: `FromPrimitive::from_u8`
/// * &str to FileType: `FileType::from_str`, str is the extract extension
#[derive(FromPrimitive,PartialEq,Clone,Copy)]
pub enum FileType {
    None = 0x00,
    Text = 0x04,
    Binary = 0x06,
    Directory = 0x0f,
    IntegerCode = 0xfa,
    ApplesoftCode = 0xfc,
    System = 0xff
}

/// The mapping is forgiving: anything unrecognized becomes a binary file.
impl FromStr for FileType {
    type Err = super::super::Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        match s.to_uppercase().as_str() {
            "TXT" | "T" | "ASC" => Ok(Self::Text),
            "INT" | "I" => Ok(Self::IntegerCode),
            "APP" | "BAS" | "A" => Ok(Self::ApplesoftCode),
            "SYS" | "SYSTEM" => Ok(Self::System),
            _ => Ok(Self::Binary)
        }
    }
}

#[derive(Clone,Copy,FromPrimitive,PartialEq)]
pub enum StorageType {
    Inactive = 0x00,
    Seedling = 0x01,
    Sapling = 0x02,
    Tree = 0x03,
    SubDirEntry = 0x0d,
    SubDirHeader = 0x0e,
    VolDirHeader = 0x0f
}

#[derive(Clone,Copy,FromPrimitive)]
pub enum Access {
    Read = 0x01,
    Write = 0x02,
    Backup = 0x20,
    Rename = 0x40,
    Destroy = 0x80
}

/// Convenience for locating an entry in a directory.
/// `idx` mirrors the internal indexing, which starts at 2 in a key block,
/// and 1 in an entry block.
#[derive(Clone,Copy)]
pub struct EntryLocation {
    pub block: u16,
    pub idx: usize
}
