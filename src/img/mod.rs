//! # Disk Image Module
//!
//! This owns the raw bytes of a disk image and serves as the underlying
//! storage for the file system drivers.  The image knows its format and
//! sector order, and exposes two views of the data:
//!
//! * track/sector: 256 byte sectors addressed as `(track,sector)`
//! * block: 512 byte blocks addressed by a single index
//!
//! A view that is not meaningful for the format (blocks on a 13 sector
//! disk, tracks on 3.5 inch media) returns `UnsupportedView`.
//!
//! ## Sector Skews
//!
//! DOS and ProDOS order the sectors of a 16 sector track differently.
//! Both views work on either ordering by applying the permutation in
//! `DOS_PRODOS_SKEW`, which maps a ProDOS-logical sector index to the
//! DOS-logical index at the same physical position (the table is its own
//! inverse).  ProDOS block `b` lives on track `b/8`, with its two halves
//! at ProDOS-logical sectors `2*(b%8)` and `2*(b%8)+1`.
//!
//! Nibblized images carry no decoded sector data; sector access is
//! delegated to an externally supplied `Nibbler`.

use std::fmt;
use log::debug;
use crate::{STDRESULT,DYNERR};

pub const SECTOR_SIZE: usize = 256;
pub const BLOCK_SIZE: usize = 512;
pub const NIB_TRACK_SIZE: usize = 6656;

/// ProDOS-logical to DOS-logical sector permutation, an involution.
pub const DOS_PRODOS_SKEW: [usize;16] = [0,14,13,12,11,10,9,8,7,6,5,4,3,2,1,15];

/// Enumerates disk image errors.  The `Display` trait will print the long message.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("image format could not be recognized")]
    UnrecognizedFormat,
    #[error("image size did not match any known layout")]
    ImageSizeMismatch,
    #[error("track or sector request out of range")]
    SectorAccess,
    #[error("block request out of range")]
    BlockAccess,
    #[error("image format does not support this view")]
    UnsupportedView,
    #[error("nibble codec not available")]
    NibbleDecode
}

/// Decodes and encodes raw GCR nibble streams.  The workbench consumes
/// this capability but does not provide an implementation.
pub trait Nibbler {
    /// Decode one 256 byte sector out of a nibblized track buffer.
    fn decode_sector(&self,track_buf: &[u8],track: usize,sector: usize) -> Result<Vec<u8>,DYNERR>;
    /// Encode one 256 byte sector into a nibblized track buffer.
    fn encode_sector(&self,track_buf: &mut [u8],track: usize,sector: usize,dat: &[u8]) -> STDRESULT;
}

/// The physical-to-logical permutation applied when reading a sector.
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum SectorOrder {
    Do,
    Po,
    Nib
}

impl fmt::Display for SectorOrder {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Do => write!(f,"DOS sector order"),
            Self::Po => write!(f,"ProDOS block order"),
            Self::Nib => write!(f,"nibblized")
        }
    }
}

/// Classification of an image by file system family and capacity.
/// Carries the per-format geometry.
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum DiskFormat {
    Dos13,
    Dos16,
    ProDos140,
    ProDos400,
    ProDos800,
    ProDosCustom(u16),
    Pascal,
    Nib
}

impl DiskFormat {
    pub fn byte_capacity(&self) -> usize {
        match self {
            Self::Dos13 => 35*13*SECTOR_SIZE,
            Self::Dos16 | Self::ProDos140 | Self::Pascal => 35*16*SECTOR_SIZE,
            Self::ProDos400 => 800*BLOCK_SIZE,
            Self::ProDos800 => 1600*BLOCK_SIZE,
            Self::ProDosCustom(blocks) => *blocks as usize*BLOCK_SIZE,
            Self::Nib => 35*NIB_TRACK_SIZE
        }
    }
    /// Track count for formats with a track/sector view, otherwise 0.
    pub fn track_count(&self) -> usize {
        match self {
            Self::Dos13 | Self::Dos16 | Self::ProDos140 | Self::Pascal | Self::Nib => 35,
            _ => 0
        }
    }
    pub fn sectors_per_track(&self) -> usize {
        match self {
            Self::Dos13 => 13,
            Self::Dos16 | Self::ProDos140 | Self::Pascal | Self::Nib => 16,
            _ => 0
        }
    }
    /// Block count for formats with a block view, otherwise 0.
    pub fn block_count(&self) -> usize {
        match self {
            Self::Dos16 | Self::ProDos140 | Self::Pascal => 280,
            Self::ProDos400 => 800,
            Self::ProDos800 => 1600,
            Self::ProDosCustom(blocks) => *blocks as usize,
            _ => 0
        }
    }
    pub fn is_prodos(&self) -> bool {
        matches!(self,Self::ProDos140 | Self::ProDos400 | Self::ProDos800 | Self::ProDosCustom(_))
    }
    pub fn is_dos(&self) -> bool {
        matches!(self,Self::Dos13 | Self::Dos16)
    }
}

impl fmt::Display for DiskFormat {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dos13 => write!(f,"Apple DOS 13 sector"),
            Self::Dos16 => write!(f,"Apple DOS 16 sector"),
            Self::ProDos140 => write!(f,"ProDOS 140K"),
            Self::ProDos400 => write!(f,"ProDOS 400K"),
            Self::ProDos800 => write!(f,"ProDOS 800K"),
            Self::ProDosCustom(blocks) => write!(f,"ProDOS {} blocks",blocks),
            Self::Pascal => write!(f,"Apple Pascal"),
            Self::Nib => write!(f,"nibblized 5.25 inch")
        }
    }
}

/// Owner of the raw bytes of one mounted image.  The buffer *is* the
/// state; every read goes back to the buffer, and mutations are permanent
/// only when the shell's save step writes the buffer out.
pub struct Img {
    format: DiskFormat,
    order: SectorOrder,
    data: Vec<u8>,
    nibbler: Option<Box<dyn Nibbler>>
}

impl Img {
    /// Wrap existing bytes.  The caller vouches that `format` and `order`
    /// describe the buffer; use `detect` to classify unknown bytes.
    pub fn new(format: DiskFormat,order: SectorOrder,data: Vec<u8>) -> Self {
        Self {
            format,
            order,
            data,
            nibbler: None
        }
    }
    /// Create a zero filled image of the format's natural capacity and order.
    pub fn blank(format: DiskFormat) -> Self {
        let order = match format {
            DiskFormat::Dos13 | DiskFormat::Dos16 => SectorOrder::Do,
            DiskFormat::Nib => SectorOrder::Nib,
            _ => SectorOrder::Po
        };
        Self::new(format,order,vec![0;format.byte_capacity()])
    }
    pub fn set_nibbler(&mut self,nibbler: Box<dyn Nibbler>) {
        self.nibbler = Some(nibbler);
    }
    pub fn format(&self) -> DiskFormat {
        self.format
    }
    pub fn order(&self) -> SectorOrder {
        self.order
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn raw(&self) -> &[u8] {
        &self.data
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }
    /// Byte offset of a 256 byte sector within the buffer, accounting for
    /// the image's sector order.
    fn sector_offset(&self,track: usize,sector: usize) -> Result<usize,DYNERR> {
        let tracks = self.format.track_count();
        let spt = self.format.sectors_per_track();
        if tracks==0 {
            return Err(Box::new(Error::UnsupportedView));
        }
        if track>=tracks || sector>=spt {
            return Err(Box::new(Error::SectorAccess));
        }
        match self.order {
            SectorOrder::Do => Ok(track*spt*SECTOR_SIZE + sector*SECTOR_SIZE),
            SectorOrder::Po => match spt {
                16 => Ok(track*spt*SECTOR_SIZE + DOS_PRODOS_SKEW[sector]*SECTOR_SIZE),
                _ => Err(Box::new(Error::UnsupportedView))
            },
            SectorOrder::Nib => Err(Box::new(Error::UnsupportedView))
        }
    }
    pub fn read_track_sector(&self,track: usize,sector: usize) -> Result<Vec<u8>,DYNERR> {
        if self.order==SectorOrder::Nib {
            if track>=self.format.track_count() || sector>=self.format.sectors_per_track() {
                return Err(Box::new(Error::SectorAccess));
            }
            return match &self.nibbler {
                Some(nib) => {
                    let beg = track*NIB_TRACK_SIZE;
                    nib.decode_sector(&self.data[beg..beg+NIB_TRACK_SIZE],track,sector)
                },
                None => Err(Box::new(Error::NibbleDecode))
            };
        }
        let offset = self.sector_offset(track,sector)?;
        Ok(self.data[offset..offset+SECTOR_SIZE].to_vec())
    }
    /// Write up to 256 bytes into a sector; trailing bytes are unaffected
    /// when `dat` is short.
    pub fn write_track_sector(&mut self,track: usize,sector: usize,dat: &[u8]) -> STDRESULT {
        if self.order==SectorOrder::Nib {
            if track>=self.format.track_count() || sector>=self.format.sectors_per_track() {
                return Err(Box::new(Error::SectorAccess));
            }
            let beg = track*NIB_TRACK_SIZE;
            let mut buf = self.data[beg..beg+NIB_TRACK_SIZE].to_vec();
            return match &self.nibbler {
                Some(nib) => {
                    nib.encode_sector(&mut buf,track,sector,dat)?;
                    self.data[beg..beg+NIB_TRACK_SIZE].copy_from_slice(&buf);
                    Ok(())
                },
                None => Err(Box::new(Error::NibbleDecode))
            };
        }
        let offset = self.sector_offset(track,sector)?;
        let actual_len = usize::min(dat.len(),SECTOR_SIZE);
        self.data[offset..offset+actual_len].copy_from_slice(&dat[0..actual_len]);
        Ok(())
    }
    pub fn read_block(&self,block: usize) -> Result<Vec<u8>,DYNERR> {
        let count = self.format.block_count();
        if count==0 {
            return Err(Box::new(Error::UnsupportedView));
        }
        if block>=count {
            return Err(Box::new(Error::BlockAccess));
        }
        match self.order {
            SectorOrder::Po => {
                let offset = block*BLOCK_SIZE;
                Ok(self.data[offset..offset+BLOCK_SIZE].to_vec())
            },
            SectorOrder::Do => {
                let track = block/8;
                let mut ans = Vec::new();
                for half in 0..2 {
                    let sec = DOS_PRODOS_SKEW[2*(block%8)+half];
                    ans.append(&mut self.read_track_sector(track,sec)?);
                }
                Ok(ans)
            },
            SectorOrder::Nib => Err(Box::new(Error::UnsupportedView))
        }
    }
    /// Write up to 512 bytes into a block; trailing bytes are unaffected
    /// when `dat` is short.
    pub fn write_block(&mut self,block: usize,dat: &[u8]) -> STDRESULT {
        let count = self.format.block_count();
        if count==0 {
            return Err(Box::new(Error::UnsupportedView));
        }
        if block>=count {
            return Err(Box::new(Error::BlockAccess));
        }
        match self.order {
            SectorOrder::Po => {
                let offset = block*BLOCK_SIZE;
                let actual_len = usize::min(dat.len(),BLOCK_SIZE);
                self.data[offset..offset+actual_len].copy_from_slice(&dat[0..actual_len]);
                Ok(())
            },
            SectorOrder::Do => {
                let track = block/8;
                let padded = quantize(dat,BLOCK_SIZE);
                for half in 0..2 {
                    let sec = DOS_PRODOS_SKEW[2*(block%8)+half];
                    self.write_track_sector(track,sec,&padded[half*SECTOR_SIZE..(half+1)*SECTOR_SIZE])?;
                }
                Ok(())
            },
            SectorOrder::Nib => Err(Box::new(Error::UnsupportedView))
        }
    }
}

/// If a data source is smaller than `quantum` bytes, pad it with zeros.
/// If it is larger, do not include the extra bytes.
pub fn quantize(src: &[u8],quantum: usize) -> Vec<u8> {
    let mut padded: Vec<u8> = Vec::new();
    for i in 0..quantum {
        if i<src.len() {
            padded.push(src[i]);
        } else {
            padded.push(0);
        }
    }
    return padded;
}

/// Test a candidate for a DOS 3.x VTOC at track 17 sector 0.
fn probe_dos(img: &Img,sectors: u8) -> bool {
    if let Ok(vtoc) = img.read_track_sector(17,0) {
        if vtoc[0x01]!=17 || vtoc[0x02]!=sectors-1 {
            debug!("VTOC wrong catalog track {}, sector {}",vtoc[0x01],vtoc[0x02]);
            return false;
        }
        if vtoc[0x06]<1 || vtoc[0x06]==255 {
            debug!("VTOC volume {} out of range",vtoc[0x06]);
            return false;
        }
        if vtoc[0x34]!=35 || vtoc[0x35]!=sectors || vtoc[0x36..0x38]!=[0,1] {
            debug!("VTOC wrong geometry {} x {}",vtoc[0x34],vtoc[0x35]);
            return false;
        }
        return true;
    }
    return false;
}

/// Test a candidate for a ProDOS volume directory key at block 2.
fn probe_prodos(img: &Img) -> bool {
    if let Ok(key) = img.read_block(2) {
        let name_len = key[0x04] & 0x0f;
        if key[0x00..0x02]!=[0,0] || (key[0x04] >> 4)!=0x0f || name_len<1 {
            debug!("unexpected volume header links or name length");
            return false;
        }
        if key[0x23]!=0x27 || key[0x24]!=0x0d {
            debug!("unexpected entry length bytes {}, {}",key[0x23],key[0x24]);
            return false;
        }
        let total = u16::from_le_bytes([key[0x29],key[0x2a]]) as usize;
        if total!=img.format().block_count() {
            debug!("volume header block count {} does not match capacity",total);
            return false;
        }
        return true;
    }
    return false;
}

/// Test a candidate for a Pascal volume directory at block 2.
fn probe_pascal(img: &Img) -> bool {
    if let Ok(dir) = img.read_block(2) {
        let beg = u16::from_le_bytes([dir[0],dir[1]]);
        let end = u16::from_le_bytes([dir[2],dir[3]]);
        let ftype = u16::from_le_bytes([dir[4],dir[5]]);
        let name_len = dir[6];
        if beg!=0 || end<=2 || end as usize>img.format().block_count() {
            debug!("bad directory span {}..{}",beg,end);
            return false;
        }
        if ftype!=0 || name_len<1 || name_len>7 {
            debug!("bad volume header type {} or name length {}",ftype,name_len);
            return false;
        }
        let total = u16::from_le_bytes([dir[14],dir[15]]) as usize;
        if total!=img.format().block_count() {
            debug!("volume header block count {} does not match capacity",total);
            return false;
        }
        return true;
    }
    return false;
}

/// Classify raw image bytes into a format and sector order.
/// The extension hint chooses which order is probed first; a failed probe
/// always falls through.  Tie break preference is ProDOS > Pascal > DOS.
pub fn detect(dsk: &[u8],maybe_ext: Option<&str>) -> Result<(DiskFormat,SectorOrder),DYNERR> {
    let ext = match maybe_ext {
        Some(s) => s.to_lowercase(),
        None => String::new()
    };
    let orders: [SectorOrder;2] = match ext.as_str() {
        "po" => [SectorOrder::Po,SectorOrder::Do],
        _ => [SectorOrder::Do,SectorOrder::Po]
    };
    match dsk.len() {
        len if len==DiskFormat::Dos13.byte_capacity() => {
            let img = Img::new(DiskFormat::Dos13,SectorOrder::Do,dsk.to_vec());
            if probe_dos(&img,13) {
                return Ok((DiskFormat::Dos13,SectorOrder::Do));
            }
        },
        len if len==DiskFormat::Dos16.byte_capacity() => {
            for order in orders {
                let img = Img::new(DiskFormat::ProDos140,order,dsk.to_vec());
                if probe_prodos(&img) {
                    return Ok((DiskFormat::ProDos140,order));
                }
            }
            for order in orders {
                let img = Img::new(DiskFormat::Pascal,order,dsk.to_vec());
                if probe_pascal(&img) {
                    return Ok((DiskFormat::Pascal,order));
                }
            }
            for order in orders {
                let img = Img::new(DiskFormat::Dos16,order,dsk.to_vec());
                if probe_dos(&img,16) {
                    return Ok((DiskFormat::Dos16,order));
                }
            }
        },
        len if len==DiskFormat::ProDos400.byte_capacity() => {
            let img = Img::new(DiskFormat::ProDos400,SectorOrder::Po,dsk.to_vec());
            if probe_prodos(&img) {
                return Ok((DiskFormat::ProDos400,SectorOrder::Po));
            }
        },
        len if len==DiskFormat::ProDos800.byte_capacity() => {
            let img = Img::new(DiskFormat::ProDos800,SectorOrder::Po,dsk.to_vec());
            if probe_prodos(&img) {
                return Ok((DiskFormat::ProDos800,SectorOrder::Po));
            }
        },
        len if len==DiskFormat::Nib.byte_capacity() => {
            return Ok((DiskFormat::Nib,SectorOrder::Nib));
        },
        len if len%BLOCK_SIZE==0 && len/BLOCK_SIZE>=280 && len/BLOCK_SIZE<=65535 => {
            let blocks = (len/BLOCK_SIZE) as u16;
            let img = Img::new(DiskFormat::ProDosCustom(blocks),SectorOrder::Po,dsk.to_vec());
            if probe_prodos(&img) {
                return Ok((DiskFormat::ProDosCustom(blocks),SectorOrder::Po));
            }
        },
        _ => {
            debug!("image size {} matched no candidate set",dsk.len());
            return Err(Box::new(Error::ImageSizeMismatch));
        }
    }
    Err(Box::new(Error::UnrecognizedFormat))
}

#[test]
fn skew_is_involution() {
    for s in 0..16 {
        assert_eq!(DOS_PRODOS_SKEW[DOS_PRODOS_SKEW[s]],s);
    }
}

#[test]
fn block_views_agree() {
    // the same ProDOS volume bytes reordered between DO and PO must
    // produce identical block reads
    let mut po = vec![0;DiskFormat::ProDos140.byte_capacity()];
    for b in 0..280 {
        for i in 0..BLOCK_SIZE {
            po[b*BLOCK_SIZE+i] = ((b*7+i) % 251) as u8;
        }
    }
    let mut do_buf = vec![0;po.len()];
    let po_img = Img::new(DiskFormat::ProDos140,SectorOrder::Po,po.clone());
    // build the DO ordered buffer one DOS sector at a time
    for t in 0..35 {
        for s in 0..16 {
            let q = DOS_PRODOS_SKEW[s];
            let src = t*4096 + q*SECTOR_SIZE;
            let dst = t*4096 + s*SECTOR_SIZE;
            do_buf[dst..dst+SECTOR_SIZE].copy_from_slice(&po[src..src+SECTOR_SIZE]);
        }
    }
    let do_img = Img::new(DiskFormat::ProDos140,SectorOrder::Do,do_buf);
    for b in [0,1,7,8,100,279] {
        assert_eq!(po_img.read_block(b).unwrap(),do_img.read_block(b).unwrap());
    }
}
