//! # DOS 3.3 file system module
//!
//! This manipulates disk images containing one standard DOS 3.x volume,
//! 13 or 16 sectors per track.  The volume bitmap lives in the VTOC at
//! track 17 sector 0, and the catalog chain runs from sector 15 (or 12)
//! down to sector 1 of the same track.
//!
//! Free sectors are chosen the way DOS does it, starting beside the
//! catalog track and walking outward.

pub mod types;

use std::str::FromStr;
use log::{debug,error};

use types::*;
use super::{DiskStruct,DiskFile,Error};
use crate::img;
use crate::{STDRESULT,DYNERR};

/// The primary interface for disk operations.
pub struct Disk {
    vtoc: Vtoc,
    img: img::Img
}

impl Disk {
    /// Create a disk file system using the given image as storage.
    /// The driver takes ownership of the image.
    pub fn from_img(img: img::Img) -> Result<Self,DYNERR> {
        let buf = img.read_track_sector(VTOC_TRACK,0)?;
        Ok(Self {
            vtoc: Vtoc::from_bytes(&buf)?,
            img
        })
    }
    fn save_vtoc(&mut self) -> STDRESULT {
        self.img.write_track_sector(VTOC_TRACK,0,&self.vtoc.to_bytes())
    }
    fn get_track_map(&self,track: u8) -> u32 {
        let i = (track as usize)*4;
        let bm = &self.vtoc.bitmap;
        u32::from_be_bytes([bm[i],bm[i+1],bm[i+2],bm[i+3]])
    }
    fn save_track_map(&mut self,track: u8,map: u32) -> STDRESULT {
        let i = (track as usize)*4;
        self.vtoc.bitmap[i..i+4].copy_from_slice(&u32::to_be_bytes(map));
        self.save_vtoc()
    }
    fn allocate_sector(&mut self,track: u8,sector: u8) -> STDRESULT {
        let mut map = self.get_track_map(track);
        let eff_sec: u32 = (sector + 32 - self.vtoc.sectors) as u32;
        map &= (1 << eff_sec) ^ u32::MAX;
        self.save_track_map(track,map)
    }
    fn deallocate_sector(&mut self,track: u8,sector: u8) -> STDRESULT {
        let mut map = self.get_track_map(track);
        let eff_sec: u32 = (sector + 32 - self.vtoc.sectors) as u32;
        map |= 1 << eff_sec;
        self.save_track_map(track,map)
    }
    fn is_sector_free(&self,track: u8,sector: u8) -> bool {
        let map = self.get_track_map(track);
        let eff_sec: u32 = (sector + 32 - self.vtoc.sectors) as u32;
        (map & (1 << eff_sec)) > 0
    }
    fn num_free_sectors(&self) -> usize {
        let mut ans: usize = 0;
        for track in 0..self.vtoc.tracks {
            for sector in 0..self.vtoc.sectors {
                if self.is_sector_free(track,sector) {
                    ans += 1;
                }
            }
        }
        return ans;
    }
    /// Lowest free sector working outward from the catalog track, high
    /// sectors first within a track, the classic DOS staircase.
    fn next_free_sector(&self) -> Option<[u8;2]> {
        let cat = self.vtoc.track1 as i16;
        for delta in 1..self.vtoc.tracks as i16 {
            for track in [cat-delta,cat+delta] {
                if track<0 || track>=self.vtoc.tracks as i16 {
                    continue;
                }
                for sector in (0..self.vtoc.sectors).rev() {
                    if self.is_sector_free(track as u8,sector) {
                        return Some([track as u8,sector]);
                    }
                }
            }
        }
        None
    }
    fn update_last_track(&mut self,track: u8) -> STDRESULT {
        let cat = self.vtoc.track1;
        if track<cat {
            self.vtoc.last_direction = 255;
            self.vtoc.last_track = track;
        }
        if track>cat {
            self.vtoc.last_direction = 1;
            self.vtoc.last_track = track;
        }
        self.save_vtoc()
    }
    fn read_sector_struct<T: DiskStruct>(&self,ts: [u8;2]) -> Result<T,DYNERR> {
        let buf = self.img.read_track_sector(ts[0] as usize,ts[1] as usize)?;
        Ok(T::from_bytes(&buf)?)
    }
    /// Return the location and index of a free catalog entry slot.
    /// Never-used and deleted slots are both reclaimed.
    fn get_next_directory_slot(&self) -> Result<([u8;2],usize),DYNERR> {
        let mut ts = [self.vtoc.track1,self.vtoc.sector1];
        for _try in 0..MAX_DIRECTORY_REPS {
            let dir: DirectorySector = self.read_sector_struct(ts)?;
            for e in 0..ENTRIES_PER_SECTOR {
                if dir.entries[e].is_free() {
                    return Ok((ts,e));
                }
            }
            ts = [dir.next_track,dir.next_sector];
            if ts == [0,0] {
                return Err(Box::new(Error::NoSpace));
            }
        }
        error!("the disk image directory seems to be damaged");
        Err(Box::new(Error::IOError))
    }
    /// Scan the catalog for the named file, returning the holding sector
    /// and entry index.
    fn find_entry(&self,name: &str) -> Result<Option<([u8;2],usize)>,DYNERR> {
        let fname = string_to_file_name(name);
        let mut ts = [self.vtoc.track1,self.vtoc.sector1];
        for _try in 0..MAX_DIRECTORY_REPS {
            let dir: DirectorySector = self.read_sector_struct(ts)?;
            for e in 0..ENTRIES_PER_SECTOR {
                if dir.entries[e].is_live() && dir.entries[e].name==fname {
                    return Ok(Some((ts,e)));
                }
            }
            ts = [dir.next_track,dir.next_sector];
            if ts == [0,0] {
                return Ok(None);
            }
        }
        error!("the disk image directory seems to be damaged");
        Err(Box::new(Error::IOError))
    }
    /// Gather the data sector pairs of a file, trailing null pairs trimmed.
    fn gather_pairs(&self,entry: &DirEntry) -> Result<Vec<[u8;2]>,DYNERR> {
        let mut ans: Vec<[u8;2]> = Vec::new();
        let mut tslist_ts = [entry.tsl_track,entry.tsl_sector];
        for _try in 0..MAX_TSLIST_REPS {
            let tslist: TrackSectorList = self.read_sector_struct(tslist_ts)?;
            for p in 0..MAX_PAIRS {
                ans.push([tslist.pairs[p*2],tslist.pairs[p*2+1]]);
            }
            tslist_ts = [tslist.next_track,tslist.next_sector];
            if tslist_ts==[0,0] {
                while let Some(last) = ans.last() {
                    if *last==[0,0] {
                        ans.pop();
                    } else {
                        break;
                    }
                }
                return Ok(ans);
            }
        }
        error!("the disk image track sector list seems to be damaged");
        Err(Box::new(Error::IOError))
    }
    /// Concatenate a file's sectors, null pairs reading as zeroed holes.
    fn read_raw(&self,entry: &DirEntry) -> Result<Vec<u8>,DYNERR> {
        let mut ans: Vec<u8> = Vec::new();
        for pair in self.gather_pairs(entry)? {
            if pair==[0,0] {
                ans.append(&mut vec![0;256]);
            } else {
                ans.append(&mut self.img.read_track_sector(pair[0] as usize,pair[1] as usize)?);
            }
        }
        Ok(ans)
    }
    /// Fill in the unified catalog record from a directory entry.
    /// Light records carry no payload; `read_file` adds it.
    fn entry_to_file(&self,entry: &DirEntry) -> DiskFile {
        let mut ans = DiskFile::new(&file_name_to_string(entry.name),"");
        let sectors = u16::from_le_bytes(entry.sectors) as usize;
        match entry.base_type() {
            Some(typ) => {
                ans.ext = typ.ext().to_string();
                ans.kind = typ.kind().to_string();
            },
            None => {
                ans.ext = "BIN".to_string();
                ans.kind = format!("type ${:02X}",entry.file_type & 0x7f);
            }
        }
        ans.size = sectors*256;
        ans.blocks = sectors;
        ans.locked = entry.is_locked();
        ans
    }
    /// Create a blank volume: VTOC plus an empty catalog chain.  Track 0
    /// and the catalog track are marked used, everything else free.
    pub fn init(&mut self,vol: u8) -> STDRESULT {
        let sectors = self.img.format().sectors_per_track() as u8;
        let tracks = self.img.format().track_count() as u8;
        self.vtoc = Vtoc::new();
        self.vtoc.pad1 = match sectors {
            13 => 2,
            _ => 4
        };
        self.vtoc.track1 = VTOC_TRACK as u8;
        self.vtoc.sector1 = sectors-1;
        self.vtoc.version = match sectors {
            13 => 2,
            _ => 3
        };
        self.vtoc.vol = vol;
        self.vtoc.max_pairs = MAX_PAIRS as u8;
        self.vtoc.last_track = VTOC_TRACK as u8 + 1;
        self.vtoc.last_direction = 1;
        self.vtoc.tracks = tracks;
        self.vtoc.sectors = sectors;
        self.vtoc.bytes = [0,1];
        let all_free = match sectors {
            13 => u32::to_be_bytes(0xfff80000),
            _ => u32::to_be_bytes(0xffff0000)
        };
        for track in 1..tracks as usize {
            if track==VTOC_TRACK {
                continue;
            }
            self.vtoc.bitmap[track*4..track*4+4].copy_from_slice(&all_free);
        }
        self.save_vtoc()?;
        // write the catalog chain, high sector first
        let mut dir = DirectorySector::new();
        self.img.write_track_sector(VTOC_TRACK,1,&dir.to_bytes())?;
        for sec in 2..sectors as usize {
            dir.next_track = VTOC_TRACK as u8;
            dir.next_sector = sec as u8 - 1;
            self.img.write_track_sector(VTOC_TRACK,sec,&dir.to_bytes())?;
        }
        Ok(())
    }
    /// Total sectors on the volume.
    pub fn total_sectors(&self) -> usize {
        self.vtoc.tracks as usize * self.vtoc.sectors as usize
    }
}

impl super::DiskFS for Disk {
    fn catalog(&mut self) -> Result<Vec<DiskFile>,DYNERR> {
        let mut ans = Vec::new();
        let mut ts = [self.vtoc.track1,self.vtoc.sector1];
        for _try in 0..MAX_DIRECTORY_REPS {
            let dir: DirectorySector = self.read_sector_struct(ts)?;
            for e in 0..ENTRIES_PER_SECTOR {
                if dir.entries[e].is_live() {
                    ans.push(self.entry_to_file(&dir.entries[e]));
                }
            }
            ts = [dir.next_track,dir.next_sector];
            if ts == [0,0] {
                return Ok(ans);
            }
        }
        error!("the disk image directory seems to be damaged");
        Err(Box::new(Error::IOError))
    }
    fn read_file(&mut self,path: &str,name: &str) -> Result<DiskFile,DYNERR> {
        if path.len()>0 {
            return Err(Box::new(Error::NotDir));
        }
        let (ts,e) = match self.find_entry(name)? {
            Some(loc) => loc,
            None => return Err(Box::new(Error::NotFound))
        };
        let dir: DirectorySector = self.read_sector_struct(ts)?;
        let entry = dir.entries[e];
        let raw = self.read_raw(&entry)?;
        let mut ans = self.entry_to_file(&entry);
        match entry.base_type() {
            Some(FileType::Binary) => {
                let bin = BinaryData::from_bytes(&raw)?;
                ans.load_addr = u16::from_le_bytes(bin.start);
                ans.data = bin.data;
            },
            Some(FileType::Applesoft) => {
                let prog = TokenizedProgram::from_bytes(&raw)?;
                ans.load_addr = 0x0801;
                ans.data = prog.program;
            },
            Some(FileType::Integer) => {
                let prog = TokenizedProgram::from_bytes(&raw)?;
                ans.data = prog.program;
            },
            _ => {
                let mut txt = raw;
                while txt.last()==Some(&0) {
                    txt.pop();
                }
                ans.data = txt;
            }
        }
        ans.size = ans.data.len();
        Ok(ans)
    }
    fn write_file(&mut self,path: &str,name: &str,ext: &str,dat: &[u8],load_addr: u16) -> Result<usize,DYNERR> {
        if path.len()>0 {
            return Err(Box::new(Error::NotDir));
        }
        if name.len()>30 {
            return Err(Box::new(Error::NameTooLong));
        }
        let typ = FileType::from_str(ext)?;
        // DOS SAVE semantics, an existing unlocked file is replaced
        if let Some((ts,e)) = self.find_entry(name)? {
            let dir: DirectorySector = self.read_sector_struct(ts)?;
            if dir.entries[e].is_locked() {
                return Err(Box::new(Error::PermissionLocked));
            }
            self.delete(path,name)?;
        }
        let payload = match typ {
            FileType::Binary => BinaryData::pack(dat,load_addr).to_bytes(),
            FileType::Applesoft | FileType::Integer => TokenizedProgram::pack(dat).to_bytes(),
            FileType::Text => dat.to_vec()
        };
        let data_sectors = usize::max(1,(payload.len()+255)/256);
        let tslist_sectors = 1 + (data_sectors-1)/MAX_PAIRS;
        if data_sectors + tslist_sectors > self.num_free_sectors() {
            return Err(Box::new(Error::NoSpace));
        }
        let (dir_ts,e) = self.get_next_directory_slot()?;
        let mut tslist_ts = match self.next_free_sector() {
            Some(ts) => ts,
            None => return Err(Box::new(Error::NoSpace))
        };
        self.allocate_sector(tslist_ts[0],tslist_ts[1])?;
        // write the directory entry
        let mut dir: DirectorySector = self.read_sector_struct(dir_ts)?;
        dir.entries[e].tsl_track = tslist_ts[0];
        dir.entries[e].tsl_sector = tslist_ts[1];
        dir.entries[e].file_type = typ as u8;
        dir.entries[e].name = string_to_file_name(name);
        dir.entries[e].sectors = u16::to_le_bytes((data_sectors + tslist_sectors) as u16);
        self.img.write_track_sector(dir_ts[0] as usize,dir_ts[1] as usize,&dir.to_bytes())?;
        // write the data and T/S list as we go
        let mut tslist = TrackSectorList::new();
        let mut sec_base = 0;
        let mut p = 0;
        for s in 0..data_sectors {
            let data_ts = match self.next_free_sector() {
                Some(ts) => ts,
                None => return Err(Box::new(Error::NoSpace))
            };
            tslist.pairs[p*2] = data_ts[0];
            tslist.pairs[p*2+1] = data_ts[1];
            self.img.write_track_sector(tslist_ts[0] as usize,tslist_ts[1] as usize,&tslist.to_bytes())?;
            let chunk = img::quantize(&payload[usize::min(s*256,payload.len())..usize::min((s+1)*256,payload.len())],256);
            self.img.write_track_sector(data_ts[0] as usize,data_ts[1] as usize,&chunk)?;
            self.allocate_sector(data_ts[0],data_ts[1])?;
            self.update_last_track(data_ts[0])?;
            p += 1;
            if p==MAX_PAIRS && s+1!=data_sectors {
                // T/S list spilled over to another sector
                let next_tslist_ts = match self.next_free_sector() {
                    Some(ts) => ts,
                    None => return Err(Box::new(Error::NoSpace))
                };
                self.allocate_sector(next_tslist_ts[0],next_tslist_ts[1])?;
                tslist.next_track = next_tslist_ts[0];
                tslist.next_sector = next_tslist_ts[1];
                self.img.write_track_sector(tslist_ts[0] as usize,tslist_ts[1] as usize,&tslist.to_bytes())?;
                tslist_ts = next_tslist_ts;
                sec_base += MAX_PAIRS;
                tslist = TrackSectorList::new();
                tslist.sector_base = u16::to_le_bytes(sec_base as u16);
                p = 0;
            }
        }
        Ok(data_sectors + tslist_sectors)
    }
    fn delete(&mut self,path: &str,name: &str) -> STDRESULT {
        if path.len()>0 {
            return Err(Box::new(Error::NotDir));
        }
        let (ts,e) = match self.find_entry(name)? {
            Some(loc) => loc,
            None => return Err(Box::new(Error::NotFound))
        };
        let mut dir: DirectorySector = self.read_sector_struct(ts)?;
        if dir.entries[e].is_locked() {
            return Err(Box::new(Error::PermissionLocked));
        }
        // free the data and T/S list sectors, data is not zeroed
        let mut tslist_ts = [dir.entries[e].tsl_track,dir.entries[e].tsl_sector];
        for _try in 0..MAX_TSLIST_REPS {
            let tslist: TrackSectorList = self.read_sector_struct(tslist_ts)?;
            for p in 0..MAX_PAIRS {
                if tslist.pairs[p*2]>0 && tslist.pairs[p*2]<255 {
                    self.deallocate_sector(tslist.pairs[p*2],tslist.pairs[p*2+1])?;
                }
            }
            self.deallocate_sector(tslist_ts[0],tslist_ts[1])?;
            tslist_ts = [tslist.next_track,tslist.next_sector];
            if tslist_ts==[0,0] {
                // mark deleted, stashing the track byte in the name tail
                let n = dir.entries[e].name.len();
                dir.entries[e].name[n-1] = dir.entries[e].tsl_track;
                dir.entries[e].tsl_track = 255;
                return self.img.write_track_sector(ts[0] as usize,ts[1] as usize,&dir.to_bytes());
            }
        }
        error!("the disk image track sector list seems to be damaged");
        Err(Box::new(Error::IOError))
    }
    fn set_locked(&mut self,path: &str,name: &str,locked: bool) -> STDRESULT {
        if path.len()>0 {
            return Err(Box::new(Error::NotDir));
        }
        let (ts,e) = match self.find_entry(name)? {
            Some(loc) => loc,
            None => return Err(Box::new(Error::NotFound))
        };
        let mut dir: DirectorySector = self.read_sector_struct(ts)?;
        dir.entries[e].file_type = match locked {
            true => dir.entries[e].file_type | 0x80,
            false => dir.entries[e].file_type & 0x7f
        };
        self.img.write_track_sector(ts[0] as usize,ts[1] as usize,&dir.to_bytes())
    }
    fn rename(&mut self,path: &str,old_name: &str,new_name: &str) -> STDRESULT {
        if path.len()>0 {
            return Err(Box::new(Error::NotDir));
        }
        if new_name.len()>30 {
            return Err(Box::new(Error::NameTooLong));
        }
        let (ts,e) = match self.find_entry(old_name)? {
            Some(loc) => loc,
            None => return Err(Box::new(Error::NotFound))
        };
        let mut dir: DirectorySector = self.read_sector_struct(ts)?;
        if dir.entries[e].is_locked() {
            return Err(Box::new(Error::PermissionLocked));
        }
        dir.entries[e].name = string_to_file_name(new_name);
        self.img.write_track_sector(ts[0] as usize,ts[1] as usize,&dir.to_bytes())
    }
    fn create_directory(&mut self,_path: &str,_name: &str) -> STDRESULT {
        debug!("DOS 3.x does not support directories");
        Err(Box::new(Error::UnsupportedOnFormat))
    }
    fn dir_exists(&mut self,path: &str) -> bool {
        path.len()==0
    }
    fn usage(&mut self) -> Result<(usize,usize),DYNERR> {
        let free = self.num_free_sectors();
        Ok((self.total_sectors()-free,free))
    }
    fn get_img(&mut self) -> &mut img::Img {
        &mut self.img
    }
}
