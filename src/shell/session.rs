//! Mount manager and session state.
//!
//! The session owns a fixed table of eight mount slots, the current target
//! slot, and the ProDOS working path.  It also carries the configuration
//! directory used for backups and shell history.  Every mutating command
//! persists through `save`, which copies the on-host image bytes aside
//! before overwriting them with the in-memory buffer.

use std::path::{Path,PathBuf};
use log::warn;
use super::Error;
use crate::fs::DiskFS;
use crate::{STDRESULT,DYNERR};

pub const MAXVOL: usize = 8;

/// One mounted image: the file system driver (which owns the buffer) plus
/// the canonical host path it came from.
pub struct Volume {
    pub fs: Box<dyn DiskFS>,
    pub host_path: String
}

pub struct Session {
    slots: [Option<Volume>;MAXVOL],
    target: i32,
    pub work_path: String,
    conf_dir: PathBuf
}

impl Session {
    pub fn new(conf_dir: PathBuf) -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            target: -1,
            work_path: String::new(),
            conf_dir
        }
    }
    pub fn conf_dir(&self) -> &Path {
        &self.conf_dir
    }
    pub fn history_path(&self) -> PathBuf {
        self.conf_dir.join(".shell_history")
    }
    /// Mount an image file, classifying its format, and make its slot the
    /// target.  Mounting the same file twice returns the existing slot.
    pub fn mount(&mut self,path: &str) -> Result<usize,DYNERR> {
        let canon = std::fs::canonicalize(path)?.to_string_lossy().to_string();
        for i in 0..MAXVOL {
            if let Some(vol) = &self.slots[i] {
                if vol.host_path==canon {
                    warn!("{}",Error::AlreadyMounted);
                    self.target = i as i32;
                    return Ok(i);
                }
            }
        }
        let fs = crate::create_fs_from_file(&canon)?;
        for i in 0..MAXVOL {
            if self.slots[i].is_none() {
                self.slots[i] = Some(Volume { fs, host_path: canon });
                self.target = i as i32;
                self.work_path.clear();
                return Ok(i);
            }
        }
        Err(Box::new(Error::NoFreeSlots))
    }
    /// Unmount a slot, defaulting to the target.  The target index itself
    /// is left alone; subsequent commands fail their mount precondition.
    pub fn unmount(&mut self,slot: Option<usize>) -> STDRESULT {
        let idx = match slot {
            Some(i) => i,
            None => match self.target {
                t if t>=0 => t as usize,
                _ => return Err(Box::new(Error::NotMounted))
            }
        };
        if idx>=MAXVOL {
            return Err(Box::new(Error::BadSlot));
        }
        if self.slots[idx].is_none() {
            return Err(Box::new(Error::NotMounted));
        }
        self.slots[idx] = None;
        if idx as i32 == self.target {
            self.work_path.clear();
        }
        Ok(())
    }
    pub fn set_target(&mut self,slot: usize) -> STDRESULT {
        if slot>=MAXVOL {
            return Err(Box::new(Error::BadSlot));
        }
        if self.slots[slot].is_none() {
            return Err(Box::new(Error::NotMounted));
        }
        if slot as i32 != self.target {
            self.work_path.clear();
        }
        self.target = slot as i32;
        Ok(())
    }
    /// The target slot, if it holds a mounted image.
    pub fn current_slot(&self) -> Option<usize> {
        match self.target {
            t if t>=0 && self.slots[t as usize].is_some() => Some(t as usize),
            _ => None
        }
    }
    pub fn has_target(&self) -> bool {
        self.current_slot().is_some()
    }
    pub fn get(&mut self,slot: usize) -> Result<&mut Volume,DYNERR> {
        if slot>=MAXVOL {
            return Err(Box::new(Error::BadSlot));
        }
        match self.slots[slot].as_mut() {
            Some(vol) => Ok(vol),
            None => Err(Box::new(Error::NotMounted))
        }
    }
    pub fn current(&mut self) -> Result<&mut Volume,DYNERR> {
        match self.current_slot() {
            Some(slot) => self.get(slot),
            None => Err(Box::new(Error::NotMounted))
        }
    }
    /// Snapshot of the mount table.
    pub fn disks(&self) -> Vec<(usize,String)> {
        let mut ans = Vec::new();
        for i in 0..MAXVOL {
            if let Some(vol) = &self.slots[i] {
                ans.push((i,vol.host_path.clone()));
            }
        }
        ans
    }
    pub fn prompt(&self) -> String {
        match self.current_slot() {
            Some(slot) => {
                let base = match &self.slots[slot] {
                    Some(vol) => match Path::new(&vol.host_path).file_name() {
                        Some(name) => name.to_string_lossy().to_string(),
                        None => vol.host_path.clone()
                    },
                    None => String::new()
                };
                format!("dsk:{}:{}:{}> ",slot,base,self.work_path)
            },
            None => format!("dsk:0:<no mount>:{}> ",self.work_path)
        }
    }
    /// Copy the image file's current bytes into the backup area, named by
    /// the flattened path and a timestamp.
    fn backup_file(&self,path: &str) -> STDRESULT {
        let data = std::fs::read(path)?;
        let sanitized = path.replace(':',"").replace('\\',"/");
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
        let bpath = self.conf_dir.join("backup")
            .join(format!("{}.{}",sanitized.trim_start_matches('/'),stamp));
        if let Some(parent) = bpath.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&bpath,&data)?;
        eprintln!("Backed up disk to: {}",bpath.display());
        Ok(())
    }
    /// Persist a slot's buffer to its image file, backup first.  If the
    /// backup cannot be written the save is abandoned and the in-memory
    /// mutation stays volatile.
    pub fn save(&mut self,slot: usize) -> STDRESULT {
        let (host_path,dsk) = {
            let vol = self.get(slot)?;
            (vol.host_path.clone(),vol.fs.get_img().to_bytes())
        };
        self.backup_file(&host_path)?;
        std::fs::write(&host_path,&dsk)?;
        println!("Updated disk {}",host_path);
        Ok(())
    }
}
