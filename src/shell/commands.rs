//! The shell command handlers.
//!
//! Handlers return the command's integer code: 0 on success, -1 on a
//! recoverable failure, 1 when the volume could not even be analyzed,
//! and the exit sentinel for `quit`.  Mutating handlers persist through
//! `Session::save`, which takes a backup before overwriting the image.

use std::panic::{catch_unwind,AssertUnwindSafe};
use std::path::Path;
use colored::*;
use log::error;

use super::session::{Session,MAXVOL};
use super::{glob,xfer,EXIT_CODE};
use crate::DYNERR;

fn report(e: DYNERR) -> i32 {
    eprintln!("Error: {}",e);
    -1
}

/// Directory prefix and bare name for a file argument: an embedded `/`
/// overrides the working path for this one operation.
fn split_disk_arg(arg: &str,wp: &str,prodos: bool) -> (String,String) {
    if !prodos {
        return (String::new(),arg.to_string());
    }
    match arg.rsplit_once('/') {
        Some((path,name)) => (path.to_string(),name.to_string()),
        None => (wp.to_string(),arg.to_string())
    }
}

pub fn mount(sess: &mut Session,args: &[String]) -> i32 {
    match sess.mount(&args[0]) {
        Ok(slot) => {
            eprintln!("mount disk in slot {}",slot);
            0
        },
        Err(e) => report(e)
    }
}

pub fn unmount(sess: &mut Session,args: &[String]) -> i32 {
    let slot = match args.len() {
        0 => None,
        _ => match args[0].parse::<usize>() {
            Ok(i) => Some(i),
            Err(_) => {
                eprintln!("Invalid slot number: {}",args[0]);
                return -1;
            }
        }
    };
    match sess.unmount(slot) {
        Ok(()) => {
            eprintln!("Unmounted volume");
            0
        },
        Err(e) => report(e)
    }
}

pub fn target(sess: &mut Session,args: &[String]) -> i32 {
    let slot = match args[0].parse::<usize>() {
        Ok(i) if i<MAXVOL => i,
        _ => {
            eprintln!("Valid slots are 0 to {}.",MAXVOL-1);
            return -1;
        }
    };
    match sess.set_target(slot) {
        Ok(()) => 0,
        Err(_) => {
            eprintln!("Nothing mounted in slot {} (use disks to see mounts)",slot);
            -1
        }
    }
}

pub fn disks(sess: &mut Session,_args: &[String]) -> i32 {
    println!("Mounted Volumes");
    for (slot,path) in sess.disks() {
        println!("{}:{}",slot,path);
    }
    0
}

pub fn info(sess: &mut Session,_args: &[String]) -> i32 {
    let vol = match sess.current() {
        Ok(v) => v,
        Err(e) => return report(e)
    };
    let path = vol.host_path.clone();
    let img = vol.fs.get_img();
    println!("Disk path   : {}",path);
    println!("Disk type   : {}",img.format());
    println!("Sector Order: {}",img.order());
    println!("Size        : {} bytes",img.len());
    0
}

pub fn analyze(sess: &mut Session,_args: &[String]) -> i32 {
    let outcome = catch_unwind(AssertUnwindSafe(|| -> Result<(),DYNERR> {
        let vol = sess.current()?;
        let format = vol.fs.get_img().format();
        println!("Format: {}",format);
        match format.track_count() {
            0 => println!("Blocks: {}",format.block_count()),
            tracks => println!("Tracks: {}, Sectors: {}",tracks,format.sectors_per_track())
        }
        let files = vol.fs.catalog()?;
        let (used,free) = vol.fs.usage()?;
        println!("Files: {}, Used: {}, Free: {}",files.len(),used,free);
        Ok(())
    }));
    match outcome {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => report(e),
        Err(_) => {
            error!("panic while analyzing volume, session continues");
            1
        }
    }
}

pub fn cat(sess: &mut Session,args: &[String]) -> i32 {
    let slot = match sess.current_slot() {
        Some(s) => s,
        None => return -1
    };
    let pattern = match args.len() {
        0 => "*".to_string(),
        _ => args[0].clone()
    };
    let files = match glob::glob_disk(sess,slot,&pattern) {
        Ok(f) => f,
        Err(e) => return report(e)
    };
    let bs = match sess.get(slot) {
        Ok(vol) => match vol.fs.get_img().format().is_dos() {
            true => 256,
            false => 512
        },
        Err(e) => return report(e)
    };
    println!("{:<33}  {:>6}  {:>2}  {:<23}  {}","NAME","BLOCKS","RO","KIND","ADDITIONAL");
    for f in &files {
        let add = match f.load_addr {
            0 => String::new(),
            a => format!("(A${:04X})",a)
        };
        let locked = match f.locked {
            true => "Y",
            false => " "
        };
        let name = match f.is_dir {
            true => f.qualified_name().blue().bold().to_string(),
            false => f.qualified_name().normal().to_string()
        };
        println!("{:<33}  {:>6}  {:>2}  {:<23}  {}",name,(f.size/bs)+1,locked,f.kind,add);
    }
    match sess.get(slot) {
        Ok(vol) => match vol.fs.usage() {
            Ok((used,free)) => {
                println!();
                println!("USED: {:<20} FREE: {:<20}",used,free);
                0
            },
            Err(e) => report(e)
        },
        Err(e) => report(e)
    }
}

pub fn ls(_sess: &mut Session,args: &[String]) -> i32 {
    let patterns = match args.len() {
        0 => vec!["*".to_string()],
        _ => args.to_vec()
    };
    println!("{:>9}  {:<23}  {}","BYTES","KIND","NAME");
    for arg in &patterns {
        let (dir,pattern) = match arg.rsplit_once('/') {
            Some((d,p)) => (d.to_string(),p.to_string()),
            None => (".".to_string(),arg.clone())
        };
        let re = match glob::glob_regex(&pattern) {
            Ok(re) => re,
            Err(e) => return report(e)
        };
        let listing = match std::fs::read_dir(&dir) {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading path {}: {}",dir,e);
                continue;
            }
        };
        for entry in listing.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !re.is_match(&name) {
                continue;
            }
            let (size,kind) = match entry.metadata() {
                Ok(meta) if meta.is_dir() => (0,"Local directory"),
                Ok(meta) => (meta.len(),"Local file"),
                Err(_) => (0,"Local file")
            };
            println!("{:>9}  {:<23}  {}",size,kind,name);
        }
    }
    0
}

pub fn cd(sess: &mut Session,args: &[String]) -> i32 {
    if args.len()==0 {
        eprintln!("Working path is /{}",sess.work_path);
        return 0;
    }
    let arg = args[0].trim_matches('/');
    let candidate = match args[0].as_str() {
        "/" | "" => String::new(),
        ".." => match sess.work_path.rsplit_once('/') {
            Some((parent,_)) => parent.to_string(),
            None => String::new()
        },
        s if s.starts_with('/') => arg.to_string(),
        _ => match sess.work_path.len() {
            0 => arg.to_string(),
            _ => [sess.work_path.clone(),"/".to_string(),arg.to_string()].concat()
        }
    };
    let ok = match sess.current() {
        Ok(vol) => vol.fs.dir_exists(&candidate),
        Err(e) => return report(e)
    };
    if !ok {
        eprintln!("No such directory: /{}",candidate);
        return -1;
    }
    sess.work_path = candidate;
    eprintln!("Working path is now /{}",sess.work_path);
    0
}

pub fn extract(sess: &mut Session,args: &[String]) -> i32 {
    let slot = match sess.current_slot() {
        Some(s) => s,
        None => return -1
    };
    for arg in args {
        println!("Extract: {}",arg);
        let files = match glob::glob_disk(sess,slot,arg) {
            Ok(f) => f,
            Err(e) => return report(e)
        };
        for f in &files {
            if f.is_dir {
                continue;
            }
            match xfer::extract_file(f,Path::new(".")) {
                Ok(_dest) => println!("OK"),
                Err(e) => {
                    println!("FAILED");
                    return report(e);
                }
            }
        }
    }
    0
}

pub fn put(sess: &mut Session,args: &[String]) -> i32 {
    let slot = match sess.current_slot() {
        Some(s) => s,
        None => return -1
    };
    match xfer::put_file(sess,&args[0]) {
        Ok(name) => {
            eprintln!("Wrote {}",name);
            match sess.save(slot) {
                Ok(()) => 0,
                Err(e) => report(e)
            }
        },
        Err(e) => {
            eprintln!("Failed to create file: {}",e);
            -1
        }
    }
}

/// Shared body of the four commands that edit one existing file.
fn file_op(sess: &mut Session,arg: &str,op: fn(&mut super::session::Volume,&str,&str) -> Result<(),DYNERR>) -> i32 {
    let slot = match sess.current_slot() {
        Some(s) => s,
        None => return -1
    };
    let wp = sess.work_path.clone();
    let result = match sess.get(slot) {
        Ok(vol) => {
            let prodos = vol.fs.get_img().format().is_prodos();
            let (path,name) = split_disk_arg(arg,&wp,prodos);
            op(vol,&path,&name)
        },
        Err(e) => return report(e)
    };
    match result {
        Ok(()) => match sess.save(slot) {
            Ok(()) => 0,
            Err(e) => report(e)
        },
        Err(e) => report(e)
    }
}

pub fn delete(sess: &mut Session,args: &[String]) -> i32 {
    file_op(sess,&args[0],|vol,path,name| vol.fs.delete(path,name))
}

pub fn lock(sess: &mut Session,args: &[String]) -> i32 {
    file_op(sess,&args[0],|vol,path,name| vol.fs.set_locked(path,name,true))
}

pub fn unlock(sess: &mut Session,args: &[String]) -> i32 {
    file_op(sess,&args[0],|vol,path,name| vol.fs.set_locked(path,name,false))
}

pub fn rename(sess: &mut Session,args: &[String]) -> i32 {
    let slot = match sess.current_slot() {
        Some(s) => s,
        None => return -1
    };
    let wp = sess.work_path.clone();
    let new_name = match args[1].rsplit_once('/') {
        Some((_,base)) => base.to_string(),
        None => args[1].clone()
    };
    let result = match sess.get(slot) {
        Ok(vol) => {
            let prodos = vol.fs.get_img().format().is_prodos();
            let (path,old_name) = split_disk_arg(&args[0],&wp,prodos);
            vol.fs.rename(&path,&old_name,&new_name)
        },
        Err(e) => return report(e)
    };
    match result {
        Ok(()) => match sess.save(slot) {
            Ok(()) => 0,
            Err(e) => report(e)
        },
        Err(e) => {
            eprintln!("Unable to rename file: {}",e);
            -1
        }
    }
}

pub fn mkdir(sess: &mut Session,args: &[String]) -> i32 {
    let slot = match sess.current_slot() {
        Some(s) => s,
        None => return -1
    };
    let (path,name) = match args[0].rsplit_once('/') {
        Some((p,n)) => (p.to_string(),n.to_string()),
        None => (String::new(),args[0].clone())
    };
    let result = match sess.get(slot) {
        Ok(vol) => vol.fs.create_directory(&path,&name),
        Err(e) => return report(e)
    };
    match result {
        Ok(()) => match sess.save(slot) {
            Ok(()) => 0,
            Err(e) => report(e)
        },
        Err(e) => report(e)
    }
}

pub fn copy(sess: &mut Session,args: &[String]) -> i32 {
    disk_to_disk(sess,args,false)
}

pub fn mv(sess: &mut Session,args: &[String]) -> i32 {
    disk_to_disk(sess,args,true)
}

fn disk_to_disk(sess: &mut Session,args: &[String],mov: bool) -> i32 {
    let n = args.len();
    let default_slot = sess.current_slot();
    let resolve = |maybe: Option<usize>| -> Option<usize> {
        match maybe {
            Some(s) => Some(s),
            None => default_slot
        }
    };
    let (dst_slot_opt,dst_path) = glob::parse_slot_path(&args[n-1]);
    let dst_slot = match resolve(dst_slot_opt) {
        Some(s) => s,
        None => {
            eprintln!("Invalid target: {}",args[n-1]);
            return -1;
        }
    };
    let dst_prodos = match sess.get(dst_slot) {
        Ok(vol) => {
            let format = vol.fs.get_img().format();
            if !format.is_dos() && !format.is_prodos() {
                eprintln!("Target volume does not support write.");
                return -1;
            }
            format.is_prodos()
        },
        Err(e) => return report(e)
    };
    // glob every source slot
    let mut all: Vec<crate::fs::DiskFile> = Vec::new();
    for arg in &args[0..n-1] {
        let (slot_opt,pattern) = glob::parse_slot_path(arg);
        let slot = match resolve(slot_opt) {
            Some(s) => s,
            None => {
                eprintln!("Invalid slot number: {}",arg);
                return -1;
            }
        };
        match glob::glob_disk(sess,slot,&pattern) {
            Ok(mut files) => all.append(&mut files),
            Err(e) => return report(e)
        }
    }
    if dst_path.len()>0 && all.len()>1 && !dst_prodos {
        eprintln!("Only ProDOS supports copy to directory");
        return -1;
    }
    let mut touched: Vec<usize> = Vec::new();
    for f in &all {
        if f.is_dir {
            continue;
        }
        // a lone source with a target path is a copy-with-rename
        let (path,name) = match (all.len(),dst_path.len()) {
            (1,p) if p>0 => match dst_path.rsplit_once('/') {
                Some((d,b)) => (d.to_string(),b.to_string()),
                None => (String::new(),dst_path.clone())
            },
            _ => (dst_path.clone(),f.name.clone())
        };
        let name = match dst_prodos && name.len()>15 {
            true => name[0..15].to_string(),
            false => name
        };
        let written = match sess.get(dst_slot) {
            Ok(vol) => vol.fs.write_file(&path,&name,&f.ext,&f.data,f.load_addr),
            Err(e) => return report(e)
        };
        if let Err(e) = written {
            eprintln!("Failed to copy {}: {}",name,e);
            return -1;
        }
        eprintln!("Copied {} ({} bytes)",name,f.data.len());
        if mov {
            let removed = match sess.get(f.slot) {
                Ok(vol) => vol.fs.delete(&f.path,&f.name),
                Err(e) => return report(e)
            };
            if let Err(e) = removed {
                eprintln!("Failed to remove {}: {}",f.name,e);
                return -1;
            }
            if !touched.contains(&f.slot) {
                touched.push(f.slot);
            }
        }
    }
    if let Err(e) = sess.save(dst_slot) {
        return report(e);
    }
    for slot in touched {
        if slot!=dst_slot {
            if let Err(e) = sess.save(slot) {
                return report(e);
            }
        }
    }
    0
}

/// File extensions that are worth probing during a directory walk.
const INGEST_EXTENSIONS: [&str;6] = ["dsk","do","po","d13","nib","img"];

fn ingest_one(path: &Path) -> i32 {
    let shown = path.display().to_string();
    let outcome = catch_unwind(|| -> Result<String,DYNERR> {
        let mut fs = crate::create_fs_from_file(&shown)?;
        let files = fs.catalog()?;
        Ok(format!("{}: {}, {} files",shown,fs.get_img().format(),files.len()))
    });
    match outcome {
        Ok(Ok(line)) => {
            println!("{}",line);
            0
        },
        Ok(Err(e)) => {
            eprintln!("Error processing disk {}: {}",shown,e);
            -1
        },
        Err(_) => {
            error!("panic while processing volume {}, session continues",shown);
            1
        }
    }
}

fn ingest_walk(dir: &Path,count: &mut usize) {
    let listing = match std::fs::read_dir(dir) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error reading path {}: {}",dir.display(),e);
            return;
        }
    };
    for entry in listing.flatten() {
        let path = entry.path();
        if path.is_dir() {
            ingest_walk(&path,count);
            continue;
        }
        let ext = match path.extension() {
            Some(os) => os.to_string_lossy().to_lowercase(),
            None => continue
        };
        if INGEST_EXTENSIONS.contains(&ext.as_str()) {
            ingest_one(&path);
            *count += 1;
        }
    }
}

pub fn ingest(_sess: &mut Session,args: &[String]) -> i32 {
    let path = Path::new(&args[0]);
    if path.is_dir() {
        let mut count = 0;
        ingest_walk(path,&mut count);
        println!("Processed {} disk images",count);
        return 0;
    }
    ingest_one(path)
}

pub fn help(_sess: &mut Session,args: &[String]) -> i32 {
    if args.len()==0 {
        let mut names: Vec<&str> = super::COMMANDS.iter().map(|c| c.name).collect();
        names.sort();
        for name in names {
            if let Some(cmd) = super::find_command(name) {
                println!("{:<10} {}",cmd.name,cmd.description);
            }
        }
        return 0;
    }
    match super::find_command(&args[0].to_lowercase()) {
        Some(cmd) if cmd.help.len()>0 => {
            for line in cmd.help {
                println!("{}",line);
            }
            0
        },
        _ => {
            eprintln!("No help available for {}",args[0]);
            0
        }
    }
}

pub fn quit(_sess: &mut Session,_args: &[String]) -> i32 {
    EXIT_CODE
}
