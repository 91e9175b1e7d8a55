//! Extract and inject services.
//!
//! Extracted files are decorated `NAME[#0xAAAA].EXT`: the load address
//! appears when it is nonzero, and the extension drives the file type
//! mapping when the file is put back onto a disk.  Text sources named
//! `*.APP.ASC` or `*.INT.ASC` are tokenized on insertion.

use std::path::{Path,PathBuf};
use regex::Regex;
use super::session::Session;
use crate::fs::DiskFile;
use crate::lang;
use crate::DYNERR;

/// Default load address for tokenized BASIC.
const BASIC_ADDR: u16 = 0x0801;

/// Host file name for an extracted disk file.
pub fn decorated_name(f: &DiskFile) -> String {
    let mut name = f.name.replace(':',"").replace('/',"_");
    if f.load_addr!=0 {
        name += &format!("#0x{:04X}",f.load_addr);
    }
    format!("{}.{}",name,f.ext.to_uppercase())
}

/// Recover `(name, load address, extension)` from a host file name.
/// An undecorated name loses only its trailing extension.
pub fn parse_decoration(base: &str) -> (String,Option<u16>,String) {
    let re = Regex::new(r"(?i)^(.+)#(0x[a-f0-9]+)\.([a-z]+)$").expect("unreachable");
    if let Some(caps) = re.captures(base) {
        if let Ok(addr) = u16::from_str_radix(&caps[2][2..],16) {
            return (caps[1].to_string(),Some(addr),caps[3].to_uppercase());
        }
    }
    match base.rsplit_once('.') {
        Some((name,ext)) => (name.to_string(),None,ext.to_uppercase()),
        None => (base.to_string(),None,String::new())
    }
}

/// Write the payload of a disk file into the output directory.
pub fn extract_file(f: &DiskFile,out_dir: &Path) -> Result<PathBuf,DYNERR> {
    let full = out_dir.join(decorated_name(f));
    std::fs::write(&full,&f.data)?;
    Ok(full)
}

/// Inject a host file onto the target volume under the working path.
/// Returns the native name it was stored under.
pub fn put_file(sess: &mut Session,local: &str) -> Result<String,DYNERR> {
    let mut payload = std::fs::read(local)?;
    let base = match Path::new(local).file_name() {
        Some(os) => os.to_string_lossy().to_string(),
        None => return Err(Box::new(crate::fs::Error::ParseError))
    };
    let upper = base.to_uppercase();
    let (mut name,maybe_addr,mut ext) = parse_decoration(&base);
    if upper.ends_with(".APP.ASC") || upper.ends_with(".INT.ASC") {
        ext = upper[upper.len()-7..upper.len()-4].to_string();
        name = base[0..base.len()-8].to_string();
    }
    let addr = match (&maybe_addr,ext.as_str()) {
        (Some(a),_) => *a,
        (None,"APP") | (None,"INT") => BASIC_ADDR,
        _ => 0
    };
    if ext=="APP" && lang::is_ascii(&payload) {
        let text = String::from_utf8_lossy(&payload).to_string();
        payload = lang::applesoft::Tokenizer::new().tokenize(&text,addr)?;
    } else if ext=="INT" && lang::is_ascii(&payload) {
        eprintln!("WARNING: Integer retokenization from text is experimental");
        let text = String::from_utf8_lossy(&payload).to_string();
        payload = lang::integer::Tokenizer::new().tokenize(&text)?;
    }
    let wp = sess.work_path.clone();
    let vol = sess.current()?;
    let path = match vol.fs.get_img().format().is_prodos() {
        true => wp,
        false => String::new()
    };
    let native = name.to_uppercase();
    vol.fs.write_file(&path,&native,&ext,&payload,addr)?;
    Ok(native)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoration_round_trip() {
        let mut f = DiskFile::new("GAME","");
        f.ext = "BIN".to_string();
        f.load_addr = 0x6000;
        assert_eq!(decorated_name(&f),"GAME#0x6000.BIN");
        let (name,addr,ext) = parse_decoration("GAME#0x6000.BIN");
        assert_eq!(name,"GAME");
        assert_eq!(addr,Some(0x6000));
        assert_eq!(ext,"BIN");
    }

    #[test]
    fn undecorated_strips_extension() {
        let (name,addr,ext) = parse_decoration("NOTES.TXT");
        assert_eq!(name,"NOTES");
        assert_eq!(addr,None);
        assert_eq!(ext,"TXT");
    }

    #[test]
    fn text_files_stay_plain() {
        let mut f = DiskFile::new("NOTES","");
        f.ext = "TXT".to_string();
        assert_eq!(decorated_name(&f),"NOTES.TXT");
    }
}
