//! Glob matching over on-disk catalogs and `slot:path` addressing.

use regex::Regex;
use super::session::Session;
use crate::fs::DiskFile;
use crate::DYNERR;

/// Convert shell wildcards into an anchored, case insensitive regex:
/// `.` is literal, `?` matches one character, `*` matches any run.
pub fn glob_regex(pattern: &str) -> Result<Regex,DYNERR> {
    let translated = pattern
        .replace('.',"[.]")
        .replace('?',".")
        .replace('*',".*");
    match Regex::new(&format!("(?i)^{}$",translated)) {
        Ok(re) => Ok(re),
        Err(_) => Err(Box::new(crate::fs::Error::ParseError))
    }
}

/// Split a `slot:rest` address into its parts.  The slot is a single
/// leading digit; without one the whole argument is the path.
pub fn parse_slot_path(arg: &str) -> (Option<usize>,String) {
    let bytes = arg.as_bytes();
    if bytes.len()>=2 && bytes[0].is_ascii_digit() && bytes[1]==b':' {
        return (Some((bytes[0]-b'0') as usize),arg[2..].to_string());
    }
    (None,arg.to_string())
}

/// Catalog entries on the slot whose name matches the pattern, payloads
/// loaded.  A pattern containing `/` matches against the full path.
pub fn glob_disk(sess: &mut Session,slot: usize,pattern: &str) -> Result<Vec<DiskFile>,DYNERR> {
    let re = glob_regex(pattern)?;
    let vol = sess.get(slot)?;
    let catalog = vol.fs.catalog()?;
    let mut ans = Vec::new();
    for f in catalog {
        let hit = match pattern.contains('/') {
            true => re.is_match(&f.qualified_name()),
            false => re.is_match(&f.name)
        };
        if hit {
            let mut full = match f.is_dir {
                true => f.clone(),
                false => vol.fs.read_file(&f.path,&f.name)?
            };
            full.slot = slot;
            ans.push(full);
        }
    }
    Ok(ans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards() {
        let re = glob_regex("*.TXT").expect("bad pattern");
        assert!(re.is_match("README.TXT"));
        assert!(re.is_match("notes.txt"));
        assert!(!re.is_match("README.BIN"));
        let re = glob_regex("GAME?").expect("bad pattern");
        assert!(re.is_match("GAME1"));
        assert!(!re.is_match("GAME12"));
        let re = glob_regex("A.B").expect("bad pattern");
        assert!(re.is_match("A.B"));
        assert!(!re.is_match("AXB"));
    }

    #[test]
    fn slot_addresses() {
        assert_eq!(parse_slot_path("0:*.TXT"),(Some(0),"*.TXT".to_string()));
        assert_eq!(parse_slot_path("7:"),(Some(7),"".to_string()));
        assert_eq!(parse_slot_path("HELLO"),(None,"HELLO".to_string()));
        assert_eq!(parse_slot_path("10:X"),(None,"10:X".to_string()));
    }
}
