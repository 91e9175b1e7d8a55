//! # Language Module
//!
//! Tokenizers for the two BASIC dialects that can live on an Apple II
//! disk.  These convert between UTF8 source and the tokenized byte
//! streams the interpreters execute; they do not attempt full parsing.

pub mod applesoft;
pub mod integer;

#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("syntax error in source line")]
    Syntax,
    #[error("line number out of range")]
    LineNumber,
    #[error("could not detokenize stream")]
    Detokenization
}

/// Is this payload plain text?  Anything at or below `0x80` counts, so
/// tokenized streams (which are full of high bytes) are excluded.
pub fn is_ascii(dat: &[u8]) -> bool {
    for byte in dat {
        if *byte > 0x80 {
            return false;
        }
    }
    true
}

/// Parse a leading BASIC line number, returning it with the rest of the line.
pub fn parse_line_number(line: &str) -> Result<(u16,&str),Error> {
    let trimmed = line.trim_start();
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len()==0 {
        return Err(Error::Syntax);
    }
    match digits.parse::<u32>() {
        Ok(num) if num>=1 && num<=63999 => Ok((num as u16,&trimmed[digits.len()..])),
        _ => Err(Error::LineNumber)
    }
}
