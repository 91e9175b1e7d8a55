//! Module containing the Integer BASIC tokenizer
//!
//! Integer BASIC stores each line as a length-prefixed record:
//! `[length][line number LE][tokens...][0x01]`.  Statement words map to
//! positive tokens, literal text is stored as negative ASCII, and integer
//! constants carry a digit prefix followed by the 16 bit value.
//!
//! Tokenization here is experimental: the byte stream is meant to execute
//! equivalently, not to be bit-identical with any particular encoder.

use std::collections::HashMap;
use log::warn;
use crate::lang;
use crate::DYNERR;

pub const EOL: u8 = 0x01;
pub const TOK_REM: u8 = 0x5d;
pub const QUOTE_OPEN: u8 = 0x28;
pub const QUOTE_CLOSE: u8 = 0x29;
const MAX_LINE: usize = 126;

/// Statement and operator words with their canonical tokens.  Several
/// words have context-dependent alternates on real hardware; one token
/// per word is enough for equivalent execution.
pub const KEYWORDS: [(&str,u8);49] = [
    ("HIMEM:",0x10),
    ("LOMEM:",0x11),
    ("NOTRACE",0x7a),
    ("RETURN",0x5b),
    ("COLOR=",0x66),
    ("INPUT",0x52),
    ("GOSUB",0x5c),
    ("PRINT",0x62),
    ("TRACE",0x7d),
    ("CALL",0x4d),
    ("TEXT",0x4b),
    ("NEXT",0x59),
    ("STEP",0x58),
    ("THEN",0x24),
    ("GOTO",0x5f),
    ("POKE",0x64),
    ("VLIN",0x6c),
    ("HLIN",0x69),
    ("VTAB",0x6f),
    ("LIST",0x74),
    ("PLOT",0x67),
    ("PEEK",0x2e),
    ("SCRN(",0x3d),
    ("AUTO",0x0d),
    ("LOAD",0x04),
    ("SAVE",0x05),
    ("ASC(",0x3c),
    ("LEN(",0x3b),
    ("REM",0x5d),
    ("FOR",0x55),
    ("END",0x51),
    ("LET",0x5e),
    ("DIM",0x4e),
    ("TAB",0x50),
    ("POP",0x77),
    ("DSP",0x7b),
    ("AND",0x1d),
    ("MOD",0x1f),
    ("NOT",0x37),
    ("RND",0x2f),
    ("SGN",0x30),
    ("ABS",0x31),
    ("PDL",0x32),
    ("PR#",0x7e),
    ("IN#",0x7f),
    ("RUN",0x08),
    ("NEW",0x0b),
    ("CLR",0x0c),
    ("GR",0x4c),
];

/// Operators and separators, single tokens.
pub const OPERATORS: [(&str,u8);18] = [
    (">=",0x18),
    ("<=",0x1a),
    ("<>",0x1b),
    ("IF",0x60),
    ("TO",0x57),
    ("OR",0x1e),
    ("AT",0x6b),
    ("+",0x12),
    ("-",0x13),
    ("*",0x14),
    ("/",0x15),
    ("=",0x16),
    (">",0x19),
    ("<",0x1c),
    ("(",0x22),
    (")",0x72),
    (",",0x23),
    (";",0x45)
];

/// Tokens the detokenizer accepts beyond the canonical table, alternates
/// the ROM emits in specific statement contexts.
const DETOK_ALIASES: [(u8,&str);9] = [
    (0x61,"PRINT"),
    (0x63,"PRINT"),
    (0x53,"INPUT"),
    (0x54,"INPUT"),
    (0x4f,"DIM"),
    (0x25,"THEN"),
    (0x46,";"),
    (0x47,";"),
    (0x03,":")
];

/// Handles tokenization of Integer BASIC
pub struct Tokenizer {
    tok_list: Vec<(&'static str,u8)>,
    detok_map: HashMap<u8,&'static str>
}

impl Tokenizer {
    /// Create a new `Tokenizer` structure
    pub fn new() -> Self {
        let mut tok_list: Vec<(&'static str,u8)> = Vec::new();
        let mut detok_map: HashMap<u8,&'static str> = HashMap::new();
        for (kw,tok) in KEYWORDS.iter().chain(OPERATORS.iter()) {
            tok_list.push((kw,*tok));
            detok_map.insert(*tok,kw);
        }
        for (tok,kw) in DETOK_ALIASES {
            detok_map.insert(tok,kw);
        }
        tok_list.sort_by(|a,b| b.0.len().cmp(&a.0.len()));
        Self {
            tok_list,
            detok_map
        }
    }
    fn match_keyword(&self,line: &[u8],pos: usize) -> Option<(&'static str,u8)> {
        for (kw,tok) in &self.tok_list {
            let end = pos + kw.len();
            if end<=line.len() && line[pos..end].eq_ignore_ascii_case(kw.as_bytes()) {
                return Some((kw,*tok));
            }
        }
        None
    }
    fn tokenize_line(&self,line: &str) -> Result<Vec<u8>,DYNERR> {
        let (num,rest) = lang::parse_line_number(line)?;
        let src = rest.as_bytes();
        let mut ans: Vec<u8> = Vec::new();
        ans.append(&mut u16::to_le_bytes(num).to_vec());
        let mut pos = 0;
        while pos < src.len() {
            let c = src[pos];
            if !c.is_ascii() {
                return Err(Box::new(lang::Error::Syntax));
            }
            if c==b' ' {
                pos += 1;
                continue;
            }
            if c==b'"' {
                // string literal: open token, negative ASCII, close token
                ans.push(QUOTE_OPEN);
                pos += 1;
                while pos<src.len() && src[pos]!=b'"' {
                    ans.push(src[pos] | 0x80);
                    pos += 1;
                }
                ans.push(QUOTE_CLOSE);
                pos += 1;
                continue;
            }
            if c.is_ascii_digit() {
                // integer constant: digit prefix then 16 bit LE value
                let digits: String = src[pos..].iter().take_while(|b| b.is_ascii_digit()).map(|b| *b as char).collect();
                let val = match digits.parse::<u32>() {
                    Ok(v) if v<=65535 => v as u16,
                    _ => return Err(Box::new(lang::Error::Syntax))
                };
                ans.push(c | 0x80);
                ans.append(&mut u16::to_le_bytes(val).to_vec());
                pos += digits.len();
                continue;
            }
            if let Some((kw,tok)) = self.match_keyword(src,pos) {
                ans.push(tok);
                pos += kw.len();
                if tok==TOK_REM {
                    for b in &src[pos..] {
                        ans.push(*b | 0x80);
                    }
                    break;
                }
                continue;
            }
            // variable names and leftovers go in as negative ASCII
            ans.push(match c {
                b'$' => 0x40,
                _ => c.to_ascii_uppercase() | 0x80
            });
            pos += 1;
        }
        ans.push(EOL);
        if ans.len()+1 > MAX_LINE {
            return Err(Box::new(lang::Error::Syntax));
        }
        ans.insert(0,ans.len() as u8 + 1);
        Ok(ans)
    }
    /// Tokenize a program contained in a UTF8 string, result is an array
    /// of length-prefixed line records.
    pub fn tokenize(&self,program: &str) -> Result<Vec<u8>,DYNERR> {
        warn!("Integer retokenization from text is experimental");
        let mut ans: Vec<u8> = Vec::new();
        for line in program.lines() {
            if line.trim().len()==0 {
                continue;
            }
            ans.append(&mut self.tokenize_line(line)?);
        }
        Ok(ans)
    }
    /// Detokenize from byte array into a UTF8 string
    pub fn detokenize(&self,img: &[u8]) -> Result<String,DYNERR> {
        let mut addr = 0;
        let mut code = String::new();
        while addr+2 < img.len() {
            addr += 1; // skip record length
            let line_num = u16::from_le_bytes([img[addr],img[addr+1]]);
            code += &format!("{} ",line_num);
            addr += 2;
            loop {
                if addr >= img.len() {
                    return Err(Box::new(lang::Error::Detokenization));
                }
                if img[addr]==EOL {
                    code += "\n";
                    addr += 1;
                    break;
                }
                if img[addr]<128 {
                    let tok = match self.detok_map.get(&img[addr]) {
                        Some(s) => *s,
                        None => return Err(Box::new(lang::Error::Detokenization))
                    };
                    if tok.len()>1 {
                        code += &format!(" {} ",tok);
                    } else {
                        code += tok;
                    }
                    addr += 1;
                } else if img[addr]>=0xb0 && img[addr]<=0xb9 {
                    // next 2 bytes are a binary number
                    if addr+2 >= img.len() {
                        return Err(Box::new(lang::Error::Detokenization));
                    }
                    code += &format!("{}",u16::from_le_bytes([img[addr+1],img[addr+2]]));
                    addr += 3;
                } else {
                    // negative ASCII, e.g. a variable name
                    code.push(match img[addr] {
                        0x40 => '$',
                        b => (b & 0x7f) as char
                    });
                    addr += 1;
                }
            }
        }
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_framing() {
        let tok = Tokenizer::new();
        let prog = tok.tokenize("10 PRINT \"HI\"\n").expect("tokenize failed");
        // [len][0A 00][PRINT]["][H+80][I+80]["][01]
        assert_eq!(prog[0] as usize,prog.len());
        assert_eq!(prog[1..3],[0x0a,0x00]);
        assert_eq!(prog[3],0x62);
        assert_eq!(prog[4..8],[QUOTE_OPEN,0xc8,0xc9,QUOTE_CLOSE]);
        assert_eq!(prog[prog.len()-1],EOL);
    }

    #[test]
    fn integer_constants() {
        let tok = Tokenizer::new();
        let prog = tok.tokenize("10 X=255\n").expect("tokenize failed");
        // X as negative ASCII, = token, digit prefix, LE value
        assert_eq!(prog[3..9],[0xd8,0x16,0xb2,0xff,0x00,EOL]);
    }

    #[test]
    fn executes_equivalently() {
        let tok = Tokenizer::new();
        let src = "10 FOR I=1 TO 3\n20 PRINT I\n30 NEXT I\n40 END\n";
        let prog = tok.tokenize(src).expect("tokenize failed");
        let back = tok.detokenize(&prog).expect("detokenize failed");
        let prog2 = tok.tokenize(&back).expect("tokenize failed");
        assert_eq!(prog,prog2);
    }
}
