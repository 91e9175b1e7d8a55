//! Module containing the Applesoft tokenizer
//!
//! Keywords map onto single byte tokens `0x80..0xEA`.  Matching is greedy,
//! longest keyword first, case insensitive, and suspended inside string
//! literals and after `REM`.  Spaces outside strings are dropped, the way
//! the ROM routine stores programs.

use std::collections::HashMap;
use crate::lang;
use crate::DYNERR;

/// The canonical 107 reserved words, in token order starting at 0x80.
pub const KEYWORDS: [&str;107] = [
    "END","FOR","NEXT","DATA","INPUT","DEL","DIM","READ","GR","TEXT",
    "PR#","IN#","CALL","PLOT","HLIN","VLIN","HGR2","HGR","HCOLOR=","HPLOT",
    "DRAW","XDRAW","HTAB","HOME","ROT=","SCALE=","SHLOAD","TRACE","NOTRACE","NORMAL",
    "INVERSE","FLASH","COLOR=","POP","VTAB","HIMEM:","LOMEM:","ONERR","RESUME","RECALL",
    "STORE","SPEED=","LET","GOTO","RUN","IF","RESTORE","&","GOSUB","RETURN",
    "REM","STOP","ON","WAIT","LOAD","SAVE","DEF","POKE","PRINT","CONT",
    "LIST","CLEAR","GET","NEW","TAB(","TO","FN","SPC(","THEN","AT",
    "NOT","STEP","+","-","*","/","^","AND","OR",">",
    "=","<","SGN","INT","ABS","USR","FRE","SCRN(","PDL","POS",
    "SQR","RND","LOG","EXP","COS","SIN","TAN","ATN","PEEK","LEN",
    "STR$","VAL","ASC","CHR$","LEFT$","RIGHT$","MID$"
];

pub const TOK_REM: u8 = 0xb2;

/// Handles tokenization of Applesoft BASIC
pub struct Tokenizer {
    /// keywords with their tokens, longest first for greedy matching
    tok_list: Vec<(&'static str,u8)>,
    detok_map: HashMap<u8,&'static str>
}

impl Tokenizer {
    /// Create a new `Tokenizer` structure
    pub fn new() -> Self {
        let mut tok_list: Vec<(&'static str,u8)> = Vec::new();
        let mut detok_map: HashMap<u8,&'static str> = HashMap::new();
        for i in 0..KEYWORDS.len() {
            tok_list.push((KEYWORDS[i],0x80+i as u8));
            detok_map.insert(0x80+i as u8,KEYWORDS[i]);
        }
        tok_list.sort_by(|a,b| b.0.len().cmp(&a.0.len()));
        Self {
            tok_list,
            detok_map
        }
    }
    /// Longest keyword starting at this position, if any.
    fn match_keyword(&self,line: &[u8],pos: usize) -> Option<(&'static str,u8)> {
        for (kw,tok) in &self.tok_list {
            let end = pos + kw.len();
            if end<=line.len() && line[pos..end].eq_ignore_ascii_case(kw.as_bytes()) {
                return Some((kw,*tok));
            }
        }
        None
    }
    /// Tokenize one line, producing the line number and the token bytes
    /// sans header and terminator.
    fn tokenize_line(&self,line: &str) -> Result<(u16,Vec<u8>),DYNERR> {
        let (num,rest) = lang::parse_line_number(line)?;
        let src = rest.as_bytes();
        let mut ans: Vec<u8> = Vec::new();
        let mut in_str = false;
        let mut pos = 0;
        while pos < src.len() {
            let c = src[pos];
            if !c.is_ascii() {
                return Err(Box::new(lang::Error::Syntax));
            }
            if in_str {
                ans.push(c);
                if c==b'"' {
                    in_str = false;
                }
                pos += 1;
                continue;
            }
            if c==b'"' {
                in_str = true;
                ans.push(c);
                pos += 1;
                continue;
            }
            if c==b' ' {
                pos += 1;
                continue;
            }
            if let Some((kw,tok)) = self.match_keyword(src,pos) {
                ans.push(tok);
                pos += kw.len();
                if tok==TOK_REM {
                    // comment tail is preserved verbatim
                    ans.append(&mut src[pos..].to_vec());
                    break;
                }
                continue;
            }
            ans.push(c.to_ascii_uppercase());
            pos += 1;
        }
        Ok((num,ans))
    }
    /// Tokenize a program contained in a UTF8 string, result is an array of
    /// bytes with the next-line links computed from `start_addr`.
    pub fn tokenize(&self,program: &str,start_addr: u16) -> Result<Vec<u8>,DYNERR> {
        let mut addr = start_addr;
        let mut ans: Vec<u8> = Vec::new();
        for line in program.lines() {
            if line.trim().len()==0 {
                continue;
            }
            let (num,tokens) = self.tokenize_line(line)?;
            let next_addr = addr + tokens.len() as u16 + 5;
            ans.append(&mut u16::to_le_bytes(next_addr).to_vec());
            ans.append(&mut u16::to_le_bytes(num).to_vec());
            ans.append(&mut tokens.clone());
            ans.push(0);
            addr = next_addr;
        }
        ans.push(0);
        ans.push(0);
        Ok(ans)
    }
    /// Detokenize from byte array into a UTF8 string
    pub fn detokenize(&self,img: &[u8]) -> Result<String,DYNERR> {
        let mut addr = 0;
        let mut code = String::new();
        while addr+1 < img.len() && (img[addr]!=0 || img[addr+1]!=0) {
            addr += 2; // skip link address
            if addr+2 > img.len() {
                return Err(Box::new(lang::Error::Detokenization));
            }
            let line_num = u16::from_le_bytes([img[addr],img[addr+1]]);
            code += &format!("{} ",line_num);
            addr += 2;
            while addr < img.len() && img[addr]!=0 {
                if img[addr]>127 {
                    let tok = match self.detok_map.get(&img[addr]) {
                        Some(s) => *s,
                        None => return Err(Box::new(lang::Error::Detokenization))
                    };
                    // keep keywords separated from surrounding words
                    if code.ends_with(|c: char| c.is_ascii_alphanumeric()) && tok.starts_with(|c: char| c.is_ascii_alphabetic()) {
                        code += " ";
                    }
                    code += tok;
                    if tok.ends_with(|c: char| c.is_ascii_alphanumeric() || c=='$') {
                        code += " ";
                    }
                } else {
                    code.push(img[addr] as char);
                }
                addr += 1;
            }
            code += "\n";
            addr += 1;
        }
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_spaces(s: &str) -> String {
        // whitespace outside quotes is not significant
        let mut ans = String::new();
        let mut in_str = false;
        for c in s.chars() {
            if c=='"' {
                in_str = !in_str;
            }
            if c!=' ' || in_str {
                ans.push(c);
            }
        }
        ans
    }

    #[test]
    fn token_count() {
        assert_eq!(KEYWORDS.len(),107);
        let tok = Tokenizer::new();
        assert_eq!(tok.detok_map.get(&0x80),Some(&"END"));
        assert_eq!(tok.detok_map.get(&0xea),Some(&"MID$"));
        assert_eq!(tok.detok_map.get(&0xba),Some(&"PRINT"));
    }

    #[test]
    fn print_goto() {
        let tok = Tokenizer::new();
        let prog = tok.tokenize("10 PRINT \"A\":GOTO 10\n",0x801).expect("tokenize failed");
        assert_eq!(prog[4..13],[0xba,0x22,0x41,0x22,0x3a,0xab,0x31,0x30,0x00]);
        assert_eq!(prog[prog.len()-2..],[0,0]);
    }

    #[test]
    fn link_addresses() {
        let tok = Tokenizer::new();
        let prog = tok.tokenize("10 PRINT \"HI\"\n20 END\n",0x801).expect("tokenize failed");
        assert_eq!(prog[0..2],[0x0b,0x08]);
        assert_eq!(prog[10..12],[0x11,0x08]);
        assert_eq!(prog.len(),18);
    }

    #[test]
    fn rem_tail_preserved() {
        let tok = Tokenizer::new();
        let prog = tok.tokenize("10 REM for next print\n",0x801).expect("tokenize failed");
        // the tail must be verbatim text, not tokens
        assert_eq!(prog[4],TOK_REM);
        assert_eq!(&prog[5..20],b" for next print");
        assert_eq!(prog[20],0);
    }

    #[test]
    fn round_trip() {
        let tok = Tokenizer::new();
        let src = "10 FOR I = 1 TO 10\n20 PRINT \"Hello World\";I\n30 NEXT I\n40 END\n";
        let prog = tok.tokenize(src,0x801).expect("tokenize failed");
        let back = tok.detokenize(&prog).expect("detokenize failed");
        let prog2 = tok.tokenize(&back,0x801).expect("tokenize failed");
        assert_eq!(prog,prog2);
        assert_eq!(strip_spaces(&back.to_uppercase()),strip_spaces(&src.to_uppercase()));
    }
}
