//! # Shell Module
//!
//! The interactive command layer: a registry of commands with argument
//! bounds and mount preconditions, a quoting-aware line tokenizer, glob
//! matching over catalogs, and the read-eval loop itself.  All state
//! lives in an explicit `Session` that is threaded through the handlers.

mod session;
mod glob;
mod commands;
mod xfer;

pub use session::{Session,Volume,MAXVOL};
pub use glob::{glob_regex,glob_disk,parse_slot_path};
pub use xfer::{decorated_name,parse_decoration,extract_file,put_file};

use std::rc::Rc;
use std::cell::RefCell;
use rustyline::completion::{Completer,Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context,Editor,Helper};
use rustyline::history::DefaultHistory;
use crate::STDRESULT;

/// Return code that ends the session.
pub const EXIT_CODE: i32 = 999;

/// Enumerates shell and mount manager errors.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("no disk mounted in slot")]
    NotMounted,
    #[error("no free slots")]
    NoFreeSlots,
    #[error("image is already mounted")]
    AlreadyMounted,
    #[error("invalid slot number")]
    BadSlot,
    #[error("bad argument")]
    BadArgument
}

/// What a command's trailing argument completes against.
#[derive(PartialEq,Clone,Copy)]
pub enum CompletionContext {
    None,
    LocalPath,
    DiskFile,
    Command
}

pub struct ShellCommand {
    pub name: &'static str,
    pub description: &'static str,
    /// -1 disables the bound
    pub min_args: i32,
    /// -1 disables the bound
    pub max_args: i32,
    pub needs_mount: bool,
    pub context: CompletionContext,
    pub help: &'static [&'static str],
    pub code: fn(&mut Session,&[String]) -> i32
}

pub const COMMANDS: &[ShellCommand] = &[
    ShellCommand {
        name: "mount",
        description: "Mount a disk image",
        min_args: 1, max_args: 1, needs_mount: false,
        context: CompletionContext::LocalPath,
        help: &["mount <diskfile>","","Mounts disk and switches to the new slot"],
        code: commands::mount
    },
    ShellCommand {
        name: "unmount",
        description: "Unmount disk image",
        min_args: 0, max_args: 1, needs_mount: true,
        context: CompletionContext::None,
        help: &["unmount <slot>","","Unmount the disk in the specified slot (or current slot)"],
        code: commands::unmount
    },
    ShellCommand {
        name: "target",
        description: "Select mounted volume as default",
        min_args: 1, max_args: 1, needs_mount: false,
        context: CompletionContext::None,
        help: &["target <slot>","","Select slot as default for commands"],
        code: commands::target
    },
    ShellCommand {
        name: "disks",
        description: "List mounted volumes",
        min_args: 0, max_args: 0, needs_mount: false,
        context: CompletionContext::None,
        help: &["disks","","List all mounted volumes"],
        code: commands::disks
    },
    ShellCommand {
        name: "cat",
        description: "Display file information",
        min_args: 0, max_args: 1, needs_mount: true,
        context: CompletionContext::None,
        help: &["cat [<pattern>]","","List files on current disk (can use wildcards)."],
        code: commands::cat
    },
    ShellCommand {
        name: "info",
        description: "Information about the current disk",
        min_args: -1, max_args: -1, needs_mount: true,
        context: CompletionContext::None,
        help: &["info","","Display information on current disk"],
        code: commands::info
    },
    ShellCommand {
        name: "analyze",
        description: "Report disk geometry and usage",
        min_args: -1, max_args: -1, needs_mount: true,
        context: CompletionContext::None,
        help: &["analyze","","Display detailed information on current disk"],
        code: commands::analyze
    },
    ShellCommand {
        name: "ls",
        description: "List local files",
        min_args: 0, max_args: 999, needs_mount: false,
        context: CompletionContext::LocalPath,
        help: &["ls <pattern>","","List local files"],
        code: commands::ls
    },
    ShellCommand {
        name: "cd",
        description: "Change working path on the current disk",
        min_args: 0, max_args: 1, needs_mount: true,
        context: CompletionContext::DiskFile,
        help: &["cd <path>","","Change the working path used by file commands"],
        code: commands::cd
    },
    ShellCommand {
        name: "extract",
        description: "Extract file from disk image",
        min_args: 1, max_args: -1, needs_mount: true,
        context: CompletionContext::DiskFile,
        help: &["extract <filename|pattern>","","Extracts files from current disk"],
        code: commands::extract
    },
    ShellCommand {
        name: "put",
        description: "Copy local file to disk",
        min_args: 1, max_args: 1, needs_mount: true,
        context: CompletionContext::LocalPath,
        help: &["put <local file>","","Write local file to current disk"],
        code: commands::put
    },
    ShellCommand {
        name: "delete",
        description: "Remove file from disk",
        min_args: 1, max_args: 1, needs_mount: true,
        context: CompletionContext::DiskFile,
        help: &["delete <filename>","","Delete file from current disk"],
        code: commands::delete
    },
    ShellCommand {
        name: "rename",
        description: "Rename a file on the disk",
        min_args: 2, max_args: 2, needs_mount: true,
        context: CompletionContext::DiskFile,
        help: &["rename <filename> <new filename>","","Rename a file on a disk."],
        code: commands::rename
    },
    ShellCommand {
        name: "lock",
        description: "Lock file on the disk",
        min_args: 1, max_args: 1, needs_mount: true,
        context: CompletionContext::DiskFile,
        help: &["lock <diskfile>","","Make file on disk read-only"],
        code: commands::lock
    },
    ShellCommand {
        name: "unlock",
        description: "Unlock file on the disk",
        min_args: 1, max_args: 1, needs_mount: true,
        context: CompletionContext::DiskFile,
        help: &["unlock <diskfile>","","Make file on disk writable"],
        code: commands::unlock
    },
    ShellCommand {
        name: "mkdir",
        description: "Create a directory on disk",
        min_args: 1, max_args: 1, needs_mount: true,
        context: CompletionContext::DiskFile,
        help: &["mkdir <directory>","","Create directory on current disk (if supported)"],
        code: commands::mkdir
    },
    ShellCommand {
        name: "copy",
        description: "Copy files from one volume to another",
        min_args: 2, max_args: 999, needs_mount: false,
        context: CompletionContext::DiskFile,
        help: &["copy [<slot>:]<pattern> <slot>:[<path>]","",
            "Copy files from one mounted disk to another.","Example:","copy 0:*.system 1:"],
        code: commands::copy
    },
    ShellCommand {
        name: "move",
        description: "Move files from one volume to another",
        min_args: 2, max_args: 999, needs_mount: false,
        context: CompletionContext::DiskFile,
        help: &["move [<slot>:]<pattern> <slot>:[<path>]","",
            "Move files from one mounted disk to another.","Example:","move 0:*.system 1:"],
        code: commands::mv
    },
    ShellCommand {
        name: "ingest",
        description: "Scan a directory of disks (or single disk)",
        min_args: 1, max_args: 1, needs_mount: false,
        context: CompletionContext::LocalPath,
        help: &["ingest <disk name>","","Walk and classify disk images under a path."],
        code: commands::ingest
    },
    ShellCommand {
        name: "help",
        description: "Shows this help",
        min_args: 0, max_args: 1, needs_mount: false,
        context: CompletionContext::Command,
        help: &["help <command>","","Display specific help for command or list of commands"],
        code: commands::help
    },
    ShellCommand {
        name: "quit",
        description: "Leave this place",
        min_args: -1, max_args: -1, needs_mount: false,
        context: CompletionContext::None,
        help: &[],
        code: commands::quit
    }
];

pub fn find_command(verb: &str) -> Option<&'static ShellCommand> {
    COMMANDS.iter().find(|c| c.name==verb)
}

/// Split a command line into verb and arguments.  Double quotes group,
/// backslash escapes the next character, an unbalanced quote swallows
/// the remainder as one token.
pub fn smart_split(line: &str) -> (String,Vec<String>) {
    let mut out: Vec<String> = Vec::new();
    let mut chunk = String::new();
    let mut inqq = false;
    let mut escape = false;
    fn add(chunk: &mut String,out: &mut Vec<String>) {
        if chunk.len()>0 {
            out.push(chunk.clone());
            chunk.clear();
        }
    }
    for ch in line.chars() {
        if escape {
            chunk.push(ch);
            escape = false;
            continue;
        }
        match ch {
            '"' => {
                inqq = !inqq;
                add(&mut chunk,&mut out);
            },
            ' ' => {
                if inqq {
                    chunk.push(ch);
                } else {
                    add(&mut chunk,&mut out);
                }
            },
            '\\' => {
                escape = true;
            },
            _ => chunk.push(ch)
        }
    }
    add(&mut chunk,&mut out);
    match out.len() {
        0 => (String::new(),Vec::new()),
        _ => (out[0].clone(),out[1..].to_vec())
    }
}

/// Dispatch one line: resolve the verb, check arity and mount
/// preconditions, and run the handler.  Returns the command's code.
pub fn process_line(sess: &mut Session,line: &str) -> i32 {
    let (verb,args) = smart_split(line.trim());
    if verb.len()==0 {
        return 0;
    }
    let verb = verb.to_lowercase();
    let command = match find_command(&verb) {
        Some(c) => c,
        None => {
            eprintln!("Unrecognized command: {}",verb);
            return -1;
        }
    };
    println!();
    let mut cok = true;
    if command.min_args != -1 && (args.len() as i32) < command.min_args {
        eprintln!("{} expects at least {} arguments",verb,command.min_args);
        cok = false;
    }
    if command.max_args != -1 && (args.len() as i32) > command.max_args {
        eprintln!("{} expects at most {} arguments",verb,command.max_args);
        cok = false;
    }
    if command.needs_mount && !sess.has_target() {
        eprintln!("{} only works on mounted disks",verb);
        cok = false;
    }
    if !cok {
        return -1;
    }
    let r = (command.code)(sess,&args);
    println!();
    r
}

/// Completion helper for the line reader.  The first token selects the
/// command; the token under the cursor completes against that command's
/// context.
pub struct ShellHelper {
    session: Rc<RefCell<Session>>
}

fn escape_spaces(s: &str) -> String {
    s.replace(' ',"\\ ")
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(&self,line: &str,pos: usize,_ctx: &Context<'_>) -> rustyline::Result<(usize,Vec<Pair>)> {
        let head: String = line.chars().take_while(|c| *c!=' ').collect();
        let context = match (find_command(&head.to_lowercase()),line.contains(' ')) {
            (Some(cmd),true) => cmd.context,
            _ => CompletionContext::Command
        };
        // find the token under the cursor, honoring escaped spaces
        let mut start = 0;
        let mut escape = false;
        let mut idx = 0;
        for ch in line[0..pos].chars() {
            let l = ch.len_utf8();
            if escape {
                escape = false;
            } else if ch=='\\' {
                escape = true;
            } else if ch==' ' {
                start = idx+l;
            }
            idx += l;
        }
        let cprefix = line[start..pos].replace('\\',"");
        let mut items: Vec<String> = Vec::new();
        match context {
            CompletionContext::Command => {
                for cmd in COMMANDS {
                    items.push(cmd.name.to_string());
                }
            },
            CompletionContext::DiskFile => {
                let mut sess = self.session.borrow_mut();
                if let Ok(vol) = sess.current() {
                    if let Ok(catalog) = vol.fs.catalog() {
                        for f in catalog {
                            items.push(f.qualified_name());
                        }
                    }
                }
            },
            CompletionContext::LocalPath => {
                let (dir,_base) = match cprefix.rsplit_once('/') {
                    Some((d,b)) => (d.to_string()+"/",b.to_string()),
                    None => (String::new(),cprefix.clone())
                };
                let scan = match dir.len() {
                    0 => ".".to_string(),
                    _ => dir.clone()
                };
                if let Ok(listing) = std::fs::read_dir(&scan) {
                    for entry in listing.flatten() {
                        items.push(format!("{}{}",dir,entry.file_name().to_string_lossy()));
                    }
                }
            },
            CompletionContext::None => {}
        }
        let pairs: Vec<Pair> = items.iter()
            .filter(|s| s.starts_with(&cprefix))
            .map(|s| Pair { display: s.clone(), replacement: escape_spaces(s) })
            .collect();
        Ok((start,pairs))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}
impl Highlighter for ShellHelper {}
impl Validator for ShellHelper {}
impl Helper for ShellHelper {}

/// The read-eval loop.  Returns when `quit` is issued or input ends.
pub fn run(session: Session) -> STDRESULT {
    let sess = Rc::new(RefCell::new(session));
    let mut rl: Editor<ShellHelper, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(ShellHelper { session: sess.clone() }));
    let history = sess.borrow().history_path();
    if let Some(parent) = history.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = rl.load_history(&history);
    loop {
        let prompt = sess.borrow().prompt();
        match rl.readline(&prompt) {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                let r = process_line(&mut sess.borrow_mut(),&line);
                if r==EXIT_CODE {
                    break;
                }
            },
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            },
            Err(ReadlineError::Eof) => {
                break;
            },
            Err(e) => {
                eprintln!("Error: {:?}",e);
                break;
            }
        }
    }
    let _ = rl.save_history(&history);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::smart_split;

    #[test]
    fn plain_tokens() {
        let (verb,args) = smart_split("copy 0:*.TXT 1:");
        assert_eq!(verb,"copy");
        assert_eq!(args,vec!["0:*.TXT","1:"]);
    }

    #[test]
    fn quoted_groups() {
        let (verb,args) = smart_split("mount \"my disk.dsk\"");
        assert_eq!(verb,"mount");
        assert_eq!(args,vec!["my disk.dsk"]);
    }

    #[test]
    fn escaped_space() {
        let (verb,args) = smart_split("mount my\\ disk.dsk");
        assert_eq!(verb,"mount");
        assert_eq!(args,vec!["my disk.dsk"]);
    }

    #[test]
    fn unbalanced_quote_takes_remainder() {
        let (verb,args) = smart_split("put \"unterminated name");
        assert_eq!(verb,"put");
        assert_eq!(args,vec!["unterminated name"]);
    }

    #[test]
    fn empty_line() {
        let (verb,args) = smart_split("   ");
        assert_eq!(verb,"");
        assert_eq!(args.len(),0);
    }
}
