//! # Interactive disk workbench
//!
//! Starts the shell, optionally mounting images named on the command
//! line.  Set the RUST_LOG environment variable to control logging level.
//!   levels: trace,debug,info,warn,error

use clap::{Arg,Command};
use dskbench::shell;

fn main() -> Result<(),Box<dyn std::error::Error>> {
    env_logger::init();
    let matches = Command::new("dskbench")
        .about("Interactive workbench for Apple II disk images.")
        .after_help("Inside the shell, `help` lists the available commands.
Mutating commands back up the image file before overwriting it;
backups land under the configuration directory.")
        .arg(Arg::new("dimg")
            .value_name("IMAGE")
            .help("disk image(s) to mount at startup")
            .num_args(0..))
        .get_matches();

    let conf_dir = match dirs::home_dir() {
        Some(home) => home.join(".dskbench"),
        None => std::path::PathBuf::from(".dskbench")
    };
    let mut session = shell::Session::new(conf_dir);
    if let Some(images) = matches.get_many::<String>("dimg") {
        for path in images {
            match session.mount(path) {
                Ok(slot) => eprintln!("mounted {} in slot {}",path,slot),
                Err(e) => eprintln!("could not mount {}: {}",path,e)
            }
        }
    }
    shell::run(session)
}
