// end to end tests of the session, mount manager, and shell dispatch
use std::path::{Path,PathBuf};
use dskbench::img::{Img,DiskFormat};
use dskbench::fs::{DiskFS,dos33,prodos};
use dskbench::shell;

/// Fresh scratch area and a session whose configuration lives inside it.
fn setup(name: &str) -> (PathBuf,shell::Session) {
    let root = std::env::temp_dir().join(format!("dskbench-{}-{}",name,std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    std::fs::create_dir_all(&root).expect("could not create scratch area");
    let session = shell::Session::new(root.join("conf"));
    (root,session)
}

fn make_prodos(dir: &Path,fname: &str,vol: &str) -> PathBuf {
    let mut disk = prodos::Disk::from_img(Img::blank(DiskFormat::ProDos140)).expect("bad image");
    disk.format(vol,None).expect("format failed");
    let full = dir.join(fname);
    std::fs::write(&full,disk.get_img().to_bytes()).expect("could not write image");
    full
}

fn make_dos(dir: &Path,fname: &str) -> PathBuf {
    let mut disk = dos33::Disk::from_img(Img::blank(DiskFormat::Dos16)).expect("bad image");
    disk.init(254).expect("init failed");
    let full = dir.join(fname);
    std::fs::write(&full,disk.get_img().to_bytes()).expect("could not write image");
    full
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i*13+7) % 255) as u8).collect()
}

#[test]
fn mount_twice_returns_same_slot() {
    let (root,mut sess) = setup("remount");
    let img_path = make_prodos(&root,"work.po","WORK");
    let before = std::fs::read(&img_path).expect("read failed");
    let first = sess.mount(img_path.to_str().unwrap()).expect("mount failed");
    let second = sess.mount(img_path.to_str().unwrap()).expect("mount failed");
    assert_eq!(first,second);
    assert_eq!(sess.disks().len(),1);
    sess.unmount(None).expect("unmount failed");
    let third = sess.mount(img_path.to_str().unwrap()).expect("mount failed");
    assert_eq!(first,third);
    // none of that touched the file
    assert_eq!(std::fs::read(&img_path).expect("read failed"),before);
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn slot_table_fills_in_order() {
    let (root,mut sess) = setup("slots");
    let a = make_prodos(&root,"a.po","VOL.A");
    let b = make_prodos(&root,"b.po","VOL.B");
    assert_eq!(sess.mount(a.to_str().unwrap()).expect("mount failed"),0);
    assert_eq!(sess.mount(b.to_str().unwrap()).expect("mount failed"),1);
    assert_eq!(sess.current_slot(),Some(1));
    sess.unmount(Some(0)).expect("unmount failed");
    let c = make_prodos(&root,"c.po","VOL.C");
    assert_eq!(sess.mount(c.to_str().unwrap()).expect("mount failed"),0);
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn put_extract_round_trip() {
    let (root,mut sess) = setup("xfer");
    let img_path = make_prodos(&root,"work.po","WORK");
    let payload = patterned(8192);
    let local = root.join("GAME#0x6000.BIN");
    std::fs::write(&local,&payload).expect("could not write local file");
    let slot = sess.mount(img_path.to_str().unwrap()).expect("mount failed");
    let native = shell::put_file(&mut sess,local.to_str().unwrap()).expect("put failed");
    assert_eq!(native,"GAME");
    sess.save(slot).expect("save failed");
    // the catalog entry preserves name, type, and load address
    let files = shell::glob_disk(&mut sess,slot,"GAME").expect("glob failed");
    assert_eq!(files.len(),1);
    assert_eq!(files[0].ext,"BIN");
    assert_eq!(files[0].load_addr,0x6000);
    assert_eq!(files[0].size,8192);
    assert_eq!(files[0].data,payload);
    // extraction restores the decorated name and the exact payload
    let out = shell::extract_file(&files[0],&root).expect("extract failed");
    assert_eq!(out.file_name().unwrap().to_string_lossy(),"GAME#0x6000.BIN");
    // saving made a backup of the pre-write image
    let backups = sess.conf_dir().join("backup");
    assert!(std::fs::read_dir(&backups).expect("no backup dir").count()>0);
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn put_tokenizes_basic_source() {
    let (root,mut sess) = setup("tokens");
    let img_path = make_dos(&root,"work.dsk");
    let local = root.join("HELLO.APP.ASC");
    std::fs::write(&local,"10 PRINT \"HI\"\n20 END\n").expect("could not write local file");
    let slot = sess.mount(img_path.to_str().unwrap()).expect("mount failed");
    let native = shell::put_file(&mut sess,local.to_str().unwrap()).expect("put failed");
    assert_eq!(native,"HELLO");
    let files = shell::glob_disk(&mut sess,slot,"HELLO").expect("glob failed");
    assert_eq!(files[0].ext,"APP");
    assert_eq!(files[0].size,18);
    assert_eq!(files[0].data[0..2],[0x0b,0x08]);
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn copy_between_volumes() {
    let (root,mut sess) = setup("copy");
    // source volume with two text files and a binary
    let src_path = {
        let mut disk = prodos::Disk::from_img(Img::blank(DiskFormat::ProDos140)).expect("bad image");
        disk.format("SRC",None).expect("format failed");
        disk.write_file("","ALPHA.TXT","TXT",b"FIRST TEXT",0).expect("write failed");
        disk.write_file("","BETA.TXT","TXT",b"SECOND TEXT",0).expect("write failed");
        disk.write_file("","GAMMA","BIN",&patterned(600),0x300).expect("write failed");
        let full = root.join("src.po");
        std::fs::write(&full,disk.get_img().to_bytes()).expect("could not write image");
        full
    };
    let dst_path = make_prodos(&root,"dst.po","DST");
    let src_before = std::fs::read(&src_path).expect("read failed");
    sess.mount(src_path.to_str().unwrap()).expect("mount failed");
    sess.mount(dst_path.to_str().unwrap()).expect("mount failed");
    let code = shell::process_line(&mut sess,"copy 0:*.TXT 1:");
    assert_eq!(code,0);
    // both text files arrive intact, the binary stays behind
    let copied = shell::glob_disk(&mut sess,1,"*").expect("glob failed");
    assert_eq!(copied.len(),2);
    let alpha = copied.iter().find(|f| f.name=="ALPHA.TXT").expect("missing file");
    assert_eq!(alpha.data,b"FIRST TEXT");
    // source volume file is untouched on the host
    assert_eq!(std::fs::read(&src_path).expect("read failed"),src_before);
    // destination was saved, and saving produced a backup
    assert!(std::fs::read(&dst_path).expect("read failed")!=Img::blank(DiskFormat::ProDos140).to_bytes());
    assert!(std::fs::read_dir(sess.conf_dir().join("backup")).expect("no backup dir").count()>0);
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn move_deletes_sources() {
    let (root,mut sess) = setup("move");
    let src_path = {
        let mut disk = prodos::Disk::from_img(Img::blank(DiskFormat::ProDos140)).expect("bad image");
        disk.format("SRC",None).expect("format failed");
        disk.write_file("","NOTES.TXT","TXT",b"MOVING DAY",0).expect("write failed");
        let full = root.join("src.po");
        std::fs::write(&full,disk.get_img().to_bytes()).expect("could not write image");
        full
    };
    let dst_path = make_prodos(&root,"dst.po","DST");
    sess.mount(src_path.to_str().unwrap()).expect("mount failed");
    sess.mount(dst_path.to_str().unwrap()).expect("mount failed");
    assert_eq!(shell::process_line(&mut sess,"move 0:NOTES.TXT 1:"),0);
    assert_eq!(shell::glob_disk(&mut sess,1,"*").expect("glob failed").len(),1);
    assert_eq!(shell::glob_disk(&mut sess,0,"*").expect("glob failed").len(),0);
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn dispatch_rules() {
    let (root,mut sess) = setup("dispatch");
    assert_eq!(shell::process_line(&mut sess,""),0);
    assert_eq!(shell::process_line(&mut sess,"frobnicate"),-1);
    // mount precondition blocks the handler
    assert_eq!(shell::process_line(&mut sess,"cat"),-1);
    // arity is checked before the handler runs
    assert_eq!(shell::process_line(&mut sess,"target"),-1);
    assert_eq!(shell::process_line(&mut sess,"help"),0);
    assert_eq!(shell::process_line(&mut sess,"quit"),shell::EXIT_CODE);
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn working_path_follows_cd() {
    let (root,mut sess) = setup("cd");
    let img_path = {
        let mut disk = prodos::Disk::from_img(Img::blank(DiskFormat::ProDos140)).expect("bad image");
        disk.format("WORK",None).expect("format failed");
        disk.create_directory("","DEMO").expect("mkdir failed");
        let full = root.join("work.po");
        std::fs::write(&full,disk.get_img().to_bytes()).expect("could not write image");
        full
    };
    sess.mount(img_path.to_str().unwrap()).expect("mount failed");
    assert_eq!(shell::process_line(&mut sess,"cd DEMO"),0);
    assert_eq!(sess.work_path,"DEMO");
    assert!(sess.prompt().contains("DEMO"));
    // a missing directory leaves the working path alone
    assert_eq!(shell::process_line(&mut sess,"cd NOWHERE"),-1);
    assert_eq!(sess.work_path,"DEMO");
    assert_eq!(shell::process_line(&mut sess,"cd /"),0);
    assert_eq!(sess.work_path,"");
    let _ = std::fs::remove_dir_all(&root);
}
