// tests of the ProDOS file system driver
use dskbench::img::{Img,DiskFormat};
use dskbench::fs::{DiskFS,prodos};

fn blank_140() -> prodos::Disk {
    let img = Img::blank(DiskFormat::ProDos140);
    let mut disk = prodos::Disk::from_img(img).expect("bad image");
    disk.format("NEW.DISK",None).expect("format failed");
    disk
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i*11+5) % 249) as u8).collect()
}

#[test]
fn format_usage() {
    // boot blocks, volume directory, and bitmap are the only users
    let mut disk = blank_140();
    let (used,free) = disk.usage().expect("usage failed");
    assert_eq!(used,7);
    assert_eq!(free,273);
    assert_eq!(used+free,280);
}

#[test]
fn seedling_sapling_boundary() {
    let mut disk = blank_140();
    disk.write_file("","EXACT","BIN",&patterned(512),0x2000).expect("write failed");
    disk.write_file("","OVER","BIN",&patterned(513),0x2000).expect("write failed");
    let cat = disk.catalog().expect("catalog failed");
    let exact = cat.iter().find(|f| f.name=="EXACT").expect("missing file");
    let over = cat.iter().find(|f| f.name=="OVER").expect("missing file");
    // a seedling is its single data block; the sapling adds an index block
    assert_eq!(exact.blocks,1);
    assert_eq!(over.blocks,3);
    assert_eq!(exact.size,512);
    assert_eq!(over.size,513);
}

#[test]
fn write_read_round_trip() {
    let mut disk = blank_140();
    let len0 = disk.get_img().len();
    let dat = patterned(8192);
    disk.write_file("","GAME","BIN",&dat,0x6000).expect("write failed");
    let back = disk.read_file("","GAME").expect("read failed");
    assert_eq!(back.data,dat);
    assert_eq!(back.load_addr,0x6000);
    assert_eq!(back.size,8192);
    assert_eq!(disk.get_img().len(),len0);
}

#[test]
fn subdirectories() {
    let mut disk = blank_140();
    disk.create_directory("","DEMO").expect("mkdir failed");
    let tokens = dskbench::lang::applesoft::Tokenizer::new()
        .tokenize("10 PRINT \"HI\"\n20 END\n",0x801).expect("tokenize failed");
    disk.write_file("DEMO","HELLO","APP",&tokens,0x801).expect("write failed");
    let cat = disk.catalog().expect("catalog failed");
    let dir = cat.iter().find(|f| f.name=="DEMO").expect("missing dir");
    assert!(dir.is_dir);
    let hello = cat.iter().find(|f| f.name=="HELLO").expect("missing file");
    assert_eq!(hello.path,"DEMO");
    assert_eq!(hello.qualified_name(),"DEMO/HELLO");
    assert_eq!(hello.size,tokens.len());
    // the tokenized stream loads at 0x801, so it begins with the 0x080B link
    let back = disk.read_file("DEMO","HELLO").expect("read failed");
    assert_eq!(back.data[0..2],[0x0b,0x08]);
    // a directory with a live entry will not go away
    match disk.delete("","DEMO") {
        Ok(()) => panic!("delete should have failed"),
        Err(e) => assert_eq!(e.to_string(),"directory not empty")
    }
    disk.delete("DEMO","HELLO").expect("delete failed");
    disk.delete("","DEMO").expect("delete failed");
    let (used,free) = disk.usage().expect("usage failed");
    assert_eq!(used,7);
    assert_eq!(free,273);
}

#[test]
fn rename_limits() {
    let mut disk = blank_140();
    disk.write_file("","SHORT","BIN",&patterned(10),0).expect("write failed");
    match disk.rename("","SHORT","ABCDEFGHIJKLMNOP") {
        Ok(()) => panic!("rename should have failed"),
        Err(e) => assert_eq!(e.to_string(),"name too long")
    }
    // 15 characters is accepted
    disk.rename("","SHORT","ABCDEFGHIJKLMNO").expect("rename failed");
    assert!(disk.read_file("","ABCDEFGHIJKLMNO").is_ok());
    assert!(disk.read_file("","SHORT").is_err());
    match disk.rename("","ABCDEFGHIJKLMNO","BAD NAME") {
        Ok(()) => panic!("rename should have failed"),
        Err(e) => assert_eq!(e.to_string(),"could not parse name or path")
    }
}

#[test]
fn lock_unlock_delete() {
    let mut disk = blank_140();
    disk.write_file("","PRECIOUS","TXT",b"KEEP ME",0).expect("write failed");
    disk.set_locked("","PRECIOUS",true).expect("lock failed");
    match disk.delete("","PRECIOUS") {
        Ok(()) => panic!("delete should have failed"),
        Err(e) => assert_eq!(e.to_string(),"file is locked")
    }
    let cat = disk.catalog().expect("catalog failed");
    assert!(cat[0].locked);
    // unlock restores read and write
    disk.set_locked("","PRECIOUS",false).expect("unlock failed");
    let back = disk.read_file("","PRECIOUS").expect("read failed");
    assert_eq!(back.data,b"KEEP ME");
    disk.write_file("","PRECIOUS","TXT",b"REPLACED",0).expect("write failed");
    disk.delete("","PRECIOUS").expect("delete failed");
}

#[test]
fn bitmap_matches_reachable_blocks() {
    let mut disk = blank_140();
    disk.create_directory("","SUB").expect("mkdir failed");
    disk.write_file("","A","BIN",&patterned(700),0x300).expect("write failed");
    disk.write_file("SUB","B","TXT",&patterned(100),0).expect("write failed");
    let cat = disk.catalog().expect("catalog failed");
    let reachable: usize = cat.iter().map(|f| f.blocks).sum();
    let (used,_free) = disk.usage().expect("usage failed");
    // system blocks: two boot, four directory, one bitmap
    assert_eq!(used,7+reachable);
}

#[test]
fn tree_files() {
    let img = Img::blank(DiskFormat::ProDos800);
    let mut disk = prodos::Disk::from_img(img).expect("bad image");
    disk.format("BIG.DISK",None).expect("format failed");
    let dat = patterned(200000);
    disk.write_file("","HUGE","BIN",&dat,0x2000).expect("write failed");
    let cat = disk.catalog().expect("catalog failed");
    // 391 data blocks, 2 index blocks, 1 master index
    assert_eq!(cat[0].blocks,394);
    let back = disk.read_file("","HUGE").expect("read failed");
    assert_eq!(back.data,dat);
}

#[test]
fn overwrite_replaces() {
    let mut disk = blank_140();
    disk.write_file("","PROG","BIN",&patterned(4000),0x800).expect("write failed");
    let (_,free1) = disk.usage().expect("usage failed");
    disk.write_file("","PROG","BIN",&patterned(4000),0x800).expect("rewrite failed");
    let (_,free2) = disk.usage().expect("usage failed");
    assert_eq!(free1,free2);
    assert_eq!(disk.catalog().expect("catalog failed").len(),1);
}
