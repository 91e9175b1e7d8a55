// tests of the DOS 3.3 file system driver
use dskbench::img::{Img,DiskFormat};
use dskbench::fs::{DiskFS,dos33};

fn blank_dos16() -> dos33::Disk {
    let img = Img::blank(DiskFormat::Dos16);
    let mut disk = dos33::Disk::from_img(img).expect("bad image");
    disk.init(254).expect("failed to init");
    disk
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i*7+3) % 251) as u8).collect()
}

#[test]
fn sector_accounting() {
    // boot track and catalog track are used, the rest is free
    let mut disk = blank_dos16();
    let (used,free) = disk.usage().expect("usage failed");
    assert_eq!(used+free,560);
    assert_eq!(used,32);

    let img = Img::blank(DiskFormat::Dos13);
    let mut disk = dos33::Disk::from_img(img).expect("bad image");
    disk.init(254).expect("failed to init");
    let (used,free) = disk.usage().expect("usage failed");
    assert_eq!(used+free,455);
    assert_eq!(used,26);
}

#[test]
fn binary_round_trip() {
    let mut disk = blank_dos16();
    let len0 = disk.get_img().len();
    let dat = patterned(8192);
    disk.write_file("","GAME","BIN",&dat,0x6000).expect("write failed");
    let back = disk.read_file("","GAME").expect("read failed");
    assert_eq!(back.data,dat);
    assert_eq!(back.load_addr,0x6000);
    assert_eq!(back.ext,"BIN");
    // 8196 payload bytes round up to 33 data sectors plus one T/S list
    let cat = disk.catalog().expect("catalog failed");
    assert_eq!(cat.len(),1);
    assert_eq!(cat[0].blocks,34);
    assert_eq!(disk.get_img().len(),len0);
}

#[test]
fn text_round_trip() {
    let mut disk = blank_dos16();
    let dat = b"HELLO FROM THE WORKBENCH".to_vec();
    disk.write_file("","NOTES","TXT",&dat,0).expect("write failed");
    let back = disk.read_file("","NOTES").expect("read failed");
    assert_eq!(back.data,dat);
    assert_eq!(back.load_addr,0);
}

#[test]
fn lock_blocks_delete() {
    let mut disk = blank_dos16();
    disk.write_file("","PRECIOUS","BIN",&patterned(100),0x300).expect("write failed");
    disk.set_locked("","PRECIOUS",true).expect("lock failed");
    match disk.delete("","PRECIOUS") {
        Ok(()) => panic!("delete should have failed"),
        Err(e) => assert_eq!(e.to_string(),"file is locked")
    }
    match disk.rename("","PRECIOUS","NEWNAME") {
        Ok(()) => panic!("rename should have failed"),
        Err(e) => assert_eq!(e.to_string(),"file is locked")
    }
    disk.set_locked("","PRECIOUS",false).expect("unlock failed");
    disk.delete("","PRECIOUS").expect("delete failed");
}

#[test]
fn delete_frees_and_reclaims() {
    let mut disk = blank_dos16();
    let (_,free0) = disk.usage().expect("usage failed");
    disk.write_file("","FIRST","BIN",&patterned(1000),0x2000).expect("write failed");
    disk.write_file("","SECOND","BIN",&patterned(1000),0x2000).expect("write failed");
    disk.delete("","FIRST").expect("delete failed");
    let (_,free1) = disk.usage().expect("usage failed");
    // only SECOND's sectors remain allocated
    let cat = disk.catalog().expect("catalog failed");
    assert_eq!(cat.len(),1);
    assert_eq!(free0-free1,cat[0].blocks);
    // the next write reclaims the deleted catalog slot
    disk.write_file("","THIRD","TXT",b"T",0).expect("write failed");
    let cat = disk.catalog().expect("catalog failed");
    assert_eq!(cat.len(),2);
    assert_eq!(cat[0].name,"THIRD");
    assert_eq!(cat[1].name,"SECOND");
}

#[test]
fn overwrite_replaces() {
    let mut disk = blank_dos16();
    disk.write_file("","PROG","BIN",&patterned(4000),0x800).expect("write failed");
    let (_,free1) = disk.usage().expect("usage failed");
    disk.write_file("","PROG","BIN",&patterned(4000),0x800).expect("rewrite failed");
    let (_,free2) = disk.usage().expect("usage failed");
    assert_eq!(free1,free2);
    assert_eq!(disk.catalog().expect("catalog failed").len(),1);
}

#[test]
fn disk_full() {
    let mut disk = blank_dos16();
    // each of these takes 128 data sectors and 2 T/S list sectors
    let big = patterned(0x7f00);
    for name in ["F1","F2","F3","F4"] {
        disk.write_file("",name,"BIN",&big,0x800).expect("write failed");
    }
    let (_,free) = disk.usage().expect("usage failed");
    assert_eq!(free,8);
    // exactly fill the last free sectors
    disk.write_file("","FILLER","TXT",&patterned(1792),0).expect("write failed");
    let (_,free) = disk.usage().expect("usage failed");
    assert_eq!(free,0);
    match disk.write_file("","TOOMUCH","TXT",b"X",0) {
        Ok(_) => panic!("write should have failed"),
        Err(e) => assert_eq!(e.to_string(),"no space left on volume")
    }
}

#[test]
fn basic_file_types() {
    let mut disk = blank_dos16();
    let tokens = dskbench::lang::applesoft::Tokenizer::new()
        .tokenize("10 PRINT \"HI\"\n20 END\n",0x801).expect("tokenize failed");
    disk.write_file("","HELLO","APP",&tokens,0x801).expect("write failed");
    let cat = disk.catalog().expect("catalog failed");
    assert_eq!(cat[0].ext,"APP");
    assert_eq!(cat[0].kind,"AppleSoft BASIC");
    let back = disk.read_file("","HELLO").expect("read failed");
    assert_eq!(back.data,tokens);
    assert_eq!(back.load_addr,0x801);
}
