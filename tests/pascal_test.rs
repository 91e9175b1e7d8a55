// tests of the Pascal file system driver (read only)
use dskbench::img::{Img,DiskFormat,SectorOrder};
use dskbench::fs::{DiskFS,pascal};

/// Build a small Pascal volume by hand: directory at block 2, one text
/// file spanning blocks 6..8 with 100 bytes used in the last block.
fn synthetic_pascal() -> Img {
    let mut img = Img::blank(DiskFormat::Pascal);
    let mut dir = vec![0u8;512];
    // volume header
    dir[0..2].copy_from_slice(&u16::to_le_bytes(0));
    dir[2..4].copy_from_slice(&u16::to_le_bytes(6));
    dir[4..6].copy_from_slice(&u16::to_le_bytes(0));
    dir[6] = 5;
    dir[7..12].copy_from_slice(b"APPLE");
    dir[14..16].copy_from_slice(&u16::to_le_bytes(280));
    dir[16..18].copy_from_slice(&u16::to_le_bytes(1));
    // first entry
    dir[26..28].copy_from_slice(&u16::to_le_bytes(6));
    dir[28..30].copy_from_slice(&u16::to_le_bytes(8));
    dir[30..32].copy_from_slice(&u16::to_le_bytes(3));
    dir[32] = 8;
    dir[33..41].copy_from_slice(b"DOC.TEXT");
    dir[48..50].copy_from_slice(&u16::to_le_bytes(100));
    img.write_block(2,&dir).expect("write failed");
    img.write_block(6,&[0x41;512]).expect("write failed");
    img.write_block(7,&[0x42;512]).expect("write failed");
    img
}

#[test]
fn detects_as_pascal() {
    let img = synthetic_pascal();
    let (format,order) = dskbench::img::detect(img.raw(),Some("po")).expect("detect failed");
    assert_eq!(format,DiskFormat::Pascal);
    assert_eq!(order,SectorOrder::Po);
}

#[test]
fn directory_walk() {
    let mut disk = pascal::Disk::from_img(synthetic_pascal()).expect("bad image");
    assert_eq!(disk.volume_name().expect("no name"),"APPLE");
    let cat = disk.catalog().expect("catalog failed");
    assert_eq!(cat.len(),1);
    assert_eq!(cat[0].name,"DOC.TEXT");
    assert_eq!(cat[0].kind,"TEXT");
    assert_eq!(cat[0].ext,"TXT");
    assert_eq!(cat[0].blocks,2);
    assert_eq!(cat[0].size,612);
}

#[test]
fn file_read() {
    let mut disk = pascal::Disk::from_img(synthetic_pascal()).expect("bad image");
    let f = disk.read_file("","DOC.TEXT").expect("read failed");
    assert_eq!(f.data.len(),612);
    assert_eq!(f.data[0],0x41);
    assert_eq!(f.data[511],0x41);
    assert_eq!(f.data[512],0x42);
}

#[test]
fn writes_are_refused() {
    let mut disk = pascal::Disk::from_img(synthetic_pascal()).expect("bad image");
    let expect = "operation not supported on this format";
    assert_eq!(disk.write_file("","NEW","TXT",b"X",0).unwrap_err().to_string(),expect);
    assert_eq!(disk.delete("","DOC.TEXT").unwrap_err().to_string(),expect);
    assert_eq!(disk.set_locked("","DOC.TEXT",true).unwrap_err().to_string(),expect);
    assert_eq!(disk.rename("","DOC.TEXT","NEW").unwrap_err().to_string(),expect);
    assert_eq!(disk.create_directory("","SUB").unwrap_err().to_string(),expect);
}

#[test]
fn usage_counts_directory_and_files() {
    let mut disk = pascal::Disk::from_img(synthetic_pascal()).expect("bad image");
    let (used,free) = disk.usage().expect("usage failed");
    assert_eq!(used,8);
    assert_eq!(free,272);
}
