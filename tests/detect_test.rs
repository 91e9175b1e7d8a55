// tests of format classification
use dskbench::img::{self,Img,DiskFormat,SectorOrder,DOS_PRODOS_SKEW,SECTOR_SIZE};
use dskbench::fs::{DiskFS,dos33,prodos};

fn formatted_dos16() -> Vec<u8> {
    let mut disk = dos33::Disk::from_img(Img::blank(DiskFormat::Dos16)).expect("bad image");
    disk.init(254).expect("init failed");
    disk.get_img().to_bytes()
}

fn formatted_prodos(format: DiskFormat) -> Vec<u8> {
    let mut disk = prodos::Disk::from_img(Img::blank(format)).expect("bad image");
    disk.format("NEW.DISK",None).expect("format failed");
    disk.get_img().to_bytes()
}

#[test]
fn dos16_detects() {
    let dsk = formatted_dos16();
    let (format,order) = img::detect(&dsk,Some("dsk")).expect("detect failed");
    assert_eq!(format,DiskFormat::Dos16);
    assert_eq!(order,SectorOrder::Do);
}

#[test]
fn dos13_detects() {
    let mut disk = dos33::Disk::from_img(Img::blank(DiskFormat::Dos13)).expect("bad image");
    disk.init(254).expect("init failed");
    let dsk = disk.get_img().to_bytes();
    let (format,order) = img::detect(&dsk,Some("d13")).expect("detect failed");
    assert_eq!(format,DiskFormat::Dos13);
    assert_eq!(order,SectorOrder::Do);
}

#[test]
fn prodos_sizes_detect() {
    let (format,order) = img::detect(&formatted_prodos(DiskFormat::ProDos140),Some("po")).expect("detect failed");
    assert_eq!(format,DiskFormat::ProDos140);
    assert_eq!(order,SectorOrder::Po);
    let (format,_) = img::detect(&formatted_prodos(DiskFormat::ProDos400),Some("po")).expect("detect failed");
    assert_eq!(format,DiskFormat::ProDos400);
    let (format,_) = img::detect(&formatted_prodos(DiskFormat::ProDos800),Some("po")).expect("detect failed");
    assert_eq!(format,DiskFormat::ProDos800);
    let (format,_) = img::detect(&formatted_prodos(DiskFormat::ProDosCustom(320)),Some("po")).expect("detect failed");
    assert_eq!(format,DiskFormat::ProDosCustom(320));
}

#[test]
fn prodos_in_dos_order_detects() {
    // reorder a ProDOS volume the way a .dsk would store it
    let po = formatted_prodos(DiskFormat::ProDos140);
    let mut do_buf = vec![0;po.len()];
    for t in 0..35 {
        for s in 0..16 {
            let src = t*4096 + DOS_PRODOS_SKEW[s]*SECTOR_SIZE;
            let dst = t*4096 + s*SECTOR_SIZE;
            do_buf[dst..dst+SECTOR_SIZE].copy_from_slice(&po[src..src+SECTOR_SIZE]);
        }
    }
    let (format,order) = img::detect(&do_buf,Some("dsk")).expect("detect failed");
    assert_eq!(format,DiskFormat::ProDos140);
    assert_eq!(order,SectorOrder::Do);
}

#[test]
fn nib_detects_by_size() {
    let dsk = vec![0;35*img::NIB_TRACK_SIZE];
    let (format,order) = img::detect(&dsk,Some("nib")).expect("detect failed");
    assert_eq!(format,DiskFormat::Nib);
    assert_eq!(order,SectorOrder::Nib);
}

#[test]
fn junk_is_rejected() {
    match img::detect(&vec![0;12345],None) {
        Ok(_) => panic!("detect should have failed"),
        Err(e) => assert_eq!(e.to_string(),"image size did not match any known layout")
    }
    match img::detect(&vec![0;143360],None) {
        Ok(_) => panic!("detect should have failed"),
        Err(e) => assert_eq!(e.to_string(),"image format could not be recognized")
    }
}

#[test]
fn facade_builds_matching_driver() {
    let dsk = formatted_dos16();
    let mut fs = dskbench::create_fs_from_bytes(&dsk,Some("dsk")).expect("no driver");
    assert_eq!(fs.get_img().format(),DiskFormat::Dos16);
    assert_eq!(fs.get_img().to_bytes(),dsk);
    let dsk = formatted_prodos(DiskFormat::ProDos800);
    let mut fs = dskbench::create_fs_from_bytes(&dsk,Some("po")).expect("no driver");
    assert_eq!(fs.get_img().format(),DiskFormat::ProDos800);
}
