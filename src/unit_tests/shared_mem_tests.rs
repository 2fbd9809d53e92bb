use std::env;
use std::fs;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::base::mem::HasMemory;
use crate::mmu::shared_mem::SharedMemory;

#[test]
fn size_is_bounded_by_address_space() {
    assert!(SharedMemory::new(0).is_err());
    assert!(SharedMemory::new(SharedMemory::MAX_SIZE + 1).is_err());
    let mem = SharedMemory::new(SharedMemory::MAX_SIZE).expect("64 KiB fits");
    assert_eq!(mem.size(), 65536);
}

#[test]
fn round_trip_random_ranges() {
    let mut rng = StdRng::seed_from_u64(0x3e3);
    let mut mem = SharedMemory::new(4096).unwrap();
    for _ in 0..1000 {
        let n = rng.gen_range(0..=64);
        let addr = rng.gen_range(0..=4096 - n);
        let data: Vec<u8> = (0..n).map(|_| rng.gen()).collect();
        mem.write(addr, &data).expect("in bounds");
        assert_eq!(mem.read(addr, n).expect("in bounds"), data.as_slice());
    }
}

#[test]
fn out_of_bounds_is_an_error() {
    let mut mem = SharedMemory::new(64).unwrap();
    assert!(mem.read(62, 4).is_err());
    assert!(mem.write(64, &[1]).is_err());
    assert!(mem.read(usize::MAX, 2).is_err());
    mem.write(60, &[1, 2, 3, 4]).expect("last word");
    assert_eq!(mem.read_n::<4>(60).unwrap(), [1, 2, 3, 4]);
}

#[test]
fn image_load_and_dump() {
    let dir = env::temp_dir();
    let image = dir.join(format!("cgra_mmu_image_{}.bin", std::process::id()));
    let dump = dir.join(format!("cgra_mmu_dump_{}.bin", std::process::id()));
    fs::write(&image, [0xde, 0xad, 0xbe, 0xef]).unwrap();

    let mut mem = SharedMemory::new(16).unwrap();
    assert_eq!(mem.load_image(&image).expect("image fits"), 4);
    assert_eq!(mem.read(0, 4).unwrap(), &[0xde, 0xad, 0xbe, 0xef]);
    mem.dump(&dump).expect("dump");
    let dumped = fs::read(&dump).unwrap();
    assert_eq!(dumped.len(), 16);
    assert_eq!(&dumped[..4], &[0xde, 0xad, 0xbe, 0xef]);

    let mut tiny = SharedMemory::new(2).unwrap();
    assert!(tiny.load_image(&image).is_err());

    fs::remove_file(&image).ok();
    fs::remove_file(&dump).ok();
}
