//! Regular file behavior across block sizes, cache sizes and disk reuse
//! patterns.
//!
//! Every case runs against each configuration in turn. Configurations other
//! than `NewDisk` share one disk across cases, so later cases see a disk
//! that already holds live files, cached blocks, or both.

use std::io::{self, IoSlice, IoSliceMut};
use std::sync::Arc;

use heapfs_core::{Disk, RegularFile};
use rand::Rng;

const BLOCK_SIZES: [usize; 4] = [2, 8, 128, 8192];
/// `None` caches every freed block.
const CACHE_SIZES: [Option<usize>; 5] = [Some(0), Some(4), Some(16), Some(128), None];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReuseStrategy {
    /// Fresh disk for every file.
    NewDisk,
    /// Files outlive their case, so new blocks keep being allocated.
    KeepFiles,
    /// Files are deleted after their case, feeding the cache.
    DeleteFiles,
    /// Each file is kept or deleted at random.
    KeepOrDeleteFiles,
}

const STRATEGIES: [ReuseStrategy; 4] = [
    ReuseStrategy::NewDisk,
    ReuseStrategy::KeepFiles,
    ReuseStrategy::DeleteFiles,
    ReuseStrategy::KeepOrDeleteFiles,
];

struct TestConfig {
    block_size: usize,
    cache_size: Option<usize>,
    strategy: ReuseStrategy,
    disk: Arc<Disk>,
    kept: Vec<RegularFile>,
}

impl TestConfig {
    fn new(block_size: usize, cache_size: Option<usize>, strategy: ReuseStrategy) -> Self {
        Self {
            block_size,
            cache_size,
            strategy,
            disk: Self::create_disk(block_size, cache_size),
            kept: Vec::new(),
        }
    }

    fn create_disk(block_size: usize, cache_size: Option<usize>) -> Arc<Disk> {
        let cached_blocks = cache_size.map_or(usize::MAX, |c| c / block_size);
        Arc::new(Disk::new(block_size, usize::MAX, cached_blocks).unwrap())
    }

    fn create_file(&mut self) -> RegularFile {
        if self.strategy == ReuseStrategy::NewDisk {
            self.disk = Self::create_disk(self.block_size, self.cache_size);
        }
        RegularFile::new(Arc::clone(&self.disk))
    }

    fn tear_down(&mut self, file: RegularFile) {
        let delete = match self.strategy {
            ReuseStrategy::NewDisk | ReuseStrategy::KeepFiles => false,
            ReuseStrategy::DeleteFiles => true,
            ReuseStrategy::KeepOrDeleteFiles => rand::thread_rng().gen_bool(0.5),
        };
        if delete {
            file.deleted();
        } else {
            self.kept.push(file);
        }
    }
}

fn all_configs() -> Vec<TestConfig> {
    let mut configs = Vec::new();
    for strategy in STRATEGIES {
        for block_size in BLOCK_SIZES {
            for cache_size in CACHE_SIZES {
                // A cache smaller than one block holds nothing, same as 0.
                if matches!(cache_size, Some(c) if c > 0 && c < block_size) {
                    continue;
                }
                configs.push(TestConfig::new(block_size, cache_size, strategy));
            }
        }
    }
    configs
}

/// Run `case` once per configuration.
fn for_each_config(case: impl Fn(&RegularFile)) {
    for mut config in all_configs() {
        let file = config.create_file();
        case(&file);
        config.tear_down(file);
    }
}

/// Digits as byte values: `"102"` is `[1, 0, 2]`.
fn bytes(digits: &str) -> Vec<u8> {
    digits.bytes().map(|b| b - b'0').collect()
}

fn fill(file: &RegularFile, digits: &str) {
    file.write(0, &bytes(digits)).unwrap();
}

fn assert_content(expected: &str, file: &RegularFile) {
    let expected = bytes(expected);
    assert_eq!(file.size_without_locking(), expected.len() as u64);
    let mut actual = vec![0u8; expected.len()];
    if !expected.is_empty() {
        assert_eq!(file.read(0, &mut actual), Some(expected.len()));
    }
    assert_eq!(actual, expected);
}

#[test]
fn test_empty() {
    for_each_config(|file| {
        assert_eq!(file.size(), 0);
        assert_content("", file);
        assert_eq!(file.read_byte(0), None);
        assert_eq!(file.read_byte(1), None);

        let mut array = bytes("0000000000");
        assert_eq!(file.read(0, &mut array), None);
        assert_eq!(array, bytes("0000000000"));

        let (mut a, mut b) = ([9u8; 5], [9u8; 5]);
        let mut bufs = [IoSliceMut::new(&mut a), IoSliceMut::new(&mut b)];
        assert_eq!(file.read_vectored(0, &mut bufs), None);
        assert_eq!((a, b), ([9u8; 5], [9u8; 5]));

        let mut sink = Vec::new();
        assert_eq!(file.transfer_to(0, 100, &mut sink).unwrap(), 0);
        assert!(sink.is_empty());
    });
}

#[test]
fn test_empty_writes() {
    for_each_config(|file| {
        file.write_byte(0, 1).unwrap();
        assert_content("1", file);
    });
    for_each_config(|file| {
        file.write_byte(5, 1).unwrap();
        assert_content("000001", file);
    });
    for_each_config(|file| {
        file.write(5, &bytes("111111")).unwrap();
        assert_content("00000111111", file);
    });
    for_each_config(|file| {
        file.write(5, &bytes("2211111122")[2..8]).unwrap();
        assert_content("00000111111", file);
    });
    for_each_config(|file| {
        let (a, b) = (bytes("111"), bytes("222"));
        file.write_vectored(5, &[IoSlice::new(&a), IoSlice::new(&b)])
            .unwrap();
        assert_content("00000111222", file);
    });
}

#[test]
fn test_empty_writes_of_nothing() {
    for_each_config(|file| {
        file.write(0, &[]).unwrap();
        assert_content("", file);
    });
    for_each_config(|file| {
        file.write(5, &[]).unwrap();
        assert_content("00000", file);
    });
    for_each_config(|file| {
        let empty = [IoSlice::new(&[]), IoSlice::new(&[]), IoSlice::new(&[])];
        file.write_vectored(5, &empty).unwrap();
        assert_content("00000", file);
    });
}

#[test]
fn test_empty_transfer_from() {
    for_each_config(|file| {
        assert_eq!(file.transfer_from(&mut &bytes("111111")[..], 0, 6).unwrap(), 6);
        assert_content("111111", file);
    });
    for_each_config(|file| {
        assert_eq!(file.transfer_from(&mut &bytes("111111")[..], 0, 3).unwrap(), 3);
        assert_content("111", file);
    });
    for_each_config(|file| {
        assert_eq!(file.transfer_from(&mut &bytes("111111")[..], 0, 12).unwrap(), 6);
        assert_content("111111", file);
    });
    for_each_config(|file| {
        assert_eq!(file.transfer_from(&mut io::empty(), 0, 10).unwrap(), 0);
        assert_eq!(file.transfer_from(&mut io::empty(), 5, 10).unwrap(), 0);
        assert_eq!(file.transfer_from(&mut io::empty(), 5, 0).unwrap(), 0);
        assert_content("", file);
    });
    for_each_config(|file| {
        assert_eq!(file.transfer_from(&mut &bytes("111111")[..], 4, 3).unwrap(), 3);
        assert_content("0000111", file);
    });
}

#[test]
fn test_non_empty_reads() {
    for_each_config(|file| {
        fill(file, "123456");
        assert_eq!(file.read_byte(0), Some(1));
        assert_eq!(file.read_byte(5), Some(6));
        assert_eq!(file.read_byte(6), None);
        assert_eq!(file.read_byte(100), None);
    });
    for_each_config(|file| {
        fill(file, "222222");
        let mut array = [0u8; 10];
        assert_eq!(file.read(0, &mut array), Some(6));
        assert_eq!(array.to_vec(), bytes("2222220000"));
    });
    for_each_config(|file| {
        fill(file, "22223333");
        let mut array = [0u8; 10];
        assert_eq!(file.read(3, &mut array[1..4]), Some(3));
        assert_eq!(array.to_vec(), bytes("0233000000"));
    });
    for_each_config(|file| {
        fill(file, "2222222222");
        let mut array = [0u8; 3];
        assert_eq!(file.read(8, &mut array), Some(2));
        assert_eq!(array.to_vec(), bytes("220"));
    });
    for_each_config(|file| {
        fill(file, "123");
        let mut array = [0u8; 3];
        assert_eq!(file.read(3, &mut array), None);
        assert_eq!(file.read(3, &mut array[..2]), None);
        assert_eq!(array.to_vec(), bytes("000"));
    });
}

#[test]
fn test_non_empty_scatter_reads() {
    for_each_config(|file| {
        fill(file, "223334");
        let (mut a, mut b) = ([0u8; 3], [0u8; 3]);
        let mut bufs = [IoSliceMut::new(&mut a), IoSliceMut::new(&mut b)];
        assert_eq!(file.read_vectored(0, &mut bufs), Some(6));
        assert_eq!((a.to_vec(), b.to_vec()), (bytes("223"), bytes("334")));
    });
    for_each_config(|file| {
        fill(file, "222222");
        let (mut a, mut b, mut c) = ([0u8; 4], [0u8; 8], [0u8; 4]);
        let mut bufs = [
            IoSliceMut::new(&mut a),
            IoSliceMut::new(&mut b),
            IoSliceMut::new(&mut c),
        ];
        assert_eq!(file.read_vectored(0, &mut bufs), Some(6));
        assert_eq!(a.to_vec(), bytes("2222"));
        assert_eq!(b.to_vec(), bytes("22000000"));
        assert_eq!(c.to_vec(), bytes("0000"));
    });
    for_each_config(|file| {
        fill(file, "123456789");
        let (mut a, mut b) = ([0u8; 2], [0u8; 2]);
        let mut bufs = [IoSliceMut::new(&mut a), IoSliceMut::new(&mut b)];
        assert_eq!(file.read_vectored(6, &mut bufs), Some(3));
        assert_eq!((a.to_vec(), b.to_vec()), (bytes("78"), bytes("90")));
    });
    for_each_config(|file| {
        fill(file, "123");
        let (mut a, mut b) = ([0u8; 2], [0u8; 2]);
        let mut bufs = [IoSliceMut::new(&mut a), IoSliceMut::new(&mut b)];
        assert_eq!(file.read_vectored(6, &mut bufs), None);
        assert_eq!((a, b), ([0u8; 2], [0u8; 2]));
    });
}

#[test]
fn test_non_empty_writes() {
    for_each_config(|file| {
        fill(file, "222222");
        assert_eq!(file.write_byte(3, 1).unwrap(), 1);
        assert_content("222122", file);
        assert_eq!(file.write_byte(6, 1).unwrap(), 1);
        assert_content("2222221", file);
    });
    for_each_config(|file| {
        fill(file, "222222");
        assert_eq!(file.write(0, &bytes("111")).unwrap(), 3);
        assert_content("111222", file);
        assert_eq!(file.write(0, &bytes("333333")[..2]).unwrap(), 2);
        assert_content("331222", file);
    });
    for_each_config(|file| {
        fill(file, "22222222");
        assert_eq!(file.write(6, &bytes("111")).unwrap(), 3);
        assert_content("222222111", file);
        assert_eq!(file.write(8, &bytes("333333")[2..4]).unwrap(), 2);
        assert_content("2222221133", file);
    });
    for_each_config(|file| {
        fill(file, "222222");
        assert_eq!(file.write(8, &bytes("111")).unwrap(), 3);
        assert_content("22222200111", file);
        assert_eq!(file.write(13, &bytes("333333")[4..]).unwrap(), 2);
        assert_content("222222001110033", file);
    });
    for_each_config(|file| {
        fill(file, "2222");
        assert_eq!(file.write(0, &bytes("12345678")).unwrap(), 8);
        assert_content("12345678", file);
    });
}

#[test]
fn test_non_empty_gather_writes() {
    for_each_config(|file| {
        fill(file, "22222222");
        let (a, b) = (bytes("11"), bytes("33"));
        assert_eq!(
            file.write_vectored(2, &[IoSlice::new(&a), IoSlice::new(&b)])
                .unwrap(),
            4
        );
        assert_content("22113322", file);
    });
    for_each_config(|file| {
        fill(file, "222222");
        let (a, b) = (bytes("111"), bytes("333"));
        assert_eq!(
            file.write_vectored(6, &[IoSlice::new(&a), IoSlice::new(&b)])
                .unwrap(),
            6
        );
        assert_content("222222111333", file);
    });
    for_each_config(|file| {
        fill(file, "222222");
        let (a, b) = (bytes("11"), bytes("33"));
        assert_eq!(
            file.write_vectored(10, &[IoSlice::new(&a), IoSlice::new(&b)])
                .unwrap(),
            4
        );
        assert_content("22222200001133", file);
    });
}

#[test]
fn test_non_empty_transfers() {
    for_each_config(|file| {
        fill(file, "12345678");
        let mut sink = Vec::new();
        assert_eq!(file.transfer_to(3, 4, &mut sink).unwrap(), 4);
        assert_eq!(sink, bytes("4567"));
    });
    for_each_config(|file| {
        fill(file, "123456");
        let mut sink = Vec::new();
        assert_eq!(file.transfer_to(4, 6, &mut sink).unwrap(), 2);
        assert_eq!(sink, bytes("56"));
    });
    for_each_config(|file| {
        fill(file, "22222222");
        assert_eq!(file.transfer_from(&mut &bytes("11111")[..], 2, 3).unwrap(), 3);
        assert_content("22111222", file);
    });
    for_each_config(|file| {
        fill(file, "222222");
        assert_eq!(file.transfer_from(&mut &bytes("111111")[..], 4, 6).unwrap(), 6);
        assert_content("2222111111", file);
    });
    for_each_config(|file| {
        fill(file, "222222");
        let src = bytes("111111");
        assert_eq!(file.transfer_from(&mut &src[..], 6, 10 * 1024 * 1024).unwrap(), 6);
        assert_content("222222111111", file);
    });
    for_each_config(|file| {
        fill(file, "222222");
        assert_eq!(file.transfer_from(&mut &bytes("111111")[..], 10, 6).unwrap(), 6);
        assert_content("2222220000111111", file);
    });
}

#[test]
fn test_copy() {
    for_each_config(|file| {
        let copy = file.copy_without_content();
        assert_content("", &copy);

        fill(file, "123456");
        let copy = file.copy_without_content();
        file.copy_content_to(&copy).unwrap();
        let copy2 = copy.copy_without_content();
        copy.copy_content_to(&copy2).unwrap();
        assert_content("123456", &copy);
        assert_content("123456", &copy2);

        file.write(0, &bytes("9")).unwrap();
        copy2.write(5, &bytes("0")).unwrap();
        assert_content("923456", file);
        assert_content("123456", &copy);
        assert_content("123450", &copy2);
    });
}

#[test]
fn test_truncate() {
    for_each_config(|file| {
        file.truncate(0).unwrap();
        assert_content("", file);
        assert!(!file.truncate(10).unwrap());
        assert_content("", file);
    });
    for_each_config(|file| {
        fill(file, "12345678");
        file.truncate(5).unwrap();
        assert_content("12345", file);
        file.truncate(0).unwrap();
        assert_content("", file);
    });
    for_each_config(|file| {
        fill(file, "123456");
        assert!(!file.truncate(12).unwrap());
        assert_content("123456", file);
    });
    for_each_config(|file| {
        fill(file, "123456");
        file.truncate(2).unwrap();
        assert!(!file.truncate(6).unwrap());
        assert_content("12", file);
        // Bytes past the shrunk size come back as zeros once exposed.
        file.write_byte(5, 7).unwrap();
        assert_content("120007", file);
    });
}

#[test]
fn test_deleted_file_remains_usable_while_open() {
    for_each_config(|file| {
        fill(file, "1234567890");
        file.opened();
        file.opened();
        file.deleted();
        assert_content("1234567890", file);

        file.write(10, &bytes("1234")).unwrap();
        assert_content("12345678901234", file);

        file.closed();
        assert_content("12345678901234", file);
        file.closed();
        assert_eq!(file.block_count(), 0);
    });
}

#[test]
fn test_content_survives_any_configuration() {
    let content: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    for mut config in all_configs() {
        let file = config.create_file();
        file.write(0, &content).unwrap();
        let mut actual = vec![0u8; content.len()];
        assert_eq!(file.read(0, &mut actual), Some(content.len()));
        assert_eq!(
            actual, content,
            "block size {} cache {:?} {:?}",
            config.block_size, config.cache_size, config.strategy
        );
        config.tear_down(file);
    }
}

#[test]
fn test_create_delete_cycles_reuse_blocks() {
    let disk = Arc::new(Disk::new(8, 16, 16).unwrap());
    for round in 0..1000u32 {
        let file = RegularFile::new(Arc::clone(&disk));
        file.write(0, &[round as u8; 8 * 16]).unwrap();
        file.deleted();
        assert_eq!(disk.allocated_block_count(), 0, "round {round}");
    }
    assert_eq!(disk.cached_block_count(), 16);
}
