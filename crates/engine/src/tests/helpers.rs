use std::path::Path;

use crate::{Config, Db, IdxMode};

pub fn test_config(dir: &Path) -> Config {
    Config {
        dir_path: dir.to_path_buf(),
        ..Config::default()
    }
}

pub fn open_db(dir: &Path) -> Db {
    Db::open(test_config(dir)).unwrap()
}

/// Small segments force rotation quickly; the key/value limits shrink with
/// the block so open-time validation still passes.
pub fn small_block_config(dir: &Path) -> Config {
    Config {
        dir_path: dir.to_path_buf(),
        block_size: 256,
        max_key_size: 32,
        max_value_size: 64,
        ..Config::default()
    }
}

pub fn key_only_config(dir: &Path) -> Config {
    Config {
        idx_mode: IdxMode::KeyOnlyRam,
        ..test_config(dir)
    }
}

/// Total bytes across the directory's segment files.
pub fn segment_bytes(dir: &Path) -> u64 {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .map_or(false, |x| x == "data")
        })
        .map(|e| e.metadata().unwrap().len())
        .sum()
}

/// Number of segment files in the directory.
pub fn segment_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .map_or(false, |x| x == "data")
        })
        .count()
}
