use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use data_encoding::HEXLOWER;
use log::LevelFilter;
use rand::Rng;
use simple_logger::SimpleLogger;

pub const RESULTS_DIR: &str = "./target/results/";

pub fn setup() {
    // several tests share the process, only the first logger registration succeeds
    let _ = SimpleLogger::new().with_level(LevelFilter::Info).init();

    let results_dir_path = PathBuf::from_str(RESULTS_DIR).unwrap();
    if !results_dir_path.exists() {
        fs::create_dir_all(&results_dir_path).unwrap_or_else(|_|
            panic!("Failed to create results directory: {:?}", results_dir_path)
        );
    } else {
        println!("Results directory exists at {:?}", results_dir_path);
    }
}

#[allow(dead_code)]
pub fn read_lines(path: &Path) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().map(|x| x.unwrap()).collect();
    Ok(lines)
}

#[allow(dead_code)]
pub fn write_lines(path: &Path, lines: &[String]) -> Result<(), anyhow::Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

#[allow(dead_code)]
pub fn temp_file_name(dir: &str) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

/// A fresh empty directory, used to verify that no intermediate files are left behind
#[allow(dead_code)]
pub fn temp_dir(dir: &str) -> Result<PathBuf, anyhow::Error> {
    let path = temp_file_name(dir);
    fs::create_dir_all(&path)?;
    Ok(path)
}

#[allow(dead_code)]
pub fn dir_entries(dir: &Path) -> Result<usize, anyhow::Error> {
    Ok(fs::read_dir(dir)?.count())
}

/// Header plus `rows` random rows: `NNNN-NNNN` ids, names from a small set so there are
/// plenty of equal keys, and a float value
#[allow(dead_code)]
pub fn random_csv(rows: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    let mut lines = Vec::with_capacity(rows + 1);
    lines.push("id,name,value".to_string());
    for _ in 0..rows {
        lines.push(
            format!(
                "{}-{},Name-{},{}",
                rng.gen_range(1000..=9999),
                rng.gen_range(1000..=9999),
                rng.gen_range(1..=100),
                rng.gen::<f64>() * 100.0,
            )
        );
    }
    lines
}

#[allow(dead_code)]
pub fn column(lines: &[String], index: usize) -> Vec<String> {
    lines.iter()
        .map(|line| line.split(',').nth(index).unwrap_or_default().to_string())
        .collect()
}

/// Data lines stably sorted in memory by the key column
#[allow(dead_code)]
pub fn expected(lines: &[String], index: usize, ascending: bool) -> Vec<String> {
    let mut data = lines[1..].to_vec();
    data.sort_by(|a, b| {
        let a = a.split(',').nth(index).unwrap_or_default();
        let b = b.split(',').nth(index).unwrap_or_default();
        if ascending {
            a.cmp(b)
        } else {
            b.cmp(a)
        }
    });
    let mut result = vec![lines[0].clone()];
    result.extend(data);
    result
}
