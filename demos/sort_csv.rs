use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Error;
use rand::Rng;
use simple_logger::SimpleLogger;

use csv_external_sort::key_spec::KeySpec;
use csv_external_sort::order::Order;
use csv_external_sort::sort::Sort;

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn create_random_csv(path: &Path, rows: usize) -> Result<(), Error> {
    let mut rng = rand::thread_rng();
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "id,name,value")?;
    for _ in 0..rows {
        writeln!(
            writer,
            "{}-{},Name-{},{}",
            rng.gen_range(1000..=9999),
            rng.gen_range(1000..=9999),
            rng.gen_range(1..=100),
            rng.gen::<f64>() * 100.0
        )?;
    }
    writer.flush()?;
    Ok(())
}

fn sort_by_id(input_path: &Path, output_path: &Path) -> Result<(), Error> {
    // ascending order is the default
    let mut csv_sort = Sort::new(input_path.to_path_buf(), output_path.to_path_buf(), KeySpec::from("id"));
    csv_sort.with_batch_size(100);
    let summary = csv_sort.sort()?;
    log::info!("Sorted {} rows by id using {} runs", summary.rows(), summary.runs());
    Ok(())
}

fn sort_by_name_descending(input_path: &Path, output_path: &Path) -> Result<(), Error> {
    // the first column is "0"
    let mut csv_sort = Sort::new(input_path.to_path_buf(), output_path.to_path_buf(), KeySpec::from("1"));
    csv_sort.with_batch_size(100);
    csv_sort.with_order(Order::Desc);
    csv_sort.sort()?;
    Ok(())
}

fn sort_by_value(input_path: &Path, output_path: &Path) -> Result<(), Error> {
    let mut csv_sort = Sort::new(input_path.to_path_buf(), output_path.to_path_buf(), KeySpec::from("value"));
    csv_sort.with_batch_size(100);
    csv_sort.with_comparator(|a: &str, b: &str| {
        let a = a.parse::<f64>().unwrap_or(f64::NAN);
        let b = b.parse::<f64>().unwrap_or(f64::NAN);
        a.total_cmp(&b)
    });
    csv_sort.sort()?;
    Ok(())
}

// cargo run -r --example sort_csv
pub fn main() -> Result<(), Error> {
    SimpleLogger::new().init()?;

    let input_path = PathBuf::from("./target/random-1000.csv");
    let by_id_path = PathBuf::from("./target/by-id-1000.csv");
    let by_name_path = PathBuf::from("./target/by-name-desc-1000.csv");
    let by_value_path = PathBuf::from("./target/by-value-1000.csv");

    create_random_csv(&input_path, 1000)?;
    sort_by_id(&input_path, &by_id_path)?;
    sort_by_name_descending(&input_path, &by_name_path)?;
    sort_by_value(&input_path, &by_value_path)?;

    let checked = Sort::new(by_id_path.clone(), PathBuf::new(), KeySpec::from("id"));
    if checked.check()? {
        log::info!("{} is sorted by id", by_id_path.display());
    } else {
        log::error!("{} is not sorted by id", by_id_path.display());
    }
    Ok(())
}
