use ndarray::prelude::*;
use ndarray_npy_chunked::format::{self, Location};
use ndarray_npy_chunked::{lazy, npy, ChunkOptions, Error, LazyArray};

fn write_example() -> Result<(), Error> {
    let arr: Array2<f64> = Array::from_shape_fn((1000, 300), |(i, j)| (i * 300 + j) as f64);
    lazy::save(&arr, "array.npy", &[128, 300])?.compute()?;
    Ok(())
}

fn copy_example() -> Result<(), Error> {
    let header = npy::head("array.npy")?;
    let source: LazyArray<f64> = LazyArray::load("array.npy", header, &[100, 100])?;
    let target = Location::resolve("scaled.npz/scaled", None)?;
    let options = ChunkOptions::default().with_workers(4);
    let written = format::save(source.map(|x| x / 2.0), &target, &options)?.compute()?;
    println!("sum = {}", written.sum());
    Ok(())
}

fn main() {
    write_example().expect("failure writing array to file");
    copy_example().expect("failure copying array");
}
