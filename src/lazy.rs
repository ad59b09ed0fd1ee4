//! Lazily evaluated, chunked arrays.
//!
//! A [`LazyArray`] is a graph of independent chunk tasks. Nothing is read or
//! written until [`LazyArray::compute`] runs the tasks, in parallel, on a
//! `rayon` thread pool; external executors can instead drive the tasks
//! returned by [`LazyArray::tasks`] themselves.

use crate::chunk::access::{read_chunk, write_chunk};
use crate::chunk::{check_region, ChunkDescriptor, ChunkGrid};
use crate::error::{ConfigurationError, Error, StoreIoError, StoreOp};
use crate::layout::{self, ArrayHeader, Order};
use crate::npy::elements::Element;
use crate::npy::header::{Header, WriteHeaderError};
use crate::npy::header_for;
use crate::options::ChunkOptions;
use crate::store::{FileStore, StoreMode};
use ndarray::{Array, ArrayBase, ArrayD, Data, Dimension, IxDyn, ShapeBuilder, Slice, Zip};
use rayon::prelude::*;
use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

/// Something that can produce any rectangular block of an array.
///
/// Blocks are independent of one another: producing one never requires
/// another to have been produced first.
pub trait BlockSource<A>: Send + Sync {
    /// Shape of the whole array.
    fn shape(&self) -> &[usize];

    /// Produces the block covering `region`.
    fn block(&self, region: &[Range<usize>]) -> Result<ArrayD<A>, Error>;

    /// Appends the file stores this source reads from or writes to.
    fn stores<'a>(&'a self, _out: &mut Vec<&'a FileStore>) {}
}

/// [`Order::F`] for arrays laid out in Fortran order, [`Order::C`] otherwise.
fn memory_order<S: Data, D: Dimension>(array: &ArrayBase<S, D>) -> Order {
    if !array.is_standard_layout() && array.t().is_standard_layout() {
        Order::F
    } else {
        Order::C
    }
}

fn attach_path(err: Error, path: &Path) -> Error {
    match err {
        Error::StoreIo(err) if err.path.is_none() => Error::StoreIo(err.with_path(path)),
        other => other,
    }
}

/// Reads blocks from a flat data region described by an [`ArrayHeader`].
struct LoadSource {
    header: ArrayHeader,
    grid: ChunkGrid,
    store: FileStore,
}

impl<A: Element> BlockSource<A> for LoadSource {
    fn shape(&self) -> &[usize] {
        &self.header.shape
    }

    fn block(&self, region: &[Range<usize>]) -> Result<ArrayD<A>, Error> {
        let desc = self.grid.region_descriptor(region)?;
        let mut file = self.store.open(region)?;
        read_chunk(&desc, &self.header.dtype, self.header.order, &mut file)
            .map_err(|err| attach_path(err, self.store.path()))
    }

    fn stores<'a>(&'a self, out: &mut Vec<&'a FileStore>) {
        out.push(&self.store);
    }
}

/// Writes blocks of `source` to a flat data region and passes them on.
struct SaveSource<A> {
    source: Arc<dyn BlockSource<A>>,
    header: ArrayHeader,
    grid: ChunkGrid,
    store: FileStore,
}

impl<A: Element> BlockSource<A> for SaveSource<A> {
    fn shape(&self) -> &[usize] {
        &self.header.shape
    }

    fn block(&self, region: &[Range<usize>]) -> Result<ArrayD<A>, Error> {
        let data = self.source.block(region)?;
        let desc = self.grid.region_descriptor(region)?;
        let mut file = self.store.open(region)?;
        write_chunk(
            &desc,
            &self.header.dtype,
            self.header.order,
            &mut file,
            &data,
        )
        .map_err(|err| attach_path(err, self.store.path()))?;
        file.sync_data().map_err(|err| {
            let offset = desc.byte_spans.first().map_or(0, |span| span.offset);
            StoreIoError::new(StoreOp::Flush, region, offset, err).with_path(self.store.path())
        })?;
        Ok(data)
    }

    fn stores<'a>(&'a self, out: &mut Vec<&'a FileStore>) {
        out.push(&self.store);
        self.source.stores(out);
    }
}

/// Slices blocks out of an in-memory array.
struct EagerSource<A> {
    array: ArrayD<A>,
}

impl<A: Element> BlockSource<A> for EagerSource<A> {
    fn shape(&self) -> &[usize] {
        self.array.shape()
    }

    fn block(&self, region: &[Range<usize>]) -> Result<ArrayD<A>, Error> {
        check_region(self.array.shape(), region)?;
        Ok(self
            .array
            .slice_each_axis(|ax| Slice::from(region[ax.axis.index()].clone()))
            .to_owned())
    }
}

struct MapSource<A, B> {
    source: Arc<dyn BlockSource<A>>,
    f: Arc<dyn Fn(A) -> B + Send + Sync>,
}

impl<A: Element, B: Element> BlockSource<B> for MapSource<A, B> {
    fn shape(&self) -> &[usize] {
        self.source.shape()
    }

    fn block(&self, region: &[Range<usize>]) -> Result<ArrayD<B>, Error> {
        let f = &self.f;
        Ok(self.source.block(region)?.mapv(|x| f(x)))
    }

    fn stores<'a>(&'a self, out: &mut Vec<&'a FileStore>) {
        self.source.stores(out);
    }
}

struct ZipSource<A, B, C> {
    lhs: Arc<dyn BlockSource<A>>,
    rhs: Arc<dyn BlockSource<B>>,
    f: Arc<dyn Fn(A, B) -> C + Send + Sync>,
}

impl<A: Element, B: Element, C: Element> BlockSource<C> for ZipSource<A, B, C> {
    fn shape(&self) -> &[usize] {
        self.lhs.shape()
    }

    fn block(&self, region: &[Range<usize>]) -> Result<ArrayD<C>, Error> {
        let lhs = self.lhs.block(region)?;
        let rhs = self.rhs.block(region)?;
        let f = &self.f;
        Ok(Zip::from(&lhs).and(&rhs).map_collect(|&a, &b| f(a, b)))
    }

    fn stores<'a>(&'a self, out: &mut Vec<&'a FileStore>) {
        self.lhs.stores(out);
        self.rhs.stores(out);
    }
}

/// Views the elements of `source`, in row-major order, with a new shape.
///
/// Any block needs the whole source, so the source is materialized for every
/// block requested.
struct ReshapeSource<A> {
    source: Arc<dyn BlockSource<A>>,
    shape: Vec<usize>,
}

impl<A: Element> BlockSource<A> for ReshapeSource<A> {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn block(&self, region: &[Range<usize>]) -> Result<ArrayD<A>, Error> {
        check_region(&self.shape, region)?;
        let full: Vec<Range<usize>> = self.source.shape().iter().map(|&len| 0..len).collect();
        let data = self.source.block(&full)?;
        let reshaped = Array::from_shape_vec(IxDyn(&self.shape), data.iter().copied().collect())
            .map_err(|_| ConfigurationError::ShapeMismatch {
                expected: self.shape.clone(),
                found: self.source.shape().to_vec(),
            })?;
        Ok(reshaped
            .slice_each_axis(|ax| Slice::from(region[ax.axis.index()].clone()))
            .to_owned())
    }

    fn stores<'a>(&'a self, out: &mut Vec<&'a FileStore>) {
        self.source.stores(out);
    }
}

/// One unit of work: producing (and, for saves, writing) one chunk.
pub struct ChunkTask<A> {
    id: usize,
    descriptor: ChunkDescriptor,
    source: Arc<dyn BlockSource<A>>,
}

impl<A> ChunkTask<A> {
    /// Stable identity of the task: the chunk's position in the canonical
    /// enumeration order.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn descriptor(&self) -> &ChunkDescriptor {
        &self.descriptor
    }

    /// Runs the task, returning the chunk's block.
    pub fn run(&self) -> Result<ArrayD<A>, Error> {
        self.source.block(&self.descriptor.coordinate_range)
    }
}

impl<A> fmt::Debug for ChunkTask<A> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ChunkTask")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// A lazily evaluated array split into independently computable chunks.
pub struct LazyArray<A> {
    shape: Vec<usize>,
    order: Order,
    chunks: Arc<[ChunkDescriptor]>,
    source: Arc<dyn BlockSource<A>>,
    workers: Option<usize>,
}

impl<A> Clone for LazyArray<A> {
    fn clone(&self) -> Self {
        LazyArray {
            shape: self.shape.clone(),
            order: self.order,
            chunks: Arc::clone(&self.chunks),
            source: Arc::clone(&self.source),
            workers: self.workers,
        }
    }
}

impl<A> fmt::Debug for LazyArray<A> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LazyArray")
            .field("shape", &self.shape)
            .field("order", &self.order)
            .field("num_chunks", &self.chunks.len())
            .field("workers", &self.workers)
            .finish()
    }
}

impl<A: Element> LazyArray<A> {
    fn from_source(
        source: Arc<dyn BlockSource<A>>,
        grid: &ChunkGrid,
        workers: Option<usize>,
    ) -> LazyArray<A> {
        LazyArray {
            shape: grid.shape().to_vec(),
            order: grid.order(),
            chunks: grid.iter().collect::<Vec<_>>().into(),
            source,
            workers,
        }
    }

    /// Builds a lazy array reading the data region described by `header`
    /// from the file at `path`, split into chunks of `chunk_shape`.
    ///
    /// The file isn't opened until the array is computed, so a missing or
    /// truncated file is only reported then.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the header or chunk shape is
    /// invalid or `A` doesn't match the header's dtype.
    pub fn load<P: AsRef<Path>>(
        path: P,
        header: ArrayHeader,
        chunk_shape: &[usize],
    ) -> Result<LazyArray<A>, Error> {
        layout::validate_for::<A>(&header)?;
        let grid = ChunkGrid::new(
            &header.shape,
            chunk_shape,
            header.order,
            header.dtype.itemsize(),
            header.byte_offset,
        )?;
        log::debug!(
            "lazy load of {} with shape {:?}, dtype {}, offset {}: {} chunks of {:?}",
            path.as_ref().display(),
            header.shape,
            header.dtype,
            header.byte_offset,
            grid.num_chunks(),
            grid.chunk_shape()
        );
        let source = LoadSource {
            header,
            grid: grid.clone(),
            store: FileStore::new(path.as_ref(), StoreMode::Read),
        };
        Ok(LazyArray::from_source(Arc::new(source), &grid, None))
    }

    /// Like [`LazyArray::load`], taking the chunk shape and worker count from
    /// `options`.
    pub fn load_with_options<P: AsRef<Path>>(
        path: P,
        header: ArrayHeader,
        options: &ChunkOptions,
    ) -> Result<LazyArray<A>, Error> {
        let chunk_shape =
            options.chunk_shape_for(&header.shape, header.dtype.itemsize(), header.order)?;
        let mut lazy = LazyArray::load(path, header, &chunk_shape)?;
        lazy.workers = options.workers();
        Ok(lazy)
    }

    /// Wraps an in-memory array, split into chunks of `chunk_shape`.
    pub fn from_array<S, D>(
        array: &ArrayBase<S, D>,
        chunk_shape: &[usize],
    ) -> Result<LazyArray<A>, Error>
    where
        S: Data<Elem = A>,
        D: Dimension,
    {
        let order = memory_order(array);
        let grid = ChunkGrid::new(
            array.shape(),
            chunk_shape,
            order,
            A::dtype().itemsize(),
            0,
        )?;
        let source = EagerSource {
            array: array.to_owned().into_dyn(),
        };
        Ok(LazyArray::from_source(Arc::new(source), &grid, None))
    }

    /// Like [`LazyArray::from_array`], taking the chunk shape and worker
    /// count from `options`.
    pub fn from_array_with_options<S, D>(
        array: &ArrayBase<S, D>,
        options: &ChunkOptions,
    ) -> Result<LazyArray<A>, Error>
    where
        S: Data<Elem = A>,
        D: Dimension,
    {
        let order = memory_order(array);
        let chunk_shape = options.chunk_shape_for(array.shape(), A::dtype().itemsize(), order)?;
        let mut lazy = LazyArray::from_array(array, &chunk_shape)?;
        lazy.workers = options.workers();
        Ok(lazy)
    }

    /// Shape of the array.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Layout order of the materialized array (and of saved data).
    pub fn order(&self) -> Order {
        self.order
    }

    /// The chunk descriptors, in canonical enumeration order.
    pub fn chunks(&self) -> &[ChunkDescriptor] {
        &self.chunks
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Number of worker threads used by [`LazyArray::compute`], if set.
    pub fn workers(&self) -> Option<usize> {
        self.workers
    }

    /// Sets the number of worker threads used by [`LazyArray::compute`].
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// The independent tasks making up the graph, one per chunk, in
    /// enumeration order.
    pub fn tasks(&self) -> Vec<ChunkTask<A>> {
        self.chunks
            .iter()
            .enumerate()
            .map(|(id, descriptor)| ChunkTask {
                id,
                descriptor: descriptor.clone(),
                source: Arc::clone(&self.source),
            })
            .collect()
    }

    /// Applies `f` to every element.
    pub fn map<B, F>(&self, f: F) -> LazyArray<B>
    where
        B: Element,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        LazyArray {
            shape: self.shape.clone(),
            order: self.order,
            chunks: Arc::clone(&self.chunks),
            source: Arc::new(MapSource {
                source: Arc::clone(&self.source),
                f: Arc::new(f),
            }),
            workers: self.workers,
        }
    }

    /// Combines the elements of `self` and `other` pairwise with `f`.
    ///
    /// The result is chunked like `self`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ShapeMismatch`] if the shapes differ.
    pub fn zip_with<B, C, F>(&self, other: &LazyArray<B>, f: F) -> Result<LazyArray<C>, Error>
    where
        B: Element,
        C: Element,
        F: Fn(A, B) -> C + Send + Sync + 'static,
    {
        if self.shape != other.shape {
            return Err(ConfigurationError::ShapeMismatch {
                expected: self.shape.clone(),
                found: other.shape.clone(),
            }
            .into());
        }
        Ok(LazyArray {
            shape: self.shape.clone(),
            order: self.order,
            chunks: Arc::clone(&self.chunks),
            source: Arc::new(ZipSource {
                lhs: Arc::clone(&self.source),
                rhs: Arc::clone(&other.source),
                f: Arc::new(f),
            }),
            workers: self.workers,
        })
    }

    /// Gives the elements, taken in row-major order, a new shape.
    ///
    /// The reshaped array is a single chunk, since each of its blocks
    /// depends on the whole source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ShapeMismatch`] if the number of
    /// elements differs, or another [`ConfigurationError`] for an invalid
    /// shape.
    pub fn into_shape(&self, shape: &[usize]) -> Result<LazyArray<A>, Error> {
        let grid = ChunkGrid::new(shape, shape, Order::C, A::dtype().itemsize(), 0)?;
        if shape.iter().product::<usize>() != self.len() {
            return Err(ConfigurationError::ShapeMismatch {
                expected: self.shape.clone(),
                found: shape.to_vec(),
            }
            .into());
        }
        let source = ReshapeSource {
            source: Arc::clone(&self.source),
            shape: shape.to_vec(),
        };
        Ok(LazyArray::from_source(Arc::new(source), &grid, self.workers))
    }

    /// Runs every chunk task and assembles the blocks into one array.
    ///
    /// For an array returned by [`save`], this performs the writes and
    /// returns the written data. Computing again re-runs every task.
    ///
    /// # Errors
    ///
    /// Returns the first error of any task; the partially assembled output
    /// is discarded.
    pub fn compute(&self) -> Result<ArrayD<A>, Error> {
        self.materialize(self.workers)
    }

    /// Like [`LazyArray::compute`], on a dedicated pool of `workers`
    /// threads.
    pub fn compute_with(&self, workers: usize) -> Result<ArrayD<A>, Error> {
        self.materialize(Some(workers))
    }

    fn materialize(&self, workers: Option<usize>) -> Result<ArrayD<A>, Error> {
        log::debug!(
            "computing {} chunks of array with shape {:?} on {} workers",
            self.chunks.len(),
            self.shape,
            workers.unwrap_or_else(rayon::current_num_threads)
        );
        let tasks = self.tasks();
        let run_all = || {
            tasks
                .par_iter()
                .map(|task| task.run().map(|block| (task.descriptor(), block)))
                .collect::<Result<Vec<_>, Error>>()
        };
        let blocks = match workers {
            Some(workers) => rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()?
                .install(run_all)?,
            None => run_all()?,
        };

        let mut out = ArrayD::<A>::default(IxDyn(&self.shape).set_f(self.order.is_fortran()));
        for (descriptor, block) in blocks {
            let region = &descriptor.coordinate_range;
            out.slice_each_axis_mut(|ax| Slice::from(region[ax.axis.index()].clone()))
                .assign(&block);
        }
        Ok(out)
    }
}

/// Conversion into a [`LazyArray`] for [`save`].
pub trait IntoLazyArray<A> {
    fn into_lazy_array(self) -> Result<LazyArray<A>, Error>;
}

impl<A: Element> IntoLazyArray<A> for LazyArray<A> {
    fn into_lazy_array(self) -> Result<LazyArray<A>, Error> {
        Ok(self)
    }
}

impl<A: Element> IntoLazyArray<A> for &LazyArray<A> {
    fn into_lazy_array(self) -> Result<LazyArray<A>, Error> {
        Ok(self.clone())
    }
}

impl<A, S, D> IntoLazyArray<A> for &ArrayBase<S, D>
where
    A: Element,
    S: Data<Elem = A>,
    D: Dimension,
{
    fn into_lazy_array(self) -> Result<LazyArray<A>, Error> {
        LazyArray::from_array(self, self.shape())
    }
}

/// Prepares `path` as an `.npy` file holding `array` and returns a lazy
/// array whose computation writes the data, chunk by chunk.
///
/// The header is written and the file sized immediately; the data is only
/// written by [`LazyArray::compute`], which returns the written array.
/// The data is stored in the layout order of `array`.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for an invalid chunk shape or when
/// `array` reads from `path` itself (both before the file is touched), and [`Error::Io`] or [`Error::WriteHeader`] if the file
/// can't be prepared.
pub fn save<A, T, P>(array: T, path: P, chunk_shape: &[usize]) -> Result<LazyArray<A>, Error>
where
    A: Element,
    T: IntoLazyArray<A>,
    P: AsRef<Path>,
{
    let source = array.into_lazy_array()?;
    let path = path.as_ref();

    let mut header = header_for::<A>(source.shape(), source.order());
    let header_bytes = Header::from_array_header(&header)
        .to_bytes()
        .map_err(WriteHeaderError::from)?;
    header.byte_offset = header_bytes.len() as u64;
    layout::validate(&header)?;
    let grid = ChunkGrid::new(
        &header.shape,
        chunk_shape,
        header.order,
        header.dtype.itemsize(),
        header.byte_offset,
    )?;
    let end = header.end_offset().ok_or(ConfigurationError::Overflow)?;

    let mut inputs = Vec::new();
    source.source.stores(&mut inputs);
    if inputs.iter().any(|store| store.is_same_file(path)) {
        return Err(ConfigurationError::SaveOverSource {
            path: path.to_path_buf(),
        }
        .into());
    }

    let store = FileStore::new(path, StoreMode::Write);
    store.create(&header_bytes, end)?;
    log::debug!(
        "lazy save to {} with shape {:?}, dtype {}: {} chunks of {:?}",
        path.display(),
        header.shape,
        header.dtype,
        grid.num_chunks(),
        grid.chunk_shape()
    );

    let workers = source.workers;
    let save = SaveSource {
        source: source.source,
        header,
        grid: grid.clone(),
        store,
    };
    Ok(LazyArray::from_source(Arc::new(save), &grid, workers))
}

/// Like [`save`], taking the chunk shape and worker count from `options`.
pub fn save_with_options<A, T, P>(
    array: T,
    path: P,
    options: &ChunkOptions,
) -> Result<LazyArray<A>, Error>
where
    A: Element,
    T: IntoLazyArray<A>,
    P: AsRef<Path>,
{
    let source = array.into_lazy_array()?;
    let chunk_shape =
        options.chunk_shape_for(source.shape(), A::dtype().itemsize(), source.order())?;
    let lazy = save(source, path, &chunk_shape)?;
    Ok(match options.workers() {
        Some(workers) => lazy.with_workers(workers),
        None => lazy,
    })
}
