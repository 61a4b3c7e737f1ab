//! Per-collection cache of glob expansions and file contents.
//!
//! A `PathCache` lives for exactly one source collection. Definitions that
//! reference the same file share one read: the first `prefetch` queues the
//! path for the background readers, later `read` calls either block until the
//! reader is done or get the cached text straight away.
//!
//! Read failures are cached too, so a broken file is touched once per
//! collection no matter how many definitions point at it.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::{trace, warn};

use crate::collector::traits::{FileSystem, expand_glob};

/// Default number of background reader threads per cache.
pub const DEFAULT_READER_THREADS: usize = 8;

/// Cached read failure. `io::Error` is not `Clone`, so only its kind and
/// message are kept and a fresh error is built for every caller.
#[derive(Debug, Clone)]
struct ReadFailure {
    kind: io::ErrorKind,
    message: String,
}

impl ReadFailure {
    fn to_io_error(&self) -> io::Error {
        io::Error::new(self.kind, self.message.clone())
    }
}

type ReadResult = Result<Arc<str>, ReadFailure>;

#[derive(Debug, Clone)]
enum Entry {
    /// A reader is working on the file.
    Pending,
    Ready(ReadResult),
}

#[derive(Default)]
struct CacheState {
    globs: HashMap<PathBuf, Arc<[PathBuf]>>,
    files: HashMap<PathBuf, Entry>,
    queue: VecDeque<PathBuf>,
    /// Entries currently `Pending`.
    pending: usize,
    /// Live background reader threads.
    readers: usize,
}

struct Inner<F> {
    fs: Arc<F>,
    reader_threads: usize,
    state: Mutex<CacheState>,
    ready: Condvar,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_entry<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> ReadResult {
    fs.read_to_string(path)
        .map(Arc::from)
        .map_err(|e| ReadFailure {
            kind: e.kind(),
            message: format!("{}: {}", path.display(), e),
        })
}

impl<F: FileSystem> Inner<F> {
    fn complete(&self, path: PathBuf, result: ReadResult) {
        let mut state = lock(&self.state);
        let previous = state.files.insert(path, Entry::Ready(result));
        if matches!(previous, Some(Entry::Pending)) {
            state.pending -= 1;
        }
        drop(state);
        self.ready.notify_all();
    }

    /// Reads queued paths until the queue is empty.
    ///
    /// `counted` readers deregister under the same lock that observes the
    /// empty queue, so a concurrent `prefetch` never sees a reader that is
    /// about to exit.
    fn drain(&self, counted: bool) {
        loop {
            let path = {
                let mut state = lock(&self.state);
                match state.queue.pop_front() {
                    Some(path) => path,
                    None => {
                        if counted {
                            state.readers -= 1;
                        }
                        return;
                    }
                }
            };
            trace!(path = %path.display(), "background read");
            let result = read_entry(self.fs.as_ref(), &path);
            self.complete(path, result);
        }
    }
}

/// Glob and file-content cache for one collection pass.
pub struct PathCache<F: FileSystem + 'static> {
    inner: Arc<Inner<F>>,
}

impl<F: FileSystem + 'static> PathCache<F> {
    /// Creates an empty cache reading through `fs` with up to
    /// `reader_threads` background readers.
    pub fn new(fs: Arc<F>, reader_threads: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                fs,
                reader_threads: reader_threads.max(1),
                state: Mutex::new(CacheState::default()),
                ready: Condvar::new(),
            }),
        }
    }

    /// Expands `pattern`, memoizing the result for the cache's lifetime.
    pub fn resolve(&self, pattern: &Path) -> Arc<[PathBuf]> {
        if let Some(paths) = lock(&self.inner.state).globs.get(pattern) {
            return Arc::clone(paths);
        }

        let paths: Arc<[PathBuf]> = expand_glob(self.inner.fs.as_ref(), pattern).into();
        let mut state = lock(&self.inner.state);
        Arc::clone(state.globs.entry(pattern.to_path_buf()).or_insert(paths))
    }

    /// Queues every path not yet cached for a background read.
    pub fn prefetch<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) {
        let mut state = lock(&self.inner.state);
        for path in paths {
            if !state.files.contains_key(path) {
                state.files.insert(path.to_path_buf(), Entry::Pending);
                state.pending += 1;
                state.queue.push_back(path.to_path_buf());
            }
        }

        let wanted = state
            .queue
            .len()
            .min(self.inner.reader_threads)
            .saturating_sub(state.readers);

        for _ in 0..wanted {
            let inner = Arc::clone(&self.inner);
            let spawned = thread::Builder::new()
                .name("lustre-reader".into())
                .spawn(move || inner.drain(true));
            match spawned {
                Ok(_) => state.readers += 1,
                Err(e) => {
                    warn!(error = %e, "failed to spawn reader thread");
                    break;
                }
            }
        }

        let orphaned = state.readers == 0 && !state.queue.is_empty();
        drop(state);

        // No reader could be started: read inline rather than leave
        // entries pending forever.
        if orphaned {
            self.inner.drain(false);
        }
    }

    /// Blocks until no read is in flight.
    pub fn wait(&self) {
        let mut state = lock(&self.inner.state);
        while state.pending > 0 {
            state = self
                .inner
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Returns the content of `path`.
    ///
    /// Cached content or a cached failure is returned without touching the
    /// filesystem. A path with a read in flight blocks until it lands; an
    /// unknown path is read synchronously and cached.
    pub fn read(&self, path: &Path) -> io::Result<Arc<str>> {
        let mut state = lock(&self.inner.state);
        loop {
            match state.files.get(path) {
                Some(Entry::Ready(result)) => {
                    return result.clone().map_err(|e| e.to_io_error());
                }
                Some(Entry::Pending) => {
                    state = self
                        .inner
                        .ready
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                None => break,
            }
        }
        state.files.insert(path.to_path_buf(), Entry::Pending);
        state.pending += 1;
        drop(state);

        let result = read_entry(self.inner.fs.as_ref(), path);
        self.inner.complete(path.to_path_buf(), result.clone());
        result.map_err(|e| e.to_io_error())
    }

    /// Drops cached globs and contents. In-flight reads are left alone.
    pub fn release_all(&self) {
        let mut state = lock(&self.inner.state);
        state.globs.clear();
        state.files.retain(|_, entry| matches!(entry, Entry::Pending));
    }

    /// Number of files with cached content or failure.
    pub fn cached_files(&self) -> usize {
        lock(&self.inner.state)
            .files
            .values()
            .filter(|e| matches!(e, Entry::Ready(_)))
            .count()
    }
}
