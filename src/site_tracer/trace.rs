use std::{
    collections::{HashSet, VecDeque},
    fmt::{Display, Formatter, Result},
};

use jiff::{SignedDuration, Timestamp};

use crate::listing::Listing;

use super::WorkerResult;

/// Bookkeeping for one recursive listing: what was seen, what is waiting and
/// which listing tasks are running.
pub struct Trace {
    listing: Listing,
    seen: HashSet<String>,
    queue: VecDeque<String>,
    processors: VecDeque<WorkerResult>,
    worker_pool_size: usize,
    started: Timestamp,
}

impl Trace {
    pub fn new(root: &str, worker_pool_size: u16) -> Self {
        Trace {
            listing: Listing::new(root.to_string()),
            seen: HashSet::from([root.to_string()]),
            queue: VecDeque::new(),
            processors: VecDeque::with_capacity(worker_pool_size as usize),
            worker_pool_size: (worker_pool_size as usize).max(1),
            started: Timestamp::now(),
        }
    }

    pub fn into_listing(self) -> Listing {
        self.listing
    }

    pub fn push_processor(&mut self, worker_res: WorkerResult) {
        self.processors.push_back(worker_res);
    }

    pub fn get_next_processor(&mut self) -> Option<WorkerResult> {
        self.processors.pop_front()
    }

    pub fn get_next_process(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    /// Queues a directory unless it was queued before. Returns whether it was new.
    pub fn queue_to_process(&mut self, url: &str) -> bool {
        if !self.seen.insert(url.to_string()) {
            return false;
        }
        self.queue.push_front(url.to_string());
        true
    }

    pub fn add_directory(&mut self, url: &str) {
        self.listing.add_directory(url.to_string());
    }

    pub fn add_file(&mut self, url: String) {
        self.listing.add_file(url);
    }

    pub fn has_process_capacity(&self) -> bool {
        self.processors.len() < self.worker_pool_size
    }

    /// Stops every listing task still in flight.
    pub fn abort_all(&mut self) {
        for processor in self.processors.drain(..) {
            processor.abort();
        }
        self.queue.clear();
    }

    pub fn elapsed(&self) -> SignedDuration {
        Timestamp::now().duration_since(self.started)
    }

    pub fn get_status(&self) -> String {
        format!(
            "{} listed, {} queued, {} in flight, {} files found",
            self.listing.directories.len(),
            self.queue.len(),
            self.processors.len(),
            self.listing.files.len()
        )
    }
}

impl Display for Trace {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{}", &self.get_status())
    }
}
