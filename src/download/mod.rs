pub mod ncbi;
pub mod rate_limit;

pub use ncbi::{FetchedLines, NcbiFetcher};
pub use rate_limit::{Clock, FetchPermit, RateLimiter, SystemClock};
