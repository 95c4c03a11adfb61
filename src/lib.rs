pub mod client;
pub mod configuration;
pub mod error;
pub mod race;
pub mod request;
pub mod response;

pub use configuration::{FetchConfig, Settings};
pub use error::{AttemptFailure, FetchError};
pub use race::{fetch_racing, RaceFetcher};
pub use request::{headers_from_pairs, send_get, send_head};
pub use response::{FetchResult, Path};
