//! Test helpers shared by the unit tests of this crate.

use crate::callback::TickingCallback;
use crate::error::SubscriptionError;
use crate::transport::FlightStreamChunk;
use arrow::array::{ArrayRef, Float64Array, RecordBatch, StringArray};
use barrage_core::column::wrap_in_envelope;
use barrage_core::rowset::RowSequence;
use barrage_core::ticking::{TickingUpdate, UpdateMetadata};
use barrage_core::{ElementTypeId, Schema};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub(crate) fn init_test_logger() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .with(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new("info"))
                .unwrap(),
        )
        .try_init();
}

/// Wait for `predicate` to become `true`.
///
/// Returns the number of milliseconds elapsed or `Err(())` on timeout.
#[allow(clippy::result_unit_err)]
pub fn wait<P>(mut predicate: P, timeout_ms: u128) -> Result<u128, ()>
where
    P: FnMut() -> bool,
{
    let start = Instant::now();

    while !predicate() {
        if start.elapsed().as_millis() >= timeout_ms {
            return Err(());
        }
        sleep(Duration::from_millis(10));
    }

    Ok(start.elapsed().as_millis())
}

pub const TIMEOUT: Duration = Duration::from_secs(10);

pub fn ticker_schema() -> Arc<Schema> {
    Schema::create(
        vec!["Ticker".to_string(), "Close".to_string()],
        vec![ElementTypeId::String, ElementTypeId::Double],
    )
    .unwrap()
}

/// Metadata for a message that only adds rows.
pub fn add_rows(seq: i64, keys: impl IntoIterator<Item = u64>) -> UpdateMetadata {
    UpdateMetadata {
        first_seq: seq,
        last_seq: seq,
        is_snapshot: seq == 0,
        added: RowSequence::from_keys(keys),
        modified: vec![RowSequence::empty(), RowSequence::empty()],
        ..UpdateMetadata::default()
    }
}

/// A `Ticker`/`Close` frame in the single-element list envelope.
pub fn ticker_frame(
    tickers: &[&str],
    closes: &[f64],
    metadata: Option<&UpdateMetadata>,
) -> FlightStreamChunk {
    let tickers: ArrayRef = Arc::new(StringArray::from(tickers.to_vec()));
    let closes: ArrayRef = Arc::new(Float64Array::from(closes.to_vec()));
    FlightStreamChunk {
        data: RecordBatch::try_from_iter(vec![
            ("Ticker", wrap_in_envelope(tickers)),
            ("Close", wrap_in_envelope(closes)),
        ])
        .unwrap(),
        app_metadata: metadata.map(UpdateMetadata::encode),
    }
}

/// Table contents as `(ticker, close)` pairs.
pub fn ticker_rows(update: &TickingUpdate) -> Vec<(String, f64)> {
    let table = update.current();
    (0..table.num_rows())
        .map(|row| {
            (
                table.get(row, 0).unwrap().to_string(),
                table.get(row, 1).unwrap().to_string().parse().unwrap(),
            )
        })
        .collect()
}

/// Records everything a subscription delivers.
#[derive(Default)]
pub struct Recorder {
    pub ticks: Mutex<Vec<TickingUpdate>>,
    pub failures: Mutex<Vec<SubscriptionError>>,
}

impl Recorder {
    pub fn num_ticks(&self) -> usize {
        self.ticks.lock().unwrap().len()
    }

    pub fn num_failures(&self) -> usize {
        self.failures.lock().unwrap().len()
    }
}

impl TickingCallback for Recorder {
    fn on_tick(&self, update: TickingUpdate) {
        self.ticks.lock().unwrap().push(update);
    }

    fn on_failure(&self, error: SubscriptionError) {
        self.failures.lock().unwrap().push(error);
    }
}
