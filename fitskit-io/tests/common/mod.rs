#![allow(dead_code)]

use std::sync::Once;

use fitskit_config::CONFIG;
use fitskit_data::{ColumnInfo, VecColumn};
use fitskit_io::FitsValue;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static TRACING: Once = Once::new();

/// Install a test-friendly subscriber, filtered by `RUST_LOG` or the configured log level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&CONFIG.log_level)),
            )
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

pub fn column<T: FitsValue>(name: &str, repeat_count: usize, values: Vec<T>) -> VecColumn<T> {
    VecColumn::new(ColumnInfo::new(name, "", repeat_count), values).expect("valid column")
}

pub fn ramp_i32(row_count: usize) -> Vec<i32> {
    (0..row_count as i32).map(|i| i * 3 - 7).collect()
}

pub fn ramp_f32(row_count: usize) -> Vec<f32> {
    (0..row_count).map(|i| i as f32 * 0.25 + 1.0).collect()
}

pub fn ramp_f64(row_count: usize) -> Vec<f64> {
    (0..row_count).map(|i| (i as f64).sqrt() - 0.5).collect()
}
