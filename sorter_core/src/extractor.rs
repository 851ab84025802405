//! Feature extraction from raw samples.

use sorter_traits::Rgb;

use crate::types::Features;
use crate::util::round1;

/// Per-channel mean of `samples`, rounded to one decimal.
pub fn average(samples: &[Rgb]) -> Features {
    if samples.is_empty() {
        return Features::default();
    }
    let mut sum = [0i64; 3];
    for s in samples {
        for (acc, v) in sum.iter_mut().zip(s.0) {
            *acc += i64::from(v);
        }
    }
    let n = samples.len() as f32;
    Features(sum.map(|s| round1(s as f32 / n)))
}

/// A single sample taken as-is.
pub fn single(sample: Rgb) -> Features {
    Features(sample.0.map(|v| v as f32))
}
