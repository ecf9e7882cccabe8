//! Saturation transfer curves for the bass distortion stage.
//!
//! A curve is a lookup table over input in [-1, 1]. Building one means
//! filling tens of thousands of points, while the same distortion amount is
//! reused for every note, so curves live in a shared cache keyed by amount.

use std::collections::HashMap;
use std::f32::consts::PI;
use std::sync::{Arc, Mutex};

pub const CURVE_LEN: usize = 44_100;
pub const MAX_DRIVE: f32 = 10.0;

/// Soft-clip table for a 0-100 distortion amount. Larger amounts bend the
/// curve harder towards a square-ish transfer.
pub fn distortion_curve(amount: f32) -> Vec<f32> {
    let k = amount;
    let deg = PI / 180.0;
    (0..CURVE_LEN)
        .map(|i| {
            let x = i as f32 * 2.0 / CURVE_LEN as f32 - 1.0;
            (3.0 + k) * x * 20.0 * deg / (PI + k * x.abs())
        })
        .collect()
}

/// Reads a transfer curve the way a waveshaper does: input clamped to
/// [-1, 1], spread across the table and linearly interpolated.
#[inline]
pub fn shape(curve: &[f32], x: f32) -> f32 {
    let n = curve.len();
    if n == 0 {
        return x;
    }
    if n == 1 {
        return curve[0];
    }
    let pos = (x.clamp(-1.0, 1.0) + 1.0) * 0.5 * (n - 1) as f32;
    let i = pos as usize;
    if i >= n - 1 {
        return curve[n - 1];
    }
    let frac = pos - i as f32;
    curve[i] + (curve[i + 1] - curve[i]) * frac
}

/// Memoized curves. Two lookups of the same amount hand back the same
/// allocation. Concurrent misses may both build the table; the first insert
/// is the one kept.
#[derive(Debug, Default)]
pub struct CurveCache {
    curves: Mutex<HashMap<u32, Arc<[f32]>>>,
}

impl CurveCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` means "no shaping" (amount at or below zero).
    pub fn get(&self, amount: f32) -> Option<Arc<[f32]>> {
        if amount.is_nan() || amount <= 0.0 {
            return None;
        }
        let key = amount.to_bits();
        if let Some(curve) = self.lock().get(&key) {
            return Some(Arc::clone(curve));
        }
        let curve: Arc<[f32]> = distortion_curve(amount).into();
        let mut curves = self.lock();
        let entry = curves.entry(key).or_insert(curve);
        Some(Arc::clone(entry))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u32, Arc<[f32]>>> {
        // a panic mid-insert leaves the map consistent, keep using it
        self.curves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Everything the distortion stage needs for one amount setting.
#[derive(Clone, Debug)]
pub struct DriveSettings {
    pub amount: f32,
    pub curve: Option<Arc<[f32]>>,
    pub pre_gain: f32,
    pub post_gain: f32,
}

impl DriveSettings {
    pub fn clean() -> Self {
        Self { amount: 0.0, curve: None, pre_gain: 1.0, post_gain: 1.0 }
    }

    /// Drive rises with the amount and the output is pulled back by
    /// 1/sqrt(drive) so loudness stays roughly level.
    pub fn for_amount(amount: f32, cache: &CurveCache) -> Self {
        let amount = amount.clamp(0.0, 100.0);
        let drive = 1.0 + (MAX_DRIVE - 1.0) * amount / 100.0;
        Self {
            amount,
            curve: cache.get(amount),
            pre_gain: drive,
            post_gain: 1.0 / drive.sqrt(),
        }
    }
}
