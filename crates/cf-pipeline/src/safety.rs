//! Cost clamps for loop outputs.
//!
//! Gifs grow quickly with length, width and frame rate, so every loop encode
//! is bounded before planning. Each clamp is independent and only ever
//! lowers a value.

use cf_av::ProbeResult;
use cf_core::config::Limits;
use cf_core::{EncodeParams, Height};

/// Return `effective` with the loop duration, width and frame rate clamped.
pub fn apply_loop_safety(effective: &EncodeParams, probe: &ProbeResult, limits: &Limits) -> EncodeParams {
    let mut clamped = effective.clone();

    let max_length = limits.max_loop_length();
    if clamped.end.is_none() && probe.duration > max_length {
        let end = clamped.start.unwrap_or_default() + max_length;
        tracing::info!(
            "loop source is {:.1}s; ending clip at {:.1}s",
            probe.duration.as_secs_f64(),
            end.as_secs_f64()
        );
        clamped.end = Some(end);
    }

    let probed_width = (probe.width > 0).then_some(probe.width);
    if let Some(width) = clamped.width.or(probed_width) {
        if width > limits.safe_loop_width {
            tracing::info!("loop width {width}px clamped to {}px", limits.safe_loop_width);
            clamped.width = Some(limits.safe_loop_width);
            clamped.height = Some(Height::Auto);
        }
    }

    let fps = clamped.frame_rate.unwrap_or(limits.assumed_source_fps);
    if fps > limits.safe_loop_fps {
        tracing::debug!("loop frame rate {fps} clamped to {}", limits.safe_loop_fps);
        clamped.frame_rate = Some(limits.safe_loop_fps);
    }

    clamped
}
