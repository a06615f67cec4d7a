//! Video filter chain planning.
//!
//! The chain is always ordered `fps` → `scale` → `setsar`. An empty chain
//! means the source passes through unfiltered.

use std::fmt;

use cf_core::{EncodeParams, OutputKind};

/// Smallest dimension the planner will emit for an explicit size.
const MIN_EVEN_DIMENSION: u32 = 2;

/// One ffmpeg video filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Fps(u32),
    /// Negative values are ffmpeg's automatic dimensions.
    Scale { width: i64, height: i64 },
    SetSar,
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Fps(n) => write!(f, "fps={n}"),
            Filter::Scale { width, height } => write!(f, "scale={width}:{height}"),
            Filter::SetSar => write!(f, "setsar=1"),
        }
    }
}

/// An ordered filter chain, rendered comma-joined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChain(Vec<Filter>);

impl FilterChain {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.0
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, filter) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{filter}")?;
        }
        Ok(())
    }
}

/// Build the filter chain for one encode.
///
/// VIDEO rounds odd dimensions down to even (x264 with yuv420p rejects odd
/// sizes) and renders the automatic side as `-2`. LOOP keeps dimensions as
/// given and renders automatic as `-1`. AUDIO gets an empty chain.
pub fn build_filters(params: &EncodeParams, kind: OutputKind) -> FilterChain {
    let mut chain = Vec::new();
    if !kind.is_visual() {
        return FilterChain(chain);
    }

    if let Some(fps) = params.frame_rate {
        chain.push(Filter::Fps(fps));
    }

    let pixel_height = params.height.and_then(|h| h.pixels());
    if params.width.is_some() || pixel_height.is_some() {
        let video = kind == OutputKind::Video;
        let render = |dim: Option<u32>| match dim {
            Some(px) if video => i64::from(round_down_even(px)),
            Some(px) => i64::from(px),
            None if video => -2,
            None => -1,
        };
        chain.push(Filter::Scale {
            width: render(params.width),
            height: render(pixel_height),
        });
        if video {
            chain.push(Filter::SetSar);
        }
    }

    FilterChain(chain)
}

fn round_down_even(px: u32) -> u32 {
    (px - px % 2).max(MIN_EVEN_DIMENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_core::Height;

    fn params(width: Option<u32>, height: Option<Height>, fps: Option<u32>) -> EncodeParams {
        EncodeParams {
            width,
            height,
            frame_rate: fps,
            ..Default::default()
        }
    }

    #[test]
    fn empty_params_pass_through() {
        let chain = build_filters(&EncodeParams::default(), OutputKind::Video);
        assert!(chain.is_empty());
        assert_eq!(chain.to_string(), "");
    }

    #[test]
    fn loop_chain_order_and_auto() {
        let chain = build_filters(&params(Some(320), Some(Height::Auto), Some(15)), OutputKind::Loop);
        assert_eq!(chain.to_string(), "fps=15,scale=320:-1");
    }

    #[test]
    fn loop_keeps_odd_dimensions() {
        let chain = build_filters(&params(Some(321), Some(Height::Pixels(181)), None), OutputKind::Loop);
        assert_eq!(chain.to_string(), "scale=321:181");
    }

    #[test]
    fn video_rounds_odd_and_sets_sar() {
        let chain = build_filters(&params(Some(1549), Some(Height::Pixels(871)), None), OutputKind::Video);
        assert_eq!(chain.to_string(), "scale=1548:870,setsar=1");
    }

    #[test]
    fn video_auto_height_is_even_preserving() {
        let chain = build_filters(&params(Some(640), None, Some(24)), OutputKind::Video);
        assert_eq!(chain.to_string(), "fps=24,scale=640:-2,setsar=1");
    }

    #[test]
    fn height_only_scales_width_automatically() {
        let chain = build_filters(&params(None, Some(Height::Pixels(480)), None), OutputKind::Video);
        assert_eq!(chain.to_string(), "scale=-2:480,setsar=1");
    }

    #[test]
    fn fps_only_has_no_sar() {
        let chain = build_filters(&params(None, Some(Height::Auto), Some(30)), OutputKind::Video);
        assert_eq!(chain.filters(), &[Filter::Fps(30)]);
    }

    #[test]
    fn audio_never_filtered() {
        let chain = build_filters(&params(Some(640), None, Some(30)), OutputKind::Audio);
        assert!(chain.is_empty());
    }
}
