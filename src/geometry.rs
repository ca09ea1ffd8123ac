use crate::types::Size;

pub const DEFAULT_WIDTH_RATIO: f32 = 0.6;
pub const MAX_WIDTH_RATIO: f32 = 0.9;
pub const MAX_HEIGHT_RATIO: f32 = 0.8;

/// Caller-side sizing inputs, all in inches.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SizeRequest {
    pub width: Option<f32>,
    pub height: Option<f32>,
    /// Derive width from this height (small header/footer logos).
    pub target_height: Option<f32>,
}

impl SizeRequest {
    pub fn with_target_height(height: f32) -> Self {
        Self {
            target_height: Some(height),
            ..Self::default()
        }
    }

    pub fn has_override(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }
}

/// Target picture size in inches for an image of `pixel_width` x `pixel_height`.
///
/// Without overrides the aspect ratio is always preserved and the result fits
/// in 90% of the page width and 80% of the page height. Explicit overrides are
/// taken as-is and never clamped.
pub fn resolve_size(pixel_width: u32, pixel_height: u32, request: &SizeRequest, page: Size) -> Size {
    let aspect = if pixel_width == 0 || pixel_height == 0 {
        1.0
    } else {
        pixel_width as f32 / pixel_height as f32
    };

    let (mut width, mut height) = match request.target_height {
        Some(target) if target > 0.0 => (target * aspect, target),
        _ => {
            let width = page.width * DEFAULT_WIDTH_RATIO;
            (width, width / aspect)
        }
    };

    if request.has_override() {
        if let Some(w) = request.width {
            width = w;
        }
        if let Some(h) = request.height {
            height = h;
        }
        return Size::new(width, height);
    }

    let max_width = page.width * MAX_WIDTH_RATIO;
    let max_height = page.height * MAX_HEIGHT_RATIO;
    if width > max_width {
        width = max_width;
        height = width / aspect;
    }
    if height > max_height {
        height = max_height;
        width = height * aspect;
    }
    Size::new(width, height)
}

/// Parses a dimension attribute in inches (`"2"`, `"1.5in"`). Non-positive or
/// unparseable values count as absent.
pub fn parse_inches(raw: Option<&str>) -> Option<f32> {
    let raw = raw?.trim();
    let raw = raw.strip_suffix("in").unwrap_or(raw).trim();
    raw.parse::<f32>()
        .ok()
        .filter(|value| value.is_finite() && *value > 0.0)
}
