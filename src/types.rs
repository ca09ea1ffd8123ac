use serde::Serialize;

/// Page dimensions in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn swapped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    A3,
    A4,
    A5,
    Letter,
    Legal,
    Tabloid,
}

impl PageSize {
    /// Portrait dimensions in inches.
    pub fn portrait(self) -> Size {
        match self {
            PageSize::A3 => Size::new(11.69, 16.54),
            PageSize::A4 => Size::new(8.27, 11.69),
            PageSize::A5 => Size::new(5.83, 8.27),
            PageSize::Letter => Size::new(8.5, 11.0),
            PageSize::Legal => Size::new(8.5, 14.0),
            PageSize::Tabloid => Size::new(11.0, 17.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub orientation: Orientation,
    pub size: PageSize,
}

impl PageLayout {
    pub fn new(orientation: Orientation, size: PageSize) -> Self {
        Self { orientation, size }
    }

    /// Oriented page dimensions: landscape swaps the portrait width and height.
    pub fn dimensions(&self) -> Size {
        match self.orientation {
            Orientation::Portrait => self.size.portrait(),
            Orientation::Landscape => self.size.portrait().swapped(),
        }
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::new(Orientation::Landscape, PageSize::A4)
    }
}

/// Section margins in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    pub fn all(value: f32) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

/// 8-bit RGB color as used by office documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const RED: Color = Color { r: 255, g: 0, b: 0 };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Alignment::Left),
            "center" | "centre" => Some(Alignment::Center),
            "right" => Some(Alignment::Right),
            "justify" => Some(Alignment::Justify),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FontStyle {
    Normal,
    Italic,
    Bold,
    BoldItalic,
}

impl FontStyle {
    pub fn is_bold(self) -> bool {
        matches!(self, FontStyle::Bold | FontStyle::BoldItalic)
    }

    pub fn is_italic(self) -> bool {
        matches!(self, FontStyle::Italic | FontStyle::BoldItalic)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FontSpec {
    pub name: String,
    /// Size in points.
    pub size: f32,
    pub style: FontStyle,
    pub color: Color,
}

impl FontSpec {
    pub fn new(name: impl Into<String>, size: f32, style: FontStyle, color: Color) -> Self {
        Self {
            name: name.into(),
            size,
            style,
            color,
        }
    }

    pub fn error_default() -> Self {
        Self::new("Arial", 8.0, FontStyle::Italic, Color::RED)
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        Self::new("Segoe UI", 10.0, FontStyle::Normal, Color::BLACK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_swaps_portrait_dimensions() {
        let layout = PageLayout::new(Orientation::Landscape, PageSize::A4);
        let dims = layout.dimensions();
        assert_eq!(dims, Size::new(11.69, 8.27));
        let portrait = PageLayout::new(Orientation::Portrait, PageSize::Letter);
        assert_eq!(portrait.dimensions(), Size::new(8.5, 11.0));
    }

    #[test]
    fn alignment_parses_case_insensitively() {
        assert_eq!(Alignment::from_str(" Center "), Some(Alignment::Center));
        assert_eq!(Alignment::from_str("RIGHT"), Some(Alignment::Right));
        assert_eq!(Alignment::from_str("middle"), None);
    }
}
