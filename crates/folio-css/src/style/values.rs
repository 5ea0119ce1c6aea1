//! CSS value types and string parsing.
//!
//! The cascade stores declaration values as raw strings; layout parses them
//! on demand through the helpers here. Unsupported values are never errors —
//! parsing returns `None`, the consumer logs once and keeps its default.
//!
//! - [CSS Values and Units Level 4](https://www.w3.org/TR/css-values-4/)
//! - [CSS Color Level 4](https://www.w3.org/TR/css-color-4/)

use serde::Serialize;

/// User agent default font size in pixels.
///
/// [§ 3.5 font-size](https://www.w3.org/TR/css-fonts-4/#font-size-prop)
/// "Initial: medium" — 16px per common browser convention.
pub const DEFAULT_FONT_SIZE_PX: f32 = 16.0;

/// [§ 4.1 Lengths](https://www.w3.org/TR/css-values-4/#lengths)
///
/// A parsed length value. `Em` is relative to the element's font size,
/// `Percent` to a containing-block dimension chosen by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Length {
    /// [§ 6.1 Absolute lengths](https://www.w3.org/TR/css-values-4/#absolute-lengths)
    /// "1px = 1/96th of 1in"
    Px(f32),
    /// [§ 5.1.1 Font-relative lengths](https://www.w3.org/TR/css-values-4/#font-relative-lengths)
    /// "Equal to the computed value of the font-size property of the element"
    Em(f32),
    /// [§ 4.3 Percentages](https://www.w3.org/TR/css-values-4/#percentages)
    Percent(f32),
}

impl Length {
    /// Resolve to pixels. Percentages resolve against `percent_base`; when
    /// no base is available they resolve to `None` and the consumer keeps
    /// its default.
    #[must_use]
    pub fn resolve(&self, font_size: f32, percent_base: Option<f32>) -> Option<f32> {
        match self {
            Length::Px(px) => Some(*px),
            Length::Em(em) => Some(em * font_size),
            Length::Percent(p) => percent_base.map(|base| base * p / 100.0),
        }
    }

    /// Resolve to pixels with a known percentage base.
    #[must_use]
    pub fn resolve_against(&self, font_size: f32, percent_base: f32) -> f32 {
        self.resolve(font_size, Some(percent_base)).unwrap_or(0.0)
    }
}

/// A length that may also be the keyword `auto`.
///
/// [§ 4.4 Automatic values](https://www.w3.org/TR/CSS2/cascade.html#value-def-auto)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum AutoLength {
    /// "The keyword 'auto'... allows the user agent to compute the value
    /// based on other properties."
    Auto,
    /// A concrete length.
    Length(Length),
}

impl AutoLength {
    /// Whether the value is `auto`.
    #[must_use]
    pub const fn is_auto(&self) -> bool {
        matches!(self, AutoLength::Auto)
    }
}

/// Parse a CSS length string: `"12px"`, `"1.5em"`, `"50%"`, or a bare
/// number (treated as pixels, matching legacy attribute values).
#[must_use]
pub fn parse_length(value: &str) -> Option<Length> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(num) = value.strip_suffix("px") {
        return num.trim().parse().ok().map(Length::Px);
    }
    if let Some(num) = value.strip_suffix("em") {
        return num.trim().parse().ok().map(Length::Em);
    }
    if let Some(num) = value.strip_suffix('%') {
        return num.trim().parse().ok().map(Length::Percent);
    }
    // Bare numbers appear in legacy width/height attributes.
    value.parse().ok().map(Length::Px)
}

/// Parse a length that may be the keyword `auto`.
#[must_use]
pub fn parse_auto_length(value: &str) -> Option<AutoLength> {
    if value.trim() == "auto" {
        return Some(AutoLength::Auto);
    }
    parse_length(value).map(AutoLength::Length)
}

/// An RGBA color.
///
/// [§ 4 Representing Colors](https://www.w3.org/TR/css-color-4/#color-type)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel (255 = opaque).
    pub a: u8,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 255,
    };

    /// Construct an opaque color.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b, a: 255 }
    }
}

/// Parse a CSS color: `#rgb`, `#rrggbb`, or `rgb(r, g, b)`.
///
/// Color keywords are out of scope; they parse to `None` and the consumer
/// keeps its default.
#[must_use]
pub fn parse_color(value: &str) -> Option<Color> {
    let value = value.trim();

    if let Some(hex) = value.strip_prefix('#') {
        return match hex.len() {
            3 => {
                let channel = |i: usize| {
                    u8::from_str_radix(&hex[i..=i], 16)
                        .ok()
                        .map(|v| v * 16 + v)
                };
                Some(Color::rgb(channel(0)?, channel(1)?, channel(2)?))
            }
            6 => {
                let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
                Some(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
            }
            _ => None,
        };
    }

    if let Some(args) = value
        .strip_prefix("rgb(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let mut channels = args.split(',').map(|c| c.trim().parse::<u8>().ok());
        let r = channels.next().flatten()?;
        let g = channels.next().flatten()?;
        let b = channels.next().flatten()?;
        if channels.next().is_some() {
            return None;
        }
        return Some(Color::rgb(r, g, b));
    }

    None
}

/// Expand a 1/2/3/4-value CSS box shorthand into `[top, right, bottom, left]`.
///
/// [§ 8.3 Margin properties](https://www.w3.org/TR/CSS2/box.html#margin-properties)
///
/// "If there is only one component value, it applies to all sides. If there
/// are two values, the top and bottom margins are set to the first value and
/// the right and left margins are set to the second. If there are three
/// values, the top is set to the first value, the left and right are set to
/// the second, and the bottom is set to the third. If there are four values,
/// they apply to the top, right, bottom, and left, respectively."
#[must_use]
pub fn expand_box_shorthand(value: &str) -> Option<[String; 4]> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    let pick = |i: usize| parts[i].to_string();
    match parts.len() {
        1 => Some([pick(0), pick(0), pick(0), pick(0)]),
        2 => Some([pick(0), pick(1), pick(0), pick(1)]),
        3 => Some([pick(0), pick(1), pick(2), pick(1)]),
        4 => Some([pick(0), pick(1), pick(2), pick(3)]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lengths() {
        assert_eq!(parse_length("12px"), Some(Length::Px(12.0)));
        assert_eq!(parse_length("1.5em"), Some(Length::Em(1.5)));
        assert_eq!(parse_length("50%"), Some(Length::Percent(50.0)));
        assert_eq!(parse_length("300"), Some(Length::Px(300.0)));
        assert_eq!(parse_length("thick"), None);
    }

    #[test]
    fn resolves_percent_against_base() {
        let half = Length::Percent(50.0);
        assert_eq!(half.resolve(16.0, Some(400.0)), Some(200.0));
        assert_eq!(half.resolve(16.0, None), None);
    }

    #[test]
    fn parses_colors() {
        assert_eq!(parse_color("#fff"), Some(Color::rgb(255, 255, 255)));
        assert_eq!(parse_color("#2563eb"), Some(Color::rgb(0x25, 0x63, 0xeb)));
        assert_eq!(parse_color("rgb(10, 20, 30)"), Some(Color::rgb(10, 20, 30)));
        // Keywords are out of scope.
        assert_eq!(parse_color("rebeccapurple"), None);
    }

    #[test]
    fn expands_box_shorthands() {
        assert_eq!(
            expand_box_shorthand("4px").unwrap(),
            ["4px", "4px", "4px", "4px"].map(String::from)
        );
        assert_eq!(
            expand_box_shorthand("1px 2px").unwrap(),
            ["1px", "2px", "1px", "2px"].map(String::from)
        );
        assert_eq!(
            expand_box_shorthand("1px 2px 3px").unwrap(),
            ["1px", "2px", "3px", "2px"].map(String::from)
        );
        assert_eq!(
            expand_box_shorthand("1px 2px 3px 4px").unwrap(),
            ["1px", "2px", "3px", "4px"].map(String::from)
        );
        assert!(expand_box_shorthand("1px 2px 3px 4px 5px").is_none());
    }
}
