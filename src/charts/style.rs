//! Chart Style Module
//! Immutable palette, resolution and font settings shared by every figure.

use crate::data::schema::{Cause, Sex};
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{Color, FontDesc, FontFamily, FontStyle, RGBColor, TextStyle};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid colour {0:?}, expected #rrggbb")]
pub struct InvalidColor(pub String);

/// An sRGB colour written as `#rrggbb` in style files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(pub u8, pub u8, pub u8);

impl HexColor {
    pub fn parse(value: &str) -> Result<Self, InvalidColor> {
        let digits = value
            .strip_prefix('#')
            .filter(|d| d.len() == 6 && d.is_ascii())
            .ok_or_else(|| InvalidColor(value.to_string()))?;
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| InvalidColor(value.to_string()))
        };
        Ok(Self(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn rgb(self) -> RGBColor {
        RGBColor(self.0, self.1, self.2)
    }
}

impl TryFrom<String> for HexColor {
    type Error = InvalidColor;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.to_string()
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Named colours used across the figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub primary: HexColor,
    pub secondary: HexColor,
    pub accent: HexColor,
    pub danger: HexColor,
    pub success: HexColor,
    pub male: HexColor,
    pub female: HexColor,
    pub both: HexColor,
    pub cancer: HexColor,
    pub cardio: HexColor,
    pub cerebro: HexColor,
    pub general: HexColor,
    pub suicide: HexColor,
    pub covid_band: HexColor,
    pub alicante: HexColor,
    pub valencia: HexColor,
    pub castellon: HexColor,
    pub neutral: HexColor,
    pub ink: HexColor,
    pub muted: HexColor,
    pub panel: HexColor,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            primary: HexColor(0x1a, 0x36, 0x5d),
            secondary: HexColor(0x2c, 0x52, 0x82),
            accent: HexColor(0xed, 0x89, 0x36),
            danger: HexColor(0xc5, 0x30, 0x30),
            success: HexColor(0x27, 0x67, 0x49),
            male: HexColor(0x31, 0x82, 0xce),
            female: HexColor(0xd5, 0x3f, 0x8c),
            both: HexColor(0x80, 0x5a, 0xd5),
            cancer: HexColor(0xe5, 0x3e, 0x3e),
            cardio: HexColor(0xdd, 0x6b, 0x20),
            cerebro: HexColor(0xd6, 0x9e, 0x2e),
            general: HexColor(0x1a, 0x36, 0x5d),
            suicide: HexColor(0x6b, 0x46, 0xc1),
            covid_band: HexColor(0xfe, 0xd7, 0xd7),
            alicante: HexColor(0x38, 0xa1, 0x69),
            valencia: HexColor(0x31, 0x82, 0xce),
            castellon: HexColor(0xd6, 0x9e, 0x2e),
            neutral: HexColor(0x71, 0x80, 0x96),
            ink: HexColor(0x2d, 0x37, 0x48),
            muted: HexColor(0x4a, 0x55, 0x68),
            panel: HexColor(0xf7, 0xfa, 0xfc),
        }
    }
}

/// Resolution, typography and palette. Built once and passed by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    pub dpi: u32,
    pub font_family: String,
    /// Default text size in points.
    pub base_font_pt: f64,
    pub title_font_pt: f64,
    pub label_font_pt: f64,
    pub palette: Palette,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            dpi: 300,
            font_family: "sans-serif".to_string(),
            base_font_pt: 11.0,
            title_font_pt: 14.0,
            label_font_pt: 12.0,
            palette: Palette::default(),
        }
    }
}

impl Style {
    /// Points to pixels at the configured resolution.
    pub fn px(&self, pt: f64) -> f64 {
        pt * self.dpi as f64 / 72.0
    }

    /// Integer pixel size, at least one pixel.
    pub fn px_u32(&self, pt: f64) -> u32 {
        self.px(pt).round().max(1.0) as u32
    }

    /// Canvas size in pixels for a figure given in inches.
    pub fn canvas_size(&self, inches: (f64, f64)) -> (u32, u32) {
        let dpi = self.dpi as f64;
        (
            (inches.0 * dpi).round() as u32,
            (inches.1 * dpi).round() as u32,
        )
    }

    /// Line width in pixels for a width in points.
    pub fn stroke(&self, pt: f64) -> u32 {
        self.px_u32(pt)
    }

    fn text_with(&self, pt: f64, weight: FontStyle, color: RGBColor) -> TextStyle<'_> {
        TextStyle {
            font: FontDesc::new(
                FontFamily::from(self.font_family.as_str()),
                self.px(pt),
                weight,
            ),
            color: color.to_backend_color(),
            pos: Pos::new(HPos::Left, VPos::Top),
        }
    }

    /// Regular text in the default ink colour.
    pub fn font(&self, pt: f64) -> TextStyle<'_> {
        self.text_with(pt, FontStyle::Normal, self.palette.ink.rgb())
    }

    /// Bold text in the default ink colour.
    pub fn bold(&self, pt: f64) -> TextStyle<'_> {
        self.text_with(pt, FontStyle::Bold, self.palette.ink.rgb())
    }

    /// Regular text in a given colour.
    pub fn font_colored(&self, pt: f64, color: RGBColor) -> TextStyle<'_> {
        self.text_with(pt, FontStyle::Normal, color)
    }

    /// Bold text in a given colour.
    pub fn bold_colored(&self, pt: f64, color: RGBColor) -> TextStyle<'_> {
        self.text_with(pt, FontStyle::Bold, color)
    }

    /// Whether the configured family resolves to a usable regular and bold face.
    #[cfg(test)]
    pub fn has_font(&self) -> bool {
        [self.font(12.0), self.bold(12.0)]
            .iter()
            .all(|text| text.font.box_size("Ag").is_ok())
    }

    pub fn title(&self) -> TextStyle<'_> {
        self.bold(self.title_font_pt)
    }

    pub fn axis_desc(&self) -> TextStyle<'_> {
        self.bold(self.label_font_pt)
    }

    pub fn tick_label(&self) -> TextStyle<'_> {
        self.font(self.base_font_pt - 1.0)
    }

    pub fn cause_color(&self, cause: Cause) -> RGBColor {
        let p = &self.palette;
        match cause {
            Cause::General => p.general,
            Cause::Cancer => p.cancer,
            Cause::Cardio => p.cardio,
            Cause::Cerebrovascular => p.cerebro,
            Cause::Suicide => p.suicide,
        }
        .rgb()
    }

    pub fn sex_color(&self, sex: Sex) -> RGBColor {
        let p = &self.palette;
        match sex {
            Sex::Both => p.both,
            Sex::Male => p.male,
            Sex::Female => p.female,
        }
        .rgb()
    }

    /// Province colour; unknown provinces get the neutral grey.
    pub fn province_color(&self, province: &str) -> RGBColor {
        let p = &self.palette;
        match province {
            "Alicante" => p.alicante,
            "Valencia" => p.valencia,
            "Castellón" => p.castellon,
            _ => p.neutral,
        }
        .rgb()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_color_parses_and_prints() {
        let color = HexColor::parse("#1a365d").unwrap();
        assert_eq!(color, HexColor(0x1a, 0x36, 0x5d));
        assert_eq!(color.to_string(), "#1a365d");
        assert!(HexColor::parse("1a365d").is_err());
        assert!(HexColor::parse("#1a365").is_err());
        assert!(HexColor::parse("#zz365d").is_err());
    }

    #[test]
    fn pixel_scale_follows_dpi() {
        let style = Style::default();
        assert_eq!(style.px(72.0), 300.0);
        assert_eq!(style.canvas_size((14.0, 7.0)), (4200, 2100));

        let draft = Style {
            dpi: 72,
            ..Style::default()
        };
        assert_eq!(draft.px_u32(11.0), 11);
        assert_eq!(draft.px_u32(0.1), 1);
    }

    #[test]
    fn province_colors_fall_back_to_neutral() {
        let style = Style::default();
        assert_eq!(style.province_color("Alicante"), RGBColor(0x38, 0xa1, 0x69));
        assert_eq!(style.province_color("Murcia"), RGBColor(0x71, 0x80, 0x96));
    }
}
