//! Charts module - PNG rendering

mod renderer;
mod style;

pub use renderer::{
    Area, AxisSpec, Bar, Chart, MarkerKind, RenderError, StaticChartRenderer, COVID_BAND,
};
pub use style::{HexColor, InvalidColor, Palette, Style};
