// Bar charts rendered to PNG.
//
// Charts are described as plain data first (`BarChart`, `GroupedBarChart`)
// and rasterized with plotters into an RGB buffer, then encoded with `image`.
// Text needs a system sans-serif font at render time.
use crate::error::{ReportError, Result};
use crate::util::bar_label;
use plotters::coord::combinators::{BindKeyPoints, WithKeyPoints};
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use std::io::Cursor;
use tracing::debug;

const BAR_COLOR: RGBColor = RGBColor(31, 119, 180);
const OLD_COLOR: RGBColor = RGBColor(31, 119, 180);
const NEW_COLOR: RGBColor = RGBColor(255, 127, 14);
const FONT: &str = "sans-serif";

/// Headroom above the tallest bar for its label.
const HEADROOM: f64 = 1.15;

#[derive(Debug, Clone)]
pub struct Png {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct BarChart {
    pub title: String,
    pub y_label: String,
    pub bars: Vec<Bar>,
    pub size: (u32, u32),
}

impl BarChart {
    pub fn y_max(&self) -> f64 {
        y_max(self.bars.iter().filter_map(|b| b.value))
    }

    /// `(bar index, text)` for every bar that has a value.
    pub fn annotations(&self) -> Vec<(usize, String)> {
        self.bars
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.value.map(|v| (i, bar_label(v))))
            .collect()
    }
}

/// Two series drawn side by side per category.
#[derive(Debug, Clone)]
pub struct GroupedBarChart {
    pub title: String,
    pub y_label: String,
    pub categories: Vec<String>,
    pub series: [(String, Vec<Option<f64>>); 2],
    pub size: (u32, u32),
}

impl GroupedBarChart {
    pub fn y_max(&self) -> f64 {
        y_max(self.series.iter().flat_map(|(_, values)| values.iter().flatten().copied()))
    }
}

fn y_max(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.fold(0.0f64, f64::max);
    if max <= 0.0 {
        1.0
    } else {
        max * HEADROOM
    }
}

pub fn render_bar_chart(chart: &BarChart) -> Result<Png> {
    let (w, h) = chart.size;
    let mut buf = vec![0u8; (w * h * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (w, h)).into_drawing_area();
        root.fill(&WHITE).map_err(ReportError::render)?;

        let n = chart.bars.len();
        let names: Vec<String> = chart.bars.iter().map(|b| b.label.clone()).collect();
        let mut ctx = ChartBuilder::on(&root)
            .caption(&chart.title, (FONT, 22))
            .margin(15)
            .x_label_area_size(label_area(&names))
            .y_label_area_size(60)
            .build_cartesian_2d(category_axis(n), 0f64..chart.y_max())
            .map_err(ReportError::render)?;

        ctx.configure_mesh()
            .disable_x_mesh()
            .y_desc(chart.y_label.as_str())
            .x_labels(n.max(1))
            .x_label_formatter(&|v| category_name(&names, *v))
            .x_label_style(category_label_style())
            .draw()
            .map_err(ReportError::render)?;

        ctx.draw_series(chart.bars.iter().enumerate().filter_map(|(i, b)| {
            b.value.map(|v| {
                let x = i as f64;
                let mut rect = Rectangle::new([(x, 0.0), (x + 1.0, v)], BAR_COLOR.filled());
                rect.set_margin(0, 0, 8, 8);
                rect
            })
        }))
        .map_err(ReportError::render)?;

        let label_style = TextStyle::from((FONT, 13).into_font()).pos(Pos::new(HPos::Center, VPos::Bottom));
        ctx.draw_series(chart.annotations().into_iter().filter_map(|(i, text)| {
            let v = chart.bars[i].value?;
            Some(Text::new(text, (i as f64 + 0.5, v), label_style.clone()))
        }))
        .map_err(ReportError::render)?;

        root.present().map_err(ReportError::render)?;
    }
    debug!(title = %chart.title, bars = chart.bars.len(), "rendered bar chart");
    encode_png(buf, w, h)
}

pub fn render_grouped_chart(chart: &GroupedBarChart) -> Result<Png> {
    let (w, h) = chart.size;
    let mut buf = vec![0u8; (w * h * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (w, h)).into_drawing_area();
        root.fill(&WHITE).map_err(ReportError::render)?;

        let n = chart.categories.len();
        let mut ctx = ChartBuilder::on(&root)
            .caption(&chart.title, (FONT, 22))
            .margin(15)
            .x_label_area_size(label_area(&chart.categories))
            .y_label_area_size(60)
            .build_cartesian_2d(category_axis(n), 0f64..chart.y_max())
            .map_err(ReportError::render)?;

        ctx.configure_mesh()
            .disable_x_mesh()
            .y_desc(chart.y_label.as_str())
            .x_labels(n.max(1))
            .x_label_formatter(&|v| category_name(&chart.categories, *v))
            .x_label_style(category_label_style())
            .draw()
            .map_err(ReportError::render)?;

        // Each category slot is split into a left (old) and right (new) half.
        let (plot_w, _) = ctx.plotting_area().dim_in_pixel();
        let half = (plot_w as f64 / n.max(1) as f64 / 2.0) as u32;
        let gap = (half / 8).max(1);
        let colors = [OLD_COLOR, NEW_COLOR];

        for (s, (name, values)) in chart.series.iter().enumerate() {
            let color = colors[s];
            let (left, right) = if s == 0 { (gap, half) } else { (half, gap) };
            ctx.draw_series(values.iter().enumerate().filter_map(|(i, v)| {
                v.map(|v| {
                    let x = i as f64;
                    let mut rect = Rectangle::new([(x, 0.0), (x + 1.0, v)], color.filled());
                    rect.set_margin(0, 0, left, right);
                    rect
                })
            }))
            .map_err(ReportError::render)?
            .label(name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
        }

        ctx.configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(ReportError::render)?;

        root.present().map_err(ReportError::render)?;
    }
    debug!(title = %chart.title, categories = chart.categories.len(), "rendered grouped chart");
    encode_png(buf, w, h)
}

/// One unit per category, labelled at the centre of each slot. An empty
/// chart still gets a unit-wide axis.
fn category_axis(n: usize) -> WithKeyPoints<RangedCoordf64> {
    let centres = (0..n).map(|i| i as f64 + 0.5).collect();
    (0f64..n.max(1) as f64).with_key_points(centres)
}

fn category_name(names: &[String], v: f64) -> String {
    if v < 0.0 {
        return String::new();
    }
    names.get(v.floor() as usize).cloned().unwrap_or_default()
}

/// Entity names run vertically so long lists stay readable.
fn category_label_style() -> TextStyle<'static> {
    (FONT, 12).into_font().transform(FontTransform::Rotate90).into()
}

/// Room below the axis for the longest vertical label.
fn label_area(names: &[String]) -> u32 {
    let longest = names.iter().map(|n| n.chars().count()).max().unwrap_or(0) as u32;
    (longest * 8 + 20).clamp(40, 200)
}

fn encode_png(buf: Vec<u8>, width: u32, height: u32) -> Result<Png> {
    let img = image::RgbImage::from_raw(width, height, buf)
        .ok_or_else(|| ReportError::render("chart buffer does not match its dimensions"))?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .map_err(ReportError::render)?;
    Ok(Png {
        bytes: out.into_inner(),
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart(values: &[Option<f64>]) -> BarChart {
        BarChart {
            title: "t".into(),
            y_label: "y".into(),
            bars: values
                .iter()
                .enumerate()
                .map(|(i, v)| Bar {
                    label: format!("E{}", i),
                    value: *v,
                })
                .collect(),
            size: (600, 400),
        }
    }

    #[test]
    fn missing_values_get_no_annotation() {
        let c = chart(&[Some(85.54), None, Some(100.0)]);
        assert_eq!(
            c.annotations(),
            vec![(0, "85.5%".to_string()), (2, "100.0%".to_string())]
        );
    }

    #[test]
    fn y_axis_leaves_room_for_labels() {
        assert!((chart(&[Some(80.0), Some(120.0)]).y_max() - 138.0).abs() < 1e-9);
        assert_eq!(chart(&[None]).y_max(), 1.0);
        assert_eq!(chart(&[]).y_max(), 1.0);

        let grouped = GroupedBarChart {
            title: "g".into(),
            y_label: "y".into(),
            categories: vec!["A".into()],
            series: [("old".into(), vec![Some(50.0)]), ("new".into(), vec![Some(200.0)])],
            size: (1000, 500),
        };
        assert!((grouped.y_max() - 230.0).abs() < 1e-9);
    }

    #[test]
    fn png_encoding_keeps_dimensions() {
        let png = encode_png(vec![255u8; 4 * 3 * 3], 4, 3).unwrap();
        assert_eq!(&png.bytes[..4], b"\x89PNG");
        assert_eq!((png.width, png.height), (4, 3));
        assert!(encode_png(vec![0u8; 5], 4, 3).is_err());
    }

    #[test]
    fn axis_has_one_slot_per_category() {
        let axis = category_axis(3);
        assert_eq!(axis.range(), 0.0..3.0);
        assert_eq!(axis.key_points(10usize), vec![0.5, 1.5, 2.5]);
        assert_eq!(category_axis(0).range(), 0.0..1.0);

        let names = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        assert_eq!(category_name(&names, 2.5), "C");
        assert_eq!(category_name(&names, 3.5), "");
        assert_eq!(category_name(&names, -0.5), "");
    }

    #[test]
    fn label_area_grows_with_name_length() {
        assert_eq!(label_area(&[]), 40);
        assert!(label_area(&["Điện lực Hoàn Kiếm".to_string()]) > label_area(&["ĐL A".to_string()]));
        assert_eq!(label_area(&["x".repeat(100)]), 200);
    }

    // Text needs a system font; without one plotters reports a render error.
    fn rendered_or_no_font(result: Result<Png>) -> Option<image::RgbImage> {
        match result {
            Ok(png) => {
                let img = image::load_from_memory(&png.bytes).unwrap().to_rgb8();
                assert_eq!(img.dimensions(), (png.width, png.height));
                Some(img)
            }
            Err(ReportError::Render(_)) => None,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn last_bar_reaches_the_right_edge() {
        let c = chart(&[Some(100.0), Some(100.0), Some(100.0)]);
        let Some(img) = rendered_or_no_font(render_bar_chart(&c)) else {
            return;
        };
        let y = img.height() / 2;
        let rightmost = (0..img.width())
            .filter(|&x| img.get_pixel(x, y).0 == [BAR_COLOR.0, BAR_COLOR.1, BAR_COLOR.2])
            .max()
            .unwrap();
        assert!(rightmost > img.width() * 85 / 100, "last bar ends at x={rightmost}");
    }

    #[test]
    fn renders_many_categories() {
        let values: Vec<Option<f64>> = (0..30).map(|i| Some(i as f64 * 3.0)).collect();
        let mut c = chart(&values);
        c.size = (1000, 500);
        rendered_or_no_font(render_bar_chart(&c));

        let grouped = GroupedBarChart {
            title: "g".into(),
            y_label: "y".into(),
            categories: (0..30).map(|i| format!("Điện lực {}", i)).collect(),
            series: [("old".into(), values.clone()), ("new".into(), vec![None; 30])],
            size: (1000, 500),
        };
        rendered_or_no_font(render_grouped_chart(&grouped));
    }
}
