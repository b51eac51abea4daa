//! Plotly figure for a returns series
//!
//! Four panels on a 3x4 grid: cumulative returns (row 1), underwater drawdown
//! (row 2), monthly returns heat map (row 3, three columns) and yearly returns
//! bars (row 3, last column).

use super::statistics::{cumulative, drawdowns};
use super::{format_amount, group_by_month, group_by_year};
use crate::engine::ReturnSeries;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_WIDTH: u32 = 1000;
pub const DEFAULT_HEIGHT: u32 = 1200;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const HEATMAP_COLORS: [(f64, &str); 10] = [
    (0.0, "#C41E27"),
    (0.1111111111111111, "#EA5739"),
    (0.2222222222222222, "#FA9B58"),
    (0.3333333333333333, "#FCAA5F"),
    (0.4444444444444444, "#FEE28F"),
    (0.5555555555555556, "#FEFFBE"),
    (0.6666666666666666, "#C3E67D"),
    (0.7777777777777778, "#73C264"),
    (0.8888888888888888, "#0E8245"),
    (1.0, "#006837"),
];

const SPACING: f64 = 0.05;

/// Serialized Plotly figure (`{data, layout}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub data: Vec<Value>,
    pub layout: Value,
}

impl Figure {
    /// Resize for the browser viewport
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.layout["autosize"] = json!(true);
        self.layout["width"] = json!(width);
        self.layout["height"] = json!(height);
    }

    pub fn width(&self) -> Option<u64> {
        self.layout["width"].as_u64()
    }

    pub fn height(&self) -> Option<u64> {
        self.layout["height"].as_u64()
    }

    pub fn title(&self) -> Option<&str> {
        self.layout["title"]["text"].as_str()
    }
}

/// `[start, end]` domains of the three rows, top to bottom
fn row_domains() -> [[f64; 2]; 3] {
    let height = (1.0 - 2.0 * SPACING) / 3.0;
    let top = |row: f64| 1.0 - row * (height + SPACING);
    [
        [top(0.0) - height, top(0.0)],
        [top(1.0) - height, top(1.0)],
        [0.0, height],
    ]
}

fn column_width() -> f64 {
    (1.0 - 3.0 * SPACING) / 4.0
}

/// Build the tearsheet figure at the default size
pub fn create_figure(returns: &ReturnSeries, title: &str) -> Figure {
    let dates: Vec<String> = returns.keys().map(|d| d.to_string()).collect();
    let cum = cumulative(returns);
    let underwater: Vec<f64> = drawdowns(&cum).iter().map(|d| d * 100.0).collect();

    let equity = json!({
        "type": "scatter",
        "x": dates,
        "y": cum,
        "line": {"color": "#66B266", "width": 2},
        "name": "",
        "xaxis": "x",
        "yaxis": "y",
    });

    let drawdown = json!({
        "type": "scatter",
        "x": dates,
        "y": underwater,
        "fill": "tonexty",
        "line": {"color": "#FF6A6A", "width": 2},
        "name": "",
        "xaxis": "x2",
        "yaxis": "y2",
    });

    // One row per year, zero for months without data
    let monthly = group_by_month(returns);
    let years: Vec<i32> = group_by_year(returns).into_keys().collect();
    let grid: Vec<Vec<f64>> = years
        .iter()
        .map(|y| {
            (1..=12u32)
                .map(|m| monthly.get(&(*y, m)).copied().unwrap_or(0.0) * 100.0)
                .collect()
        })
        .collect();

    let hover: Vec<Vec<String>> = years
        .iter()
        .zip(&grid)
        .map(|(year, row)| {
            row.iter()
                .zip(MONTHS)
                .map(|(v, month)| format!("{} {}: {}", month, year, format_amount(*v)))
                .collect()
        })
        .collect();

    let mut annotations: Vec<Value> = Vec::with_capacity(years.len() * 12 + 3);
    for (year, row) in years.iter().zip(&grid) {
        for (m, v) in row.iter().enumerate() {
            annotations.push(json!({
                "text": format!("{:.1}", v),
                "x": m,
                "y": year,
                "xref": "x3",
                "yref": "y3",
                "font": {"color": "#000"},
                "showarrow": false,
            }));
        }
    }

    let colorscale: Vec<Value> = HEATMAP_COLORS.iter().map(|(p, c)| json!([p, c])).collect();
    let heat_map = json!({
        "type": "heatmap",
        "z": grid,
        "x": MONTHS,
        "y": years,
        "text": hover,
        "hoverinfo": "text",
        "colorscale": colorscale,
        "showscale": false,
        "name": "",
        "xaxis": "x3",
        "yaxis": "y3",
    });

    let yearly: Vec<f64> = group_by_year(returns).into_values().map(|r| r * 100.0).collect();
    let by_year = json!({
        "type": "bar",
        "x": years,
        "y": yearly,
        "marker": {"color": "#44F"},
        "name": "",
        "xaxis": "x4",
        "yaxis": "y4",
    });

    let rows = row_domains();
    let col = column_width();
    let wide = [0.0, 1.0];
    let heat_x = [0.0, 3.0 * col + 2.0 * SPACING];
    let bar_x = [1.0 - col, 1.0];

    // Subplot titles sit just above their panel
    let subplot_title = |text: &str, x: [f64; 2], y: [f64; 2]| {
        json!({
            "text": text,
            "x": (x[0] + x[1]) / 2.0,
            "y": y[1],
            "xref": "paper",
            "yref": "paper",
            "xanchor": "center",
            "yanchor": "bottom",
            "font": {"size": 16},
            "showarrow": false,
        })
    };
    annotations.push(subplot_title("Drawdown (%)", wide, rows[1]));
    annotations.push(subplot_title("Monthly Returns (%)", heat_x, rows[2]));
    annotations.push(subplot_title("Yearly Returns (%)", bar_x, rows[2]));

    let layout = json!({
        "title": {"text": title},
        "autosize": false,
        "width": DEFAULT_WIDTH,
        "height": DEFAULT_HEIGHT,
        "showlegend": false,
        "margin": {"l": 40, "r": 20, "t": 40, "b": 40},
        "xaxis": {"domain": wide, "anchor": "y", "tickformat": "%Y-%m-%d"},
        "yaxis": {"domain": rows[0], "anchor": "x", "tickformat": ".2f"},
        "xaxis2": {"domain": wide, "anchor": "y2", "tickformat": "%Y-%m-%d"},
        "yaxis2": {"domain": rows[1], "anchor": "x2", "tickformat": ".2f"},
        "xaxis3": {"domain": heat_x, "anchor": "y3"},
        "yaxis3": {"domain": rows[2], "anchor": "x3", "autorange": "reversed", "dtick": 1},
        "xaxis4": {"domain": bar_x, "anchor": "y4", "dtick": 1, "tickangle": -45},
        "yaxis4": {"domain": rows[2], "anchor": "x4", "tickformat": ".2f"},
        "annotations": annotations,
    });

    Figure {
        data: vec![equity, drawdown, heat_map, by_year],
        layout,
    }
}
