use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::{Row, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Line,
    Bar,
    Pie,
}

/// One named series of a chart element (one line per CPU core, disk, or
/// network interface).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSeries {
    pub name: String,
    /// (timestamp-or-category, value) coordinate pairs, in series order.
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartAttributes {
    pub title: String,
    pub chart_type: ChartType,
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableColumn {
    pub title: String,
    pub data_index: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableAttributes {
    pub title: String,
    pub columns: Vec<TableColumn>,
    pub data_source: Vec<Row>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionEntry {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionAttributes {
    pub title: String,
    pub data: Vec<DescriptionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeAttributes {
    pub title: String,
    pub language: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertAttributes {
    pub severity: Severity,
    pub message: String,
    pub description: String,
}

/// One tagged node of report content. `Empty` is the placeholder inserted
/// into any menu that otherwise has no children and no elements.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "element_type", content = "attributes", rename_all = "snake_case")]
pub enum Element {
    Text(String),
    Code(CodeAttributes),
    Table(TableAttributes),
    Description(DescriptionAttributes),
    Chart(ChartAttributes),
    Alert(AlertAttributes),
    Empty,
}

impl Element {
    pub fn is_alert(&self) -> bool {
        matches!(self, Element::Alert(_))
    }
}

/// One node of the report tree. Recursive via `children`; leaf content
/// lives in `elements`.
///
/// Invariant: `info_count`/`warning_count`/`critical_count` equal the sum of
/// this menu's own alert elements plus the same counts across all
/// descendants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Menu {
    pub title: String,
    #[serde(default)]
    pub is_menu: bool,
    #[serde(default)]
    pub is_chapter: bool,
    pub menu_index: usize,
    #[serde(default)]
    pub info_count: usize,
    #[serde(default)]
    pub warning_count: usize,
    #[serde(default)]
    pub critical_count: usize,
    #[serde(default)]
    pub children: Vec<Menu>,
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl Menu {
    pub fn new(title: impl Into<String>, menu_index: usize) -> Self {
        Self {
            title: title.into(),
            is_menu: true,
            is_chapter: false,
            menu_index,
            info_count: 0,
            warning_count: 0,
            critical_count: 0,
            children: Vec::new(),
            elements: Vec::new(),
        }
    }

    /// Recursively counts this menu's own alert elements plus every
    /// descendant's counts, writing the totals into `info_count` /
    /// `warning_count` / `critical_count` and returning them as `(info,
    /// warning, critical)`.
    pub fn propagate_alert_counts(&mut self) -> (usize, usize, usize) {
        let mut info = 0;
        let mut warning = 0;
        let mut critical = 0;

        for element in &self.elements {
            if let Element::Alert(attrs) = element {
                match attrs.severity {
                    Severity::Info => info += 1,
                    Severity::Warning => warning += 1,
                    Severity::Critical => critical += 1,
                    Severity::Invalid => {}
                }
            }
        }

        for child in &mut self.children {
            let (ci, cw, cc) = child.propagate_alert_counts();
            info += ci;
            warning += cw;
            critical += cc;
        }

        if self.children.is_empty() && self.elements.is_empty() {
            self.elements.push(Element::Empty);
        }

        self.info_count = info;
        self.warning_count = warning;
        self.critical_count = critical;
        (info, warning, critical)
    }
}

/// The report root: global fields plus the ordered menu tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub report_title: String,
    #[serde(default)]
    pub report_subtitle: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub cost_seconds: f64,
    pub language: String,
    pub version: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub change_log: Option<String>,
    pub report_data: Vec<Menu>,
}
