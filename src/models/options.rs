//! Chart request options and their value coercion rules.
//!
//! A [`ChartRequestOptions`] holds `(name, value)` pairs exactly as the
//! caller supplied them. Nothing is validated on insertion; names are resolved
//! against the closed [`OptionName`] set and values coerced to the option's
//! [`ValueKind`] by [`ChartRequestOptions::resolve`], which the encoder runs
//! over the whole request before a single command is written.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::Deserialize;

use crate::{AppError, Result};

/// What the chart's X axis is based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartType {
    /// Dates or times. The server protocol has no command for this type yet.
    DateTime,
    /// Simple numeric values.
    Value,
    /// No X values; rows are numbered instead.
    NoXValue,
}

impl FromStr for ChartType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "d" | "datetime" | "date_time" => Ok(Self::DateTime),
            "v" | "value" => Ok(Self::Value),
            "n" | "none" | "no_x_value" => Ok(Self::NoXValue),
            other => Err(AppError::Config(format!(
                "Invalid chart type value: {other}"
            ))),
        }
    }
}

/// Colour override for one data series.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ColourOverride {
    /// Zero-based series index.
    pub index: u32,
    /// Colour name or `#rrggbb` value, passed through untouched.
    pub colour: String,
}

impl ColourOverride {
    /// Build an override for series `index`.
    #[must_use]
    pub fn new(index: u32, colour: impl Into<String>) -> Self {
        Self {
            index,
            colour: colour.into(),
        }
    }
}

impl FromStr for ColourOverride {
    type Err = AppError;

    /// Parse the wire form `index:colour`.
    fn from_str(s: &str) -> Result<Self> {
        let (index, colour) = s
            .split_once(':')
            .ok_or_else(|| AppError::Config(format!("invalid colour override: {s}")))?;
        let index = index
            .trim()
            .parse::<u32>()
            .map_err(|err| AppError::Config(format!("invalid colour index in '{s}': {err}")))?;
        let colour = colour.trim();
        if colour.is_empty() {
            return Err(AppError::Config(format!("missing colour in override '{s}'")));
        }
        Ok(Self::new(index, colour))
    }
}

/// Value kinds an option may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Free text.
    Text,
    /// Signed integer.
    Integer,
    /// On/off switch.
    Flag,
    /// Ordered list of integers.
    IntegerList,
    /// Ordered list of text items.
    TextList,
    /// Ordered list of colour overrides.
    Colours,
    /// [`ChartType`] selector.
    ChartType,
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Flag => "boolean",
            Self::IntegerList => "list of integers",
            Self::TextList => "list of text",
            Self::Colours => "list of colour overrides",
            Self::ChartType => "chart type",
        };
        f.write_str(name)
    }
}

/// A typed option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// Free text.
    Text(String),
    /// Signed integer.
    Integer(i64),
    /// On/off switch.
    Flag(bool),
    /// Ordered list of integers.
    IntegerList(Vec<i64>),
    /// Ordered list of text items.
    TextList(Vec<String>),
    /// Ordered list of colour overrides.
    Colours(Vec<ColourOverride>),
    /// Chart type selector.
    ChartType(ChartType),
}

impl OptionValue {
    fn kind(&self) -> ValueKind {
        match self {
            Self::Text(_) => ValueKind::Text,
            Self::Integer(_) => ValueKind::Integer,
            Self::Flag(_) => ValueKind::Flag,
            Self::IntegerList(_) => ValueKind::IntegerList,
            Self::TextList(_) => ValueKind::TextList,
            Self::Colours(_) => ValueKind::Colours,
            Self::ChartType(_) => ValueKind::ChartType,
        }
    }

    /// Coerce this value to `kind`, as required by option `name`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the value cannot be represented as
    /// `kind`.
    pub fn coerce(&self, name: OptionName, kind: ValueKind) -> Result<Self> {
        let mismatch = || {
            AppError::Config(format!(
                "Invalid value for {name}: expected {kind}, got {}",
                self.kind()
            ))
        };

        match (kind, self) {
            (ValueKind::Text, Self::Text(_))
            | (ValueKind::Integer, Self::Integer(_))
            | (ValueKind::Flag, Self::Flag(_))
            | (ValueKind::IntegerList, Self::IntegerList(_))
            | (ValueKind::TextList, Self::TextList(_))
            | (ValueKind::Colours, Self::Colours(_))
            | (ValueKind::ChartType, Self::ChartType(_)) => Ok(self.clone()),

            // An empty TOML array has no element type to infer from.
            (ValueKind::TextList, Self::IntegerList(items)) if items.is_empty() => {
                Ok(Self::TextList(Vec::new()))
            }
            (ValueKind::Colours, Self::IntegerList(items)) if items.is_empty() => {
                Ok(Self::Colours(Vec::new()))
            }

            (ValueKind::Text, Self::Integer(n)) => Ok(Self::Text(n.to_string())),
            (ValueKind::Integer, Self::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(Self::Integer)
                .map_err(|_| mismatch()),
            (ValueKind::IntegerList, Self::Text(s)) => split_items(s)
                .map(|item| item.parse::<i64>().map_err(|_| mismatch()))
                .collect::<Result<Vec<_>>>()
                .map(Self::IntegerList),
            (ValueKind::TextList, Self::Text(s)) => Ok(Self::TextList(
                split_items(s).map(str::to_owned).collect(),
            )),
            (ValueKind::Colours, Self::Text(s)) => split_items(s)
                .map(ColourOverride::from_str)
                .collect::<Result<Vec<_>>>()
                .map(Self::Colours),
            (ValueKind::ChartType, Self::Text(s)) => s.parse().map(Self::ChartType),

            _ => Err(mismatch()),
        }
    }
}

fn split_items(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|item| !item.is_empty())
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<Vec<i64>> for OptionValue {
    fn from(value: Vec<i64>) -> Self {
        Self::IntegerList(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        Self::TextList(value)
    }
}

impl From<Vec<&str>> for OptionValue {
    fn from(value: Vec<&str>) -> Self {
        Self::TextList(value.into_iter().map(str::to_owned).collect())
    }
}

impl From<Vec<ColourOverride>> for OptionValue {
    fn from(value: Vec<ColourOverride>) -> Self {
        Self::Colours(value)
    }
}

impl From<ChartType> for OptionValue {
    fn from(value: ChartType) -> Self {
        Self::ChartType(value)
    }
}

impl TryFrom<&toml::Value> for OptionValue {
    type Error = AppError;

    /// Convert a value from a batch file's `options` table.
    ///
    /// Arrays become integer lists, text lists, or colour overrides depending
    /// on their first element; colour overrides may be written as
    /// `[index, "colour"]` pairs or `{ index = …, colour = "…" }` tables.
    fn try_from(value: &toml::Value) -> Result<Self> {
        match value {
            toml::Value::String(s) => Ok(Self::Text(s.clone())),
            toml::Value::Integer(n) => Ok(Self::Integer(*n)),
            toml::Value::Boolean(b) => Ok(Self::Flag(*b)),
            toml::Value::Array(items) => match items.first() {
                None => Ok(Self::IntegerList(Vec::new())),
                Some(toml::Value::Integer(_)) => items
                    .iter()
                    .map(|item| {
                        item.as_integer().ok_or_else(|| {
                            AppError::Config(format!("mixed integer list element: {item}"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(Self::IntegerList),
                Some(toml::Value::String(_)) => items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_owned).ok_or_else(|| {
                            AppError::Config(format!("mixed text list element: {item}"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(Self::TextList),
                Some(_) => items
                    .iter()
                    .map(colour_from_toml)
                    .collect::<Result<Vec<_>>>()
                    .map(Self::Colours),
            },
            other => Err(AppError::Config(format!(
                "unsupported option value type: {}",
                other.type_str()
            ))),
        }
    }
}

fn colour_from_toml(item: &toml::Value) -> Result<ColourOverride> {
    match item {
        toml::Value::Array(pair) => match pair.as_slice() {
            [toml::Value::Integer(index), toml::Value::String(colour)] => {
                let index = u32::try_from(*index)
                    .map_err(|_| AppError::Config(format!("invalid colour index: {index}")))?;
                Ok(ColourOverride::new(index, colour.as_str()))
            }
            _ => Err(AppError::Config(format!(
                "colour override must be [index, \"colour\"]: {item}"
            ))),
        },
        toml::Value::Table(_) => item
            .clone()
            .try_into()
            .map_err(|err| AppError::Config(format!("invalid colour override table: {err}"))),
        other => Err(AppError::Config(format!(
            "unsupported colour override: {other}"
        ))),
    }
}

/// The closed set of options accepted by `generate_chart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionName {
    /// Path of the data file the renderer reads.
    InputPath,
    /// Path of the image file the renderer writes.
    OutputPath,
    /// Columns plotted on the first Y axis.
    ColumnList,
    /// Columns plotted on the second Y axis.
    ColumnList2,
    /// Input is comma separated rather than whitespace separated.
    IsCsv,
    /// First input row holds column headers.
    HasHeader,
    /// What the X axis is based on.
    ChartType,
    /// Chart title.
    Title,
    /// X axis title.
    XTitle,
    /// First Y axis title.
    YTitle,
    /// Second Y axis title.
    YTitle2,
    /// Ignore rows with missing columns.
    IgnoreMissingColumns,
    /// Ignore duplicate X values.
    IgnoreDuplicateValues,
    /// Date/time format of the X column.
    DateFormat,
    /// Mark each data point on the first Y axis.
    ShowDatapoints,
    /// Mark each data point on the second Y axis.
    ShowDatapoints2,
    /// Line weight on the first Y axis.
    LineWeight,
    /// Line weight on the second Y axis.
    LineWeight2,
    /// First Y axis minimum.
    MinY,
    /// First Y axis maximum.
    MaxY,
    /// Second Y axis minimum.
    MinY2,
    /// Second Y axis maximum.
    MaxY2,
    /// Force the first Y axis to the given limits.
    ForceYRange,
    /// Force the second Y axis to the given limits.
    ForceYRange2,
    /// Chart height in pixels.
    Height,
    /// Chart width in pixels.
    Width,
    /// Draw the first Y axis as bars.
    IsBar,
    /// Draw the second Y axis as bars.
    IsBar2,
    /// Ask the renderer to echo each command it reads to its error stream.
    DebugEcho,
    /// Series titles for the first Y axis.
    SeriesTitles,
    /// Series titles for the second Y axis.
    SeriesTitles2,
    /// Series colour overrides.
    Colours,
}

impl OptionName {
    /// Every option, in table order.
    pub const ALL: [Self; 32] = [
        Self::InputPath,
        Self::OutputPath,
        Self::ColumnList,
        Self::ColumnList2,
        Self::IsCsv,
        Self::HasHeader,
        Self::ChartType,
        Self::Title,
        Self::XTitle,
        Self::YTitle,
        Self::YTitle2,
        Self::IgnoreMissingColumns,
        Self::IgnoreDuplicateValues,
        Self::DateFormat,
        Self::ShowDatapoints,
        Self::ShowDatapoints2,
        Self::LineWeight,
        Self::LineWeight2,
        Self::MinY,
        Self::MaxY,
        Self::MinY2,
        Self::MaxY2,
        Self::ForceYRange,
        Self::ForceYRange2,
        Self::Height,
        Self::Width,
        Self::IsBar,
        Self::IsBar2,
        Self::DebugEcho,
        Self::SeriesTitles,
        Self::SeriesTitles2,
        Self::Colours,
    ];

    /// Caller-facing name, as accepted by [`ChartRequestOptions::set`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InputPath => "inputPath",
            Self::OutputPath => "outputPath",
            Self::ColumnList => "columnList",
            Self::ColumnList2 => "columnList2",
            Self::IsCsv => "isCsv",
            Self::HasHeader => "hasHeader",
            Self::ChartType => "chartType",
            Self::Title => "title",
            Self::XTitle => "xTitle",
            Self::YTitle => "yTitle",
            Self::YTitle2 => "yTitle2",
            Self::IgnoreMissingColumns => "ignoreMissingColumns",
            Self::IgnoreDuplicateValues => "ignoreDuplicateValues",
            Self::DateFormat => "dateFormat",
            Self::ShowDatapoints => "showDatapoints",
            Self::ShowDatapoints2 => "showDatapoints2",
            Self::LineWeight => "lineWeight",
            Self::LineWeight2 => "lineWeight2",
            Self::MinY => "minY",
            Self::MaxY => "maxY",
            Self::MinY2 => "minY2",
            Self::MaxY2 => "maxY2",
            Self::ForceYRange => "forceYRange",
            Self::ForceYRange2 => "forceYRange2",
            Self::Height => "height",
            Self::Width => "width",
            Self::IsBar => "isBar",
            Self::IsBar2 => "isBar2",
            Self::DebugEcho => "debugEcho",
            Self::SeriesTitles => "seriesTitles",
            Self::SeriesTitles2 => "seriesTitles2",
            Self::Colours => "colours",
        }
    }

    /// Value kind this option is coerced to before encoding.
    #[must_use]
    pub fn kind(self) -> ValueKind {
        match self {
            Self::InputPath
            | Self::OutputPath
            | Self::Title
            | Self::XTitle
            | Self::YTitle
            | Self::YTitle2
            | Self::DateFormat => ValueKind::Text,
            Self::LineWeight
            | Self::LineWeight2
            | Self::MinY
            | Self::MaxY
            | Self::MinY2
            | Self::MaxY2
            | Self::Height
            | Self::Width => ValueKind::Integer,
            Self::IsCsv
            | Self::HasHeader
            | Self::IgnoreMissingColumns
            | Self::IgnoreDuplicateValues
            | Self::ShowDatapoints
            | Self::ShowDatapoints2
            | Self::ForceYRange
            | Self::ForceYRange2
            | Self::IsBar
            | Self::IsBar2
            | Self::DebugEcho => ValueKind::Flag,
            Self::ColumnList | Self::ColumnList2 => ValueKind::IntegerList,
            Self::SeriesTitles | Self::SeriesTitles2 => ValueKind::TextList,
            Self::Colours => ValueKind::Colours,
            Self::ChartType => ValueKind::ChartType,
        }
    }
}

impl Display for OptionName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| AppError::Config(format!("Invalid argument: {s}")))
    }
}

/// Options for one `generate_chart` call, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartRequestOptions {
    entries: Vec<(String, OptionValue)>,
}

impl ChartRequestOptions {
    /// Empty option set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set option `name` to `value`.
    ///
    /// Setting a name a second time replaces the value but keeps the
    /// original position. Names are not checked here.
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Typed variant of [`set`](Self::set).
    #[must_use]
    pub fn with(self, name: OptionName, value: impl Into<OptionValue>) -> Self {
        self.set(name.as_str(), value)
    }

    /// In-place variant of [`set`](Self::set).
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<OptionValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Build from a batch file's `options` table.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a value has an unsupported TOML type.
    pub fn from_toml_table(table: &toml::Table) -> Result<Self> {
        let mut options = Self::new();
        for (name, value) in table {
            options.insert(name.as_str(), OptionValue::try_from(value)?);
        }
        Ok(options)
    }

    /// Number of options held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no options are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve every name and coerce every value, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config("Invalid argument: <name>")` for the first
    /// unrecognized name, or a coercion error for the first bad value.
    pub fn resolve(&self) -> Result<Vec<(OptionName, OptionValue)>> {
        self.entries
            .iter()
            .map(|(raw, value)| {
                let name: OptionName = raw.parse()?;
                let value = value.coerce(name, name.kind())?;
                Ok((name, value))
            })
            .collect()
    }
}
