//! Ping flattening engine
//!
//! Turns swath bathymetry pings into tabular rows, either one row per ping
//! with whole arrays embedded ("unflattened") or one row per beam with each
//! array indexed ("flattened").
//!
//! # Column layout
//!
//! The layout is discovered from the first ping of a stream and cached:
//!
//! 1. `time`, `latitude`, `longitude` (and `record_type` with labels on)
//! 2. every Scalar field, plus OptionalScalar and nested sensor fields that
//!    were present on that first ping, in declaration order
//! 3. every PerBeamArray field present on that first ping, in declaration
//!    order
//!
//! Later pings lacking a discovered column produce empty cells. Fields that
//! first appear on a later ping are dropped, with one warning per field.

use crate::config::FlattenOptions;
use crate::lookup;
use crate::records::{Record, RecordType, SwathBathyPing};
use crate::schema::{Cell, FieldClass, FieldValue, PingField, PING_FIELDS};
use crate::types::{Result, SchemaError};
use std::collections::HashSet;
use std::fmt;

/// One output column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Time,
    Latitude,
    Longitude,
    /// Label of the record type
    RecordType,
    Field(PingField),
    /// Label of the ping's sensor id
    SensorName,
    SensorPingCounter,
    SensorModelNumber,
}

impl Column {
    pub fn name(self) -> &'static str {
        match self {
            Column::Time => "time",
            Column::Latitude => "latitude",
            Column::Longitude => "longitude",
            Column::RecordType => "record_type",
            Column::Field(field) => field.name(),
            Column::SensorName => "sensor_name",
            Column::SensorPingCounter => "sensor_data.ping_counter",
            Column::SensorModelNumber => "sensor_data.model_number",
        }
    }

    /// Native subrecord label for columns read from a ping subrecord
    pub fn subrecord_label(self) -> Option<&'static str> {
        match self {
            Column::Field(field) => field.subrecord_id().map(lookup::label_subrecord),
            _ => None,
        }
    }

    /// Value of a per-ping column
    fn cell(self, record: &Record, ping: &SwathBathyPing) -> Cell {
        match self {
            Column::Time => Cell::Time(record.time),
            Column::Latitude => record.location.map_or(Cell::Null, |geo| Cell::Float(geo.latitude)),
            Column::Longitude => record.location.map_or(Cell::Null, |geo| Cell::Float(geo.longitude)),
            Column::RecordType => Cell::Text(record.record_type.label().to_string()),
            Column::Field(field) => match ping.value(field) {
                FieldValue::Scalar(cell) => cell,
                _ => Cell::Null,
            },
            Column::SensorName => Cell::Text(lookup::label_sensor(ping.sensor_id).into_owned()),
            Column::SensorPingCounter => ping
                .sensor_data
                .as_ref()
                .and_then(|s| s.ping_counter)
                .map_or(Cell::Null, Cell::Int),
            Column::SensorModelNumber => ping
                .sensor_data
                .as_ref()
                .and_then(|s| s.model_number)
                .map_or(Cell::Null, Cell::Int),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Columns a ping carries, walking the schema table in order
fn ping_columns(ping: &SwathBathyPing, include_labels: bool) -> (Vec<Column>, Vec<Column>) {
    let mut common = Vec::new();
    let mut arrays = Vec::new();

    for spec in PING_FIELDS {
        let value = ping.value(spec.field);
        match spec.class {
            FieldClass::Excluded => {}
            FieldClass::Scalar => {
                common.push(Column::Field(spec.field));
                if spec.field == PingField::SensorId && include_labels {
                    common.push(Column::SensorName);
                }
            }
            FieldClass::OptionalScalar => {
                if value.is_present() {
                    common.push(Column::Field(spec.field));
                }
            }
            FieldClass::PerBeamArray => {
                if value.is_present() {
                    arrays.push(Column::Field(spec.field));
                }
            }
            FieldClass::Nested => {
                if let FieldValue::Sensor(sensor) = value {
                    if sensor.ping_counter.is_some() {
                        common.push(Column::SensorPingCounter);
                    }
                    if sensor.model_number.is_some() {
                        common.push(Column::SensorModelNumber);
                    }
                }
            }
        }
    }

    (common, arrays)
}

/// Ordered output columns for one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    common: Vec<Column>,
    arrays: Vec<Column>,
}

impl ColumnLayout {
    /// Derive the layout from one ping record
    pub fn discover(record: &Record, ping: &SwathBathyPing, options: &FlattenOptions) -> Self {
        let mut common = vec![Column::Time, Column::Latitude, Column::Longitude];
        if options.include_labels {
            common.push(Column::RecordType);
        }

        let (fields, arrays) = ping_columns(ping, options.include_labels);
        common.extend(fields);

        log::debug!(
            "Discovered {} common and {} array columns from record {}",
            common.len(),
            arrays.len(),
            record.record_number
        );

        Self { common, arrays }
    }

    pub fn common_columns(&self) -> &[Column] {
        &self.common
    }

    pub fn array_columns(&self) -> &[Column] {
        &self.arrays
    }

    /// All columns, common first
    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.common.iter().chain(self.arrays.iter()).copied()
    }

    /// Header row: `common_columns + array_columns`
    pub fn header(&self) -> Vec<&'static str> {
        self.columns().map(Column::name).collect()
    }

    pub fn len(&self) -> usize {
        self.common.len() + self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, column: Column) -> bool {
        self.common.contains(&column) || self.arrays.contains(&column)
    }

    fn common_cells(&self, record: &Record, ping: &SwathBathyPing) -> Vec<Cell> {
        self.common.iter().map(|c| c.cell(record, ping)).collect()
    }
}

/// One tabular row, aligned with a [`ColumnLayout`]
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }
}

/// Stateful flattener for one output stream
#[derive(Debug, Default)]
pub struct Flattener {
    options: FlattenOptions,
    layout: Option<ColumnLayout>,
    dropped: HashSet<Column>,
}

impl Flattener {
    pub fn new(options: FlattenOptions) -> Self {
        Self {
            options,
            layout: None,
            dropped: HashSet::new(),
        }
    }

    /// The cached layout, once the first ping has been seen
    pub fn layout(&self) -> Option<&ColumnLayout> {
        self.layout.as_ref()
    }

    fn prepare<'r>(&mut self, record: &'r Record) -> Result<(&ColumnLayout, &'r SwathBathyPing)> {
        let ping = record.ping().ok_or(SchemaError::VariantMismatch {
            declared: RecordType::SwathBathyPing,
            found: record.record_type,
        })?;
        ping.check_beam_lengths()?;

        if let Some(layout) = &self.layout {
            let (common, arrays) = ping_columns(ping, false);
            for column in common.into_iter().chain(arrays) {
                if !layout.contains(column) && self.dropped.insert(column) {
                    match column.subrecord_label() {
                        Some(label) => log::warn!(
                            "Dropping column `{}` ({}): not present on the first ping of the stream",
                            column,
                            label
                        ),
                        None => log::warn!(
                            "Dropping column `{}`: not present on the first ping of the stream",
                            column
                        ),
                    }
                }
            }
        }

        let options = &self.options;
        let layout = self
            .layout
            .get_or_insert_with(|| ColumnLayout::discover(record, ping, options));
        Ok((layout, ping))
    }

    /// One row for the whole ping, arrays embedded as lists
    pub fn unflattened(&mut self, record: &Record) -> Result<Row> {
        let (layout, ping) = self.prepare(record)?;
        let mut cells = layout.common_cells(record, ping);

        for column in layout.array_columns() {
            let cell = match column {
                Column::Field(field) => ping.beams(*field).map_or(Cell::Null, |s| s.to_list()),
                _ => Cell::Null,
            };
            cells.push(cell);
        }

        Ok(Row { cells })
    }

    /// One row per beam, `0..number_beams`
    pub fn flattened(&mut self, record: &Record) -> Result<Vec<Row>> {
        let (layout, ping) = self.prepare(record)?;
        let common = layout.common_cells(record, ping);
        let series: Vec<_> = layout
            .array_columns()
            .iter()
            .map(|column| match column {
                Column::Field(field) => ping.beams(*field),
                _ => None,
            })
            .collect();

        let rows = (0..ping.number_beams as usize)
            .map(|beam| {
                let mut cells = Vec::with_capacity(common.len() + series.len());
                cells.extend(common.iter().cloned());
                cells.extend(
                    series
                        .iter()
                        .map(|s| s.as_ref().map_or(Cell::Null, |s| s.cell(beam))),
                );
                Row { cells }
            })
            .collect();

        Ok(rows)
    }
}
