//! Row sequence ⇄ flat table of cells
//!
//! The header is `path_1 … path_D`, the fixed attribute columns, then
//! `option_count` and one `option_N_value` / `option_N_label` pair per
//! option slot. Boolean attributes are written as boolean cells; on read,
//! boolean cells and the text literals `true` / `false` (any ASCII case) are
//! accepted and everything else is rejected. Attributes the typed model
//! does not interpret travel as one JSON object in the `extra` column.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::error::{FormatResult, SchemaFormatError};
use super::rows::{TabularRow, rows_to_tree, tree_to_rows};
use crate::models::{
    Category, DataType, DatapointAttributes, MultivalueAttributes, NodeKind, SchemaNode,
    SchemaOption, SchemaTree, SchemaValidationError, SectionAttributes, TupleAttributes,
};

/// Value of one spreadsheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Bool(bool),
    Number(f64),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Cell content as shown to a user, for error messages
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Bool(b) => b.to_string().to_uppercase(),
            Cell::Number(n) => number_text(*n),
        }
    }
}

/// A header plus data rows, as stored in the `schema` sheet
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub version: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Fixed attribute columns, in header order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Category,
    Label,
    Type,
    Format,
    Description,
    CanExport,
    CanCollapse,
    Hidden,
    Required,
    Stretch,
    Width,
    ScoreThreshold,
    MinOccurrences,
    MaxOccurrences,
    DefaultValue,
    Icon,
    RirFieldNames,
    Extra,
    OptionCount,
}

impl Column {
    pub const ALL: [Column; 20] = [
        Column::Id,
        Column::Category,
        Column::Label,
        Column::Type,
        Column::Format,
        Column::Description,
        Column::CanExport,
        Column::CanCollapse,
        Column::Hidden,
        Column::Required,
        Column::Stretch,
        Column::Width,
        Column::ScoreThreshold,
        Column::MinOccurrences,
        Column::MaxOccurrences,
        Column::DefaultValue,
        Column::Icon,
        Column::RirFieldNames,
        Column::Extra,
        Column::OptionCount,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Category => "category",
            Column::Label => "label",
            Column::Type => "type",
            Column::Format => "format",
            Column::Description => "description",
            Column::CanExport => "can_export",
            Column::CanCollapse => "can_collapse",
            Column::Hidden => "hidden",
            Column::Required => "required",
            Column::Stretch => "stretch",
            Column::Width => "width",
            Column::ScoreThreshold => "score_threshold",
            Column::MinOccurrences => "min_occurrences",
            Column::MaxOccurrences => "max_occurrences",
            Column::DefaultValue => "default_value",
            Column::Icon => "icon",
            Column::RirFieldNames => "rir_field_names",
            Column::Extra => "extra",
            Column::OptionCount => "option_count",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        Column::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Whether a row of `category` may fill this column
    fn applies_to(&self, category: Category) -> bool {
        match self {
            Column::Id
            | Column::Category
            | Column::Label
            | Column::Description
            | Column::Hidden
            | Column::Extra => true,
            Column::Icon => category == Category::Section,
            Column::CanCollapse => matches!(category, Category::Section | Category::Multivalue),
            Column::MinOccurrences | Column::MaxOccurrences => category == Category::Multivalue,
            Column::DefaultValue => {
                matches!(category, Category::Multivalue | Category::Datapoint)
            }
            Column::RirFieldNames => category != Category::Section,
            Column::Type
            | Column::Format
            | Column::CanExport
            | Column::Required
            | Column::Stretch
            | Column::Width
            | Column::ScoreThreshold
            | Column::OptionCount => category == Category::Datapoint,
        }
    }
}

const PATH_PREFIX: &str = "path_";

/// Flatten a tree into a table
pub fn tree_to_table(tree: &SchemaTree) -> Table {
    rows_to_table(&tree_to_rows(tree), tree.version())
}

/// Rebuild a tree from a table
pub fn table_to_tree(table: &Table) -> FormatResult<SchemaTree> {
    rows_to_tree(table_to_rows(table)?, &table.version)
}

/// Lay rows out as cells under a generated header
pub fn rows_to_table(rows: &[TabularRow], version: &str) -> Table {
    let depth = rows.iter().map(TabularRow::depth).max().unwrap_or(1).max(1);
    let option_slots = rows
        .iter()
        .map(|row| row.node.options().len())
        .max()
        .unwrap_or(0);

    let mut header: Vec<String> = (1..=depth).map(|i| format!("{}{}", PATH_PREFIX, i)).collect();
    header.extend(Column::ALL.iter().map(|c| c.name().to_string()));
    for slot in 1..=option_slots {
        header.push(format!("option_{}_value", slot));
        header.push(format!("option_{}_label", slot));
    }

    let cells = rows
        .iter()
        .map(|row| {
            let mut cells: Vec<Cell> = (0..depth)
                .map(|i| row.path.get(i).map_or(Cell::Empty, |id| Cell::Text(id.clone())))
                .collect();
            let fixed = fixed_cells(&row.node);
            cells.extend(Column::ALL.iter().map(|c| fixed.get(c).cloned().unwrap_or(Cell::Empty)));
            for slot in 0..option_slots {
                match row.node.options().get(slot) {
                    Some(option) => {
                        cells.push(Cell::Text(option.value.clone()));
                        cells.push(Cell::Text(option.label.clone()));
                    }
                    None => {
                        cells.push(Cell::Empty);
                        cells.push(Cell::Empty);
                    }
                }
            }
            cells
        })
        .collect();

    Table {
        version: version.to_string(),
        header,
        rows: cells,
    }
}

fn fixed_cells(node: &SchemaNode) -> HashMap<Column, Cell> {
    let mut cells = HashMap::new();
    let text = |s: &Option<String>| s.as_ref().map(|s| Cell::Text(s.clone()));
    let boolean = |b: &Option<bool>| b.map(Cell::Bool);
    let count = |n: &Option<u32>| n.map(|n| Cell::Number(f64::from(n)));
    let names = |names: &Option<Vec<String>>| {
        names
            .as_ref()
            .map(|names| Cell::Text(Value::from(names.clone()).to_string()))
    };

    let mut put = |column: Column, cell: Option<Cell>| {
        if let Some(cell) = cell {
            cells.insert(column, cell);
        }
    };

    put(Column::Id, Some(Cell::Text(node.id.clone())));
    put(Column::Category, Some(Cell::Text(node.category().as_str().to_string())));
    put(Column::Label, Some(&node.label).filter(|l| !l.is_empty()).map(|l| Cell::Text(l.clone())));
    put(Column::Description, text(&node.description));
    put(Column::Hidden, boolean(&node.hidden));
    put(
        Column::Extra,
        Some(&node.extra)
            .filter(|extra| !extra.is_empty())
            .map(|extra| Cell::Text(Value::Object(extra.clone()).to_string())),
    );

    match &node.kind {
        NodeKind::Section(attrs) => {
            put(Column::Icon, text(&attrs.icon));
            put(Column::CanCollapse, boolean(&attrs.can_collapse));
        }
        NodeKind::Multivalue(attrs) => {
            put(Column::RirFieldNames, names(&attrs.rir_field_names));
            put(Column::MinOccurrences, count(&attrs.min_occurrences));
            put(Column::MaxOccurrences, count(&attrs.max_occurrences));
            put(Column::DefaultValue, text(&attrs.default_value));
            put(Column::CanCollapse, boolean(&attrs.can_collapse));
        }
        NodeKind::Tuple(attrs) => {
            put(Column::RirFieldNames, names(&attrs.rir_field_names));
        }
        NodeKind::Datapoint(attrs) => {
            put(Column::Type, Some(Cell::Text(attrs.data_type.as_str().to_string())));
            put(Column::Format, text(&attrs.format));
            put(Column::RirFieldNames, names(&attrs.rir_field_names));
            put(Column::DefaultValue, text(&attrs.default_value));
            put(Column::Required, boolean(&attrs.required));
            put(Column::CanExport, boolean(&attrs.can_export));
            put(Column::Width, count(&attrs.width));
            put(Column::Stretch, boolean(&attrs.stretch));
            put(Column::ScoreThreshold, attrs.score_threshold.map(Cell::Number));
            put(
                Column::OptionCount,
                attrs.options.as_ref().map(|o| Cell::Number(o.len() as f64)),
            );
        }
    }

    cells
}

/// Where each header entry goes
struct Layout {
    path: Vec<usize>,
    fixed: HashMap<Column, usize>,
    /// `(value column, label column)` per option slot
    options: Vec<(usize, usize)>,
}

impl Layout {
    fn from_header(header: &[String]) -> FormatResult<Self> {
        let mut path: Vec<(usize, usize)> = Vec::new();
        let mut fixed = HashMap::new();
        let mut option_values: HashMap<usize, usize> = HashMap::new();
        let mut option_labels: HashMap<usize, usize> = HashMap::new();

        for (index, raw) in header.iter().enumerate() {
            let name = raw.trim();
            if name.is_empty() {
                continue;
            }
            if let Some(level) = name
                .strip_prefix(PATH_PREFIX)
                .and_then(|n| n.parse::<usize>().ok())
            {
                path.push((level, index));
            } else if let Some(column) = Column::parse(name) {
                fixed.insert(column, index);
            } else if let Some((slot, is_value)) = parse_option_column(name) {
                let target = if is_value { &mut option_values } else { &mut option_labels };
                target.insert(slot, index);
            } else {
                return Err(SchemaFormatError::UnknownColumn {
                    column: name.to_string(),
                });
            }
        }

        path.sort_unstable();
        for (expected, (level, _)) in (1..).zip(&path) {
            if *level != expected {
                return Err(SchemaFormatError::MissingColumn {
                    column: format!("{}{}", PATH_PREFIX, expected),
                });
            }
        }
        if path.is_empty() {
            return Err(SchemaFormatError::MissingColumn {
                column: format!("{}1", PATH_PREFIX),
            });
        }
        for column in [Column::Id, Column::Category, Column::Label] {
            if !fixed.contains_key(&column) {
                return Err(SchemaFormatError::MissingColumn {
                    column: column.name().to_string(),
                });
            }
        }

        let mut options = Vec::new();
        for slot in 1.. {
            match (option_values.remove(&slot), option_labels.remove(&slot)) {
                (Some(value), Some(label)) => options.push((value, label)),
                (None, None) => break,
                (Some(_), None) => {
                    return Err(SchemaFormatError::MissingColumn {
                        column: format!("option_{}_label", slot),
                    });
                }
                (None, Some(_)) => {
                    return Err(SchemaFormatError::MissingColumn {
                        column: format!("option_{}_value", slot),
                    });
                }
            }
        }
        if !option_values.is_empty() || !option_labels.is_empty() {
            return Err(SchemaFormatError::MissingColumn {
                column: format!("option_{}_value", options.len() + 1),
            });
        }

        Ok(Self {
            path: path.into_iter().map(|(_, index)| index).collect(),
            fixed,
            options,
        })
    }
}

fn parse_option_column(name: &str) -> Option<(usize, bool)> {
    let rest = name.strip_prefix("option_")?;
    let (slot, field) = rest.split_once('_')?;
    let slot = slot.parse::<usize>().ok().filter(|s| *s > 0)?;
    match field {
        "value" => Some((slot, true)),
        "label" => Some((slot, false)),
        _ => None,
    }
}

/// Parse the data rows of a table
pub fn table_to_rows(table: &Table) -> FormatResult<Vec<TabularRow>> {
    let layout = Layout::from_header(&table.header)?;
    table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, cells)| cells.iter().any(|c| !c.is_empty()))
        .map(|(i, cells)| RowReader::new(&layout, cells, i + 1)?.read())
        .collect()
}

/// Typed access to the cells of one data row
struct RowReader<'a> {
    layout: &'a Layout,
    cells: &'a [Cell],
    path: Vec<String>,
    display: String,
}

const EMPTY: Cell = Cell::Empty;

impl<'a> RowReader<'a> {
    fn new(layout: &'a Layout, cells: &'a [Cell], row: usize) -> FormatResult<Self> {
        let mut path = Vec::new();
        let mut ended = false;
        for &index in &layout.path {
            let cell = cells.get(index).unwrap_or(&EMPTY);
            match text_value(cell) {
                Some(id) if !id.is_empty() => {
                    if ended {
                        return Err(SchemaFormatError::InvalidValue {
                            path: path.join("/"),
                            column: format!("{}{}", PATH_PREFIX, path.len() + 1),
                            reason: "path has a gap".to_string(),
                        });
                    }
                    path.push(id);
                }
                _ => ended = true,
            }
        }
        if path.is_empty() {
            return Err(SchemaFormatError::EmptyPath { row });
        }
        let display = path.join("/");
        Ok(Self {
            layout,
            cells,
            path,
            display,
        })
    }

    fn cell(&self, column: Column) -> &'a Cell {
        self.layout
            .fixed
            .get(&column)
            .and_then(|&index| self.cells.get(index))
            .unwrap_or(&EMPTY)
    }

    fn text(&self, column: Column) -> Option<String> {
        text_value(self.cell(column))
    }

    fn required_text(&self, column: Column) -> FormatResult<String> {
        self.text(column)
            .ok_or_else(|| SchemaFormatError::MissingAttribute {
                path: self.display.clone(),
                attribute: column.name().to_string(),
            })
    }

    fn boolean(&self, column: Column) -> FormatResult<Option<bool>> {
        match self.cell(column) {
            Cell::Empty => Ok(None),
            Cell::Bool(b) => Ok(Some(*b)),
            Cell::Text(s) if s.trim().is_empty() => Ok(None),
            Cell::Text(s) if s.trim().eq_ignore_ascii_case("true") => Ok(Some(true)),
            Cell::Text(s) if s.trim().eq_ignore_ascii_case("false") => Ok(Some(false)),
            other => Err(SchemaFormatError::InvalidBoolean {
                path: self.display.clone(),
                column: column.name().to_string(),
                value: other.display(),
            }),
        }
    }

    fn number(&self, column: Column) -> FormatResult<Option<f64>> {
        let invalid = |value: String| SchemaFormatError::InvalidNumber {
            path: self.display.clone(),
            column: column.name().to_string(),
            value,
        };
        match self.cell(column) {
            Cell::Empty => Ok(None),
            Cell::Number(n) => Ok(Some(*n)),
            Cell::Text(s) if s.trim().is_empty() => Ok(None),
            Cell::Text(s) => s.trim().parse::<f64>().map(Some).map_err(|_| invalid(s.clone())),
            other => Err(invalid(other.display())),
        }
    }

    fn count(&self, column: Column) -> FormatResult<Option<u32>> {
        match self.number(column)? {
            None => Ok(None),
            Some(n) if n.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&n) => {
                Ok(Some(n as u32))
            }
            Some(n) => Err(SchemaFormatError::InvalidNumber {
                path: self.display.clone(),
                column: column.name().to_string(),
                value: number_text(n),
            }),
        }
    }

    fn names(&self, column: Column) -> FormatResult<Option<Vec<String>>> {
        match self.text(column) {
            None => Ok(None),
            Some(raw) => serde_json::from_str::<Vec<String>>(&raw)
                .map(Some)
                .map_err(|e| SchemaFormatError::InvalidValue {
                    path: self.display.clone(),
                    column: column.name().to_string(),
                    reason: format!("expected a JSON list of strings: {}", e),
                }),
        }
    }

    fn extra(&self) -> FormatResult<Map<String, Value>> {
        let Some(raw) = self.text(Column::Extra).filter(|raw| !raw.trim().is_empty()) else {
            return Ok(Map::new());
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(extra)) => Ok(extra),
            Ok(_) => Err(self.invalid_extra("expected a JSON object".to_string())),
            Err(e) => Err(self.invalid_extra(format!("expected a JSON object: {}", e))),
        }
    }

    fn invalid_extra(&self, reason: String) -> SchemaFormatError {
        SchemaFormatError::InvalidValue {
            path: self.display.clone(),
            column: Column::Extra.name().to_string(),
            reason,
        }
    }

    fn options(&self) -> FormatResult<Option<Vec<SchemaOption>>> {
        let declared = self.count(Column::OptionCount)?;
        let slots = &self.layout.options;

        let taken = match declared {
            Some(n) if n as usize > slots.len() => {
                return Err(SchemaFormatError::InvalidValue {
                    path: self.display.clone(),
                    column: Column::OptionCount.name().to_string(),
                    reason: format!("{} options declared but only {} option columns", n, slots.len()),
                });
            }
            Some(n) => n as usize,
            // Hand-written sheets may omit the count; take filled slots.
            None => slots
                .iter()
                .take_while(|(value, _)| !self.cells.get(*value).unwrap_or(&EMPTY).is_empty())
                .count(),
        };

        for (slot, &(value, label)) in slots.iter().enumerate().skip(taken) {
            let filled = |index: usize| !self.cells.get(index).unwrap_or(&EMPTY).is_empty();
            if filled(value) || filled(label) {
                return Err(SchemaFormatError::InvalidValue {
                    path: self.display.clone(),
                    column: format!("option_{}_value", slot + 1),
                    reason: "option given beyond option_count".to_string(),
                });
            }
        }

        if declared.is_none() && taken == 0 {
            return Ok(None);
        }

        slots[..taken]
            .iter()
            .enumerate()
            .map(|(slot, &(value, label))| {
                let value = text_value(self.cells.get(value).unwrap_or(&EMPTY))
                    .ok_or_else(|| SchemaFormatError::MissingAttribute {
                        path: self.display.clone(),
                        attribute: format!("option_{}_value", slot + 1),
                    })?;
                let label = text_value(self.cells.get(label).unwrap_or(&EMPTY)).unwrap_or_default();
                Ok(SchemaOption { value, label })
            })
            .collect::<FormatResult<Vec<_>>>()
            .map(Some)
    }

    fn read(self) -> FormatResult<TabularRow> {
        let id = self.required_text(Column::Id)?;
        let raw_category = self.required_text(Column::Category)?;
        let category = Category::parse(raw_category.trim()).ok_or_else(|| {
            SchemaValidationError::UnknownCategory {
                id: id.clone(),
                category: raw_category.clone(),
            }
        })?;

        for column in Column::ALL {
            if !column.applies_to(category) && !self.cell(column).is_empty() {
                return Err(SchemaValidationError::IllegalAttribute {
                    id,
                    category,
                    attribute: column.name().to_string(),
                }
                .into());
            }
        }
        if category != Category::Datapoint
            && let Some((slot, _)) = self.layout.options.iter().enumerate().find(|(_, (v, l))| {
                !self.cells.get(*v).unwrap_or(&EMPTY).is_empty()
                    || !self.cells.get(*l).unwrap_or(&EMPTY).is_empty()
            })
        {
            return Err(SchemaValidationError::IllegalAttribute {
                id,
                category,
                attribute: format!("option_{}_value", slot + 1),
            }
            .into());
        }

        let kind = match category {
            Category::Section => NodeKind::Section(SectionAttributes {
                icon: self.text(Column::Icon),
                can_collapse: self.boolean(Column::CanCollapse)?,
            }),
            Category::Multivalue => NodeKind::Multivalue(MultivalueAttributes {
                rir_field_names: self.names(Column::RirFieldNames)?,
                min_occurrences: self.count(Column::MinOccurrences)?,
                max_occurrences: self.count(Column::MaxOccurrences)?,
                default_value: self.text(Column::DefaultValue),
                can_collapse: self.boolean(Column::CanCollapse)?,
            }),
            Category::Tuple => NodeKind::Tuple(TupleAttributes {
                rir_field_names: self.names(Column::RirFieldNames)?,
            }),
            Category::Datapoint => {
                let raw_type = self.required_text(Column::Type)?;
                let data_type = DataType::parse(raw_type.trim()).ok_or_else(|| {
                    SchemaFormatError::InvalidValue {
                        path: self.display.clone(),
                        column: Column::Type.name().to_string(),
                        reason: format!("unknown datapoint type '{}'", raw_type),
                    }
                })?;
                NodeKind::Datapoint(DatapointAttributes {
                    data_type,
                    format: self.text(Column::Format),
                    rir_field_names: self.names(Column::RirFieldNames)?,
                    default_value: self.text(Column::DefaultValue),
                    required: self.boolean(Column::Required)?,
                    can_export: self.boolean(Column::CanExport)?,
                    width: self.count(Column::Width)?,
                    stretch: self.boolean(Column::Stretch)?,
                    score_threshold: self.number(Column::ScoreThreshold)?,
                    options: self.options()?,
                })
            }
        };

        let node = SchemaNode {
            id,
            label: self.text(Column::Label).unwrap_or_default(),
            description: self.text(Column::Description),
            hidden: self.boolean(Column::Hidden)?,
            kind,
            children: Vec::new(),
            extra: self.extra()?,
        };

        Ok(TabularRow {
            path: self.path,
            node,
        })
    }
}

/// Text content of a cell; numbers typed into text columns are accepted
fn text_value(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty => None,
        Cell::Text(s) => Some(s.clone()),
        Cell::Number(n) => Some(number_text(*n)),
        Cell::Bool(b) => Some(b.to_string()),
    }
}

/// Render a number without a trailing `.0` for whole values
pub fn number_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
