//! Human-readable listings of the computed desired state and of plans and
//! reconcile reports.

use crate::acl::AclMapping;
use crate::engine::{TopicConfigMapping, UserTopicMapping};
use crate::error::Result;
use crate::reconcile::{ReconcilePlan, ReconcileReport};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Invalid output format: {}. Valid formats: table, json, csv", s)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Rows of string cells under fixed headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<&'static str>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Table => Ok(self.render_text()),
            OutputFormat::Csv => Ok(self.render_csv()),
            OutputFormat::Json => self.render_json(),
        }
    }

    fn render_text(&self) -> String {
        if self.rows.is_empty() {
            return "No data available".to_string();
        }

        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.len()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let line = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = width))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let headers: Vec<String> = self.headers.iter().map(|h| h.to_uppercase()).collect();
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();

        let mut lines = vec![line(&headers), line(&rule)];
        for row in &self.rows {
            lines.push(line(row));
        }
        lines.join("\n")
    }

    fn render_csv(&self) -> String {
        let mut lines = vec![self.headers.join(",")];
        for row in &self.rows {
            lines.push(row.iter().map(|cell| csv_escape(cell)).collect::<Vec<_>>().join(","));
        }
        lines.join("\n")
    }

    fn render_json(&self) -> Result<String> {
        let records: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                let object: Map<String, Value> = self
                    .headers
                    .iter()
                    .zip(row)
                    .map(|(header, cell)| (header.to_string(), Value::String(cell.clone())))
                    .collect();
                Value::Object(object)
            })
            .collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }
}

pub fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn join_map(map: &std::collections::BTreeMap<String, String>) -> String {
    map.iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn topics_table(tcm: &TopicConfigMapping) -> Table {
    let mut table = Table::new(vec!["topic", "partitions", "replication"]);
    for (name, properties) in tcm.iter() {
        table.push(vec![
            name.clone(),
            properties.get("partitions").cloned().unwrap_or_else(|| "-".to_string()),
            properties
                .get("replication.factor")
                .cloned()
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}

pub fn configs_table(tcm: &TopicConfigMapping) -> Table {
    let mut table = Table::new(vec!["topic", "key", "value"]);
    for (name, properties) in tcm.iter() {
        for (key, value) in properties {
            table.push(vec![name.clone(), key.clone(), value.clone()]);
        }
    }
    table
}

pub fn utm_table(utm: &UserTopicMapping) -> Table {
    let mut table = Table::new(vec!["principal", "role", "group", "topics", "hosts", "side_data"]);
    for (key, value) in utm.iter() {
        table.push(vec![
            key.principal.clone(),
            key.role.to_string(),
            key.group.clone(),
            value.topics.iter().cloned().collect::<Vec<_>>().join(" "),
            value.hostnames.iter().cloned().collect::<Vec<_>>().join(" "),
            join_map(&value.side_data),
        ]);
    }
    table
}

pub fn acls_table(mapping: &AclMapping) -> Table {
    let mut table = Table::new(vec!["resource_type", "resource", "pattern", "principal", "operation", "host"]);
    for details in mapping.details() {
        table.push(vec![
            details.resource_type.to_string(),
            details.resource_name.clone(),
            details.pattern_type.to_string(),
            details.principal.clone(),
            details.operation.to_string(),
            details.host.clone(),
        ]);
    }
    table
}

pub fn plan_table(plan: &ReconcilePlan) -> Table {
    let mut table = Table::new(vec!["cluster", "action"]);
    for action in &plan.actions {
        table.push(vec![plan.cluster.clone(), action.to_string()]);
    }
    for warning in &plan.warnings {
        table.push(vec![plan.cluster.clone(), format!("warning: {}", warning)]);
    }
    table
}

pub fn report_table(report: &ReconcileReport) -> Table {
    let mut table = Table::new(vec!["cluster", "status", "action"]);
    let status_rows = report
        .succeeded
        .iter()
        .map(|a| ("ok", a.clone()))
        .chain(report.failed.iter().map(|f| ("failed", format!("{}: {}", f.action, f.error))))
        .chain(report.unsynced.iter().map(|a| ("unsynced", a.clone())))
        .chain(report.warnings.iter().map(|w| ("warning", w.clone())));

    if report.dry_run {
        for action in &report.planned {
            table.push(vec![report.cluster.clone(), "planned".to_string(), action.clone()]);
        }
    }
    for (status, detail) in status_rows {
        table.push(vec![report.cluster.clone(), status.to_string(), detail]);
    }
    table
}

/// Structured values render as pretty JSON; everything else goes through a table.
pub fn render<T: Serialize>(value: &T, table: impl FnOnce(&T) -> Table, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        other => table(value).render(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Properties;

    fn tcm() -> TopicConfigMapping {
        let mut tcm = TopicConfigMapping::new();
        let properties: Properties = [
            ("partitions".to_string(), "3".to_string()),
            ("cleanup.policy".to_string(), "compact,delete".to_string()),
        ]
        .into();
        tcm.insert("int.orders", properties);
        tcm
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert!("yaml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Csv.to_string(), "csv");
    }

    #[test]
    fn test_text_table_alignment() {
        let rendered = topics_table(&tcm()).render(OutputFormat::Table).unwrap();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "TOPIC       PARTITIONS  REPLICATION");
        assert_eq!(lines[2], "int.orders  3           -");
    }

    #[test]
    fn test_csv_escapes_commas() {
        let rendered = configs_table(&tcm()).render(OutputFormat::Csv).unwrap();
        assert!(rendered.starts_with("topic,key,value\n"));
        assert!(rendered.contains("int.orders,cleanup.policy,\"compact,delete\""));
    }

    #[test]
    fn test_json_rows() {
        let rendered = topics_table(&tcm()).render(OutputFormat::Json).unwrap();
        let value: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value[0]["topic"], "int.orders");
        assert_eq!(value[0]["partitions"], "3");
    }

    #[test]
    fn test_empty_table() {
        let table = Table::new(vec!["topic"]);
        assert_eq!(table.render(OutputFormat::Table).unwrap(), "No data available");
    }
}
