use anyhow::{anyhow, bail, Context, Result};
use gallery_core::{BulkEditWorkflow, FieldUpdate};
use shared::domain::{PhotoId, StockStatus};

/// Which session item a `--set` edit targets.
#[derive(Debug, Clone, PartialEq)]
pub enum EditTarget {
    Photo(PhotoId),
    /// 1-based position in display order, written `#2`.
    Position(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    pub target: EditTarget,
    pub update: FieldUpdate,
}

/// Parses `TARGET:field=value`. An empty value clears optional fields.
pub fn parse_edit(raw: &str) -> Result<Edit> {
    let (target, assignment) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("edit '{raw}' must look like TARGET:field=value"))?;
    let (field, value) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("edit '{raw}' is missing '=value'"))?;

    let target = match target.trim().strip_prefix('#') {
        Some(position) => {
            let position = position
                .parse::<usize>()
                .with_context(|| format!("invalid position in edit '{raw}'"))?;
            if position == 0 {
                bail!("positions start at #1");
            }
            EditTarget::Position(position)
        }
        None if target.trim().is_empty() => bail!("edit '{raw}' has no target"),
        None => EditTarget::Photo(PhotoId::new(target.trim())),
    };

    let value = value.trim();
    let optional = || (!value.is_empty()).then(|| value.to_string());
    let update = match field.trim().to_ascii_lowercase().as_str() {
        "title" => FieldUpdate::Title(value.to_string()),
        "description" => FieldUpdate::Description(optional()),
        "fabric" => FieldUpdate::Fabric(optional()),
        "price" if value.is_empty() => FieldUpdate::Price(None),
        "price" => FieldUpdate::Price(Some(
            value
                .parse::<f64>()
                .with_context(|| format!("price '{value}' is not a number"))?,
        )),
        "stock" | "stock_status" => FieldUpdate::StockStatus(
            StockStatus::from_label(value)
                .ok_or_else(|| anyhow!("unknown stock status '{value}'"))?,
        ),
        other => bail!("unknown field '{other}'"),
    };

    Ok(Edit { target, update })
}

pub fn apply_edits(workflow: &mut BulkEditWorkflow, edits: Vec<Edit>) -> Result<()> {
    for edit in edits {
        match edit.target {
            EditTarget::Photo(photo_id) => workflow
                .update_field(&photo_id, edit.update)
                .with_context(|| format!("cannot edit photo {photo_id}"))?,
            EditTarget::Position(position) => {
                let index = workflow.go_to(position - 1)?;
                if index != position - 1 {
                    bail!("no photo at position #{position}");
                }
                workflow.update_current(edit.update)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/edits_tests.rs"]
mod tests;
