//! Locating the mutation target's scan and pulling its row identifier up.

use crate::ast::{PrimitiveKind, TableRef};

use crate::transpiler::ir::{CTID_ALIAS, CTID_COLUMN, ColumnExpr, ColumnRef, SqlExpr};
use crate::transpiler::stage::{FromClause, FromExpr, FromSource, StageId, Stages};

/// Where the row identifier of the target can be read from a stage.
#[derive(Debug, Clone)]
pub(crate) struct RowIdSource {
    /// Alias of the FROM entry that exposes it.
    pub table_name: String,
    /// `CTID` at the scan itself, the pulled alias above it.
    pub column_name: String,
    /// FROM entry scanning the target.
    pub target_from: Option<FromExpr>,
}

struct RowIdFinder<'t> {
    target: &'t TableRef,
    found: bool,
    projected: bool,
    /// Set while visiting the stage the search started from.
    initial: bool,
    /// Add the identifier to the initial stage too.
    add: bool,
    table_name: String,
    column_name: String,
    target_from: Option<FromExpr>,
}

/// Find the scan of `target` below `stage` and thread its row identifier
/// through every stage in between.
///
/// With `add`, the identifier is also added to `stage` itself under
/// `__internal_row_id__`. Without it, an identifier read straight off the
/// scan stays `CTID`. Returns `None` if the target is not reachable.
pub(crate) fn pull_up_row_id(target: &TableRef, stages: &mut Stages, stage: StageId, add: bool) -> Option<RowIdSource> {
    let mut finder = RowIdFinder {
        target,
        found: false,
        projected: false,
        initial: true,
        add,
        table_name: String::new(),
        column_name: String::new(),
        target_from: None,
    };
    finder.visit_input(stages, stage, None);
    finder.found.then(|| RowIdSource {
        table_name: finder.table_name,
        column_name: finder.column_name,
        target_from: finder.target_from,
    })
}

impl RowIdFinder<'_> {
    fn visit_input(&mut self, stages: &mut Stages, id: StageId, parent_can_skip: Option<bool>) {
        let initial = std::mem::replace(&mut self.initial, false);
        if let Some(from) = stages[id].from.clone() {
            self.visit_from(stages, &from);
        }
        self.initial = initial;
        if !self.found {
            return;
        }

        if self.projected {
            let (table, column) = (self.table_name.clone(), self.column_name.clone());
            self.add_column(stages, id, &table, &column);
            self.column_name = CTID_ALIAS.to_string();
        } else if self.initial {
            if self.add {
                self.projected = true;
                let table = self.table_name.clone();
                self.add_column(stages, id, &table, CTID_COLUMN);
                self.column_name = CTID_ALIAS.to_string();
            } else {
                self.column_name = CTID_COLUMN.to_string();
            }
        } else if parent_can_skip != Some(true) {
            // The stage renders as a derived table, so the scan's CTID has
            // to be projected out of it.
            self.projected = true;
            let table = self.table_name.clone();
            self.add_column(stages, id, &table, CTID_COLUMN);
            self.column_name = CTID_ALIAS.to_string();
        }
    }

    fn add_column(&self, stages: &mut Stages, id: StageId, source: &str, column: &str) {
        let stage = &mut stages[id];
        match &mut stage.projection {
            Some(columns) => {
                if !self.initial || self.add {
                    columns.push(ColumnExpr::new(
                        SqlExpr::Column(ColumnRef::row_id_aware(source, column)),
                        CTID_ALIAS,
                        PrimitiveKind::Int32,
                    ));
                }
            }
            None => stage.pulled.insert(source, column, CTID_ALIAS),
        }
    }

    fn visit_from(&mut self, stages: &mut Stages, from: &FromClause) {
        match from {
            FromClause::Join(join) => {
                self.visit_from(stages, &join.left);
                if !self.found {
                    self.visit_from(stages, &join.right);
                }
            }
            FromClause::Table(fe) => {
                match &fe.source {
                    FromSource::Stage(inner) => {
                        let can_skip = fe.can_skip_subquery(stages);
                        self.visit_input(stages, *inner, Some(can_skip));
                    }
                    FromSource::Scan(scan) if scan.table.is_same_table(self.target) => {
                        self.found = true;
                        self.column_name = scan.text.clone();
                    }
                    _ => {}
                }
                if self.found {
                    self.table_name = fe.name.clone();
                    self.target_from.get_or_insert_with(|| fe.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpiler::ir::ToSql;
    use crate::transpiler::stage::{InputExpr, ScanExpr};

    fn posts() -> TableRef {
        TableRef::new("Posts").in_schema("dbo")
    }

    fn scan_stage(stages: &mut Stages, table: TableRef, alias: &str) -> StageId {
        let text = format!("\"{}\"", table.table_name());
        stages.push(InputExpr::from_source(FromSource::Scan(ScanExpr { text, table }), alias))
    }

    #[test]
    fn test_row_id_at_the_scan() {
        let mut stages = Stages::default();
        let scan = scan_stage(&mut stages, posts(), "Extent1");
        let found = pull_up_row_id(&posts(), &mut stages, scan, false).unwrap();
        assert_eq!(found.table_name, "Extent1");
        assert_eq!(found.column_name, CTID_COLUMN);
        assert!(stages[scan].pulled.is_empty());
    }

    #[test]
    fn test_row_id_pulled_through_filtered_stage() {
        let mut stages = Stages::default();
        let scan = scan_stage(&mut stages, posts(), "Extent1");
        stages[scan].where_ = Some(SqlExpr::literal("TRUE"));
        let mut top = InputExpr::from_source(FromSource::Stage(scan), "Extent1");
        top.projection = Some(vec![ColumnExpr::new(SqlExpr::literal("1"), "C1", PrimitiveKind::Int32)]);
        let top = stages.push(top);

        let found = pull_up_row_id(&posts(), &mut stages, top, true).unwrap();
        assert_eq!(found.column_name, CTID_ALIAS);
        assert_eq!(
            stages[top].to_sql(&stages),
            "SELECT 1 AS \"C1\", \"Extent1\".\"__internal_row_id__\" FROM \
             (SELECT \"Extent1\".CTID AS \"__internal_row_id__\" FROM \"Posts\" AS \"Extent1\" WHERE TRUE) AS \"Extent1\""
        );
    }

    #[test]
    fn test_other_table_is_not_found() {
        let mut stages = Stages::default();
        let scan = scan_stage(&mut stages, TableRef::new("Blogs"), "Extent1");
        assert!(pull_up_row_id(&posts(), &mut stages, scan, true).is_none());
    }
}
