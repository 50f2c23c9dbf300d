//! Relational pipeline to nested SELECT stages.
//!
//! Every collection node is visited into a projection chain: the stages
//! created for it, outermost last, each with the alias it is referenced by
//! from the stage above. A clause is layered onto the last stage when the
//! stage can take it, otherwise the stage is wrapped first. Columns read
//! through a chain are pulled up through each of its stages when the
//! reference is resolved (see `scalar.rs`).

use std::collections::{HashMap, HashSet};

use crate::ast::{Binding, DmlOperation, Expr, JoinKind, PrimitiveKind, SetOpKind, TableRef, Value};
use crate::config::CompilerOptions;
use crate::error::{CompileError, CompileResult};

use super::dml::target::pull_up_row_id;
use super::ir::{CTID_COLUMN, ColumnExpr, ColumnRef, FunctionExpr, SqlExpr};
use super::literals::db_type;
use super::quote_identifier;
use super::result::ParameterDecl;
use super::stage::{FromClause, FromExpr, FromSource, InputExpr, JoinExpr, LimitClause, ScanExpr, StageId, Stages};

/// Index of a projection chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ChainId(usize);

/// Stages produced for one collection node, innermost first.
#[derive(Debug)]
pub(crate) struct Chain {
    pub selects: Vec<(String, StageId)>,
    /// The join this chain is a leg of.
    pub join_parent: Option<ChainId>,
}

impl Chain {
    pub fn top_name(&self) -> &str {
        &self.selects[0].0
    }

    pub fn last(&self) -> (&str, StageId) {
        let (name, stage) = &self.selects[self.selects.len() - 1];
        (name, *stage)
    }
}

/// Clause about to be layered onto a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Filter,
    GroupBy,
    Distinct,
    Sort,
    Skip,
    Project,
    AsSubquery,
}

impl Clause {
    /// Whether the stage can take the clause without being wrapped.
    fn fits(self, stage: &InputExpr) -> bool {
        if self == Clause::AsSubquery {
            return true;
        }
        if stage.is_subquery {
            return false;
        }
        let no_paging = stage.skip.is_none() && stage.limit.is_none();
        match self {
            Clause::Filter | Clause::Sort => {
                stage.projection.is_none() && stage.group_by.is_none() && no_paging
            }
            Clause::GroupBy => {
                stage.projection.is_none()
                    && stage.group_by.is_none()
                    && !stage.distinct
                    && stage.order_by.is_none()
                    && no_paging
            }
            Clause::Distinct => stage.order_by.is_none() && no_paging,
            Clause::Skip => stage.projection.is_none() && no_paging,
            Clause::Project => stage.projection.is_none() && !stage.distinct,
            Clause::AsSubquery => true,
        }
    }
}

/// Compilation state for one statement.
pub(crate) struct SelectGenerator<'a> {
    pub stages: Stages,
    chains: Vec<Chain>,
    ref_to_node: HashMap<String, ChainId>,
    /// Stages whose clauses are being built; references into them are not pulled.
    current: HashSet<StageId>,
    alias_counter: u32,
    param_counter: u32,
    pub new_precedence: bool,
    pub parameterize: bool,
    pub options: &'a CompilerOptions,
    pub dml: Option<&'a DmlOperation>,
    pub parameters: Vec<ParameterDecl>,
}

impl<'a> SelectGenerator<'a> {
    pub fn new(options: &'a CompilerOptions, dml: Option<&'a DmlOperation>) -> Self {
        Self {
            stages: Stages::default(),
            chains: Vec::new(),
            ref_to_node: HashMap::new(),
            current: HashSet::new(),
            alias_counter: 0,
            param_counter: 0,
            new_precedence: options.server_version.uses_new_precedence(),
            parameterize: options.parameterize_constants,
            options,
            dml,
            parameters: Vec::new(),
        }
    }

    /// Visit the statement's query and return its outermost stage.
    pub fn visit_root(&mut self, query: &Expr) -> CompileResult<StageId> {
        let alias = self.next_alias();
        let chain = self.visit_input(query, &alias)?;
        Ok(self.chain(chain).last().1)
    }

    pub fn next_alias(&mut self) -> String {
        let alias = format!("Alias{}", self.alias_counter);
        self.alias_counter += 1;
        alias
    }

    pub fn next_param_name(&mut self) -> String {
        let name = format!("p_{}", self.param_counter);
        self.param_counter += 1;
        name
    }

    pub fn chain(&self, id: ChainId) -> &Chain {
        &self.chains[id.0]
    }

    pub fn chain_for(&self, binding: &str) -> Option<ChainId> {
        self.ref_to_node.get(binding).copied()
    }

    pub fn is_current(&self, stage: StageId) -> bool {
        self.current.contains(&stage)
    }

    fn new_chain(&mut self, name: &str, stage: StageId) -> ChainId {
        self.chains.push(Chain {
            selects: vec![(name.to_string(), stage)],
            join_parent: None,
        });
        ChainId(self.chains.len() - 1)
    }

    fn last_stage(&self, chain: ChainId) -> StageId {
        self.chain(chain).last().1
    }

    /// Run `f` with the chain's last stage marked as under construction.
    pub fn scoped<T>(&mut self, chain: ChainId, f: impl FnOnce(&mut Self) -> CompileResult<T>) -> CompileResult<T> {
        let stage = self.last_stage(chain);
        let inserted = self.current.insert(stage);
        let result = f(self);
        if inserted {
            self.current.remove(&stage);
        }
        result
    }

    /// Visit `expr` bound as `child`, wrapping its last stage as `parent`
    /// when it cannot take `clause`.
    fn get_input(&mut self, expr: &Expr, child: &str, parent: &str, clause: Clause) -> CompileResult<ChainId> {
        let n = self.visit_input(expr, child)?;
        let (last_name, last) = self.chain(n).last();
        if !clause.fits(&self.stages[last]) {
            let last_name = last_name.to_string();
            tracing::trace!(?clause, wrapped = %last_name, as_name = parent, "wrapping stage");
            let wrapper = self.stages.push(InputExpr::from_source(FromSource::Stage(last), last_name));
            self.chains[n.0].selects.push((parent.to_string(), wrapper));
        }
        Ok(n)
    }

    pub fn visit_input(&mut self, expr: &Expr, binding: &str) -> CompileResult<ChainId> {
        let n = match expr {
            Expr::Scan { table } => {
                let scan = ScanExpr {
                    text: scan_text(table),
                    table: table.clone(),
                };
                let stage = self.stages.push(InputExpr::from_source(FromSource::Scan(scan), binding));
                self.new_chain(binding, stage)
            }
            Expr::Filter { input, predicate } => {
                let n = self.get_input(&input.expr, &input.var, binding, Clause::Filter)?;
                let predicate = self.scoped(n, |g| g.visit_scalar(predicate))?;
                let last = self.last_stage(n);
                self.stages[last].and_where(predicate);
                n
            }
            Expr::Sort { input, keys } => {
                let n = self.get_input(&input.expr, &input.var, binding, Clause::Sort)?;
                let keys = self.scoped(n, |g| g.visit_sort_keys(keys))?;
                let last = self.last_stage(n);
                self.stages[last].order_by = Some(keys);
                n
            }
            Expr::Skip { input, keys, count } => {
                let n = self.get_input(&input.expr, &input.var, binding, Clause::Skip)?;
                let (keys, count) = self.scoped(n, |g| Ok((g.visit_sort_keys(keys)?, g.visit_scalar(count)?)))?;
                let last = self.last_stage(n);
                let stage = &mut self.stages[last];
                if !keys.is_empty() {
                    stage.order_by = Some(keys);
                }
                stage.skip = Some(count);
                n
            }
            Expr::AsSubquery { input } => {
                let child = self.next_alias();
                let n = self.get_input(input, &child, binding, Clause::AsSubquery)?;
                let last = self.last_stage(n);
                self.stages[last].is_subquery = true;
                n
            }
            Expr::Distinct { input } => self.visit_distinct(input, binding)?,
            Expr::Limit {
                input,
                count,
                with_ties,
            } => {
                let child = self.next_alias();
                let n = self.visit_input(input, &child)?;
                let count = self.visit_scalar(count)?;
                self.apply_limit(n, count, *with_ties);
                n
            }
            Expr::Rows { values, element } => self.visit_rows(values, *element, binding)?,
            Expr::SetOp { op, left, right } => {
                let mut branches = Vec::new();
                self.collect_set_branches(left, *op, binding, &mut branches)?;
                self.collect_set_branches(right, *op, binding, &mut branches)?;
                let stage = self
                    .stages
                    .push(InputExpr::from_source(FromSource::Combined(*op, branches), binding));
                self.new_chain(binding, stage)
            }
            Expr::Project { input, columns } => self.visit_project(input, columns, binding)?,
            Expr::GroupBy {
                input,
                keys,
                aggregates,
            } => {
                let child = self.visit_input(&input.expr, &input.var)?;
                self.ref_to_node.insert(input.group_var.clone(), child);
                let (stage, entered) = self.projecting_stage(child, Clause::GroupBy);
                self.stages[stage].projection = Some(Vec::new());
                self.stages[stage].group_by = Some(Vec::new());

                let build = |g: &mut Self| -> CompileResult<()> {
                    for key in keys {
                        let expr = g.visit_scalar(&key.expr)?;
                        if !key.expr.is_constant() {
                            g.stages[stage].group_by.get_or_insert_with(Vec::new).push(expr.clone());
                        }
                        g.push_column(stage, ColumnExpr::new(expr, key.name.clone(), key.kind));
                    }
                    for aggregate in aggregates {
                        let expr = g.visit_aggregate(aggregate)?;
                        g.push_column(stage, ColumnExpr::new(expr, aggregate.name.clone(), aggregate.kind));
                    }
                    Ok(())
                };
                if entered {
                    self.scoped(child, build)?;
                } else {
                    build(self)?;
                }
                self.new_chain(binding, stage)
            }
            Expr::Join { .. } => {
                let stage = self.stages.push(InputExpr::default());
                let n = self.new_chain(binding, stage);
                let join = self.visit_join(expr, n)?;
                self.stages[stage].from = Some(FromClause::Join(Box::new(join)));
                n
            }
            Expr::Function(call) => {
                let (source, spec) = self.visit_function_source(call)?;
                let mut from = FromExpr::new(FromSource::Function(source), binding);
                from.column_spec = spec;
                let stage = self.stages.push(InputExpr {
                    from: Some(FromClause::Table(from)),
                    ..InputExpr::default()
                });
                self.new_chain(binding, stage)
            }
            other => {
                return Err(CompileError::not_implemented(format!(
                    "{} as a query source",
                    other.kind_name()
                )));
            }
        };

        self.ref_to_node.insert(binding.to_string(), n);
        Ok(n)
    }

    /// The stage a projection or grouping is written into, and whether it
    /// is the child's own last stage.
    fn projecting_stage(&mut self, child: ChainId, clause: Clause) -> (StageId, bool) {
        let (name, last) = self.chain(child).last();
        if clause.fits(&self.stages[last]) {
            (last, true)
        } else {
            let name = name.to_string();
            (self.stages.push(InputExpr::from_source(FromSource::Stage(last), name)), false)
        }
    }

    fn push_column(&mut self, stage: StageId, column: ColumnExpr) {
        self.stages[stage].projection.get_or_insert_with(Vec::new).push(column);
    }

    fn visit_project(
        &mut self,
        input: &Binding,
        columns: &[crate::ast::ProjectColumn],
        binding: &str,
    ) -> CompileResult<ChainId> {
        let child = self.visit_input(&input.expr, &input.var)?;
        let (stage, entered) = self.projecting_stage(child, Clause::Project);
        self.stages[stage].projection = Some(Vec::new());

        let build = |g: &mut Self| -> CompileResult<()> {
            for column in columns {
                let expr = g.visit_scalar(&column.expr)?;
                let expr = match g.dml {
                    Some(DmlOperation::Delete(op)) if expr.is_literal(CTID_COLUMN) => {
                        let source = pull_up_row_id(&op.target, &mut g.stages, stage, false)
                            .ok_or_else(|| CompileError::dml("Can't project CTID column for query."))?;
                        SqlExpr::Column(ColumnRef::row_id_aware(source.table_name, source.column_name))
                    }
                    _ if matches!(column.expr, Expr::Constant { value: Value::String(_) }) => {
                        SqlExpr::cast(expr, "varchar")
                    }
                    _ => expr,
                };
                g.push_column(stage, ColumnExpr::new(expr, column.name.clone(), column.kind));
            }
            Ok(())
        };
        if entered {
            self.scoped(child, build)?;
        } else {
            build(self)?;
        }
        Ok(self.new_chain(binding, stage))
    }

    fn visit_distinct(&mut self, input: &Expr, binding: &str) -> CompileResult<ChainId> {
        let child = self.next_alias();
        let n = self.visit_input(input, &child)?;
        let (prev_name, prev) = self.chain(n).last();
        let prev_name = prev_name.to_string();

        if !Clause::Distinct.fits(&self.stages[prev]) {
            // DISTINCT must see exactly the columns the inner stage produces.
            let names: Vec<String> = match &self.stages[prev].projection {
                Some(columns) => columns.iter().map(|c| c.name.clone()).collect(),
                None => self.stages[prev].pulled.iter().map(|c| c.alias.clone()).collect(),
            };
            let mut wrapper = InputExpr::from_source(FromSource::Stage(prev), prev_name.clone());
            for name in names {
                wrapper.pulled.insert(prev_name.clone(), name.clone(), name);
            }
            let wrapper = self.stages.push(wrapper);
            self.chains[n.0].selects.push((binding.to_string(), wrapper));
        }

        let last = self.last_stage(n);
        self.stages[last].distinct = true;
        Ok(n)
    }

    /// Set a LIMIT, composing with an existing one as `LEAST(old,new)`.
    fn apply_limit(&mut self, n: ChainId, count: SqlExpr, with_ties: bool) {
        let last = self.last_stage(n);
        let stage = &mut self.stages[last];
        match stage.limit.take() {
            Some(existing) => {
                let least = FunctionExpr::new("LEAST").arg(existing.arg).arg(count);
                stage.limit = Some(LimitClause {
                    arg: least.into_expr(),
                    with_ties: existing.with_ties,
                });
            }
            None => stage.limit = Some(LimitClause { arg: count, with_ties }),
        }
    }

    fn visit_rows(&mut self, values: &[Expr], element: PrimitiveKind, binding: &str) -> CompileResult<ChainId> {
        if let [Expr::Element { input }] = values {
            let child = self.next_alias();
            let n = self.visit_input(input, &child)?;
            self.apply_limit(n, SqlExpr::literal("1"), false);
            return Ok(n);
        }

        let rows = if values.is_empty() {
            SqlExpr::Seq(vec![
                SqlExpr::literal("(SELECT "),
                SqlExpr::cast(SqlExpr::literal("NULL"), db_type(element)?),
                SqlExpr::literal(" LIMIT 0)"),
            ])
        } else {
            let mut parts = vec![SqlExpr::literal("(")];
            for (i, value) in values.iter().enumerate() {
                parts.push(SqlExpr::literal(if i == 0 { "SELECT " } else { " UNION ALL SELECT " }));
                parts.push(self.visit_scalar(value)?);
                parts.push(SqlExpr::literal(" AS \"C\""));
            }
            parts.push(SqlExpr::literal(")"));
            SqlExpr::Seq(parts)
        };
        let stage = self.stages.push(InputExpr::from_source(FromSource::Literal(rows), binding));
        Ok(self.new_chain(binding, stage))
    }

    /// Flatten `a op b op c` into one branch list. EXCEPT is never flattened.
    fn collect_set_branches(
        &mut self,
        expr: &Expr,
        kind: SetOpKind,
        binding: &str,
        branches: &mut Vec<StageId>,
    ) -> CompileResult<()> {
        match expr {
            Expr::SetOp { op, left, right } if *op == kind && kind != SetOpKind::Except => {
                self.collect_set_branches(left, kind, binding, branches)?;
                self.collect_set_branches(right, kind, binding, branches)
            }
            _ => {
                let name = format!("{}_{}", binding, branches.len());
                let n = self.visit_input(expr, &name)?;
                branches.push(self.last_stage(n));
                Ok(())
            }
        }
    }

    /// Build the join tree for a join node owned by chain `n`. Nested joins
    /// on either leg become part of the same tree.
    fn visit_join(&mut self, expr: &Expr, n: ChainId) -> CompileResult<JoinExpr> {
        let Expr::Join {
            join: kind,
            left,
            right,
            condition,
        } = expr
        else {
            return Err(CompileError::unsupported(format!("{} as a join", expr.kind_name())));
        };

        let left = self.visit_join_leg(left, n)?;
        let right = if kind.is_apply() {
            let r = self.scoped(n, |g| g.visit_input(&right.expr, &right.var))?;
            self.chains[r.0].join_parent = Some(n);
            let (name, stage) = self.chain(r).last();
            let mut from = FromExpr::new(FromSource::Stage(stage), name);
            from.force_subquery = true;
            FromClause::Table(from)
        } else {
            self.visit_join_leg(right, n)?
        };

        let condition = if kind.has_condition() {
            let condition = condition
                .as_deref()
                .ok_or_else(|| CompileError::unsupported(format!("{} without a condition", kind)))?;
            Some(self.scoped(n, |g| g.visit_scalar(condition))?)
        } else {
            None
        };

        Ok(JoinExpr {
            left,
            kind: *kind,
            right,
            condition,
        })
    }

    fn visit_join_leg(&mut self, leg: &Binding, n: ChainId) -> CompileResult<FromClause> {
        if let Expr::Join { .. } = leg.expr.as_ref() {
            return Ok(FromClause::Join(Box::new(self.visit_join(&leg.expr, n)?)));
        }
        let child = self.visit_input(&leg.expr, &leg.var)?;
        self.chains[child.0].join_parent = Some(n);
        let (name, stage) = self.chain(child).last();
        Ok(FromClause::Table(FromExpr::new(FromSource::Stage(stage), name)))
    }

    /// Record a parameter the statement references, once per name.
    pub fn declare_parameter(&mut self, decl: ParameterDecl) {
        if !self.parameters.iter().any(|p| p.name == decl.name) {
            tracing::debug!(name = %decl.name, db_type = %decl.db_type, "parameter");
            self.parameters.push(decl);
        }
    }
}

/// `"schema"."table"`, `"table"`, or a parenthesized defining query.
fn scan_text(table: &TableRef) -> String {
    if let Some(query) = &table.defining_query {
        return format!("({})", query);
    }
    match table.schema.as_deref().filter(|s| !s.is_empty()) {
        Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(table.table_name())),
        None => quote_identifier(table.table_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_text() {
        assert_eq!(scan_text(&TableRef::new("Posts")), r#""Posts""#);
        assert_eq!(scan_text(&TableRef::new("Posts").in_schema("dbo")), r#""dbo"."Posts""#);
        assert_eq!(scan_text(&TableRef::new("Posts").in_schema("")), r#""Posts""#);
        let mut view = TableRef::new("Recent");
        view.defining_query = Some("SELECT 1 AS \"Id\"".to_string());
        assert_eq!(scan_text(&view), "(SELECT 1 AS \"Id\")");
    }

    #[test]
    fn test_clause_compatibility() {
        let mut stage = InputExpr::default();
        assert!(Clause::Filter.fits(&stage));
        stage.projection = Some(Vec::new());
        assert!(!Clause::Filter.fits(&stage));
        assert!(Clause::Distinct.fits(&stage));
        assert!(!Clause::Project.fits(&stage));

        let mut stage = InputExpr::default();
        stage.is_subquery = true;
        assert!(!Clause::Sort.fits(&stage));
        assert!(Clause::AsSubquery.fits(&stage));

        let mut stage = InputExpr::default();
        stage.distinct = true;
        assert!(!Clause::GroupBy.fits(&stage));
        assert!(Clause::Filter.fits(&stage));
    }

    #[test]
    fn test_aliases_are_sequential() {
        let options = CompilerOptions::default();
        let mut generator = SelectGenerator::new(&options, None);
        assert_eq!(generator.next_alias(), "Alias0");
        assert_eq!(generator.next_alias(), "Alias1");
        assert_eq!(generator.next_param_name(), "p_0");
    }
}
