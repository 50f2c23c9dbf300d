//! Scalar expressions: predicates, column references and values.

use crate::ast::{ArithOp, CaseWhen, CompareOp, Expr, FunctionCall, ParamType, SortKey, SortOrder, Value};
use crate::error::{CompileError, CompileResult};

use super::functions::VECTOR_WRAPPER_FUNCTION;
use super::ir::{ColumnRef, FunctionExpr, SqlExpr};
use super::literals::{db_type, param_db_type};
use super::operators::{Operator, OperatorExpr, negate};
use super::result::ParameterDecl;
use super::select::SelectGenerator;

impl SelectGenerator<'_> {
    pub fn visit_scalar(&mut self, expr: &Expr) -> CompileResult<SqlExpr> {
        let np = self.new_precedence;
        match expr {
            Expr::Constant { value } => self.visit_constant(value),
            Expr::Null { ty } => Ok(SqlExpr::cast(SqlExpr::literal("NULL"), db_type(*ty)?)),
            Expr::Parameter { name, ty } => {
                self.declare_parameter(ParameterDecl::declared(name.clone(), *ty)?);
                Ok(SqlExpr::literal(format!("@{}", name)))
            }
            Expr::Property { instance, name } => self.visit_property(instance, name),
            Expr::RowId => Ok(SqlExpr::literal(super::ir::CTID_COLUMN)),
            Expr::Compare { op, left, right } => {
                let op = match op {
                    CompareOp::Eq => Operator::Equals,
                    CompareOp::Ne => Operator::NotEquals,
                    CompareOp::Lt => Operator::LessThan,
                    CompareOp::Lte => Operator::LessThanOrEquals,
                    CompareOp::Gt => Operator::GreaterThan,
                    CompareOp::Gte => Operator::GreaterThanOrEquals,
                };
                let left = self.visit_scalar(left)?;
                let right = self.visit_scalar(right)?;
                Ok(OperatorExpr::binary(op, np, left, right))
            }
            Expr::And { left, right } => self.visit_binary(Operator::And, left, right),
            Expr::Or { left, right } => self.visit_binary(Operator::Or, left, right),
            Expr::Not { arg } => Ok(negate(self.visit_scalar(arg)?, np)),
            Expr::IsNull { arg } => {
                let operand = match arg.as_ref() {
                    Expr::Parameter { ty, .. } => SqlExpr::cast(self.visit_scalar(arg)?, param_db_type(*ty)?),
                    _ => self.visit_scalar(arg)?,
                };
                Ok(OperatorExpr::unary(Operator::IsNull, np, operand))
            }
            Expr::Element { input } => Ok(SqlExpr::Seq(vec![
                SqlExpr::literal("("),
                self.visit_scalar(input)?,
                SqlExpr::literal(")"),
            ])),
            Expr::IsEmpty { input } => self.visit_is_empty(input),
            Expr::Like { arg, pattern } => self.visit_binary(Operator::Like, arg, pattern),
            Expr::In { item, list } => {
                let item = self.visit_scalar(item)?;
                let list = list
                    .iter()
                    .map(|e| self.visit_scalar(e))
                    .collect::<CompileResult<Vec<_>>>()?;
                Ok(OperatorExpr::binary(Operator::In, np, item, SqlExpr::List(list)))
            }
            Expr::Arithmetic { op, args } => self.visit_arithmetic(*op, args),
            Expr::Case { whens, otherwise } => self.visit_case(whens, otherwise.as_deref()),
            Expr::Cast { arg, to } => Ok(SqlExpr::cast(self.visit_scalar(arg)?, db_type(*to)?)),
            Expr::Function(call) => self.visit_function(call),
            Expr::Limit { .. } => self.visit_scalar_limit(expr),
            Expr::Scan { .. }
            | Expr::Filter { .. }
            | Expr::Project { .. }
            | Expr::Sort { .. }
            | Expr::Skip { .. }
            | Expr::Distinct { .. }
            | Expr::AsSubquery { .. }
            | Expr::GroupBy { .. }
            | Expr::Join { .. }
            | Expr::SetOp { .. }
            | Expr::Rows { .. } => {
                let alias = self.next_alias();
                let n = self.visit_input(expr, &alias)?;
                Ok(SqlExpr::Select(self.chain(n).last().1))
            }
            Expr::Variable { .. }
            | Expr::Navigate { .. }
            | Expr::Deref { .. }
            | Expr::IsOf { .. }
            | Expr::Treat { .. }
            | Expr::OfType { .. } => Err(CompileError::unsupported(expr.kind_name())),
        }
    }

    fn visit_binary(&mut self, op: Operator, left: &Expr, right: &Expr) -> CompileResult<SqlExpr> {
        let left = self.visit_scalar(left)?;
        let right = self.visit_scalar(right)?;
        Ok(OperatorExpr::binary(op, self.new_precedence, left, right))
    }

    pub fn visit_constant(&mut self, value: &Value) -> CompileResult<SqlExpr> {
        if !self.parameterize {
            return Ok(SqlExpr::Constant(value.clone()));
        }
        let name = self.next_param_name();
        self.declare_parameter(ParameterDecl::constant(name.clone(), value.clone())?);
        Ok(SqlExpr::literal(format!("@{}", name)))
    }

    pub fn visit_sort_keys(&mut self, keys: &[SortKey]) -> CompileResult<Vec<(SqlExpr, SortOrder)>> {
        keys.iter()
            .map(|k| Ok((self.visit_scalar(&k.expr)?, k.order)))
            .collect()
    }

    /// Resolve `instance.name`, pulling the column through every stage of
    /// the binding's chain and of the joins that contain it.
    fn visit_property(&mut self, instance: &Expr, name: &str) -> CompileResult<SqlExpr> {
        let binding = match instance {
            Expr::Property { name, .. } | Expr::Variable { name } => name.as_str(),
            other => {
                return Err(CompileError::unsupported(format!(
                    "Property access on {}",
                    other.kind_name()
                )));
            }
        };
        let start = self
            .chain_for(binding)
            .ok_or_else(|| CompileError::UnknownBinding(binding.to_string()))?;

        let mut from = self.chain(start).top_name().to_string();
        let mut name = name.to_string();
        let mut node = Some(start);
        while let Some(id) = node {
            let selects = self.chain(id).selects.clone();
            for (as_name, stage) in selects {
                if self.is_current(stage) {
                    continue;
                }
                let mapped = self.stages[stage].pulled.get(&from, &name).map(str::to_string);
                match mapped {
                    Some(alias) => name = alias,
                    None => {
                        let orig = name.clone();
                        while self.stages[stage].pulled.has_alias(&name) {
                            name = format!("{}_{}", orig, self.next_alias());
                        }
                        self.stages[stage].pulled.insert(from.clone(), orig, name.clone());
                    }
                }
                from = as_name;
            }
            node = self.chain(id).join_parent;
        }
        Ok(SqlExpr::Column(ColumnRef::new(from, name)))
    }

    fn visit_arithmetic(&mut self, op: ArithOp, args: &[Expr]) -> CompileResult<SqlExpr> {
        let np = self.new_precedence;
        if op == ArithOp::Negate {
            let [arg] = args else {
                return Err(CompileError::arguments("Negate", "1", args.len()));
            };
            return Ok(OperatorExpr::unary(Operator::UnaryMinus, np, self.visit_scalar(arg)?));
        }
        let [left, right] = args else {
            return Err(CompileError::arguments(format!("{:?}", op), "2", args.len()));
        };
        let op = match op {
            ArithOp::Add => Operator::Add,
            ArithOp::Subtract => Operator::Sub,
            ArithOp::Multiply => Operator::Mul,
            ArithOp::Divide => Operator::Div,
            ArithOp::Modulo => Operator::Mod,
            ArithOp::Negate => Operator::UnaryMinus,
        };
        self.visit_binary(op, left, right)
    }

    fn visit_case(&mut self, whens: &[CaseWhen], otherwise: Option<&Expr>) -> CompileResult<SqlExpr> {
        // CASE WHEN x IS NULL THEN y ELSE x END
        if let ([CaseWhen { when: Expr::IsNull { arg }, then }], Some(otherwise)) = (whens, otherwise) {
            if **arg == *otherwise {
                let value = self.visit_scalar(otherwise)?;
                let fallback = self.visit_scalar(then)?;
                return Ok(FunctionExpr::new("COALESCE").arg(value).arg(fallback).into_expr());
            }
        }

        let mut rendered = Vec::with_capacity(whens.len());
        for CaseWhen { when, then } in whens {
            rendered.push((self.visit_scalar(when)?, self.visit_scalar(then)?));
        }
        let otherwise = match otherwise {
            None | Some(Expr::Null { .. }) => None,
            Some(e) => Some(Box::new(self.visit_scalar(e)?)),
        };
        Ok(SqlExpr::Case {
            whens: rendered,
            otherwise,
        })
    }

    /// `NOT EXISTS (...)`, or `NOT x = ANY (@p)` for a membership test
    /// against an unnested vector parameter.
    fn visit_is_empty(&mut self, input: &Expr) -> CompileResult<SqlExpr> {
        let np = self.new_precedence;
        if let Some((rhs, vector)) = vector_membership(input) {
            let item = self.visit_scalar(rhs)?;
            let array = self.visit_scalar(vector)?;
            return Ok(negate(OperatorExpr::binary(Operator::EqualsAny, np, item, array), np));
        }
        let alias = self.next_alias();
        let n = self.visit_input(input, &alias)?;
        let select = SqlExpr::Select(self.chain(n).last().1);
        Ok(negate(SqlExpr::Exists(Box::new(select)), np))
    }

    /// First column of a limited subquery, used as a value.
    fn visit_scalar_limit(&mut self, expr: &Expr) -> CompileResult<SqlExpr> {
        let alias = self.next_alias();
        let n = self.visit_input(expr, &alias)?;
        let selects = self.chain(n).selects.clone();
        let last = self.chain(n).last().1;

        if self.stages[last].projection.is_none() {
            let first = self.stages[selects[0].1]
                .projection
                .as_ref()
                .and_then(|columns| columns.first())
                .map(|c| c.name.clone());
            if let Some(column) = first {
                for pair in selects.windows(2) {
                    let (source, _) = &pair[0];
                    let (_, stage) = pair[1];
                    self.stages[stage].pulled.insert(source.clone(), column.clone(), column.clone());
                }
            }
        }
        Ok(SqlExpr::Select(last))
    }
}

/// Match `Project[1](Filter(v = unnest(@p), v.x = rhs))` and return the
/// compared value and the vector parameter.
fn vector_membership(input: &Expr) -> Option<(&Expr, &Expr)> {
    let Expr::Project { input, columns } = input else {
        return None;
    };
    match columns.as_slice() {
        [column] if column.expr.as_constant() == Some(&Value::Int32(1)) => {}
        _ => return None,
    }
    let Expr::Filter { input, predicate } = input.expr.as_ref() else {
        return None;
    };
    let Expr::Function(FunctionCall { name, args, .. }) = input.expr.as_ref() else {
        return None;
    };
    let Expr::Compare {
        op: CompareOp::Eq,
        left,
        right,
    } = predicate.as_ref()
    else {
        return None;
    };
    let Expr::Property { instance, .. } = left.as_ref() else {
        return None;
    };
    match (instance.as_ref(), args.as_slice()) {
        (Expr::Variable { name: v }, [vector])
            if *v == input.var
                && name == VECTOR_WRAPPER_FUNCTION
                && matches!(vector, Expr::Parameter { ty: ParamType::Vector(_), .. }) =>
        {
            Some((right.as_ref(), vector))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::PrimitiveKind;
    use crate::ast::builders::*;

    #[test]
    fn test_vector_membership_shape() {
        let unnest = Expr::Function(FunctionCall::canonical(
            VECTOR_WRAPPER_FUNCTION,
            vec![vector_param("ids", PrimitiveKind::Int32)],
        ));
        let subquery = project(
            "Filter1",
            filter("UnnestVar", unnest, eq(col("UnnestVar", "Value"), col("Extent1", "Id"))),
            vec![column("C1", int(1), PrimitiveKind::Int32)],
        );
        let (rhs, vector) = vector_membership(&subquery).unwrap();
        assert_eq!(rhs, &col("Extent1", "Id"));
        assert!(matches!(vector, Expr::Parameter { .. }));

        let other = project(
            "Filter1",
            filter("Extent1", scan(crate::ast::TableRef::new("Posts")), eq(col("Extent1", "Id"), int(1))),
            vec![column("C1", int(1), PrimitiveKind::Int32)],
        );
        assert!(vector_membership(&other).is_none());
    }
}
