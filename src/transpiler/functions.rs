//! Builtin function translation.
//!
//! Canonical functions map onto PostgreSQL builtins, often through small
//! rewrites (date arithmetic has no direct backend function). Store
//! functions cover full-text search and regex matching. Anything else is
//! emitted as a quoted call.

use crate::ast::{Expr, FunctionCall, FunctionNamespace, GroupAggregate, ParamType, PrimitiveKind, Value, WindowSpec};
use crate::error::{CompileError, CompileResult};

use super::ir::{FunctionExpr, SqlExpr, WindowClause};
use super::literals::db_type;
use super::operators::{Operator, OperatorExpr};
use super::quote_identifier;
use super::select::SelectGenerator;

/// Marker function wrapping a vector parameter used as a row source.
pub(crate) const VECTOR_WRAPPER_FUNCTION: &str = "__vector_wrapper__";

const REGEX_IGNORE_CASE: i64 = 1;
const REGEX_MULTILINE: i64 = 2;
const REGEX_SINGLELINE: i64 = 16;
const REGEX_IGNORE_WHITESPACE: i64 = 32;
const REGEX_RIGHT_TO_LEFT: i64 = 64;
const REGEX_ECMASCRIPT: i64 = 256;

fn arity<'e, const N: usize>(call: &'e FunctionCall) -> CompileResult<&'e [Expr; N]> {
    call.args
        .as_slice()
        .try_into()
        .map_err(|_| CompileError::arguments(call.name.clone(), N.to_string(), call.args.len()))
}

fn aggregate_name(function: &str) -> Option<&'static str> {
    Some(match function {
        "Avg" => "avg",
        "Count" | "BigCount" => "count",
        "Min" => "min",
        "Max" => "max",
        "Sum" => "sum",
        "StDev" => "stddev_samp",
        "StDevP" => "stddev_pop",
        "Var" => "var_samp",
        "VarP" => "var_pop",
        _ => return None,
    })
}

fn store_operator(name: &str) -> Option<Operator> {
    Some(match name {
        "@@" => Operator::QueryMatch,
        "operator_tsquery_and" => Operator::QueryAnd,
        "operator_tsquery_or" => Operator::QUERY_OR,
        "operator_tsquery_contains" => Operator::QueryContains,
        "operator_tsquery_is_contained" => Operator::QueryIsContained,
        _ => return None,
    })
}

impl SelectGenerator<'_> {
    pub fn visit_function(&mut self, call: &FunctionCall) -> CompileResult<SqlExpr> {
        if call.name == VECTOR_WRAPPER_FUNCTION {
            return Ok(self.visit_vector_wrapper(call)?.0);
        }
        match &call.namespace {
            FunctionNamespace::Canonical => match &call.window {
                Some(window) => self.visit_window_function(call, window),
                None => self.visit_canonical(call),
            },
            FunctionNamespace::Store => self.visit_store(call),
            FunctionNamespace::User { schema } => self.visit_custom(schema.as_deref(), &call.name, &call.args),
        }
    }

    /// A function in FROM position, with its column specification if any.
    pub fn visit_function_source(&mut self, call: &FunctionCall) -> CompileResult<(SqlExpr, Option<String>)> {
        if call.name == VECTOR_WRAPPER_FUNCTION {
            let (expr, spec) = self.visit_vector_wrapper(call)?;
            return Ok((expr, Some(spec)));
        }
        Ok((self.visit_function(call)?, None))
    }

    /// `unnest(@p)` with the single column the vector is exposed as.
    fn visit_vector_wrapper(&mut self, call: &FunctionCall) -> CompileResult<(SqlExpr, String)> {
        let [arg] = arity::<1>(call)?;
        let Expr::Parameter {
            ty: ParamType::Vector(kind),
            ..
        } = arg
        else {
            return Err(CompileError::function(call.name.clone(), "expected a vector parameter"));
        };
        let spec = format!("({})", quote_identifier(self.options.vector_column(*kind)));
        let unnest = FunctionExpr::new("unnest").arg(self.visit_scalar(arg)?);
        Ok((unnest.into_expr(), spec))
    }

    fn visit_args(&mut self, args: &[Expr]) -> CompileResult<Vec<SqlExpr>> {
        args.iter().map(|a| self.visit_scalar(a)).collect()
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> CompileResult<SqlExpr> {
        let args = self.visit_args(args)?;
        Ok(SqlExpr::Function(FunctionExpr {
            name: name.to_string(),
            args,
            window: None,
        }))
    }

    fn binary(&mut self, op: Operator, left: &Expr, right: &Expr) -> CompileResult<SqlExpr> {
        let left = self.visit_scalar(left)?;
        let right = self.visit_scalar(right)?;
        Ok(OperatorExpr::binary(op, self.new_precedence, left, right))
    }

    pub fn visit_aggregate(&mut self, aggregate: &GroupAggregate) -> CompileResult<SqlExpr> {
        let name = match aggregate.namespace {
            FunctionNamespace::Canonical => aggregate_name(&aggregate.function),
            _ => None,
        }
        .ok_or_else(|| CompileError::unsupported(format!("Aggregate {}", aggregate.function)))?;
        let [arg] = aggregate.args.as_slice() else {
            return Err(CompileError::arguments(aggregate.function.clone(), "1", aggregate.args.len()));
        };
        let mut arg = self.visit_scalar(arg)?;
        if aggregate.distinct {
            arg = SqlExpr::Seq(vec![SqlExpr::literal("DISTINCT "), arg]);
        }
        Ok(SqlExpr::cast(FunctionExpr::new(name).arg(arg).into_expr(), db_type(aggregate.kind)?))
    }

    fn visit_window_function(&mut self, call: &FunctionCall, window: &WindowSpec) -> CompileResult<SqlExpr> {
        let name = match call.name.as_str() {
            "RowNumber" => "ROW_NUMBER",
            "Rank" => "RANK",
            "DenseRank" => "DENSE_RANK",
            "NTile" => "NTILE",
            "Count" | "LongCount" => "COUNT",
            "Avg" => "AVG",
            "Sum" => "SUM",
            "Max" => "MAX",
            "Min" => "MIN",
            other => return Err(CompileError::unsupported(format!("Window function {}", other))),
        };

        let mut function = FunctionExpr::new(name);
        if name == "NTILE" {
            let [buckets] = arity::<1>(call)?;
            function = function.arg(SqlExpr::cast(self.visit_scalar(buckets)?, "int4"));
        } else if name == "COUNT" && call.args.is_empty() {
            function = function.literal_arg("*");
        } else {
            function.args = self.visit_args(&call.args)?;
        }

        let partition_by = self.visit_args(&window.partition_by)?;
        let order_by = self.visit_sort_keys(&window.order_by)?;
        function.window = Some(WindowClause { partition_by, order_by });
        Ok(function.into_expr())
    }

    fn visit_canonical(&mut self, call: &FunctionCall) -> CompileResult<SqlExpr> {
        let np = self.new_precedence;
        let name = call.name.as_str();
        match name {
            "Concat" => {
                let [a, b] = arity::<2>(call)?;
                self.binary(Operator::Concat, a, b)
            }
            "Contains" | "StartsWith" => {
                let [a, b] = arity::<2>(call)?;
                let needle = self.visit_scalar(b)?;
                let haystack = self.visit_scalar(a)?;
                let found = position(needle, haystack);
                Ok(if name == "Contains" {
                    OperatorExpr::binary(Operator::GreaterThan, np, found, SqlExpr::literal("0"))
                } else {
                    OperatorExpr::binary(Operator::Equals, np, found, SqlExpr::literal("1"))
                })
            }
            "IndexOf" => {
                let [a, b] = arity::<2>(call)?;
                let needle = self.visit_scalar(a)?;
                let haystack = self.visit_scalar(b)?;
                Ok(position(needle, haystack))
            }
            "Left" | "Right" => {
                arity::<2>(call)?;
                self.call(&name.to_lowercase(), &call.args)
            }
            "Length" | "DataLength" => {
                arity::<1>(call)?;
                let function = if name == "Length" { "char_length" } else { "octet_length" };
                let length = self.call(function, &call.args)?;
                Ok(SqlExpr::cast(length, db_type(call.result.unwrap_or(PrimitiveKind::Int32))?))
            }
            "LTrim" | "RTrim" | "Trim" | "ToLower" | "ToUpper" => {
                arity::<1>(call)?;
                let function = match name {
                    "LTrim" => "ltrim",
                    "RTrim" => "rtrim",
                    "Trim" => "btrim",
                    "ToLower" => "lower",
                    _ => "upper",
                };
                self.call(function, &call.args)
            }
            "Replace" => {
                arity::<3>(call)?;
                self.call("replace", &call.args)
            }
            "Substring" => {
                arity::<3>(call)?;
                self.call("substr", &call.args)
            }

            "AddDays" | "AddHours" | "AddMicroseconds" | "AddMilliseconds" | "AddMinutes" | "AddMonths"
            | "AddNanoseconds" | "AddSeconds" | "AddYears" => self.date_add(call),
            "DiffDays" | "DiffHours" | "DiffMicroseconds" | "DiffMilliseconds" | "DiffMinutes" | "DiffMonths"
            | "DiffNanoseconds" | "DiffSeconds" | "DiffYears" => {
                let [start, end] = arity::<2>(call)?;
                let start = self.visit_scalar(start)?;
                let end = self.visit_scalar(end)?;
                self.date_diff(name, start, end)
            }
            "Day" | "Hour" | "Minute" | "Month" | "Second" | "Year" => self.date_part(call, name),
            "Millisecond" => self.date_part(call, "milliseconds"),
            "GetTotalOffsetMinutes" => {
                let timezone = self.date_part(call, "timezone")?;
                Ok(OperatorExpr::binary(Operator::Div, np, timezone, SqlExpr::literal("60")))
            }
            "CurrentDateTime" => Ok(SqlExpr::literal("LOCALTIMESTAMP")),
            "CurrentUtcDateTime" => Ok(SqlExpr::literal("CURRENT_TIMESTAMP AT TIME ZONE 'UTC'")),
            "CurrentDateTimeOffset" => Ok(SqlExpr::literal("CURRENT_TIMESTAMP")),
            "CreateDateTime" => {
                arity::<6>(call)?;
                self.call("make_timestamp", &call.args)
            }

            "BitwiseAnd" | "BitwiseOr" | "BitwiseXor" => {
                let [a, b] = arity::<2>(call)?;
                let op = match name {
                    "BitwiseAnd" => Operator::BitwiseAnd,
                    "BitwiseOr" => Operator::BitwiseOr,
                    _ => Operator::BitwiseXor,
                };
                self.binary(op, a, b)
            }
            "BitwiseNot" => {
                let [a] = arity::<1>(call)?;
                Ok(OperatorExpr::unary(Operator::BitwiseNot, np, self.visit_scalar(a)?))
            }

            "Abs" | "Ceiling" | "Floor" => {
                arity::<1>(call)?;
                self.call(name, &call.args)
            }
            "Round" => {
                if !(1..=2).contains(&call.args.len()) {
                    return Err(CompileError::arguments(name, "1 or 2", call.args.len()));
                }
                self.call(name, &call.args)
            }
            "Power" => {
                arity::<2>(call)?;
                self.call(name, &call.args)
            }
            "Truncate" => {
                arity::<2>(call)?;
                self.call("trunc", &call.args)
            }

            "NewGuid" => Ok(FunctionExpr::new("gen_random_uuid").into_expr()),
            "TruncateTime" => {
                let [a] = arity::<1>(call)?;
                Ok(SqlExpr::TruncateTime {
                    unit: "day",
                    arg: Box::new(self.visit_scalar(a)?),
                })
            }
            "IsNumeric" => {
                arity::<1>(call)?;
                self.call("isnumeric", &call.args)
            }
            "TimeToString" => {
                let [a] = arity::<1>(call)?;
                let time = self.visit_scalar(a)?;
                Ok(FunctionExpr::new("to_char").arg(time).literal_arg("'HH24:MI:SS'").into_expr())
            }
            "IsNull" => {
                arity::<2>(call)?;
                self.call("COALESCE", &call.args)
            }
            "NullIf" => {
                arity::<2>(call)?;
                self.call("NULLIF", &call.args)
            }
            "Between" => {
                let [value, begin, end] = arity::<3>(call)?;
                let value = self.visit_scalar(value)?;
                let bounds = SqlExpr::BetweenBounds(Box::new(self.visit_scalar(begin)?), Box::new(self.visit_scalar(end)?));
                Ok(OperatorExpr::binary(Operator::Between, np, value, bounds))
            }
            other => Err(CompileError::unsupported(format!("Canonical function {}", other))),
        }
    }

    /// `t + n * INTERVAL '1 Unit'`; nanoseconds are scaled to microseconds.
    fn date_add(&mut self, call: &FunctionCall) -> CompileResult<SqlExpr> {
        let np = self.new_precedence;
        let [time, count] = arity::<2>(call)?;
        let mut part = &call.name[3..];
        let time = self.visit_scalar(time)?;
        let mut count = self.visit_scalar(count)?;
        if part == "Nanoseconds" {
            part = "Microseconds";
            count = OperatorExpr::binary(Operator::Div, np, count, SqlExpr::literal("1000"));
        }
        let interval = SqlExpr::literal(format!("INTERVAL '1 {}'", part));
        let step = OperatorExpr::binary(Operator::Mul, np, count, interval);
        Ok(OperatorExpr::binary(Operator::Add, np, time, step))
    }

    fn date_diff(&self, name: &str, start: SqlExpr, end: SqlExpr) -> CompileResult<SqlExpr> {
        let np = self.new_precedence;
        let truncated = |unit: &'static str, start: SqlExpr, end: SqlExpr| {
            (
                SqlExpr::TruncateTime { unit, arg: Box::new(start) },
                SqlExpr::TruncateTime { unit, arg: Box::new(end) },
            )
        };
        let epoch_of = |value: SqlExpr| {
            FunctionExpr::new("extract")
                .arg(SqlExpr::Seq(vec![SqlExpr::literal("epoch from "), value]))
                .into_expr()
        };
        let epoch_diff = |unit: &'static str, start: SqlExpr, end: SqlExpr| {
            let (start, end) = truncated(unit, start, end);
            epoch_of(OperatorExpr::binary(Operator::Sub, np, end, start))
        };
        let scaled = |epoch: SqlExpr, factor: &str| {
            SqlExpr::cast(OperatorExpr::binary(Operator::Mul, np, epoch, SqlExpr::literal(factor)), "int4")
        };
        let age = |unit: &'static str, start: SqlExpr, end: SqlExpr| {
            let (start, end) = truncated(unit, start, end);
            FunctionExpr::new("age").arg(end).arg(start).into_expr()
        };

        Ok(match name {
            "DiffDays" => {
                let (start, end) = truncated("day", start, end);
                FunctionExpr::new("date_part")
                    .literal_arg("'day'")
                    .arg(OperatorExpr::binary(Operator::Sub, np, end, start))
                    .into_expr()
                    .suffixed("::int4")
            }
            "DiffHours" => OperatorExpr::binary(
                Operator::Div,
                np,
                epoch_diff("hour", start, end).suffixed("::int4"),
                SqlExpr::literal("3600"),
            ),
            "DiffMinutes" => OperatorExpr::binary(
                Operator::Div,
                np,
                epoch_diff("minute", start, end).suffixed("::int4"),
                SqlExpr::literal("60"),
            ),
            "DiffSeconds" => epoch_diff("second", start, end).suffixed("::int4"),
            "DiffMilliseconds" => scaled(epoch_diff("milliseconds", start, end), "1000"),
            "DiffMicroseconds" => scaled(epoch_diff("microseconds", start, end), "1000000"),
            // Only microsecond precision exists, so the result is a multiple of 1000.
            "DiffNanoseconds" => scaled(epoch_diff("microseconds", start, end), "1000000000"),
            "DiffMonths" => {
                // An interval converts to seconds with 30-day months and 365.25-day years.
                let seconds = epoch_of(age("month", start, end));
                let months = OperatorExpr::binary(Operator::Div, np, seconds, SqlExpr::literal("2629800.0"));
                FunctionExpr::new("round").arg(months).into_expr().suffixed("::int4")
            }
            "DiffYears" => FunctionExpr::new("date_part")
                .literal_arg("'year'")
                .arg(age("year", start, end))
                .into_expr()
                .suffixed("::int4"),
            other => return Err(CompileError::unsupported(format!("Canonical function {}", other))),
        })
    }

    /// `cast(extract(part FROM x) as int4)`
    fn date_part(&mut self, call: &FunctionCall, part: &str) -> CompileResult<SqlExpr> {
        let [arg] = arity::<1>(call)?;
        let arg = self.visit_scalar(arg)?;
        Ok(FunctionExpr::new("cast(extract")
            .arg(SqlExpr::Seq(vec![SqlExpr::literal(format!("{} FROM ", part)), arg]))
            .into_expr()
            .suffixed(" as int4)"))
    }

    fn visit_store(&mut self, call: &FunctionCall) -> CompileResult<SqlExpr> {
        let name = call.name.as_str();
        if let Some(op) = store_operator(name) {
            let [a, b] = arity::<2>(call)?;
            return self.binary(op, a, b);
        }
        match name {
            "operator_tsquery_negate" => {
                let [a] = arity::<1>(call)?;
                Ok(OperatorExpr::unary(Operator::QueryNegate, self.new_precedence, self.visit_scalar(a)?))
            }
            "ts_rank" | "ts_rank_cd" if call.args.len() > 4 => {
                let mut weights = Vec::with_capacity(4);
                for arg in &call.args[..4] {
                    let weight = arg.as_constant().and_then(weight_text).ok_or_else(|| {
                        CompileError::function(name, "all weight values must be numeric constants")
                    })?;
                    weights.push(weight);
                }
                let mut args = vec![Expr::Constant {
                    value: Value::String(format!("{{ {} }}", weights.join(", "))),
                }];
                args.extend(call.args[4..].iter().cloned());
                self.visit_custom(None, name, &args)
            }
            "setweight" => {
                let [vector, label] = arity::<2>(call)?;
                let label = label
                    .as_constant()
                    .and_then(weight_label)
                    .ok_or_else(|| CompileError::function(name, "label must be a constant weight label"))?;
                let args = [
                    vector.clone(),
                    Expr::Constant {
                        value: Value::String(label.to_string()),
                    },
                ];
                self.visit_custom(None, name, &args)
            }
            "as_tsvector" | "as_tsquery" => {
                let [a] = arity::<1>(call)?;
                let ty = if name == "as_tsvector" { "tsvector" } else { "tsquery" };
                Ok(SqlExpr::cast(self.visit_scalar(a)?, ty))
            }
            "match_regex" => self.visit_match_regex(call),
            "cast" => {
                let [value, ty] = arity::<2>(call)?;
                let ty = ty
                    .as_constant()
                    .and_then(Value::as_str)
                    .ok_or_else(|| CompileError::function(name, "type name must be a string constant"))?;
                Ok(SqlExpr::cast(self.visit_scalar(value)?, ty))
            }
            _ => self.visit_custom(None, name, &call.args),
        }
    }

    fn visit_match_regex(&mut self, call: &FunctionCall) -> CompileResult<SqlExpr> {
        let np = self.new_precedence;
        let (input, pattern, options) = match call.args.as_slice() {
            [input, pattern] => (input, pattern, 0),
            [input, pattern, options] => {
                let options = options
                    .as_constant()
                    .and_then(Value::as_i64)
                    .ok_or_else(|| CompileError::function("match_regex", "options must be a constant"))?;
                (input, pattern, options)
            }
            args => return Err(CompileError::arguments("match_regex", "2 or 3", args.len())),
        };

        if options & (REGEX_RIGHT_TO_LEFT | REGEX_ECMASCRIPT) != 0 {
            return Err(CompileError::function(
                "match_regex",
                "options RightToLeft and ECMAScript are not supported",
            ));
        }
        if options == REGEX_SINGLELINE {
            return self.binary(Operator::RegexMatch, input, pattern);
        }

        let mut flags = String::from("(?");
        if options & REGEX_IGNORE_CASE != 0 {
            flags.push('i');
        }
        if options & REGEX_MULTILINE != 0 {
            flags.push('n');
        } else if options & REGEX_SINGLELINE == 0 {
            // `.` must not match a newline unless single-line mode is on.
            flags.push('p');
        }
        if options & REGEX_IGNORE_WHITESPACE != 0 {
            flags.push('x');
        }
        flags.push(')');

        let pattern = self.visit_scalar(pattern)?;
        let pattern = OperatorExpr::binary(Operator::Concat, np, SqlExpr::Constant(Value::String(flags)), pattern);
        let input = self.visit_scalar(input)?;
        Ok(OperatorExpr::binary(Operator::RegexMatch, np, input, pattern))
    }

    /// `"schema"."name"(args)`
    fn visit_custom(&mut self, schema: Option<&str>, name: &str, args: &[Expr]) -> CompileResult<SqlExpr> {
        let name = match schema.filter(|s| !s.is_empty()) {
            Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(name)),
            None => quote_identifier(name),
        };
        self.call(&name, args)
    }
}

/// `position(needle in haystack)`
fn position(needle: SqlExpr, haystack: SqlExpr) -> SqlExpr {
    FunctionExpr::new("position")
        .arg(SqlExpr::Seq(vec![needle, SqlExpr::literal(" in "), haystack]))
        .into_expr()
}

fn weight_text(value: &Value) -> Option<String> {
    match value {
        Value::Double(f) => Some(f.to_string()),
        Value::Single(f) => Some(f.to_string()),
        Value::Decimal(d) => Some(d.to_string()),
        other => other.as_i64().map(|n| n.to_string()),
    }
}

/// Weight labels are numbered D=0 through A=3.
fn weight_label(value: &Value) -> Option<&'static str> {
    const LABELS: [&str; 4] = ["D", "C", "B", "A"];
    match value {
        Value::String(s) => LABELS.iter().copied().find(|l| *l == s.as_str()),
        other => other
            .as_i64()
            .and_then(|n| usize::try_from(n).ok())
            .and_then(|n| LABELS.get(n).copied()),
    }
}
