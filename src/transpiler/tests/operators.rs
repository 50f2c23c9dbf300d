//! Operator precedence and negation.

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::{predicate_sql, predicate_sql_with, value_sql};
use crate::ast::builders::*;
use crate::ast::{ArithOp, CompareOp, Expr};
use crate::config::{CompilerOptions, ServerVersion};
use crate::transpiler::ir::{SqlExpr, ToSql};
use crate::transpiler::operators::{Operator, OperatorExpr, negate};
use crate::transpiler::quote_identifier;
use crate::transpiler::stage::Stages;

fn legacy() -> CompilerOptions {
    CompilerOptions::new().with_server_version(ServerVersion::new(9, 4))
}

fn id_is(n: i32) -> Expr {
    eq(col("Extent1", "Id"), int(n))
}

#[test]
fn test_and_binds_tighter_than_or() {
    let blog = eq(col("Extent1", "BlogId"), int(2));
    assert_eq!(
        predicate_sql(or(and(id_is(1), blog.clone()), id_is(3))),
        r#""Extent1"."Id" = 1 AND "Extent1"."BlogId" = 2 OR "Extent1"."Id" = 3"#
    );
    assert_eq!(
        predicate_sql(and(id_is(1), or(blog, id_is(3)))),
        r#""Extent1"."Id" = 1 AND ("Extent1"."BlogId" = 2 OR "Extent1"."Id" = 3)"#
    );
}

#[test]
fn test_arithmetic_grouping() {
    let id = || col("Extent1", "Id");
    assert_eq!(
        value_sql(arith(ArithOp::Multiply, vec![arith(ArithOp::Add, vec![id(), int(1)]), int(2)])),
        r#"("Extent1"."Id" + 1) * 2"#
    );
    assert_eq!(
        value_sql(arith(ArithOp::Subtract, vec![id(), arith(ArithOp::Subtract, vec![int(1), int(2)])])),
        r#""Extent1"."Id" - (1 - 2)"#
    );
    assert_eq!(value_sql(arith(ArithOp::Negate, vec![id()])), r#"- "Extent1"."Id""#);
}

#[test]
fn test_negation_flips_duals() {
    assert_eq!(predicate_sql(not(id_is(1))), r#""Extent1"."Id" != 1"#);
    assert_eq!(
        predicate_sql(not(like(col("Extent1", "Title"), text("a%")))),
        r#""Extent1"."Title" NOT LIKE E'a%'"#
    );
    assert_eq!(
        predicate_sql(not(is_null(col("Extent1", "Title")))),
        r#""Extent1"."Title" IS NOT NULL"#
    );
    let listed = Expr::In {
        item: Box::new(col("Extent1", "Id")),
        list: vec![int(1), int(2)],
    };
    assert_eq!(predicate_sql(listed.clone()), r#""Extent1"."Id" IN (1,2)"#);
    assert_eq!(predicate_sql(not(listed)), r#""Extent1"."Id" NOT IN (1,2)"#);
    assert_eq!(predicate_sql(not(not(id_is(1)))), r#""Extent1"."Id" = 1"#);
}

#[test]
fn test_negation_without_dual_wraps() {
    let blog = eq(col("Extent1", "BlogId"), int(2));
    assert_eq!(
        predicate_sql(not(and(id_is(1), blog))),
        r#"NOT ("Extent1"."Id" = 1 AND "Extent1"."BlogId" = 2)"#
    );
}

#[test]
fn test_between_bounds() {
    let between = func("Between", vec![col("Extent1", "Id"), int(1), int(10)]);
    assert_eq!(predicate_sql(between.clone()), r#"("Extent1"."Id") BETWEEN (1) AND (10)"#);
    assert_eq!(predicate_sql(not(between)), r#"("Extent1"."Id") NOT BETWEEN (1) AND (10)"#);
}

#[test]
fn test_prefix_operand_in_a_chain() {
    let id = col("Extent1", "Id");
    let not_blog = func("BitwiseNot", vec![col("Extent1", "BlogId")]);
    let chain = func("BitwiseAnd", vec![func("BitwiseAnd", vec![id, not_blog]), int(3)]);
    assert_eq!(value_sql(chain), r#""Extent1"."Id" & ~ "Extent1"."BlogId" & 3"#);
}

#[test]
fn test_precedence_regimes_differ() {
    let chained = compare(CompareOp::Eq, compare(CompareOp::Lt, col("Extent1", "Id"), int(1)), constant(true));
    assert_eq!(predicate_sql(chained.clone()), r#"("Extent1"."Id" < 1) = TRUE"#);
    assert_eq!(predicate_sql_with(chained, &legacy()), r#""Extent1"."Id" < 1 = TRUE"#);

    let null_test = is_null(id_is(1));
    assert_eq!(predicate_sql(null_test.clone()), r#""Extent1"."Id" = 1 IS NULL"#);
    assert_eq!(predicate_sql_with(null_test, &legacy()), r#"("Extent1"."Id" = 1) IS NULL"#);
}

#[test]
fn test_binary_renders_infix_token() {
    let stages = Stages::default();
    let masked = OperatorExpr::binary(Operator::BitwiseAnd, true, SqlExpr::literal("a"), SqlExpr::literal("1"));
    assert_eq!(masked.to_sql(&stages), "a & 1");
    let summed = OperatorExpr::binary(Operator::Add, false, SqlExpr::literal("a"), SqlExpr::literal("1"));
    assert_eq!(summed.to_sql(&stages), "a + 1");
}

fn comparison() -> impl Strategy<Value = Operator> {
    prop_oneof![
        Just(Operator::Equals),
        Just(Operator::NotEquals),
        Just(Operator::LessThan),
        Just(Operator::LessThanOrEquals),
        Just(Operator::GreaterThan),
        Just(Operator::GreaterThanOrEquals),
        Just(Operator::Like),
        Just(Operator::In),
        Just(Operator::Add),
        Just(Operator::And),
    ]
}

proptest! {
    #[test]
    fn prop_double_negation_is_identity(op in comparison(), new_precedence in any::<bool>(), n in 0i32..1000) {
        let stages = Stages::default();
        let expr = || OperatorExpr::binary(op, new_precedence, SqlExpr::literal("a"), SqlExpr::literal(n.to_string()));
        let twice = negate(negate(expr(), new_precedence), new_precedence);
        prop_assert_eq!(twice.to_sql(&stages), expr().to_sql(&stages));
    }

    #[test]
    fn prop_quoted_identifier_round_trips(name in "[ -~]{0,24}") {
        let quoted = quote_identifier(&name);
        prop_assert!(quoted.starts_with('"') && quoted.ends_with('"'));
        let inner = &quoted[1..quoted.len() - 1];
        prop_assert_eq!(inner.replace("\"\"", "\""), name.clone());
        prop_assert_eq!(inner.matches('"').count(), 2 * name.matches('"').count());
    }
}
