//! SELECT pipelines: stage layering, column pulling, joins and groupings.

use pretty_assertions::assert_eq;

use super::{blogs, posts, predicate_sql, sql, try_value, value_sql};
use crate::ast::builders::*;
use crate::ast::*;
use crate::config::CompilerOptions;
use crate::error::CompileError;
use crate::transpiler::{ParameterDecl, ResultColumn, compile};

#[test]
fn test_simple_select() {
    let tree = project(
        "Filter1",
        filter("Extent1", posts(), eq(col("Extent1", "BlogId"), int(5))),
        vec![column("Title", col("Filter1", "Title"), PrimitiveKind::String)],
    );
    assert_eq!(
        sql(&tree),
        r#"SELECT "Extent1"."Title" FROM "dbo"."Posts" AS "Extent1" WHERE "Extent1"."BlogId" = 5"#
    );
}

#[test]
fn test_result_columns_follow_projection() {
    let tree = project(
        "Extent1",
        posts(),
        vec![
            column("Id", col("Extent1", "Id"), PrimitiveKind::Int32),
            column("Title", col("Extent1", "Title"), PrimitiveKind::String),
        ],
    );
    let cmd = compile(&tree, None, &CompilerOptions::default()).unwrap();
    assert_eq!(
        cmd.columns,
        vec![
            ResultColumn::new("Id", PrimitiveKind::Int32),
            ResultColumn::new("Title", PrimitiveKind::String),
        ]
    );
    assert!(cmd.columns[1].unknown_result_type);
    assert!(cmd.parameters.is_empty());
}

#[test]
fn test_sort_then_limit_share_a_stage() {
    let sorted = sort("Extent1", posts(), vec![SortKey::asc(col("Extent1", "Title"))]);
    let tree = project(
        "Limit1",
        limit(sorted, int(10)),
        vec![column("Title", col("Limit1", "Title"), PrimitiveKind::String)],
    );
    assert_eq!(
        sql(&tree),
        r#"SELECT "Extent1"."Title" FROM "dbo"."Posts" AS "Extent1" ORDER BY "Extent1"."Title" ASC LIMIT 10"#
    );
}

#[test]
fn test_filter_over_limit_wraps_and_pulls_columns() {
    let tree = project(
        "Filter1",
        filter("Limit1", limit(posts(), int(5)), eq(col("Limit1", "BlogId"), int(3))),
        vec![column("Title", col("Filter1", "Title"), PrimitiveKind::String)],
    );
    assert_eq!(
        sql(&tree),
        r#"SELECT "Alias1"."Title" FROM (SELECT "Alias1"."BlogId", "Alias1"."Title" FROM "dbo"."Posts" AS "Alias1" LIMIT 5) AS "Alias1" WHERE "Alias1"."BlogId" = 3"#
    );
}

#[test]
fn test_skip_renders_offset() {
    let tree = project(
        "Skip1",
        skip("Extent1", posts(), vec![SortKey::asc(col("Extent1", "Id"))], int(5)),
        vec![column("Title", col("Skip1", "Title"), PrimitiveKind::String)],
    );
    assert_eq!(
        sql(&tree),
        r#"SELECT "Extent1"."Title" FROM "dbo"."Posts" AS "Extent1" ORDER BY "Extent1"."Id" ASC OFFSET 5"#
    );
}

#[test]
fn test_skip_without_keys_keeps_source_order() {
    let tree = project(
        "Skip1",
        skip("Extent1", posts(), vec![], int(5)),
        vec![column("Title", col("Skip1", "Title"), PrimitiveKind::String)],
    );
    assert_eq!(
        sql(&tree),
        r#"SELECT "Extent1"."Title" FROM "dbo"."Posts" AS "Extent1" OFFSET 5"#
    );
}

#[test]
fn test_inner_join() {
    let joined = join(
        JoinKind::Inner,
        ("Extent1", posts()),
        ("Extent2", blogs()),
        Some(eq(col("Extent1", "BlogId"), col("Extent2", "Id"))),
    );
    let tree = project(
        "Join1",
        joined,
        vec![
            column("Title", path("Join1", "Extent1", "Title"), PrimitiveKind::String),
            column("Name", path("Join1", "Extent2", "Name"), PrimitiveKind::String),
        ],
    );
    assert_eq!(
        sql(&tree),
        r#"SELECT "Extent1"."Title", "Extent2"."Name" FROM "dbo"."Posts" AS "Extent1" INNER JOIN "dbo"."Blogs" AS "Extent2" ON "Extent1"."BlogId" = "Extent2"."Id""#
    );
}

#[test]
fn test_outer_apply_is_lateral() {
    let latest = limit(
        filter("Extent2", blogs(), eq(col("Extent2", "Id"), col("Extent1", "BlogId"))),
        int(1),
    );
    let tree = project(
        "Apply1",
        join(JoinKind::OuterApply, ("Extent1", posts()), ("Limit1", latest), None),
        vec![
            column("Title", path("Apply1", "Extent1", "Title"), PrimitiveKind::String),
            column("Name", path("Apply1", "Limit1", "Name"), PrimitiveKind::String),
        ],
    );
    assert_eq!(
        sql(&tree),
        r#"SELECT "Extent1"."Title", "Extent2"."Name" FROM "dbo"."Posts" AS "Extent1" LEFT OUTER JOIN LATERAL (SELECT "Extent2"."Name" FROM "dbo"."Blogs" AS "Extent2" WHERE "Extent2"."Id" = "Extent1"."BlogId" LIMIT 1) AS "Extent2" ON TRUE"#
    );
}

#[test]
fn test_group_by_with_aggregate() {
    let grouped = Expr::GroupBy {
        input: GroupBinding {
            var: "Extent1".into(),
            group_var: "GroupBy1".into(),
            expr: Box::new(posts()),
        },
        keys: vec![column("BlogId", col("Extent1", "BlogId"), PrimitiveKind::Int32)],
        aggregates: vec![GroupAggregate {
            name: "C1".into(),
            function: "Count".into(),
            namespace: FunctionNamespace::Canonical,
            args: vec![int(1)],
            distinct: false,
            kind: PrimitiveKind::Int32,
        }],
    };
    let tree = project(
        "GroupBy1",
        grouped,
        vec![
            column("BlogId", col("GroupBy1", "BlogId"), PrimitiveKind::Int32),
            column("Total", col("GroupBy1", "C1"), PrimitiveKind::Int32),
        ],
    );
    assert_eq!(
        sql(&tree),
        r#"SELECT "GroupBy1"."BlogId", "GroupBy1"."C1" AS "Total" FROM (SELECT "Extent1"."BlogId", CAST (count(1) AS int4) AS "C1" FROM "dbo"."Posts" AS "Extent1" GROUP BY "Extent1"."BlogId") AS "GroupBy1""#
    );
}

#[test]
fn test_distinct_projection() {
    let tree = distinct(project(
        "Extent1",
        posts(),
        vec![column("Title", col("Extent1", "Title"), PrimitiveKind::String)],
    ));
    assert_eq!(sql(&tree), r#"SELECT DISTINCT "Extent1"."Title" FROM "dbo"."Posts" AS "Extent1""#);
}

#[test]
fn test_union_all() {
    let left = project(
        "Extent1",
        posts(),
        vec![column("Title", col("Extent1", "Title"), PrimitiveKind::String)],
    );
    let right = project(
        "Extent2",
        blogs(),
        vec![column("Title", col("Extent2", "Name"), PrimitiveKind::String)],
    );
    let tree = project(
        "UnionAll1",
        set_op(SetOpKind::UnionAll, left, right),
        vec![column("Title", col("UnionAll1", "Title"), PrimitiveKind::String)],
    );
    assert_eq!(
        sql(&tree),
        r#"SELECT "UnionAll1"."Title" FROM ((SELECT "Extent1"."Title" FROM "dbo"."Posts" AS "Extent1") UNION ALL (SELECT "Extent2"."Name" AS "Title" FROM "dbo"."Blogs" AS "Extent2")) AS "UnionAll1""#
    );
}

#[test]
fn test_inline_rows() {
    let rows = Expr::Rows {
        values: vec![int(1), int(2)],
        element: PrimitiveKind::Int32,
    };
    let tree = project("Rows1", rows, vec![column("C", col("Rows1", "C"), PrimitiveKind::Int32)]);
    assert_eq!(
        sql(&tree),
        r#"SELECT "Rows1"."C" FROM (SELECT 1 AS "C" UNION ALL SELECT 2 AS "C") AS "Rows1""#
    );

    let empty = Expr::Rows {
        values: vec![],
        element: PrimitiveKind::Int32,
    };
    let tree = project("Rows1", empty, vec![column("C", col("Rows1", "C"), PrimitiveKind::Int32)]);
    assert_eq!(
        sql(&tree),
        r#"SELECT "Rows1"."C" FROM (SELECT CAST (NULL AS int4) LIMIT 0) AS "Rows1""#
    );
}

#[test]
fn test_exists_and_not_exists() {
    let related = filter("Extent2", blogs(), eq(col("Extent2", "Id"), col("Extent1", "BlogId")));
    assert_eq!(
        predicate_sql(exists(related.clone())),
        r#"EXISTS (SELECT 1 FROM "dbo"."Blogs" AS "Extent2" WHERE "Extent2"."Id" = "Extent1"."BlogId")"#
    );
    assert_eq!(
        predicate_sql(is_empty(related)),
        r#"NOT EXISTS (SELECT 1 FROM "dbo"."Blogs" AS "Extent2" WHERE "Extent2"."Id" = "Extent1"."BlogId")"#
    );
}

#[test]
fn test_element_is_a_scalar_subquery() {
    let name = project(
        "Extent2",
        blogs(),
        vec![column("Name", col("Extent2", "Name"), PrimitiveKind::String)],
    );
    assert_eq!(
        value_sql(element(name)),
        r#"(SELECT "Extent2"."Name" FROM "dbo"."Blogs" AS "Extent2")"#
    );
}

#[test]
fn test_declared_parameter() {
    let tree = project(
        "Filter1",
        filter("Extent1", posts(), eq(col("Extent1", "Id"), param("id", PrimitiveKind::Int32))),
        vec![column("C1", int(1), PrimitiveKind::Int32)],
    );
    let cmd = compile(&tree, None, &CompilerOptions::default()).unwrap();
    assert!(cmd.sql.ends_with(r#"WHERE "Extent1"."Id" = @id"#));
    assert_eq!(
        cmd.parameters,
        vec![ParameterDecl {
            name: "id".into(),
            db_type: "int4".into(),
            value: None,
        }]
    );
}

#[test]
fn test_parameterized_constants() {
    let options = CompilerOptions::new().parameterize_constants(true);
    let tree = project(
        "Filter1",
        filter("Extent1", posts(), eq(col("Extent1", "Id"), int(7))),
        vec![column("C1", int(1), PrimitiveKind::Int32)],
    );
    let cmd = compile(&tree, None, &options).unwrap();
    assert_eq!(
        cmd.sql,
        r#"SELECT @p_1 AS "C1" FROM "dbo"."Posts" AS "Extent1" WHERE "Extent1"."Id" = @p_0"#
    );
    let names: Vec<_> = cmd.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["p_0", "p_1"]);
    assert_eq!(cmd.parameters[0].value, Some(Value::Int32(7)));
    assert_eq!(cmd.parameters[1].db_type, "int4");
}

#[test]
fn test_values_and_casts() {
    assert_eq!(value_sql(text("a")), r#"CAST (E'a' AS varchar)"#);
    assert_eq!(value_sql(null(PrimitiveKind::Int32)), r#"CAST (NULL AS int4)"#);
    assert_eq!(
        value_sql(cast(col("Extent1", "Id"), PrimitiveKind::Int64)),
        r#"CAST ("Extent1"."Id" AS int8)"#
    );
}

#[test]
fn test_case_expressions() {
    assert_eq!(
        value_sql(case(
            vec![(is_null(col("Extent1", "Title")), text("none"))],
            Some(col("Extent1", "Title")),
        )),
        r#"COALESCE("Extent1"."Title",E'none')"#
    );
    assert_eq!(
        value_sql(case(
            vec![(eq(col("Extent1", "Id"), int(1)), text("one"))],
            Some(text("other")),
        )),
        r#"CASE WHEN ("Extent1"."Id" = 1) THEN (E'one') ELSE (E'other') END"#
    );
}

#[test]
fn test_unknown_binding_is_an_error() {
    let err = try_value(col("Nope", "Id")).unwrap_err();
    assert!(matches!(err, CompileError::UnknownBinding(ref name) if name == "Nope"));
}

#[test]
fn test_untranslatable_kind_is_an_error() {
    let err = try_value(Expr::Deref {
        arg: Box::new(col("Extent1", "Id")),
    })
    .unwrap_err();
    assert_eq!(err.to_string(), "Deref is not supported");
}
