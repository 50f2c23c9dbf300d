use pretty_assertions::assert_eq;

use super::{blogs, posts};
use crate::ast::builders::*;
use crate::ast::{
    ColumnMap, DeleteOp, Discriminator, DmlOperation, Expr, InsertOp, JoinKind, PrimitiveKind, SortKey, TableRef,
    UpdateOp, Value,
};
use crate::config::CompilerOptions;
use crate::error::{CompileError, CompileResult};
use crate::transpiler::{CompiledCommand, compile};

fn posts_table() -> TableRef {
    TableRef::new("Posts").in_schema("dbo")
}

fn delete(limit: Option<u64>) -> DmlOperation {
    DmlOperation::Delete(DeleteOp {
        target: posts_table(),
        limit,
        with_row_count: false,
    })
}

fn update(limit: Option<u64>, columns: ColumnMap) -> DmlOperation {
    DmlOperation::Update(UpdateOp {
        target: posts_table(),
        limit,
        with_row_count: false,
        columns,
    })
}

fn run(tree: &Expr, op: &DmlOperation) -> CompileResult<CompiledCommand> {
    compile(tree, Some(op), &CompilerOptions::default())
}

fn dml_message(err: CompileError) -> String {
    match err {
        CompileError::MalformedDml(message) => message,
        other => panic!("expected a DML error, got {:?}", other),
    }
}

/// Row identifiers of the posts of blog 5.
fn posts_of_blog() -> Expr {
    project(
        "Filter1",
        filter("Extent1", posts(), eq(col("Extent1", "BlogId"), int(5))),
        vec![column("C1", Expr::RowId, PrimitiveKind::Int32)],
    )
}

/// `Title = 'new'` for post 5.
fn retitled() -> Expr {
    project(
        "Filter1",
        filter("Extent1", posts(), eq(col("Extent1", "Id"), int(5))),
        vec![column("Title", text("new"), PrimitiveKind::String)],
    )
}

#[test]
fn test_simple_delete() {
    let cmd = run(&posts_of_blog(), &delete(None)).unwrap();
    assert_eq!(cmd.sql, "DELETE FROM \"dbo\".\"Posts\" AS \"Extent1\"\nWHERE \"Extent1\".\"BlogId\" = 5");
    assert_eq!(cmd.columns.len(), 1);
    assert_eq!(cmd.columns[0].name, "C1");
}

#[test]
fn test_delete_with_row_count() {
    let op = DmlOperation::Delete(DeleteOp {
        target: posts_table(),
        limit: None,
        with_row_count: true,
    });
    let cmd = run(&posts_of_blog(), &op).unwrap();
    assert_eq!(
        cmd.sql,
        "WITH __cte_delete__ AS (\n\
         DELETE FROM \"dbo\".\"Posts\" AS \"Extent1\"\n\
         WHERE \"Extent1\".\"BlogId\" = 5\n    RETURNING 1\n)\n\
         SELECT count(1) FROM __cte_delete__"
    );
}

#[test]
fn test_delete_through_inner_join() {
    let joined = join(
        JoinKind::Inner,
        ("Extent1", posts()),
        ("Extent2", blogs()),
        Some(eq(col("Extent1", "BlogId"), col("Extent2", "Id"))),
    );
    let tree = project(
        "Filter1",
        filter("Join1", joined, eq(path("Join1", "Extent2", "Name"), text("x"))),
        vec![column("C1", Expr::RowId, PrimitiveKind::Int32)],
    );
    let cmd = run(&tree, &delete(None)).unwrap();
    assert_eq!(
        cmd.sql,
        "DELETE FROM \"dbo\".\"Posts\" AS \"Extent1\"\n\
         USING \"dbo\".\"Blogs\" AS \"Extent2\"\n\
         WHERE \"Extent1\".\"BlogId\" = \"Extent2\".\"Id\" AND \"Extent2\".\"Name\" = E'x'"
    );
}

#[test]
fn test_limited_delete_matches_row_ids() {
    let cmd = run(&posts_of_blog(), &delete(Some(10))).unwrap();
    assert_eq!(
        cmd.sql,
        "DELETE FROM \"dbo\".\"Posts\" AS \"__DELETE_TARGET__\"\n\
         USING (\n\
         SELECT \"Extent1\".CTID AS \"C1\", \"Extent1\".CTID AS \"__internal_row_id__\" \
         FROM \"dbo\".\"Posts\" AS \"Extent1\" WHERE \"Extent1\".\"BlogId\" = 5 LIMIT 10\n\
         FOR UPDATE\n\
         ) AS \"__DELETE_SOURCE__\"\n\
         WHERE \"__DELETE_TARGET__\".CTID = \"__DELETE_SOURCE__\".\"__internal_row_id__\""
    );
}

#[test]
fn test_delete_rejects_ordering() {
    let tree = project(
        "Sort1",
        sort("Extent1", posts(), vec![SortKey::asc(col("Extent1", "Id"))]),
        vec![column("C1", Expr::RowId, PrimitiveKind::Int32)],
    );
    let err = run(&tree, &delete(None)).unwrap_err();
    assert_eq!(dml_message(err), "OrderBy is not supported in Delete queries.");
}

#[test]
fn test_simple_update() {
    let cmd = run(&retitled(), &update(None, ColumnMap::new().map(0, "Title"))).unwrap();
    assert_eq!(
        cmd.sql,
        "UPDATE \"dbo\".\"Posts\" AS \"Extent1\"\n\
         SET\n    \"Title\" = CAST (E'new' AS varchar)\n\
         WHERE \"Extent1\".\"Id\" = 5"
    );
}

#[test]
fn test_limited_update_reads_from_locked_source() {
    let cmd = run(&retitled(), &update(Some(1), ColumnMap::new().map(0, "Title"))).unwrap();
    assert_eq!(
        cmd.sql,
        "UPDATE \"dbo\".\"Posts\" AS \"__UPDATE_TARGET__\"\n\
         SET\n    \"Title\" = \"__UPDATE_SOURCE__\".\"Title\"\n\
         FROM (\n\
         SELECT CAST (E'new' AS varchar) AS \"Title\", \"Extent1\".CTID AS \"__internal_row_id__\" \
         FROM \"dbo\".\"Posts\" AS \"Extent1\" WHERE \"Extent1\".\"Id\" = 5 LIMIT 1\n\
         FOR UPDATE\n\
         ) AS \"__UPDATE_SOURCE__\"\n\
         WHERE \"__UPDATE_TARGET__\".CTID = \"__UPDATE_SOURCE__\".\"__internal_row_id__\""
    );
}

#[test]
fn test_update_column_errors() {
    let sentinel_only = update(None, ColumnMap::new().with_null_sentinel(0));
    let err = run(&retitled(), &sentinel_only).unwrap_err();
    assert_eq!(dml_message(err), "No columns in Update.");

    let two_columns = project(
        "Filter1",
        filter("Extent1", posts(), eq(col("Extent1", "Id"), int(5))),
        vec![
            column("Title", text("new"), PrimitiveKind::String),
            column("BlogId", int(2), PrimitiveKind::Int32),
        ],
    );
    let err = run(&two_columns, &update(None, ColumnMap::new().map(0, "Title"))).unwrap_err();
    assert_eq!(dml_message(err), "Can't find map for column # 1.");
}

fn copied_blogs() -> Expr {
    project(
        "Extent1",
        blogs(),
        vec![
            column("BlogId", col("Extent1", "Id"), PrimitiveKind::Int32),
            column("Title", col("Extent1", "Name"), PrimitiveKind::String),
        ],
    )
}

fn insert(columns: ColumnMap) -> DmlOperation {
    DmlOperation::Insert(InsertOp {
        target: posts_table(),
        with_row_count: false,
        columns,
        discriminators: vec![Discriminator {
            column: "Kind".to_string(),
            value: Value::String("post".to_string()),
        }],
    })
}

#[test]
fn test_insert_reorders_columns_and_inlines_discriminator() {
    let op = insert(ColumnMap::new().map(1, "Title").map(0, "BlogId"));
    let expected = "INSERT INTO \"dbo\".\"Posts\" (\"Title\", \"BlogId\", \"Kind\")\n\
                    SELECT \"Extent1\".\"Name\" AS \"Title\", \"Extent1\".\"Id\" AS \"BlogId\", \
                    E'post' AS \"__discriminator__Kind\" FROM \"dbo\".\"Blogs\" AS \"Extent1\"";

    let cmd = run(&copied_blogs(), &op).unwrap();
    assert_eq!(cmd.sql, expected);

    let parameterized = CompilerOptions::default().parameterize_constants(true);
    let cmd = compile(&copied_blogs(), Some(&op), &parameterized).unwrap();
    assert_eq!(cmd.sql, expected);
    assert!(cmd.parameters.is_empty());
}

#[test]
fn test_insert_mapping_errors() {
    let err = run(&copied_blogs(), &insert(ColumnMap::new().map(0, "BlogId"))).unwrap_err();
    assert_eq!(dml_message(err), "Can't find map for column # 1.");

    let err = run(&copied_blogs(), &insert(ColumnMap::new().map(0, "BlogId").map(0, "Title"))).unwrap_err();
    assert!(matches!(err, CompileError::AmbiguousMapping(ref column) if column == "Title"));

    let err = run(&copied_blogs(), &insert(ColumnMap::new())).unwrap_err();
    assert_eq!(dml_message(err), "Column mapping is not set for Insert operation.");
}
